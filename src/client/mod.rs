//! Consumer side of the contract: the calls the catalog frontend makes.

mod product_client;

pub use product_client::{ClientError, ClientResult, DEFAULT_BASE_URL, ProductClient};
