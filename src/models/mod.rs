mod auth;
mod product;
mod provider_state;

pub use auth::*;
pub use product::*;
pub use provider_state::*;
