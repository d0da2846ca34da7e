//! Consumer-driven contract testing on Pact v2 files.
//!
//! Consumers describe interactions with [`PactBuilder`], exercise their client
//! against the resulting [`MockServer`] and write a contract file. Providers
//! replay the file with [`Verifier`], seeding each interaction's provider state
//! first.

mod error;
pub mod matching;
pub mod mock_server;
pub mod pact;
pub mod pattern;
pub mod verifier;

pub use error::ContractError;
pub use mock_server::{InteractionBuilder, MockServer, PactBuilder, RequestSpec, ResponseSpec};
pub use pact::{Interaction, MatchingRule, MatchingRules, Pact, RuleKind};
pub use pattern::{Pattern, each_like, like, term};
pub use verifier::{InteractionResult, VerificationReport, Verifier};
