//! Reconciles model-written recommendations with the authoritative fixture list.

pub mod fixture_index;
pub mod report;
pub mod resolver;
pub mod validator;

pub use fixture_index::{FixtureIndex, ResolutionResult};
pub use report::{Issue, ValidationEvent, ValidationReport};
pub use resolver::{parse_match_label, MatchResolver, Resolution};
pub use validator::PredictionValidator;
