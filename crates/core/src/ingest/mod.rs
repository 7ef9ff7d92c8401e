pub mod provider;
pub mod stats;
pub mod types;

pub use provider::{ApiFootballClient, FixtureProvider};
pub use stats::{collect_contexts, FixtureContext};
pub use types::{filter_fixtures, CompetitionFilter};
