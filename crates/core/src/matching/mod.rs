//! Team-name comparison across data sources.
//!
//! Club names differ between the fixtures provider and the model's output ("AC Milan" vs
//! "Milan", "FSV Mainz 05" vs "Mainz"). Everything here works on normalized names.

pub mod matcher;
pub mod normalize;

pub use matcher::{matches, matches_loosely, similarity, FUZZY_THRESHOLD};
pub use normalize::normalize;
