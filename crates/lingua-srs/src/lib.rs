//! lingua-srs: spaced-repetition scheduling for card lessons.
//!
//! [`selector`] builds the working set of cards for a session, [`review`]
//! applies a rating and persists it, and [`planner`] holds the pure interval
//! arithmetic both rely on.

pub mod humanize;
pub mod planner;
pub mod review;
pub mod selector;
pub mod shuffle;

pub use planner::{plan, Intervals};
pub use review::{ReviewInput, ReviewProcessor, ReviewResponse};
pub use selector::{CardSelector, WorkingSet};
