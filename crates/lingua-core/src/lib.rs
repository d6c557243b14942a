//! lingua-core: content validation, grading, progress and access rules.
//!
//! This crate defines the data model and the lesson-side operations of the
//! learning core. Spaced repetition lives in `lingua-srs`, which builds on the
//! same [`traits::Store`] and [`services::Services`].

pub mod access;
pub mod config;
pub mod content;
pub mod error;
pub mod evaluate;
pub mod grader;
pub mod import;
pub mod lock;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod progress_data;
pub mod schema;
pub mod services;
pub mod statistics;
pub mod traits;

pub use error::{CoreError, Result};
