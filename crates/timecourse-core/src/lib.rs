//! Domain types, configuration and errors for the DreamViews timecourse.
//!
//! Everything here is I/O free apart from reading the optional JSON config
//! file; loading the posts table and aggregating it live in `timecourse-data`.

pub mod error;
pub mod models;
pub mod month;
pub mod settings;

pub use error::{Result, TimecourseError};
