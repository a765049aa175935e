//! Data layer for the DreamViews timecourse.
//!
//! Responsible for reading the posts table, classifying monthly user
//! activity, aggregating the monthly series and writing the output tables.

pub mod aggregator;
pub mod analysis;
pub mod export;
pub mod novelty;
pub mod reader;

pub use timecourse_core as core;
