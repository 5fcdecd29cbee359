//! Reconciler - joins protected-area registries with environmental alerts
//!
//! Produces one row per (year, municipality) observed in the alerts with the
//! number of protected areas created up to that year, the alert area for the
//! year and the municipality's administrative region.
//!
//! `pipeline::run` is the pure core. `sources` and `sink` are the file
//! collaborators around it.

pub mod aggregate;
pub mod cell;
pub mod clean;
pub mod config;
pub mod cumulative;
pub mod error;
pub mod normalize;
pub mod numeric;
pub mod pipeline;
pub mod records;
pub mod region;
pub mod sink;
pub mod sources;

pub use error::{Error, Result};
pub use pipeline::{run, Inputs, PipelineOptions, PipelineOutput};
