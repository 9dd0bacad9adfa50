//! Point pattern analysis of cell distributions across a collection of
//! tissue samples: intensities, kernel density fields, a heteroscedastic
//! group-level model and a pooled cross-pattern point-process regression.

pub mod cli;
pub mod config;
pub mod ctx;
pub mod error;
pub mod io;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod simulate;
pub mod spatial;
pub mod table;

pub use error::PpaError;
