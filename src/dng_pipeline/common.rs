//! Common utilities module
//!
//! This module contains the error taxonomy and process-wide state shared across the pipeline.

pub mod error;
pub mod runtime;

pub use error::{ConversionError, ErrorKind, Result};
