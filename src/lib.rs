//! RAW sensor data to DNG conversion.
//!
//! The pipeline lives in [`dng_pipeline`]; [`logger`] wires up `tracing`.

pub mod dng_pipeline;
pub mod logger;
