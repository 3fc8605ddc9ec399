pub mod raw_to_dng;
pub mod timing;


pub use raw_to_dng::RawToDngPipeline;
pub use timing::{PipelineTimings, Stage};
