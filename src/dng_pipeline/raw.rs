//! RAW source module
//!
//! This module provides the metadata-source collaborator that feeds the negative
//! builder, a rawloader-backed implementation, and multi-frame stacking.

mod reader;
mod rawloader_reader;
mod static_source;
pub mod stack;
pub mod types;

pub use reader::MetadataSource;
pub use rawloader_reader::RawLoaderSource;
pub use static_source::StaticMetadataSource;
pub use stack::{CometMode, StackMode, stack_frames};
pub use types::SourceMetadata;
