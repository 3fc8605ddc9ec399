use crate::dng_pipeline::common::error::Result;
use crate::dng_pipeline::raw::types::SourceMetadata;

/// Supplies camera metadata for a raw capture. Implementations never mutate the source.
pub trait MetadataSource {
    fn read_metadata(&self) -> Result<SourceMetadata>;
}
