use crate::dng_pipeline::common::error::Result;
use crate::dng_pipeline::raw::reader::MetadataSource;
use crate::dng_pipeline::raw::types::SourceMetadata;

/// Metadata source backed by values the caller already holds.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataSource {
    metadata: SourceMetadata,
}

impl StaticMetadataSource {
    pub fn new(metadata: SourceMetadata) -> Self {
        Self { metadata }
    }
}

impl MetadataSource for StaticMetadataSource {
    fn read_metadata(&self) -> Result<SourceMetadata> {
        Ok(self.metadata.clone())
    }
}
