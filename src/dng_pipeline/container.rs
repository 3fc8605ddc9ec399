//! Container module
//!
//! Serializes negatives and previews into the tag-indexed DNG layout,
//! commits them atomically, and reads them back.

pub mod atomic;
pub mod directory;
pub mod layout;
pub mod reader;
pub mod tags;
mod writer;

#[cfg(test)]
mod tests;

pub use atomic::commit_atomically;
pub use reader::{ContainerContents, EmbeddedPreview, MainImage, read_container};
pub use writer::{ContainerWriter, DngWriter};
