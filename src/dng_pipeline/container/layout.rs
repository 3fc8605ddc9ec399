//! Append-only byte layout for a tag-indexed container.
//!
//! Every data block and directory is appended at the end of the buffer and
//! recorded as an extent, so regions never move once their offset has been
//! handed out. Directories are written after the blocks they reference,
//! which lets offsets be filled in directly instead of patched later.

use tracing::trace;

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::container::directory::Directory;
use crate::dng_pipeline::container::tags::{ExtTag, Tag, TagCode};

pub const TIFF_MAGIC: u16 = 42;
/// Magic used by DNG camera profiles ("RC")
pub const DCP_MAGIC: u16 = 0x4352;

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtentKind {
    Header,
    Directory,
    Value,
    Data,
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: usize,
    len: usize,
    kind: ExtentKind,
}

impl Extent {
    fn end(&self) -> usize {
        self.offset + self.len
    }

    fn contains(&self, offset: usize, len: usize) -> bool {
        offset >= self.offset && offset + len <= self.end()
    }
}

pub struct ContainerLayout {
    buf: Vec<u8>,
    extents: Vec<Extent>,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerLayout {
    pub fn new() -> Self {
        Self::with_magic(TIFF_MAGIC)
    }

    pub fn with_magic(magic: u16) -> Self {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(b"II");
        buf.extend_from_slice(&magic.to_le_bytes());
        // First directory offset, filled in by `finish`
        buf.extend_from_slice(&0u32.to_le_bytes());
        Self {
            buf,
            extents: vec![Extent {
                offset: 0,
                len: HEADER_LEN,
                kind: ExtentKind::Header,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pads to the next word boundary.
    fn align(&mut self) {
        if self.buf.len() % 2 == 1 {
            self.buf.push(0);
        }
    }

    fn to_offset(position: usize) -> Result<u32> {
        u32::try_from(position).map_err(|_| {
            ConversionError::SerializationError(format!("offset {} exceeds the 4 GiB container limit", position))
        })
    }

    fn record(&mut self, offset: usize, len: usize, kind: ExtentKind) {
        trace!("{:?} extent at {} (+{})", kind, offset, len);
        self.extents.push(Extent { offset, len, kind });
    }

    /// Appends an opaque block and returns its offset.
    pub fn write_data(&mut self, bytes: &[u8]) -> Result<u32> {
        self.align();
        let offset = self.buf.len();
        Self::to_offset(offset + bytes.len())?;
        self.buf.extend_from_slice(bytes);
        self.record(offset, bytes.len(), ExtentKind::Data);
        Self::to_offset(offset)
    }

    /// Appends 16-bit samples in the container's byte order.
    pub fn write_samples(&mut self, samples: &[u16]) -> Result<u32> {
        self.align();
        let offset = self.buf.len();
        let len = samples.len() * 2;
        Self::to_offset(offset + len)?;
        self.buf.reserve(len);
        for sample in samples {
            self.buf.extend_from_slice(&sample.to_le_bytes());
        }
        self.record(offset, len, ExtentKind::Data);
        Self::to_offset(offset)
    }

    /// Appends a directory followed by its out-of-line values and returns
    /// the directory offset. The next-directory link is always zero.
    pub fn write_directory(&mut self, dir: &Directory) -> Result<u32> {
        if dir.entry_count() == 0 {
            return Err(ConversionError::SerializationError("empty directory".to_string()));
        }
        self.check_references(dir)?;

        self.align();
        let dir_offset = self.buf.len();
        let dir_len = 2 + ENTRY_LEN * dir.entry_count() + 4;

        let mut table = Vec::with_capacity(dir_len);
        let mut overflow = Vec::new();
        let mut overflow_pos = dir_offset + dir_len;
        let mut values = Vec::new();

        table.extend_from_slice(&(dir.entry_count() as u16).to_le_bytes());
        for (tag, value) in dir.entries() {
            let bytes = value.encode();
            if value.count() as usize * value.element_size() != bytes.len() {
                return Err(ConversionError::SerializationError(format!(
                    "tag {} declares {} elements but encodes {} bytes",
                    tag,
                    value.count(),
                    bytes.len()
                )));
            }
            table.extend_from_slice(&tag.to_le_bytes());
            table.extend_from_slice(&value.field_type().to_le_bytes());
            table.extend_from_slice(&value.count().to_le_bytes());

            if bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                table.extend_from_slice(&inline);
            } else {
                if overflow_pos % 2 == 1 {
                    overflow.push(0);
                    overflow_pos += 1;
                }
                table.extend_from_slice(&Self::to_offset(overflow_pos)?.to_le_bytes());
                values.push((overflow_pos, bytes.len()));
                overflow_pos += bytes.len();
                overflow.extend_from_slice(&bytes);
            }
        }
        table.extend_from_slice(&0u32.to_le_bytes());
        debug_assert_eq!(table.len(), dir_len);

        Self::to_offset(overflow_pos)?;
        self.buf.extend_from_slice(&table);
        self.buf.extend_from_slice(&overflow);
        self.record(dir_offset, dir_len, ExtentKind::Directory);
        for (offset, len) in values {
            self.record(offset, len, ExtentKind::Value);
        }

        Self::to_offset(dir_offset)
    }

    /// Strip and sub-directory offsets must point at blocks already in the layout.
    fn check_references(&self, dir: &Directory) -> Result<()> {
        let offsets = dir.u32s(Tag::StripOffsets).unwrap_or_default();
        let counts = dir.u32s(Tag::StripByteCounts).unwrap_or_default();
        if offsets.len() != counts.len() {
            return Err(ConversionError::SerializationError(format!(
                "{} strip offsets but {} strip byte counts",
                offsets.len(),
                counts.len()
            )));
        }
        for (offset, count) in offsets.iter().zip(&counts) {
            let (offset, count) = (*offset as usize, *count as usize);
            let inside = self
                .extents
                .iter()
                .any(|e| e.kind == ExtentKind::Data && e.contains(offset, count));
            if !inside {
                return Err(ConversionError::SerializationError(format!(
                    "strip at {} (+{}) is not backed by written data",
                    offset, count
                )));
            }
        }

        let children = [ExtTag::SubIfds.code(), ExtTag::ExifIfd.code()];
        for tag in children {
            for offset in dir.u32s(tag).unwrap_or_default() {
                let found = self
                    .extents
                    .iter()
                    .any(|e| e.kind == ExtentKind::Directory && e.offset == offset as usize);
                if !found {
                    return Err(ConversionError::SerializationError(format!(
                        "tag {} points at {} which is not a directory",
                        tag, offset
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks that no two recorded regions overlap and all lie inside the buffer.
    pub fn verify(&self) -> Result<()> {
        let mut extents = self.extents.clone();
        extents.sort_by_key(|e| (e.offset, e.len));
        for pair in extents.windows(2) {
            if pair[0].end() > pair[1].offset {
                return Err(ConversionError::SerializationError(format!(
                    "{:?} at {} (+{}) overlaps {:?} at {}",
                    pair[0].kind, pair[0].offset, pair[0].len, pair[1].kind, pair[1].offset
                )));
            }
        }
        if let Some(last) = extents.last() {
            if last.end() > self.buf.len() {
                return Err(ConversionError::SerializationError(format!(
                    "{:?} at {} runs past the end of the container",
                    last.kind, last.offset
                )));
            }
        }
        Ok(())
    }

    /// Links the first directory into the header and returns the finished bytes.
    pub fn finish(mut self, first_directory: u32) -> Result<Vec<u8>> {
        let is_directory = self
            .extents
            .iter()
            .any(|e| e.kind == ExtentKind::Directory && e.offset == first_directory as usize);
        if !is_directory {
            return Err(ConversionError::SerializationError(format!(
                "first directory offset {} does not name a directory",
                first_directory
            )));
        }
        self.verify()?;
        self.buf[4..HEADER_LEN].copy_from_slice(&first_directory.to_le_bytes());
        Ok(self.buf)
    }
}
