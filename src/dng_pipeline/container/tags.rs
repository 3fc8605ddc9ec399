//! Tag identifiers used in the DNG container.
//!
//! Baseline TIFF tags come from the `tiff` crate; DNG, EXIF and the TIFF
//! extension tags it does not name are declared here.

pub use tiff::tags::Tag;

/// Anything that identifies a directory entry.
pub trait TagCode {
    fn code(&self) -> u16;
}

impl TagCode for Tag {
    fn code(&self) -> u16 {
        self.to_u16()
    }
}

impl TagCode for u16 {
    fn code(&self) -> u16 {
        *self
    }
}

/// TIFF extension and EXIF tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ExtTag {
    NewSubFileType = 254,
    Orientation = 274,
    SubIfds = 330,
    CfaRepeatPatternDim = 33421,
    CfaPattern = 33422,
    ExifIfd = 34665,
    ExifVersion = 36864,
    DateTimeOriginal = 36867,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DngTag {
    DngVersion = 50706,
    DngBackwardVersion = 50707,
    UniqueCameraModel = 50708,
    CfaPlaneColor = 50710,
    CfaLayout = 50711,
    BlackLevelRepeatDim = 50713,
    BlackLevel = 50714,
    WhiteLevel = 50717,
    ColorMatrix1 = 50721,
    AsShotNeutral = 50728,
    CalibrationIlluminant1 = 50778,
    OriginalRawFileName = 50827,
    ProfileName = 50936,
    PreviewColorSpace = 50970,
}

impl TagCode for ExtTag {
    fn code(&self) -> u16 {
        *self as u16
    }
}

impl TagCode for DngTag {
    fn code(&self) -> u16 {
        *self as u16
    }
}

pub const DNG_VERSION_V1_4: [u8; 4] = [1, 4, 0, 0];
pub const DNG_BACKWARD_VERSION_V1_1: [u8; 4] = [1, 1, 0, 0];

/// NewSubFileType values
pub const SUBFILE_MAIN_IMAGE: u32 = 0;
pub const SUBFILE_PREVIEW: u32 = 1;

/// PhotometricInterpretation values defined by DNG
pub const PHOTOMETRIC_CFA: u16 = 32803;
pub const PHOTOMETRIC_LINEAR_RAW: u16 = 34892;

pub const PREVIEW_COLOR_SPACE_SRGB: u32 = 2;

pub const EXIF_VERSION_2_3: [u8; 4] = *b"0230";
