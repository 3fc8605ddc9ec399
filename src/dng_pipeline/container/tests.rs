use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tempfile::tempdir;
use tiff::decoder::{Decoder, DecodingResult};

use super::*;
use crate::dng_pipeline::common::error::ConversionError;
use crate::dng_pipeline::config::{ConversionConfig, StageOneEncoding};
use crate::dng_pipeline::container::tags::{PHOTOMETRIC_CFA, PHOTOMETRIC_LINEAR_RAW};
use crate::dng_pipeline::negative::NegativeBuilder;
use crate::dng_pipeline::negative::types::{ColorMatrix, Negative, Orientation, PixelBuffer};
use crate::dng_pipeline::preview::{Preview, PreviewEncoding, PreviewGenerator};
use crate::dng_pipeline::raw::{SourceMetadata, StaticMetadataSource};
use crate::dng_pipeline::render::{CpuRenderer, ImageRenderer};

fn source_metadata() -> SourceMetadata {
    SourceMetadata {
        make: Some("Sony".to_string()),
        model: Some("ILCE-7M3".to_string()),
        capture_time: Some("2024:08:12 21:04:55".to_string()),
        orientation: Orientation::Rotate90,
        white_balance: Some([2.0, 1.0, 1.25]),
        color_matrix: Some(ColorMatrix([[0.7374, -0.2389, -0.0551], [-0.5435, 1.3162, 0.2519], [-0.1006, 0.1795, 0.6552]])),
        black_level: 512,
        white_level: 16383,
        file_name: Some("DSC01234.ARW".to_string()),
        ..Default::default()
    }
}

fn build(metadata: SourceMetadata, data: Vec<u16>, width: usize, height: usize) -> Negative {
    let source = StaticMetadataSource::new(metadata);
    let pixels = PixelBuffer::mosaic(data, width, height).unwrap();
    NegativeBuilder::new(&source).build_negative(None, pixels, width, height).unwrap()
}

fn ramp(width: usize, height: usize) -> Vec<u16> {
    (0..width * height).map(|i| (512 + i * 13 % 15000) as u16).collect()
}

fn preview(name: &str, width: usize, height: usize, value: u8) -> Preview {
    Preview {
        name: name.to_string(),
        width,
        height,
        orientation: Orientation::Rotate90,
        encoding: PreviewEncoding::Uncompressed,
        data: vec![value; width * height * 3],
    }
}

fn partial_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".partial"))
        .count()
}

#[test]
fn round_trip_recovers_image_metadata_and_previews() {
    let (w, h) = (40, 30);
    let negative = build(source_metadata(), ramp(w, h), w, h);
    let previews = vec![preview("thumbnail", 20, 15, 7), preview("medium", 32, 24, 9)];

    let bytes = DngWriter::new()
        .serialize(&negative, &previews, &ConversionConfig::default())
        .unwrap();
    let contents = read_container(&bytes).unwrap();

    assert_eq!(contents.main_image.width, w);
    assert_eq!(contents.main_image.height, h);
    assert_eq!(contents.main_image.samples_per_pixel, 1);
    assert_eq!(contents.main_image.photometric, PHOTOMETRIC_CFA);
    assert_eq!(contents.main_image.samples, ramp(w, h));

    assert_eq!(contents.dng_version, Some(vec![1, 4, 0, 0]));
    assert_eq!(contents.make.as_deref(), Some("Sony"));
    assert_eq!(contents.model.as_deref(), Some("ILCE-7M3"));
    assert_eq!(contents.unique_camera_model.as_deref(), Some("Sony ILCE-7M3"));
    assert_eq!(contents.date_time.as_deref(), Some("2024:08:12 21:04:55"));
    assert_eq!(contents.date_time_original.as_deref(), Some("2024:08:12 21:04:55"));
    assert_eq!(contents.original_file_name.as_deref(), Some("DSC01234.ARW"));
    assert_eq!(contents.orientation, Some(Orientation::Rotate90));
    assert_eq!(contents.black_level, Some(vec![512]));
    assert_eq!(contents.white_level, Some(vec![16383]));
    assert_eq!(contents.calibration_illuminant, Some(21));

    let matrix = contents.color_matrix.unwrap();
    assert_eq!(matrix.len(), 9);
    assert!((matrix[0] - 0.7374).abs() < 1e-4);
    assert!((matrix[4] - 1.3162).abs() < 1e-4);
    let neutral = contents.as_shot_neutral.unwrap();
    assert!((neutral[0] - 0.5).abs() < 1e-5);
    assert!((neutral[1] - 1.0).abs() < 1e-5);
    assert!((neutral[2] - 0.8).abs() < 1e-5);

    assert_eq!(contents.previews.len(), 2);
    assert_eq!((contents.previews[0].width, contents.previews[0].height), (20, 15));
    assert_eq!((contents.previews[1].width, contents.previews[1].height), (32, 24));
    assert_eq!(contents.previews[0].data, previews[0].data);
    assert_eq!(contents.previews[1].data, previews[1].data);
    assert!(contents.previews.iter().all(|p| p.orientation == Some(Orientation::Rotate90)));
}

#[test]
fn first_directory_is_a_plain_rgb_preview() {
    let negative = build(source_metadata(), ramp(16, 16), 16, 16);
    let previews = vec![preview("thumbnail", 8, 6, 200)];
    let bytes = DngWriter::new()
        .serialize(&negative, &previews, &ConversionConfig::default())
        .unwrap();

    let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (8, 6));
    match decoder.read_image().unwrap() {
        DecodingResult::U8(data) => assert_eq!(data, previews[0].data),
        _ => panic!("expected 8-bit samples"),
    }
}

#[test]
fn without_previews_the_raw_image_is_first() {
    let negative = build(source_metadata(), ramp(12, 10), 12, 10);
    let bytes = DngWriter::new()
        .serialize(&negative, &[], &ConversionConfig::default())
        .unwrap();
    let contents = read_container(&bytes).unwrap();
    assert_eq!(contents.main_image.samples, ramp(12, 10));
    assert!(contents.previews.is_empty());
    assert_eq!(contents.make.as_deref(), Some("Sony"));
}

#[test]
fn small_strips_round_trip() {
    let (w, h) = (24, 30);
    let negative = build(source_metadata(), ramp(w, h), w, h);
    let config = ConversionConfig::builder().rows_per_strip(Some(7)).build();
    let bytes = DngWriter::new().serialize(&negative, &[], &config).unwrap();
    assert_eq!(read_container(&bytes).unwrap().main_image.samples, ramp(w, h));
}

#[test]
fn linearized_stage_one_is_linear_raw() {
    let negative = build(source_metadata(), vec![3000; 8 * 8], 8, 8);
    let config = ConversionConfig::builder()
        .stage_one(StageOneEncoding::Linearized)
        .build();
    let bytes = DngWriter::new().serialize(&negative, &[], &config).unwrap();
    let contents = read_container(&bytes).unwrap();

    assert_eq!(contents.main_image.samples_per_pixel, 3);
    assert_eq!(contents.main_image.photometric, PHOTOMETRIC_LINEAR_RAW);
    assert_eq!(contents.main_image.samples.len(), 8 * 8 * 3);
    assert!(contents.main_image.samples.iter().all(|&v| v == 3000));
    assert_eq!(contents.black_level, Some(vec![512, 512, 512]));
}

#[test]
fn profile_name_is_written_only_when_known() {
    let negative = build(source_metadata(), ramp(4, 4), 4, 4);
    let bytes = DngWriter::new()
        .serialize(&negative, &[], &ConversionConfig::default())
        .unwrap();
    assert_eq!(read_container(&bytes).unwrap().profile_name, None);
}

#[test]
fn serialization_is_deterministic() {
    let negative = build(source_metadata(), ramp(33, 17), 33, 17);
    let previews = vec![preview("thumbnail", 11, 5, 1), preview("medium", 22, 11, 2)];
    let config = ConversionConfig::default();

    let dir = tempdir().unwrap();
    let a = dir.path().join("a.dng");
    let b = dir.path().join("b.dng");
    DngWriter::new().write_container(&negative, &previews, &a, &config).unwrap();
    DngWriter::new().write_container(&negative, &previews, &b, &config).unwrap();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn inconsistent_preview_leaves_previous_file_intact() {
    let negative = build(source_metadata(), ramp(16, 16), 16, 16);
    let mut broken = preview("medium", 8, 8, 3);
    broken.data.truncate(10);
    let previews = vec![preview("thumbnail", 4, 4, 1), broken];

    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.dng");
    fs::write(&dest, b"previous").unwrap();

    let err = DngWriter::new()
        .write_container(&negative, &previews, &dest, &ConversionConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConversionError::SerializationError(_)));
    assert_eq!(fs::read(&dest).unwrap(), b"previous");
    assert_eq!(partial_files(dir.path()), 0);
}

#[test]
fn failure_midway_through_commit_leaves_no_file() {
    let negative = build(source_metadata(), ramp(16, 16), 16, 16);
    let bytes = DngWriter::new()
        .serialize(&negative, &[], &ConversionConfig::default())
        .unwrap();

    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.dng");
    let err = commit_atomically(&dest, |w| {
        w.write_all(&bytes[..bytes.len() / 2])?;
        Err(ConversionError::OutputWriteError("No space left on device".to_string()))
    })
    .unwrap_err();

    assert!(matches!(err, ConversionError::OutputWriteError(_)));
    assert!(!dest.exists());
    assert_eq!(partial_files(dir.path()), 0);
}

#[test]
fn empty_negative_is_not_ready() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.dng");
    let err = DngWriter::new()
        .write_container(&Negative::empty(), &[], &dest, &ConversionConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConversionError::NegativeNotReady));
    assert!(!dest.exists());
}

#[test]
fn zero_buffer_converts_to_zero_image_and_black_previews() {
    let metadata = SourceMetadata {
        color_matrix: Some(ColorMatrix::identity()),
        white_balance: Some([1.0, 1.0, 1.0]),
        ..Default::default()
    };
    let negative = build(metadata, vec![0; 100 * 100], 100, 100);
    let config = ConversionConfig::default();

    let rendered = CpuRenderer::new().render_image(&negative).unwrap();
    let previews = PreviewGenerator::new(config.previews.clone())
        .render_previews(&negative, &rendered)
        .unwrap();

    let dir = tempdir().unwrap();
    let dest = dir.path().join("zeros.dng");
    DngWriter::new().write_container(&negative, &previews, &dest, &config).unwrap();

    let contents = read_container(&fs::read(&dest).unwrap()).unwrap();
    assert_eq!((contents.main_image.width, contents.main_image.height), (100, 100));
    assert!(contents.main_image.samples.iter().all(|&v| v == 0));

    assert_eq!(contents.previews.len(), 2);
    let thumbnail = &contents.previews[0];
    assert_eq!((thumbnail.width, thumbnail.height), (100, 100));
    assert!(thumbnail.data.iter().all(|&v| v == 0));

    let medium = &contents.previews[1];
    assert_eq!((medium.width, medium.height), (100, 100));
    let decoded = image::load_from_memory_with_format(&medium.data, image::ImageFormat::Jpeg)
        .unwrap()
        .to_rgb8();
    assert_eq!(decoded.dimensions(), (100, 100));
    assert!(decoded.as_raw().iter().all(|&v| v <= 1));
}

#[test]
fn strings_with_embedded_nul_keep_offsets_valid() {
    let mut metadata = source_metadata();
    metadata.make = Some("ab\0cdefgh".to_string());
    let negative = build(metadata, ramp(8, 6), 8, 6);
    let config = ConversionConfig::builder().software("x\0\0\0\0\0").build();

    let bytes = DngWriter::new()
        .serialize(&negative, &[preview("thumbnail", 8, 6, 3)], &config)
        .unwrap();
    let contents = read_container(&bytes).unwrap();

    assert_eq!(contents.make.as_deref(), Some("ab"));
    assert_eq!(contents.software.as_deref(), Some("x"));
    assert_eq!(contents.main_image.samples, ramp(8, 6));
}
