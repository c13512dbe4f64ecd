use std::io::Write;

use jsolex_core::color::converter::convert_frame;
use jsolex_core::color::debayer::DebayerMethod;
use jsolex_core::frame::ColorMode;
use jsolex_core::io::ser::{SerCursor, SerReader};

const SER_HEADER_SIZE: usize = 178;

/// Build a minimal synthetic SER file in memory, the same shape the real
/// format uses (§6): magic, little-endian header fields, then raw frame
/// bytes back to back with no trailer.
fn build_synthetic_ser(width: u32, height: u32, bit_depth: u32, color_id: i32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"LUCAM-RECORDER");
    buf.extend_from_slice(&0i32.to_le_bytes()); // LuID
    buf.extend_from_slice(&color_id.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes()); // LittleEndian flag: 0 == little-endian
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(frames.len() as i32).to_le_bytes());

    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    buf.extend_from_slice(&[0u8; 40]); // instrument
    let mut telescope = [0u8; 40];
    telescope[..7].copy_from_slice(b"MyScope");
    buf.extend_from_slice(&telescope);
    buf.extend_from_slice(&0u64.to_le_bytes()); // DateTime
    buf.extend_from_slice(&0u64.to_le_bytes()); // DateTimeUTC

    assert_eq!(buf.len(), SER_HEADER_SIZE);

    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

#[test]
fn parses_8bit_mono_header_and_decodes_a_frame() {
    let frame_data: Vec<u8> = (0u8..12).collect();
    let ser_data = build_synthetic_ser(4, 3, 8, 0, &[frame_data]);
    let file = write_temp(&ser_data);

    let reader = SerReader::open(file.path()).unwrap();
    assert_eq!(reader.frame_count(), 1);
    assert_eq!(reader.header.width, 4);
    assert_eq!(reader.header.height, 3);
    assert_eq!(reader.header.color_mode(), ColorMode::Mono);
    assert_eq!(reader.header.observer, "Test");
    assert_eq!(reader.header.telescope, "MyScope");

    let raw = reader.frame_raw(0).unwrap();
    let decoded = convert_frame(
        &jsolex_core::frame::RawFrame { index: 0, geometry: reader.geometry(), bytes: raw.to_vec() },
        8,
        &DebayerMethod::Bilinear,
    )
    .unwrap();
    assert_eq!(decoded.width(), 4);
    assert_eq!(decoded.height(), 3);
    assert!((decoded.data[[0, 0]] - 0.0).abs() < 1e-3);
    assert!((decoded.data[[2, 3]] - 11.0 / 255.0 * 65_535.0).abs() < 1.0);
}

#[test]
fn parses_16bit_mono_samples_to_full_range() {
    let values: [u16; 4] = [0, 1000, 32767, 65535];
    let mut frame_data = Vec::new();
    for v in &values {
        frame_data.extend_from_slice(&v.to_le_bytes());
    }
    let ser_data = build_synthetic_ser(2, 2, 16, 0, &[frame_data]);
    let file = write_temp(&ser_data);

    let reader = SerReader::open(file.path()).unwrap();
    let raw = reader.frame_raw(0).unwrap().to_vec();
    let decoded = convert_frame(
        &jsolex_core::frame::RawFrame { index: 0, geometry: reader.geometry(), bytes: raw },
        16,
        &DebayerMethod::Bilinear,
    )
    .unwrap();

    assert!((decoded.data[[0, 0]] - 0.0).abs() < 1e-3);
    assert!((decoded.data[[1, 1]] - 65_535.0).abs() < 1e-3);
}

#[test]
fn cursor_advances_sequentially_and_stops_at_end() {
    let frame1: Vec<u8> = vec![0, 50, 100, 200];
    let frame2: Vec<u8> = vec![255, 200, 100, 50];
    let ser_data = build_synthetic_ser(2, 2, 8, 0, &[frame1, frame2]);
    let file = write_temp(&ser_data);

    let mut cursor = SerCursor::open(file.path()).unwrap();
    assert_eq!(cursor.frame_count(), 2);

    let first = cursor.next_frame().unwrap().unwrap();
    assert_eq!(first.index, 0);
    let second = cursor.next_frame().unwrap().unwrap();
    assert_eq!(second.index, 1);
    assert!(cursor.next_frame().unwrap().is_none());
}

#[test]
fn rejects_a_file_missing_the_lucam_recorder_magic() {
    let mut bytes = vec![0u8; SER_HEADER_SIZE + 16];
    bytes[0..4].copy_from_slice(b"NOPE");
    let file = write_temp(&bytes);
    assert!(SerReader::open(file.path()).is_err());
}

#[test]
fn bayer_color_id_decodes_through_the_debayer_converter() {
    // 4x4 RGGB mosaic, 8-bit, uniform mid-gray so the demosaic result should
    // also be uniform away from the zero borders.
    let frame_data = vec![128u8; 16];
    let ser_data = build_synthetic_ser(4, 4, 8, 8, &[frame_data]);
    let file = write_temp(&ser_data);

    let reader = SerReader::open(file.path()).unwrap();
    assert_eq!(reader.header.color_mode(), ColorMode::BayerRggb);

    let raw = reader.frame_raw(0).unwrap().to_vec();
    let decoded = convert_frame(
        &jsolex_core::frame::RawFrame { index: 0, geometry: reader.geometry(), bytes: raw },
        8,
        &DebayerMethod::Bilinear,
    )
    .unwrap();
    assert_eq!(decoded.width(), 4);
    assert_eq!(decoded.height(), 4);
}
