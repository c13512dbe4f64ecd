use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;

use crate::error::{JSolexError, Result};
use crate::frame::{ColorMode, Geometry, RawFrame, SourceInfo};

const SER_HEADER_SIZE: usize = 178;
const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";
const TIMESTAMP_SIZE: usize = 8;

/// SER v3 file header, as laid out in §6 (little-endian throughout).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.color_id {
            0 => ColorMode::Mono,
            8 => ColorMode::BayerRggb,
            9 => ColorMode::BayerGrbg,
            10 => ColorMode::BayerGbrg,
            11 => ColorMode::BayerBggr,
            // 101 (BGR) has no distinct spec color mode; treat as RGB with
            // channels swapped at the converter, not at the geometry level.
            100 | 101 => ColorMode::Rgb,
            _ => ColorMode::Mono,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width as usize,
            height: self.height as usize,
            bytes_per_pixel: self.bytes_per_pixel_plane() * self.planes_per_pixel(),
            color_mode: self.color_mode(),
        }
    }
}

/// Memory-mapped, random-access view of a SER file's frame data.
///
/// This is the substrate the sequential [`SerCursor`] (§4.1) is built on:
/// mapping the file lets every frame be addressed without re-reading from
/// disk, while the cursor on top enforces the single-owner, advance-only
/// access pattern the reconstruction pipeline requires.
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(JSolexError::InvalidSer(
                "file too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(JSolexError::InvalidSer(
                "missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;

        let expected_data_size =
            SER_HEADER_SIZE + header.geometry().frame_byte_size() * header.frame_count as usize;
        if mmap.len() < expected_data_size {
            return Err(JSolexError::InvalidSer(format!(
                "file truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    pub fn geometry(&self) -> Geometry {
        self.header.geometry()
    }

    /// Raw bytes for a single frame (zero-copy from the mapping).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(JSolexError::FrameIndexOutOfRange {
                index,
                total: count,
            });
        }
        let frame_size = self.geometry().frame_byte_size();
        let offset = SER_HEADER_SIZE + index * frame_size;
        Ok(&self.mmap[offset..offset + frame_size])
    }

    /// Per-frame timestamp from the optional trailer following the frame data.
    pub fn timestamp(&self, index: usize) -> Option<u64> {
        let frame_size = self.geometry().frame_byte_size();
        let trailer_offset = SER_HEADER_SIZE + frame_size * self.frame_count();
        let ts_offset = trailer_offset + index * TIMESTAMP_SIZE;
        if ts_offset + TIMESTAMP_SIZE <= self.mmap.len() {
            let bytes = &self.mmap[ts_offset..ts_offset + TIMESTAMP_SIZE];
            Some(u64::from_le_bytes(bytes.try_into().ok()?))
        } else {
            None
        }
    }

    pub fn source_info(&self, path: &Path) -> SourceInfo {
        SourceInfo {
            filename: path.to_path_buf(),
            total_frames: self.frame_count(),
            width: self.header.width,
            height: self.header.height,
            bit_depth: self.header.pixel_depth as u8,
            color_mode: self.header.color_mode(),
            observer: non_empty(&self.header.observer),
            telescope: non_empty(&self.header.telescope),
            instrument: non_empty(&self.header.instrument),
        }
    }
}

/// Sequential, single-owner reader over a SER file (§4.1).
///
/// Owns an exclusive position cursor. The core guarantees at most one active
/// `SerCursor` per file; a parallel consumer must copy `current_frame_bytes`
/// into a task-owned buffer before calling `next_frame` again, since the
/// returned slice borrows the cursor's position, not the frame.
pub struct SerCursor {
    reader: SerReader,
    path: PathBuf,
    position: usize,
}

impl SerCursor {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = SerReader::open(path)?;
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            position: 0,
        })
    }

    pub fn header(&self) -> &SerHeader {
        &self.reader.header
    }

    pub fn geometry(&self) -> Geometry {
        self.reader.geometry()
    }

    pub fn frame_count(&self) -> usize {
        self.reader.frame_count()
    }

    pub fn source_info(&self) -> SourceInfo {
        self.reader.source_info(&self.path)
    }

    /// Move the cursor to `index` without reading. `index` may equal
    /// `frame_count()` to park the cursor past the end.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index > self.frame_count() {
            return Err(JSolexError::FrameIndexOutOfRange {
                index,
                total: self.frame_count(),
            });
        }
        self.position = index;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Advance the cursor and return the new current frame, or `None` at
    /// end of stream.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.position >= self.frame_count() {
            return Ok(None);
        }
        let index = self.position;
        let bytes = self.reader.frame_raw(index)?.to_vec();
        self.position += 1;
        Ok(Some(RawFrame {
            index,
            geometry: self.geometry(),
            bytes,
        }))
    }

    /// Raw bytes of the frame at the current position (before `next_frame`
    /// advances past it), without copying.
    pub fn current_frame_bytes(&self) -> Result<&[u8]> {
        self.reader.frame_raw(self.position)
    }

    /// Estimated capture frame rate derived from the timestamp trailer, if
    /// present and monotonic over at least two frames.
    pub fn estimate_fps(&self) -> Option<f64> {
        let count = self.frame_count();
        if count < 2 {
            return None;
        }
        let first = self.reader.timestamp(0)?;
        let last = self.reader.timestamp(count - 1)?;
        if last <= first {
            return None;
        }
        // SER timestamps are in 100ns ticks since 0001-01-01 (.NET DateTime).
        let elapsed_seconds = (last - first) as f64 / 10_000_000.0;
        if elapsed_seconds <= 0.0 {
            return None;
        }
        Some((count - 1) as f64 / elapsed_seconds)
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()? as u32;
    let height = cursor.read_i32::<LittleEndian>()? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>()? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>()? as u32;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(JSolexError::InvalidDimensions { width, height });
    }

    // SER spec: LittleEndian field = 0 means big-endian pixel data, but many
    // writers (including FireCapture) use 0 for little-endian. Follow
    // Siril's convention: treat 0 as little-endian.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}
