//! Stream descriptions and the stream table byte layout.
//!
//! The endpoint hands out the current stream set as a flat byte buffer:
//!
//! ```text
//! header  : u32 stream_count, u32 record_size          (8 bytes, little-endian)
//! records : stream_count × RawStreamDescription        (record_size bytes each)
//! ```
//!
//! Records are read unaligned; the buffer comes from the endpoint and carries no
//! alignment guarantee.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::error::DecodeError;

/// Size of the stream table header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Maximum encoded name length, including the NUL terminator.
pub const NAME_CAPACITY: usize = 64;

/// Opaque stream identifier issued by the endpoint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StreamHandle(pub u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Pixel format requested for a stream's render target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Bgra8,
    Bgra8Srgb,
    Rgba8,
    Rgba8Srgb,
    Rgba16Float,
    Rgba32Float,
    /// A code this client does not know. Provisioning such a stream fails.
    Unknown(u32),
}

impl PixelFormat {
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => PixelFormat::Bgra8,
            2 => PixelFormat::Bgra8Srgb,
            3 => PixelFormat::Rgba8,
            4 => PixelFormat::Rgba8Srgb,
            5 => PixelFormat::Rgba16Float,
            6 => PixelFormat::Rgba32Float,
            other => PixelFormat::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            PixelFormat::Bgra8 => 1,
            PixelFormat::Bgra8Srgb => 2,
            PixelFormat::Rgba8 => 3,
            PixelFormat::Rgba8Srgb => 4,
            PixelFormat::Rgba16Float => 5,
            PixelFormat::Rgba32Float => 6,
            PixelFormat::Unknown(code) => code,
        }
    }

    /// Bytes per pixel, or `None` for unknown formats.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::Bgra8
            | PixelFormat::Bgra8Srgb
            | PixelFormat::Rgba8
            | PixelFormat::Rgba8Srgb => Some(4),
            PixelFormat::Rgba16Float => Some(8),
            PixelFormat::Rgba32Float => Some(16),
            PixelFormat::Unknown(_) => None,
        }
    }
}

/// One requested render target for the current epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub handle: StreamHandle,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Fixed-layout record as it appears in the stream table.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct RawStreamDescription {
    pub handle: u64,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub _reserved: u32,
    /// UTF-8, NUL padded.
    pub name: [u8; NAME_CAPACITY],
}

/// Size of one encoded stream record in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<RawStreamDescription>();

impl RawStreamDescription {
    fn to_description(self) -> StreamDescription {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NAME_CAPACITY);

        StreamDescription {
            handle: StreamHandle(self.handle),
            name: String::from_utf8_lossy(&self.name[..len]).into_owned(),
            width: self.width,
            height: self.height,
            format: PixelFormat::from_raw(self.format),
        }
    }

    fn from_description(d: &StreamDescription) -> Self {
        let mut name = [0u8; NAME_CAPACITY];
        // Leave room for the terminator; truncate on a char boundary.
        let mut end = d.name.len().min(NAME_CAPACITY - 1);
        while !d.name.is_char_boundary(end) {
            end -= 1;
        }
        name[..end].copy_from_slice(&d.name.as_bytes()[..end]);

        Self {
            handle: d.handle.0,
            width: d.width,
            height: d.height,
            format: d.format.as_raw(),
            _reserved: 0,
            name,
        }
    }
}

/// Ordered stream descriptions for one epoch.
///
/// The position of a description is its index into the parallel resource list
/// held by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSet {
    streams: Vec<StreamDescription>,
}

impl StreamSet {
    pub fn new(streams: Vec<StreamDescription>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamDescription> {
        self.streams.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StreamDescription> {
        self.streams.iter()
    }

    pub fn position(&self, handle: StreamHandle) -> Option<usize> {
        self.streams.iter().position(|s| s.handle == handle)
    }

    pub fn contains(&self, handle: StreamHandle) -> bool {
        self.position(handle).is_some()
    }

    /// Number of bytes [`encode`](Self::encode) produces for this set.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.streams.len() * RECORD_SIZE
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&(self.streams.len() as u32).to_le_bytes());
        out.extend_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
        for s in &self.streams {
            out.extend_from_slice(bytemuck::bytes_of(&RawStreamDescription::from_description(s)));
        }
        out
    }

    /// Decodes a stream table.
    ///
    /// Trailing bytes past the last record are ignored; a buffer shorter than
    /// the header claims is an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::new(
                format!("buffer of {} bytes is shorter than the header", bytes.len()),
                0,
            ));
        }

        let count = read_u32(bytes, 0) as usize;
        let record_size = read_u32(bytes, 4) as usize;

        if count > 0 && record_size != RECORD_SIZE {
            return Err(DecodeError::new(
                format!("record size {record_size} does not match expected {RECORD_SIZE}"),
                4,
            ));
        }

        let required = count
            .checked_mul(RECORD_SIZE)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| DecodeError::new(format!("stream count {count} overflows"), 0))?;

        if bytes.len() < required {
            return Err(DecodeError::new(
                format!("{count} streams need {required} bytes, buffer holds {}", bytes.len()),
                bytes.len(),
            ));
        }

        let streams = bytes[HEADER_SIZE..required]
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| bytemuck::pod_read_unaligned::<RawStreamDescription>(chunk).to_description())
            .collect();

        Ok(Self { streams })
    }
}

impl<'a> IntoIterator for &'a StreamSet {
    type Item = &'a StreamDescription;
    type IntoIter = std::slice::Iter<'a, StreamDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.iter()
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}
