//! Loader for uncompressed 32bpp BMP textures.
//!
//! Pixels are returned exactly as stored: BGRA byte order, bottom-up rows.
//! The GPU upload is expected to use a BGRA format and the meshes' UVs
//! already account for the row order.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use image::{ImageBuffer, Rgba, imageops};

use crate::error::{AssetError, AssetResult};

/// Size of the BITMAPFILEHEADER + BITMAPINFOHEADER block.
pub const HEADER_SIZE: usize = 54;
pub const BYTES_PER_PIXEL: usize = 4;

const SIGNATURE: [u8; 2] = *b"BM";
const DATA_OFFSET_AT: usize = 0x0A;
const WIDTH_AT: usize = 0x12;
const HEIGHT_AT: usize = 0x16;
const BITS_PER_PIXEL_AT: usize = 0x1C;
const IMAGE_SIZE_AT: usize = 0x22;

/// Largest width or height accepted, matching wgpu's default 2D texture limit.
pub const MAX_DIMENSION: u32 = 8192;
const MAX_IMAGE_BYTES: usize = MAX_DIMENSION as usize * MAX_DIMENSION as usize * BYTES_PER_PIXEL;
const READ_CHUNK: usize = 1 << 20;

/// Raw texel data in BGRA order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    pub fn new_bgra8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Single opaque black texel. Stands in for a texture that failed to load.
    pub fn placeholder() -> Self {
        Self::new_bgra8(1, 1, vec![0, 0, 0, 255])
    }

    /// Bytes a tightly packed buffer of these dimensions should hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Number of levels in a full mip chain for this size, base level included.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Downsampled levels 1.. of the mip chain (the base level is `self`).
    ///
    /// Each level is a triangle-filtered (bilinear) resize of the previous one.
    /// Channel order is preserved; the filter treats all four bytes alike.
    pub fn mip_chain(&self) -> Vec<PixelBuffer> {
        if !self.is_valid() {
            return Vec::new();
        }
        let Some(mut current) =
            ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(self.width, self.height, self.data.clone())
        else {
            return Vec::new();
        };

        let mut levels = Vec::with_capacity(self.mip_level_count() as usize - 1);
        while current.width() > 1 || current.height() > 1 {
            let width = (current.width() / 2).max(1);
            let height = (current.height() / 2).max(1);
            current = imageops::resize(&current, width, height, imageops::FilterType::Triangle);
            levels.push(PixelBuffer::new_bgra8(width, height, current.as_raw().clone()));
        }
        levels
    }
}

/// Load a 32bpp BMP from disk. Failures are logged and returned.
pub fn load_bmp(path: impl AsRef<Path>) -> AssetResult<PixelBuffer> {
    let path = path.as_ref();
    let result = File::open(path)
        .map_err(|source| AssetError::Open {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|file| load_bmp_from_reader(BufReader::new(file)));

    match &result {
        Ok(pixels) => log::info!(
            "Loaded BMP {:?}: {}x{} ({} bytes)",
            path,
            pixels.width,
            pixels.height,
            pixels.data.len()
        ),
        Err(err) => log::error!("{:?}: {err}", path),
    }
    result
}

/// Load a 32bpp BMP from any seekable reader positioned at the file start.
pub fn load_bmp_from_reader<R: Read + Seek>(mut reader: R) -> AssetResult<PixelBuffer> {
    let mut header = [0u8; HEADER_SIZE];
    let got = read_up_to(&mut reader, &mut header)?;
    if got != HEADER_SIZE {
        return Err(AssetError::TruncatedBmpHeader {
            expected: HEADER_SIZE,
        });
    }

    let signature = [header[0], header[1]];
    if signature != SIGNATURE {
        return Err(AssetError::NotABitmap(signature));
    }

    let bits_per_pixel = u16_at(&header, BITS_PER_PIXEL_AT);
    if bits_per_pixel != 32 {
        return Err(AssetError::UnsupportedBitDepth(bits_per_pixel));
    }

    let width = u32_at(&header, WIDTH_AT);
    let height = u32_at(&header, HEIGHT_AT);
    let mut data_offset = u32_at(&header, DATA_OFFSET_AT) as u64;
    let mut image_size = u32_at(&header, IMAGE_SIZE_AT) as usize;

    if width > MAX_DIMENSION || height > MAX_DIMENSION || image_size > MAX_IMAGE_BYTES {
        return Err(AssetError::BitmapTooLarge { width, height });
    }
    if image_size == 0 {
        image_size = width as usize * height as usize * BYTES_PER_PIXEL;
    }
    if data_offset == 0 {
        data_offset = HEADER_SIZE as u64;
    }
    if data_offset != HEADER_SIZE as u64 {
        reader.seek(SeekFrom::Start(data_offset))?;
    }

    // Grow with the data actually present; only the short tail is zero-filled.
    let mut data = Vec::with_capacity(image_size.min(READ_CHUNK));
    let read = reader.take(image_size as u64).read_to_end(&mut data)?;
    if read < image_size {
        log::warn!("BMP pixel data short: read {read} of {image_size} bytes");
        data.resize(image_size, 0);
    }

    Ok(PixelBuffer::new_bgra8(width, height, data))
}

/// Like `read_exact`, but a short read returns the count instead of failing.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> AssetResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn u16_at(header: &[u8; HEADER_SIZE], at: usize) -> u16 {
    u16::from_le_bytes([header[at], header[at + 1]])
}

fn u32_at(header: &[u8; HEADER_SIZE], at: usize) -> u32 {
    u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
}
