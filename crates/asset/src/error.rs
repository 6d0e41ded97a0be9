//! Loader errors shared by the PLY and BMP readers.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read asset data: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed PLY line {line}: {reason}")]
    MalformedPly { line: usize, reason: String },
    #[error("Not a valid BMP file: header shorter than {expected} bytes")]
    TruncatedBmpHeader { expected: usize },
    #[error("File is not a BMP file: signature {0:?}")]
    NotABitmap([u8; 2]),
    #[error("BMP file is not 32bpp: found {0} bits per pixel")]
    UnsupportedBitDepth(u16),
    #[error("BMP {width}x{height} exceeds the supported texture size")]
    BitmapTooLarge { width: u32, height: u32 },
}

pub type AssetResult<T> = Result<T, AssetError>;
