//! Asset loading/parsers for the walkthrough scene.
//! PLY meshes and 32bpp BMP textures, plus the fixed scene manifest.

pub mod bmp;
pub mod error;
pub mod mesh;
pub mod ply;
pub mod scene;

pub use error::{AssetError, AssetResult};
