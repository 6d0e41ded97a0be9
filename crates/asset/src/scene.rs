//! Fixed asset manifest for the Links House walkthrough.

use std::path::{Path, PathBuf};

/// Directory the manifest paths are relative to unless overridden.
pub const DEFAULT_ASSET_ROOT: &str = "./LinksHouse";

/// Which pass an asset is drawn in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPass {
    Opaque,
    /// Drawn after every opaque asset with alpha blending enabled.
    Blended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneEntry {
    pub name: &'static str,
    pub mesh: &'static str,
    pub texture: &'static str,
    pub pass: DrawPass,
}

impl SceneEntry {
    const fn new(name: &'static str, mesh: &'static str, texture: &'static str, pass: DrawPass) -> Self {
        Self {
            name,
            mesh,
            texture,
            pass,
        }
    }

    pub fn mesh_path(&self, root: &Path) -> PathBuf {
        root.join(self.mesh)
    }

    pub fn texture_path(&self, root: &Path) -> PathBuf {
        root.join(self.texture)
    }
}

/// Scene in draw order. Glass, curtains and metal go last, blended.
pub const LINKS_HOUSE: [SceneEntry; 10] = [
    SceneEntry::new("Floor", "Floor.ply", "floor.bmp", DrawPass::Opaque),
    SceneEntry::new("Patio", "Patio.ply", "patio.bmp", DrawPass::Opaque),
    SceneEntry::new("Table", "Table.ply", "table.bmp", DrawPass::Opaque),
    SceneEntry::new("Walls", "Walls.ply", "walls.bmp", DrawPass::Opaque),
    SceneEntry::new("WindowBG", "WindowBG.ply", "windowbg.bmp", DrawPass::Opaque),
    SceneEntry::new("WoodObjects", "WoodObjects.ply", "woodobjects.bmp", DrawPass::Opaque),
    SceneEntry::new("Bottles", "Bottles.ply", "bottles.bmp", DrawPass::Opaque),
    SceneEntry::new("DoorBG", "DoorBG.ply", "doorbg.bmp", DrawPass::Blended),
    SceneEntry::new("Curtains", "Curtains.ply", "curtains.bmp", DrawPass::Blended),
    SceneEntry::new("MetalObjects", "MetalObjects.ply", "metalobjects.bmp", DrawPass::Blended),
];
