//! Scene: the fixed list of textured assets and their draw order.

use std::path::Path;
use std::sync::Arc;

use glam::Mat4;
use wgpu::{Device, Queue, RenderPass};

use asset::scene::{DrawPass, SceneEntry};

use crate::pipeline::TexturedPipeline;
use crate::textured::TexturedAsset;

pub struct Scene {
    assets: Vec<(DrawPass, TexturedAsset)>,
}

impl Scene {
    /// Load every manifest entry, in order, relative to `root`.
    pub fn load(
        device: &Device,
        queue: &Queue,
        pipeline: &Arc<TexturedPipeline>,
        root: &Path,
        manifest: &[SceneEntry],
    ) -> Self {
        let assets = manifest
            .iter()
            .map(|entry| {
                let asset = TexturedAsset::load(
                    device,
                    queue,
                    Arc::clone(pipeline),
                    &entry.mesh_path(root),
                    &entry.texture_path(root),
                );
                (entry.pass, asset)
            })
            .collect::<Vec<_>>();

        let empty = assets.iter().filter(|(_, a)| a.index_count() == 0).count();
        log::info!(
            "Scene loaded from {:?}: {} assets ({} empty)",
            root,
            assets.len(),
            empty
        );
        Self { assets }
    }

    /// Draw opaque assets, then blended ones, each group in manifest order.
    /// `mvp` is projection * view; every model matrix is identity.
    pub fn draw(&self, queue: &Queue, rpass: &mut RenderPass<'_>, mvp: Mat4) {
        for (pass, asset) in draw_order(&self.assets) {
            asset.draw(queue, rpass, mvp, pass);
        }
    }
}

/// Opaque items first, then blended, keeping relative order within each pass.
fn draw_order<T>(items: &[(DrawPass, T)]) -> impl Iterator<Item = (DrawPass, &T)> {
    [DrawPass::Opaque, DrawPass::Blended]
        .into_iter()
        .flat_map(move |pass| {
            items
                .iter()
                .filter(move |(p, _)| *p == pass)
                .map(move |(_, item)| (pass, item))
        })
}
