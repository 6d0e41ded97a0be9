//! One mesh + one texture, uploaded once and drawn every frame.

use std::path::Path;
use std::sync::Arc;

use glam::Mat4;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindingResource, Buffer, BufferUsages, Device,
    Extent3d, IndexFormat, Origin3d, Queue, RenderPass, TexelCopyBufferLayout,
    TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureUsages, TextureViewDescriptor, util::DeviceExt,
};

use asset::{
    bmp::{self, BYTES_PER_PIXEL, PixelBuffer},
    mesh::MeshDescription,
    ply,
    scene::DrawPass,
};

use crate::pipeline::{TEXTURE_FORMAT, TexturedPipeline, TransformUniform};

pub struct TexturedAsset {
    label: String,
    pipeline: Arc<TexturedPipeline>,
    position_buf: Buffer,
    tex_coord_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,
    transform_buf: Buffer,
    bind_group: BindGroup,
    #[allow(dead_code)]
    texture: Texture,
}

impl TexturedAsset {
    /// Parse `mesh_path`, load `texture_path` and upload both.
    ///
    /// Missing or broken files never fail construction: a bad mesh draws
    /// nothing, a bad texture samples opaque black.
    pub fn load(
        device: &Device,
        queue: &Queue,
        pipeline: Arc<TexturedPipeline>,
        mesh_path: &Path,
        texture_path: &Path,
    ) -> Self {
        let mesh = ply::read_ply(mesh_path);
        let pixels = bmp::load_bmp(texture_path).unwrap_or_else(|_| PixelBuffer::placeholder());
        let label = mesh_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| mesh_path.display().to_string());
        Self::from_parts(device, queue, pipeline, &label, &mesh, pixels)
    }

    /// Upload already-loaded data. `pixels` is dropped once it is on the GPU.
    pub fn from_parts(
        device: &Device,
        queue: &Queue,
        pipeline: Arc<TexturedPipeline>,
        label: &str,
        mesh: &MeshDescription,
        pixels: PixelBuffer,
    ) -> Self {
        let positions = mesh.positions();
        let tex_coords = mesh.tex_coords();
        let indices = mesh.indices();
        // Faces without vertices (or the reverse) have nothing to bind.
        let index_count = if mesh.is_empty() {
            0
        } else {
            indices.len() as u32
        };

        let position_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Positions")),
            contents: bytemuck::cast_slice(&positions),
            usage: BufferUsages::VERTEX,
        });
        let tex_coord_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} TexCoords")),
            contents: bytemuck::cast_slice(&tex_coords),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} IB")),
            contents: bytemuck::cast_slice(&indices),
            usage: BufferUsages::INDEX,
        });

        let transform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Transform UBO")),
            contents: bytemuck::bytes_of(&TransformUniform {
                mvp: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let pixels = uploadable(label, pixels, device.limits().max_texture_dimension_2d);
        let texture = upload_texture(device, queue, label, &pixels);
        drop(pixels);

        let view = texture.create_view(&TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(&format!("{label} BG")),
            layout: &pipeline.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: transform_buf.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&pipeline.sampler),
                },
            ],
        });

        log::debug!(
            "{label}: uploaded {} vertices, {} indices",
            positions.len(),
            indices.len()
        );

        Self {
            label: label.to_owned(),
            pipeline,
            position_buf,
            tex_coord_buf,
            index_buf,
            index_count,
            transform_buf,
            bind_group,
            texture,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `3 * triangle count`, or 0 when the mesh has no vertices or no triangles.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Record an indexed draw with `mvp` as the transform.
    ///
    /// Bindings are left as set; the next draw rebinds everything it uses.
    pub fn draw(&self, queue: &Queue, rpass: &mut RenderPass<'_>, mvp: Mat4, pass: DrawPass) {
        if self.index_count == 0 {
            return;
        }

        let transform = TransformUniform {
            mvp: mvp.to_cols_array_2d(),
        };
        queue.write_buffer(&self.transform_buf, 0, bytemuck::bytes_of(&transform));

        rpass.set_pipeline(self.pipeline.for_pass(pass));
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.position_buf.slice(..));
        rpass.set_vertex_buffer(1, self.tex_coord_buf.slice(..));
        rpass.set_index_buffer(self.index_buf.slice(..), IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Trim `pixels` to exactly `width * height * 4` bytes, or fall back to the
/// placeholder if it is empty, too large for the device, or short.
fn uploadable(label: &str, mut pixels: PixelBuffer, max_dimension: u32) -> PixelBuffer {
    let fits = pixels.width > 0
        && pixels.height > 0
        && pixels.width <= max_dimension
        && pixels.height <= max_dimension;
    if !fits || pixels.data.len() < pixels.expected_len() {
        log::warn!(
            "{label}: texture {}x{} with {} bytes cannot be uploaded, using placeholder",
            pixels.width,
            pixels.height,
            pixels.data.len()
        );
        return PixelBuffer::placeholder();
    }
    let expected = pixels.expected_len();
    pixels.data.truncate(expected);
    pixels
}

/// Create a BGRA texture with a full mip chain and upload every level.
fn upload_texture(device: &Device, queue: &Queue, label: &str, pixels: &PixelBuffer) -> Texture {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(&format!("{label} Texture")),
        size: Extent3d {
            width: pixels.width,
            height: pixels.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: pixels.mip_level_count(),
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let chain = pixels.mip_chain();
    let levels = std::iter::once(pixels).chain(chain.iter());
    for (mip_level, level) in levels.enumerate() {
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: mip_level as u32,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &level.data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(level.width * BYTES_PER_PIXEL as u32),
                rows_per_image: Some(level.height),
            },
            Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_declared_data_is_trimmed() {
        let pixels = PixelBuffer::new_bgra8(1, 1, vec![1, 2, 3, 4, 0, 0]);
        let out = uploadable("t", pixels, 8192);
        assert_eq!(out.data, vec![1, 2, 3, 4]);
        assert!(out.is_valid());
    }

    #[test]
    fn short_or_empty_textures_become_placeholder() {
        let short = PixelBuffer::new_bgra8(2, 2, vec![0; 8]);
        assert_eq!(uploadable("t", short, 8192), PixelBuffer::placeholder());

        let empty = PixelBuffer::new_bgra8(0, 0, Vec::new());
        assert_eq!(uploadable("t", empty, 8192), PixelBuffer::placeholder());
    }

    #[test]
    fn textures_beyond_device_limit_become_placeholder() {
        let wide = PixelBuffer::new_bgra8(4, 1, vec![7; 16]);
        assert_eq!(uploadable("t", wide, 2), PixelBuffer::placeholder());
    }
}
