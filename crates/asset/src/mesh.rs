//! CPU-side mesh representation produced by the PLY reader.

/// Per-vertex attributes. Anything missing from the source row stays zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

/// Three indices into the vertex list. Not bounds-checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [u32; 3],
}

impl Triangle {
    pub fn new(i0: u32, i1: u32, i2: u32) -> Self {
        Self {
            indices: [i0, i1, i2],
        }
    }
}

/// Vertices plus triangles in file order. Immutable once parsed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshDescription {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

impl MeshDescription {
    pub fn new(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Returns `true` if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    /// Position stream for the vertex buffer at slot 0.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Texture coordinate stream for the vertex buffer at slot 1.
    pub fn tex_coords(&self) -> Vec<[f32; 2]> {
        self.vertices.iter().map(|v| v.uv).collect()
    }

    /// Flat triangle-list indices, `3 * triangle_count()` long.
    pub fn indices(&self) -> Vec<u32> {
        self.triangles.iter().flat_map(|t| t.indices).collect()
    }

    /// Number of triangles referencing a vertex past the end of the list.
    pub fn out_of_range_triangles(&self) -> usize {
        let len = self.vertices.len();
        self.triangles
            .iter()
            .filter(|t| t.indices.iter().any(|&i| i as usize >= len))
            .count()
    }
}
