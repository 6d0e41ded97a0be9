//! Reader for the simplified ASCII PLY variant the house meshes are exported in.
//!
//! Only three header declarations matter:
//! - `element vertex N` sets the vertex row count,
//! - `property float NAME` (inside the vertex element) maps a column to a field,
//! - `element face M` sets the face row count.
//!
//! The header ends at `end_header`. Vertex rows are matched positionally
//! against the declared float properties; face rows are `<count> i0 i1 i2`
//! and only the first three indices are kept.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use crate::error::{AssetError, AssetResult};
use crate::mesh::{MeshDescription, Triangle, Vertex};

const HEADER_END: &str = "end_header";
const ELEMENT: &str = "element ";
const VERTEX_ELEMENT: &str = "element vertex ";
const FACE_ELEMENT: &str = "element face ";
const FLOAT_PROPERTY: &str = "property float ";
const MAX_RESERVE: usize = 1 << 20;

/// Read a PLY mesh from disk, never failing.
///
/// An unopenable file yields an empty mesh. A malformed row stops parsing and
/// keeps whatever was read before it. Both cases are logged.
pub fn read_ply(path: impl AsRef<Path>) -> MeshDescription {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(source) => {
            let err = AssetError::Open {
                path: path.to_path_buf(),
                source,
            };
            log::error!("{err}");
            return MeshDescription::empty();
        }
    };

    let mesh = read_ply_from_reader(BufReader::new(file));
    log::info!(
        "Loaded PLY {:?}: {} vertices, {} triangles",
        path,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    let bad = mesh.out_of_range_triangles();
    if bad > 0 {
        log::warn!("{:?}: {} triangles reference missing vertices", path, bad);
    }
    mesh
}

/// Lenient parse from any [`BufRead`]: errors are logged, partial data kept.
pub fn read_ply_from_reader<R: BufRead>(reader: R) -> MeshDescription {
    let mut builder = MeshBuilder::default();
    if let Err(err) = builder.parse(reader) {
        log::error!(
            "{err}; keeping {} vertices and {} triangles read so far",
            builder.vertices.len(),
            builder.triangles.len()
        );
    }
    builder.finish()
}

/// Strict parse: any malformed numeric token is an error.
///
/// A file that ends before all declared rows is still truncated, not an error.
pub fn parse_ply<R: BufRead>(reader: R) -> AssetResult<MeshDescription> {
    let mut builder = MeshBuilder::default();
    builder.parse(reader)?;
    Ok(builder.finish())
}

/// Convenience helper to parse a PLY string literal.
pub fn parse_ply_str(contents: &str) -> AssetResult<MeshDescription> {
    parse_ply(io::Cursor::new(contents))
}

/// Vertex field a declared float property feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexProperty {
    X,
    Y,
    Z,
    Nx,
    Ny,
    Nz,
    Red,
    Green,
    Blue,
    U,
    V,
    /// Declared but not stored. Still occupies a column.
    Ignored,
}

impl VertexProperty {
    fn from_name(name: &str) -> Self {
        match name {
            "x" => Self::X,
            "y" => Self::Y,
            "z" => Self::Z,
            "nx" => Self::Nx,
            "ny" => Self::Ny,
            "nz" => Self::Nz,
            "red" => Self::Red,
            "green" => Self::Green,
            "blue" => Self::Blue,
            "u" => Self::U,
            "v" => Self::V,
            _ => Self::Ignored,
        }
    }

    fn slot(self, vertex: &mut Vertex) -> Option<&mut f32> {
        Some(match self {
            Self::X => &mut vertex.position[0],
            Self::Y => &mut vertex.position[1],
            Self::Z => &mut vertex.position[2],
            Self::Nx => &mut vertex.normal[0],
            Self::Ny => &mut vertex.normal[1],
            Self::Nz => &mut vertex.normal[2],
            Self::Red => &mut vertex.color[0],
            Self::Green => &mut vertex.color[1],
            Self::Blue => &mut vertex.color[2],
            Self::U => &mut vertex.uv[0],
            Self::V => &mut vertex.uv[1],
            Self::Ignored => return None,
        })
    }
}

#[derive(Debug, Default)]
struct Header {
    vertex_count: usize,
    face_count: usize,
    properties: Vec<VertexProperty>,
}

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

impl MeshBuilder {
    fn parse<R: BufRead>(&mut self, reader: R) -> AssetResult<()> {
        let mut lines = reader.lines().enumerate();
        let header = parse_header(&mut lines)?;
        // Counts come from the file; don't trust them for allocation.
        self.vertices.reserve(header.vertex_count.min(MAX_RESERVE));
        self.triangles.reserve(header.face_count.min(MAX_RESERVE));

        for _ in 0..header.vertex_count {
            let Some((line_no, line)) = lines.next() else {
                log::warn!(
                    "PLY truncated: {} of {} vertex rows present",
                    self.vertices.len(),
                    header.vertex_count
                );
                return Ok(());
            };
            let vertex = parse_vertex_row(&line?, &header.properties, line_no)?;
            self.vertices.push(vertex);
        }

        for _ in 0..header.face_count {
            let Some((line_no, line)) = lines.next() else {
                log::warn!(
                    "PLY truncated: {} of {} face rows present",
                    self.triangles.len(),
                    header.face_count
                );
                return Ok(());
            };
            let triangle = parse_face_row(&line?, line_no)?;
            self.triangles.push(triangle);
        }

        Ok(())
    }

    fn finish(self) -> MeshDescription {
        MeshDescription::new(self.vertices, self.triangles)
    }
}

fn parse_header<I>(lines: &mut I) -> AssetResult<Header>
where
    I: Iterator<Item = (usize, io::Result<String>)>,
{
    let mut header = Header::default();
    let mut in_vertex_element = false;

    for (line_no, line) in lines {
        let line = line?;
        let line = line.trim_end();

        if let Some(rest) = after_marker(line, VERTEX_ELEMENT) {
            header.vertex_count = parse_count(rest, line_no, "vertex count")?;
            in_vertex_element = true;
        } else if let Some(rest) = after_marker(line, FACE_ELEMENT) {
            header.face_count = parse_count(rest, line_no, "face count")?;
            in_vertex_element = false;
        } else if line.contains(ELEMENT) {
            in_vertex_element = false;
        }

        if in_vertex_element {
            if let Some(name) = after_marker(line, FLOAT_PROPERTY).and_then(|r| r.split_whitespace().next()) {
                header.properties.push(VertexProperty::from_name(name));
            }
        }

        if line == HEADER_END {
            break;
        }
    }

    Ok(header)
}

fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|at| &line[at + marker.len()..])
}

fn parse_count(rest: &str, line_no: usize, what: &str) -> AssetResult<usize> {
    let token = rest.split_whitespace().next().unwrap_or("");
    token.parse::<usize>().map_err(|_| AssetError::MalformedPly {
        line: line_no + 1,
        reason: format!("invalid {what} '{token}'"),
    })
}

fn parse_vertex_row(
    line: &str,
    properties: &[VertexProperty],
    line_no: usize,
) -> AssetResult<Vertex> {
    let mut vertex = Vertex::default();
    for (&property, token) in properties.iter().zip(line.split_whitespace()) {
        if let Some(slot) = property.slot(&mut vertex) {
            *slot = token.parse::<f32>().map_err(|_| AssetError::MalformedPly {
                line: line_no + 1,
                reason: format!("invalid float '{token}' for {property:?}"),
            })?;
        }
    }
    Ok(vertex)
}

fn parse_face_row(line: &str, line_no: usize) -> AssetResult<Triangle> {
    let malformed = |reason: String| AssetError::MalformedPly {
        line: line_no + 1,
        reason,
    };

    let mut tokens = line.split_whitespace();
    // Per-face vertex count; the value is not used.
    tokens
        .next()
        .ok_or_else(|| malformed("empty face row".to_string()))?;

    let mut indices = [0u32; 3];
    for (slot, index) in indices.iter_mut().enumerate() {
        let token = tokens
            .next()
            .ok_or_else(|| malformed(format!("face row has only {slot} indices")))?;
        *index = token
            .parse::<u32>()
            .map_err(|_| malformed(format!("invalid vertex index '{token}'")))?;
    }

    Ok(Triangle { indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEXTURED_QUAD: &str = "\
ply
format ascii 1.0
comment exported for the walkthrough
element vertex 4
property float x
property float y
property float z
property float u
property float v
element face 2
property list uchar uint vertex_indices
end_header
1.0 2.0 3.0 0.5 0.25
1.0 0.0 0.0 1.0 0.0
1.0 1.0 0.0 1.0 1.0
0.0 1.0 0.0 0.0 1.0
3 0 1 2
3 0 2 3
";

    fn write_ply(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn declared_counts_match_parsed_rows() {
        let mesh = parse_ply_str(TEXTURED_QUAD).expect("parse quad");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        for tri in mesh.triangles() {
            assert!(tri.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        }
        assert_eq!(mesh.triangles()[1], Triangle::new(0, 2, 3));
    }

    #[test]
    fn columns_map_to_declared_properties() {
        let mesh = parse_ply_str(TEXTURED_QUAD).unwrap();
        let v = mesh.vertices()[0];
        assert_eq!(v.position, [1.0, 2.0, 3.0]);
        assert_eq!(v.uv, [0.5, 0.25]);
        assert_eq!(v.normal, [0.0; 3]);
        assert_eq!(v.color, [0.0; 3]);
    }

    #[test]
    fn normals_and_colors_are_read() {
        let src = "\
ply
element vertex 1
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float red
property float green
property float blue
element face 0
end_header
1 2 3 0 1 0 0.25 0.5 0.75
";
        let mesh = parse_ply_str(src).unwrap();
        let v = mesh.vertices()[0];
        assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        assert_eq!(v.color, [0.25, 0.5, 0.75]);
    }

    #[test]
    fn unknown_property_still_takes_a_column() {
        let src = "\
ply
element vertex 1
property float x
property float confidence
property float y
property float z
end_header
1.0 not-a-number 2.0 3.0
";
        let mesh = parse_ply_str(src).unwrap();
        assert_eq!(mesh.vertices()[0].position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn non_float_and_face_properties_are_not_columns() {
        let src = "\
ply
element vertex 1
property float x
property uchar alpha
property float y
element face 1
property float weight
property list uchar uint vertex_indices
end_header
4.0 5.0
3 0 0 0
";
        let mesh = parse_ply_str(src).unwrap();
        assert_eq!(mesh.vertices()[0].position, [4.0, 5.0, 0.0]);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn only_first_three_face_indices_are_kept() {
        let src = "\
ply
element vertex 4
property float x
element face 1
end_header
0
1
2
3
4 0 1 2 3
";
        let mesh = parse_ply_str(src).unwrap();
        assert_eq!(mesh.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn crlf_header_terminator_is_recognized() {
        let src = "ply\r\nelement vertex 1\r\nproperty float x\r\nend_header\r\n7.5\r\n";
        let mesh = parse_ply_str(src).unwrap();
        assert_eq!(mesh.vertices()[0].position[0], 7.5);
    }

    #[test]
    fn short_file_is_truncated_not_an_error() {
        let src = "\
ply
element vertex 3
property float x
element face 1
end_header
0.0
1.0
";
        let mesh = parse_ply_str(src).expect("truncation is not an error");
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn out_of_range_indices_pass_through() {
        let src = "\
ply
element vertex 1
property float x
element face 1
end_header
0.0
3 0 5 9
";
        let mesh = parse_ply_str(src).unwrap();
        assert_eq!(mesh.triangles()[0], Triangle::new(0, 5, 9));
        assert_eq!(mesh.out_of_range_triangles(), 1);
    }

    #[test]
    fn strict_parse_reports_malformed_line() {
        let src = "\
ply
element vertex 2
property float x
end_header
1.0
oops
";
        match parse_ply_str(src) {
            Err(AssetError::MalformedPly { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn strict_parse_rejects_short_face_row() {
        let src = "\
ply
element vertex 3
property float x
element face 1
end_header
0
1
2
3 0 1
";
        assert!(matches!(
            parse_ply_str(src),
            Err(AssetError::MalformedPly { line: 9, .. })
        ));
    }

    #[test]
    fn lenient_parse_keeps_rows_before_malformed_one() {
        let src = "\
ply
element vertex 3
property float x
element face 1
end_header
1.0
2.0
bad
3 0 1 2
";
        let mesh = read_ply_from_reader(io::Cursor::new(src));
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.triangle_count(), 0);
        assert_eq!(mesh.vertices()[1].position[0], 2.0);
    }

    #[test]
    fn missing_file_yields_empty_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = read_ply(dir.path().join("Nowhere.ply"));
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn parsing_twice_is_identical() {
        let file = write_ply(TEXTURED_QUAD);
        let first = read_ply(file.path());
        let second = read_ply(file.path());
        assert_eq!(first.vertices(), second.vertices());
        assert_eq!(first.triangles(), second.triangles());
        assert_eq!(first, second);
    }
}
