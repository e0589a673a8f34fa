//! STL decoding.

use std::path::Path;

use nalgebra::Point3;
use split_types::{IndexedMesh, VertexPool, DEFAULT_QUANTIZE_PRECISION};
use tracing::debug;

use crate::error::{StlError, StlResult};
use crate::{HEADER_SIZE, TRIANGLE_SIZE};

/// Decode STL bytes into a deduplicated indexed mesh.
///
/// Binary versus ASCII is decided by the declared-triangle-count test; see
/// the crate docs.
///
/// # Errors
///
/// Returns [`StlError::InvalidFormat`] when an ASCII vertex line does not
/// carry exactly three numbers.
///
/// # Example
///
/// ```
/// use split_stl::decode_stl;
///
/// let ascii = b"solid t\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendfacet\nendsolid t\n";
/// let mesh = decode_stl(ascii).unwrap();
/// assert_eq!(mesh.face_count(), 1);
/// ```
pub fn decode_stl(bytes: &[u8]) -> StlResult<IndexedMesh> {
    decode_stl_with_precision(bytes, DEFAULT_QUANTIZE_PRECISION)
}

/// Decode STL bytes, deduplicating vertices at an explicit precision.
///
/// Production callers use [`decode_stl`]; the precision knob exists so tests
/// can exercise near-coincident vertices.
///
/// # Errors
///
/// Same as [`decode_stl`].
pub fn decode_stl_with_precision(bytes: &[u8], precision: usize) -> StlResult<IndexedMesh> {
    if let Some(count) = binary_triangle_count(bytes) {
        decode_binary(bytes, count, precision)
    } else {
        decode_ascii(bytes, precision)
    }
}

/// Load and decode an STL file.
///
/// # Errors
///
/// Returns [`StlError::Io`] if the file cannot be read, or any decode error.
pub fn load_stl<P: AsRef<Path>>(path: P) -> StlResult<IndexedMesh> {
    let bytes = std::fs::read(path)?;
    decode_stl(&bytes)
}

/// Declared triangle count, if the byte length matches the binary layout.
fn binary_triangle_count(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < HEADER_SIZE + 4 {
        return None;
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ]);
    let expected = (HEADER_SIZE as u64 + 4) + u64::from(count) * TRIANGLE_SIZE as u64;
    (expected == bytes.len() as u64).then_some(count)
}

fn decode_binary(bytes: &[u8], count: u32, precision: usize) -> StlResult<IndexedMesh> {
    let mut pool = VertexPool::with_capacity(precision, count as usize * 3);
    let mut faces = Vec::with_capacity(count as usize);

    let mut offset = HEADER_SIZE + 4;
    for _ in 0..count {
        // 12 normal bytes are ignored; normals are recomputed on encode
        let record = &bytes[offset..offset + TRIANGLE_SIZE];
        let i0 = pool.insert(read_point(&record[12..24]));
        let i1 = pool.insert(read_point(&record[24..36]));
        let i2 = pool.insert(read_point(&record[36..48]));
        faces.push([i0, i1, i2]);
        offset += TRIANGLE_SIZE;
    }

    let mesh = pool.into_mesh(faces);
    debug!(
        faces = mesh.face_count(),
        vertices = mesh.vertex_count(),
        "decoded binary STL"
    );
    Ok(mesh)
}

/// Read a point from 12 bytes (3 little-endian f32s).
fn read_point(buf: &[u8]) -> Point3<f32> {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Point3::new(x, y, z)
}

fn decode_ascii(bytes: &[u8], precision: usize) -> StlResult<IndexedMesh> {
    let text = String::from_utf8_lossy(bytes);
    let mut pool = VertexPool::with_precision(precision);
    let mut faces = Vec::new();
    let mut pending: Vec<u32> = Vec::with_capacity(3);

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lowered = trimmed.to_lowercase();

        if let Some(rest) = lowered.strip_prefix("vertex") {
            let coords: Vec<f32> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| StlError::invalid(format!("bad vertex line: {trimmed}")))?;
            if coords.len() != 3 {
                return Err(StlError::invalid(format!(
                    "vertex line has {} coordinates, expected 3",
                    coords.len()
                )));
            }
            pending.push(pool.insert(Point3::new(coords[0], coords[1], coords[2])));
        } else if lowered.starts_with("endfacet") {
            // Only complete triples form a face
            if pending.len() == 3 {
                faces.push([pending[0], pending[1], pending[2]]);
            }
            pending.clear();
        }
    }

    let mesh = pool.into_mesh(faces);
    debug!(
        faces = mesh.face_count(),
        vertices = mesh.vertex_count(),
        "decoded ASCII STL"
    );
    Ok(mesh)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encode::encode_stl;
    use split_types::IndexedMesh;

    fn ascii_triangle() -> &'static [u8] {
        b"solid test\n\
          facet normal 0 0 1\n\
            outer loop\n\
              vertex 0 0 0\n\
              vertex 1 0 0\n\
              vertex 0 1 0\n\
            endloop\n\
          endfacet\n\
          endsolid test\n"
    }

    #[test]
    fn ascii_parse_basic() {
        let mesh = decode_stl(ascii_triangle()).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.bounds.max.x, 1.0);
        assert_eq!(mesh.bounds.max.y, 1.0);
    }

    #[test]
    fn ascii_case_insensitive_keywords() {
        let upper = b"SOLID T\nVERTEX 0 0 0\nVertex 1 0 0\nvertex 0 1 0\nENDFACET\n";
        let mesh = decode_stl(upper).unwrap();
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn ascii_shared_vertices_dedup() {
        // Two triangles sharing an edge: 4 distinct vertices, not 6
        let stl = b"solid t\n\
            vertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendfacet\n\
            vertex 1 0 0\nvertex 1 1 0\nvertex 0 1 0\nendfacet\n";
        let mesh = decode_stl(stl).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn ascii_bad_vertex_arity_rejected() {
        let stl = b"solid t\nvertex 1 2\nendfacet\n";
        let err = decode_stl(stl).unwrap_err();
        assert!(matches!(err, StlError::InvalidFormat { .. }));

        let stl = b"solid t\nvertex 1 2 3 4\nendfacet\n";
        assert!(decode_stl(stl).is_err());
    }

    #[test]
    fn ascii_non_numeric_vertex_rejected() {
        let stl = b"solid t\nvertex a b c\nendfacet\n";
        assert!(decode_stl(stl).is_err());
    }

    #[test]
    fn ascii_incomplete_facet_is_skipped() {
        let stl = b"solid t\nvertex 0 0 0\nvertex 1 0 0\nendfacet\n";
        let mesh = decode_stl(stl).unwrap();
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn garbage_yields_empty_mesh() {
        let mesh = decode_stl(b"this is not an stl file at all").unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn binary_detection_requires_exact_length() {
        // Header declares 1 triangle but carries no body: falls to ASCII,
        // which finds nothing
        let mut bytes = vec![0u8; 84];
        bytes[80..84].copy_from_slice(&1u32.to_le_bytes());
        let mesh = decode_stl(&bytes).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn binary_roundtrip_with_dedup() {
        let mesh = IndexedMesh::from_parts(
            vec![
                nalgebra::Point3::new(0.0, 0.0, 0.0),
                nalgebra::Point3::new(10.0, 0.0, 0.0),
                nalgebra::Point3::new(0.0, 10.0, 0.0),
                nalgebra::Point3::new(10.0, 10.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
        );
        let bytes = encode_stl(&mesh);
        let decoded = decode_stl(&bytes).unwrap();
        assert_eq!(decoded.face_count(), 2);
        // Binary expands to 6 corner records; dedup folds them back to 4
        assert_eq!(decoded.vertex_count(), 4);
        assert_eq!(decoded.bounds.max.x, 10.0);
    }

    #[test]
    fn decode_precision_knob() {
        let mesh = IndexedMesh::from_parts(
            vec![
                nalgebra::Point3::new(0.0, 0.0, 0.0),
                nalgebra::Point3::new(1.0, 0.0, 0.0),
                nalgebra::Point3::new(1.0001, 0.0, 1.0),
            ],
            vec![[0, 1, 2]],
        );
        let bytes = encode_stl(&mesh);

        let fine = decode_stl_with_precision(&bytes, 6).unwrap();
        assert_eq!(fine.vertex_count(), 3);

        // At 3 decimals 1.0 and 1.0001 collapse; z still separates them
        let coarse = decode_stl_with_precision(&bytes, 3).unwrap();
        assert_eq!(coarse.vertex_count(), 3);

        let flat = IndexedMesh::from_parts(
            vec![
                nalgebra::Point3::new(0.0, 0.0, 0.0),
                nalgebra::Point3::new(1.0, 0.0, 0.0),
                nalgebra::Point3::new(1.0001, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let coarse = decode_stl_with_precision(&encode_stl(&flat), 3).unwrap();
        assert_eq!(coarse.vertex_count(), 2);
    }

    #[test]
    fn bounds_sound_for_all_vertices() {
        let mesh = decode_stl(ascii_triangle()).unwrap();
        for p in &mesh.positions {
            assert!(mesh.bounds.contains(p));
        }
    }
}
