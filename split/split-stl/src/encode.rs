//! Binary STL encoding.

use std::io::Write;
use std::path::Path;

use nalgebra::Vector3;
use split_types::IndexedMesh;
use tracing::debug;

use crate::error::StlResult;
use crate::{HEADER_SIZE, TRIANGLE_SIZE};

/// Fixed ASCII tag written at the start of the 80-byte header.
///
/// The remainder of the header is zero-padded.
pub const HEADER_TAG: &[u8] = b"split binary STL";

/// Encode a mesh as binary STL bytes.
///
/// Normals are the normalized cross product of `(v1 - v0) x (v2 - v0)`,
/// written as zeros for degenerate triangles. Vertices keep their input
/// winding; the two attribute bytes are zero.
#[must_use]
#[allow(clippy::missing_panics_doc)] // Vec<u8> writes cannot fail
pub fn encode_stl(mesh: &IndexedMesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + mesh.face_count() * TRIANGLE_SIZE);
    // Infallible: writing into a Vec
    let _ = write_stl(mesh, &mut out);
    out
}

/// Write a mesh as binary STL to a writer.
///
/// # Errors
///
/// Returns [`StlError::Io`](crate::StlError::Io) on write failure.
#[allow(clippy::cast_possible_truncation)]
// Truncation: face counts are bounded by u32 mesh indices
pub fn write_stl<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> StlResult<()> {
    let mut header = [0u8; HEADER_SIZE];
    header[..HEADER_TAG.len()].copy_from_slice(HEADER_TAG);
    writer.write_all(&header)?;
    writer.write_all(&(mesh.faces.len() as u32).to_le_bytes())?;

    for &[i0, i1, i2] in &mesh.faces {
        let v0 = mesh.positions[i0 as usize];
        let v1 = mesh.positions[i1 as usize];
        let v2 = mesh.positions[i2 as usize];

        let normal = triangle_normal(
            Vector3::new(
                f64::from(v1.x - v0.x),
                f64::from(v1.y - v0.y),
                f64::from(v1.z - v0.z),
            ),
            Vector3::new(
                f64::from(v2.x - v0.x),
                f64::from(v2.y - v0.y),
                f64::from(v2.z - v0.z),
            ),
        );
        for c in &normal {
            writer.write_all(&(*c as f32).to_le_bytes())?;
        }

        for v in [v0, v1, v2] {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
            writer.write_all(&v.z.to_le_bytes())?;
        }

        writer.write_all(&0u16.to_le_bytes())?;
    }

    debug!(faces = mesh.face_count(), "encoded binary STL");
    Ok(())
}

/// Encode and write a mesh to a file.
///
/// # Errors
///
/// Returns [`StlError::Io`](crate::StlError::Io) on write failure.
pub fn save_stl<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> StlResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_stl(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Unit normal of a triangle given its two edge vectors, or zeros when the
/// edges are parallel.
fn triangle_normal(e1: Vector3<f64>, e2: Vector3<f64>) -> Vector3<f64> {
    let cross = e1.cross(&e2);
    let len = cross.norm();
    if len > 0.0 {
        cross / len
    } else {
        Vector3::zeros()
    }
}
