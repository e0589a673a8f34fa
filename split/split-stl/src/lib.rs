//! STL (Stereolithography) codec for the split pipeline.
//!
//! Supports both binary and ASCII STL on the way in; output is always
//! binary.
//!
//! # Format Detection
//!
//! A file is treated as binary when its declared triangle count matches the
//! file length exactly: `84 + 50 * count == len`. Everything else goes
//! through the ASCII parser. This is stricter than sniffing for a leading
//! `solid` keyword (binary exporters routinely write `solid` into the
//! comment header) and cheaper than scanning the body.
//!
//! # Binary Layout
//!
//! ```text
//! UINT8[80]    – Header (ignored on read; fixed tag on write)
//! UINT32       – Number of triangles (little-endian)
//! foreach triangle
//!     REAL32[3] – Normal vector (ignored on read; recomputed on write)
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (zero)
//! end
//! ```
//!
//! # Deduplication
//!
//! Both parsers feed vertices through [`split_types::VertexPool`], so
//! coordinates that agree to six decimals share one index and the mesh
//! bounds are tracked as vertices are accepted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod decode;
mod encode;
mod error;

pub use decode::{decode_stl, decode_stl_with_precision, load_stl};
pub use encode::{encode_stl, save_stl, write_stl, HEADER_TAG};
pub use error::{StlError, StlResult};

/// STL binary header size in bytes.
pub(crate) const HEADER_SIZE: usize = 80;

/// Size of one triangle record in binary STL.
pub(crate) const TRIANGLE_SIZE: usize = 50;
