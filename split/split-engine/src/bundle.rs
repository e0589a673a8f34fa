//! Part bundle archives.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SplitResult;
use crate::result::PartArtifact;

/// Bundle part STLs into a ZIP archive.
///
/// Entries are the bare part file names (no directories), deflated at the
/// maximum level.
///
/// # Errors
///
/// Returns [`SplitError::Zip`](crate::SplitError::Zip) or
/// [`SplitError::Io`](crate::SplitError::Io) on archive failures.
pub fn bundle_parts(parts: &[PartArtifact]) -> SplitResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for part in parts {
        zip.start_file(part.name.as_str(), options)?;
        zip.write_all(&part.bytes)?;
    }

    let cursor = zip.finish()?;
    let bytes = cursor.into_inner();
    debug!(
        entries = parts.len(),
        bytes = bytes.len(),
        "part bundle built"
    );
    Ok(bytes)
}
