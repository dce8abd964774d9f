//! Artifact export: the save-all-artifacts seam.
//!
//! Writes one flat entry per generated artifact into a destination
//! directory, using the artifact's file name as the entry path. Path
//! components smuggled into a file name are flattened to the base name —
//! entries never nest. Archive packaging beyond the flat entry layout is a
//! downstream concern behind this seam.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::persist::write_file_atomic;
use crate::types::GeneratedArtifact;

/// Write each artifact as a flat entry under `dest`; returns the written
/// paths in artifact order.
///
/// # Errors
///
/// Returns the underlying IO error if the destination cannot be created or
/// an entry cannot be written.
pub fn write_artifacts(
    dest: &Utf8Path,
    artifacts: &[GeneratedArtifact],
) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let entry = flat_entry_name(&artifact.file_name);
        let path = dest.join(entry);
        write_file_atomic(&path, &artifact.content)?;
        info!(path = %path, kind = artifact.kind.as_str(), "exported artifact");
        written.push(path);
    }
    Ok(written)
}

/// Reduce a file name to its base name, discarding any directory components.
fn flat_entry_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|base| !base.is_empty())
        .unwrap_or("artifact")
}
