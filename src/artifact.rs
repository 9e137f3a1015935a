use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Ordered list of files produced for one request.
///
/// Order is what the caller displays: mono before dual, base artifacts
/// before the ones derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    paths: Vec<PathBuf>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Bare file names, the form artifacts are fetched by.
    pub fn names(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| crate::stage::file_name(p))
            .collect()
    }
}

impl IntoIterator for ArtifactSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl FromIterator<PathBuf> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        let mut set = ArtifactSet::new();
        for p in iter {
            set.push(p);
        }
        set
    }
}

/// A produced file must exist and be non-empty. Returns its size in bytes.
pub fn verify_artifact(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(PipelineError::ArtifactMissing {
            path: path.to_path_buf(),
        }),
    }
}

pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}
