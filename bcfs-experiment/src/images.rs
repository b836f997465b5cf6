use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SetupError;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Ordered, non-empty list of image files for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSet {
    paths: Vec<PathBuf>,
}

impl ImageSet {
    /// Lists the images in `dir`, sorted by file name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SetupError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(SetupError::DirectoryMissing(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(SetupError::NotADirectory(dir.to_path_buf()));
        }
        let entries = std::fs::read_dir(dir).map_err(|source| SetupError::Unreadable {
            dir: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(SetupError::NoImages(dir.to_path_buf()));
        }
        debug!(dir = %dir.display(), count = paths.len(), "loaded image set");
        Ok(Self { paths })
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self, SetupError> {
        if paths.is_empty() {
            return Err(SetupError::NoImages(PathBuf::new()));
        }
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn reference(&self, index: usize) -> String {
        self.paths
            .get(index)
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    pub fn references(&self) -> Vec<String> {
        self.paths.iter().map(|p| p.display().to_string()).collect()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
