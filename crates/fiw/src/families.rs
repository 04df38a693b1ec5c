//! Family index over the FIW training faces.
//!
//! Expected layout: `<root>/<family>/<member>/<image>`, e.g.
//! `train-faces/F0001/MID1/P00001_face0.jpg`. Families are sorted by
//! directory name and numbered from 0; that number is the class label.

use std::path::{Path, PathBuf};

use crate::error::DatasetError;

/// Sorted families and the face images that belong to each.
#[derive(Debug, Clone, Default)]
pub struct FamilyIndex {
    names: Vec<String>,
    images: Vec<Vec<PathBuf>>,
}

impl FamilyIndex {
    /// Scan a training root directory.
    ///
    /// Families without any image are skipped so every class label has at
    /// least one sample.
    pub fn scan(root: &Path) -> Result<Self, DatasetError> {
        let mut family_dirs = list_dirs(root)?;
        family_dirs.sort();

        let mut families = Vec::with_capacity(family_dirs.len());
        for dir in family_dirs {
            let mut images = Vec::new();
            let mut members = list_dirs(&dir)?;
            members.sort();
            for member in members {
                let mut files = list_images(&member)?;
                files.sort();
                images.extend(files);
            }
            if images.is_empty() {
                tracing::debug!(family = %dir.display(), "Skipping family without images");
                continue;
            }
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            families.push((name, images));
        }

        if families.is_empty() {
            return Err(DatasetError::EmptyIndex(root.to_path_buf()));
        }
        let index = Self::from_families(families);
        tracing::info!(
            families = index.num_families(),
            images = index.num_images(),
            root = %root.display(),
            "Family index built"
        );
        Ok(index)
    }

    /// Build an index from already-collected `(family name, images)` pairs.
    /// Families without images are dropped, as in [`scan`](Self::scan);
    /// labels follow the insertion order of the remaining families.
    pub fn from_families(families: Vec<(String, Vec<PathBuf>)>) -> Self {
        let (names, images) = families
            .into_iter()
            .filter(|(_, images)| !images.is_empty())
            .unzip();
        Self { names, images }
    }

    pub fn num_families(&self) -> usize {
        self.names.len()
    }

    pub fn num_images(&self) -> usize {
        self.images.iter().map(Vec::len).sum()
    }

    /// Family directory name for a class label.
    pub fn name(&self, family: usize) -> Option<&str> {
        self.names.get(family).map(String::as_str)
    }

    /// Images of one family.
    pub fn images(&self, family: usize) -> &[PathBuf] {
        self.images.get(family).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        out.push(entry.map_err(io_err)?.path());
    }
    Ok(out)
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    Ok(read_dir(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    Ok(read_dir(dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_image(p))
        .collect())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_sorted_and_skips_empty() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("F0002/MID1/b.jpg"));
        touch(&root.join("F0001/MID2/a2.jpg"));
        touch(&root.join("F0001/MID1/a1.jpg"));
        touch(&root.join("F0001/MID1/notes.txt"));
        std::fs::create_dir_all(root.join("F0003/MID1")).unwrap();

        let index = FamilyIndex::scan(root).unwrap();
        assert_eq!(index.num_families(), 2);
        assert_eq!(index.name(0), Some("F0001"));
        assert_eq!(index.name(1), Some("F0002"));
        assert_eq!(index.images(0).len(), 2);
        assert!(index.images(0)[0].ends_with("MID1/a1.jpg"));
        assert_eq!(index.num_images(), 3);
    }

    #[test]
    fn test_scan_empty_root_errors() {
        let tmp = TempDir::new().unwrap();
        let err = FamilyIndex::scan(tmp.path()).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyIndex(_)));
    }
}
