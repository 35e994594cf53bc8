use std::{ffi::OsStr, fs, path::{Path, PathBuf}};
use crate::{Dataset, DatasetError, DatasetResult};

/// File extensions picked up by [`ImageFolderDataset::new`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

/// An image file and its undecoded contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl ImageSample {
    /// `true` when the file could not be read, or was empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The image files found directly inside a directory, in path order.
///
/// Files are only read when a sample is requested. A file that cannot be read
/// at that point yields a sample with empty `bytes` and a warning, so a single
/// bad file does not interrupt a pass.
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
    paths: Vec<PathBuf>,
}

impl ImageFolderDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> DatasetResult<Self> {
        Self::with_extensions(root, IMAGE_EXTENSIONS)
    }

    /// Scans `root` for files with one of the given extensions (case-insensitive,
    /// leading dot optional). Subdirectories are not visited.
    pub fn with_extensions<P: AsRef<Path>>(root: P, extensions: &[&str]) -> DatasetResult<Self> {
        let root = root.as_ref();
        let entries = fs::read_dir(root).map_err(|source| DatasetError::ScanDirectory {
            path: root.to_path_buf(),
            source,
        })?;

        let mut paths = vec![];
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry in {}: {}", root.display(), err);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !has_extension(&path, extensions) {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        log::debug!("found {} image files in {}", paths.len(), root.display());
        Ok(Self { paths })
    }

    /// Uses the given files as they are, in the given order.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { paths: paths.into_iter().map(Into::into).collect() }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Dataset for ImageFolderDataset {
    type Item = ImageSample;

    fn get(&self, index: usize) -> Option<ImageSample> {
        let path = self.paths.get(index)?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("failed to read {}: {}, using an empty sample", path.display(), err);
                Vec::new()
            }
        };
        Some(ImageSample { path: path.clone(), bytes })
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) => extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => false,
    }
}
