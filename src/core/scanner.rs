use crate::core::cancel::CancellationToken;
use crate::diagnostics::Diagnostics;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions (lowercase, without the dot) that make a file a candidate.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Whether `path` ends in one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lazily walks `root` yielding candidate image files.
///
/// The cancellation token is checked before every directory entry; once it
/// fires the walk stops and [`ImageFiles::was_cancelled`] reports it. Walk
/// errors are sent to the diagnostics sink and skipped.
pub fn image_files<'a>(
    root: &Path,
    sorted: bool,
    cancel: &'a CancellationToken,
    diagnostics: &'a dyn Diagnostics,
) -> ImageFiles<'a> {
    let mut walk = WalkDir::new(root).follow_links(false);
    if sorted {
        walk = walk.sort_by_file_name();
    }
    ImageFiles {
        entries: walk.into_iter(),
        cancel,
        diagnostics,
        cancelled: false,
    }
}

pub struct ImageFiles<'a> {
    entries: walkdir::IntoIter,
    cancel: &'a CancellationToken,
    diagnostics: &'a dyn Diagnostics,
    cancelled: bool,
}

impl ImageFiles<'_> {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Iterator for ImageFiles<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.cancelled {
            return None;
        }
        loop {
            if self.cancel.is_cancelled() {
                self.cancelled = true;
                return None;
            }

            match self.entries.next()? {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && has_image_extension(path) {
                        return Some(entry.into_path());
                    }
                }
                Err(e) => {
                    self.diagnostics
                        .warn(&format!("Error while searching for images: {}", e));
                }
            }
        }
    }
}
