use crate::constants::PICKER_FILTERS;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Selection {
    pub kept: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone)]
pub struct FileService {
    last_dir: Option<PathBuf>,
}

impl FileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick_videos(&mut self) -> Option<Vec<PathBuf>> {
        let mut dialog = rfd::FileDialog::new().set_title("Select video files");
        for (label, extensions) in PICKER_FILTERS {
            dialog = dialog.add_filter(*label, extensions);
        }
        if let Some(ref dir) = self.last_dir {
            dialog = dialog.set_directory(dir);
        }

        let picked = dialog.pick_files()?;
        if let Some(parent) = picked.first().and_then(|p| p.parent()) {
            self.last_dir = Some(parent.to_path_buf());
        }
        Some(picked)
    }

    pub fn retain_existing(paths: Vec<PathBuf>) -> Selection {
        let (kept, skipped): (Vec<PathBuf>, Vec<PathBuf>) = paths
            .into_iter()
            .partition(|path| Self::is_present(path));
        Selection { kept, skipped }
    }

    pub fn is_present(path: &Path) -> bool {
        path.exists()
    }
}
