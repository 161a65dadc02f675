use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::logger;
use crate::types::*;
use super::{title_matches, Platform, WindowHandle};

/// Offline platform: one fake emulator window that replays recorded
/// screenshots from a directory and logs every input it receives.
pub struct ReplayPlatform {
    dir: PathBuf,
    title: String,
}

impl ReplayPlatform {
    pub fn new(dir: &Path, title: &str) -> Self {
        Self { dir: dir.to_path_buf(), title: title.to_string() }
    }
}

impl Platform for ReplayPlatform {
    fn launch(&self, executable: &Path) -> Result<()> {
        logger::info_p("replay", &format!("launch(\"{}\") skipped", executable.display()));
        Ok(())
    }

    fn get_instances(&self, pattern: &str) -> Vec<(WindowId, String)> {
        if title_matches(pattern, &self.title) {
            vec![(1, self.title.clone())]
        } else {
            Vec::new()
        }
    }

    fn create_window(&self, pattern: &str, window_id: WindowId) -> Box<dyn WindowHandle> {
        logger::info_p("replay", &format!("create_window(\"{}\", {})", pattern, window_id));
        let frames = list_frames(&self.dir);
        if frames.is_empty() {
            logger::warn_p("replay", &format!("no .png frames in {}", self.dir.display()));
        }
        Box::new(ReplayWindow {
            window_id,
            title: self.title.clone(),
            frames,
            cursor: 0,
        })
    }
}

/// Sorted `.png` files directly inside `dir`.
fn list_frames(dir: &Path) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
            .collect(),
        Err(_) => Vec::new(),
    };
    frames.sort();
    frames
}

struct ReplayWindow {
    window_id: WindowId,
    title: String,
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl WindowHandle for ReplayWindow {
    fn id(&self) -> WindowId { self.window_id }
    fn title(&self) -> &str { &self.title }

    fn activate(&mut self) {
        logger::info_p("replay", &format!("win({}).activate()", self.window_id));
    }

    fn grab_frame(&mut self) -> Option<Frame> {
        let path = self.frames.get(self.cursor)?.clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        match image::open(&path) {
            Ok(img) => Some(Frame::new(img.to_rgba8())),
            Err(e) => {
                logger::warn_p("replay", &format!("failed to read {}: {}", path.display(), e));
                None
            }
        }
    }

    fn click_relative(&mut self, x_ratio: f64, y_ratio: f64) {
        logger::info_p("replay", &format!("win({}).click_relative({:.3}, {:.3})", self.window_id, x_ratio, y_ratio));
    }

    fn tap(&mut self, key: &str) {
        logger::info_p("replay", &format!("win({}).tap(\"{}\")", self.window_id, key));
    }
}
