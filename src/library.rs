use crate::config;
use crate::error::Rejection;
use crate::model::Track;
use std::ffi::OsStr;
use std::path::Path;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg"];

/// Ordered list of tracks found in the music folder. Indices are stable for the
/// session: tracks are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Appends every audio file directly inside `dir`, in enumeration order.
    /// Loading the same folder twice appends duplicates.
    pub fn load(&mut self, dir: &Path) -> Result<usize, Rejection> {
        if dir.as_os_str().is_empty() || !dir.is_dir() {
            return Err(Rejection::InvalidPath(dir.display().to_string()));
        }

        let mut found = scan_folder(dir);
        let count = found.len();
        self.tracks.append(&mut found);
        Ok(count)
    }

    pub fn display_names(&self) -> Vec<&str> {
        self.tracks.iter().map(|track| track.name.as_str()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

pub fn scan_folder(root: &Path) -> Vec<Track> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .map(|entry| Track::from_path(config::normalize_path(entry.path())))
        .collect()
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
