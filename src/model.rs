use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Sequential,
    SingleRepeat,
    Shuffle,
}

impl PlayMode {
    pub fn next(self) -> Self {
        match self {
            Self::Sequential => Self::SingleRepeat,
            Self::SingleRepeat => Self::Shuffle,
            Self::Shuffle => Self::Sequential,
        }
    }

    /// Loop count the engine should apply so a natural track end matches the mode.
    pub fn loop_count(self) -> LoopCount {
        match self {
            Self::SingleRepeat => LoopCount::Infinite,
            Self::Sequential | Self::Shuffle => LoopCount::Once,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sequential => "List repeat",
            Self::SingleRepeat => "Song repeat",
            Self::Shuffle => "Shuffle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Once,
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub name: String,
}

impl Track {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}
