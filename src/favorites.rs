use crate::library::Playlist;

/// What identifies a track in the favorites list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteKey {
    /// Entries are matched by file name. Two tracks with the same file name
    /// share one entry, and un-favoriting either removes it.
    #[default]
    DisplayName,
    /// Entries are matched by playlist position.
    TrackIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEntry {
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Favorites {
    flags: Vec<bool>,
    entries: Vec<FavoriteEntry>,
    key: FavoriteKey,
}

impl Favorites {
    pub fn new(track_count: usize, key: FavoriteKey) -> Self {
        Self {
            flags: vec![false; track_count],
            entries: Vec::new(),
            key,
        }
    }

    /// Flips the favorite flag of `index`. Returns the new flag, or `None` when the
    /// index is outside the playlist.
    pub fn toggle(&mut self, index: usize, playlist: &Playlist) -> Option<bool> {
        let track = playlist.get(index)?;
        if self.flags.len() < playlist.len() {
            self.flags.resize(playlist.len(), false);
        }

        if self.flags[index] {
            self.flags[index] = false;
            let position = match self.key {
                FavoriteKey::DisplayName => {
                    self.entries.iter().position(|entry| entry.name == track.name)
                }
                FavoriteKey::TrackIndex => {
                    self.entries.iter().position(|entry| entry.index == index)
                }
            };
            if let Some(position) = position {
                self.entries.remove(position);
            }
            Some(false)
        } else {
            self.flags[index] = true;
            let present = match self.key {
                FavoriteKey::DisplayName => {
                    self.entries.iter().any(|entry| entry.name == track.name)
                }
                FavoriteKey::TrackIndex => self.entries.iter().any(|entry| entry.index == index),
            };
            if !present {
                self.entries.push(FavoriteEntry {
                    name: track.name.clone(),
                    index,
                });
            }
            Some(true)
        }
    }

    pub fn is_favorite(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Playlist index behind a row of the favorites list.
    pub fn index_for_row(&self, row: usize) -> Option<usize> {
        self.entries.get(row).map(|entry| entry.index)
    }

    pub fn entries(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn key(&self) -> FavoriteKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
