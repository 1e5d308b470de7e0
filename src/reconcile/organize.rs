use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::library::naming::{parse_track_number, sanitize_file_name, title_suffix, track_file_stem};
use crate::library::{COVER_NAMES, LYRIC_EXTENSION, Track, audio_files, scan_tracks};

use super::rename::{Reconciler, normalize_path, same_path};
use super::RenameOutcome;

const UNKNOWN_ALBUM: &str = "Unknown Album";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Tracks sharing one album tag, in scan order.
struct AlbumGroup {
    album: String,
    tracks: Vec<Track>,
    /// Artist -> track count, in first-seen order.
    artists: Vec<(String, usize)>,
}

impl AlbumGroup {
    /// The most frequent artist; the first one seen wins ties.
    fn primary_artist(&self) -> &str {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.artists {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(a, _)| a.as_str()).unwrap_or(UNKNOWN_ARTIST)
    }

    fn folder_name(&self) -> String {
        sanitize_file_name(&format!("{} - {}", self.primary_artist(), self.album))
    }
}

fn group_by_album(tracks: Vec<Track>) -> Vec<AlbumGroup> {
    let mut groups: Vec<AlbumGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for track in tracks {
        let album = track.tags.album.clone().unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        let artist = track
            .tags
            .artist
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let idx = *index.entry(album.clone()).or_insert_with(|| {
            groups.push(AlbumGroup {
                album,
                tracks: Vec::new(),
                artists: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[idx];
        match group.artists.iter_mut().find(|(a, _)| *a == artist) {
            Some((_, count)) => *count += 1,
            None => group.artists.push((artist, 1)),
        }
        group.tracks.push(track);
    }
    groups
}

fn lyric_sibling(path: &Path) -> PathBuf {
    path.with_extension(LYRIC_EXTENSION)
}

/// `path` renamed to `stem`, keeping its extension. Dots inside `stem` are kept.
fn sibling_with_stem(path: &Path, stem: &str) -> PathBuf {
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem.to_string(),
    };
    path.with_file_name(name)
}

impl Reconciler<'_> {
    /// Full reconciliation pass over `root`.
    ///
    /// Pruning runs on both sides of name normalization: a copy only becomes
    /// recognizable as superseded once its own name has been normalized.
    pub fn reconcile(&mut self, root: &Path) {
        self.organize_by_album(root);
        self.prune_superseded_copies(root);
        self.normalize_track_names(root);
        self.prune_superseded_copies(root);
    }

    /// Move every track under `root` into `root/{primary artist} - {album}`,
    /// taking its same-stem lyric file and its old directory's loose covers
    /// along.
    pub fn organize_by_album(&mut self, root: &Path) {
        let root = normalize_path(root);
        let tracks = scan_tracks(&root, self.library, self.tags);

        for group in group_by_album(tracks) {
            if group.artists.len() > 1 {
                warn!(
                    "album {:?} has {} artists, naming it after {:?}",
                    group.album,
                    group.artists.len(),
                    group.primary_artist()
                );
            }
            let target_dir = root.join(group.folder_name());
            self.move_group(&group, &target_dir);
        }
    }

    fn move_group(&mut self, group: &AlbumGroup, target_dir: &Path) {
        let mut covers_taken_from: HashSet<PathBuf> = HashSet::new();
        let mut dir_ready = false;

        for track in &group.tracks {
            // Already inside the album directory, possibly in a disc subfolder.
            if track.path.starts_with(target_dir) {
                continue;
            }
            if !dir_ready {
                if !self.ensure_dir(target_dir) {
                    return;
                }
                dir_ready = true;
            }

            let Some(name) = track.path.file_name() else {
                continue;
            };
            let outcome = self.rename(&track.path, &target_dir.join(name), self.policy);

            let lyric = lyric_sibling(&track.path);
            if outcome.vacated_source() && lyric.is_file() {
                if let Some(lyric_name) = lyric.file_name() {
                    self.rename(&lyric, &target_dir.join(lyric_name), self.policy);
                }
            }

            let Some(src_dir) = track.path.parent() else {
                continue;
            };
            if !covers_taken_from.insert(src_dir.to_path_buf()) {
                continue;
            }
            for cover in COVER_NAMES {
                let src = src_dir.join(cover);
                let dst = target_dir.join(cover);
                if src.is_file() && !dst.exists() {
                    self.rename(&src, &dst, self.policy);
                }
            }
        }
    }

    /// Delete tracks superseded by an existing `{track} - {title}` sibling
    /// carrying the same audio. Resumes an interrupted earlier run cleanly.
    pub fn prune_superseded_copies(&mut self, root: &Path) {
        for path in audio_files(root, self.library) {
            let tags = self.tags.read(&path);
            let (Some(track), Some(title)) = (
                tags.track.as_deref().and_then(parse_track_number),
                tags.title.as_deref(),
            ) else {
                continue;
            };
            let canonical = sibling_with_stem(&path, &track_file_stem(&track, title));
            if !canonical.is_file() || same_path(&path, &canonical) {
                continue;
            }
            if self.identical(&path, &canonical) {
                self.remove_duplicate(&path, &canonical);
            }
        }
    }

    /// Rename numbered tracks to `{track} - {title suffix}`; a same-stem
    /// lyric file follows its track.
    pub fn normalize_track_names(&mut self, root: &Path) {
        for path in audio_files(root, self.library) {
            let tags = self.tags.read(&path);
            let Some(track) = tags.track.as_deref().and_then(parse_track_number) else {
                info!("SKIP no track number: {}", path.display());
                self.stats.unnumbered += 1;
                continue;
            };
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if stem.starts_with(&format!("{track} - ")) {
                continue;
            }

            let target = sibling_with_stem(&path, &track_file_stem(&track, title_suffix(&stem)));
            let outcome = self.rename(&path, &target, self.policy);

            let lyric = lyric_sibling(&path);
            if !lyric.is_file() {
                continue;
            }
            let lyric_target = match &outcome {
                RenameOutcome::Moved(moved) => lyric_sibling(moved),
                RenameOutcome::Deduplicated => lyric_sibling(&target),
                _ => continue,
            };
            self.rename(&lyric, &lyric_target, self.policy);
        }
    }
}
