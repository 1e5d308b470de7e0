use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LibrarySettings;
use crate::library::naming::{normalize_text, split_artist_title, strip_track_prefix};
use crate::library::{LYRIC_EXTENSION, audio_files, is_audio_file, lyric_files};
use crate::reconcile::{ConflictPolicy, Reconciler, RenameOutcome};
use crate::tags::TagStore;

use super::lrc::{decode_lyric_bytes, parse_metadata};

/// Match keys of one lyric file, all normalized with [`normalize_text`].
#[derive(Debug, Clone)]
pub struct LyricCandidate {
    pub path: PathBuf,
    /// `[ti:]` value.
    pub title: String,
    /// `[ar:]` value.
    pub artist: String,
    pub stem: String,
    /// Stem without a leading `"{number} - "`.
    pub stem_strip: String,
    /// Text before the first `" - "` of the stem.
    pub stem_artist: String,
    /// Text after the first `" - "` of the stem (the whole stem without one).
    pub stem_title: String,
}

impl LyricCandidate {
    pub fn read(path: &Path) -> Self {
        let text = fs::read(path).map(|b| decode_lyric_bytes(&b)).unwrap_or_default();
        let meta = parse_metadata(&text);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem_artist, stem_title) = split_artist_title(&stem);
        Self {
            path: path.to_path_buf(),
            title: normalize_text(meta.title.as_deref().unwrap_or("")),
            artist: normalize_text(meta.artist.as_deref().unwrap_or("")),
            stem_strip: normalize_text(strip_track_prefix(&stem)),
            stem_artist: normalize_text(stem_artist),
            stem_title: normalize_text(stem_title),
            stem: normalize_text(&stem),
        }
    }

    fn dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Match keys of a track that still lacks a lyric file.
#[derive(Debug, Clone)]
pub struct TrackKeys {
    pub dir: PathBuf,
    pub title: String,
    pub artist: String,
    pub stem: String,
    pub stem_strip: String,
}

impl TrackKeys {
    pub fn new(path: &Path, title: &str, artist: &str) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            title: normalize_text(title),
            artist: normalize_text(artist),
            stem_strip: normalize_text(strip_track_prefix(&stem)),
            stem: normalize_text(&stem),
        }
    }

    /// Artists agree unless both are known and differ.
    fn artist_compatible(&self, other: &str) -> bool {
        self.artist.is_empty() || other.is_empty() || self.artist == other
    }
}

fn same_stem(track: &TrackKeys, lrc: &LyricCandidate) -> bool {
    lrc.stem == track.stem || lrc.stem_strip == track.stem_strip
}

fn stem_title_match(track: &TrackKeys, lrc: &LyricCandidate) -> bool {
    !lrc.stem_title.is_empty()
        && lrc.stem_title == track.stem_strip
        && track.artist_compatible(&lrc.stem_artist)
}

fn tag_title_match(track: &TrackKeys, lrc: &LyricCandidate) -> bool {
    !track.title.is_empty()
        && (lrc.title == track.title || lrc.stem_title == track.title)
        && (lrc.artist.is_empty() || lrc.artist == track.artist)
}

fn loose_stem_match(track: &TrackKeys, lrc: &LyricCandidate) -> bool {
    (same_stem(track, lrc) || lrc.stem_title == track.stem_strip)
        && track.artist_compatible(&lrc.stem_artist)
}

/// Index of the best unused candidate for `track`, first hit of the cascade:
///
/// 1. same directory, same stem (optionally without the track number)
/// 2. same directory, title taken from an `Artist - Title` lyric file name
/// 3. same directory, in-band `[ti:]` equals the title tag
/// 4. like 3, anywhere in the tree
/// 5. same directory, any stem-derived match with compatible artists
pub fn find_match(
    track: &TrackKeys,
    candidates: &[LyricCandidate],
    used: &HashSet<PathBuf>,
) -> Option<usize> {
    let open = |c: &LyricCandidate| !used.contains(&c.path);
    let local = |c: &LyricCandidate| open(c) && c.dir() == Some(track.dir.as_path());

    let position = |pred: &dyn Fn(&LyricCandidate) -> bool| candidates.iter().position(pred);

    position(&|c| local(c) && same_stem(track, c))
        .or_else(|| position(&|c| local(c) && stem_title_match(track, c)))
        .or_else(|| position(&|c| local(c) && tag_title_match(track, c)))
        .or_else(|| position(&|c| open(c) && tag_title_match(track, c)))
        .or_else(|| position(&|c| local(c) && loose_stem_match(track, c)))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlignStats {
    pub bound: usize,
    pub unmatched: usize,
}

/// Binds loose lyric files to the tracks that lack one.
pub struct LyricAligner<'a> {
    tags: &'a dyn TagStore,
    library: &'a LibrarySettings,
}

impl<'a> LyricAligner<'a> {
    pub fn new(tags: &'a dyn TagStore, library: &'a LibrarySettings) -> Self {
        Self { tags, library }
    }

    /// Lyric files whose stem already names a track beside them.
    fn is_paired(&self, lyric: &Path) -> bool {
        let (Some(dir), Some(stem)) = (lyric.parent(), lyric.file_stem()) else {
            return false;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return false;
        };
        entries.filter_map(Result::ok).map(|e| e.path()).any(|p| {
            p.file_stem() == Some(stem) && p.is_file() && is_audio_file(&p, self.library)
        })
    }

    /// Move matched lyric files next to their tracks as `{track stem}.lrc`.
    /// Moves go through `reconciler`, so they honor its dry-run mode and never
    /// overwrite.
    pub fn align(&self, root: &Path, reconciler: &mut Reconciler<'_>) -> AlignStats {
        let candidates: Vec<LyricCandidate> = lyric_files(root, self.library)
            .iter()
            .map(|p| LyricCandidate::read(p))
            .collect();
        let mut used: HashSet<PathBuf> = candidates
            .iter()
            .filter(|c| self.is_paired(&c.path))
            .map(|c| c.path.clone())
            .collect();

        let mut stats = AlignStats::default();
        for track in audio_files(root, self.library) {
            let target = track.with_extension(LYRIC_EXTENSION);
            if target.exists() {
                continue;
            }
            let tags = self.tags.read(&track);
            let keys = TrackKeys::new(&track, tags.title_or_empty(), tags.artist_or_empty());

            let Some(idx) = find_match(&keys, &candidates, &used) else {
                debug!("no lyrics for {}", track.display());
                stats.unmatched += 1;
                continue;
            };
            let lyric = &candidates[idx].path;
            used.insert(lyric.clone());
            match reconciler.rename(lyric, &target, ConflictPolicy::Suffix) {
                RenameOutcome::Moved(to) => {
                    info!("LYRIC {} -> {}", lyric.display(), to.display());
                    stats.bound += 1;
                }
                RenameOutcome::Unchanged => stats.bound += 1,
                _ => stats.unmatched += 1,
            }
        }
        stats
    }
}
