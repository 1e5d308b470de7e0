use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::LibrarySettings;
use crate::library::{COVER_NAMES, audio_files, existing_cover};
use crate::tags::TagStore;
use crate::tools::MediaTools;

use super::format::{ImageFormat, sniff_file_format, sniff_image_format};
use super::providers::CoverProvider;

const EMBEDDED_STAGING: &str = ".albumkit_embedded";
const DOWNLOAD_STAGING: &str = ".albumkit_download";

/// Where the resolved cover came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSource {
    Embedded,
    Existing,
    Fetched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// No embedded art, no cover file and no usable provider hit.
    NoSource,
    /// A hand-placed cover does not decode. It is reported, never replaced.
    LockedUndecodable,
    /// Every repair and fallback was exhausted.
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverOutcome {
    Resolved {
        path: PathBuf,
        source: CoverSource,
        /// The cover was found in place with no embedded alternative.
        locked: bool,
    },
    Unresolved(Unresolved),
}

impl CoverOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CoverOutcome::Resolved { path, .. } => Some(path),
            CoverOutcome::Unresolved(_) => None,
        }
    }
}

/// Facts about one album directory gathered before resolution starts.
struct AlbumDir {
    dir: PathBuf,
    tracks: Vec<PathBuf>,
    /// First track (scan order) carrying embedded art.
    embedded_source: Option<PathBuf>,
}

/// Produces exactly one decodable cover per album directory.
pub struct CoverResolver<'a> {
    tags: &'a dyn TagStore,
    media: &'a MediaTools<'a>,
    providers: &'a [Box<dyn CoverProvider>],
    library: &'a LibrarySettings,
    online_fetch: bool,
    dry_run: bool,
}

impl<'a> CoverResolver<'a> {
    pub fn new(
        tags: &'a dyn TagStore,
        media: &'a MediaTools<'a>,
        providers: &'a [Box<dyn CoverProvider>],
        library: &'a LibrarySettings,
    ) -> Self {
        Self {
            tags,
            media,
            providers,
            library,
            online_fetch: true,
            dry_run: false,
        }
    }

    pub fn with_online_fetch(mut self, enabled: bool) -> Self {
        self.online_fetch = enabled;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn resolve(&self, dir: &Path) -> CoverOutcome {
        info!("COVER preparing {}", dir.display());
        let tracks = audio_files(dir, self.library);
        let embedded_source = tracks
            .iter()
            .find(|t| self.tags.has_embedded_cover(t))
            .cloned();
        let album = AlbumDir {
            dir: dir.to_path_buf(),
            tracks,
            embedded_source,
        };
        let existing = existing_cover(dir);

        let (cover, source) = match (album.embedded_source.as_deref(), existing) {
            (Some(src), existing) => match self.extract_embedded(&album, src, existing.as_deref()) {
                Some(path) => (path, CoverSource::Embedded),
                None => match existing {
                    Some(path) => {
                        info!("COVER keeping existing {}", path.display());
                        (path, CoverSource::Existing)
                    }
                    None => match self.fetch_online(&album) {
                        Some(path) => (path, CoverSource::Fetched),
                        None => return self.give_up(&album, Unresolved::NoSource),
                    },
                },
            },
            (None, Some(path)) => return self.finish_locked(&album, path),
            (None, None) => match self.fetch_online(&album) {
                Some(path) => (path, CoverSource::Fetched),
                None => return self.give_up(&album, Unresolved::NoSource),
            },
        };

        if self.dry_run && !cover.exists() {
            return self.finish(&album, cover, source, false);
        }
        let cover = self.normalize_extension(&cover);
        if self.media.is_image_decodable(&cover) {
            return self.finish(&album, cover, source, false);
        }
        self.repair(&album, cover, source)
    }

    /// Write the embedded art of `src` as the directory cover.
    ///
    /// With a cover file already in place, the embedded image only takes over
    /// when it decodes.
    fn extract_embedded(
        &self,
        album: &AlbumDir,
        src: &Path,
        existing: Option<&Path>,
    ) -> Option<PathBuf> {
        let Some(bytes) = self.tags.embedded_cover(src).filter(|b| !b.is_empty()) else {
            warn!("embedded art of {} could not be read", src.display());
            return None;
        };
        let format = sniff_image_format(&bytes).unwrap_or(ImageFormat::Jpeg);
        let target = album.dir.join(format.cover_name());

        if fs::read(&target).is_ok_and(|current| current == bytes) {
            return Some(target);
        }
        if self.dry_run {
            info!("COVER would extract art of {} to {}", src.display(), target.display());
            return Some(target);
        }

        let staging = album.dir.join(format!("{EMBEDDED_STAGING}.{}", format.extension()));
        if let Err(e) = fs::write(&staging, &bytes) {
            warn!("failed to write {}: {e}", staging.display());
            return None;
        }
        if existing.is_some() && !self.media.is_image_decodable(&staging) {
            info!("embedded art of {} does not decode", src.display());
            let _ = fs::remove_file(&staging);
            return None;
        }
        if let Err(e) = fs::rename(&staging, &target) {
            warn!("failed to place {}: {e}", target.display());
            let _ = fs::remove_file(&staging);
            return None;
        }
        info!("COVER {} -> {}", src.display(), target.display());
        Some(target)
    }

    /// Artist and album to search by, from the embedded-art track first.
    fn lookup_terms(&self, album: &AlbumDir) -> Option<(String, String)> {
        album
            .embedded_source
            .iter()
            .chain(album.tracks.iter())
            .find_map(|t| {
                let tags = self.tags.read(t);
                Some((tags.artist?, tags.album?))
            })
    }

    fn fetch_online(&self, album: &AlbumDir) -> Option<PathBuf> {
        if !self.online_fetch {
            info!("online cover lookup disabled for {}", album.dir.display());
            return None;
        }
        let Some((artist, title)) = self.lookup_terms(album) else {
            info!("no artist/album tags to search covers for {}", album.dir.display());
            return None;
        };

        for provider in self.providers {
            let bytes = match provider.fetch(&artist, &title) {
                Ok(bytes) if !bytes.is_empty() => bytes,
                Ok(_) => {
                    warn!("{} returned an empty image for {artist} - {title}", provider.name());
                    continue;
                }
                Err(e) => {
                    warn!("{} has no cover for {artist} - {title}: {e}", provider.name());
                    continue;
                }
            };
            let format = sniff_image_format(&bytes).unwrap_or(ImageFormat::Jpeg);
            let target = album.dir.join(format.cover_name());
            if self.dry_run {
                info!("COVER would save {} art to {}", provider.name(), target.display());
                return Some(target);
            }

            let staging = album.dir.join(format!("{DOWNLOAD_STAGING}.{}", format.extension()));
            if let Err(e) = fs::write(&staging, &bytes) {
                warn!("failed to write {}: {e}", staging.display());
                continue;
            }
            if !self.media.is_image_decodable(&staging) {
                warn!("{} returned an undecodable image", provider.name());
                let _ = fs::remove_file(&staging);
                continue;
            }
            if let Err(e) = fs::rename(&staging, &target) {
                warn!("failed to place {}: {e}", target.display());
                let _ = fs::remove_file(&staging);
                continue;
            }
            info!("COVER fetched from {}: {artist} - {title}", provider.name());
            self.embed_everywhere(album, &bytes);
            return Some(target);
        }
        None
    }

    fn embed_everywhere(&self, album: &AlbumDir, image: &[u8]) {
        for track in &album.tracks {
            if let Err(e) = self.tags.write_cover(track, image) {
                warn!("failed to embed cover into {}: {e}", track.display());
            }
        }
    }

    /// Rename the cover so its extension matches its actual encoding.
    fn normalize_extension(&self, cover: &Path) -> PathBuf {
        let actual = sniff_file_format(cover).or_else(|| {
            self.media
                .probe_image_codec(cover)
                .as_deref()
                .and_then(ImageFormat::from_codec_name)
        });
        let Some(actual) = actual else {
            return cover.to_path_buf();
        };
        if ImageFormat::from_path(cover) == Some(actual) {
            return cover.to_path_buf();
        }

        let target = cover.with_file_name(actual.cover_name());
        if target.exists() {
            return target;
        }
        if self.dry_run {
            info!("COVER would rename {} to {}", cover.display(), target.display());
            return cover.to_path_buf();
        }
        match fs::rename(cover, &target) {
            Ok(()) => {
                info!(
                    "COVER {} is {}, renamed to {}",
                    cover.display(),
                    actual.extension(),
                    target.display()
                );
                target
            }
            Err(e) => {
                warn!("failed to rename {}: {e}", cover.display());
                cover.to_path_buf()
            }
        }
    }

    /// Repair chain for an undecodable, unlocked cover: sibling file,
    /// re-encode, fresh extraction, then network.
    fn repair(&self, album: &AlbumDir, cover: PathBuf, source: CoverSource) -> CoverOutcome {
        warn!("cover {} does not decode, repairing", cover.display());

        let sibling = ImageFormat::from_path(&cover)
            .map(|f| cover.with_file_name(f.other().cover_name()))
            .filter(|p| p.is_file());
        if let Some(sibling) = sibling {
            if self.media.is_image_decodable(&sibling) {
                info!("COVER using alternative {}", sibling.display());
                return self.finish(album, sibling, source, false);
            }
        }

        if self.reencode(&cover) {
            let fixed = self.normalize_extension(&cover);
            if self.dry_run || self.media.is_image_decodable(&fixed) {
                info!("COVER repaired {}", fixed.display());
                return self.finish(album, fixed, source, false);
            }
        }

        if let Some(src) = album.embedded_source.as_deref() {
            if let Some(path) = self.extract_embedded(album, src, None) {
                if self.dry_run || self.media.is_image_decodable(&path) {
                    info!("COVER re-extracted from {}", src.display());
                    return self.finish(album, path, CoverSource::Embedded, false);
                }
            }
        }

        match self.fetch_online(album) {
            Some(path) => self.finish(album, path, CoverSource::Fetched, false),
            None => self.give_up(album, Unresolved::Undecodable),
        }
    }

    fn reencode(&self, cover: &Path) -> bool {
        if self.dry_run {
            info!("COVER would re-encode {}", cover.display());
            return true;
        }
        match self.media.reencode_image(cover) {
            Ok(()) => true,
            Err(e) => {
                warn!("re-encoding {} failed: {e}", cover.display());
                false
            }
        }
    }

    fn finish_locked(&self, album: &AlbumDir, cover: PathBuf) -> CoverOutcome {
        if !self.media.is_image_decodable(&cover) {
            warn!(
                "cover {} does not decode and is left untouched, skipping {}",
                cover.display(),
                album.dir.display()
            );
            return CoverOutcome::Unresolved(Unresolved::LockedUndecodable);
        }
        info!("COVER using existing {}", cover.display());
        self.finish(album, cover, CoverSource::Existing, true)
    }

    /// Accept `cover` and drop any other cover file in the directory.
    fn finish(
        &self,
        album: &AlbumDir,
        cover: PathBuf,
        source: CoverSource,
        locked: bool,
    ) -> CoverOutcome {
        for name in COVER_NAMES {
            let other = album.dir.join(name);
            if other == cover || !other.is_file() {
                continue;
            }
            info!("COVER removing extra {}", other.display());
            if !self.dry_run {
                if let Err(e) = fs::remove_file(&other) {
                    warn!("failed to remove {}: {e}", other.display());
                }
            }
        }
        CoverOutcome::Resolved {
            path: cover,
            source,
            locked,
        }
    }

    fn give_up(&self, album: &AlbumDir, reason: Unresolved) -> CoverOutcome {
        warn!("SKIP no usable cover for {} ({reason:?})", album.dir.display());
        CoverOutcome::Unresolved(reason)
    }
}
