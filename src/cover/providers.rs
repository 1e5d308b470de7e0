use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{CoverSettings, ProviderKind};

const MB_SEARCH_URL: &str = "https://musicbrainz.org/ws/2/release/";
const CAA_RELEASE_URL: &str = "https://coverartarchive.org/release/";
const DOUBAN_SEARCH_URL: &str = "https://search.douban.com/music/subject_search";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120 Safari/537.36";

/// Why a provider produced no image. Every variant is non-fatal.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
    #[error("no result for {0:?}")]
    NotFound(String),
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// A source of album art queried by artist and album text.
pub trait CoverProvider {
    fn name(&self) -> &'static str;
    /// Raw image bytes of the best hit.
    fn fetch(&self, artist: &str, album: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Providers in the configured priority order. A provider whose HTTP client
/// cannot be built is left out with a warning.
pub fn build_providers(settings: &CoverSettings) -> Vec<Box<dyn CoverProvider>> {
    let timeout = Duration::from_secs(settings.http_timeout_secs);
    let mut providers: Vec<Box<dyn CoverProvider>> = Vec::new();
    for kind in &settings.providers {
        let built: Result<Box<dyn CoverProvider>, ProviderError> = match kind {
            ProviderKind::Musicbrainz => {
                MusicBrainzProvider::new(timeout, &settings.user_agent).map(|p| Box::new(p) as _)
            }
            ProviderKind::Douban => DoubanProvider::new(timeout).map(|p| Box::new(p) as _),
        };
        match built {
            Ok(p) => providers.push(p),
            Err(e) => warn!("cover provider {kind:?} unavailable: {e}"),
        }
    }
    providers
}

fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, ProviderError> {
    let resp = client.get(url).send()?;
    if !resp.status().is_success() {
        return Err(ProviderError::Status(resp.status().as_u16()));
    }
    let body = resp.bytes()?;
    if body.is_empty() {
        return Err(ProviderError::EmptyBody);
    }
    Ok(body.to_vec())
}

/// MusicBrainz release search plus the Cover Art Archive.
pub struct MusicBrainzProvider {
    client: Client,
}

impl MusicBrainzProvider {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    fn search_release_id(&self, query: &str) -> Result<String, ProviderError> {
        debug!("musicbrainz query: {query}");
        let resp = self
            .client
            .get(MB_SEARCH_URL)
            .query(&[("query", query), ("fmt", "json"), ("limit", "1")])
            .header("Accept", "application/json")
            .send()?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().map_err(|e| ProviderError::Parse(e.to_string()))?;
        first_release_id(&json).ok_or_else(|| ProviderError::NotFound(query.to_string()))
    }

    fn download_release_art(&self, release_id: &str) -> Result<Vec<u8>, ProviderError> {
        let resp = self
            .client
            .get(format!("{CAA_RELEASE_URL}{release_id}"))
            .header("Accept", "application/json")
            .send()?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().map_err(|e| ProviderError::Parse(e.to_string()))?;
        let url = front_image_url(&json)
            .ok_or_else(|| ProviderError::NotFound(format!("art for release {release_id}")))?;
        get_bytes(&self.client, &url)
    }
}

impl CoverProvider for MusicBrainzProvider {
    fn name(&self) -> &'static str {
        "musicbrainz"
    }

    fn fetch(&self, artist: &str, album: &str) -> Result<Vec<u8>, ProviderError> {
        let mut last = ProviderError::NotFound(album.to_string());
        for query in musicbrainz_queries(artist, album) {
            match self
                .search_release_id(&query)
                .and_then(|id| self.download_release_art(&id))
            {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!("musicbrainz: {e}");
                    last = e;
                }
            }
        }
        Err(last)
    }
}

/// Artist-qualified search first, then album alone.
pub fn musicbrainz_queries(artist: &str, album: &str) -> Vec<String> {
    if album.trim().is_empty() {
        return Vec::new();
    }
    let mut queries = Vec::with_capacity(2);
    if !artist.trim().is_empty() {
        queries.push(format!(r#"release:"{album}" AND artist:"{artist}""#));
    }
    queries.push(format!(r#"release:"{album}""#));
    queries
}

pub fn first_release_id(search: &Value) -> Option<String> {
    search
        .get("releases")?
        .as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// The `image` URL of the front image, else of the first image.
pub fn front_image_url(listing: &Value) -> Option<String> {
    let images = listing.get("images")?.as_array()?;
    let chosen = images
        .iter()
        .find(|img| img.get("front").and_then(Value::as_bool).unwrap_or(false))
        .or_else(|| images.first())?;
    chosen
        .get("image")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Douban music search page scraping.
pub struct DoubanProvider {
    client: Client,
}

static DOUBAN_URL_FIELDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""cover_url"\s*:\s*"([^"]+)""#,
        r#""pic"\s*:\s*"([^"]+)""#,
        r#""img"\s*:\s*"([^"]+)""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

impl DoubanProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_UA)
            .build()?;
        Ok(Self { client })
    }

    fn search(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        debug!("douban query: {text}");
        let resp = self
            .client
            .get(DOUBAN_SEARCH_URL)
            .query(&[("search_text", text), ("cat", "1003")])
            .header("Referer", "https://music.douban.com/")
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }
        let page = resp.text()?;
        let url = extract_douban_cover_url(&page)
            .ok_or_else(|| ProviderError::NotFound(text.to_string()))?;
        get_bytes(&self.client, &url)
    }
}

impl CoverProvider for DoubanProvider {
    fn name(&self) -> &'static str {
        "douban"
    }

    fn fetch(&self, artist: &str, album: &str) -> Result<Vec<u8>, ProviderError> {
        let album = album.trim();
        if album.is_empty() {
            return Err(ProviderError::NotFound(String::new()));
        }
        let artist = artist.trim();
        let mut queries = Vec::with_capacity(2);
        if !artist.is_empty() {
            queries.push(format!("{artist} {album}"));
        }
        queries.push(album.to_string());

        let mut last = ProviderError::NotFound(album.to_string());
        for q in queries {
            match self.search(&q) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!("douban: {e}");
                    last = e;
                }
            }
        }
        Err(last)
    }
}

/// First cover URL embedded in a search page's inline JSON, unescaped.
pub fn extract_douban_cover_url(page: &str) -> Option<String> {
    let raw = DOUBAN_URL_FIELDS
        .iter()
        .find_map(|re| re.captures(page).and_then(|c| c.get(1)))?
        .as_str();
    let url = raw.replace("\\u002F", "/").replace("\\/", "/");
    Some(unescape_html(&url))
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
