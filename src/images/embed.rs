//! Writing image references, optionally as inline data URIs.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::config::{DataUriMode, Settings};
use crate::dom::{Document, NodeId, escape_html};
use crate::markdown::Fragment;
use crate::util::{detect_mime_type, extract_image_dimensions};

use super::{ConversionState, ImageRef, markdown_image};

/// Default time budget for one image fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Why an image could not be embedded. Never fatal for the export.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image source not available to this host")]
    Unsupported,
}

/// Raw image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageData {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    fn within(self, limit: usize) -> Result<Self, EmbedError> {
        if self.bytes.len() > limit {
            Err(EmbedError::TooLarge { limit })
        } else {
            Ok(self)
        }
    }
}

/// What the environment can do to get at image bytes.
///
/// Both capabilities default to [`EmbedError::Unsupported`].
pub trait EmbedHost {
    /// Copy the pixels of an image already present on the page.
    fn copy_pixels(&self, _dom: &Document, _origin: NodeId, _source: &str) -> Result<ImageData, EmbedError> {
        Err(EmbedError::Unsupported)
    }

    /// Fetch an image over the network, reading at most `max_bytes + 1` bytes.
    fn fetch(&self, _url: &Url, _max_bytes: usize) -> Result<ImageData, EmbedError> {
        Err(EmbedError::Unsupported)
    }
}

/// A host with no access to image bytes. Every image keeps its URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineHost;

impl EmbedHost for OfflineHost {}

/// Host for a page saved to disk.
///
/// Pixel copies read saved assets inside the asset directory (relative
/// sources or `file:` URLs); fetches go over HTTP with an optional cookie.
pub struct SnapshotHost {
    agent: ureq::Agent,
    cookie: Option<String>,
    asset_dir: Option<PathBuf>,
}

impl SnapshotHost {
    pub fn new() -> Self {
        Self {
            agent: build_agent(FETCH_TIMEOUT),
            cookie: None,
            asset_dir: None,
        }
    }

    /// Directory relative image sources are resolved against.
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }

    /// `Cookie` header sent with every fetch.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Saved asset for `source`, confined to the asset directory.
    ///
    /// Site-relative sources (`/x.png`, `//cdn/x.png`) name server paths,
    /// not files, and are left to the fetch path.
    fn local_path(&self, source: &str) -> Result<PathBuf, EmbedError> {
        let asset_dir = self.asset_dir.as_ref().ok_or(EmbedError::Unsupported)?;
        let path = match Url::parse(source) {
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path().map_err(|_| EmbedError::Unsupported)?
            }
            Err(url::ParseError::RelativeUrlWithoutBase) if !source.starts_with(['/', '\\']) => {
                let path = source.split(['?', '#']).next().unwrap_or(source);
                let decoded = percent_decode_str(path)
                    .decode_utf8()
                    .map_err(|_| EmbedError::Unsupported)?;
                let relative = Path::new(decoded.as_ref());
                if relative.has_root() {
                    return Err(EmbedError::Unsupported);
                }
                asset_dir.join(relative)
            }
            _ => return Err(EmbedError::Unsupported),
        };

        let root = asset_dir.canonicalize()?;
        let resolved = path.canonicalize()?;
        if !resolved.starts_with(&root) {
            tracing::debug!(source, "image path escapes the asset directory");
            return Err(EmbedError::Unsupported);
        }
        Ok(resolved)
    }
}

impl Default for SnapshotHost {
    fn default() -> Self {
        Self::new()
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

impl EmbedHost for SnapshotHost {
    fn copy_pixels(&self, _dom: &Document, _origin: NodeId, source: &str) -> Result<ImageData, EmbedError> {
        let path = self.local_path(source)?;
        let bytes = std::fs::read(&path)?;
        match extract_image_dimensions(&bytes) {
            Some((w, h)) if w > 0 && h > 0 => {}
            _ => return Err(EmbedError::Unsupported),
        }
        let mime = detect_mime_type(&path.to_string_lossy(), &bytes).ok_or(EmbedError::Unsupported)?;
        Ok(ImageData {
            bytes,
            mime: mime.to_string(),
        })
    }

    fn fetch(&self, url: &Url, max_bytes: usize) -> Result<ImageData, EmbedError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EmbedError::Unsupported);
        }
        let mut request = self.agent.get(url.as_str());
        if let Some(cookie) = &self.cookie {
            request = request.set("Cookie", cookie);
        }
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(EmbedError::Status(code)),
            Err(ureq::Error::Transport(transport)) => return Err(EmbedError::Http(transport.to_string())),
        };

        let header_mime = response
            .header("Content-Type")
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .filter(|v| v.starts_with("image/"));

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(max_bytes as u64 + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() > max_bytes {
            return Err(EmbedError::TooLarge { limit: max_bytes });
        }

        let mime = detect_mime_type(url.path(), &bytes)
            .map(str::to_string)
            .or(header_mime)
            .ok_or(EmbedError::Unsupported)?;
        Ok(ImageData { bytes, mime })
    }
}

/// Serialize a fragment, writing each referenced image.
///
/// Images are resolved once each, in discovery order. With embedding off or
/// on any failure the image is written as `![alt](source)`.
pub fn resolve_images(
    fragment: &Fragment,
    state: &ConversionState,
    settings: &Settings,
    dom: &Document,
    base: &Url,
    host: &dyn EmbedHost,
) -> String {
    let mut ids = fragment.image_ids();
    ids.sort_unstable();
    ids.dedup();

    let written: HashMap<_, _> = ids
        .into_iter()
        .filter_map(|id| state.get(id))
        .map(|image| (image.id, write_image(image, settings, dom, base, host)))
        .collect();

    fragment.render(|id| written.get(&id).cloned().unwrap_or_default())
}

fn write_image(
    image: &ImageRef,
    settings: &Settings,
    dom: &Document,
    base: &Url,
    host: &dyn EmbedHost,
) -> String {
    if !settings.embed_images_in_markdown {
        return markdown_image(&image.alt, &image.source);
    }
    if image.source.starts_with("data:") {
        return data_uri_image(&image.alt, &image.source, settings.data_uri_image_mode);
    }
    match embed(image, settings, dom, base, host) {
        Ok(uri) => data_uri_image(&image.alt, &uri, settings.data_uri_image_mode),
        Err(e) => {
            tracing::debug!(source = %image.source, error = %e, "image not embedded, keeping URL");
            markdown_image(&image.alt, &image.source)
        }
    }
}

fn embed(
    image: &ImageRef,
    settings: &Settings,
    dom: &Document,
    base: &Url,
    host: &dyn EmbedHost,
) -> Result<String, EmbedError> {
    let limit = settings.max_embed_image_bytes;
    let mut last = EmbedError::Unsupported;

    if let Some(origin) = image.origin_el {
        match host
            .copy_pixels(dom, origin, &image.source)
            .and_then(|data| data.within(limit))
        {
            Ok(data) => return Ok(data.to_data_uri()),
            Err(e) => {
                tracing::debug!(source = %image.source, error = %e, "pixel copy failed");
                last = e;
            }
        }
    }

    if !settings.allow_image_fetch {
        return Err(last);
    }
    let url = base.join(&image.source).map_err(|_| EmbedError::Unsupported)?;
    let data = host.fetch(&url, limit)?.within(limit)?;
    Ok(data.to_data_uri())
}

fn data_uri_image(alt: &str, uri: &str, mode: DataUriMode) -> String {
    match mode {
        DataUriMode::Html => format!(r#"<img alt="{}" src="{uri}" />"#, escape_html(alt)),
        DataUriMode::Md => markdown_image(alt, uri),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Host that serves fixed bytes and records what was asked.
    #[derive(Default)]
    struct FakeHost {
        pixels: Option<Vec<u8>>,
        fetched: RefCell<Vec<String>>,
    }

    impl EmbedHost for FakeHost {
        fn copy_pixels(&self, _dom: &Document, _origin: NodeId, _source: &str) -> Result<ImageData, EmbedError> {
            self.pixels
                .clone()
                .map(|bytes| ImageData {
                    bytes,
                    mime: "image/png".to_string(),
                })
                .ok_or(EmbedError::Unsupported)
        }

        fn fetch(&self, url: &Url, _max_bytes: usize) -> Result<ImageData, EmbedError> {
            self.fetched.borrow_mut().push(url.to_string());
            Err(EmbedError::Status(403))
        }
    }

    fn setup() -> (Document, ConversionState, Fragment, Url) {
        let mut dom = Document::new();
        let img = dom.append_element(dom.root(), "img", &[]);
        let mut state = ConversionState::new();
        let a = state.push("a \"b\"", "/pics/a.png", Some(img));
        let b = state.push("b", "data:image/gif;base64,R0lG", None);
        let unused = state.push("c", "/unused.png", None);
        let mut f = Fragment::image(a);
        f.push_str(" ");
        f.push_image(b);
        f.push_str(" ");
        f.push_image(a);
        assert!(!f.image_ids().contains(&unused));
        (dom, state, f, Url::parse("https://chatgpt.com/c/1").unwrap())
    }

    #[test]
    fn test_embedding_off_writes_urls() {
        let (dom, state, f, base) = setup();
        let out = resolve_images(&f, &state, &Settings::default(), &dom, &base, &OfflineHost);
        assert_eq!(
            out,
            "![a \"b\"](/pics/a.png) ![b](data:image/gif;base64,R0lG) ![a \"b\"](/pics/a.png)"
        );
    }

    #[test]
    fn test_pixel_copy_html_mode() {
        let (dom, state, f, base) = setup();
        let settings = Settings {
            embed_images_in_markdown: true,
            ..Settings::default()
        };
        let host = FakeHost {
            pixels: Some(vec![1, 2, 3]),
            ..FakeHost::default()
        };
        let out = resolve_images(&f, &state, &settings, &dom, &base, &host);
        assert_eq!(
            out,
            "<img alt=\"a &quot;b&quot;\" src=\"data:image/png;base64,AQID\" /> \
             <img alt=\"b\" src=\"data:image/gif;base64,R0lG\" /> \
             <img alt=\"a &quot;b&quot;\" src=\"data:image/png;base64,AQID\" />"
        );
    }

    #[test]
    fn test_too_large_and_fetch_failure_fall_back() {
        let (dom, state, f, base) = setup();
        let settings = Settings {
            embed_images_in_markdown: true,
            allow_image_fetch: true,
            max_embed_image_bytes: 2,
            data_uri_image_mode: DataUriMode::Md,
            ..Settings::default()
        };
        let host = FakeHost {
            pixels: Some(vec![1, 2, 3]),
            ..FakeHost::default()
        };
        let out = resolve_images(&f, &state, &settings, &dom, &base, &host);
        assert_eq!(
            out,
            "![a \"b\"](/pics/a.png) ![b](data:image/gif;base64,R0lG) ![a \"b\"](/pics/a.png)"
        );
        assert_eq!(*host.fetched.borrow(), vec!["https://chatgpt.com/pics/a.png"]);
    }

    #[test]
    fn test_snapshot_host_reads_local_asset() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&4u32.to_be_bytes());
        png.extend_from_slice(&3u32.to_be_bytes());
        std::fs::create_dir(dir.path().join("chat files")).unwrap();
        std::fs::write(dir.path().join("chat files/a.png"), &png).unwrap();

        let host = SnapshotHost::new().with_asset_dir(dir.path());
        let dom = Document::new();
        let data = host
            .copy_pixels(&dom, dom.root(), "chat%20files/a.png?x=1")
            .unwrap();
        assert_eq!(data.mime, "image/png");
        assert_eq!(data.bytes, png);

        assert!(matches!(
            host.copy_pixels(&dom, dom.root(), "https://cdn/a.png"),
            Err(EmbedError::Unsupported)
        ));
        assert!(matches!(
            host.copy_pixels(&dom, dom.root(), "missing.png"),
            Err(EmbedError::Io(_))
        ));
    }

    #[test]
    fn test_snapshot_host_stays_in_asset_dir() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("private.png");
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&2u32.to_be_bytes());
        png.extend_from_slice(&2u32.to_be_bytes());
        std::fs::write(&secret, &png).unwrap();

        let assets = tempfile::tempdir().unwrap();
        let host = SnapshotHost::new().with_asset_dir(assets.path());
        let dom = Document::new();

        let absolute = secret.to_str().unwrap().to_string();
        let file_url = Url::from_file_path(&secret).unwrap().to_string();
        let depth = assets.path().components().count();
        let climbing = format!("{}{}", "../".repeat(depth), absolute.trim_start_matches('/'));

        for source in [absolute.as_str(), file_url.as_str(), climbing.as_str(), "//cdn/x.png"] {
            assert!(
                matches!(host.copy_pixels(&dom, dom.root(), source), Err(EmbedError::Unsupported)),
                "{source} should not be read"
            );
        }
        assert!(matches!(
            SnapshotHost::new().copy_pixels(&dom, dom.root(), "a.png"),
            Err(EmbedError::Unsupported)
        ));
    }

    #[test]
    fn test_site_relative_source_is_fetched() {
        let assets = tempfile::tempdir().unwrap();
        let mut dom = Document::new();
        let img = dom.append_element(dom.root(), "img", &[]);
        let mut state = ConversionState::new();
        let id = state.push("a", "/pics/a.png", Some(img));
        let settings = Settings {
            embed_images_in_markdown: true,
            allow_image_fetch: true,
            ..Settings::default()
        };
        let host = SnapshotHost::new().with_asset_dir(assets.path());
        let base = Url::parse("https://chatgpt.com/c/1").unwrap();

        assert!(matches!(
            host.copy_pixels(&dom, img, "/pics/a.png"),
            Err(EmbedError::Unsupported)
        ));
        let fake = FakeHost::default();
        let out = resolve_images(&Fragment::image(id), &state, &settings, &dom, &base, &fake);
        assert_eq!(out, "![a](/pics/a.png)");
        assert_eq!(*fake.fetched.borrow(), vec!["https://chatgpt.com/pics/a.png"]);
    }
}
