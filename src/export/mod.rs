//! Document assembly.
//!
//! Turns an extracted [`Conversation`] into the final document string.
//!
//! # Architecture
//!
//! The [`Assembler`] trait uses a builder pattern:
//! - `new()` creates an assembler with default configuration
//! - `with_config()` / `from_settings()` allow customization
//! - `assemble()` renders a conversation with an injected timestamp
//!
//! [`Exporter`] ties extraction and assembly together for one page and
//! refuses to start a second run while one is in flight.
//!
//! # Example
//!
//! ```
//! use chatmark::{Exporter, Page, Settings};
//! use chatmark::images::OfflineHost;
//!
//! let page = Page::from_html(
//!     "https://chatgpt.com/c/1",
//!     r#"<main><div data-message-author-role="user"><div class="markdown">hi</div></div></main>"#,
//! )?;
//! let exporter = Exporter::new(Settings::default());
//! let doc = exporter.export(&page, &OfflineHost)?.expect("not running");
//! assert!(doc.contains("## User\n\nhi"));
//! # Ok::<(), chatmark::Error>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::{ExportFormat, Settings};
use crate::dom::Page;
use crate::error::Result;
use crate::extract::{Conversation, extract_conversation};
use crate::images::EmbedHost;

mod json;
mod markdown;

pub use json::{JsonAssembler, JsonConfig};
pub use markdown::{MarkdownAssembler, MarkdownConfig};

/// Renders a conversation into a document.
pub trait Assembler {
    /// Render `conversation` as exported at `exported_at`.
    fn assemble(&self, conversation: &Conversation, exported_at: DateTime<Utc>) -> Result<String>;
}

/// RFC 3339 UTC with milliseconds, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render `conversation` in the format selected by `settings`.
pub fn render(settings: &Settings, conversation: &Conversation, exported_at: DateTime<Utc>) -> Result<String> {
    match settings.export_format {
        ExportFormat::Md => MarkdownAssembler::from_settings(settings).assemble(conversation, exported_at),
        ExportFormat::Json => JsonAssembler::from_settings(settings).assemble(conversation, exported_at),
    }
}

/// One-page export with a run guard.
#[derive(Debug, Default)]
pub struct Exporter {
    settings: Settings,
    running: AtomicBool,
}

impl Exporter {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether an export is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Extract and assemble `page`.
    ///
    /// Returns `Ok(None)` without doing anything when another export on this
    /// exporter has not finished yet.
    pub fn export(&self, page: &Page, host: &dyn EmbedHost) -> Result<Option<String>> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::debug!("export already running, ignoring request");
            return Ok(None);
        };
        let conversation = extract_conversation(page, &self.settings, host)?;
        render(&self.settings, &conversation, Utc::now()).map(Some)
    }
}

/// Holds the run flag; clears it on drop, including on early return.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
