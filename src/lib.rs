//! # chatmark
//!
//! Convert AI chat conversations, as rendered by ChatGPT, Gemini or Grok,
//! into Markdown or JSON.
//!
//! ## Features
//!
//! - Finds messages and their roles on each supported front-end
//! - Walks shadow roots and slots the way the page renders them
//! - Recovers TeX from KaTeX, MathJax and MathML
//! - Finds images the walker missed and optionally embeds them as data URIs
//! - Drops consecutive duplicate messages
//!
//! ## Quick Start
//!
//! ```
//! use chatmark::{Page, Settings, extract_conversation};
//! use chatmark::images::OfflineHost;
//!
//! let html = r#"<main>
//!   <div data-message-author-role="user"><div class="markdown">What is <code>x^2</code>?</div></div>
//!   <div data-message-author-role="assistant"><div class="markdown">A square.</div></div>
//! </main>"#;
//! let page = Page::from_html("https://chatgpt.com/c/1", html)?;
//! let conversation = extract_conversation(&page, &Settings::default(), &OfflineHost)?;
//!
//! assert_eq!(conversation.messages.len(), 2);
//! assert_eq!(conversation.messages[1].markdown, "A square.");
//! # Ok::<(), chatmark::Error>(())
//! ```
//!
//! ## Pipeline
//!
//! A [`Page`] (URL plus [`Document`](dom::Document)) goes through a
//! [`platform`] adapter, which lists the messages. Each message is rendered by
//! the [`markdown`] walker with help from [`math`] and [`images`], then the
//! [`export`] assemblers produce the final document.

pub mod config;
pub mod context;
pub mod dom;
pub mod error;
pub mod export;
pub mod extract;
pub mod images;
pub mod markdown;
pub mod math;
pub(crate) mod patterns;
pub mod platform;
pub(crate) mod util;

pub use config::{DataUriMode, ExportFormat, HeadingStyle, Settings};
pub use dom::{Document, Page};
pub use error::{Error, Result};
pub use export::{Assembler, Exporter, JsonAssembler, MarkdownAssembler, render};
pub use extract::{Conversation, ConversationMessage, extract_conversation};
pub use platform::{Platform, PlatformKind, Role};
