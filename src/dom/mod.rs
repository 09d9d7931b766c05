//! In-memory model of a rendered page.
//!
//! A [`Document`] is an arena tree of elements, text, comments and shadow
//! roots. It is either built programmatically or parsed from a saved HTML
//! snapshot, in which case declarative shadow roots
//! (`<template shadowrootmode="open">`) are attached to their hosts.
//!
//! ```
//! use chatmark::dom::Document;
//!
//! let doc = Document::parse_html("<main><p class='a'>Hello</p></main>");
//! let p = doc.query_selector(doc.root(), "main p.a").unwrap();
//! assert_eq!(doc.text_content(p), "Hello");
//! ```

mod arena;
mod element_ref;
mod select;
mod serialize;
mod shadow;
pub mod style;
mod tree_sink;

pub use arena::{Attribute, ChildrenIter, Document, Geometry, Node, NodeData, NodeId, html_name};
pub use element_ref::{ChatSelectors, ElementRef};
pub use select::SelectorList;
pub use serialize::escape_html;
pub use style::{ComputedStyle, StyleResolver, Visibility};
pub use tree_sink::DocumentSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use url::Url;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_meta_charset};

impl Document {
    /// Parse an HTML page, attaching declarative shadow roots.
    pub fn parse_html(html: &str) -> Self {
        let mut doc = parse_document(DocumentSink::new(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_document();
        doc.lift_declarative_shadow_roots();
        doc
    }

    /// Text of the `<title>` element.
    pub fn title(&self) -> Option<String> {
        let title = self.query_selector(self.root(), "title")?;
        self.trimmed_text(title)
    }
}

/// A rendered page: the document plus the URL it was loaded from.
pub struct Page {
    pub url: Url,
    pub document: Document,
}

impl Page {
    pub fn new(url: &str, document: Document) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self { url, document })
    }

    pub fn from_html(url: &str, html: &str) -> Result<Self> {
        Self::new(url, Document::parse_html(html))
    }

    /// Parse a saved page, sniffing its encoding.
    pub fn from_html_bytes(url: &str, bytes: &[u8]) -> Result<Self> {
        let html = decode_text(bytes, extract_meta_charset(bytes));
        Self::from_html(url, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarative_shadow_root() {
        let doc = Document::parse_html(
            r#"<body><x-msg><template shadowrootmode="open"><p>inside</p><slot></slot></template><b>light</b></x-msg></body>"#,
        );
        let host = doc.query_selector(doc.root(), "x-msg").expect("host");
        let root = doc.shadow_root(host).expect("shadow root");

        assert!(doc.query_selector(doc.root(), "template").is_none());
        assert!(doc.query_selector(doc.root(), "p").is_none());
        let p = doc.query_selector(root, "p").expect("p in shadow");
        assert_eq!(doc.text_content(p), "inside");

        let slot = doc.query_selector(root, "slot").expect("slot");
        let assigned = doc.assigned_nodes(slot);
        assert_eq!(assigned.len(), 1);
        assert_eq!(doc.tag(assigned[0]), Some("b"));
    }

    #[test]
    fn test_plain_template_is_kept() {
        let doc = Document::parse_html("<div><template><p>x</p></template></div>");
        assert!(doc.query_selector(doc.root(), "template").is_some());
    }

    #[test]
    fn test_title() {
        let doc = Document::parse_html("<title>  My chat - ChatGPT </title><p>x</p>");
        assert_eq!(doc.title().as_deref(), Some("My chat - ChatGPT"));
    }

    #[test]
    fn test_page_rejects_bad_url() {
        assert!(matches!(
            Page::from_html("not a url", "<p></p>"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_page_from_latin1_bytes() {
        let mut bytes = b"<meta charset=\"windows-1252\"><p>caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</p>");
        let page = Page::from_html_bytes("https://chatgpt.com/c/1", &bytes).expect("page");
        let p = page.document.query_selector(page.document.root(), "p").expect("p");
        assert_eq!(page.document.text_content(p), "café");
    }
}
