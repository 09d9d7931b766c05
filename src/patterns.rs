//! Cached regex patterns for the conversion heuristics.
//!
//! Uses LazyLock to compile patterns once on first use.

use regex_lite::Regex;
use std::sync::LazyLock;

// === Formula patterns ===

/// A TeX control sequence such as `\frac`
pub static TEX_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+").unwrap());

/// Super- or subscript marker
pub static TEX_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\^_]").unwrap());

/// Any `\begin{env}`
pub static TEX_ENV_BEGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\{[^}]+\}").unwrap());

/// `\begin{array}{colspec}`
pub static TEX_ARRAY_BEGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\{array\}\{[^}]*\}").unwrap());

/// Three or more newlines
pub static MULTI_NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Newline, optional whitespace, newline
pub static BLANK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

// === Markup patterns ===

/// `language-xxx` class on a code element
pub static CODE_LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)language-([a-z0-9_+-]+)").unwrap());

/// Caption line a relocated image block is placed before
pub static CAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(图示[:：]|图[:：]|Figure[:：]|Fig\.[:：])").unwrap());

/// Whitespace run ending in a newline, newlines included
pub static SPACE_BEFORE_NEWLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\x{A0}]+\n").unwrap());

/// Run of newlines
pub static NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

// === Image patterns ===

/// URL ending in an image file extension, query allowed
pub static IMAGE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|jpe?g|gif|webp|bmp|svg)(\?.*)?$").unwrap());

/// Google licensed image thumbnails
pub static LICENSED_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)encrypted-tbn\d+\.gstatic\.com/licensed-image").unwrap());

pub static GEMINI_UPLOADED_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(预览图|上传.*图片|uploaded)").unwrap());

pub static CHATGPT_FILE_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(/backend-api/estuary/content\?id=file_|\bid=file_)").unwrap()
});

pub static CHATGPT_UPLOADED_ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(已上传|uploaded)").unwrap());

pub static CHATGPT_IMAGE_ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(图片|image)").unwrap());

pub static GROK_UPLOADED_ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(uploaded|attachment|附件|上传)").unwrap());

// === Platform patterns ===

/// ` - Site name` suffix of a page title
pub static TITLE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-\s+.*$").unwrap());

/// Grok message that starts with a `You:` speaker label
pub static GROK_YOU_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*you\s*[:：]").unwrap());

pub static GROK_YOU_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bYou\b").unwrap());

pub static GROK_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bGrok\b").unwrap());

pub static EXPAND_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(显示|展开|show)").unwrap());

pub static COLLAPSE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(隐藏|收起|hide)").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url() {
        assert!(IMAGE_URL_RE.is_match("https://x/a.PNG"));
        assert!(IMAGE_URL_RE.is_match("/b.jpeg?w=10"));
        assert!(!IMAGE_URL_RE.is_match("/page.html"));
    }

    #[test]
    fn test_caption() {
        assert!(CAPTION_RE.is_match("图示：结构"));
        assert!(CAPTION_RE.is_match("Fig.: overview"));
        assert!(!CAPTION_RE.is_match("A Figure: not at start"));
    }

    #[test]
    fn test_title_suffix() {
        assert_eq!(TITLE_SUFFIX_RE.replace("Plan - ChatGPT", ""), "Plan");
        assert_eq!(TITLE_SUFFIX_RE.replace("well-known", ""), "well-known");
    }
}
