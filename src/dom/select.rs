//! CSS selector queries.
//!
//! Queries walk the light tree of their scope in document order. They never
//! enter shadow roots; use [`Document::shadow_root`] to reach encapsulated
//! content explicitly.

use cssparser::{ParseError, Parser, ParserInput};
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::parser::Selector;

use super::arena::{Document, NodeId};
use super::element_ref::{ChatSelectors, ElementRef};

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone)]
pub struct SelectorList(Vec<Selector<ChatSelectors>>);

impl SelectorList {
    /// Parse a selector list, returning `None` when it is not valid CSS.
    pub fn parse(css: &str) -> Option<Self> {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let selectors = parse_selector_list(&mut parser).ok()?;
        parser.expect_exhausted().ok()?;
        Some(Self(selectors))
    }

    pub fn selectors(&self) -> &[Selector<ChatSelectors>] {
        &self.0
    }

    /// Whether any selector of the list matches `id`.
    pub fn matches(&self, dom: &Document, id: NodeId) -> bool {
        if !dom.is_element(id) {
            return false;
        }
        let elem = ElementRef::new(dom, id);
        self.0.iter().any(|sel| matches_one(sel, elem))
    }
}

/// Parse a comma-separated list of selectors.
pub(crate) fn parse_selector_list<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Vec<Selector<ChatSelectors>>, ParseError<'i, ()>> {
    let location = parser.current_source_location();
    let selectors = selectors::parser::SelectorList::parse(
        &ChatSelectors,
        parser,
        selectors::parser::ParseRelative::No,
    )
    .map_err(|_| location.new_custom_error(()))?;

    Ok(selectors.slice().to_vec())
}

/// Match one selector against an element.
pub(crate) fn matches_one(selector: &Selector<ChatSelectors>, elem: ElementRef<'_>) -> bool {
    let mut caches = SelectorCaches::default();
    let mut context = MatchingContext::new(
        selectors::matching::MatchingMode::Normal,
        None,
        &mut caches,
        selectors::context::QuirksMode::NoQuirks,
        selectors::matching::NeedsSelectorFlags::No,
        selectors::matching::MatchingForInvalidation::No,
    );
    selectors::matching::matches_selector(selector, 0, None, &elem, &mut context)
}

fn compile(css: &str) -> Option<SelectorList> {
    let list = SelectorList::parse(css);
    if list.is_none() {
        tracing::debug!(selector = css, "invalid selector");
    }
    list
}

/// Selector queries.
impl Document {
    /// Whether `id` matches the selector.
    pub fn matches(&self, id: NodeId, css: &str) -> bool {
        compile(css).is_some_and(|list| list.matches(self, id))
    }

    /// First light-tree descendant of `scope` matching the selector.
    pub fn query_selector(&self, scope: NodeId, css: &str) -> Option<NodeId> {
        let list = compile(css)?;
        self.descendants(scope)
            .into_iter()
            .find(|&id| list.matches(self, id))
    }

    /// All light-tree descendants of `scope` matching the selector, in tree
    /// order.
    pub fn query_selector_all(&self, scope: NodeId, css: &str) -> Vec<NodeId> {
        let Some(list) = compile(css) else {
            return Vec::new();
        };
        self.descendants(scope)
            .into_iter()
            .filter(|&id| list.matches(self, id))
            .collect()
    }

    /// Nearest inclusive ancestor of `id` matching the selector.
    ///
    /// Stops at a shadow root boundary.
    pub fn closest(&self, id: NodeId, css: &str) -> Option<NodeId> {
        let list = compile(css)?;
        let mut current = Some(id);
        while let Some(el) = current {
            if list.matches(self, el) {
                return Some(el);
            }
            current = self.parent_element(el);
        }
        None
    }

    /// The `html` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    /// The `body` element.
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .find(|&c| self.tag(c) == Some("body"))
    }

    /// `main`, else `body`, else the document root.
    pub fn main_or_body(&self) -> NodeId {
        self.query_selector(self.root(), "main")
            .or_else(|| self.body())
            .unwrap_or(self.root())
    }
}
