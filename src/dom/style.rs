//! CSS parsing and the computed-style subset the converter needs.
//!
//! Only the properties that decide whether something is rendered and
//! whether it paints an image are resolved: `display`, `visibility`,
//! `background-image` (also through the `background` shorthand), `width` and
//! `height`. Stylesheets are scoped to the tree that contains them, so a
//! `<style>` inside a shadow root only applies inside that shadow root.

use std::cmp::Ordering;
use std::collections::HashMap;

use cssparser::{
    AtRuleParser, DeclarationParser, ParseError, Parser, ParserInput, QualifiedRuleParser,
    RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
};
use selectors::parser::Selector;

use super::arena::{Document, Geometry, NodeId};
use super::element_ref::{ChatSelectors, ElementRef};
use super::select::{matches_one, parse_selector_list};

/// Default rules every page starts from.
const USER_AGENT_CSS: &str = "
    head, script, style, template, title, meta, link, base, noscript,
    datalist, param, area, [hidden] { display: none }
";

/// A parsed CSS stylesheet.
#[derive(Debug, Default, Clone)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

#[derive(Debug, Clone)]
pub struct CssRule {
    pub selectors: Vec<Selector<ChatSelectors>>,
    pub declarations: Vec<Declaration>,
}

/// A CSS declaration (property: value).
#[derive(Debug, Clone)]
pub struct Declaration {
    pub property: String,
    pub value: PropertyValue,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Keyword(String),
    Url(String),
    Px(f32),
    None,
}

/// CSS specificity for cascade ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub elements: u16,
}

impl Specificity {
    pub fn from_selector(selector: &Selector<ChatSelectors>) -> Self {
        let spec = selector.specificity();
        // packed as (ids << 20) | (classes << 10) | elements
        Self {
            ids: ((spec >> 20) & 0x3FF) as u16,
            classes: ((spec >> 10) & 0x3FF) as u16,
            elements: (spec & 0x3FF) as u16,
        }
    }

    /// Specificity of a `style` attribute, above any selector.
    const INLINE: Self = Self {
        ids: u16::MAX,
        classes: 0,
        elements: 0,
    };
}

/// Origin of a declaration, lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    UserAgent = 0,
    Author = 1,
    Inline = 2,
}

/// A matched declaration with its cascade position.
#[derive(Debug)]
struct MatchedDeclaration<'a> {
    declaration: &'a Declaration,
    origin: Origin,
    specificity: Specificity,
    order: usize,
}

impl MatchedDeclaration<'_> {
    fn cascade_cmp(&self, other: &Self) -> Ordering {
        self.declaration
            .important
            .cmp(&other.declaration.important)
            .then(self.origin.cmp(&other.origin))
            .then(self.specificity.cmp(&other.specificity))
            .then(self.order.cmp(&other.order))
    }
}

impl Stylesheet {
    /// Parse a stylesheet, skipping anything that does not parse.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();

        let mut rule_parser = TopLevelRuleParser { rules: &mut rules };
        for result in StyleSheetParser::new(&mut parser, &mut rule_parser) {
            if let Err((err, slice)) = result {
                tracing::trace!(?err, slice, "skipped css rule");
            }
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse the declarations of a `style` attribute.
pub fn parse_inline_declarations(css: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut decl_parser = DeclarationListParser {
        declarations: &mut declarations,
    };
    for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
        let _ = result;
    }
    declarations
}

struct TopLevelRuleParser<'a> {
    rules: &'a mut Vec<CssRule>,
}

impl<'i> AtRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // @media and friends never decide visibility in a static snapshot.
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = Vec<Selector<ChatSelectors>>;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        parse_selector_list(input)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
        };
        for result in RuleBodyParser::new(input, &mut decl_parser) {
            let _ = result;
        }

        if !declarations.is_empty() {
            self.rules.push(CssRule {
                selectors: prelude,
                declarations,
            });
        }
        Ok(())
    }
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<Declaration>,
}

impl<'i> AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &cssparser::ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let property = name.to_ascii_lowercase();
        let value = parse_property_value(&property, input);

        // Drain whatever the value parser left, stopping at `!important`.
        let important = loop {
            if input.try_parse(cssparser::parse_important).is_ok() {
                break true;
            }
            if input.next().is_err() {
                break false;
            }
        };

        if value != PropertyValue::None {
            self.declarations.push(Declaration {
                property,
                value,
                important,
            });
        }
        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Next token of a value, refusing to consume the `!` of `!important`.
fn next_value_token<'i>(input: &mut Parser<'i, '_>) -> Option<Token<'i>> {
    input
        .try_parse(|i| match i.next() {
            Ok(Token::Delim('!')) | Err(_) => Err(()),
            Ok(token) => Ok(token.clone()),
        })
        .ok()
}

fn parse_property_value(property: &str, input: &mut Parser<'_, '_>) -> PropertyValue {
    match property {
        "display" | "visibility" => parse_keyword(input),
        "background-image" | "background" => parse_image(input),
        "width" | "height" => parse_px(input),
        _ => PropertyValue::None,
    }
}

fn parse_keyword(input: &mut Parser<'_, '_>) -> PropertyValue {
    match next_value_token(input) {
        Some(Token::Ident(ident)) => PropertyValue::Keyword(ident.to_ascii_lowercase()),
        _ => PropertyValue::None,
    }
}

/// First `url(...)` of a background value; `none` when the value says so.
fn parse_image(input: &mut Parser<'_, '_>) -> PropertyValue {
    let mut saw_none = false;
    while let Some(token) = next_value_token(input) {
        match token {
            Token::UnquotedUrl(url) => return PropertyValue::Url(url.to_string()),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let url: Result<String, ParseError<'_, ()>> =
                    input.parse_nested_block(|i| Ok(i.expect_string()?.to_string()));
                if let Ok(url) = url {
                    return PropertyValue::Url(url);
                }
            }
            Token::Ident(ident) if ident.eq_ignore_ascii_case("none") => saw_none = true,
            _ => {}
        }
    }
    if saw_none {
        PropertyValue::Keyword("none".to_string())
    } else {
        PropertyValue::None
    }
}

fn parse_px(input: &mut Parser<'_, '_>) -> PropertyValue {
    match next_value_token(input) {
        Some(Token::Dimension { value, unit, .. }) if unit.eq_ignore_ascii_case("px") => {
            PropertyValue::Px(value)
        }
        Some(Token::Number { value, .. }) if value == 0.0 => PropertyValue::Px(0.0),
        Some(Token::Ident(ident)) => PropertyValue::Keyword(ident.to_ascii_lowercase()),
        _ => PropertyValue::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Resolved values of the supported properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    /// `display` keyword, `None` for the element's default.
    pub display: Option<String>,
    pub visibility: Visibility,
    pub background_image: Option<String>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl ComputedStyle {
    pub fn is_display_none(&self) -> bool {
        self.display.as_deref() == Some("none")
    }

    fn apply(&mut self, decl: &Declaration, parent: &ComputedStyle) {
        match (decl.property.as_str(), &decl.value) {
            ("display", PropertyValue::Keyword(kw)) => {
                self.display = match kw.as_str() {
                    "inherit" => parent.display.clone(),
                    "initial" | "unset" | "revert" => None,
                    _ => Some(kw.clone()),
                }
            }
            ("visibility", PropertyValue::Keyword(kw)) => {
                self.visibility = match kw.as_str() {
                    "hidden" | "collapse" => Visibility::Hidden,
                    "visible" | "initial" => Visibility::Visible,
                    _ => parent.visibility,
                }
            }
            ("background-image" | "background", PropertyValue::Url(url)) => {
                self.background_image = Some(url.clone());
            }
            ("background-image" | "background", PropertyValue::Keyword(_)) => {
                self.background_image = None;
            }
            ("width", PropertyValue::Px(px)) => self.width = Some(*px),
            ("height", PropertyValue::Px(px)) => self.height = Some(*px),
            ("width", PropertyValue::Keyword(_)) => self.width = None,
            ("height", PropertyValue::Keyword(_)) => self.height = None,
            _ => {}
        }
    }
}

/// Computes styles for the elements of one document, caching results.
pub struct StyleResolver<'a> {
    dom: &'a Document,
    user_agent: Stylesheet,
    /// Author sheets keyed by the tree root (document or shadow root).
    author: HashMap<NodeId, Vec<Stylesheet>>,
    cache: HashMap<NodeId, ComputedStyle>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(dom: &'a Document) -> Self {
        Self {
            dom,
            user_agent: Stylesheet::parse(USER_AGENT_CSS),
            author: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Computed style of an element.
    pub fn computed(&mut self, id: NodeId) -> ComputedStyle {
        if let Some(style) = self.cache.get(&id) {
            return style.clone();
        }
        let parent = match self.style_parent(id) {
            Some(parent) => self.computed(parent),
            None => ComputedStyle::default(),
        };
        let style = self.cascade(id, &parent);
        self.cache.insert(id, style.clone());
        style
    }

    /// Element whose style `id` inherits: the parent element, or the shadow
    /// host for top-level nodes of a shadow tree.
    fn style_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.dom.get(id)?.parent;
        if self.dom.is_element(parent) {
            Some(parent)
        } else if self.dom.is_shadow_root(parent) {
            self.dom.shadow_host_of(id)
        } else {
            None
        }
    }

    fn cascade(&mut self, id: NodeId, parent: &ComputedStyle) -> ComputedStyle {
        let mut style = ComputedStyle {
            visibility: parent.visibility,
            ..ComputedStyle::default()
        };
        if !self.dom.is_element(id) {
            return style;
        }

        let tree = self.dom.tree_root(id);
        if !self.author.contains_key(&tree) {
            let sheets = collect_author_sheets(self.dom, tree);
            self.author.insert(tree, sheets);
        }

        let elem = ElementRef::new(self.dom, id);
        let mut matched = Vec::new();
        let mut order = 0;
        let sheets = std::iter::once((&self.user_agent, Origin::UserAgent)).chain(
            self.author
                .get(&tree)
                .into_iter()
                .flatten()
                .map(|sheet| (sheet, Origin::Author)),
        );
        for (sheet, origin) in sheets {
            for rule in &sheet.rules {
                let specificity = rule
                    .selectors
                    .iter()
                    .filter(|sel| matches_one(sel, elem))
                    .map(Specificity::from_selector)
                    .max();
                let Some(specificity) = specificity else {
                    continue;
                };
                for declaration in &rule.declarations {
                    matched.push(MatchedDeclaration {
                        declaration,
                        origin,
                        specificity,
                        order,
                    });
                    order += 1;
                }
            }
        }

        let inline = self
            .dom
            .get_attr(id, "style")
            .map(parse_inline_declarations)
            .unwrap_or_default();
        for declaration in &inline {
            matched.push(MatchedDeclaration {
                declaration,
                origin: Origin::Inline,
                specificity: Specificity::INLINE,
                order,
            });
            order += 1;
        }

        matched.sort_by(|a, b| a.cascade_cmp(b));
        for m in &matched {
            style.apply(m.declaration, parent);
        }
        style
    }

    /// Whether the element is rendered at all: no hidden flag, not
    /// `display: none`, not `visibility: hidden`.
    pub fn is_rendered(&mut self, id: NodeId) -> bool {
        if self.dom.is_hidden_flag(id) {
            return false;
        }
        let style = self.computed(id);
        !style.is_display_none() && style.visibility == Visibility::Visible
    }

    /// URL of the computed background image, ignoring `none`.
    pub fn background_image(&mut self, id: NodeId) -> Option<String> {
        self.computed(id)
            .background_image
            .filter(|url| !url.is_empty() && url != "none")
    }

    /// Box size: explicit geometry, else computed px size, else the
    /// `width`/`height` attributes.
    pub fn geometry(&mut self, id: NodeId) -> Option<Geometry> {
        if let Some(geometry) = self.dom.geometry(id) {
            return Some(geometry);
        }
        let style = self.computed(id);
        if let (Some(w), Some(h)) = (style.width, style.height) {
            return Some(Geometry::new(w, h));
        }
        let attr = |name| {
            self.dom
                .get_attr(id, name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
        };
        match (attr("width"), attr("height")) {
            (Some(w), Some(h)) => Some(Geometry::new(w, h)),
            _ => None,
        }
    }
}

/// `<style>` sheets of one tree, in tree order.
fn collect_author_sheets(dom: &Document, tree: NodeId) -> Vec<Stylesheet> {
    dom.descendants(tree)
        .into_iter()
        .filter(|&id| dom.tag(id) == Some("style"))
        .map(|id| Stylesheet::parse(&dom.text_content(id)))
        .filter(|sheet| !sheet.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_style(css: &str) -> (Document, NodeId) {
        let mut dom = Document::new();
        let html = dom.append_element(dom.root(), "html", &[]);
        let head = dom.append_element(html, "head", &[]);
        let style = dom.append_element(head, "style", &[]);
        dom.append_text(style, css);
        let body = dom.append_element(html, "body", &[]);
        (dom, body)
    }

    #[test]
    fn test_parse_rules() {
        let sheet = Stylesheet::parse(".a { display: none } p, div { color: red; width: 10px }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[1].selectors.len(), 2);
        assert_eq!(sheet.rules[1].declarations[0].value, PropertyValue::Px(10.0));
    }

    #[test]
    fn test_inline_declarations() {
        let decls = parse_inline_declarations(
            "display:none !important; background: #fff url(\"a.png\") no-repeat",
        );
        assert_eq!(decls.len(), 2);
        assert!(decls[0].important);
        assert_eq!(decls[1].value, PropertyValue::Url("a.png".into()));
    }

    #[test]
    fn test_display_none_from_class_rule() {
        let (mut dom, body) = doc_with_style(".gone { display: none }");
        let gone = dom.append_element(body, "div", &[("class", "gone")]);
        let shown = dom.append_element(body, "div", &[]);

        let mut resolver = StyleResolver::new(&dom);
        assert!(!resolver.is_rendered(gone));
        assert!(resolver.is_rendered(shown));
    }

    #[test]
    fn test_specificity_and_inline_order() {
        let (mut dom, body) =
            doc_with_style("#x { display: none } div.y { display: block } div { display: none }");
        let a = dom.append_element(body, "div", &[("id", "x"), ("class", "y")]);
        let b = dom.append_element(body, "div", &[("class", "y")]);
        let c = dom.append_element(body, "div", &[("id", "x2"), ("style", "display:none")]);

        let mut resolver = StyleResolver::new(&dom);
        assert!(!resolver.is_rendered(a));
        assert!(resolver.is_rendered(b));
        assert!(!resolver.is_rendered(c));
    }

    #[test]
    fn test_important_beats_inline() {
        let (mut dom, body) = doc_with_style(".k { display: block !important }");
        let el = dom.append_element(body, "div", &[("class", "k"), ("style", "display: none")]);
        let mut resolver = StyleResolver::new(&dom);
        assert!(resolver.is_rendered(el));
    }

    #[test]
    fn test_visibility_inherits_and_can_be_overridden() {
        let (mut dom, body) = doc_with_style("");
        let outer = dom.append_element(body, "div", &[("style", "visibility: hidden")]);
        let inner = dom.append_element(outer, "span", &[]);
        let back = dom.append_element(outer, "span", &[("style", "visibility: visible")]);

        let mut resolver = StyleResolver::new(&dom);
        assert!(!resolver.is_rendered(inner));
        assert!(resolver.is_rendered(back));
    }

    #[test]
    fn test_shadow_styles_are_scoped() {
        let (mut dom, body) = doc_with_style("p { display: none }");
        let light_p = dom.append_element(body, "p", &[]);
        let host = dom.append_element(body, "x-card", &[("style", "visibility: hidden")]);
        let root = dom.attach_shadow(host);
        let style = dom.append_element(root, "style", &[]);
        dom.append_text(style, "span { display: none }");
        let shadow_p = dom.append_element(root, "p", &[("style", "visibility: visible")]);
        let shadow_span = dom.append_element(root, "span", &[]);
        let inherits = dom.append_element(root, "em", &[]);

        let mut resolver = StyleResolver::new(&dom);
        assert!(!resolver.is_rendered(light_p));
        assert!(resolver.is_rendered(shadow_p));
        assert!(!resolver.is_rendered(shadow_span));
        // visibility flows from the host into its shadow tree
        assert!(!resolver.is_rendered(inherits));
    }

    #[test]
    fn test_user_agent_hides_head_and_hidden_attr() {
        let (mut dom, body) = doc_with_style("");
        let hidden = dom.append_element(body, "div", &[("hidden", "")]);
        let head = dom.find_by_tag("head").expect("head");
        let mut resolver = StyleResolver::new(&dom);
        assert!(!resolver.is_rendered(head));
        assert!(!resolver.is_rendered(hidden));
    }

    #[test]
    fn test_background_image_and_geometry() {
        let (mut dom, body) = doc_with_style(".hero { background-image: url(hero.png); width: 120px; height: 80px }");
        let hero = dom.append_element(body, "div", &[("class", "hero")]);
        let none = dom.append_element(body, "div", &[("style", "background-image: none")]);
        let sized = dom.append_element(body, "img", &[("width", "30"), ("height", "40")]);

        let mut resolver = StyleResolver::new(&dom);
        assert_eq!(resolver.background_image(hero).as_deref(), Some("hero.png"));
        assert_eq!(resolver.background_image(none), None);
        assert_eq!(resolver.geometry(hero), Some(Geometry::new(120.0, 80.0)));
        assert_eq!(resolver.geometry(sized), Some(Geometry::new(30.0, 40.0)));
        assert_eq!(resolver.geometry(none), None);
    }
}
