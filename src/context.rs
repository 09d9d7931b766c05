//! Per-run conversion state.
//!
//! A [`RunContext`] lives for exactly one export. It owns the computed-style
//! cache and the visibility memo, so nothing observed during one run leaks
//! into the next.

use std::collections::HashMap;

use crate::config::Settings;
use crate::dom::{Document, Geometry, NodeId, StyleResolver};
use crate::platform::PlatformKind;

pub struct RunContext<'a> {
    pub dom: &'a Document,
    pub settings: &'a Settings,
    pub platform: PlatformKind,
    styles: StyleResolver<'a>,
    visibility: HashMap<NodeId, bool>,
}

impl<'a> RunContext<'a> {
    pub fn new(dom: &'a Document, settings: &'a Settings, platform: PlatformKind) -> Self {
        Self {
            dom,
            settings,
            platform,
            styles: StyleResolver::new(dom),
            visibility: HashMap::new(),
        }
    }

    /// Whether an element counts as visible for export.
    ///
    /// Always true when `exportVisibleOnly` is off and for non-elements.
    /// `aria-hidden` plays no part.
    pub fn is_visible(&mut self, id: NodeId) -> bool {
        if !self.settings.export_visible_only || !self.dom.is_element(id) {
            return true;
        }
        if let Some(&visible) = self.visibility.get(&id) {
            return visible;
        }
        let visible = self.styles.is_rendered(id);
        self.visibility.insert(id, visible);
        visible
    }

    pub fn background_image(&mut self, id: NodeId) -> Option<String> {
        self.styles.background_image(id)
    }

    pub fn geometry(&mut self, id: NodeId) -> Option<Geometry> {
        self.styles.geometry(id)
    }

    /// Box of at least 55×55, the size of an image inside a message.
    pub fn is_large_box(&mut self, id: NodeId) -> bool {
        self.geometry(id)
            .is_some_and(|g| g.width >= 55.0 && g.height >= 55.0)
    }

    /// Number of memoized visibility decisions.
    pub fn visibility_memo_len(&self) -> usize {
        self.visibility.len()
    }
}
