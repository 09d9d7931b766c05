//! Shadow roots and slot projection.

use std::collections::HashSet;

use super::arena::{Document, NodeData, NodeId};

impl Document {
    /// Attach a shadow root to `host`, or return the one already attached.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let root = self.create_node(NodeData::ShadowRoot { host });
        if let Some(node) = self.get_mut(host) {
            node.shadow_root = root;
        }
        root
    }

    /// The shadow root attached to `host`.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.get(host)
            .map(|n| n.shadow_root)
            .filter(|root| root.is_some())
    }

    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::ShadowRoot { .. }))
    }

    /// Host of the shadow tree `id` lives in, if any.
    pub fn shadow_host_of(&self, id: NodeId) -> Option<NodeId> {
        match self.get(self.tree_root(id))?.data {
            NodeData::ShadowRoot { host } => Some(host),
            _ => None,
        }
    }

    /// The document node or shadow root at the top of `id`'s tree.
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(node) = self.get(current) {
            if node.parent.is_none() {
                break;
            }
            current = node.parent;
        }
        current
    }

    /// Explicitly assign nodes to a `<slot>` (the DOM's `slot.assign()`).
    pub fn assign_slot(&mut self, slot: NodeId, nodes: Vec<NodeId>) {
        self.slot_assignments.insert(slot, nodes);
    }

    /// Nodes projected into `slot`, with nested slots flattened.
    ///
    /// Explicit assignments win; otherwise the host's light children whose
    /// `slot` attribute names this slot are used, and the unnamed slot takes
    /// every child without a `slot` attribute. Fallback content is never
    /// returned.
    pub fn assigned_nodes(&self, slot: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.flatten_slot(slot, &mut out, &mut seen);
        out
    }

    fn flatten_slot(&self, slot: NodeId, out: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>) {
        if !seen.insert(slot) {
            return;
        }
        for node in self.direct_assignment(slot) {
            if self.tag(node) == Some("slot") && self.shadow_host_of(node).is_some() {
                self.flatten_slot(node, out, seen);
            } else {
                out.push(node);
            }
        }
    }

    fn direct_assignment(&self, slot: NodeId) -> Vec<NodeId> {
        if let Some(explicit) = self.slot_assignments.get(&slot) {
            return explicit.clone();
        }
        let Some(host) = self.shadow_host_of(slot) else {
            return Vec::new();
        };
        let name = self.attr_or_empty(slot, "name");
        self.children(host)
            .filter(|&child| {
                if self.is_element(child) {
                    self.attr_or_empty(child, "slot") == name
                } else {
                    name.is_empty() && self.is_text(child)
                }
            })
            .collect()
    }

    /// Turn `<template shadowrootmode>` elements into attached shadow roots.
    ///
    /// The template's children move into a new shadow root on the template's
    /// parent element and the template leaves the tree.
    pub(crate) fn lift_declarative_shadow_roots(&mut self) {
        let templates: Vec<NodeId> = (0..self.len() as u32)
            .map(NodeId)
            .filter(|&id| {
                self.tag(id) == Some("template")
                    && (self.has_attr(id, "shadowrootmode") || self.has_attr(id, "shadowroot"))
            })
            .collect();

        for template in templates {
            let Some(host) = self.parent_element(template) else {
                continue;
            };
            if self.shadow_root(host).is_some() {
                continue;
            }
            let root = self.attach_shadow(host);
            let children: Vec<_> = self.children(template).collect();
            for child in children {
                self.detach(child);
                self.append(root, child);
            }
            self.detach(template);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_shadow_is_idempotent() {
        let mut dom = Document::new();
        let host = dom.append_element(dom.root(), "x-card", &[]);
        let root = dom.attach_shadow(host);
        assert_eq!(dom.attach_shadow(host), root);
        assert!(dom.is_shadow_root(root));

        let inner = dom.append_element(root, "p", &[]);
        assert_eq!(dom.shadow_host_of(inner), Some(host));
        assert_eq!(dom.shadow_host_of(host), None);
        assert!(dom.parent_element(inner).is_none());
    }

    #[test]
    fn test_named_and_default_slots() {
        let mut dom = Document::new();
        let host = dom.append_element(dom.root(), "x-msg", &[]);
        let title = dom.append_element(host, "span", &[("slot", "title")]);
        let body_text = dom.create_text("body");
        dom.append(host, body_text);
        let body_el = dom.append_element(host, "p", &[]);

        let root = dom.attach_shadow(host);
        let named = dom.append_element(root, "slot", &[("name", "title")]);
        let default = dom.append_element(root, "slot", &[]);

        assert_eq!(dom.assigned_nodes(named), vec![title]);
        assert_eq!(dom.assigned_nodes(default), vec![body_text, body_el]);
    }

    #[test]
    fn test_explicit_assignment_wins() {
        let mut dom = Document::new();
        let host = dom.append_element(dom.root(), "x-msg", &[]);
        let a = dom.append_element(host, "p", &[]);
        let b = dom.append_element(host, "p", &[]);
        let root = dom.attach_shadow(host);
        let slot = dom.append_element(root, "slot", &[]);

        dom.assign_slot(slot, vec![b]);
        assert_eq!(dom.assigned_nodes(slot), vec![b]);
        assert_ne!(dom.assigned_nodes(slot), vec![a, b]);
    }

    #[test]
    fn test_nested_slots_flatten() {
        let mut dom = Document::new();
        let outer = dom.append_element(dom.root(), "x-outer", &[]);
        let leaf = dom.append_element(outer, "b", &[]);
        let outer_root = dom.attach_shadow(outer);
        let inner = dom.append_element(outer_root, "x-inner", &[]);
        let outer_slot = dom.append_element(inner, "slot", &[]);
        let inner_root = dom.attach_shadow(inner);
        let inner_slot = dom.append_element(inner_root, "slot", &[]);

        assert_eq!(dom.assigned_nodes(outer_slot), vec![leaf]);
        assert_eq!(dom.assigned_nodes(inner_slot), vec![leaf]);
    }

    #[test]
    fn test_slot_without_assignment_is_empty() {
        let mut dom = Document::new();
        let host = dom.append_element(dom.root(), "x-msg", &[]);
        let root = dom.attach_shadow(host);
        let slot = dom.append_element(root, "slot", &[("name", "missing")]);
        dom.append_text(slot, "fallback");
        assert!(dom.assigned_nodes(slot).is_empty());
    }
}
