#![forbid(unsafe_code)]

//! Immutable, arena-backed capture of a page's DOM.
//!
//! The host walks the live document once and records every node in document
//! order. Everything downstream (extraction, word location, PDF heuristics)
//! reads only the snapshot, so the same snapshot always yields the same text.
//!
//! # Example
//! ```
//! use readalong_dom::node::ElementData;
//! use readalong_dom::snapshot::DomSnapshot;
//!
//! let mut b = DomSnapshot::builder();
//! b.open(ElementData::new("p"));
//! b.text("Hello world");
//! b.close();
//! let snapshot = b.finish();
//! assert_eq!(snapshot.text_content(snapshot.body()), "Hello world");
//! ```

use crate::node::{ElementData, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena of DOM nodes rooted at `<body>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSnapshot {
    nodes: Vec<NodeRecord>,
}

impl DomSnapshot {
    /// Start a snapshot whose root is an empty `<body>` element.
    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new(ElementData::new("body"))
    }

    /// The `<body>` root.
    #[must_use]
    pub const fn body(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, including the body.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Node payload.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this snapshot.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id.index()).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.index()).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map_or(&[][..], |n| n.children.as_slice())
    }

    /// All nodes below `root` in document order (pre-order), excluding `root`.
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(root).to_vec();
        stack.reverse();
        Descendants {
            snapshot: self,
            stack,
        }
    }

    /// First element below `root` in document order matching `predicate`.
    pub fn find_element(
        &self,
        root: NodeId,
        mut predicate: impl FnMut(&ElementData) -> bool,
    ) -> Option<NodeId> {
        self.descendants(root)
            .find(|&id| self.element(id).is_some_and(&mut predicate))
    }

    /// Every element below `root` matching `predicate`, in document order.
    pub fn elements_matching<'a>(
        &'a self,
        root: NodeId,
        mut predicate: impl FnMut(&ElementData) -> bool + 'a,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants(root)
            .filter(move |&id| self.element(id).is_some_and(&mut predicate))
    }

    /// Concatenated text of every descendant text node, like DOM `textContent`.
    #[must_use]
    pub fn text_content(&self, root: NodeId) -> String {
        if let Some(text) = self.text(root) {
            return text.to_owned();
        }
        self.descendants(root)
            .filter_map(|id| self.text(id))
            .collect()
    }

    /// Walk the readable part of the subtree below `root`.
    ///
    /// Hidden elements and excluded containers are skipped together with
    /// their subtrees, text under script-like parents is skipped, and only
    /// text nodes holding at least one non-whitespace character are yielded.
    /// `root` itself is never filtered.
    #[must_use]
    pub fn walk_visible(&self, root: NodeId) -> VisibleWalk<'_> {
        let mut stack: Vec<Frame> = self
            .children(root)
            .iter()
            .map(|&c| Frame::Visit(c))
            .collect();
        stack.reverse();
        VisibleWalk {
            snapshot: self,
            stack,
        }
    }

    /// Text nodes yielded by [`walk_visible`](Self::walk_visible).
    #[must_use]
    pub fn visible_text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.walk_visible(root)
            .filter_map(|step| match step {
                WalkStep::Text(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The page's main content region, or the body if none is marked up.
    ///
    /// Candidates are `main`, `article`, `[role="main"]`, `#main`, `#content`,
    /// `.main` and `.content`; the first candidate in document order wins.
    #[must_use]
    pub fn main_content(&self) -> NodeId {
        self.find_element(self.body(), is_main_content_candidate)
            .unwrap_or_else(|| self.body())
    }
}

fn is_main_content_candidate(el: &ElementData) -> bool {
    matches!(el.tag(), "main" | "article")
        || el.attr("role") == Some("main")
        || matches!(el.attr("id"), Some("main" | "content"))
        || el.has_class("main")
        || el.has_class("content")
}

/// Pre-order iterator over a subtree.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    snapshot: &'a DomSnapshot,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.snapshot.children(id).iter().rev().copied());
        Some(id)
    }
}

/// One step of a readable-content walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep<'a> {
    /// An accepted element is about to have its children visited.
    Enter(NodeId, &'a ElementData),
    /// All children of an accepted element have been visited.
    Leave(NodeId, &'a ElementData),
    /// A readable text node.
    Text(NodeId, &'a str),
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Visit(NodeId),
    Leave(NodeId),
}

/// Iterator returned by [`DomSnapshot::walk_visible`].
#[derive(Debug, Clone)]
pub struct VisibleWalk<'a> {
    snapshot: &'a DomSnapshot,
    stack: Vec<Frame>,
}

impl<'a> Iterator for VisibleWalk<'a> {
    type Item = WalkStep<'a>;

    fn next(&mut self) -> Option<WalkStep<'a>> {
        let snapshot = self.snapshot;
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Leave(id) => {
                    if let Some(el) = snapshot.element(id) {
                        return Some(WalkStep::Leave(id, el));
                    }
                }
                Frame::Visit(id) => match snapshot.kind(id) {
                    NodeKind::Element(el) => {
                        if el.style().is_hidden() || el.is_excluded() {
                            continue;
                        }
                        self.stack.push(Frame::Leave(id));
                        self.stack.extend(
                            snapshot.children(id).iter().rev().map(|&c| Frame::Visit(c)),
                        );
                        return Some(WalkStep::Enter(id, el));
                    }
                    NodeKind::Text(text) => {
                        let suppressed = snapshot
                            .parent(id)
                            .and_then(|p| snapshot.element(p))
                            .is_some_and(ElementData::suppresses_text);
                        if suppressed || text.trim().is_empty() {
                            continue;
                        }
                        return Some(WalkStep::Text(id, text));
                    }
                },
            }
        }
        None
    }
}

/// Incremental builder for [`DomSnapshot`].
///
/// `open`/`close` track a cursor for hand-written trees; `append_*` take an
/// explicit parent for hosts that mirror a live DOM recursively.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    nodes: Vec<NodeRecord>,
    open: Vec<NodeId>,
}

impl SnapshotBuilder {
    /// Start with `root` as the body element.
    #[must_use]
    pub fn new(root: ElementData) -> Self {
        Self {
            nodes: vec![NodeRecord {
                kind: NodeKind::Element(root),
                parent: None,
                children: Vec::new(),
            }],
            open: vec![NodeId(0)],
        }
    }

    /// The root node id.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn cursor(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId(0))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeRecord {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(record) = self.nodes.get_mut(parent.index()) {
            record.children.push(id);
        }
        id
    }

    /// Append an element under `parent`.
    pub fn append_element(&mut self, parent: NodeId, element: ElementData) -> NodeId {
        self.push(parent, NodeKind::Element(element))
    }

    /// Append a text node under `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(parent, NodeKind::Text(text.into()))
    }

    /// Append an element at the cursor and descend into it.
    pub fn open(&mut self, element: ElementData) -> NodeId {
        let id = self.append_element(self.cursor(), element);
        self.open.push(id);
        id
    }

    /// Return the cursor to the parent of the last opened element.
    pub fn close(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    /// Append a childless element at the cursor.
    pub fn leaf(&mut self, element: ElementData) -> NodeId {
        self.append_element(self.cursor(), element)
    }

    /// Append a text node at the cursor.
    pub fn text(&mut self, text: impl Into<String>) -> NodeId {
        self.append_text(self.cursor(), text)
    }

    #[must_use]
    pub fn finish(self) -> DomSnapshot {
        DomSnapshot { nodes: self.nodes }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(ElementData::new("body"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ComputedStyle;

    fn sample() -> DomSnapshot {
        let mut b = DomSnapshot::builder();
        b.open(ElementData::new("nav"));
        b.text("Menu");
        b.close();
        b.open(ElementData::new("div").with_attr("class", "content"));
        b.open(ElementData::new("p"));
        b.text("Visible ");
        b.open(ElementData::new("em"));
        b.text("text");
        b.close();
        b.close();
        b.open(ElementData::new("p").with_style(ComputedStyle::DISPLAY_NONE));
        b.text("Hidden");
        b.close();
        b.open(ElementData::new("script"));
        b.text("var x = 1;");
        b.close();
        b.text("   ");
        b.close();
        b.finish()
    }

    #[test]
    fn descendants_are_preorder() {
        let snapshot = sample();
        let tags: Vec<String> = snapshot
            .descendants(snapshot.body())
            .filter_map(|id| snapshot.element(id).map(|e| e.tag().to_owned()))
            .collect();
        assert_eq!(tags, ["nav", "div", "p", "em", "p", "script"]);
    }

    #[test]
    fn text_content_includes_everything() {
        let snapshot = sample();
        assert_eq!(
            snapshot.text_content(snapshot.body()),
            "MenuVisible textHiddenvar x = 1;   "
        );
    }

    #[test]
    fn visible_walk_skips_hidden_excluded_and_blank() {
        let snapshot = sample();
        let texts: Vec<&str> = snapshot
            .visible_text_nodes(snapshot.body())
            .into_iter()
            .filter_map(|id| snapshot.text(id))
            .collect();
        assert_eq!(texts, ["Visible ", "text"]);
    }

    #[test]
    fn enter_and_leave_are_balanced() {
        let snapshot = sample();
        let mut depth = 0i32;
        for step in snapshot.walk_visible(snapshot.body()) {
            match step {
                WalkStep::Enter(..) => depth += 1,
                WalkStep::Leave(..) => depth -= 1,
                WalkStep::Text(..) => assert!(depth > 0),
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn main_content_prefers_first_candidate() {
        let snapshot = sample();
        let main = snapshot.main_content();
        assert!(snapshot.element(main).is_some_and(|e| e.has_class("content")));
    }

    #[test]
    fn main_content_falls_back_to_body() {
        let mut b = DomSnapshot::builder();
        b.leaf(ElementData::new("p"));
        let snapshot = b.finish();
        assert_eq!(snapshot.main_content(), snapshot.body());
    }

    #[test]
    fn role_main_is_a_candidate() {
        let mut b = DomSnapshot::builder();
        b.leaf(ElementData::new("div"));
        let region = b.leaf(ElementData::new("div").with_attr("role", "main"));
        let snapshot = b.finish();
        assert_eq!(snapshot.main_content(), region);
    }

    #[test]
    fn close_never_pops_the_root() {
        let mut b = DomSnapshot::builder();
        b.close();
        b.close();
        let id = b.text("still under body");
        let snapshot = b.finish();
        assert_eq!(snapshot.parent(id), Some(snapshot.body()));
    }
}
