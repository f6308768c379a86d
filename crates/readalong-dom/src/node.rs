#![forbid(unsafe_code)]

//! Node records stored in a [`DomSnapshot`](crate::snapshot::DomSnapshot).
//!
//! Elements carry just enough of the live DOM to make reading decisions:
//! the lowercase tag name, the attributes used by content heuristics, and the
//! two computed-style flags that hide a subtree.

/// Tags that end a paragraph-like block of readable text.
pub const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "li",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "article",
    "section",
    "blockquote",
    "td",
    "br",
    "hr",
    "pre",
];

/// Containers whose whole subtree is never read aloud.
pub const EXCLUDED_TAGS: &[&str] = &["script", "style", "noscript", "head", "nav", "footer"];

/// Parents whose direct text children are never read aloud.
pub const NON_TEXT_PARENT_TAGS: &[&str] = &["script", "style", "noscript"];

/// Index of a node inside a snapshot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Arena index of this node.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }
}

/// The subset of computed style that affects visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    /// `display: none`.
    pub display_none: bool,
    /// `visibility: hidden`.
    pub visibility_hidden: bool,
}

impl ComputedStyle {
    /// Style of an element that renders normally.
    pub const VISIBLE: Self = Self {
        display_none: false,
        visibility_hidden: false,
    };

    /// Style with `display: none`.
    pub const DISPLAY_NONE: Self = Self {
        display_none: true,
        visibility_hidden: false,
    };

    /// Style with `visibility: hidden`.
    pub const VISIBILITY_HIDDEN: Self = Self {
        display_none: false,
        visibility_hidden: true,
    };

    /// Build from the raw `display` and `visibility` property values.
    #[must_use]
    pub fn from_properties(display: &str, visibility: &str) -> Self {
        Self {
            display_none: display.trim().eq_ignore_ascii_case("none"),
            visibility_hidden: visibility.trim().eq_ignore_ascii_case("hidden"),
        }
    }

    /// Whether the element and its subtree are hidden.
    #[must_use]
    pub const fn is_hidden(self) -> bool {
        self.display_none || self.visibility_hidden
    }
}

/// Element payload: tag, attributes and computed visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    style: ComputedStyle,
}

impl ElementData {
    /// Create an element with the given tag name (case-insensitive).
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self {
            tag: tag.as_ref().to_ascii_lowercase(),
            attributes: Vec::new(),
            style: ComputedStyle::VISIBLE,
        }
    }

    /// Add or replace an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set the computed style flags.
    #[must_use]
    pub fn with_style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    /// Add or replace an attribute in place.
    pub fn set_attr(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Lowercase tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by (case-insensitive) name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the `class` attribute lists `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Computed visibility flags.
    #[must_use]
    pub const fn style(&self) -> ComputedStyle {
        self.style
    }

    #[must_use]
    pub fn is_block(&self) -> bool {
        BLOCK_TAGS.contains(&self.tag.as_str())
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        EXCLUDED_TAGS.contains(&self.tag.as_str())
    }

    /// Whether text nodes directly under this element are never readable.
    #[must_use]
    pub fn suppresses_text(&self) -> bool {
        NON_TEXT_PARENT_TAGS.contains(&self.tag.as_str())
    }
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}
