//! # Interaction Bindings
//!
//! Turns host UI interactions (clicks, submits, changes) into `$click`,
//! `$submit` and `$change` events.
//!
//! The host owns the element tree and event delegation. It reports each
//! interaction with its target node; the tracker checks the target against
//! every registered binding of that kind and records one event per match.
//!
//! ## Matching
//! ```text
//! target ──► find_matching_ancestor(selector) ──► matched?
//!                                                   │
//!              nearest_attribute("data-footfall-skip")
//!                 present and != "false" ──► skipped
//!                 otherwise              ──► element_properties(matched)
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use footfall_core::{Properties, SECTION_ATTRIBUTE, SKIP_ATTRIBUTE};

/// Kind of UI interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Click,
    Submit,
    Change,
}

impl InteractionKind {
    /// Name of the event recorded for this kind.
    pub fn event_name(&self) -> &'static str {
        match self {
            InteractionKind::Click => "$click",
            InteractionKind::Submit => "$submit",
            InteractionKind::Change => "$change",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKind::Click => write!(f, "click"),
            InteractionKind::Submit => write!(f, "submit"),
            InteractionKind::Change => write!(f, "change"),
        }
    }
}

/// One element of the host's UI tree.
pub trait DomNode: Send + Sync {
    fn tag_name(&self) -> String;

    fn element_id(&self) -> Option<String>;

    fn class_name(&self) -> Option<String>;

    fn text_content(&self) -> Option<String>;

    /// Current value of a form control.
    fn value(&self) -> Option<String>;

    fn href(&self) -> Option<String>;

    /// This node or its closest ancestor matching `selector`.
    fn find_matching_ancestor(&self, selector: &str) -> Option<Arc<dyn DomNode>>;

    /// Value of `key` on this node or its closest ancestor carrying it.
    fn nearest_attribute(&self, key: &str) -> Option<String>;
}

/// A registered selector for one interaction kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: InteractionKind,
    pub selector: String,
}

impl Binding {
    pub fn new(kind: InteractionKind, selector: impl Into<String>) -> Self {
        Binding {
            kind,
            selector: selector.into(),
        }
    }

    /// The node this binding fires for, unless the subtree opted out.
    pub fn resolve(&self, target: &dyn DomNode) -> Option<Arc<dyn DomNode>> {
        let matched = target.find_matching_ancestor(&self.selector)?;
        if should_skip(matched.as_ref()) {
            None
        } else {
            Some(matched)
        }
    }
}

/// Whether a node sits in a subtree marked `data-footfall-skip`.
pub fn should_skip(node: &dyn DomNode) -> bool {
    node.nearest_attribute(SKIP_ATTRIBUTE)
        .map(|value| value != "false")
        .unwrap_or(false)
}

/// Collapses whitespace runs to one space and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Event properties describing `node`.
pub fn element_properties(kind: InteractionKind, node: &dyn DomNode, page: &str) -> Properties {
    let tag = node.tag_name().to_lowercase();
    let mut properties = Properties::new();

    properties.insert("tag".into(), Value::String(tag.clone()));
    insert_present(&mut properties, "id", node.element_id());
    insert_present(&mut properties, "class", node.class_name());
    properties.insert("page".into(), Value::String(page.to_string()));
    insert_present(&mut properties, "section", node.nearest_attribute(SECTION_ATTRIBUTE));

    if kind == InteractionKind::Click {
        let text = if tag == "input" {
            node.value()
        } else {
            node.text_content().map(|text| clean_text(&text))
        };
        insert_present(&mut properties, "text", text);
        insert_present(&mut properties, "href", node.href());
    }

    properties
}

fn insert_present(properties: &mut Properties, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        properties.insert(key.to_string(), Value::String(value));
    }
}

// =============================================================================
// Static Element Tree
// =============================================================================

/// Immutable element with a parent link, for headless hosts and tests.
///
/// Selectors are single simple selectors: `tag`, `#id`, `.class` or `*`.
#[derive(Debug, Clone, Default)]
pub struct StaticElement {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub value: Option<String>,
    pub href: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<Arc<StaticElement>>,
}

impl StaticElement {
    pub fn new(tag: impl Into<String>) -> Self {
        StaticElement {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: Arc<StaticElement>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector == "*" {
            true
        } else if let Some(id) = selector.strip_prefix('#') {
            self.id.as_deref() == Some(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            self.classes.iter().any(|c| c == class)
        } else {
            self.tag.eq_ignore_ascii_case(selector)
        }
    }
}

impl DomNode for StaticElement {
    fn tag_name(&self) -> String {
        self.tag.to_uppercase()
    }

    fn element_id(&self) -> Option<String> {
        self.id.clone()
    }

    fn class_name(&self) -> Option<String> {
        if self.classes.is_empty() {
            None
        } else {
            Some(self.classes.join(" "))
        }
    }

    fn text_content(&self) -> Option<String> {
        self.text.clone()
    }

    fn value(&self) -> Option<String> {
        self.value.clone()
    }

    fn href(&self) -> Option<String> {
        self.href.clone()
    }

    fn find_matching_ancestor(&self, selector: &str) -> Option<Arc<dyn DomNode>> {
        if self.matches(selector) {
            return Some(Arc::new(self.clone()));
        }

        let mut current = self.parent.clone();
        while let Some(node) = current {
            if node.matches(selector) {
                return Some(node);
            }
            current = node.parent.clone();
        }
        None
    }

    fn nearest_attribute(&self, key: &str) -> Option<String> {
        if let Some(value) = self.attributes.get(key) {
            return Some(value.clone());
        }

        let mut current = self.parent.as_ref();
        while let Some(node) = current {
            if let Some(value) = node.attributes.get(key) {
                return Some(value.clone());
            }
            current = node.parent.as_ref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pricing_section() -> Arc<StaticElement> {
        Arc::new(StaticElement::new("section").with_attribute(SECTION_ATTRIBUTE, "pricing"))
    }

    #[test]
    fn test_click_properties() {
        let link = StaticElement::new("a")
            .with_id("buy")
            .with_class("btn")
            .with_class("primary")
            .with_text("  Buy\n   now  ")
            .with_href("/checkout")
            .with_parent(pricing_section());

        let props = element_properties(InteractionKind::Click, &link, "/pricing");

        assert_eq!(props["tag"], json!("a"));
        assert_eq!(props["id"], json!("buy"));
        assert_eq!(props["class"], json!("btn primary"));
        assert_eq!(props["page"], json!("/pricing"));
        assert_eq!(props["section"], json!("pricing"));
        assert_eq!(props["text"], json!("Buy now"));
        assert_eq!(props["href"], json!("/checkout"));
    }

    #[test]
    fn test_input_text_is_its_value() {
        let input = StaticElement::new("input").with_value("Subscribe");
        let props = element_properties(InteractionKind::Click, &input, "/");
        assert_eq!(props["text"], json!("Subscribe"));
        assert!(props.get("id").is_none());
        assert!(props.get("section").is_none());
    }

    #[test]
    fn test_submit_has_no_click_fields() {
        let form = StaticElement::new("form").with_text("ignored").with_href("/x");
        let props = element_properties(InteractionKind::Submit, &form, "/");
        assert!(props.get("text").is_none());
        assert!(props.get("href").is_none());
    }

    #[test]
    fn test_binding_matches_ancestor() {
        let button = Arc::new(StaticElement::new("button").with_class("cta"));
        let icon = StaticElement::new("span").with_parent(button);

        let matched = Binding::new(InteractionKind::Click, ".cta")
            .resolve(&icon)
            .unwrap();
        assert_eq!(matched.tag_name(), "BUTTON");

        assert!(Binding::new(InteractionKind::Click, "#missing")
            .resolve(&icon)
            .is_none());
    }

    #[test]
    fn test_skip_attribute() {
        let skipped = Arc::new(StaticElement::new("div").with_attribute(SKIP_ATTRIBUTE, ""));
        let inside = StaticElement::new("a").with_parent(skipped);
        assert!(should_skip(&inside));
        assert!(Binding::new(InteractionKind::Click, "a").resolve(&inside).is_none());

        let opted_in = StaticElement::new("a").with_attribute(SKIP_ATTRIBUTE, "false");
        assert!(!should_skip(&opted_in));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("\n  Sign \r\n  up\t"), "Sign up");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_event_names() {
        assert_eq!(InteractionKind::Click.event_name(), "$click");
        assert_eq!(InteractionKind::Submit.event_name(), "$submit");
        assert_eq!(InteractionKind::Change.event_name(), "$change");
    }
}
