//! A small in-memory element tree standing in for the browser document.
//!
//! Elements are shared handles; cloning an [`Element`] clones the handle, not the
//! node. Markup assigned through [`Element::set_inner_html`] is kept as text and can
//! be inspected with CSS selectors via [`Element::select_markup`].

use crate::error::DomError;
use scraper::{Html, Selector};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

struct ElementData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    markup: String,
    children: Vec<Element>,
    parent: Weak<RefCell<ElementData>>,
}

#[derive(Clone)]
pub struct Element(Rc<RefCell<ElementData>>);

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(ElementData {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            markup: String::new(),
            children: Vec::new(),
            parent: Weak::new(),
        })))
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.add_class(class);
        self
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.0.borrow().id.clone()
    }

    pub fn set_id(&self, id: impl Into<String>) {
        self.0.borrow_mut().id = Some(id.into());
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.borrow().classes.clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: impl Into<String>) {
        let class = class.into();
        let mut data = self.0.borrow_mut();
        if !data.classes.contains(&class) {
            data.classes.push(class);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.0.borrow_mut().attributes.insert(name.into(), value.into());
    }

    /// Replaces the element's content with raw markup, detaching all child elements.
    pub fn set_inner_html(&self, markup: impl Into<String>) {
        let children = {
            let mut data = self.0.borrow_mut();
            data.markup = markup.into();
            std::mem::take(&mut data.children)
        };
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    pub fn inner_html(&self) -> String {
        let data = self.0.borrow();
        let mut out = data.markup.clone();
        for child in &data.children {
            out.push_str(&child.outer_html());
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let inner = self.inner_html();
        let data = self.0.borrow();
        let mut out = format!("<{}", data.tag);
        if let Some(id) = &data.id {
            out.push_str(&format!(" id=\"{id}\""));
        }
        if !data.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", data.classes.join(" ")));
        }
        for (name, value) in &data.attributes {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        out.push_str(&inner);
        out.push_str(&format!("</{}>", data.tag));
        out
    }

    /// Appends `child`, moving it away from its previous parent if it had one.
    pub fn append_child(&self, child: &Element) {
        child.remove();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Detaches the element from its parent. Does nothing for detached elements.
    pub fn remove(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent.0.borrow_mut().children.retain(|c| c != self);
        self.0.borrow_mut().parent = Weak::new();
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.borrow().parent.upgrade().map(Element)
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.borrow().children.clone()
    }

    pub fn first_child(&self) -> Option<Element> {
        self.0.borrow().children.first().cloned()
    }

    /// Whether `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        let mut current = Some(other.clone());
        while let Some(element) = current {
            if &element == self {
                return true;
            }
            current = element.parent();
        }
        false
    }

    /// Finds the first descendant element matching a simple selector
    /// (`#id`, `.class` or a tag name).
    pub fn query_selector(&self, selector: &str) -> Option<Element> {
        for child in self.children() {
            if child.matches(selector) {
                return Some(child);
            }
            if let Some(found) = child.query_selector(selector) {
                return Some(found);
            }
        }
        None
    }

    fn matches(&self, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            self.id().as_deref() == Some(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            self.has_class(class)
        } else {
            self.0.borrow().tag.eq_ignore_ascii_case(selector)
        }
    }

    /// Queries the element's serialized markup with a full CSS selector.
    pub fn select_markup(&self, selector: &str) -> Result<Vec<MarkupElement>, DomError> {
        let parsed = Selector::parse(selector).map_err(|err| DomError::InvalidSelector {
            selector: selector.to_owned(),
            message: err.to_string(),
        })?;
        let fragment = Html::parse_fragment(&self.outer_html());
        Ok(fragment
            .select(&parsed)
            .map(|node| MarkupElement {
                tag: node.value().name().to_owned(),
                attributes: node
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect(),
                text: node.text().collect(),
                inner_html: node.inner_html(),
            })
            .collect())
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl Debug for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Element")
            .field("tag", &data.tag)
            .field("id", &data.id)
            .field("classes", &data.classes)
            .field("children", &data.children.len())
            .finish_non_exhaustive()
    }
}

/// Snapshot of an element found in rendered markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub inner_html: String,
}

/// The per-thread document widgets are rendered into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    body: Element,
}

thread_local! {
    static DOCUMENT: Document = Document { body: Element::new("body") };
}

impl Document {
    pub fn current() -> Self {
        DOCUMENT.with(Clone::clone)
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.body.contains(element)
    }

    pub fn query_selector(&self, selector: &str) -> Option<Element> {
        self.body.query_selector(selector)
    }
}
