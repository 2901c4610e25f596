//! Element tree boundary over `kuchiki`: parsing, attribute access,
//! structural identity, compiled query evaluation and serialization.

use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};
use std::io;

use crate::query::{Axis, NodeTest, PositionScope, Predicate, Query, Step};

pub struct Document {
    root: NodeRef,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
        }
    }

    /// All elements in document order.
    pub fn elements(&self) -> Vec<NodeRef> {
        self.root
            .descendants()
            .filter(|node| node.as_element().is_some())
            .collect()
    }

    /// Elements matched by `query`, in document order and without duplicates.
    pub fn select(&self, query: &Query) -> Vec<NodeRef> {
        if query.steps.is_empty() {
            return Vec::new();
        }
        self.root
            .descendants()
            .filter(|node| node.as_element().is_some() && matches_steps(node, &query.steps))
            .collect()
    }

    /// Detaches every `<style>` element and returns their text in document order.
    pub fn take_style_blocks(&self) -> Vec<String> {
        let styles: Vec<NodeRef> = self
            .elements()
            .into_iter()
            .filter(|node| tag_name(node).as_deref() == Some("style"))
            .collect();
        styles
            .into_iter()
            .map(|node| {
                let text = node.text_contents();
                detach(&node);
                text
            })
            .collect()
    }

    pub fn body(&self) -> Option<NodeRef> {
        self.root
            .descendants()
            .find(|node| tag_name(node).as_deref() == Some("body"))
    }

    /// Appends `<style type="text/css">` holding `text` to the body. Returns
    /// false when there is no body.
    pub fn append_style_block(&self, text: &str) -> bool {
        let Some(body) = self.body() else {
            return false;
        };
        let template = kuchiki::parse_html().one("<style type=\"text/css\"></style>");
        let Some(style) = template
            .descendants()
            .find(|node| tag_name(node).as_deref() == Some("style"))
        else {
            return false;
        };
        style.detach();
        style.append(NodeRef::new_text(text));
        body.append(style);
        true
    }

    pub fn serialize(&self) -> io::Result<String> {
        let mut out = Vec::new();
        self.root.serialize(&mut out)?;
        String::from_utf8(out).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|el| el.name.local.as_ref().to_ascii_lowercase())
}

pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    let el = node.as_element()?;
    let attrs = el.attributes.borrow();
    attrs.get(name).map(str::to_string)
}

pub fn set_attribute(node: &NodeRef, name: &str, value: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().insert(name, value.to_string());
    }
}

/// Removes `node` from its parent. Returns false, without error, when it
/// has no parent.
pub fn detach(node: &NodeRef) -> bool {
    if node.parent().is_none() {
        return false;
    }
    node.detach();
    true
}

/// XPath-like location such as `/html/body/div[2]/p`; the index is present
/// only when the parent has several children with the same name.
pub fn node_path(node: &NodeRef) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node.clone());
    while let Some(cur) = current {
        if let Some(name) = tag_name(&cur) {
            let same: Vec<NodeRef> = element_siblings(&cur)
                .into_iter()
                .filter(|sib| tag_name(sib).as_deref() == Some(name.as_str()))
                .collect();
            if same.len() > 1 {
                let index = same.iter().position(|sib| *sib == cur).unwrap_or(0) + 1;
                segments.push(format!("{name}[{index}]"));
            } else {
                segments.push(name);
            }
        }
        current = cur.parent();
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

/// Element children of the node's parent, including the node itself.
fn element_siblings(node: &NodeRef) -> Vec<NodeRef> {
    match node.parent() {
        Some(parent) => parent
            .children()
            .filter(|child| child.as_element().is_some())
            .collect(),
        None => vec![node.clone()],
    }
}

fn previous_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.previous_sibling();
    while let Some(sibling) = current {
        if sibling.as_element().is_some() {
            return Some(sibling);
        }
        current = sibling.previous_sibling();
    }
    None
}

fn parent_element(node: &NodeRef) -> Option<NodeRef> {
    node.parent().filter(|parent| parent.as_element().is_some())
}

fn matches_steps(node: &NodeRef, steps: &[Step]) -> bool {
    let Some((step, earlier)) = steps.split_last() else {
        return false;
    };
    if !matches_test(node, &step.test) {
        return false;
    }
    if earlier.is_empty() {
        return match step.axis {
            Axis::Descendant => true,
            Axis::Child => node
                .parent()
                .is_some_and(|parent| matches!(parent.data(), NodeData::Document(_))),
            Axis::AdjacentSibling => false,
        };
    }
    match step.axis {
        Axis::Descendant => node
            .ancestors()
            .filter(|ancestor| ancestor.as_element().is_some())
            .any(|ancestor| matches_steps(&ancestor, earlier)),
        Axis::Child => parent_element(node).is_some_and(|parent| matches_steps(&parent, earlier)),
        Axis::AdjacentSibling => previous_element_sibling(node)
            .is_some_and(|sibling| matches_steps(&sibling, earlier)),
    }
}

fn matches_test(node: &NodeRef, test: &NodeTest) -> bool {
    let Some(el) = node.as_element() else {
        return false;
    };
    let local = el.name.local.as_ref();
    if let Some(tag) = &test.tag {
        if !local.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    let attrs = el.attributes.borrow();
    test.predicates.iter().all(|predicate| match predicate {
        Predicate::HasAttribute(name) => attrs.contains(name.as_str()),
        Predicate::AttributeEquals(name, value) => attrs.get(name.as_str()) == Some(value.as_str()),
        Predicate::IdEquals(id) => attrs.get("id") == Some(id.as_str()),
        Predicate::HasClass(class) => attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
        Predicate::Position { scope, test } => {
            let siblings: Vec<NodeRef> = match scope {
                PositionScope::AnySibling => element_siblings(node),
                PositionScope::SameTag => element_siblings(node)
                    .into_iter()
                    .filter(|sib| {
                        sib.as_element()
                            .is_some_and(|s| s.name.local.as_ref().eq_ignore_ascii_case(local))
                    })
                    .collect(),
            };
            let position = siblings
                .iter()
                .position(|sib| sib == node)
                .map(|idx| idx + 1)
                .unwrap_or(0);
            position > 0 && test.matches(position, siblings.len())
        }
    })
}
