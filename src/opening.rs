//! Tag opener grammar: `[name=arg key=value ...]`.

use std::collections::HashSet;

use crate::ast::{Properties, Span};
use crate::bracket::{Group, Node};

/// Case-insensitive allow-list of tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter(HashSet<String>);

impl TagFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn allows(&self, name: &str) -> bool {
        self.0.contains(&name.to_ascii_lowercase())
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// The parsed head of a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    pub name: String,
    pub arg: Option<String>,
    pub properties: Properties,
    /// Span of the opener alone
    pub outer: Span,
}

/// `^[A-Za-z0-9_-]+$`
pub fn is_tag_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Parse `group` as a tag opener.
///
/// Rejected when the group holds another group that would itself open a tag:
/// an attribute value never looks like markup, so such brackets are prose.
pub fn try_parse_opening(
    source: &str,
    group: &Group,
    allowed: Option<&TagFilter>,
) -> Option<Opening> {
    if !group.is_bracket() || group.has_nested_opening() {
        return None;
    }
    if !matches!(group.children.first(), Some(Node::Text(_))) {
        return None;
    }

    let mut words = words(source, &group.children).into_iter();
    let head = words.next()?;
    let (name, arg) = match head.split_once('=') {
        Some((name, arg)) => (name, Some(unquote(arg).to_owned())),
        None => (head.as_str(), None),
    };
    if !is_tag_name(name) {
        return None;
    }
    if allowed.is_some_and(|filter| !filter.allows(name)) {
        return None;
    }

    let mut properties = Properties::new();
    for word in words {
        match word.split_once('=') {
            Some((key, value)) => properties.insert(key, unquote(value)),
            None => properties.insert(word, ""),
        };
    }

    Some(Opening {
        name: name.to_owned(),
        arg,
        properties,
        outer: group.outer,
    })
}

/// Whether `children` of a bracket group read as `name...` with a valid name,
/// ignoring any allow-list.
pub(crate) fn opening_shape(source: &str, children: &[Node]) -> bool {
    if !matches!(children.first(), Some(Node::Text(_))) {
        return false;
    }
    let head: String = children
        .iter()
        .take_while(|node| !matches!(node, Node::Space(_)))
        .map(|node| node.span().slice(source))
        .collect();
    let name = head.split_once('=').map_or(head.as_str(), |(name, _)| name);
    is_tag_name(name)
}

/// Name of a `[/name]` closer. The closer must hold nothing but one text run.
pub fn closing_name<'s>(source: &'s str, group: &Group) -> Option<&'s str> {
    if !group.is_bracket() {
        return None;
    }
    match group.children.as_slice() {
        [Node::Text(span)] => span.slice(source).strip_prefix('/'),
        _ => None,
    }
}

/// Source text of each whitespace-separated word.
fn words(source: &str, children: &[Node]) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for node in children {
        match node {
            Node::Space(_) => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            node => current.push_str(node.span().slice(source)),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `"a b"` → `a b`; anything else unchanged.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .unwrap_or(value)
}
