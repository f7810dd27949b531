use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::error::Error;

/// Half-open byte range `[start, end)` into the parsed source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice of `source` covered by this span.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Ordered `key=value` properties of a tag.
///
/// Keys keep the position of their first insertion; inserting an existing key
/// replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
    /// Position of each key in `entries`
    index: HashMap<String, usize>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&at) => Some(std::mem::replace(&mut self.entries[at].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&at| self.entries[at].1.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let at = self.index.remove(key)?;
        let (_, value) = self.entries.remove(at);
        for slot in self.index.values_mut() {
            if *slot > at {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// A resolved markup element: `[name=arg key=value]content[/name]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name as written in the opener
    pub name: String,
    /// Text after `=` in the opener's first word
    pub arg: Option<String>,
    pub properties: Properties,
    pub content: Vec<Token>,
    /// From the opener's `[` through the closer's `]`
    pub outer: Span,
    /// Between the opener's `]` and the closer's `[`
    pub inner: Span,
}

impl Tag {
    /// A tag with no provenance, for building trees by hand.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: None,
            properties: Properties::new(),
            content: Vec::new(),
            outer: Span::default(),
            inner: Span::default(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn with_content(mut self, content: Vec<Token>) -> Self {
        self.content = content;
        self
    }

    /// Case-insensitive name comparison, as used for matching closers.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Content read as a single text run, e.g. the URL of an `[img]`.
    ///
    /// Empty content reads as `""`.
    pub fn text(&self) -> Result<&str, Error> {
        match self.content.as_slice() {
            [] => Ok(""),
            [Token::Literal(text)] => Ok(text),
            _ => Err(Error::NotText {
                name: self.name.clone(),
                offset: self.outer.start,
            }),
        }
    }

    /// Replace the content with one text run.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.content.clear();
        if !text.is_empty() {
            self.content.push(Token::Literal(text));
        }
    }

    /// Tags directly inside this one.
    pub fn children(&self) -> impl Iterator<Item = &Tag> {
        self.content.iter().filter_map(Token::as_tag)
    }
}

/// Top-level parsed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Raw text, never markup structure
    Literal(String),
    /// Matched `[name]...[/name]` element
    Tag(Tag),
}

impl Token {
    pub fn is_tag(&self) -> bool {
        matches!(self, Token::Tag(_))
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Token::Tag(tag) => Some(tag),
            Token::Literal(_) => None,
        }
    }

    pub fn as_tag_mut(&mut self) -> Option<&mut Tag> {
        match self {
            Token::Tag(tag) => Some(tag),
            Token::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(text) => Some(text),
            Token::Tag(_) => None,
        }
    }
}

impl From<Tag> for Token {
    fn from(tag: Tag) -> Self {
        Token::Tag(tag)
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Token::Literal(text.to_owned())
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Token::Literal(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(text) => f.write_str(text),
            Token::Tag(tag) => fmt::Display::fmt(tag, f),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.name)?;
        if let Some(arg) = &self.arg {
            write!(f, "={}", quote_value(arg))?;
        }
        for (key, value) in self.properties.iter() {
            write!(f, " {}={}", key, quote_value(value))?;
        }
        f.write_str("]")?;
        for token in &self.content {
            fmt::Display::fmt(token, f)?;
        }
        write!(f, "[/{}]", self.name)
    }
}

/// Values holding whitespace are wrapped in double quotes. So are values that
/// would not re-parse as one word because of square brackets: unbalanced ones,
/// or something that reads as a nested tag opener. A value already holding a
/// quote cannot be wrapped and is written as-is.
fn quote_value(value: &str) -> Cow<'_, str> {
    if needs_quotes(value) {
        format!("\"{value}\"").into()
    } else {
        value.into()
    }
}

fn needs_quotes(value: &str) -> bool {
    !value.contains('"') && (value.contains(char::is_whitespace) || has_bracket_hazard(value))
}

fn has_bracket_hazard(value: &str) -> bool {
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => return true,
            ']' => depth -= 1,
            _ => {}
        }
    }
    if depth != 0 {
        return true;
    }

    value.match_indices('[').any(|(i, _)| {
        let rest = &value[i + 1..];
        let name_len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
            .count();
        name_len > 0
            && rest[name_len..]
                .chars()
                .next()
                .is_none_or(|c| c == ']' || c == '=' || c.is_whitespace())
    })
}

/// Append `text` to `content`, merging with a trailing literal.
pub(crate) fn push_literal(content: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    match content.last_mut() {
        Some(Token::Literal(last)) => last.push_str(text),
        _ => content.push(Token::Literal(text.to_owned())),
    }
}

/// Append `token` to `content`, merging adjacent literals.
pub(crate) fn push_token(content: &mut Vec<Token>, token: Token) {
    match token {
        Token::Literal(text) => push_literal(content, &text),
        tag => content.push(tag),
    }
}
