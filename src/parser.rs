use tracing::{debug, trace};

use crate::ast::{Properties, Span, Tag, Token, push_literal, push_token};
use crate::bracket::{Node, Walk, bracketize, walk};
use crate::opening::{Opening, TagFilter, closing_name, try_parse_opening};

/// Default limit on both bracket nesting and tag nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Configuration for parsing.
#[derive(Debug, Clone)]
pub struct Options {
    /// Only these tag names open tags; other brackets stay text (default: all)
    pub allowed: Option<TagFilter>,
    /// Deeper brackets and tags are read as text (default: 128)
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allowed: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Bracket markup parser
#[derive(Debug, Clone, Default)]
pub struct BbParser {
    options: Options,
}

impl BbParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Restrict tags to `names`, compared case-insensitively.
    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.allowed = Some(TagFilter::new(names));
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Parse `source` into tokens. Never fails: markup that does not resolve
    /// into a matched tag is kept as text.
    pub fn parse(&self, source: &str) -> Vec<Token> {
        let nodes = bracketize(source, self.options.max_depth);
        let mut builder = TreeBuilder::new(
            source,
            self.options.allowed.as_ref(),
            self.options.max_depth,
        );
        walk(&nodes, |node| builder.visit(node));
        builder.finish()
    }
}

/// A tag whose closer has not been seen yet
struct OpenTag {
    name: String,
    arg: Option<String>,
    properties: Properties,
    content: Vec<Token>,
    outer_start: usize,
    inner_start: usize,
}

impl OpenTag {
    /// Synthetic frame holding the top-level tokens
    fn top_level() -> Self {
        Self {
            name: "topLevel".to_string(),
            arg: None,
            properties: Properties::new(),
            content: Vec::new(),
            outer_start: 0,
            inner_start: 0,
        }
    }

    fn from_opening(opening: Opening) -> Self {
        Self {
            name: opening.name,
            arg: opening.arg,
            properties: opening.properties,
            content: Vec::new(),
            outer_start: opening.outer.start,
            inner_start: opening.outer.end,
        }
    }

    fn close(self, closer: Span) -> Tag {
        Tag {
            name: self.name,
            arg: self.arg,
            properties: self.properties,
            content: self.content,
            outer: Span::new(self.outer_start, closer.end),
            inner: Span::new(self.inner_start, closer.start),
        }
    }
}

/// Builds the token tree from one walk over the bracket groups
struct TreeBuilder<'s> {
    source: &'s str,
    allowed: Option<&'s TagFilter>,
    max_depth: usize,
    /// Open tags; index 0 is the top-level frame
    stack: Vec<OpenTag>,
    /// Source before this offset has been assigned to some frame
    flushed: usize,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str, allowed: Option<&'s TagFilter>, max_depth: usize) -> Self {
        Self {
            source,
            allowed,
            max_depth,
            stack: vec![OpenTag::top_level()],
            flushed: 0,
        }
    }

    fn visit(&mut self, node: &Node) -> Walk {
        let Node::Group(group) = node else {
            return Walk::Descend;
        };
        if !group.is_bracket() {
            return Walk::Descend;
        }

        if let Some(name) = closing_name(self.source, group) {
            return match self.find_open(name) {
                Some(depth) => {
                    self.close(depth, group.outer);
                    Walk::Skip
                }
                None => Walk::Descend,
            };
        }

        if self.stack.len() > self.max_depth {
            trace!(offset = group.outer.start, "tag nesting limit reached");
            return Walk::Descend;
        }
        match try_parse_opening(self.source, group, self.allowed) {
            Some(opening) => {
                self.open(opening);
                Walk::Skip
            }
            None => Walk::Descend,
        }
    }

    /// Nearest open tag named `name`, ignoring case. Never the top-level frame.
    fn find_open(&self, name: &str) -> Option<usize> {
        self.stack
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, open)| open.name.eq_ignore_ascii_case(name))
            .map(|(depth, _)| depth)
    }

    fn open(&mut self, opening: Opening) {
        self.flush(opening.outer.start);
        self.flushed = opening.outer.end;
        self.stack.push(OpenTag::from_opening(opening));
    }

    fn close(&mut self, depth: usize, closer: Span) {
        self.flush(closer.start);
        self.flushed = closer.end;

        for discarded in self.stack.drain(depth + 1..) {
            debug!(
                name = %discarded.name,
                offset = discarded.outer_start,
                "unclosed tag discarded by an enclosing closer"
            );
        }

        assert!(self.stack.len() > 1, "closing the top-level frame");
        let tag = self.stack.pop().expect("checked above").close(closer);
        self.top().content.push(Token::Tag(tag));
    }

    /// Move source text up to `upto` into the innermost open tag.
    fn flush(&mut self, upto: usize) {
        if upto > self.flushed {
            let source = self.source;
            let text = &source[self.flushed..upto];
            push_literal(&mut self.top().content, text);
            self.flushed = upto;
        }
    }

    fn top(&mut self) -> &mut OpenTag {
        self.stack.last_mut().expect("tree builder stack holds the top level")
    }

    /// Flush trailing text and unwind tags that never closed: each becomes its
    /// opener's text followed by whatever was parsed inside it.
    fn finish(mut self) -> Vec<Token> {
        let source = self.source;
        self.flush(source.len());

        while self.stack.len() > 1 {
            let open = self.stack.pop().expect("checked by loop condition");
            trace!(name = %open.name, offset = open.outer_start, "unclosed tag kept as text");
            let opener = &source[open.outer_start..open.inner_start];
            let parent = &mut self.top().content;
            push_literal(parent, opener);
            for token in open.content {
                push_token(parent, token);
            }
        }

        self.stack
            .pop()
            .map(|top_level| top_level.content)
            .unwrap_or_default()
    }
}
