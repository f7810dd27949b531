//! Groups lexemes into a tree of bracket groups.
//!
//! `[...]` groups may appear anywhere. Inside a `[` body, `(...)` and `{...}`
//! group too and `"..."` is an atomic quoted run, so attribute values can hold
//! spaces, brackets and parentheses. Delimiters without a partner stay text.

use tracing::{debug, trace, warn};

use crate::ast::Span;
use crate::lexer::{Lexeme, LexemeKind, lex};
use crate::opening;

/// Delimiter family of a [`Group`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `[` `]`
    Bracket,
    /// `(` `)`
    Paren,
    /// `{` `}`
    Brace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Run of plain text, including delimiters that found no partner
    Text(Span),
    /// Run of whitespace
    Space(Span),
    /// `"..."` inside a bracket body, quotes included
    Quoted(Span),
    Group(Group),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(span) | Node::Space(span) | Node::Quoted(span) => *span,
            Node::Group(group) => group.outer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub delimiter: Delimiter,
    /// Delimiters included
    pub outer: Span,
    pub children: Vec<Node>,
    /// This is a `[` group shaped like a tag opener
    pub(crate) opening: bool,
    /// Some `[` group below this one is shaped like a tag opener
    pub(crate) nested_opening: bool,
}

impl Group {
    /// Span between the delimiters.
    pub fn inner(&self) -> Span {
        Span::new(self.outer.start + 1, self.outer.end - 1)
    }

    pub fn is_bracket(&self) -> bool {
        self.delimiter == Delimiter::Bracket
    }

    /// Whether any descendant `[` group would qualify as a tag opener on its own.
    pub fn has_nested_opening(&self) -> bool {
        self.nested_opening
    }
}

/// Consumer decision for [`walk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

/// Depth-first pre-order walk. Returning [`Walk::Skip`] for a group leaves its
/// children unvisited.
pub fn walk<'a, F>(nodes: &'a [Node], mut visit: F)
where
    F: FnMut(&'a Node) -> Walk,
{
    let mut stack = vec![nodes.iter()];
    while let Some(iter) = stack.last_mut() {
        let Some(node) = iter.next() else {
            stack.pop();
            continue;
        };
        if visit(node) == Walk::Descend {
            if let Node::Group(group) = node {
                stack.push(group.children.iter());
            }
        }
    }
}

/// Open delimiter awaiting its partner
struct Frame {
    /// `None` for the top-level frame
    delimiter: Option<Delimiter>,
    /// Index of the opening lexeme
    lexeme: usize,
    open: Span,
    children: Vec<Node>,
    /// A quoted run was read under this frame's bracket rules
    quoted: bool,
    /// `[` lexemes kept as text here because of the nesting limit
    too_deep: Vec<usize>,
}

impl Frame {
    fn root() -> Self {
        Self {
            delimiter: None,
            lexeme: 0,
            open: Span::default(),
            children: Vec::new(),
            quoted: false,
            too_deep: Vec::new(),
        }
    }

    fn push_text(&mut self, span: Span) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            if last.end == span.start {
                last.end = span.end;
                return;
            }
        }
        self.children.push(Node::Text(span));
    }

    fn push_node(&mut self, node: Node) {
        match node {
            Node::Text(span) => self.push_text(span),
            node => self.children.push(node),
        }
    }

    /// Append nodes while dissolving value groups, which mean nothing at top level.
    fn push_top_level(&mut self, node: Node) {
        match node {
            Node::Group(group) if !group.is_bracket() => {
                self.push_text(Span::new(group.outer.start, group.outer.start + 1));
                for child in group.children {
                    self.push_top_level(child);
                }
                self.push_text(Span::new(group.outer.end - 1, group.outer.end));
            }
            node => self.push_node(node),
        }
    }
}

/// How a `[` lexeme resolved in an earlier pass. Whether a bracket closes
/// depends only on what follows it, so later passes reuse the answer.
enum Resolved {
    /// Never finds its `]`
    Unclosed,
    /// Closes at lexeme `end`
    Closed { group: Group, end: usize },
}

struct Bracketizer<'s> {
    source: &'s str,
    lexemes: Vec<Lexeme>,
    /// For each lexeme index, the index of the next quote lexeme after it
    next_quote: Vec<Option<usize>>,
    /// Indexed by lexeme; only `[` lexemes are ever filled in
    resolved: Vec<Option<Resolved>>,
    stack: Vec<Frame>,
    max_depth: usize,
}

/// Build the group tree of `source`.
///
/// Frames nested deeper than `max_depth` are not opened; their delimiters stay text.
pub fn bracketize(source: &str, max_depth: usize) -> Vec<Node> {
    let lexemes = match lex(source) {
        Ok(lexemes) => lexemes,
        Err(err) => {
            warn!(error = %err, "lexing failed, treating input as text");
            return if source.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(Span::new(0, source.len()))]
            };
        }
    };

    let mut next_quote = vec![None; lexemes.len()];
    let mut upcoming = None;
    for (i, lexeme) in lexemes.iter().enumerate().rev() {
        next_quote[i] = upcoming;
        if lexeme.kind == LexemeKind::Quote {
            upcoming = Some(i);
        }
    }

    let resolved = std::iter::repeat_with(|| None).take(lexemes.len()).collect();
    Bracketizer {
        source,
        lexemes,
        next_quote,
        resolved,
        stack: vec![Frame::root()],
        max_depth,
    }
    .run()
}

impl Bracketizer<'_> {
    fn run(mut self) -> Vec<Node> {
        let mut i = 0;
        loop {
            while i < self.lexemes.len() {
                i = self.step(i);
            }
            match self.unclosed_end() {
                Some(resume) => i = resume,
                None => break,
            }
        }

        debug_assert_eq!(self.stack.len(), 1);
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }

    /// Consume the lexeme at `i`, returning the index of the next one to read.
    fn step(&mut self, i: usize) -> usize {
        let Lexeme { kind, span } = self.lexemes[i];
        let in_bracket = self.stack.len() > 1;

        match kind {
            LexemeKind::Text => self.top().push_text(span),
            LexemeKind::Space => self.top().children.push(Node::Space(span)),
            LexemeKind::Quote if in_bracket => match self.next_quote[i] {
                Some(end) => {
                    let quoted = Span::new(span.start, self.lexemes[end].span.end);
                    let top = self.top();
                    top.children.push(Node::Quoted(quoted));
                    top.quoted = true;
                    return end + 1;
                }
                None => self.top().push_text(span),
            },
            LexemeKind::Quote => self.top().push_text(span),
            LexemeKind::OpenBracket => return self.open_bracket(i, span),
            LexemeKind::OpenParen => self.open(i, span, Delimiter::Paren),
            LexemeKind::OpenBrace => self.open(i, span, Delimiter::Brace),
            LexemeKind::CloseBracket => self.close_with(span, Delimiter::Bracket),
            LexemeKind::CloseParen => self.close_with(span, Delimiter::Paren),
            LexemeKind::CloseBrace => self.close_with(span, Delimiter::Brace),
        }
        i + 1
    }

    fn open_bracket(&mut self, lexeme: usize, span: Span) -> usize {
        match self.resolved[lexeme].take() {
            Some(Resolved::Closed { group, end }) => {
                self.top().push_node(Node::Group(group));
                return end + 1;
            }
            Some(Resolved::Unclosed) => {
                self.resolved[lexeme] = Some(Resolved::Unclosed);
                self.top().push_text(span);
            }
            None => self.open(lexeme, span, Delimiter::Bracket),
        }
        lexeme + 1
    }

    fn open(&mut self, lexeme: usize, span: Span, delimiter: Delimiter) {
        let groups_here = delimiter == Delimiter::Bracket || self.stack.len() > 1;
        if !groups_here {
            self.top().push_text(span);
        } else if self.stack.len() > self.max_depth {
            trace!(offset = span.start, "nesting limit reached, opener kept as text");
            let top = self.top();
            top.push_text(span);
            if delimiter == Delimiter::Bracket {
                top.too_deep.push(lexeme);
            }
        } else {
            self.stack.push(Frame {
                delimiter: Some(delimiter),
                lexeme,
                open: span,
                children: Vec::new(),
                quoted: false,
                too_deep: Vec::new(),
            });
        }
    }

    fn close_with(&mut self, span: Span, delimiter: Delimiter) {
        match self.find_frame(delimiter) {
            Some(depth) => self.close(depth, span),
            None => self.top().push_text(span),
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("bracketizer stack holds the root")
    }

    /// Nearest open frame of `delimiter`. Value groups never match across an
    /// enclosing bracket.
    fn find_frame(&self, delimiter: Delimiter) -> Option<usize> {
        for (depth, frame) in self.stack.iter().enumerate().skip(1).rev() {
            if frame.delimiter == Some(delimiter) {
                return Some(depth);
            }
            if delimiter != Delimiter::Bracket && frame.delimiter == Some(Delimiter::Bracket) {
                return None;
            }
        }
        None
    }

    fn close(&mut self, depth: usize, close: Span) {
        while self.stack.len() > depth + 1 {
            self.abandon_top();
        }
        assert!(self.stack.len() > 1, "closing the top-level frame");
        let frame = self.stack.pop().expect("checked above");
        let delimiter = frame.delimiter.expect("only the root lacks a delimiter");

        let nested_opening = frame.children.iter().any(|child| match child {
            Node::Group(group) => group.opening || group.nested_opening,
            _ => false,
        });
        let mut group = Group {
            delimiter,
            outer: Span::new(frame.open.start, close.end),
            children: frame.children,
            opening: false,
            nested_opening,
        };
        group.opening = group.is_bracket()
            && !nested_opening
            && opening::opening_shape(self.source, &group.children);

        let parent = self.top();
        if delimiter != Delimiter::Bracket {
            parent.quoted |= frame.quoted;
        }
        parent.children.push(Node::Group(group));
    }

    /// Turn the top frame back into text: its opener and its children move to
    /// the parent.
    fn abandon_top(&mut self) {
        assert!(self.stack.len() > 1, "abandoning the top-level frame");
        let frame = self.stack.pop().expect("checked above");
        trace!(offset = frame.open.start, "unbalanced opener kept as text");

        let top_level = self.stack.len() == 1;
        let parent = self.top();
        parent.quoted |= frame.quoted;
        parent.too_deep.extend(frame.too_deep);
        parent.push_text(frame.open);
        for child in frame.children {
            if top_level {
                parent.push_top_level(child);
            } else {
                parent.push_node(child);
            }
        }
    }

    /// Resolve frames still open at the end of input. Returns the lexeme index to
    /// resume scanning from when the outermost open bracket has to be re-read
    /// under top-level rules.
    fn unclosed_end(&mut self) -> Option<usize> {
        if self.stack.len() == 1 {
            return None;
        }

        if self.stack[1..].iter().any(|frame| frame.quoted) {
            let (lexeme, open) = (self.stack[1].lexeme, self.stack[1].open);
            debug!(
                offset = open.start,
                "unclosed bracket held quoted text, rescanning"
            );
            self.remember_open_frames();
            self.top().push_text(open);
            return Some(lexeme + 1);
        }

        while self.stack.len() > 1 {
            self.abandon_top();
        }
        None
    }

    /// Drop every open frame, recording its bracket as unclosed and every
    /// bracket group already built under it as closed. The rescan then
    /// steps over them instead of reading them again. Brackets that were too
    /// deep to open stay text.
    fn remember_open_frames(&mut self) {
        for frame in self.stack.split_off(1) {
            if frame.delimiter == Some(Delimiter::Bracket) {
                self.resolved[frame.lexeme] = Some(Resolved::Unclosed);
            }
            for &lexeme in &frame.too_deep {
                self.resolved[lexeme] = Some(Resolved::Unclosed);
            }
            self.remember_groups(frame.children);
        }
    }

    fn remember_groups(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            match node {
                Node::Group(group) if group.is_bracket() => {
                    let start = self.lexeme_at(group.outer.start);
                    let end = self.lexeme_at(group.outer.end - 1);
                    self.resolved[start] = Some(Resolved::Closed { group, end });
                }
                Node::Group(group) => self.remember_groups(group.children),
                _ => {}
            }
        }
    }

    /// Index of the lexeme covering byte `offset`.
    fn lexeme_at(&self, offset: usize) -> usize {
        self.lexemes.partition_point(|lexeme| lexeme.span.end <= offset)
    }
}
