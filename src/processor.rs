use crate::ast::{Span, Tag, Token, push_literal};
use crate::opening::TagFilter;
use crate::parser::{BbParser, Options};

/// Serialize tokens back into markup.
///
/// Property values are re-quoted where needed, so the output may differ from
/// the parsed source while parsing to the same tree.
pub fn reconstruct(tokens: &[Token]) -> String {
    tokens.iter().map(Token::to_string).collect()
}

/// Result of [`flatten`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattened {
    /// Every tag at any depth, in pre-order, holding only its own text
    pub tags: Vec<Tag>,
    /// The input tree with nested tags stripped from every tag's content
    pub tree: Vec<Token>,
}

/// Pull every tag into one list.
///
/// Each returned tag's content is reduced to the concatenation of its literal
/// children; tags nested inside it appear after it in the list instead.
pub fn flatten(tokens: &[Token]) -> Flattened {
    let mut tags = Vec::new();
    let tree = tokens
        .iter()
        .map(|token| match token {
            Token::Literal(text) => Token::Literal(text.clone()),
            Token::Tag(tag) => Token::Tag(flatten_tag(tag, &mut tags)),
        })
        .collect();
    Flattened { tags, tree }
}

fn flatten_tag(tag: &Tag, out: &mut Vec<Tag>) -> Tag {
    let stripped = Tag {
        content: own_text(&tag.content),
        ..without_content(tag)
    };
    out.push(stripped.clone());
    for child in tag.children() {
        flatten_tag(child, out);
    }
    stripped
}

fn own_text(content: &[Token]) -> Vec<Token> {
    let mut text = Vec::new();
    for literal in content.iter().filter_map(Token::as_literal) {
        push_literal(&mut text, literal);
    }
    text
}

fn without_content(tag: &Tag) -> Tag {
    Tag {
        name: tag.name.clone(),
        arg: tag.arg.clone(),
        properties: tag.properties.clone(),
        content: Vec::new(),
        outer: tag.outer,
        inner: tag.inner,
    }
}

/// Copy of `tokens` with every span zeroed, for comparing trees by shape.
pub fn strip_spans(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .map(|token| match token {
            Token::Literal(text) => Token::Literal(text.clone()),
            Token::Tag(tag) => Token::Tag(Tag {
                content: strip_spans(&tag.content),
                outer: Span::default(),
                inner: Span::default(),
                ..without_content(tag)
            }),
        })
        .collect()
}

/// Parse `source` keeping only tags in `filter`, let `edit` change each of them
/// (outer tags first), and serialize the result.
///
/// Text outside the matched tags comes back unchanged.
pub fn rewrite<F, E>(source: &str, filter: &TagFilter, mut edit: F) -> Result<String, E>
where
    F: FnMut(&mut Tag) -> Result<(), E>,
{
    let parser = BbParser::with_options(Options {
        allowed: Some(filter.clone()),
        ..Default::default()
    });
    let mut tokens = parser.parse(source);
    edit_tags(&mut tokens, &mut edit)?;
    Ok(reconstruct(&tokens))
}

fn edit_tags<F, E>(tokens: &mut [Token], edit: &mut F) -> Result<(), E>
where
    F: FnMut(&mut Tag) -> Result<(), E>,
{
    for tag in tokens.iter_mut().filter_map(Token::as_tag_mut) {
        edit(tag)?;
        edit_tags(&mut tag.content, edit)?;
    }
    Ok(())
}
