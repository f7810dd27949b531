use pest::Parser;
use pest_derive::Parser;

use crate::ast::Span;
use crate::error::Error;

#[derive(Parser)]
#[grammar = "src/bb.pest"]
pub struct BbLexer;

/// Kind of a flat lexeme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Text,
    Space,
    Quote,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub span: Span,
}

/// Split `source` into lexemes that tile it without gaps.
pub fn lex(source: &str) -> Result<Vec<Lexeme>, Error> {
    let mut pairs = BbLexer::parse(Rule::stream, source).map_err(Box::new)?;
    let stream = pairs.next().expect("lexer returned no stream rule");

    Ok(stream
        .into_inner()
        .filter_map(|pair| {
            let kind = match pair.as_rule() {
                Rule::text => LexemeKind::Text,
                Rule::space => LexemeKind::Space,
                Rule::quote => LexemeKind::Quote,
                Rule::open_bracket => LexemeKind::OpenBracket,
                Rule::close_bracket => LexemeKind::CloseBracket,
                Rule::open_paren => LexemeKind::OpenParen,
                Rule::close_paren => LexemeKind::CloseParen,
                Rule::open_brace => LexemeKind::OpenBrace,
                Rule::close_brace => LexemeKind::CloseBrace,
                _ => return None,
            };
            let span = pair.as_span();
            Some(Lexeme {
                kind,
                span: Span::new(span.start(), span.end()),
            })
        })
        .collect())
}
