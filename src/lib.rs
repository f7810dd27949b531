//! Parser and serializer for bracket markup: `[name=arg key=value]...[/name]`.
//!
//! Parsing is total. Brackets that do not form a matched tag, including tags
//! left open at the end of input, come back as literal text.

pub mod ast;
pub mod bracket;
pub mod error;
pub mod lexer;
pub mod opening;
pub mod parser;
pub mod processor;

pub use ast::{Properties, Span, Tag, Token};
pub use error::Error;
pub use opening::TagFilter;
pub use parser::{BbParser, DEFAULT_MAX_DEPTH, Options};
pub use processor::{Flattened, flatten, reconstruct, rewrite, strip_spans};

/// Parse `source`, opening only tags named in `allowed` when given.
pub fn parse_all(source: &str, allowed: Option<&TagFilter>) -> Vec<Token> {
    let options = Options {
        allowed: allowed.cloned(),
        ..Options::default()
    };
    BbParser::with_options(options).parse(source)
}

/// Whether `token` is a matched tag rather than literal text.
pub fn is_tag(token: &Token) -> bool {
    token.is_tag()
}
