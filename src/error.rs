use thiserror::Error;

use crate::lexer::Rule;

/// Failures of the fallible helper APIs.
///
/// Parsing itself never fails; malformed markup degrades to literal text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to lex markup: {0}")]
    Lex(#[from] Box<pest::error::Error<Rule>>),

    #[error("[{name}] at offset {offset} holds nested tags, not plain text")]
    NotText { name: String, offset: usize },
}
