//! Property-based tests for the markup parser
//!
//! Arbitrary input must never panic, bracket-free input is one literal, and
//! re-parsing a reconstructed tree gives the same tree.

use bbtree::{BbParser, Tag, TagFilter, Token, parse_all, reconstruct, strip_spans};
use proptest::prelude::*;

fn parse(source: &str) -> Vec<Token> {
    BbParser::new().parse(source)
}

/// Every tag's spans nest properly and stay inside the source, and the tokens
/// tile it.
fn check_spans(tokens: &[Token], source: &str) -> Result<(), TestCaseError> {
    for tag in tokens.iter().filter_map(Token::as_tag) {
        check_tag(tag, source)?;
    }
    let end = check_tiling(tokens, source, 0, false)?;
    prop_assert_eq!(end, source.len());
    Ok(())
}

/// Literals and child tags cover the source in order from `start`; returns
/// where they stop. Unless `exact`, a tag's content may stop short of its
/// closer where the closer dropped tags left open inside it. The dropped
/// text then starts at one of their openers.
fn check_tiling(
    tokens: &[Token],
    source: &str,
    start: usize,
    exact: bool,
) -> Result<usize, TestCaseError> {
    let mut at = start;
    for token in tokens {
        match token {
            Token::Literal(text) => {
                prop_assert_eq!(source.get(at..at + text.len()), Some(text.as_str()));
                at += text.len();
            }
            Token::Tag(tag) => {
                prop_assert_eq!(tag.outer.start, at, "{:?}", tag);
                let end = check_tiling(&tag.content, source, tag.inner.start, exact)?;
                if exact {
                    prop_assert_eq!(end, tag.inner.end, "{:?}", tag);
                } else {
                    prop_assert!(end <= tag.inner.end, "{tag:?}");
                    if end < tag.inner.end {
                        prop_assert!(source[end..].starts_with('['), "gap at {end} in {source:?}");
                    }
                }
                at = tag.outer.end;
            }
        }
    }
    Ok(at)
}

fn check_tag(tag: &Tag, source: &str) -> Result<(), TestCaseError> {
    let (outer, inner) = (tag.outer, tag.inner);
    prop_assert!(outer.start <= inner.start, "{tag:?}");
    prop_assert!(inner.start <= inner.end, "{tag:?}");
    prop_assert!(inner.end <= outer.end, "{tag:?}");
    prop_assert!(outer.end <= source.len(), "{tag:?}");

    let text = outer.slice(source);
    prop_assert!(text.starts_with('['), "outer text {text:?}");
    prop_assert!(text.ends_with(']'), "outer text {text:?}");

    for child in tag.children() {
        prop_assert!(inner.start <= child.outer.start && child.outer.end <= inner.end);
        check_tag(child, source)?;
    }
    Ok(())
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z ,.!]{0,6}"
}

fn stray_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("[".to_string()),
        Just("]".to_string()),
        Just("[/c]".to_string()),
        Just("[ ]".to_string()),
        Just("[x.y]".to_string()),
    ]
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("a".to_string()),
        Just("b".to_string()),
        Just("B".to_string()),
        Just("c".to_string()),
        Just("img".to_string()),
    ]
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9.:/]{1,6}",
        "[a-z ]{0,6}".prop_map(|v| format!("\"{v}\"")),
        "[a-z]{1,3}".prop_map(|v| format!("f({v} {v})")),
        Just("[/x]".to_string()),
    ]
}

fn opener_strategy() -> impl Strategy<Value = (String, String)> {
    (
        name_strategy(),
        prop::option::of(value_strategy()),
        prop::collection::vec(("[a-z]{1,4}", prop::option::of(value_strategy())), 0..3),
    )
        .prop_map(|(name, arg, properties)| {
            let mut opener = format!("[{name}");
            if let Some(arg) = arg {
                opener.push('=');
                opener.push_str(&arg);
            }
            for (key, value) in properties {
                opener.push(' ');
                opener.push_str(&key);
                if let Some(value) = value {
                    opener.push('=');
                    opener.push_str(&value);
                }
            }
            opener.push(']');
            (opener, name)
        })
}

/// Markup built from tags, text and stray brackets. Some tags lose their
/// closer so that unwinding gets exercised too.
fn markup_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![4 => text_strategy(), 1 => stray_strategy()];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..6).prop_map(|parts| parts.concat()),
            (opener_strategy(), prop::collection::vec(inner, 0..4), 0..5u8).prop_map(
                |((opener, name), content, closer)| {
                    let closer = match closer {
                        0 => String::new(),
                        1 => format!("[/{}]", name.to_uppercase()),
                        _ => format!("[/{name}]"),
                    };
                    format!("{opener}{}{closer}", content.concat())
                }
            ),
        ]
    })
}

/// Properly nested, always closed tags around bracket-free text.
fn well_formed_strategy() -> impl Strategy<Value = String> {
    text_strategy().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..6).prop_map(|parts| parts.concat()),
            (opener_strategy(), prop::collection::vec(inner, 0..4)).prop_map(
                |((opener, name), content)| format!("{opener}{}[/{name}]", content.concat())
            ),
        ]
    })
}

proptest! {
    #[test]
    fn test_bracket_free_text_is_one_literal(source in "[^\\[\\]]+") {
        prop_assert_eq!(parse_all(&source, None), vec![Token::Literal(source.clone())]);
    }

    #[test]
    fn test_arbitrary_input_is_total(source in r#"[\[\](){}"=/ abAB\n]{0,48}"#) {
        let tokens = parse(&source);
        check_spans(&tokens, &source)?;

        if tokens.iter().all(|token| !token.is_tag()) {
            prop_assert_eq!(reconstruct(&tokens), source.clone());
        }

        let filter = TagFilter::new(["a"]);
        let filtered = parse_all(&source, Some(&filter));
        check_spans(&filtered, &source)?;
        for tag in filtered.iter().filter_map(Token::as_tag) {
            prop_assert!(tag.is_named("a"));
        }
    }

    #[test]
    fn test_markup_spans_are_nested(source in markup_strategy()) {
        check_spans(&parse(&source), &source)?;
    }

    #[test]
    fn test_well_formed_markup_is_partitioned(source in well_formed_strategy()) {
        let tokens = parse(&source);
        let end = check_tiling(&tokens, &source, 0, true)?;
        prop_assert_eq!(end, source.len());
    }

    #[test]
    fn test_reconstruct_reparses_to_same_tree(source in markup_strategy()) {
        let tokens = parse(&source);
        let rebuilt = reconstruct(&tokens);
        let reparsed = parse(&rebuilt);
        prop_assert_eq!(
            strip_spans(&reparsed),
            strip_spans(&tokens),
            "source {:?} rebuilt as {:?}",
            source,
            rebuilt
        );
    }
}
