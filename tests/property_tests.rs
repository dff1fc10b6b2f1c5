//! Property-based tests for the token stream
//!
//! These tests check that, for any input text:
//! - Every run terminates and never fails on a well-formed grammar
//! - Tokens come out in order, without overlap, on character boundaries
//! - Tokens plus skipped spans rebuild the input exactly
//! - Two runs over the same text produce the same tokens

use proptest::prelude::*;
use statelex::{
    config::config::LexerOptions,
    grammar::rule::{Group, Rule},
    lexer::lexer::Segment,
    loader::loader::from_json,
    tokenize, Grammar, TokenKind,
};

/// A grammar with pushes, pops, zero-width transitions, recursion and skips.
fn busy_grammar() -> Grammar {
    Grammar::builder("busy")
        .state("root", |s| {
            s.rule(Rule::skip(" +"))
                .rule(Rule::token("\"", TokenKind::StringDouble).push("string"))
                .rule(Rule::groups(
                    r"(\w+)(\()([^()]*)(\))",
                    [
                        Group::Token(TokenKind::NameFunction),
                        Group::Token(TokenKind::Punctuation),
                        Group::Recurse,
                        Group::Token(TokenKind::Punctuation),
                    ],
                ))
                .rule(Rule::token(r"\n", TokenKind::Text).push("line_start"))
                .rule(Rule::token("[0-9]+", TokenKind::Number))
                .rule(Rule::token(r"\w+", TokenKind::Name))
                .rule(Rule::token(r"[{}]", TokenKind::Punctuation));
        })
        .state("string", |s| {
            s.rule(Rule::token(r"\\.", TokenKind::StringEscape))
                .rule(Rule::token(r#"[^"\\]+"#, TokenKind::StringDouble))
                .rule(Rule::token("\"", TokenKind::StringDouble).pop());
        })
        .state("line_start", |s| {
            s.rule(Rule::token("#.*", TokenKind::CommentPreproc))
                .rule(Rule::skip("").pop());
        })
        .build()
        .unwrap()
}

/// Text biased towards the characters the grammar reacts to.
fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ".{0,64}",
        "[a-z0-9 \"\\\\(){}#\n]{0,64}",
        "[a-zé€\u{1F600} \n\"]{0,32}",
    ]
}

fn io_table() -> Grammar {
    from_json(include_str!("fixtures/io.json")).unwrap()
}

proptest! {
    #[test]
    fn test_tokens_are_ordered(source in source_strategy()) {
        let grammar = busy_grammar();
        let tokens = tokenize(&grammar, &source).unwrap();

        let mut cursor = 0;
        for token in &tokens {
            prop_assert!(token.span.start >= cursor);
            prop_assert!(token.span.end > token.span.start);
            prop_assert!(source.is_char_boundary(token.span.start));
            prop_assert!(source.is_char_boundary(token.span.end));
            prop_assert_eq!(&source[token.span.start..token.span.end], token.value);
            cursor = token.span.end;
        }
    }

    #[test]
    fn test_segments_cover_input(source in source_strategy()) {
        let grammar = busy_grammar();
        let segments: Vec<_> = grammar
            .lex(&source)
            .with_skipped()
            .collect::<Result<_, _>>()
            .unwrap();

        let rebuilt: String = segments.iter().map(Segment::value).collect();
        prop_assert_eq!(rebuilt, source);
    }

    #[test]
    fn test_runs_are_deterministic(source in source_strategy()) {
        let grammar = busy_grammar();
        prop_assert_eq!(tokenize(&grammar, &source).unwrap(), tokenize(&grammar, &source).unwrap());
    }

    #[test]
    fn test_coalesced_tokens_cover_the_same_text(source in source_strategy()) {
        let grammar = io_table();
        let options = LexerOptions { coalesce: true, ..Default::default() };

        let plain = tokenize(&grammar, &source).unwrap();
        let merged: Vec<_> = grammar
            .lex_with(&source, &options)
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert!(merged.len() <= plain.len());
        let plain_text: String = plain.iter().map(|token| token.value).collect();
        let merged_text: String = merged.iter().map(|token| token.value).collect();
        prop_assert_eq!(plain_text, merged_text);
        for pair in merged.windows(2) {
            prop_assert!(pair[0].kind != pair[1].kind || pair[0].span.end != pair[1].span.start);
        }
    }

    #[test]
    fn test_io_table_covers_input(source in source_strategy()) {
        let grammar = io_table();
        let tokens = tokenize(&grammar, &source).unwrap();

        let rebuilt: String = tokens.iter().map(|token| token.value).collect();
        prop_assert_eq!(rebuilt, source);
    }
}
