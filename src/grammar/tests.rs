use std::{sync::Arc, thread};

use crate::{
    errors::errors::ErrorImpl,
    lexer::{lexer::tokenize, tokens::TokenKind},
};

use super::{
    grammar::Grammar,
    rule::{Group, Rule},
    words::{words, WordSet},
};

#[test]
fn test_missing_root() {
    let err = Grammar::builder("no-root")
        .state("main", |s| {
            s.rule(Rule::token("a", TokenKind::Name));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::MissingRoot {
            root: "root".to_string()
        }
    );
    assert_eq!(err.get_error_name(), "MissingRoot");
}

#[test]
fn test_custom_root() {
    let grammar = Grammar::builder("custom-root")
        .root("main")
        .state("main", |s| {
            s.rule(Rule::token("a", TokenKind::Name));
        })
        .build()
        .unwrap();

    assert_eq!(grammar.root_name(), "main");
    assert_eq!(tokenize(&grammar, "a").unwrap()[0].kind, TokenKind::Name);
}

#[test]
fn test_duplicate_state() {
    let err = Grammar::builder("dup")
        .state("root", |s| {
            s.rule(Rule::token("a", TokenKind::Name));
        })
        .state("root", |s| {
            s.rule(Rule::token("b", TokenKind::Name));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::DuplicateState {
            state: "root".to_string()
        }
    );
}

#[test]
fn test_unknown_push_target() {
    let err = Grammar::builder("dangling")
        .state("root", |s| {
            s.rule(Rule::token("a", TokenKind::Name))
                .rule(Rule::token("\"", TokenKind::Punctuation).push("string"));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::UnknownState {
            state: "string".to_string()
        }
    );
    assert_eq!(err.get_location().state.as_deref(), Some("root"));
    assert_eq!(err.get_location().rule, Some(1));
    assert_eq!(err.get_location().offset, None);
}

#[test]
fn test_unknown_recurse_target() {
    let err = Grammar::builder("dangling")
        .state("root", |s| {
            s.rule(Rule::groups("<(.)>", [Group::RecurseIn("inner".to_string())]));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::UnknownState {
            state: "inner".to_string()
        }
    );
}

#[test]
fn test_unknown_mixin() {
    let err = Grammar::builder("dangling")
        .state("root", |s| {
            s.rule(Rule::token("a", TokenKind::Name)).mixin("whitespace");
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::UnknownState {
            state: "whitespace".to_string()
        }
    );
    assert_eq!(err.get_location().rule, Some(1));
}

#[test]
fn test_mixin_cycle() {
    let err = Grammar::builder("cycle")
        .state("root", |s| {
            s.mixin("a");
        })
        .state("a", |s| {
            s.rule(Rule::token("x", TokenKind::Name)).mixin("b");
        })
        .state("b", |s| {
            s.mixin("a");
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::MixinCycle {
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()]
        }
    );
    assert_eq!(err.get_tip().to_string(), "Mixins form a cycle: a -> b -> a");
}

#[test]
fn test_self_mixin() {
    let err = Grammar::builder("cycle")
        .state("root", |s| {
            s.rule(Rule::token("x", TokenKind::Name)).mixin("root");
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::MixinCycle {
            cycle: vec!["root".to_string(), "root".to_string()]
        }
    );
}

#[test]
fn test_invalid_pattern() {
    let err = Grammar::builder("broken")
        .state("root", |s| {
            s.rule(Rule::token("(unclosed", TokenKind::Name));
        })
        .build()
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        ErrorImpl::InvalidPattern { pattern, .. } if pattern == "(unclosed"
    ));
    assert_eq!(err.get_location().rule, Some(0));
}

#[test]
fn test_invalid_lookahead_pattern() {
    let err = Grammar::builder("broken")
        .state("root", |s| {
            s.rule(Rule::token("a", TokenKind::Name).followed_by("[b"));
        })
        .build()
        .unwrap_err();

    assert_eq!(err.get_error_name(), "InvalidPattern");
}

#[test]
fn test_backreference_is_rejected() {
    let err = Grammar::builder("raw-strings")
        .state("root", |s| {
            s.rule(Rule::token(r#"(#*)".*?"\1"#, TokenKind::String));
        })
        .build()
        .unwrap_err();

    assert_eq!(err.get_error_name(), "InvalidPattern");
}

#[test]
fn test_zero_length_rule() {
    for pattern in ["a*", "", r"\b", "(?:x|)"] {
        let err = Grammar::builder("empty")
            .state("root", |s| {
                s.rule(Rule::token(pattern, TokenKind::Name));
            })
            .build()
            .unwrap_err();

        assert_eq!(
            err.kind(),
            &ErrorImpl::ZeroLengthRule {
                pattern: pattern.to_string()
            }
        );
    }
}

#[test]
fn test_zero_length_rule_with_state_change() {
    let grammar = Grammar::builder("empty")
        .state("root", |s| {
            s.rule(Rule::skip("").followed_by("#").push("directive"))
                .rule(Rule::token("[a-z]+", TokenKind::Name));
        })
        .state("directive", |s| {
            s.rule(Rule::token("#[a-z]+", TokenKind::CommentPreproc))
                .rule(Rule::skip(r"\s*").pop());
        })
        .build();

    assert!(grammar.is_ok());
}

#[test]
fn test_group_count_mismatch() {
    let err = Grammar::builder("groups")
        .state("root", |s| {
            s.rule(Rule::groups(
                "(a)(b)",
                [
                    Group::Token(TokenKind::Name),
                    Group::Token(TokenKind::Name),
                    Group::Skip,
                ],
            ));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::GroupCountMismatch {
            declared: 3,
            available: 2
        }
    );
}

#[test]
fn test_fewer_groups_than_captures() {
    let grammar = Grammar::builder("groups")
        .state("root", |s| {
            s.rule(Rule::groups("(a)(b)", [Group::Token(TokenKind::Name)]));
        })
        .build()
        .unwrap();

    let tokens = tokenize(&grammar, "ab").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].value, "a");
}

#[test]
fn test_optional_group_is_skipped() {
    let grammar = Grammar::builder("groups")
        .state("root", |s| {
            s.rule(Rule::groups(
                "(-)?([0-9]+)",
                [
                    Group::Token(TokenKind::Operator),
                    Group::Token(TokenKind::NumberInteger),
                ],
            ))
            .rule(Rule::skip(" "));
        })
        .build()
        .unwrap();

    let tokens = tokenize(&grammar, "-1 2").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Operator,
            TokenKind::NumberInteger,
            TokenKind::NumberInteger
        ]
    );
}

#[test]
fn test_unknown_word_set() {
    let err = Grammar::builder("lookup")
        .state("root", |s| {
            s.rule(Rule::lookup(
                "[a-z]+",
                [("keywords", TokenKind::Keyword)],
                TokenKind::Name,
            ));
        })
        .build()
        .unwrap_err();

    assert_eq!(
        err.kind(),
        &ErrorImpl::UnknownWordSet {
            name: "keywords".to_string()
        }
    );
}

#[test]
fn test_duplicate_word_set() {
    let err = Grammar::builder("lookup")
        .words("keywords", ["if"])
        .words("keywords", ["else"])
        .state("root", |s| {
            s.rule(Rule::token("[a-z]+", TokenKind::Name));
        })
        .build()
        .unwrap_err();

    assert_eq!(err.get_error_name(), "MalformedTable");
}

#[test]
fn test_mixin_flattening_order() {
    let grammar = Grammar::builder("mixins")
        .state("whitespace", |s| {
            s.rule(Rule::skip(r"\s+"))
                .rule(Rule::token("//.*", TokenKind::CommentSingle));
        })
        .state("root", |s| {
            s.rule(Rule::token("a", TokenKind::Name))
                .mixin("whitespace")
                .rule(Rule::token("b", TokenKind::Name));
        })
        .build()
        .unwrap();

    assert_eq!(
        grammar.patterns_of("root").unwrap(),
        vec!["a", r"\s+", "//.*", "b"]
    );
    assert_eq!(grammar.patterns_of("whitespace").unwrap(), vec![r"\s+", "//.*"]);
    assert!(grammar.patterns_of("missing").is_none());
}

#[test]
fn test_diamond_mixins_are_inlined_twice() {
    let grammar = Grammar::builder("diamond")
        .state("root", |s| {
            s.mixin("x").mixin("y");
        })
        .state("x", |s| {
            s.rule(Rule::token("x", TokenKind::Name)).mixin("z");
        })
        .state("y", |s| {
            s.rule(Rule::token("y", TokenKind::Name)).mixin("z");
        })
        .state("z", |s| {
            s.rule(Rule::token("z", TokenKind::Name));
        })
        .build()
        .unwrap();

    assert_eq!(grammar.patterns_of("root").unwrap(), vec!["x", "z", "y", "z"]);
}

#[test]
fn test_mixin_matches_inlined_rules() {
    let mixed = Grammar::builder("mixed")
        .state("comments", |s| {
            s.rule(Rule::token("#.*", TokenKind::CommentSingle));
        })
        .state("root", |s| {
            s.mixin("comments")
                .rule(Rule::token("[a-z]+", TokenKind::Name))
                .rule(Rule::skip(r"\s+"));
        })
        .build()
        .unwrap();

    let inlined = Grammar::builder("inlined")
        .state("root", |s| {
            s.rule(Rule::token("#.*", TokenKind::CommentSingle))
                .rule(Rule::token("[a-z]+", TokenKind::Name))
                .rule(Rule::skip(r"\s+"));
        })
        .build()
        .unwrap();

    let text = "abc # note\ndef ?";
    assert_eq!(
        tokenize(&mixed, text).unwrap(),
        tokenize(&inlined, text).unwrap()
    );
}

#[test]
fn test_state_introspection() {
    let grammar = Grammar::builder("intro")
        .state("root", |s| {
            s.rule(Rule::token("\"", TokenKind::Punctuation).push("string"));
        })
        .state("string", |s| {
            s.rule(Rule::token("\"", TokenKind::Punctuation).pop());
        })
        .build()
        .unwrap();

    assert_eq!(grammar.state_names().collect::<Vec<_>>(), vec!["root", "string"]);
    assert!(grammar.has_state("string"));
    assert!(!grammar.has_state("comment"));
}

#[test]
fn test_grammar_info() {
    let grammar = Grammar::builder("io")
        .title("Io")
        .description("Io programming language")
        .aliases(["io"])
        .filenames(["*.io"])
        .mimetypes(["text/x-iosrc"])
        .state("root", |s| {
            s.rule(Rule::token("[a-z]+", TokenKind::Name));
        })
        .build()
        .unwrap();

    let info = grammar.info();
    assert_eq!(grammar.name(), "io");
    assert_eq!(info.title, "Io");
    assert_eq!(info.description, "Io programming language");
    assert_eq!(info.aliases, vec!["io"]);
    assert_eq!(info.filenames, vec!["*.io"]);
    assert_eq!(info.mimetypes, vec!["text/x-iosrc"]);
}

#[test]
fn test_words_pattern() {
    assert_eq!(words(["if", "else"]), r"\b(?:if|else)\b");
    assert_eq!(words(["a.b", "c+"]), r"\b(?:a\.b|c\+)\b");

    let grammar = Grammar::builder("keywords")
        .state("root", |s| {
            s.rule(Rule::token(words(["if", "else"]), TokenKind::Keyword))
                .rule(Rule::token(r"\w+", TokenKind::Name))
                .rule(Rule::skip(" "));
        })
        .build()
        .unwrap();

    let kinds: Vec<_> = tokenize(&grammar, "if iffy else")
        .unwrap()
        .iter()
        .map(|token| token.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Keyword, TokenKind::Name, TokenKind::Keyword]
    );
}

#[test]
fn test_word_set_is_lazy() {
    let set = WordSet::lazy("builtins", || vec!["print", "println"]);
    assert_eq!(set.name(), "builtins");
    assert!(!set.is_initialized());

    assert!(set.contains("print"));
    assert!(!set.contains("write"));
    assert!(set.is_initialized());
    assert_eq!(set.len(), 2);

    let eager = WordSet::from_words("empty", Vec::<String>::new());
    assert!(eager.is_initialized());
    assert!(eager.is_empty());
}

#[test]
fn test_grammar_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Grammar>();

    let grammar = Arc::new(
        Grammar::builder("shared")
            .lazy_words("keywords", || vec!["let"])
            .state("root", |s| {
                s.rule(Rule::lookup(
                    r"\w+",
                    [("keywords", TokenKind::Keyword)],
                    TokenKind::Name,
                ))
                .rule(Rule::skip(" "));
            })
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let grammar = Arc::clone(&grammar);
            thread::spawn(move || {
                tokenize(&grammar, "let x")
                    .unwrap()
                    .iter()
                    .map(|token| token.kind)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            vec![TokenKind::Keyword, TokenKind::Name]
        );
    }
}
