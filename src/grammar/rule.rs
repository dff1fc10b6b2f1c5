use std::{fmt, sync::Arc};

use regex_automata::{
    meta::Regex,
    util::syntax::{self, Config},
    Anchored, Input,
};

use crate::{errors::errors::ErrorImpl, lexer::tokens::TokenKind};

use super::grammar::Grammar;

/// What happens to one capture group of a [`Action::Groups`] rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    /// Emit the group as a token of this kind.
    Token(TokenKind),
    /// Re-tokenize the group from the grammar's root state.
    Recurse,
    /// Re-tokenize the group from the named state.
    RecurseIn(String),
    /// Consume the group without emitting it.
    Skip,
}

/// Stack operation applied after a rule's emissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOp {
    Push(String),
    /// Push the current state again (nested constructs such as `/* /* */ */`).
    PushSelf,
    /// Pop the top state. Popping the last remaining state is ignored.
    Pop,
    /// Replace the top state.
    Goto(String),
}

type CallbackFn = dyn Fn(&Groups<'_>, &mut Emitter) + Send + Sync;

/// Procedural emission for rules a static mapping cannot describe.
#[derive(Clone)]
pub struct Callback(pub(crate) Arc<CallbackFn>);

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Emit the whole match as one token.
    Token(TokenKind),
    /// Consume the match without emitting anything.
    Skip,
    /// Handle capture groups 1.. in order; text outside the groups is skipped.
    Groups(Vec<Group>),
    /// Emit the whole match with the kind of the first word set containing
    /// it, or `default`.
    Lookup {
        sets: Vec<(String, TokenKind)>,
        default: TokenKind,
    },
    Callback(Callback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternFlags {
    pub case_insensitive: bool,
    /// `^` and `$` match at line boundaries. On by default.
    pub multi_line: bool,
    /// `.` matches `\n`.
    pub dot_all: bool,
}

impl Default for PatternFlags {
    fn default() -> Self {
        PatternFlags {
            case_insensitive: false,
            multi_line: true,
            dot_all: false,
        }
    }
}

impl PatternFlags {
    fn syntax(self) -> Config {
        syntax::Config::new()
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_all)
    }
}

/// One pattern-to-action binding, as written by a table author.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) pattern: String,
    pub(crate) flags: PatternFlags,
    pub(crate) lookahead: Option<(String, bool)>,
    pub(crate) action: Action,
    pub(crate) op: Option<StateOp>,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, action: Action) -> Self {
        Rule {
            pattern: pattern.into(),
            flags: PatternFlags::default(),
            lookahead: None,
            action,
            op: None,
        }
    }

    pub fn token(pattern: impl Into<String>, kind: TokenKind) -> Self {
        Rule::new(pattern, Action::Token(kind))
    }

    pub fn skip(pattern: impl Into<String>) -> Self {
        Rule::new(pattern, Action::Skip)
    }

    pub fn groups(pattern: impl Into<String>, groups: impl IntoIterator<Item = Group>) -> Self {
        Rule::new(pattern, Action::Groups(groups.into_iter().collect()))
    }

    pub fn lookup<'a>(
        pattern: impl Into<String>,
        sets: impl IntoIterator<Item = (&'a str, TokenKind)>,
        default: TokenKind,
    ) -> Self {
        let sets = sets
            .into_iter()
            .map(|(name, kind)| (name.to_string(), kind))
            .collect();
        Rule::new(pattern, Action::Lookup { sets, default })
    }

    pub fn callback<F>(pattern: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Groups<'_>, &mut Emitter) + Send + Sync + 'static,
    {
        Rule::new(pattern, Action::Callback(Callback(Arc::new(callback))))
    }

    pub fn push(mut self, state: &str) -> Self {
        self.op = Some(StateOp::Push(state.to_string()));
        self
    }

    pub fn push_self(mut self) -> Self {
        self.op = Some(StateOp::PushSelf);
        self
    }

    pub fn pop(mut self) -> Self {
        self.op = Some(StateOp::Pop);
        self
    }

    pub fn goto(mut self, state: &str) -> Self {
        self.op = Some(StateOp::Goto(state.to_string()));
        self
    }

    pub fn with_op(mut self, op: Option<StateOp>) -> Self {
        self.op = op;
        self
    }

    /// Only match when `pattern` matches right after the match.
    pub fn followed_by(mut self, pattern: impl Into<String>) -> Self {
        self.lookahead = Some((pattern.into(), false));
        self
    }

    /// Only match when `pattern` does not match right after the match.
    pub fn not_followed_by(mut self, pattern: impl Into<String>) -> Self {
        self.lookahead = Some((pattern.into(), true));
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.flags.case_insensitive = true;
        self
    }

    pub fn dot_all(mut self) -> Self {
        self.flags.dot_all = true;
        self
    }

    pub fn single_line(mut self) -> Self {
        self.flags.multi_line = false;
        self
    }

    pub fn with_flags(mut self, flags: PatternFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Byte ranges of a successful anchored match, relative to the text being lexed.
#[derive(Debug)]
pub(crate) struct Matched {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<(usize, usize)>>,
}

impl Matched {
    pub fn group(&self, index: usize) -> Option<(usize, usize)> {
        self.groups.get(index).copied().flatten()
    }
}

#[derive(Debug)]
struct Lookahead {
    regex: Regex,
    negative: bool,
}

/// A compiled rule pattern, only ever searched anchored at the cursor.
#[derive(Debug)]
pub(crate) struct Pattern {
    source: String,
    regex: Regex,
    lookahead: Option<Lookahead>,
    can_be_empty: bool,
}

fn compile(source: &str, flags: PatternFlags) -> Result<Regex, ErrorImpl> {
    Regex::builder()
        .syntax(flags.syntax())
        .build(source)
        .map_err(|err| ErrorImpl::InvalidPattern {
            pattern: source.to_string(),
            message: err.to_string(),
        })
}

impl Pattern {
    pub fn compile(
        source: &str,
        flags: PatternFlags,
        lookahead: Option<&(String, bool)>,
    ) -> Result<Pattern, ErrorImpl> {
        let regex = compile(source, flags)?;
        let hir = syntax::parse_with(source, &flags.syntax()).map_err(|err| {
            ErrorImpl::InvalidPattern {
                pattern: source.to_string(),
                message: err.to_string(),
            }
        })?;
        let can_be_empty = hir.properties().minimum_len() == Some(0);

        let lookahead = match lookahead {
            Some((pattern, negative)) => Some(Lookahead {
                regex: compile(pattern, flags)?,
                negative: *negative,
            }),
            None => None,
        };

        Ok(Pattern {
            source: source.to_string(),
            regex,
            lookahead,
            can_be_empty,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn can_be_empty(&self) -> bool {
        self.can_be_empty
    }

    /// Number of explicit capture groups.
    pub fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    /// Tries the pattern anchored at `pos`. The whole `text` stays visible so
    /// `^`, `$` and `\b` see the characters around the cursor.
    ///
    /// When a lookahead guard rejects a match, the body is searched again
    /// with its end capped just before the rejected end, so a greedy body
    /// gives back characters the way a backtracking `(?=...)` would.
    pub fn match_at(&self, text: &str, pos: usize, with_groups: bool) -> Option<Matched> {
        let mut limit = text.len();
        loop {
            let matched = self.search(text, pos, limit, with_groups)?;
            let Some(lookahead) = &self.lookahead else {
                return Some(matched);
            };
            if lookahead.accepts(text, matched.end) {
                return Some(matched);
            }
            if matched.end == pos {
                return None;
            }

            limit = matched.end - 1;
            while !text.is_char_boundary(limit) {
                limit -= 1;
            }
        }
    }

    fn search(&self, text: &str, pos: usize, limit: usize, with_groups: bool) -> Option<Matched> {
        let input = Input::new(text).span(pos..limit).anchored(Anchored::Yes);

        let matched = if with_groups {
            let mut caps = self.regex.create_captures();
            self.regex.search_captures(&input, &mut caps);
            let whole = caps.get_match()?;
            let groups = (0..caps.group_len())
                .map(|index| caps.get_group(index).map(|span| (span.start, span.end)))
                .collect();
            Matched {
                start: whole.start(),
                end: whole.end(),
                groups,
            }
        } else {
            let whole = self.regex.search(&input)?;
            Matched {
                start: whole.start(),
                end: whole.end(),
                groups: vec![],
            }
        };

        Some(matched)
    }
}

impl Lookahead {
    fn accepts(&self, text: &str, at: usize) -> bool {
        let rest = Input::new(text).span(at..text.len()).anchored(Anchored::Yes);
        self.regex.search(&rest).is_some() != self.negative
    }
}

/// One capture group of the current match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// The capture groups handed to a [`Callback`]. Offsets are relative to the
/// text being lexed, which for a recursive run is the recursed sub-span.
#[derive(Debug)]
pub struct Groups<'a> {
    text: &'a str,
    spans: &'a [Option<(usize, usize)>],
}

impl<'a> Groups<'a> {
    pub(crate) fn new(text: &'a str, spans: &'a [Option<(usize, usize)>]) -> Self {
        Groups { text, spans }
    }

    /// Group `index`, or `None` when it did not participate. Group 0 is the
    /// whole match.
    pub fn get(&self, index: usize) -> Option<Capture<'a>> {
        let (start, end) = self.spans.get(index).copied().flatten()?;
        Some(Capture {
            start,
            end,
            text: &self.text[start..end],
        })
    }

    pub fn as_str(&self, index: usize) -> Option<&'a str> {
        self.get(index).map(|capture| capture.text)
    }

    pub fn whole(&self) -> Capture<'a> {
        self.get(0).unwrap_or(Capture {
            start: 0,
            end: 0,
            text: "",
        })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Emission {
    Token(TokenKind, usize, usize),
    Recurse(Option<String>, usize, usize),
    Delegate(Arc<Grammar>, usize, usize),
}

/// Collects what a [`Callback`] wants done with the current match.
///
/// Emissions must be made left to right and must not overlap. Groups passed
/// as `None` are ignored, so `out.token(kind, m.get(3))` is safe for optional
/// groups.
#[derive(Debug, Default)]
pub struct Emitter {
    pub(crate) emissions: Vec<Emission>,
    pub(crate) ops: Vec<StateOp>,
}

impl Emitter {
    pub fn token(&mut self, kind: TokenKind, capture: Option<Capture<'_>>) -> &mut Self {
        if let Some(capture) = capture {
            self.emissions
                .push(Emission::Token(kind, capture.start, capture.end));
        }
        self
    }

    /// Re-tokenize `capture` from the grammar's root state.
    pub fn recurse(&mut self, capture: Option<Capture<'_>>) -> &mut Self {
        if let Some(capture) = capture {
            self.emissions
                .push(Emission::Recurse(None, capture.start, capture.end));
        }
        self
    }

    pub fn recurse_in(&mut self, state: &str, capture: Option<Capture<'_>>) -> &mut Self {
        if let Some(capture) = capture {
            self.emissions.push(Emission::Recurse(
                Some(state.to_string()),
                capture.start,
                capture.end,
            ));
        }
        self
    }

    /// Tokenize `capture` with another grammar, starting at its root.
    pub fn delegate(&mut self, grammar: &Arc<Grammar>, capture: Option<Capture<'_>>) -> &mut Self {
        if let Some(capture) = capture {
            self.emissions.push(Emission::Delegate(
                Arc::clone(grammar),
                capture.start,
                capture.end,
            ));
        }
        self
    }

    pub fn push(&mut self, state: &str) -> &mut Self {
        self.ops.push(StateOp::Push(state.to_string()));
        self
    }

    pub fn push_self(&mut self) -> &mut Self {
        self.ops.push(StateOp::PushSelf);
        self
    }

    pub fn pop(&mut self) -> &mut Self {
        self.ops.push(StateOp::Pop);
        self
    }

    pub fn goto(&mut self, state: &str) -> &mut Self {
        self.ops.push(StateOp::Goto(state.to_string()));
        self
    }
}
