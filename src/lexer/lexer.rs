use std::{collections::VecDeque, iter::FusedIterator, sync::Arc};

use crate::{
    config::config::LexerOptions,
    errors::errors::{ConfigurationError, ErrorImpl},
    grammar::{
        grammar::{CompiledAction, CompiledGroup, CompiledRule, Grammar, Op, StateId},
        rule::{Emission, Emitter, Groups, Matched, StateOp},
    },
    Span, MK_TOKEN,
};

use super::tokens::{Token, TokenKind};

/// Emission with every state reference resolved.
enum Emit {
    Token(TokenKind, usize, usize),
    Recurse(Option<Arc<Grammar>>, StateId, usize, usize),
}

impl Emit {
    fn range(&self) -> (usize, usize) {
        match self {
            Emit::Token(_, start, end) => (*start, *end),
            Emit::Recurse(_, _, start, end) => (*start, *end),
        }
    }
}

/// One tokenization over one text: the state stack and the cursor.
///
/// Offsets inside a run are local to `text`; `base` is added when tokens are
/// produced so a recursive run over a sub-span reports absolute positions.
struct Run<'g, 's> {
    grammar: &'g Grammar,
    text: &'s str,
    base: usize,
    pos: usize,
    stack: Vec<StateId>,
    stalled: usize,
    depth: usize,
    options: LexerOptions,
}

impl<'g, 's> Run<'g, 's> {
    fn new(
        grammar: &'g Grammar,
        text: &'s str,
        base: usize,
        state: StateId,
        depth: usize,
        options: LexerOptions,
    ) -> Self {
        Run {
            grammar,
            text,
            base,
            pos: 0,
            stack: vec![state],
            stalled: 0,
            depth,
            options,
        }
    }

    /// Runs one dispatcher step, appending whatever it emits to `out`.
    /// Returns `false` once the cursor reached the end of the text.
    fn step(&mut self, out: &mut VecDeque<Token<'s>>) -> Result<bool, ConfigurationError> {
        if self.pos >= self.text.len() {
            if self.stack.len() > 1 {
                log::debug!(
                    "end of input with {} states still pushed in `{}`",
                    self.stack.len() - 1,
                    self.grammar.name()
                );
            }
            return Ok(false);
        }

        let Some(&top) = self.stack.last() else {
            unreachable!("state stack is never empty")
        };

        let grammar = self.grammar;
        for &rule_id in &grammar.states[top.0].rules {
            let rule = &grammar.rules[rule_id];
            let needs_groups = rule.action.needs_groups();
            if let Some(matched) = rule.pattern.match_at(self.text, self.pos, needs_groups) {
                log::trace!(
                    "{}:{} matched {:?} at {}",
                    grammar.state_name(top),
                    rule.index,
                    &self.text[matched.start..matched.end],
                    self.base + self.pos
                );
                let at = self.base + self.pos;
                return self
                    .apply(rule, &matched, out)
                    .map(|_| true)
                    .map_err(|err| err.with_offset(at));
            }
        }

        self.fallback(out);
        Ok(true)
    }

    /// No rule matched: consume one character as an error token.
    fn fallback(&mut self, out: &mut VecDeque<Token<'s>>) {
        let len = self.text[self.pos..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        let value = &self.text[self.pos..self.pos + len];

        log::debug!(
            "no rule of `{}` matched {:?} at {}",
            self.grammar.state_name(self.stack[self.stack.len() - 1]),
            value,
            self.base + self.pos
        );

        out.push_back(MK_TOKEN!(TokenKind::Error, value, self.base + self.pos));
        self.pos += len;
        self.stalled = 0;
    }

    fn apply(
        &mut self,
        rule: &CompiledRule,
        matched: &Matched,
        out: &mut VecDeque<Token<'s>>,
    ) -> Result<(), ConfigurationError> {
        let grammar = self.grammar;
        let fail = |error: ErrorImpl| ConfigurationError::new(error, grammar.rule_location(rule));
        let resolve = |name: &str| {
            grammar.state_id(name).ok_or_else(|| {
                fail(ErrorImpl::UnknownState {
                    state: name.to_string(),
                })
            })
        };

        let mut emits = vec![];
        let mut ops = vec![];

        match &rule.action {
            CompiledAction::Token(kind) => emits.push(Emit::Token(*kind, matched.start, matched.end)),
            CompiledAction::Skip => {}
            CompiledAction::Groups(groups) => {
                for (index, group) in groups.iter().enumerate() {
                    let Some((start, end)) = matched.group(index + 1) else {
                        continue;
                    };
                    match group {
                        CompiledGroup::Token(kind) => emits.push(Emit::Token(*kind, start, end)),
                        CompiledGroup::Recurse(state) => {
                            emits.push(Emit::Recurse(None, *state, start, end))
                        }
                        CompiledGroup::Skip => {}
                    }
                }
            }
            CompiledAction::Lookup { sets, default } => {
                let word = &self.text[matched.start..matched.end];
                let kind = sets
                    .iter()
                    .find(|(set, _)| set.contains(word))
                    .map_or(*default, |(_, kind)| *kind);
                emits.push(Emit::Token(kind, matched.start, matched.end));
            }
            CompiledAction::Callback(callback) => {
                let groups = Groups::new(self.text, &matched.groups);
                let mut emitter = Emitter::default();
                (callback.0)(&groups, &mut emitter);

                for emission in emitter.emissions {
                    emits.push(match emission {
                        Emission::Token(kind, start, end) => Emit::Token(kind, start, end),
                        Emission::Recurse(None, start, end) => {
                            Emit::Recurse(None, grammar.root, start, end)
                        }
                        Emission::Recurse(Some(name), start, end) => {
                            Emit::Recurse(None, resolve(&name)?, start, end)
                        }
                        Emission::Delegate(other, start, end) => {
                            let root = other.root;
                            Emit::Recurse(Some(other), root, start, end)
                        }
                    });
                }
                for op in emitter.ops {
                    ops.push(match op {
                        StateOp::Push(name) => Op::Push(resolve(&name)?),
                        StateOp::PushSelf => Op::PushSelf,
                        StateOp::Pop => Op::Pop,
                        StateOp::Goto(name) => Op::Goto(resolve(&name)?),
                    });
                }
            }
        }

        if let Some(op) = rule.op {
            ops.push(op);
        }

        if matched.start == matched.end {
            if ops.is_empty() {
                return Err(fail(ErrorImpl::ZeroLengthMatch));
            }
            self.stalled += 1;
            if self.stalled > self.options.max_stalled_steps {
                return Err(fail(ErrorImpl::NoProgress {
                    steps: self.stalled,
                }));
            }
        } else {
            self.stalled = 0;
        }

        self.emit(rule, matched, emits, out)?;

        for op in ops {
            self.apply_op(op);
        }
        self.pos = matched.end;

        Ok(())
    }

    fn emit(
        &self,
        rule: &CompiledRule,
        matched: &Matched,
        emits: Vec<Emit>,
        out: &mut VecDeque<Token<'s>>,
    ) -> Result<(), ConfigurationError> {
        let fail = |error: ErrorImpl| ConfigurationError::new(error, self.grammar.rule_location(rule));
        let mut cursor = matched.start;

        for emit in emits {
            let (start, end) = emit.range();
            if start < cursor
                || end > matched.end
                || start > end
                || !self.text.is_char_boundary(start)
                || !self.text.is_char_boundary(end)
            {
                return Err(fail(ErrorImpl::OverlappingEmission));
            }
            cursor = end;
            if start == end {
                continue;
            }

            match emit {
                Emit::Token(kind, start, end) => {
                    out.push_back(MK_TOKEN!(kind, &self.text[start..end], self.base + start));
                }
                Emit::Recurse(other, state, start, end) => {
                    if end - start >= matched.end - matched.start {
                        return Err(fail(ErrorImpl::NonShrinkingRecursion));
                    }
                    if self.depth >= self.options.max_recursion_depth {
                        return Err(fail(ErrorImpl::RecursionLimit {
                            depth: self.options.max_recursion_depth,
                        }));
                    }

                    let grammar = other.as_deref().unwrap_or(self.grammar);
                    let mut sub = Run::new(
                        grammar,
                        &self.text[start..end],
                        self.base + start,
                        state,
                        self.depth + 1,
                        self.options,
                    );
                    // Errors from the nested run keep their own location.
                    while sub.step(out)? {}
                }
            }
        }

        Ok(())
    }

    fn apply_op(&mut self, op: Op) {
        match op {
            Op::Push(state) => {
                log::debug!("push `{}`", self.grammar.state_name(state));
                self.stack.push(state);
            }
            Op::PushSelf => {
                let top = self.stack[self.stack.len() - 1];
                log::debug!("push `{}` again", self.grammar.state_name(top));
                self.stack.push(top);
            }
            Op::Pop => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                    log::debug!("pop");
                } else {
                    log::debug!("ignoring pop of the last state");
                }
            }
            Op::Goto(state) => {
                log::debug!("goto `{}`", self.grammar.state_name(state));
                let last = self.stack.len() - 1;
                self.stack[last] = state;
            }
        }
    }
}

/// Lazy token stream over one `(Grammar, text)` pair.
///
/// Yields tokens as the dispatcher produces them. A configuration error is
/// yielded once and ends the stream.
pub struct Lexer<'g, 's> {
    run: Run<'g, 's>,
    pending: VecDeque<Token<'s>>,
    held: Option<Token<'s>>,
    deferred: Option<ConfigurationError>,
    finished: bool,
}

impl<'g, 's> Lexer<'g, 's> {
    pub fn new(grammar: &'g Grammar, text: &'s str, options: &LexerOptions) -> Self {
        Lexer {
            run: Run::new(grammar, text, 0, grammar.root, 0, *options),
            pending: VecDeque::new(),
            held: None,
            deferred: None,
            finished: false,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.run.grammar
    }

    /// Current cursor, in bytes.
    pub fn position(&self) -> usize {
        self.run.pos
    }

    /// Names of the active states, innermost last.
    pub fn stack(&self) -> Vec<&'g str> {
        let grammar = self.run.grammar;
        self.run
            .stack
            .iter()
            .map(|state| grammar.state_name(*state))
            .collect()
    }

    /// Also yield the spans consumed without a token, so the output covers
    /// the input exactly.
    pub fn with_skipped(self) -> WithSkipped<'g, 's> {
        WithSkipped {
            text: self.run.text,
            inner: self,
            cursor: 0,
            queued: None,
            done: false,
        }
    }

    fn next_raw(&mut self) -> Option<Result<Token<'s>, ConfigurationError>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            }
            if self.finished {
                return None;
            }

            match self.run.step(&mut self.pending) {
                Ok(true) => {}
                Ok(false) => self.finished = true,
                Err(err) => {
                    log::warn!("{}", err);
                    self.finished = true;
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }

    fn next_coalesced(&mut self) -> Option<Result<Token<'s>, ConfigurationError>> {
        if let Some(err) = self.deferred.take() {
            return Some(Err(err));
        }

        loop {
            match self.next_raw() {
                Some(Ok(token)) => match self.held.take() {
                    None => self.held = Some(token),
                    Some(prev) if prev.kind == token.kind && prev.span.end == token.span.start => {
                        let value = &self.run.text[prev.span.start..token.span.end];
                        self.held = Some(MK_TOKEN!(prev.kind, value, prev.span.start));
                    }
                    Some(prev) => {
                        self.held = Some(token);
                        return Some(Ok(prev));
                    }
                },
                Some(Err(err)) => match self.held.take() {
                    Some(prev) => {
                        self.deferred = Some(err);
                        return Some(Ok(prev));
                    }
                    None => return Some(Err(err)),
                },
                None => return self.held.take().map(Ok),
            }
        }
    }
}

impl<'s> Iterator for Lexer<'_, 's> {
    type Item = Result<Token<'s>, ConfigurationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.run.options.coalesce {
            self.next_coalesced()
        } else {
            self.next_raw()
        }
    }
}

impl FusedIterator for Lexer<'_, '_> {}

/// An item of [`Lexer::with_skipped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'s> {
    Token(Token<'s>),
    /// Input consumed by a rule that emits nothing.
    Skipped { value: &'s str, span: Span },
}

impl<'s> Segment<'s> {
    pub fn value(&self) -> &'s str {
        match self {
            Segment::Token(token) => token.value,
            Segment::Skipped { value, .. } => value,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Segment::Token(token) => token.span,
            Segment::Skipped { span, .. } => *span,
        }
    }
}

pub struct WithSkipped<'g, 's> {
    inner: Lexer<'g, 's>,
    text: &'s str,
    cursor: usize,
    queued: Option<Token<'s>>,
    done: bool,
}

impl<'s> WithSkipped<'_, 's> {
    fn skipped(&mut self, end: usize) -> Segment<'s> {
        let span = Span::new(self.cursor, end);
        self.cursor = end;
        Segment::Skipped {
            value: &self.text[span.start..span.end],
            span,
        }
    }
}

impl<'s> Iterator for WithSkipped<'_, 's> {
    type Item = Result<Segment<'s>, ConfigurationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.queued.take() {
            self.cursor = token.span.end;
            return Some(Ok(Segment::Token(token)));
        }
        if self.done {
            return None;
        }

        match self.inner.next() {
            Some(Ok(token)) if token.span.start > self.cursor => {
                self.queued = Some(token);
                Some(Ok(self.skipped(token.span.start)))
            }
            Some(Ok(token)) => {
                self.cursor = token.span.end;
                Some(Ok(Segment::Token(token)))
            }
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                if self.cursor < self.text.len() {
                    Some(Ok(self.skipped(self.text.len())))
                } else {
                    None
                }
            }
        }
    }
}

impl Grammar {
    /// Starts a lazy tokenization of `text` with default options.
    pub fn lex<'g, 's>(&'g self, text: &'s str) -> Lexer<'g, 's> {
        Lexer::new(self, text, &LexerOptions::default())
    }

    pub fn lex_with<'g, 's>(&'g self, text: &'s str, options: &LexerOptions) -> Lexer<'g, 's> {
        Lexer::new(self, text, options)
    }
}

/// Tokenizes the whole of `source`, stopping at the first configuration error.
pub fn tokenize<'s>(grammar: &Grammar, source: &'s str) -> Result<Vec<Token<'s>>, ConfigurationError> {
    grammar.lex(source).collect()
}
