use std::{collections::HashMap, sync::Arc};

use crate::{
    errors::errors::{ConfigurationError, ErrorImpl, Location},
    lexer::tokens::TokenKind,
};

use super::{
    rule::{Action, Callback, Group, Pattern, Rule, StateOp},
    words::WordSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StateId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Push(StateId),
    PushSelf,
    Pop,
    Goto(StateId),
}

#[derive(Debug)]
pub(crate) enum CompiledGroup {
    Token(TokenKind),
    Recurse(StateId),
    Skip,
}

#[derive(Debug)]
pub(crate) enum CompiledAction {
    Token(TokenKind),
    Skip,
    Groups(Vec<CompiledGroup>),
    Lookup {
        sets: Vec<(Arc<WordSet>, TokenKind)>,
        default: TokenKind,
    },
    Callback(Callback),
}

impl CompiledAction {
    pub(crate) fn needs_groups(&self) -> bool {
        matches!(self, CompiledAction::Groups(_) | CompiledAction::Callback(_))
    }
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub pattern: Pattern,
    pub action: CompiledAction,
    pub op: Option<Op>,
    /// Declaring state and entry index, for error locations.
    pub state: StateId,
    pub index: usize,
}

#[derive(Debug)]
pub(crate) struct CompiledState {
    pub name: String,
    /// Flattened rule list (mixins inlined), indices into `Grammar::rules`.
    pub rules: Vec<usize>,
}

/// Descriptive metadata. The engine never reads it; a selection layer can.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarInfo {
    pub name: String,
    pub title: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub filenames: Vec<String>,
    pub mimetypes: Vec<String>,
}

/// An immutable, validated rule table. Share it freely between threads; each
/// tokenization creates its own [`Lexer`](crate::lexer::lexer::Lexer).
#[derive(Debug)]
pub struct Grammar {
    info: GrammarInfo,
    pub(crate) states: Vec<CompiledState>,
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) root: StateId,
    state_ids: HashMap<String, StateId>,
    word_sets: HashMap<String, Arc<WordSet>>,
}

impl Grammar {
    pub fn builder(name: &str) -> GrammarBuilder {
        GrammarBuilder::new(name)
    }

    pub fn info(&self) -> &GrammarInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn root_name(&self) -> &str {
        &self.states[self.root.0].name
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|state| state.name.as_str())
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.state_ids.contains_key(name)
    }

    /// Patterns of a state after mixin inlining, in the order they are tried.
    pub fn patterns_of(&self, state: &str) -> Option<Vec<&str>> {
        let id = self.state_ids.get(state)?;
        Some(
            self.states[id.0]
                .rules
                .iter()
                .map(|rule| self.rules[*rule].pattern.source())
                .collect(),
        )
    }

    pub fn word_set(&self, name: &str) -> Option<&Arc<WordSet>> {
        self.word_sets.get(name)
    }

    pub(crate) fn state_id(&self, name: &str) -> Option<StateId> {
        self.state_ids.get(name).copied()
    }

    pub(crate) fn state_name(&self, id: StateId) -> &str {
        &self.states[id.0].name
    }

    pub(crate) fn rule_location(&self, rule: &CompiledRule) -> Location {
        Location::rule(&self.info.name, self.state_name(rule.state), rule.index)
    }
}

enum Entry {
    Rule(Rule),
    Mixin(String),
}

enum Slot {
    Rule(usize),
    Mixin(String),
}

/// Collects the rules of one state, in priority order.
#[derive(Default)]
pub struct StateBuilder {
    entries: Vec<Entry>,
}

impl StateBuilder {
    pub fn rule(&mut self, rule: Rule) -> &mut Self {
        self.entries.push(Entry::Rule(rule));
        self
    }

    /// Inline the rules of `state` here, in its declared order.
    pub fn mixin(&mut self, state: &str) -> &mut Self {
        self.entries.push(Entry::Mixin(state.to_string()));
        self
    }
}

pub struct GrammarBuilder {
    info: GrammarInfo,
    root: String,
    states: Vec<(String, Vec<Entry>)>,
    word_sets: Vec<WordSet>,
}

impl GrammarBuilder {
    pub fn new(name: &str) -> Self {
        GrammarBuilder {
            info: GrammarInfo {
                name: name.to_string(),
                ..Default::default()
            },
            root: String::from("root"),
            states: vec![],
            word_sets: vec![],
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.info.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.info.description = description.to_string();
        self
    }

    pub fn aliases<I: IntoIterator<Item = S>, S: Into<String>>(mut self, aliases: I) -> Self {
        self.info.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn filenames<I: IntoIterator<Item = S>, S: Into<String>>(mut self, filenames: I) -> Self {
        self.info.filenames.extend(filenames.into_iter().map(Into::into));
        self
    }

    pub fn mimetypes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, mimetypes: I) -> Self {
        self.info.mimetypes.extend(mimetypes.into_iter().map(Into::into));
        self
    }

    /// Entry state. Defaults to `root`.
    pub fn root(mut self, state: &str) -> Self {
        self.root = state.to_string();
        self
    }

    pub fn words<I: IntoIterator<Item = S>, S: Into<String>>(mut self, name: &str, words: I) -> Self {
        self.word_sets.push(WordSet::from_words(name, words));
        self
    }

    /// A word set computed on first lookup rather than at build time.
    pub fn lazy_words<F, I, S>(mut self, name: &str, producer: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.word_sets.push(WordSet::lazy(name, producer));
        self
    }

    pub fn state<F: FnOnce(&mut StateBuilder)>(mut self, name: &str, define: F) -> Self {
        let mut state = StateBuilder::default();
        define(&mut state);
        self.states.push((name.to_string(), state.entries));
        self
    }

    /// Validates the table and compiles every pattern.
    pub fn build(self) -> Result<Grammar, ConfigurationError> {
        let grammar_name = self.info.name.clone();

        let mut state_ids = HashMap::new();
        for (index, (name, _)) in self.states.iter().enumerate() {
            if state_ids.insert(name.clone(), StateId(index)).is_some() {
                return Err(ConfigurationError::new(
                    ErrorImpl::DuplicateState { state: name.clone() },
                    Location::state(&grammar_name, name),
                ));
            }
        }

        let root = *state_ids.get(&self.root).ok_or_else(|| {
            ConfigurationError::new(
                ErrorImpl::MissingRoot {
                    root: self.root.clone(),
                },
                Location::grammar(&grammar_name),
            )
        })?;

        let mut word_sets = HashMap::new();
        for set in self.word_sets {
            let name = set.name().to_string();
            if word_sets.insert(name.clone(), Arc::new(set)).is_some() {
                return Err(ConfigurationError::new(
                    ErrorImpl::MalformedTable {
                        message: format!("word set {:?} declared twice", name),
                    },
                    Location::grammar(&grammar_name),
                ));
            }
        }

        let resolve = |name: &str| {
            state_ids.get(name).copied().ok_or_else(|| ErrorImpl::UnknownState {
                state: name.to_string(),
            })
        };

        let mut rules = vec![];
        let mut slots: Vec<Vec<Slot>> = vec![];
        let mut names = vec![];

        for (state_index, (state_name, entries)) in self.states.into_iter().enumerate() {
            let mut state_slots = vec![];
            for (index, entry) in entries.into_iter().enumerate() {
                match entry {
                    Entry::Mixin(name) => state_slots.push(Slot::Mixin(name)),
                    Entry::Rule(rule) => {
                        let owner = StateId(state_index);
                        let compiled = compile_rule(rule, owner, index, root, &resolve, &word_sets)
                            .map_err(|err| {
                                ConfigurationError::new(
                                    err,
                                    Location::rule(&grammar_name, &state_name, index),
                                )
                            })?;
                        state_slots.push(Slot::Rule(rules.len()));
                        rules.push(compiled);
                    }
                }
            }
            slots.push(state_slots);
            names.push(state_name);
        }

        let mut flattener = Flattener {
            grammar: &grammar_name,
            names: &names,
            slots: &slots,
            state_ids: &state_ids,
            memo: vec![None; names.len()],
            visiting: vec![],
        };
        let mut states = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let flat = flattener.flatten(StateId(index))?;
            states.push(CompiledState {
                name: name.clone(),
                rules: flat,
            });
        }

        log::debug!(
            "built grammar `{}`: {} states, {} rules",
            grammar_name,
            states.len(),
            rules.len()
        );

        Ok(Grammar {
            info: self.info,
            states,
            rules,
            root,
            state_ids,
            word_sets,
        })
    }
}

fn compile_rule(
    rule: Rule,
    state: StateId,
    index: usize,
    root: StateId,
    resolve: &dyn Fn(&str) -> Result<StateId, ErrorImpl>,
    word_sets: &HashMap<String, Arc<WordSet>>,
) -> Result<CompiledRule, ErrorImpl> {
    let pattern = Pattern::compile(&rule.pattern, rule.flags, rule.lookahead.as_ref())?;

    let is_callback = matches!(rule.action, Action::Callback(_));
    let action = match rule.action {
        Action::Token(kind) => CompiledAction::Token(kind),
        Action::Skip => CompiledAction::Skip,
        Action::Groups(groups) => {
            if groups.len() > pattern.group_count() {
                return Err(ErrorImpl::GroupCountMismatch {
                    declared: groups.len(),
                    available: pattern.group_count(),
                });
            }
            let groups = groups
                .into_iter()
                .map(|group| match group {
                    Group::Token(kind) => Ok(CompiledGroup::Token(kind)),
                    Group::Recurse => Ok(CompiledGroup::Recurse(root)),
                    Group::RecurseIn(name) => resolve(&name).map(CompiledGroup::Recurse),
                    Group::Skip => Ok(CompiledGroup::Skip),
                })
                .collect::<Result<Vec<_>, _>>()?;
            CompiledAction::Groups(groups)
        }
        Action::Lookup { sets, default } => {
            let sets = sets
                .into_iter()
                .map(|(name, kind)| match word_sets.get(&name) {
                    Some(set) => Ok((Arc::clone(set), kind)),
                    None => Err(ErrorImpl::UnknownWordSet { name }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            CompiledAction::Lookup { sets, default }
        }
        Action::Callback(callback) => CompiledAction::Callback(callback),
    };

    let op = match rule.op {
        None => None,
        Some(StateOp::Push(name)) => Some(Op::Push(resolve(&name)?)),
        Some(StateOp::PushSelf) => Some(Op::PushSelf),
        Some(StateOp::Pop) => Some(Op::Pop),
        Some(StateOp::Goto(name)) => Some(Op::Goto(resolve(&name)?)),
    };

    // Callbacks may change state themselves; they are checked when they match.
    if pattern.can_be_empty() && op.is_none() && !is_callback {
        return Err(ErrorImpl::ZeroLengthRule {
            pattern: pattern.source().to_string(),
        });
    }

    Ok(CompiledRule {
        pattern,
        action,
        op,
        state,
        index,
    })
}

struct Flattener<'a> {
    grammar: &'a str,
    names: &'a [String],
    slots: &'a [Vec<Slot>],
    state_ids: &'a HashMap<String, StateId>,
    memo: Vec<Option<Vec<usize>>>,
    visiting: Vec<StateId>,
}

impl Flattener<'_> {
    fn flatten(&mut self, id: StateId) -> Result<Vec<usize>, ConfigurationError> {
        if let Some(done) = &self.memo[id.0] {
            return Ok(done.clone());
        }

        if let Some(position) = self.visiting.iter().position(|visiting| *visiting == id) {
            let mut cycle: Vec<String> = self.visiting[position..]
                .iter()
                .map(|state| self.names[state.0].clone())
                .collect();
            cycle.push(self.names[id.0].clone());
            return Err(ConfigurationError::new(
                ErrorImpl::MixinCycle { cycle },
                Location::state(self.grammar, &self.names[id.0]),
            ));
        }

        self.visiting.push(id);
        let mut flat = vec![];
        for (index, slot) in self.slots[id.0].iter().enumerate() {
            match slot {
                Slot::Rule(rule) => flat.push(*rule),
                Slot::Mixin(name) => {
                    let mixed = self.state_ids.get(name).copied().ok_or_else(|| {
                        ConfigurationError::new(
                            ErrorImpl::UnknownState {
                                state: name.clone(),
                            },
                            Location::rule(self.grammar, &self.names[id.0], index),
                        )
                    })?;
                    flat.extend(self.flatten(mixed)?);
                }
            }
        }
        self.visiting.pop();

        self.memo[id.0] = Some(flat.clone());
        Ok(flat)
    }
}
