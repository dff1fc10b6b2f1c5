use std::fmt::Display;

use thiserror::Error;

/// Where a configuration defect was found: the grammar, and when known the
/// state, the rule index inside that state's declaration and the input offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub grammar: String,
    pub state: Option<String>,
    pub rule: Option<usize>,
    pub offset: Option<usize>,
}

impl Location {
    pub fn grammar(grammar: &str) -> Self {
        Location {
            grammar: grammar.to_string(),
            ..Default::default()
        }
    }

    pub fn state(grammar: &str, state: &str) -> Self {
        Location {
            grammar: grammar.to_string(),
            state: Some(state.to_string()),
            ..Default::default()
        }
    }

    pub fn rule(grammar: &str, state: &str, rule: usize) -> Self {
        Location {
            grammar: grammar.to_string(),
            state: Some(state.to_string()),
            rule: Some(rule),
            offset: None,
        }
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grammar `{}`", self.grammar)?;
        if let Some(state) = &self.state {
            write!(f, ", state `{}`", state)?;
        }
        if let Some(rule) = self.rule {
            write!(f, ", rule #{}", rule)?;
        }
        if let Some(offset) = self.offset {
            write!(f, ", at offset {}", offset)?;
        }
        Ok(())
    }
}

/// A defect in a grammar. This is the only error the engine raises: bad
/// *input* is always tokenized, only a bad *table* stops a run.
#[derive(Error, Debug, Clone)]
#[error("{internal_error} ({location})")]
pub struct ConfigurationError {
    internal_error: ErrorImpl,
    location: Location,
}

impl ConfigurationError {
    pub fn new(error_impl: ErrorImpl, location: Location) -> Self {
        ConfigurationError {
            internal_error: error_impl,
            location,
        }
    }

    pub fn kind(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_location(&self) -> &Location {
        &self.location
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        if self.location.offset.is_none() {
            self.location.offset = Some(offset);
        }
        self
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::MissingRoot { .. } => "MissingRoot",
            ErrorImpl::DuplicateState { .. } => "DuplicateState",
            ErrorImpl::UnknownState { .. } => "UnknownState",
            ErrorImpl::MixinCycle { .. } => "MixinCycle",
            ErrorImpl::InvalidPattern { .. } => "InvalidPattern",
            ErrorImpl::ZeroLengthRule { .. } => "ZeroLengthRule",
            ErrorImpl::ZeroLengthMatch => "ZeroLengthMatch",
            ErrorImpl::NoProgress { .. } => "NoProgress",
            ErrorImpl::RecursionLimit { .. } => "RecursionLimit",
            ErrorImpl::NonShrinkingRecursion => "NonShrinkingRecursion",
            ErrorImpl::OverlappingEmission => "OverlappingEmission",
            ErrorImpl::GroupCountMismatch { .. } => "GroupCountMismatch",
            ErrorImpl::UnknownWordSet { .. } => "UnknownWordSet",
            ErrorImpl::UnknownTokenKind { .. } => "UnknownTokenKind",
            ErrorImpl::MalformedTable { .. } => "MalformedTable",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::MissingRoot { root } => {
                ErrorTip::Suggestion(format!("Declare a state named `{}` or change the root", root))
            }
            ErrorImpl::DuplicateState { state } => {
                ErrorTip::Suggestion(format!("State `{}` is declared more than once", state))
            }
            ErrorImpl::UnknownState { state } => ErrorTip::Suggestion(format!(
                "State `{}` is referenced but never declared",
                state
            )),
            ErrorImpl::MixinCycle { cycle } => ErrorTip::Suggestion(format!(
                "Mixins form a cycle: {}",
                cycle.join(" -> ")
            )),
            ErrorImpl::InvalidPattern { .. } => ErrorTip::None,
            ErrorImpl::ZeroLengthRule { .. } | ErrorImpl::ZeroLengthMatch => {
                ErrorTip::Suggestion(String::from(
                    "A rule that can match the empty string must push, pop or goto",
                ))
            }
            ErrorImpl::NoProgress { steps } => ErrorTip::Suggestion(format!(
                "{} state changes in a row consumed no input; check for zero-width push/pop loops",
                steps
            )),
            ErrorImpl::RecursionLimit { depth } => ErrorTip::Suggestion(format!(
                "Sub-tokenization nested deeper than {} levels",
                depth
            )),
            ErrorImpl::NonShrinkingRecursion => ErrorTip::Suggestion(String::from(
                "Recurse only into a capture group smaller than the whole match",
            )),
            ErrorImpl::OverlappingEmission => ErrorTip::Suggestion(String::from(
                "Emit capture groups left to right without overlapping",
            )),
            ErrorImpl::GroupCountMismatch { declared, available } => {
                ErrorTip::Suggestion(format!(
                    "{} group actions declared, but the pattern only has {} capture groups",
                    declared, available
                ))
            }
            ErrorImpl::UnknownWordSet { name } => {
                ErrorTip::Suggestion(format!("Register the word set `{}` on the grammar", name))
            }
            ErrorImpl::UnknownTokenKind { name } => ErrorTip::Suggestion(format!(
                "`{}` is not a known token kind (e.g. `Comment.Single`)",
                name
            )),
            ErrorImpl::MalformedTable { .. } => ErrorTip::None,
        }
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorImpl {
    #[error("root state {root:?} is not declared")]
    MissingRoot { root: String },
    #[error("state {state:?} declared twice")]
    DuplicateState { state: String },
    #[error("reference to undeclared state {state:?}")]
    UnknownState { state: String },
    #[error("mixin cycle: {cycle:?}")]
    MixinCycle { cycle: Vec<String> },
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("pattern {pattern:?} can match the empty string without changing state")]
    ZeroLengthRule { pattern: String },
    #[error("rule matched the empty string without changing state")]
    ZeroLengthMatch,
    #[error("no input consumed after {steps} consecutive state changes")]
    NoProgress { steps: usize },
    #[error("sub-tokenization exceeded depth {depth}")]
    RecursionLimit { depth: usize },
    #[error("recursion target is not a proper sub-span of the match")]
    NonShrinkingRecursion,
    #[error("emitted spans overlap or leave the match")]
    OverlappingEmission,
    #[error("{declared} group actions for {available} capture groups")]
    GroupCountMismatch { declared: usize, available: usize },
    #[error("unknown word set {name:?}")]
    UnknownWordSet { name: String },
    #[error("unknown token kind {name:?}")]
    UnknownTokenKind { name: String },
    #[error("malformed table: {message}")]
    MalformedTable { message: String },
}
