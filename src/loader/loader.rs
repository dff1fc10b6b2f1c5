use std::{fmt, marker::PhantomData};

use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::{
    errors::errors::{ConfigurationError, ErrorImpl, Location},
    grammar::{
        grammar::Grammar,
        rule::{Group, PatternFlags, Rule, StateOp},
    },
    lexer::tokens::TokenKind,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableDef {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    mimetypes: Vec<String>,
    #[serde(default)]
    root: Option<String>,
    #[serde(default, deserialize_with = "ordered_entries")]
    words: Vec<(String, Vec<String>)>,
    #[serde(deserialize_with = "ordered_entries")]
    states: Vec<(String, Vec<EntryDef>)>,
}

/// Reads a JSON object as `(key, value)` pairs in document order. Repeated
/// keys are kept, so the builder reports them instead of the last one
/// silently winning.
fn ordered_entries<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryDef {
    Mixin(MixinDef),
    Rule(RuleDef),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MixinDef {
    mixin: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDef {
    pattern: String,
    #[serde(default)]
    flags: String,

    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    skip: bool,
    #[serde(default)]
    groups: Option<Vec<String>>,
    #[serde(default)]
    lookup: Option<LookupDef>,

    #[serde(default)]
    push: Option<String>,
    #[serde(default)]
    push_self: bool,
    #[serde(default)]
    pop: bool,
    #[serde(default)]
    goto: Option<String>,

    #[serde(default)]
    followed_by: Option<String>,
    #[serde(default)]
    not_followed_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupDef {
    /// `[set name, kind]` pairs, tried in order.
    sets: Vec<(String, String)>,
    default: String,
}

enum StateEntry {
    Rule(Rule),
    Mixin(String),
}

fn kind(name: &str) -> Result<TokenKind, ErrorImpl> {
    TokenKind::from_qualname(name).ok_or_else(|| ErrorImpl::UnknownTokenKind {
        name: name.to_string(),
    })
}

fn malformed(message: impl Into<String>) -> ErrorImpl {
    ErrorImpl::MalformedTable {
        message: message.into(),
    }
}

fn group(entry: &str) -> Result<Group, ErrorImpl> {
    match entry {
        "@skip" => Ok(Group::Skip),
        "@recurse" => Ok(Group::Recurse),
        _ => match entry.strip_prefix("@recurse:") {
            Some(state) => Ok(Group::RecurseIn(state.to_string())),
            None if entry.starts_with('@') => {
                Err(malformed(format!("unknown group directive {:?}", entry)))
            }
            None => kind(entry).map(Group::Token),
        },
    }
}

fn flags(letters: &str) -> Result<PatternFlags, ErrorImpl> {
    let mut flags = PatternFlags::default();
    for flag in letters.chars() {
        match flag {
            'i' => flags.case_insensitive = true,
            's' => flags.dot_all = true,
            'l' => flags.multi_line = false,
            _ => return Err(malformed(format!("unknown pattern flag {:?}", flag))),
        }
    }

    Ok(flags)
}

fn rule(def: RuleDef) -> Result<Rule, ErrorImpl> {
    let declared_actions = [
        def.token.is_some(),
        def.skip,
        def.groups.is_some(),
        def.lookup.is_some(),
    ];
    if declared_actions.iter().filter(|set| **set).count() != 1 {
        return Err(malformed(format!(
            "rule {:?} needs exactly one of `token`, `skip`, `groups` or `lookup`",
            def.pattern
        )));
    }

    let mut ops = vec![];
    if let Some(state) = def.push {
        ops.push(StateOp::Push(state));
    }
    if def.push_self {
        ops.push(StateOp::PushSelf);
    }
    if def.pop {
        ops.push(StateOp::Pop);
    }
    if let Some(state) = def.goto {
        ops.push(StateOp::Goto(state));
    }
    if ops.len() > 1 {
        return Err(malformed(format!(
            "rule {:?} declares more than one state operation",
            def.pattern
        )));
    }

    let rule = if let Some(name) = &def.token {
        Rule::token(def.pattern, kind(name)?)
    } else if let Some(groups) = &def.groups {
        let groups = groups
            .iter()
            .map(|entry| group(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Rule::groups(def.pattern, groups)
    } else if let Some(lookup) = &def.lookup {
        let sets = lookup
            .sets
            .iter()
            .map(|(set, name)| kind(name).map(|token_kind| (set.as_str(), token_kind)))
            .collect::<Result<Vec<_>, _>>()?;
        Rule::lookup(def.pattern, sets, kind(&lookup.default)?)
    } else {
        Rule::skip(def.pattern)
    };

    let rule = match (def.followed_by, def.not_followed_by) {
        (Some(_), Some(_)) => {
            return Err(malformed(format!(
                "rule {:?} has both `followed_by` and `not_followed_by`",
                rule.pattern()
            )))
        }
        (Some(pattern), None) => rule.followed_by(pattern),
        (None, Some(pattern)) => rule.not_followed_by(pattern),
        (None, None) => rule,
    };

    Ok(rule.with_flags(flags(&def.flags)?).with_op(ops.pop()))
}

/// Reads a JSON rule table and builds it into a [`Grammar`].
pub fn from_json(source: &str) -> Result<Grammar, ConfigurationError> {
    let table: TableDef = serde_json::from_str(source).map_err(|err| {
        ConfigurationError::new(malformed(err.to_string()), Location::grammar("<json>"))
    })?;

    let mut states = Vec::with_capacity(table.states.len());
    for (state, entries) in table.states {
        let mut converted = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            converted.push(match entry {
                EntryDef::Mixin(def) => StateEntry::Mixin(def.mixin),
                EntryDef::Rule(def) => StateEntry::Rule(rule(def).map_err(|err| {
                    ConfigurationError::new(err, Location::rule(&table.name, &state, index))
                })?),
            });
        }
        states.push((state, converted));
    }

    let mut builder = Grammar::builder(&table.name)
        .aliases(table.aliases)
        .filenames(table.filenames)
        .mimetypes(table.mimetypes);
    if let Some(title) = &table.title {
        builder = builder.title(title);
    }
    if let Some(description) = &table.description {
        builder = builder.description(description);
    }
    if let Some(root) = &table.root {
        builder = builder.root(root);
    }
    for (name, words) in table.words {
        builder = builder.words(&name, words);
    }
    for (name, entries) in states {
        builder = builder.state(&name, |s| {
            for entry in entries {
                match entry {
                    StateEntry::Rule(rule) => s.rule(rule),
                    StateEntry::Mixin(state) => s.mixin(&state),
                };
            }
        });
    }

    log::debug!("loaded table `{}`", table.name);
    builder.build()
}
