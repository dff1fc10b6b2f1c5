use std::{collections::HashSet, fmt};

use once_cell::sync::OnceCell;

type Producer = dyn Fn() -> HashSet<String> + Send + Sync;

/// A named keyword/builtin list owned by a grammar.
///
/// The set is computed the first time it is consulted and never changes
/// afterwards, so many runs can share it across threads.
pub struct WordSet {
    name: String,
    producer: Box<Producer>,
    words: OnceCell<HashSet<String>>,
}

impl WordSet {
    /// A set computed on first use.
    pub fn lazy<F, I, S>(name: &str, producer: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WordSet {
            name: name.to_string(),
            producer: Box::new(move || producer().into_iter().map(Into::into).collect()),
            words: OnceCell::new(),
        }
    }

    /// A set whose words are known up front.
    pub fn from_words<I, S>(name: &str, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words.into_iter().map(Into::into).collect();
        WordSet {
            name: name.to_string(),
            producer: Box::new(HashSet::<String>::new),
            words: OnceCell::with_value(words),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn words(&self) -> &HashSet<String> {
        self.words.get_or_init(|| {
            log::debug!("computing word set `{}`", self.name);
            (self.producer)()
        })
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words().contains(word)
    }

    pub fn len(&self) -> usize {
        self.words().len()
    }

    pub fn is_empty(&self) -> bool {
        self.words().is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.words.get().is_some()
    }
}

impl fmt::Debug for WordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordSet")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Builds `\b(?:w1|w2|...)\b` with every word escaped.
pub fn words<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let alternatives: Vec<String> = words
        .into_iter()
        .map(|word| regex::escape(word.as_ref()))
        .collect();

    format!(r"\b(?:{})\b", alternatives.join("|"))
}
