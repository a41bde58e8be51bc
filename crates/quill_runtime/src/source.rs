//! Fragment sources.
//!
//! The inference engine itself lives outside this workspace; it only has to
//! hand back a cancellable stream of fragments for one turn.

use futures::stream::{self, BoxStream, StreamExt};
use quill_core::{Fragment, Message};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Boxed stream of fragments for one turn
pub type FragmentStream = BoxStream<'static, Result<Fragment, SourceError>>;

/// Failure reported by the fragment source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The engine failed mid-generation
    #[error("Engine failure: {0}")]
    Engine(String),

    /// The engine could not start generating
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Something that can generate one assistant turn
pub trait FragmentSource: Send + Sync {
    /// Start generating a reply to `history`.
    ///
    /// The stream should stop yielding once `cancel` fires. One more
    /// fragment racing the cancellation is tolerated by the consumer.
    fn stream(&self, history: &[Message], cancel: CancellationToken) -> FragmentStream;
}

/// How to cut recorded text into fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// One fragment per line, newline kept
    Lines,
    /// One fragment per word, trailing whitespace kept
    Whitespace,
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lines" => Ok(Self::Lines),
            "whitespace" => Ok(Self::Whitespace),
            other => Err(format!("unknown split mode: {}", other)),
        }
    }
}

/// Replays a fixed list of fragments
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    items: Vec<Result<Fragment, SourceError>>,
    delay: Duration,
    overrun: usize,
}

impl ScriptedSource {
    /// Source yielding the given texts as assistant fragments
    #[must_use]
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: texts.into_iter().map(|t| Ok(Fragment::assistant(t))).collect(),
            ..Self::default()
        }
    }

    /// Source built by cutting recorded text
    #[must_use]
    pub fn from_text(text: &str, split: Split) -> Self {
        match split {
            Split::Lines => Self::new(text.split_inclusive('\n')),
            Split::Whitespace => Self::new(split_words(text)),
        }
    }

    /// Fail with `error` after the fragments queued so far
    #[must_use]
    pub fn then_fail(mut self, error: SourceError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Wait before each fragment
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep yielding this many fragments after cancellation
    #[must_use]
    pub fn with_overrun(mut self, fragments: usize) -> Self {
        self.overrun = fragments;
        self
    }

    /// Number of queued items, failures included
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FragmentSource for ScriptedSource {
    fn stream(&self, _history: &[Message], cancel: CancellationToken) -> FragmentStream {
        let delay = self.delay;
        let state = (self.items.clone().into_iter(), cancel, self.overrun);

        stream::unfold(state, move |(mut items, cancel, mut overrun)| async move {
            if cancel.is_cancelled() {
                if overrun == 0 {
                    return None;
                }
                overrun -= 1;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let item = items.next()?;
            Some((item, (items, cancel, overrun)))
        })
        .boxed()
    }
}

/// Cut text at each whitespace-to-word boundary. Concatenating the pieces
/// gives back the input.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_whitespace = false;

    for c in text.chars() {
        let whitespace = c.is_whitespace();
        if !whitespace && prev_whitespace && current.chars().any(|c| !c.is_whitespace()) {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev_whitespace = whitespace;
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
