//! Position-tracked regex matching and the backtracking combinators built on top of it.
//!
//! The engine owns the input text and a cursor. Every terminal is a pattern from a
//! fixed table, compiled once when the engine is created. Each match attempt is
//! recorded either on the success trail or on the failure trail, which is what the
//! final [`SyntaxError`] is built from.

use regex::{Regex, RegexBuilder};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::trace;

/// A terminal pattern together with its matching flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternSpec {
    pub source: &'static str,
    pub skip_space: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

impl PatternSpec {
    pub const fn strict(source: &'static str) -> Self {
        Self {
            source,
            skip_space: false,
            ignore_case: false,
            multiline: false,
        }
    }
}

/// One attempted terminal match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub rule: &'static str,
    pub pattern: &'static str,
    pub matched: bool,
    pub index: usize,
    pub location: String,
    pub snippet: String,
}

/// A sub-parse did not match. The cursor may have moved; callers restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch;

pub type PResult<T> = Result<T, Mismatch>;

/// Result of one step of a repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Matched, the repetition may continue.
    Next(T),
    /// Matched, and the repetition must end after this element.
    Stop(T),
}

impl<T> Step<T> {
    pub fn into_inner(self) -> T {
        match self {
            Step::Next(value) | Step::Stop(value) => value,
        }
    }
}

/// Result of a speculative sub-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Matched(T),
    Stopped(T),
    Failed,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("pattern /{pattern}/ does not compile: {message}")]
    Pattern { pattern: String, message: String },
}

/// The text could not be parsed by the root rule.
#[derive(Debug, Clone, Error)]
#[error("{message} at index {index} ({location})")]
pub struct SyntaxError {
    pub index: usize,
    pub location: String,
    pub message: String,
    pub expected: Vec<String>,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseError {
    pub fn syntax(&self) -> Option<&SyntaxError> {
        match self {
            ParseError::Syntax(err) => Some(err),
            ParseError::Engine(_) => None,
        }
    }
}

/// A successful top level parse.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub root: T,
    pub logs: Vec<LogEntry>,
}

/// Number of most recent successful matches kept on the success trail.
pub const SUCCESS_TRAIL_LEN: usize = 32;

/// Compiles `source` so that it only matches at the start of the haystack.
pub fn compile(source: &str, ignore_case: bool, multiline: bool) -> Result<Regex, EngineError> {
    RegexBuilder::new(&format!(r"\A(?:{source})"))
        .case_insensitive(ignore_case)
        .multi_line(multiline)
        .build()
        .map_err(|e| EngineError::Pattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })
}

/// A terminal pattern ready to match at any offset of a text.
///
/// Matching at `start > 0` runs against the text from the preceding character on, with
/// that character consumed by a `(?s:.)` prefix. Assertions such as `\b`, `\B` and
/// multiline `^` therefore see the character before the cursor.
#[derive(Debug, Clone)]
pub struct Terminal {
    at_start: Regex,
    after_char: Regex,
}

impl Terminal {
    pub fn new(source: &str, ignore_case: bool, multiline: bool) -> Result<Self, EngineError> {
        let at_start = compile(source, ignore_case, multiline)?;
        let after_char = compile(&format!("(?s:.)(?:{source})"), ignore_case, multiline)?;
        Ok(Self { at_start, after_char })
    }

    /// End of the match that starts exactly at `start`.
    pub fn match_at(&self, text: &str, start: usize) -> Option<usize> {
        match text[..start].chars().next_back() {
            None => self.at_start.find(text).map(|m| m.end()),
            Some(prev) => {
                let from = start - prev.len_utf8();
                self.after_char.find(&text[from..]).map(|m| from + m.end())
            }
        }
    }
}

/// Offsets at which lines start, for `line:col` lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            starts,
            len: text.len(),
        }
    }

    /// 1-based line and column of a byte offset. The column counts from the last line break.
    pub fn line_col(&self, index: usize) -> (usize, usize) {
        let index = index.min(self.len);
        let line = self.starts.partition_point(|&start| start <= index);
        (line, index - self.starts[line - 1] + 1)
    }
}

pub fn line_col(text: &str, index: usize) -> (usize, usize) {
    LineIndex::new(text).line_col(index)
}

/// `path:line:col` of a byte offset, or `line:col` when there is no path.
pub fn location(path: &str, text: &str, index: usize) -> String {
    format_location(path, line_col(text, index))
}

fn format_location(path: &str, (line, col): (usize, usize)) -> String {
    if path.is_empty() {
        format!("{line}:{col}")
    } else {
        format!("{path}:{line}:{col}")
    }
}

/// Trail record; turned into a [`LogEntry`] only when logs are requested.
#[derive(Debug, Clone, Copy)]
struct Attempt {
    rule: &'static str,
    pattern: &'static str,
    matched: bool,
    index: usize,
}

pub struct Engine<'s> {
    text: &'s str,
    path: String,
    pos: usize,
    specs: &'static [PatternSpec],
    terminals: Vec<Terminal>,
    lines: LineIndex,
    successes: VecDeque<Attempt>,
    furthest_success: Option<usize>,
    failures: Vec<Attempt>,
    track_locations: bool,
}

impl<'s> Engine<'s> {
    pub fn new(text: &'s str, specs: &'static [PatternSpec]) -> Result<Self, EngineError> {
        let terminals = specs
            .iter()
            .map(|spec| Terminal::new(spec.source, spec.ignore_case, spec.multiline))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            text,
            path: String::new(),
            pos: 0,
            specs,
            terminals,
            lines: LineIndex::new(text),
            successes: VecDeque::with_capacity(SUCCESS_TRAIL_LEN),
            furthest_success: None,
            failures: Vec::new(),
            track_locations: true,
        })
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Turns off `path:line:col` text in log entries.
    pub fn with_locations(mut self, track: bool) -> Self {
        self.track_locations = track;
        self
    }

    pub fn text(&self) -> &'s str {
        self.text
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn line_col(&self, index: usize) -> (usize, usize) {
        self.lines.line_col(index)
    }

    pub fn location(&self, index: usize) -> String {
        format_location(&self.path, self.lines.line_col(index))
    }

    /// Matches pattern `id` at the cursor, skipping leading whitespace first when the
    /// pattern asks for it. On failure the cursor is left where it was.
    pub fn token(&mut self, id: usize, rule: &'static str) -> PResult<&'s str> {
        let spec = self.specs[id];
        let start = if spec.skip_space {
            self.skip_whitespace(self.pos)
        } else {
            self.pos
        };
        match self.terminals[id].match_at(self.text, start) {
            Some(end) => {
                trace!(rule, pattern = spec.source, index = end, "matched");
                self.pos = end;
                self.failures.clear();
                self.record_success(Attempt {
                    rule,
                    pattern: spec.source,
                    matched: true,
                    index: end,
                });
                Ok(&self.text[start..end])
            }
            None => {
                trace!(rule, pattern = spec.source, index = start, "no match");
                self.failures.push(Attempt {
                    rule,
                    pattern: spec.source,
                    matched: false,
                    index: start,
                });
                Err(Mismatch)
            }
        }
    }

    /// Runs `f` speculatively; a mismatch restores the cursor.
    pub fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<Step<T>>) -> Outcome<T> {
        let saved = self.pos;
        match f(self) {
            Ok(Step::Next(value)) => Outcome::Matched(value),
            Ok(Step::Stop(value)) => Outcome::Stopped(value),
            Err(Mismatch) => {
                self.pos = saved;
                Outcome::Failed
            }
        }
    }

    pub fn optional<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        match self.attempt(|e| f(e).map(Step::Next)) {
            Outcome::Matched(value) | Outcome::Stopped(value) => Some(value),
            Outcome::Failed => None,
        }
    }

    /// Applies `f` between `min` and `max` times.
    ///
    /// The first `min` applications are mandatory. A [`Step::Stop`] ends the repetition
    /// after its element is kept, and so does an optional element that consumed nothing.
    pub fn repeat<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PResult<Step<T>>,
        min: usize,
        max: Option<usize>,
    ) -> PResult<Vec<T>> {
        let limit = max.unwrap_or(usize::MAX);
        let mut items = Vec::new();
        while items.len() < min {
            match f(self)? {
                Step::Next(value) => items.push(value),
                Step::Stop(value) => {
                    items.push(value);
                    return if items.len() < min {
                        Err(Mismatch)
                    } else {
                        Ok(items)
                    };
                }
            }
        }
        while items.len() < limit {
            let before = self.pos;
            match self.attempt(&mut f) {
                Outcome::Matched(value) => {
                    items.push(value);
                    if self.pos == before {
                        break;
                    }
                }
                Outcome::Stopped(value) => {
                    items.push(value);
                    break;
                }
                Outcome::Failed => break,
            }
        }
        Ok(items)
    }

    pub fn many<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PResult<T>,
        min: usize,
        max: Option<usize>,
    ) -> PResult<Vec<T>> {
        self.repeat(|e| f(e).map(Step::Next), min, max)
    }

    /// Zero-width negative lookahead: fails when `f` matches here.
    pub fn reject<T>(
        &mut self,
        rule: &'static str,
        what: &'static str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<()> {
        let saved = self.pos;
        let matched = self.optional(f).is_some();
        self.pos = saved;
        if matched {
            trace!(rule, what, index = saved, "negation matched");
            self.failures.push(Attempt {
                rule,
                pattern: what,
                matched: false,
                index: saved,
            });
            Err(Mismatch)
        } else {
            Ok(())
        }
    }

    /// Ordered choice ran out of alternatives.
    pub fn fail(&mut self, rule: &'static str) -> Mismatch {
        trace!(rule, index = self.pos, "no alternative matched");
        Mismatch
    }

    /// The most recent successes followed by the failures since the last success.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.successes
            .iter()
            .chain(self.failures.iter())
            .map(|attempt| self.log_entry(attempt))
            .collect()
    }

    /// Turns the root rule's result into the top level outcome.
    ///
    /// `on_failure` receives the partially parsed root when the text was not fully
    /// consumed, and `None` when the root rule itself failed.
    pub fn finish<T>(
        self,
        result: PResult<T>,
        on_failure: impl FnOnce(Option<&T>),
    ) -> Result<Parsed<T>, SyntaxError> {
        let logs = self.logs();
        match result {
            Ok(root) if self.is_at_end() => Ok(Parsed { root, logs }),
            Ok(root) => {
                on_failure(Some(&root));
                let location = self.location(self.pos);
                Err(SyntaxError {
                    index: self.pos,
                    message: format!(
                        "text not fully consumed, interrupted at index {} ({})",
                        self.pos, location
                    ),
                    location,
                    expected: self.expected_at(self.pos),
                    logs,
                })
            }
            Err(Mismatch) => {
                on_failure(None);
                let index = self.deepest_index();
                let location = self.location(index);
                let expected = self.expected_at(index);
                let message = match expected.as_slice() {
                    [] => "no rule matched".to_string(),
                    patterns => format!("expected {}", patterns.join(" or ")),
                };
                Err(SyntaxError {
                    index,
                    location,
                    message,
                    expected,
                    logs,
                })
            }
        }
    }

    fn record_success(&mut self, attempt: Attempt) {
        if self.successes.len() == SUCCESS_TRAIL_LEN {
            self.successes.pop_front();
        }
        self.furthest_success = self.furthest_success.max(Some(attempt.index));
        self.successes.push_back(attempt);
    }

    fn deepest_index(&self) -> usize {
        self.failures
            .iter()
            .map(|f| f.index)
            .chain(self.furthest_success)
            .max()
            .unwrap_or(self.pos)
    }

    fn expected_at(&self, index: usize) -> Vec<String> {
        let mut expected: Vec<String> = Vec::new();
        for failure in self.failures.iter().filter(|f| f.index == index) {
            let pattern = format!("/{}/", failure.pattern);
            if !expected.contains(&pattern) {
                expected.push(pattern);
            }
        }
        expected
    }

    fn skip_whitespace(&self, from: usize) -> usize {
        self.text[from..]
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map_or(self.text.len(), |(offset, _)| from + offset)
    }

    fn log_entry(&self, attempt: &Attempt) -> LogEntry {
        LogEntry {
            rule: attempt.rule,
            pattern: attempt.pattern,
            matched: attempt.matched,
            index: attempt.index,
            location: if self.track_locations {
                self.location(attempt.index)
            } else {
                String::new()
            },
            snippet: snippet(self.text, attempt.index),
        }
    }
}

/// Up to 25 characters of text starting at `index`, with line breaks and tabs escaped.
pub fn snippet(text: &str, index: usize) -> String {
    let raw: String = text[index.min(text.len())..].chars().take(25).collect();
    let escaped = raw
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    let mut rest = escaped.as_str();
    while let Some(stripped) = rest
        .strip_prefix("\\n")
        .or_else(|| rest.strip_prefix("\\t"))
    {
        rest = stripped;
    }
    rest.to_string()
}
