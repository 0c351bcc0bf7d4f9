//! The runtime emitted at the top of every generated parser.
//!
//! Generated code must only depend on `regex`, so this is a standalone copy of the
//! engine semantics in `benfy_model::engine` (no tracing, hand-written error impls).

use proc_macro2::TokenStream;
use quote::quote;

pub fn tokens() -> TokenStream {
    quote! {
        /// Matching engine and backtracking combinators used by the nodes below.
        pub mod rt {
            #![allow(dead_code)]

            use std::fmt;

            /// A terminal pattern together with its matching flags.
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct PatternSpec {
                pub source: &'static str,
                pub skip_space: bool,
                pub ignore_case: bool,
                pub multiline: bool,
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

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct Mismatch;

            pub type PResult<T> = Result<T, Mismatch>;

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub enum Step<T> {
                Next(T),
                Stop(T),
            }

            impl<T> Step<T> {
                pub fn into_inner(self) -> T {
                    match self {
                        Step::Next(value) | Step::Stop(value) => value,
                    }
                }
            }

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub enum Outcome<T> {
                Matched(T),
                Stopped(T),
                Failed,
            }

            #[derive(Debug, Clone)]
            pub struct Parsed<T> {
                pub root: T,
                pub logs: Vec<LogEntry>,
            }

            #[derive(Debug, Clone)]
            pub struct SyntaxError {
                pub index: usize,
                pub location: String,
                pub message: String,
                pub expected: Vec<String>,
                pub logs: Vec<LogEntry>,
            }

            impl fmt::Display for SyntaxError {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{} at index {} ({})", self.message, self.index, self.location)
                }
            }

            impl std::error::Error for SyntaxError {}

            #[derive(Debug, Clone)]
            pub enum ParseError {
                Pattern { pattern: &'static str, message: String },
                Syntax(SyntaxError),
            }

            impl ParseError {
                pub fn syntax(&self) -> Option<&SyntaxError> {
                    match self {
                        ParseError::Syntax(err) => Some(err),
                        ParseError::Pattern { .. } => None,
                    }
                }
            }

            impl fmt::Display for ParseError {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match self {
                        ParseError::Pattern { pattern, message } => {
                            write!(f, "pattern /{}/ does not compile: {}", pattern, message)
                        }
                        ParseError::Syntax(err) => err.fmt(f),
                    }
                }
            }

            impl std::error::Error for ParseError {}

            impl From<SyntaxError> for ParseError {
                fn from(err: SyntaxError) -> Self {
                    ParseError::Syntax(err)
                }
            }

            /// A node of the parsed document.
            pub trait Node: Sized {
                fn parse(e: &mut Engine<'_>) -> PResult<Self>;
            }

            /// Number of most recent successful matches kept on the success trail.
            pub const SUCCESS_TRAIL_LEN: usize = 32;

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
                    LineIndex { starts, len: text.len() }
                }

                pub fn line_col(&self, index: usize) -> (usize, usize) {
                    let index = index.min(self.len);
                    let line = self.starts.partition_point(|&start| start <= index);
                    (line, index - self.starts[line - 1] + 1)
                }
            }

            pub fn line_col(text: &str, index: usize) -> (usize, usize) {
                LineIndex::new(text).line_col(index)
            }

            /// A terminal compiled for the start of the text and for matching behind the
            /// preceding character, so that assertions see the text before the cursor.
            struct Terminal {
                at_start: ::regex::Regex,
                after_char: ::regex::Regex,
            }

            impl Terminal {
                fn new(spec: &PatternSpec) -> Result<Self, ParseError> {
                    let build = |source: String| {
                        ::regex::RegexBuilder::new(&source)
                            .case_insensitive(spec.ignore_case)
                            .multi_line(spec.multiline)
                            .build()
                            .map_err(|e| ParseError::Pattern {
                                pattern: spec.source,
                                message: e.to_string(),
                            })
                    };
                    Ok(Terminal {
                        at_start: build(format!(r"\A(?:{})", spec.source))?,
                        after_char: build(format!(r"\A(?s:.)(?:{})", spec.source))?,
                    })
                }

                fn match_at(&self, text: &str, start: usize) -> Option<usize> {
                    match text[..start].chars().next_back() {
                        None => self.at_start.find(text).map(|m| m.end()),
                        Some(prev) => {
                            let from = start - prev.len_utf8();
                            self.after_char.find(&text[from..]).map(|m| from + m.end())
                        }
                    }
                }
            }

            #[derive(Debug, Clone, Copy)]
            struct Attempt {
                rule: &'static str,
                pattern: &'static str,
                matched: bool,
                index: usize,
            }

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

            pub struct Engine<'s> {
                text: &'s str,
                path: String,
                pos: usize,
                specs: &'static [PatternSpec],
                terminals: Vec<Terminal>,
                lines: LineIndex,
                successes: std::collections::VecDeque<Attempt>,
                furthest_success: Option<usize>,
                failures: Vec<Attempt>,
            }

            impl<'s> Engine<'s> {
                pub fn new(
                    text: &'s str,
                    path: &str,
                    specs: &'static [PatternSpec],
                ) -> Result<Self, ParseError> {
                    let terminals = specs
                        .iter()
                        .map(Terminal::new)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Self {
                        text,
                        path: path.to_string(),
                        pos: 0,
                        specs,
                        terminals,
                        lines: LineIndex::new(text),
                        successes: std::collections::VecDeque::with_capacity(SUCCESS_TRAIL_LEN),
                        furthest_success: None,
                        failures: Vec::new(),
                    })
                }

                pub fn position(&self) -> usize {
                    self.pos
                }

                pub fn is_at_end(&self) -> bool {
                    self.pos >= self.text.len()
                }

                pub fn location(&self, index: usize) -> String {
                    let (line, col) = self.lines.line_col(index);
                    if self.path.is_empty() {
                        format!("{}:{}", line, col)
                    } else {
                        format!("{}:{}:{}", self.path, line, col)
                    }
                }

                pub fn token(&mut self, id: usize, rule: &'static str) -> PResult<&'s str> {
                    let spec = self.specs[id];
                    let start = if spec.skip_space {
                        self.text[self.pos..]
                            .char_indices()
                            .find(|(_, c)| !c.is_whitespace())
                            .map_or(self.text.len(), |(offset, _)| self.pos + offset)
                    } else {
                        self.pos
                    };
                    match self.terminals[id].match_at(self.text, start) {
                        Some(end) => {
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

                pub fn attempt<T>(
                    &mut self,
                    f: impl FnOnce(&mut Self) -> PResult<Step<T>>,
                ) -> Outcome<T> {
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
                                return if items.len() < min { Err(Mismatch) } else { Ok(items) };
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

                pub fn fail(&mut self, _rule: &'static str) -> Mismatch {
                    Mismatch
                }

                pub fn logs(&self) -> Vec<LogEntry> {
                    self.successes
                        .iter()
                        .chain(self.failures.iter())
                        .map(|attempt| self.log_entry(attempt))
                        .collect()
                }

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
                            let index = self
                                .failures
                                .iter()
                                .map(|failure| failure.index)
                                .chain(self.furthest_success)
                                .max()
                                .unwrap_or(self.pos);
                            let expected = self.expected_at(index);
                            let message = if expected.is_empty() {
                                "no rule matched".to_string()
                            } else {
                                format!("expected {}", expected.join(" or "))
                            };
                            Err(SyntaxError {
                                index,
                                location: self.location(index),
                                message,
                                expected,
                                logs,
                            })
                        }
                    }
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

                fn record_success(&mut self, attempt: Attempt) {
                    if self.successes.len() == SUCCESS_TRAIL_LEN {
                        self.successes.pop_front();
                    }
                    self.furthest_success = self.furthest_success.max(Some(attempt.index));
                    self.successes.push_back(attempt);
                }

                fn log_entry(&self, attempt: &Attempt) -> LogEntry {
                    LogEntry {
                        rule: attempt.rule,
                        pattern: attempt.pattern,
                        matched: attempt.matched,
                        index: attempt.index,
                        location: self.location(attempt.index),
                        snippet: snippet(self.text, attempt.index),
                    }
                }
            }
        }
    }
}
