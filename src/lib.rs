//! # benfy
//!
//! A parser generator for a small EBNF-like grammar DSL.
//!
//! ```text
//! "loose"
//! list: item >> /,/
//! item: /[a-z]+/
//! ```
//!
//! A grammar is checked, parsed, validated and turned into a standalone
//! recursive-descent parser, either at compile time with [`grammar!`] /
//! [`include_grammar!`], or at run time with [`Generator`], which returns the parser as
//! Rust source text.

use benfy_model::ast::{Grammar, Line, Span};
use benfy_model::{lint, validator, Diagnostic, GrammarParser, Report};
use proc_macro2::TokenStream;
use std::path::Path;
use tracing::{debug, instrument};

mod error;
mod options;
mod resolver;
pub mod testing;

pub use benfy_codegen as codegen;
pub use benfy_macros::{grammar, include_grammar};
pub use benfy_model as model;
pub use error::Error;
pub use options::Options;

/// Result of a successful [`Generator::compile`].
#[derive(Debug, Clone)]
pub struct Compiled {
    pub grammar: Grammar,
    /// Non-blocking findings of the text checks and the validator.
    pub warnings: Vec<Diagnostic>,
    pub tokens: TokenStream,
    /// `tokens` as source text with a header line.
    pub source: String,
}

pub struct Generator {
    options: Options,
    resolver: resolver::GrammarResolver,
}

impl Generator {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            options: Options::default(),
            resolver: resolver::GrammarResolver::new(base_dir),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Runs the whole pipeline on `text`, labelled with [`Options::label`].
    pub fn compile(&self, text: &str) -> Result<Compiled, Error> {
        self.compile_labeled(text, &self.options.label)
    }

    /// Reads `file` relative to the base directory and compiles it, labelled with its name.
    pub fn compile_file(&self, file: &str) -> Result<Compiled, Error> {
        let text = self.resolver.read(file)?;
        self.compile_labeled(&text, file)
    }

    /// Parses and validates without generating; validation errors are returned in the report
    /// instead of failing.
    pub fn analyze(&self, text: &str) -> Result<(Grammar, Report), Error> {
        let label = self.options.label.as_str();
        let mut report = Report::default();
        report.extend(self.check_text(text, label)?);
        let grammar = self.parser(label).parse(text)?;
        let validation = validator::validate(&grammar, label);
        report.extend(validation.errors);
        report.extend(validation.warnings);
        Ok((grammar, report))
    }

    /// Pretty debug dump of `grammar`.
    pub fn debug_tree(&self, grammar: &Grammar) -> String {
        if !self.options.strip_locations_in_debug_output {
            return format!("{grammar:#?}");
        }
        let mut stripped = grammar.clone();
        for line in &mut stripped.lines {
            if let Line::Rule(rule) = line {
                rule.span = Span::default();
            }
        }
        format!("{stripped:#?}")
    }

    #[instrument(skip(self, text))]
    fn compile_labeled(&self, text: &str, label: &str) -> Result<Compiled, Error> {
        let mut warnings = self.check_text(text, label)?;
        let grammar = self.parser(label).parse(text)?;
        let validated = validator::check(grammar, label).map_err(Error::Validation)?;
        warnings.extend(validated.warnings().iter().cloned());

        let tokens = benfy_codegen::generate(&validated)?;
        let source = benfy_codegen::to_source(&tokens, label);
        debug!(warnings = warnings.len(), bytes = source.len(), "parser generated");
        Ok(Compiled {
            grammar: validated.into_grammar(),
            warnings,
            tokens,
            source,
        })
    }

    /// Non-blocking text findings, or [`Error::Lint`] if any finding blocks.
    fn check_text(&self, text: &str, label: &str) -> Result<Vec<Diagnostic>, Error> {
        let findings = lint::check_text(text, label);
        if lint::blocking(&findings).next().is_some() {
            return Err(Error::Lint(findings));
        }
        Ok(findings)
    }

    fn parser(&self, label: &str) -> GrammarParser {
        GrammarParser::new(label).with_locations(self.options.include_source_locations)
    }
}

// --- UNIT TESTS ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Testable;

    fn generator() -> Generator {
        Generator::new(".").with_options(Options::new().with_label("unit.bnf"))
    }

    #[test]
    fn compile_produces_source_and_tokens() {
        let compiled = generator()
            .compile("start: /x/\nbar: /y/\n")
            .test()
            .assert_success();
        assert!(compiled.source.starts_with("// Generated by benfy from unit.bnf"));
        assert!(!compiled.tokens.is_empty());
        assert_eq!(compiled.warnings.len(), 1);
        assert_eq!(compiled.warnings[0].matched_pattern, "bar");
    }

    #[test]
    fn lint_errors_block_before_parsing() {
        let err = generator().compile("Start: /x/\n").test().assert_failure();
        assert!(matches!(err, Error::Lint(_)));
        assert!(err.diagnostics().iter().any(|d| d.message == "uppercase"));
    }

    #[test]
    fn validation_errors_block_generation() {
        let err = generator()
            .compile("a: b\nb: a\n")
            .test()
            .assert_failure_contains("reference error");
        assert_eq!(err.diagnostics()[0].matched_pattern, "a -> b -> a");
    }

    #[test]
    fn analyze_reports_without_failing() {
        let (grammar, report) = generator().analyze("start: missing\n").unwrap();
        assert_eq!(grammar.rules().count(), 1);
        assert_eq!(report.errors[0].matched_pattern, "start -> missing");
    }

    #[test]
    fn debug_tree_can_strip_locations() {
        let grammar = generator().analyze("# intro\na: /x/\n").unwrap().0;
        let kept = generator().debug_tree(&grammar);
        assert!(kept.contains("line: 2"));
        let stripped = Generator::new(".")
            .with_options(Options::new().with_stripped_locations(true))
            .debug_tree(&grammar);
        assert!(stripped.contains("line: 0"));
        assert!(!stripped.contains("line: 2"));
    }
}
