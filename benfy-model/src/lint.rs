//! Checks on the raw grammar text that run before the bootstrap parser.
//!
//! These catch mistakes the parser would only report as an unhelpful mismatch
//! (uppercase names, doubled spaces, quantified regex literals, ...).

use crate::diagnostic::{Diagnostic, MessageType, Severity};
use crate::engine::{compile, location};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

static HAS_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[a-z][a-z_]*:").unwrap());
static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").unwrap());
static MULTIPLE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").unwrap());
static SPACE_IN_RULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[a-z][a-z_]* [a-z_]*:").unwrap());
static REGEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(?:\\/|[^/\n])*/").unwrap());
static REGEX_WITH_QUANTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:\\/|[^/\n])*/[slim]*[+*?]").unwrap());
static OR_WITH_QUANTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z][a-z_]*(?:[+*?]|\{[0-9,]*\}) \| [a-z][a-z_]*|[a-z][a-z_]* \| [a-z][a-z_]*(?:[+*?]|\{[0-9,]*\})").unwrap()
});
static ITEM_WITH_QUANTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z][a-z_]*(?:[+*]|\{[0-9,]*\}) >> ").unwrap());
static JOIN_WITH_QUANTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">> (?:[a-z][a-z_]*|/(?:\\/|[^/\n])*/[slim]*)(?:[+*?]|\{[0-9,]*\})").unwrap());
static SUCCESSIVE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:\\/|[^/\n])*/[slim]* /(?:\\/|[^/\n])*/").unwrap());

/// Scans `text` and returns every finding, in check order.
#[instrument(skip(text))]
pub fn check_text(text: &str, path: &str) -> Vec<Diagnostic> {
    let mut findings = Vec::new();
    let at = |index: usize| location(path, text, index);
    let error = |message: &str, index: usize, matched: &str| {
        Diagnostic::new(Severity::Error, MessageType::SyntaxError, at(index), message, matched)
    };

    if !HAS_RULE.is_match(text) {
        findings.push(error("grammar must have at least one rule", 0, ""));
    }

    let simple_checks: [(&Lazy<Regex>, &str); 7] = [
        (&UPPERCASE, "uppercase"),
        (&MULTIPLE_SPACES, "multiple spaces"),
        (&SPACE_IN_RULE_NAME, "space in rule name"),
        (&REGEX_WITH_QUANTIFIER, "regex with quantifier"),
        (&OR_WITH_QUANTIFIER, "or rule with quantifier"),
        (
            &ITEM_WITH_QUANTIFIER,
            "item of array rule with quantifier different from '?'",
        ),
        (&JOIN_WITH_QUANTIFIER, "join of array rule with quantifier"),
    ];
    for (pattern, message) in simple_checks {
        for m in pattern.find_iter(text) {
            findings.push(error(message, m.start(), m.as_str()));
        }
    }

    for m in REGEX_LITERAL.find_iter(text) {
        let literal = m.as_str();
        let body = literal[1..literal.len() - 1].replace("\\/", "/");
        if let Err(e) = compile(&body, false, false) {
            findings.push(error(&format!("invalid regex: {e}"), m.start(), literal));
        }
    }

    for m in SUCCESSIVE_REGEX.find_iter(text) {
        findings.push(Diagnostic::new(
            Severity::Info,
            MessageType::SyntaxInfo,
            at(m.start()),
            "successive regex",
            m.as_str(),
        ));
    }

    debug!(findings = findings.len(), "text checks done");
    findings
}

/// Only the findings that prevent the grammar from being parsed.
pub fn blocking(findings: &[Diagnostic]) -> impl Iterator<Item = &Diagnostic> {
    findings.iter().filter(|d| d.is_error())
}
