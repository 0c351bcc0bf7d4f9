//! The grammar DSL parser.
//!
//! It is built from the same [`Engine`] and combinators that generated parsers use,
//! and follows the shape the code generator emits: one function per DSL rule, ordered
//! choice via [`Engine::optional`], repetition via [`Engine::many`].

use crate::ast::*;
use crate::engine::{Engine, LogEntry, Mismatch, PResult, ParseError, PatternSpec, SyntaxError};
use tracing::{debug, instrument};

const SPACING_POLICY: usize = 0;
const LINE_END: usize = 1;
const RULE_NAME: usize = 2;
const COLON: usize = 3;
const BANG: usize = 4;
const OR: usize = 5;
const QUESTION: usize = 6;
const JOIN: usize = 7;
const SPACE: usize = 8;
const REGEX_BODY: usize = 9;
const REGEX_FLAGS: usize = 10;
const BASIC_QUANTIFIER: usize = 11;
const BRACE_OPEN: usize = 12;
const DIGITS: usize = 13;
const COMMA: usize = 14;
const BRACE_CLOSE: usize = 15;
const INLINE_BLOCK_COMMENT: usize = 16;
const INLINE_LINE_COMMENT: usize = 17;
const BLOCK_COMMENT: usize = 18;
const LINE_COMMENT: usize = 19;
const NEW_LINE: usize = 20;

static PATTERNS: &[PatternSpec] = &[
    PatternSpec::strict(r#""strict"|"loose""#),
    PatternSpec::strict(r"\r?\n|\z"),
    PatternSpec::strict(r"[a-z][a-z_]*"),
    PatternSpec::strict(": "),
    PatternSpec::strict("!"),
    PatternSpec::strict(r" \| "),
    PatternSpec::strict(r"\?"),
    PatternSpec::strict(" >> "),
    PatternSpec::strict(" "),
    PatternSpec::strict(r"/(?:\\/|[^/\n])*/"),
    PatternSpec::strict("[slim]*"),
    PatternSpec::strict(r"[+*?]"),
    PatternSpec::strict(r"\{"),
    PatternSpec::strict("[0-9]+"),
    PatternSpec::strict(","),
    PatternSpec::strict(r"\}"),
    PatternSpec::strict(" ##(?:[^#]|#[^#])*##"),
    PatternSpec::strict(" #.*"),
    PatternSpec::strict("##(?:[^#]|#[^#])*##"),
    PatternSpec::strict(r"#.*(?:\r?\n|\z)"),
    PatternSpec::strict(r"\r?\n"),
];

/// Parses grammar text labelled with `path` for diagnostics.
///
/// One parser value may be reused; every call starts from fresh engine state and
/// the log trail of the last call is kept for inspection.
#[derive(Debug, Default)]
pub struct GrammarParser {
    path: String,
    track_locations: bool,
    logs: Vec<LogEntry>,
}

impl GrammarParser {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            track_locations: true,
            logs: Vec::new(),
        }
    }

    pub fn with_locations(mut self, track: bool) -> Self {
        self.track_locations = track;
        self
    }

    /// Trail of the most recent [`GrammarParser::parse`] call.
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    #[instrument(skip_all, fields(path = %self.path))]
    pub fn parse(&mut self, text: &str) -> Result<Grammar, ParseError> {
        self.logs.clear();
        let mut engine = Engine::new(text, PATTERNS)?
            .with_path(self.path.clone())
            .with_locations(self.track_locations);
        let result = grammar(&mut engine);
        let location = engine.location(0);
        let outcome = engine.finish(result, |_| {});
        let parsed = match outcome {
            Ok(parsed) => parsed,
            Err(err) => {
                self.logs = err.logs.clone();
                return Err(err.into());
            }
        };
        self.logs = parsed.logs;
        let grammar = parsed.root;
        if grammar.root().is_none() {
            return Err(SyntaxError {
                index: 0,
                location,
                message: "grammar must have at least one rule".to_string(),
                expected: Vec::new(),
                logs: self.logs.clone(),
            }
            .into());
        }
        debug!(rules = grammar.rules().count(), "grammar parsed");
        Ok(grammar)
    }
}

/// Parses `text` with an empty diagnostic label.
pub fn parse(text: &str) -> Result<Grammar, ParseError> {
    GrammarParser::new("").parse(text)
}

fn grammar(e: &mut Engine<'_>) -> PResult<Grammar> {
    let lines = e.many(line, 0, None)?;
    Ok(Grammar { lines })
}

fn line(e: &mut Engine<'_>) -> PResult<Line> {
    if let Some(directive) = e.optional(spacing_directive) {
        return Ok(Line::Spacing(directive));
    }
    if let Some(rule) = e.optional(rule) {
        return Ok(Line::Rule(rule));
    }
    if let Some(text) = e.optional(|e| e.token(BLOCK_COMMENT, "multiline_comment")) {
        return Ok(Line::Comment(Comment {
            kind: CommentKind::Block,
            text: text.to_string(),
        }));
    }
    if let Some(text) = e.optional(|e| e.token(LINE_COMMENT, "singleline_comment")) {
        return Ok(Line::Comment(Comment {
            kind: CommentKind::Line,
            text: text.trim_end_matches(['\r', '\n']).to_string(),
        }));
    }
    if e.optional(|e| e.token(NEW_LINE, "new_line")).is_some() {
        return Ok(Line::Blank);
    }
    Err(e.fail("line"))
}

fn spacing_directive(e: &mut Engine<'_>) -> PResult<SpacingDirective> {
    let value = e.token(SPACING_POLICY, "spacing_policy")?;
    let comments = e.many(inline_comment, 0, None)?;
    e.token(LINE_END, "spacing_policy")?;
    let policy = if value == "\"strict\"" {
        SpacingPolicy::Strict
    } else {
        SpacingPolicy::Loose
    };
    Ok(SpacingDirective { policy, comments })
}

fn rule(e: &mut Engine<'_>) -> PResult<Rule> {
    let start = e.position();
    let name = rule_name(e)?;
    e.token(COLON, "rule")?;
    let expr = rule_expr(e)?;
    let comments = e.many(inline_comment, 0, None)?;
    e.token(LINE_END, "rule")?;
    let (line, column) = e.line_col(start);
    Ok(Rule {
        name,
        expr,
        comments,
        span: Span {
            index: start,
            line,
            column,
        },
    })
}

fn inline_comment(e: &mut Engine<'_>) -> PResult<Comment> {
    if let Some(text) = e.optional(|e| e.token(INLINE_BLOCK_COMMENT, "inline_comment")) {
        return Ok(Comment {
            kind: CommentKind::Block,
            text: text.trim_start().to_string(),
        });
    }
    let text = e.token(INLINE_LINE_COMMENT, "inline_comment")?;
    Ok(Comment {
        kind: CommentKind::Line,
        text: text.trim_start().trim_end_matches('\r').to_string(),
    })
}

fn rule_name(e: &mut Engine<'_>) -> PResult<String> {
    Ok(e.token(RULE_NAME, "rule_name")?.to_string())
}

fn rule_expr(e: &mut Engine<'_>) -> PResult<RuleExpr> {
    if let Some(expr) = e.optional(negation_first) {
        return Ok(expr);
    }
    if let Some(expr) = e.optional(regex_first) {
        return Ok(expr);
    }
    if let Some(expr) = e.optional(name_first) {
        return Ok(expr);
    }
    Err(e.fail("rule_expr"))
}

fn negation_first(e: &mut Engine<'_>) -> PResult<RuleExpr> {
    e.token(BANG, "rule_negation")?;
    let target = name_or_regex(e)?;
    let terms = trailing_terms(e)?;
    Ok(RuleExpr::Negation { target, terms })
}

fn regex_first(e: &mut Engine<'_>) -> PResult<RuleExpr> {
    let regex = regex_literal(e)?;
    let terms = trailing_terms(e)?;
    Ok(RuleExpr::Regex { regex, terms })
}

fn name_first(e: &mut Engine<'_>) -> PResult<RuleExpr> {
    let name = rule_name(e)?;
    let rest = if let Some(names) = e.optional(alternation) {
        NameRest::Alternation(names)
    } else if let Some(joined) = e.optional(joined) {
        joined
    } else if let Some(sequence) = e.optional(sequence) {
        sequence
    } else {
        return Err(e.fail("rule_name_rest"));
    };
    Ok(RuleExpr::Name { name, rest })
}

fn alternation(e: &mut Engine<'_>) -> PResult<Vec<String>> {
    e.many(
        |e| {
            e.token(OR, "rule_name_with_or")?;
            rule_name(e)
        },
        1,
        None,
    )
}

fn joined(e: &mut Engine<'_>) -> PResult<NameRest> {
    let optional = e.optional(|e| e.token(QUESTION, "rule_name_as_item")).is_some();
    e.token(JOIN, "rule_name_as_item")?;
    let join = name_or_regex(e)?;
    Ok(NameRest::Joined { optional, join })
}

fn sequence(e: &mut Engine<'_>) -> PResult<NameRest> {
    let quantifier = e.optional(quantifier);
    let terms = trailing_terms(e)?;
    Ok(NameRest::Sequence { quantifier, terms })
}

fn trailing_terms(e: &mut Engine<'_>) -> PResult<Vec<RuleTerm>> {
    e.many(
        |e| {
            e.token(SPACE, "rule_term")?;
            rule_term(e)
        },
        0,
        None,
    )
}

fn rule_term(e: &mut Engine<'_>) -> PResult<RuleTerm> {
    if let Some(target) = e.optional(|e| {
        e.token(BANG, "negative_term")?;
        name_or_regex(e)
    }) {
        return Ok(RuleTerm::Negative(target));
    }
    if let Some(term) = e.optional(|e| {
        let name = rule_name(e)?;
        let quantifier = e.optional(quantifier);
        Ok(RuleTerm::Named { name, quantifier })
    }) {
        return Ok(term);
    }
    if let Some(regex) = e.optional(regex_literal) {
        return Ok(RuleTerm::Regex(regex));
    }
    Err(e.fail("rule_term"))
}

fn name_or_regex(e: &mut Engine<'_>) -> PResult<NameOrRegex> {
    if let Some(name) = e.optional(rule_name) {
        return Ok(NameOrRegex::Name(name));
    }
    if let Some(regex) = e.optional(regex_literal) {
        return Ok(NameOrRegex::Regex(regex));
    }
    Err(e.fail("name_or_regex"))
}

fn regex_literal(e: &mut Engine<'_>) -> PResult<RegexLiteral> {
    let body = e.token(REGEX_BODY, "regex")?;
    let flags = e.token(REGEX_FLAGS, "regex_flags")?;
    Ok(RegexLiteral {
        source: body[1..body.len() - 1].to_string(),
        flags: RegexFlags::from_suffix(flags),
    })
}

fn quantifier(e: &mut Engine<'_>) -> PResult<Quantifier> {
    if let Some(symbol) = e.optional(|e| e.token(BASIC_QUANTIFIER, "quantifier")) {
        return Ok(match symbol {
            "?" => Quantifier::Optional,
            "*" => Quantifier::ZeroOrMore,
            _ => Quantifier::OneOrMore,
        });
    }
    e.token(BRACE_OPEN, "brace_quantifier")?;
    let min = number(e)?;
    let max = match e.optional(|e| e.token(COMMA, "brace_quantifier")) {
        None => BraceMax::Exact,
        Some(_) => match e.optional(number) {
            Some(max) => BraceMax::Bounded(max),
            None => BraceMax::Unbounded,
        },
    };
    e.token(BRACE_CLOSE, "brace_quantifier")?;
    Ok(Quantifier::Brace { min, max })
}

fn number(e: &mut Engine<'_>) -> PResult<usize> {
    e.token(DIGITS, "brace_quantifier")?
        .parse()
        .map_err(|_| Mismatch)
}
