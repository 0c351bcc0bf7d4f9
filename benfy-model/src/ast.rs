//! The grammar AST produced by the bootstrap parser.
//!
//! Every node renders back to DSL text through [`std::fmt::Display`]; the rendering is
//! canonical (comments dropped, single spaces) and is what duplicate bodies are compared on.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grammar {
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Spacing(SpacingDirective),
    Rule(Rule),
    Comment(Comment),
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpacingDirective {
    pub policy: SpacingPolicy,
    pub comments: Vec<Comment>,
}

/// Whether regex terminals skip leading whitespace unless told otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpacingPolicy {
    Strict,
    #[default]
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    /// Raw comment text including its `#` markers.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// Where a rule starts in the grammar text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub expr: RuleExpr,
    pub comments: Vec<Comment>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    /// `!target terms*`
    Negation {
        target: NameOrRegex,
        terms: Vec<RuleTerm>,
    },
    /// `/re/ terms*`
    Regex {
        regex: RegexLiteral,
        terms: Vec<RuleTerm>,
    },
    /// Anything that starts with a rule name.
    Name { name: String, rest: NameRest },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRest {
    /// ` | b | c`
    Alternation(Vec<String>),
    /// `?` ` >> ` join
    Joined { optional: bool, join: NameOrRegex },
    /// Optional quantifier on the leading name, then more terms.
    Sequence {
        quantifier: Option<Quantifier>,
        terms: Vec<RuleTerm>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOrRegex {
    Name(String),
    Regex(RegexLiteral),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTerm {
    Negative(NameOrRegex),
    Named {
        name: String,
        quantifier: Option<Quantifier>,
    },
    Regex(RegexLiteral),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Optional,
    ZeroOrMore,
    OneOrMore,
    Brace { min: usize, max: BraceMax },
}

/// Upper bound of a `{m}`, `{m,}` or `{m,n}` quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceMax {
    Exact,
    Unbounded,
    Bounded(usize),
}

impl Quantifier {
    /// Repetition bounds; `None` means no upper limit.
    pub fn bounds(&self) -> (usize, Option<usize>) {
        match *self {
            Quantifier::Optional => (0, Some(1)),
            Quantifier::ZeroOrMore => (0, None),
            Quantifier::OneOrMore => (1, None),
            Quantifier::Brace { min, max } => match max {
                BraceMax::Exact => (min, Some(min)),
                BraceMax::Unbounded => (min, None),
                BraceMax::Bounded(max) => (min, Some(max)),
            },
        }
    }

    /// A quantifier that requires at least one occurrence.
    pub fn is_mandatory(quantifier: Option<&Quantifier>) -> bool {
        quantifier.map_or(true, |q| q.bounds().0 > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexFlags {
    pub strict: bool,
    pub loose: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

impl RegexFlags {
    /// Parses a flag suffix such as `"li"`.
    pub fn from_suffix(suffix: &str) -> Self {
        Self {
            strict: suffix.contains('s'),
            loose: suffix.contains('l'),
            ignore_case: suffix.contains('i'),
            multiline: suffix.contains('m'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexLiteral {
    /// Text between the slashes, exactly as written.
    pub source: String,
    pub flags: RegexFlags,
}

impl RegexLiteral {
    /// The pattern handed to the regex compiler (`\/` unescaped to `/`).
    pub fn pattern(&self) -> String {
        self.source.replace("\\/", "/")
    }

    /// A strict policy skips only for `l`; a loose policy skips unless `s`.
    pub fn skip_space(&self, policy: SpacingPolicy) -> bool {
        match policy {
            SpacingPolicy::Loose => !self.flags.strict,
            SpacingPolicy::Strict => self.flags.loose,
        }
    }
}

impl Grammar {
    pub fn rules(&self) -> impl DoubleEndedIterator<Item = &Rule> {
        self.lines.iter().filter_map(|line| match line {
            Line::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// The first declared rule; every document is parsed from it.
    pub fn root(&self) -> Option<&Rule> {
        self.rules().next()
    }

    /// Each rule paired with the spacing policy in effect at its declaration.
    pub fn rules_with_policy(&self) -> Vec<(SpacingPolicy, &Rule)> {
        let mut policy = SpacingPolicy::default();
        let mut out = Vec::new();
        for line in &self.lines {
            match line {
                Line::Spacing(directive) => policy = directive.policy,
                Line::Rule(rule) => out.push((policy, rule)),
                Line::Comment(_) | Line::Blank => {}
            }
        }
        out
    }
}

impl fmt::Display for SpacingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpacingPolicy::Strict => f.write_str("\"strict\""),
            SpacingPolicy::Loose => f.write_str("\"loose\""),
        }
    }
}

impl fmt::Display for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)?;
        for (set, flag) in [
            (self.flags.strict, 's'),
            (self.flags.loose, 'l'),
            (self.flags.ignore_case, 'i'),
            (self.flags.multiline, 'm'),
        ] {
            if set {
                write!(f, "{flag}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Optional => f.write_str("?"),
            Quantifier::ZeroOrMore => f.write_str("*"),
            Quantifier::OneOrMore => f.write_str("+"),
            Quantifier::Brace { min, max } => match max {
                BraceMax::Exact => write!(f, "{{{min}}}"),
                BraceMax::Unbounded => write!(f, "{{{min},}}"),
                BraceMax::Bounded(max) => write!(f, "{{{min},{max}}}"),
            },
        }
    }
}

impl fmt::Display for NameOrRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrRegex::Name(name) => f.write_str(name),
            NameOrRegex::Regex(regex) => regex.fmt(f),
        }
    }
}

impl fmt::Display for RuleTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTerm::Negative(target) => write!(f, "!{target}"),
            RuleTerm::Named { name, quantifier } => {
                f.write_str(name)?;
                if let Some(q) = quantifier {
                    q.fmt(f)?;
                }
                Ok(())
            }
            RuleTerm::Regex(regex) => regex.fmt(f),
        }
    }
}

fn write_terms(f: &mut fmt::Formatter<'_>, terms: &[RuleTerm]) -> fmt::Result {
    for term in terms {
        write!(f, " {term}")?;
    }
    Ok(())
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleExpr::Negation { target, terms } => {
                write!(f, "!{target}")?;
                write_terms(f, terms)
            }
            RuleExpr::Regex { regex, terms } => {
                regex.fmt(f)?;
                write_terms(f, terms)
            }
            RuleExpr::Name { name, rest } => {
                f.write_str(name)?;
                match rest {
                    NameRest::Alternation(names) => {
                        for alt in names {
                            write!(f, " | {alt}")?;
                        }
                        Ok(())
                    }
                    NameRest::Joined { optional, join } => {
                        if *optional {
                            f.write_str("?")?;
                        }
                        write!(f, " >> {join}")
                    }
                    NameRest::Sequence { quantifier, terms } => {
                        if let Some(q) = quantifier {
                            q.fmt(f)?;
                        }
                        write_terms(f, terms)
                    }
                }
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.expr)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Spacing(directive) => writeln!(f, "{}", directive.policy)?,
                Line::Rule(rule) => writeln!(f, "{rule}")?,
                Line::Comment(_) | Line::Blank => {}
            }
        }
        Ok(())
    }
}
