//! Reference validation over the grammar AST.
//!
//! Every check runs to completion and all findings are collected in one [`Report`].
//! Only a grammar without errors can be turned into a [`ValidatedGrammar`], which is
//! what the code generator accepts.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, MessageType, Report, Severity};
use crate::engine::compile;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// How a reference is traversed by the generated parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    /// Always taken (no quantifier, `+`, or a brace with a non-zero minimum).
    Hard,
    /// Guarded by backtracking (`?`, `*`, zero-minimum braces, alternatives, lookaheads).
    Soft,
}

/// All rule names referenced by `expr`, in order of appearance.
pub fn references(expr: &RuleExpr) -> Vec<(&str, Strength)> {
    fn strength(quantifier: Option<&Quantifier>) -> Strength {
        if Quantifier::is_mandatory(quantifier) {
            Strength::Hard
        } else {
            Strength::Soft
        }
    }

    fn terms<'a>(out: &mut Vec<(&'a str, Strength)>, terms: &'a [RuleTerm]) {
        for term in terms {
            match term {
                RuleTerm::Negative(NameOrRegex::Name(name)) => out.push((name.as_str(), Strength::Soft)),
                RuleTerm::Named { name, quantifier } => {
                    out.push((name.as_str(), strength(quantifier.as_ref())))
                }
                RuleTerm::Negative(NameOrRegex::Regex(_)) | RuleTerm::Regex(_) => {}
            }
        }
    }

    let mut out = Vec::new();
    match expr {
        RuleExpr::Negation { target, terms: rest } => {
            if let NameOrRegex::Name(name) = target {
                out.push((name.as_str(), Strength::Soft));
            }
            terms(&mut out, rest);
        }
        RuleExpr::Regex { terms: rest, .. } => terms(&mut out, rest),
        RuleExpr::Name { name, rest } => match rest {
            NameRest::Alternation(alternatives) => {
                out.push((name.as_str(), Strength::Soft));
                out.extend(alternatives.iter().map(|alt| (alt.as_str(), Strength::Soft)));
            }
            NameRest::Joined { optional, join } => {
                let item = if *optional { Strength::Soft } else { Strength::Hard };
                out.push((name.as_str(), item));
                if let NameOrRegex::Name(join) = join {
                    out.push((join.as_str(), Strength::Soft));
                }
            }
            NameRest::Sequence {
                quantifier,
                terms: rest,
            } => {
                out.push((name.as_str(), strength(quantifier.as_ref())));
                terms(&mut out, rest);
            }
        },
    }
    out
}

/// All regex literals used by `expr`.
pub fn regex_literals(expr: &RuleExpr) -> Vec<&RegexLiteral> {
    fn from_terms<'a>(out: &mut Vec<&'a RegexLiteral>, terms: &'a [RuleTerm]) {
        for term in terms {
            match term {
                RuleTerm::Negative(NameOrRegex::Regex(regex)) | RuleTerm::Regex(regex) => {
                    out.push(regex)
                }
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    match expr {
        RuleExpr::Negation { target, terms } => {
            if let NameOrRegex::Regex(regex) = target {
                out.push(regex);
            }
            from_terms(&mut out, terms);
        }
        RuleExpr::Regex { regex, terms } => {
            out.push(regex);
            from_terms(&mut out, terms);
        }
        RuleExpr::Name { rest, .. } => match rest {
            NameRest::Joined {
                join: NameOrRegex::Regex(regex),
                ..
            } => out.push(regex),
            NameRest::Sequence { terms, .. } => from_terms(&mut out, terms),
            _ => {}
        },
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleEdges {
    pub hard: Vec<String>,
    pub soft: Vec<String>,
    /// Union of both, first occurrence order.
    pub all: Vec<String>,
}

/// Soft and hard reference edges per declared rule.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    order: Vec<String>,
    edges: HashMap<String, RuleEdges>,
}

impl ReferenceGraph {
    /// Builds the graph from the first declaration of every rule name.
    pub fn build(grammar: &Grammar) -> Self {
        let mut graph = Self::default();
        for rule in grammar.rules() {
            if graph.edges.contains_key(&rule.name) {
                continue;
            }
            let mut edges = RuleEdges::default();
            for (target, strength) in references(&rule.expr) {
                let list = match strength {
                    Strength::Hard => &mut edges.hard,
                    Strength::Soft => &mut edges.soft,
                };
                if !list.iter().any(|t| t == target) {
                    list.push(target.to_string());
                }
                if !edges.all.iter().any(|t| t == target) {
                    edges.all.push(target.to_string());
                }
            }
            graph.order.push(rule.name.clone());
            graph.edges.insert(rule.name.clone(), edges);
        }
        graph
    }

    pub fn rules(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn edges(&self, name: &str) -> Option<&RuleEdges> {
        self.edges.get(name)
    }

    fn hard(&self, name: &str) -> &[String] {
        self.edges
            .get(name)
            .map(|e| e.hard.as_slice())
            .unwrap_or_default()
    }

    /// Pairs `(from, to)` whose target is not declared.
    pub fn unresolved(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .flat_map(|from| {
                self.edges[from]
                    .all
                    .iter()
                    .filter(|to| !self.contains(to))
                    .map(move |to| (from.as_str(), to.as_str()))
            })
            .collect()
    }

    /// Rules reachable from the first rule over hard and soft edges.
    pub fn reachable(&self) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.order.first().map(String::as_str).into_iter().collect();
        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(edges) = self.edges.get(name) {
                stack.extend(edges.all.iter().rev().map(String::as_str));
            }
        }
        seen
    }

    /// Every elementary cycle made of hard edges, each as a closed path (`a, b, a`).
    ///
    /// A cycle is reported once, starting from its earliest declared rule. The walk from a
    /// rule only enters rules declared after it, so rotations of the same loop never repeat.
    pub fn hard_cycles(&self) -> Vec<Vec<&str>> {
        let rank: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mut cycles = Vec::new();

        for (first, start) in self.order.iter().enumerate() {
            let start = start.as_str();
            let mut on_path: HashSet<&str> = HashSet::from([start]);
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(target) = self.hard(node).get(next) else {
                    on_path.remove(node);
                    stack.pop();
                    continue;
                };
                frame.1 += 1;
                let target = target.as_str();
                if target == start {
                    let cycle = stack
                        .iter()
                        .map(|(n, _)| *n)
                        .chain(std::iter::once(start))
                        .collect();
                    cycles.push(cycle);
                } else if rank.get(target).is_some_and(|&r| r > first) && on_path.insert(target) {
                    stack.push((target, 0));
                }
            }
        }
        cycles
    }
}

/// A grammar with no blocking findings.
#[derive(Debug, Clone)]
pub struct ValidatedGrammar {
    grammar: Grammar,
    warnings: Vec<Diagnostic>,
}

impl ValidatedGrammar {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn into_grammar(self) -> Grammar {
        self.grammar
    }
}

/// Runs [`validate`] and keeps the grammar only if nothing blocks generation.
pub fn check(grammar: Grammar, path: &str) -> Result<ValidatedGrammar, Report> {
    let report = validate(&grammar, path);
    if report.is_blocking() {
        Err(report)
    } else {
        Ok(ValidatedGrammar {
            grammar,
            warnings: report.warnings,
        })
    }
}

fn span_location(path: &str, span: Span) -> String {
    if path.is_empty() {
        format!("{}:{}", span.line, span.column)
    } else {
        format!("{path}:{}:{}", span.line, span.column)
    }
}

#[instrument(skip(grammar))]
pub fn validate(grammar: &Grammar, path: &str) -> Report {
    let mut report = Report::default();
    let graph = ReferenceGraph::build(grammar);
    let spans: HashMap<&str, Span> = grammar
        .rules()
        .rev()
        .map(|rule| (rule.name.as_str(), rule.span))
        .collect();
    let at = |name: &str| span_location(path, spans.get(name).copied().unwrap_or_default());

    let mut declared: HashSet<&str> = HashSet::new();
    let mut bodies: HashMap<String, &str> = HashMap::new();
    for (policy, rule) in grammar.rules_with_policy() {
        let here = span_location(path, rule.span);
        if !declared.insert(rule.name.as_str()) {
            report.push(Diagnostic::new(
                Severity::Error,
                MessageType::ReferenceError,
                here.clone(),
                format!("duplicate rule name: {}", rule.name),
                rule.name.clone(),
            ));
            // The graph only holds first declarations; check this body's targets here.
            for to in references(&rule.expr)
                .into_iter()
                .map(|(to, _)| to)
                .unique()
                .filter(|to| !graph.contains(to))
            {
                let pair = format!("{} -> {to}", rule.name);
                report.push(Diagnostic::new(
                    Severity::Error,
                    MessageType::ReferenceError,
                    here.clone(),
                    format!("invalid reference: {pair}"),
                    pair,
                ));
            }
        }

        let body = format!("{policy}:{}", rule.expr);
        match bodies.get(&body) {
            Some(first) => report.push(Diagnostic::new(
                Severity::Info,
                MessageType::ReferenceWarning,
                here.clone(),
                format!("duplicate rule body: {} repeats {first}", rule.name),
                rule.expr.to_string(),
            )),
            None => {
                bodies.insert(body, rule.name.as_str());
            }
        }

        for regex in regex_literals(&rule.expr) {
            if let Err(e) = compile(&regex.pattern(), regex.flags.ignore_case, regex.flags.multiline) {
                report.push(Diagnostic::new(
                    Severity::Error,
                    MessageType::RegexError,
                    here.clone(),
                    format!("invalid regex: {e}"),
                    regex.to_string(),
                ));
            }
        }
    }

    for (from, to) in graph.unresolved() {
        let pair = format!("{from} -> {to}");
        report.push(Diagnostic::new(
            Severity::Error,
            MessageType::ReferenceError,
            at(from),
            format!("invalid reference: {pair}"),
            pair,
        ));
    }

    let reachable = graph.reachable();
    for name in graph.rules().iter().filter(|n| !reachable.contains(n.as_str())) {
        report.push(Diagnostic::new(
            Severity::Warning,
            MessageType::ReferenceWarning,
            at(name),
            format!("unused rule: {name}"),
            name.clone(),
        ));
    }

    for cycle in graph.hard_cycles() {
        let path_text = cycle.iter().join(" -> ");
        report.push(Diagnostic::new(
            Severity::Error,
            MessageType::ReferenceError,
            at(cycle[0]),
            format!("circular reference: {path_text}"),
            path_text,
        ));
    }

    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validation done"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn report(text: &str) -> Report {
        let grammar = parse(text).unwrap_or_else(|e| panic!("grammar failed to parse: {e}"));
        validate(&grammar, "g.bnf")
    }

    fn matched(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.matched_pattern.as_str()).collect()
    }

    #[test]
    fn circular_hard_reference() {
        let report = report("a: b\nb: a\n");
        assert_eq!(matched(&report.errors), vec!["a -> b -> a"]);
        assert!(report.errors[0].message.starts_with("circular reference"));
        assert_eq!(report.errors[0].location, "g.bnf:1:1");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let report = report("a: a\n");
        assert_eq!(matched(&report.errors), vec!["a -> a"]);
    }

    #[test]
    fn soft_cycles_are_allowed() {
        let report = report("a: b?\nb: /x/ a*\n");
        assert!(report.errors.is_empty(), "{}", report);
    }

    #[test]
    fn alternation_members_are_soft() {
        let report = report("expr: group | atom\ngroup: /\\(/ expr /\\)/\natom: /x/\n");
        assert!(report.errors.is_empty(), "{}", report);
    }

    #[test]
    fn cycle_reported_once() {
        let report = report("a: b\nb: c\nc: a\nd: c\n");
        let cycles: Vec<_> = report
            .errors
            .iter()
            .filter(|d| d.message.starts_with("circular"))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].matched_pattern, "a -> b -> c -> a");
    }

    #[test]
    fn every_distinct_cycle_is_reported() {
        let report = report("a: b c\nb: a\nc: b\n");
        assert_eq!(matched(&report.errors), vec!["a -> b -> a", "a -> c -> b -> a"]);
    }

    #[test]
    fn shared_rule_closes_two_loops() {
        let report = report("a: b\nb: a c\nc: b\n");
        assert_eq!(matched(&report.errors), vec!["a -> b -> a", "b -> c -> b"]);
        assert_eq!(report.errors[1].location, "g.bnf:2:1");
    }

    #[test]
    fn duplicate_declaration_references_are_checked() {
        let report = report("a: b\nb: /x/\nb: missing\n");
        assert_eq!(matched(&report.errors), vec!["b", "b -> missing"]);
        assert_eq!(report.errors[1].location, "g.bnf:3:1");
        assert!(report.errors[1].message.starts_with("invalid reference"));
    }

    #[test]
    fn diagnostics_for_a_name_point_at_its_first_declaration() {
        let report = report("start: /x/\nbar: /y/\nbar: /z/\n");
        assert_eq!(matched(&report.errors), vec!["bar"]);
        assert_eq!(report.errors[0].location, "g.bnf:3:1");
        assert_eq!(matched(&report.warnings), vec!["bar"]);
        assert_eq!(report.warnings[0].location, "g.bnf:2:1");
    }

    #[test]
    fn unused_rule_is_a_warning() {
        let report = report("start: /x/\nbar: /y/\n");
        assert!(report.errors.is_empty());
        assert_eq!(matched(&report.warnings), vec!["bar"]);
        assert_eq!(report.warnings[0].location, "g.bnf:2:1");
    }

    #[test]
    fn invalid_reference() {
        let report = report("start: missing\n");
        assert_eq!(matched(&report.errors), vec!["start -> missing"]);
        assert_eq!(report.errors[0].message_type, MessageType::ReferenceError);
    }

    #[test]
    fn duplicate_name_and_body() {
        let report = report("a: b c\nb: /x/\nc: /x/\nb: /y/\n");
        assert_eq!(matched(&report.errors), vec!["b"]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].severity, Severity::Info);
        assert!(report.warnings[0].message.contains("c repeats b"));
    }

    #[test]
    fn same_body_under_different_policy_is_not_a_duplicate() {
        let report = report("a: b c\nb: /x/\n\"strict\"\nc: /x/\n");
        assert!(report.warnings.is_empty(), "{}", report);
    }

    #[test]
    fn invalid_regex() {
        let report = report("a: /[a-/\n");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message_type, MessageType::RegexError);
    }

    #[test]
    fn findings_accumulate() {
        let report = report("a: b missing\nb: a\nunused: /x/\n");
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn validation_is_pure() {
        let grammar = parse("a: b?\nb: c\nc: b\nd: /x/\n").unwrap();
        assert_eq!(validate(&grammar, "g"), validate(&grammar, "g"));
    }

    #[test]
    fn check_gates_on_errors() {
        assert!(check(parse("a: b\n").unwrap(), "").is_err());
        let valid = check(parse("a: /x/\nb: /y/\n").unwrap(), "").unwrap();
        assert_eq!(valid.warnings().len(), 1);
        assert_eq!(valid.grammar().rules().count(), 2);
    }

    #[test]
    fn reference_strengths() {
        let grammar = parse("r: x y? z* w+ v{0,2} u{1} !t\n").unwrap();
        let refs = references(&grammar.root().unwrap().expr);
        assert_eq!(
            refs,
            vec![
                ("x", Strength::Hard),
                ("y", Strength::Soft),
                ("z", Strength::Soft),
                ("w", Strength::Hard),
                ("v", Strength::Soft),
                ("u", Strength::Hard),
                ("t", Strength::Soft),
            ]
        );
    }
}
