//! Intermediate representation of a generated parser.
//!
//! Lowering decides *what* to emit: one node declaration per rule (two for the
//! `item >> join` sugar), a de-duplicated pattern table, and the parse steps of each
//! node. Rendering to Rust tokens lives in [`crate::render`].

use crate::CodegenError;
use benfy_model::ast::*;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// A terminal with the spacing policy already applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Pattern as handed to the regex compiler.
    pub source: String,
    pub skip_space: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub root: String,
    pub patterns: Vec<Pattern>,
    pub nodes: Vec<NodeDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDecl {
    /// Rule name; also the label used in log entries.
    pub rule: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Matched text of a single pattern.
    Scalar { pattern: usize },
    /// Ordered choice between other rules.
    Choice { alternatives: Vec<String> },
    /// Repetition of an item node, `min` times or more.
    List { item: String, min: usize },
    /// One list element followed by an optional join.
    Item { element: Field, join: Join },
    Sequence { steps: Vec<Step> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Join {
    Pattern(usize),
    Rule(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Match(usize),
    Reject(Rejected),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    Pattern(usize),
    Rule(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub rule: String,
    pub arity: Arity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Optional,
    Repeat { min: usize, max: Option<usize> },
}

impl Arity {
    fn of(quantifier: Option<&Quantifier>) -> Self {
        match quantifier {
            None => Arity::One,
            Some(Quantifier::Optional) => Arity::Optional,
            Some(q) => {
                let (min, max) = q.bounds();
                Arity::Repeat { min, max }
            }
        }
    }
}

/// Name of the synthetic node pairing one list element with its join.
///
/// Declared rule names never contain digits, so the numbered fallback cannot clash with one.
pub fn item_rule_name(list: &str, declared: &HashSet<&str>) -> String {
    let item = format!("{list}_item");
    if declared.contains(item.as_str()) {
        format!("{item}_2")
    } else {
        item
    }
}

struct Lowering<'g> {
    declared: HashSet<&'g str>,
    patterns: Vec<Pattern>,
    pattern_ids: HashMap<Pattern, usize>,
    nodes: Vec<NodeDecl>,
}

/// Lowers a grammar into the node declarations of its parser.
pub fn lower(grammar: &Grammar) -> Result<Module, CodegenError> {
    let root = grammar.root().ok_or(CodegenError::NoRules)?.name.clone();
    let mut lowering = Lowering {
        declared: grammar.rules().map(|r| r.name.as_str()).collect(),
        patterns: Vec::new(),
        pattern_ids: HashMap::new(),
        nodes: Vec::new(),
    };
    for (policy, rule) in grammar.rules_with_policy() {
        lowering.rule(policy, rule)?;
    }
    Ok(Module {
        root,
        patterns: lowering.patterns,
        nodes: lowering.nodes,
    })
}

impl<'g> Lowering<'g> {
    fn rule(&mut self, policy: SpacingPolicy, rule: &'g Rule) -> Result<(), CodegenError> {
        let name = rule.name.clone();
        let kind = match &rule.expr {
            RuleExpr::Regex { regex, terms } if terms.is_empty() => NodeKind::Scalar {
                pattern: self.pattern(regex, policy),
            },
            RuleExpr::Regex { regex, terms } => {
                let mut steps = vec![Step::Match(self.pattern(regex, policy))];
                self.terms(&name, policy, terms, &mut steps, &mut FieldNames::default())?;
                NodeKind::Sequence { steps }
            }
            RuleExpr::Negation { target, terms } => {
                let mut steps = vec![Step::Reject(self.rejected(&name, target, policy)?)];
                self.terms(&name, policy, terms, &mut steps, &mut FieldNames::default())?;
                NodeKind::Sequence { steps }
            }
            RuleExpr::Name { name: first, rest } => match rest {
                NameRest::Alternation(others) => {
                    let members = || std::iter::once(first).chain(others);
                    for alt in members() {
                        self.resolve(&name, alt)?;
                    }
                    NodeKind::Choice {
                        alternatives: members().unique().cloned().collect(),
                    }
                }
                NameRest::Joined { optional, join } => {
                    let item = item_rule_name(&name, &self.declared);
                    let mut names = FieldNames::default();
                    self.resolve(&name, first)?;
                    let element = Field {
                        name: names.claim(first),
                        rule: first.clone(),
                        arity: Arity::One,
                    };
                    let join = match join {
                        NameOrRegex::Regex(regex) => Join::Pattern(self.pattern(regex, policy)),
                        NameOrRegex::Name(join) => {
                            self.resolve(&name, join)?;
                            Join::Rule(Field {
                                name: names.claim(join),
                                rule: join.clone(),
                                arity: Arity::Optional,
                            })
                        }
                    };
                    self.nodes.push(NodeDecl {
                        rule: item.clone(),
                        kind: NodeKind::Item { element, join },
                    });
                    NodeKind::List {
                        item,
                        min: if *optional { 0 } else { 1 },
                    }
                }
                NameRest::Sequence { quantifier, terms } => {
                    let mut names = FieldNames::default();
                    self.resolve(&name, first)?;
                    let mut steps = vec![Step::Field(Field {
                        name: names.claim(first),
                        rule: first.clone(),
                        arity: Arity::of(quantifier.as_ref()),
                    })];
                    self.terms(&name, policy, terms, &mut steps, &mut names)?;
                    NodeKind::Sequence { steps }
                }
            },
        };
        self.nodes.push(NodeDecl { rule: name, kind });
        Ok(())
    }

    fn terms(
        &mut self,
        owner: &str,
        policy: SpacingPolicy,
        terms: &[RuleTerm],
        steps: &mut Vec<Step>,
        names: &mut FieldNames,
    ) -> Result<(), CodegenError> {
        for term in terms {
            let step = match term {
                RuleTerm::Negative(target) => Step::Reject(self.rejected(owner, target, policy)?),
                RuleTerm::Regex(regex) => Step::Match(self.pattern(regex, policy)),
                RuleTerm::Named { name, quantifier } => {
                    self.resolve(owner, name)?;
                    Step::Field(Field {
                        name: names.claim(name),
                        rule: name.clone(),
                        arity: Arity::of(quantifier.as_ref()),
                    })
                }
            };
            steps.push(step);
        }
        Ok(())
    }

    fn rejected(
        &mut self,
        owner: &str,
        target: &NameOrRegex,
        policy: SpacingPolicy,
    ) -> Result<Rejected, CodegenError> {
        Ok(match target {
            NameOrRegex::Name(name) => {
                self.resolve(owner, name)?;
                Rejected::Rule(name.clone())
            }
            NameOrRegex::Regex(regex) => Rejected::Pattern(self.pattern(regex, policy)),
        })
    }

    fn resolve(&self, owner: &str, target: &str) -> Result<(), CodegenError> {
        if self.declared.contains(target) {
            Ok(())
        } else {
            Err(CodegenError::UnresolvedReference {
                from: owner.to_string(),
                to: target.to_string(),
            })
        }
    }

    fn pattern(&mut self, regex: &RegexLiteral, policy: SpacingPolicy) -> usize {
        let pattern = Pattern {
            source: regex.pattern(),
            skip_space: regex.skip_space(policy),
            ignore_case: regex.flags.ignore_case,
            multiline: regex.flags.multiline,
        };
        if let Some(&id) = self.pattern_ids.get(&pattern) {
            return id;
        }
        let id = self.patterns.len();
        self.pattern_ids.insert(pattern.clone(), id);
        self.patterns.push(pattern);
        id
    }
}

/// Field names of one node; a repeated rule gets `_2`, `_3`, ... suffixes.
#[derive(Default)]
struct FieldNames {
    seen: HashMap<String, usize>,
}

impl FieldNames {
    fn claim(&mut self, rule: &str) -> String {
        let count = self.seen.entry(rule.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            rule.to_string()
        } else {
            format!("{rule}_{count}")
        }
    }
}

impl Module {
    pub fn node(&self, rule: &str) -> Option<&NodeDecl> {
        self.nodes.iter().find(|n| n.rule == rule)
    }

    /// Rules whose value is stored inline (not behind a `Vec`) by `node`.
    fn inline_children(node: &NodeDecl) -> Vec<&str> {
        match &node.kind {
            NodeKind::Scalar { .. } | NodeKind::List { .. } => Vec::new(),
            NodeKind::Choice { alternatives } => alternatives.iter().map(String::as_str).collect(),
            NodeKind::Item { element, join } => {
                let mut out = vec![element.rule.as_str()];
                if let Join::Rule(field) = join {
                    out.push(field.rule.as_str());
                }
                out
            }
            NodeKind::Sequence { steps } => steps
                .iter()
                .filter_map(|step| match step {
                    Step::Field(Field {
                        rule,
                        arity: Arity::One | Arity::Optional,
                        ..
                    }) => Some(rule.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Whether a value of `child` stored inline in `owner` must be boxed, i.e. whether
    /// `child` contains `owner` again through inline storage.
    pub fn needs_box(&self, owner: &str, child: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![child];
        while let Some(rule) = stack.pop() {
            if rule == owner {
                return true;
            }
            if !seen.insert(rule) {
                continue;
            }
            if let Some(node) = self.node(rule) {
                stack.extend(Self::inline_children(node));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benfy_model::parser::parse;
    use pretty_assertions::assert_eq;

    fn module(text: &str) -> Module {
        lower(&parse(text).unwrap()).unwrap()
    }

    #[test]
    fn scalar_and_shared_patterns() {
        let m = module("a: /x/ b\nb: /x/\n\"strict\"\nc: /x/\n");
        assert_eq!(m.root, "a");
        assert_eq!(m.patterns.len(), 2);
        assert!(m.patterns[0].skip_space);
        assert!(!m.patterns[1].skip_space);
        assert_eq!(m.node("b").unwrap().kind, NodeKind::Scalar { pattern: 0 });
        assert_eq!(m.node("c").unwrap().kind, NodeKind::Scalar { pattern: 1 });
    }

    #[test]
    fn array_sugar_emits_item_then_list() {
        let m = module("list: item >> /,/\nitem: /[a-z]/\n");
        let rules: Vec<&str> = m.nodes.iter().map(|n| n.rule.as_str()).collect();
        assert_eq!(rules, vec!["list_item", "list", "item"]);
        assert_eq!(
            m.node("list").unwrap().kind,
            NodeKind::List { item: "list_item".to_string(), min: 1 }
        );
        let NodeKind::Item { element, join } = &m.node("list_item").unwrap().kind else {
            panic!("expected item node");
        };
        assert_eq!(element.rule, "item");
        assert_eq!(*join, Join::Pattern(0));
    }

    #[test]
    fn optional_array_has_zero_minimum() {
        let m = module("list: item? >> sep\nitem: /[a-z]/\nsep: /;/\n");
        assert_eq!(
            m.node("list").unwrap().kind,
            NodeKind::List { item: "list_item".to_string(), min: 0 }
        );
    }

    #[test]
    fn sequence_fields_follow_quantifiers() {
        let m = module("call: name /\\(/ arg{1,} arg? !kw\nname: /[a-z]+/\narg: /[0-9]/\nkw: /if/\n");
        let NodeKind::Sequence { steps } = &m.node("call").unwrap().kind else {
            panic!("expected sequence");
        };
        assert_eq!(
            steps,
            &vec![
                Step::Field(Field { name: "name".into(), rule: "name".into(), arity: Arity::One }),
                Step::Match(0),
                Step::Field(Field {
                    name: "arg".into(),
                    rule: "arg".into(),
                    arity: Arity::Repeat { min: 1, max: None },
                }),
                Step::Field(Field { name: "arg_2".into(), rule: "arg".into(), arity: Arity::Optional }),
                Step::Reject(Rejected::Rule("kw".into())),
            ]
        );
    }

    #[test]
    fn alternatives_are_deduplicated() {
        let m = module("v: a | b | a\na: /a/\nb: /b/\n");
        assert_eq!(
            m.node("v").unwrap().kind,
            NodeKind::Choice { alternatives: vec!["a".into(), "b".into()] }
        );
    }

    #[test]
    fn unresolved_reference_is_a_defect() {
        let err = lower(&parse("a: b\n").unwrap()).unwrap_err();
        assert!(matches!(err, CodegenError::UnresolvedReference { .. }));
    }

    #[test]
    fn item_node_steps_around_declared_rule() {
        let m = module("list: x >> /,/\nlist_item: /a/\nx: /b/\n");
        assert_eq!(
            m.node("list").unwrap().kind,
            NodeKind::List { item: "list_item_2".to_string(), min: 1 }
        );
        assert!(matches!(m.node("list_item").unwrap().kind, NodeKind::Scalar { .. }));
        assert!(matches!(m.node("list_item_2").unwrap().kind, NodeKind::Item { .. }));
    }

    #[test]
    fn recursion_through_inline_fields_needs_a_box() {
        let m = module("value: group | atom\ngroup: /\\(/ value? /\\)/\natom: /x/\nlist: value* /;/\n");
        assert!(m.needs_box("value", "group"));
        assert!(m.needs_box("group", "value"));
        assert!(!m.needs_box("value", "atom"));
        assert!(!m.needs_box("list", "value"));
    }
}
