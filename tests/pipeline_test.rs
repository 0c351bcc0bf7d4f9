mod common;

use benfy::model::{MessageType, Severity};
use benfy::testing::Testable;
use benfy::{Error, Options};
use common::{generator, TestEnv};
use pretty_assertions::assert_eq;

#[test]
fn test_compile_file_labels_output_with_file_name() {
    let env = TestEnv::new();
    let compiled = env
        .compile("digits.bnf", "number: digit+\ndigit: /[0-9]/\n")
        .test()
        .assert_success();
    assert!(compiled.source.starts_with("// Generated by benfy from digits.bnf. Do not edit."));
    assert!(compiled.source.contains("ROOT_RULE"));
    assert!(compiled.warnings.is_empty());
    assert_eq!(compiled.grammar.rules().count(), 2);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let env = TestEnv::new();
    let err = env
        .generator()
        .compile_file("absent.bnf")
        .test()
        .assert_failure_contains("cannot read grammar file");
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_circular_reference() {
    let err = generator("loop.bnf")
        .compile("a: b\nb: c\nc: a\n")
        .test()
        .assert_failure();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message_type, MessageType::ReferenceError);
    assert_eq!(diagnostics[0].message, "circular reference: a -> b -> c -> a");
    assert_eq!(diagnostics[0].location, "loop.bnf:1:1");
}

#[test]
fn test_optional_reference_breaks_cycle() {
    generator("g.bnf")
        .compile("a: b?\nb: /x/ a\n")
        .test()
        .assert_success();
}

#[test]
fn test_rule_named_like_item_node_still_generates() {
    let compiled = generator("g.bnf")
        .compile("list: x >> /,/\nlist_item: /a/\nx: /b/\n")
        .test()
        .assert_success();
    assert!(compiled.source.contains("ListItem2"));
    assert_eq!(compiled.warnings.len(), 1);
}

#[test]
fn test_invalid_reference() {
    let err = generator("g.bnf")
        .compile("start: /x/ missing\n")
        .test()
        .assert_failure();
    assert_eq!(err.diagnostics()[0].matched_pattern, "start -> missing");
    assert_eq!(err.diagnostics()[0].message, "invalid reference: start -> missing");
}

#[test]
fn test_unused_rule_is_only_a_warning() {
    let compiled = generator("g.bnf")
        .compile("start: /x/\nextra: /y/\n")
        .test()
        .assert_success();
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.warnings[0].severity, Severity::Warning);
    assert_eq!(compiled.warnings[0].message, "unused rule: extra");
    assert_eq!(compiled.warnings[0].location, "g.bnf:2:1");
}

#[test]
fn test_lint_findings_block_compilation() {
    let err = generator("g.bnf")
        .compile("start:  item\nitem: /x/+\n")
        .test()
        .assert_failure_contains("blocking finding");
    let messages: Vec<&str> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert!(messages.contains(&"multiple spaces"), "{messages:?}");
    assert!(messages.contains(&"regex with quantifier"), "{messages:?}");
}

#[test]
fn test_successive_regex_is_informational() {
    let compiled = generator("g.bnf")
        .compile("start: /a/ /b/\n")
        .test()
        .assert_success();
    assert_eq!(compiled.warnings[0].severity, Severity::Info);
    assert_eq!(compiled.warnings[0].message, "successive regex");
}

#[test]
fn test_syntax_error_points_into_grammar() {
    let err = generator("g.bnf")
        .compile("start: /x/\nnext:/y/\n")
        .test()
        .assert_failure();
    match err {
        Error::Syntax(err) => {
            // The second line is left over.
            let syntax = err.syntax().expect("syntax error");
            assert_eq!(syntax.index, 11);
            assert_eq!(syntax.location, "g.bnf:2:1");
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_generation_is_deterministic() {
    let text = "\"strict\"\nlist: entry? >> sep\nentry: !/#/ word{1,2}\nword: /[a-z]+/l\nsep: /;/\n";
    let first = generator("g.bnf").compile(text).test().assert_success();
    let second = generator("g.bnf").compile(text).test().assert_success();
    assert_eq!(first.source, second.source);
}

#[test]
fn test_analyze_collects_all_findings() {
    let (grammar, report) = generator("g.bnf")
        .analyze("a: b\nb: a\nc: missing\n")
        .test()
        .assert_success();
    assert_eq!(grammar.rules().count(), 3);
    let errors: Vec<&str> = report.errors.iter().map(|d| d.matched_pattern.as_str()).collect();
    assert_eq!(errors, vec!["c -> missing", "a -> b -> a"]);
    let warnings: Vec<&str> = report.warnings.iter().map(|d| d.matched_pattern.as_str()).collect();
    assert_eq!(warnings, vec!["c"]);
}

#[test]
fn test_debug_tree_without_locations() {
    let generator = benfy::Generator::new(".").with_options(
        Options::new()
            .with_label("g.bnf")
            .with_stripped_locations(true),
    );
    let (grammar, _) = generator.analyze("\nstart: /x/\n").test().assert_success();
    let tree = generator.debug_tree(&grammar);
    assert!(tree.contains("name: \"start\""));
    assert!(!tree.contains("line: 2"));
}
