use benfy::grammar;
use benfy::testing::Testable;

grammar!(digits, "digit: /[0-9]/\n");

grammar!(greeting, "greeting: /hello/ world?\nworld: /world/\n");

grammar!(
    greeter,
    "greeting: hello world?\nhello: /hello/\nworld: /world/\n"
);

grammar!(words,"list: item >> /,/\nitem: /[a-z]+/\n");

grammar!(
    calc,
    r"expr: group | number
group: /\(/ expr /\)/
number: /[0-9]+/
"
);

grammar!(
    idents,
    r"ident: !keyword /[a-z]+/
keyword: /if\b/
"
);

grammar!(pins, "pin: digit{4}\ndigit: /[0-9]/\n");

grammar!(ranges, "code: letter{2,3} digit{1,}\nletter: /[a-z]/\ndigit: /[0-9]/\n");

grammar!(
    tight,
    "\"strict\"\npair: left right\nleft: /a/\nright: /b/\n"
);

grammar!(roomy, "pair: left right\nleft: /a/\nright: /b/\n");

grammar!(shouting, "word: /abc/i\n");

grammar!(
    flagged,
    "\"strict\"\npair: left right\nleft: /a/\nright: /b/l\n"
);

grammar!(glued, "pair: left tail\nleft: /a/\ntail: /c/s\n");

grammar!(
    bounded,
    r"pair: foo bar
foo: /foo/
bar: /\bbar/
"
);

grammar!(
    stanzas,
    r"lines: head tail
head: /[a-z]+/
tail: /^[a-z]+$/m
"
);

grammar!(
    anchored,
    r"lines: head tail
head: /[a-z]+/
tail: /^[a-z]+$/
"
);

grammar!(
    shadowed,
    "pair: list list_item\nlist: x >> /,/\nlist_item: /a/\nx: /b/\n"
);

#[test]
fn test_scalar_rule() {
    let digit = digits::parse("7").test().assert_success();
    assert_eq!(digit.value, "7");
    assert_eq!(digits::ROOT_RULE, "digit");
}

#[test]
fn test_scalar_mismatch_reports_deepest_index() {
    let err = digits::parse("a").test().assert_failure_contains("/[0-9]/");
    let syntax = err.syntax().expect("syntax error");
    assert_eq!(syntax.index, 0);
    assert_eq!(syntax.expected, vec!["/[0-9]/".to_string()]);
}

#[test]
fn test_optional_term() {
    let plain = greeting::parse("hello").test().assert_success();
    assert!(plain.world.is_none());

    let full = greeting::parse("hello world").test().assert_success();
    assert_eq!(full.world.map(|w| w.value), Some("world".to_string()));
}

#[test]
fn test_named_terms_become_fields() {
    let plain = greeter::parse("hello").test().assert_success();
    assert_eq!(plain.hello.value, "hello");
    assert!(plain.world.is_none());

    let full = greeter::parse("hello world").test().assert_success();
    assert_eq!(full.world.map(|w| w.value).as_deref(), Some("world"));

    greeter::parse("hellox").test().assert_failure();
}

#[test]
fn test_leftover_text_is_an_error() {
    let err = greeting::parse("hellox")
        .test()
        .assert_failure_contains("text not fully consumed, interrupted at index 5");
    assert_eq!(err.syntax().map(|s| s.location.as_str()), Some("1:6"));
}

#[test]
fn test_array_sugar() {
    let list = words::parse("a, b,c").test().assert_success();
    let values: Vec<&str> = list.items.iter().map(|i| i.item.value.as_str()).collect();
    assert_eq!(values, vec!["a", "b", "c"]);
}

#[test]
fn test_array_sugar_rejects_empty_element() {
    let err = words::parse("a,,b").test().assert_failure();
    assert_eq!(err.syntax().map(|s| s.index), Some(2));
}

#[test]
fn test_trailing_separator_is_tolerated() {
    let list = words::parse("a,b,").test().assert_success();
    assert_eq!(list.items.len(), 2);
}

#[test]
fn test_recursive_rules() {
    fn depth(expr: &calc::Expr) -> usize {
        match expr {
            calc::Expr::Group(group) => 1 + depth(&group.expr),
            calc::Expr::Number(_) => 0,
        }
    }

    let expr = calc::parse("((1))").test().assert_success();
    assert_eq!(depth(&expr), 2);
    let expr = calc::parse(" ( 42 )").test().assert_success();
    assert_eq!(depth(&expr), 1);
    calc::parse("((1)").test().assert_failure();
}

#[test]
fn test_negation() {
    idents::parse("iffy").test().assert_success();
    idents::parse("while").test().assert_success();
    idents::parse("if").test().assert_failure();
}

#[test]
fn test_exact_brace_quantifier() {
    let pin = pins::parse("1234").test().assert_success();
    assert_eq!(pin.digit.len(), 4);
    pins::parse("123").test().assert_failure();
    pins::parse("12345").test().assert_failure();
}

#[test]
fn test_ranged_brace_quantifiers() {
    let code = ranges::parse("ab1").test().assert_success();
    assert_eq!((code.letter.len(), code.digit.len()), (2, 1));
    let code = ranges::parse("abc123").test().assert_success();
    assert_eq!((code.letter.len(), code.digit.len()), (3, 3));
    ranges::parse("a1").test().assert_failure();
    ranges::parse("abcd1").test().assert_failure();
}

#[test]
fn test_spacing_policy() {
    tight::parse("ab").test().assert_success();
    tight::parse("a b").test().assert_failure();
    roomy::parse("a b").test().assert_success();
    roomy::parse("\n a \t b").test().assert_success();
    // Trailing whitespace is left unconsumed.
    roomy::parse("a b ").test().assert_failure();
}

#[test]
fn test_success_logs() {
    let parsed = digits::parse_with("7", "input.txt", |_| {})
        .test()
        .assert_success();
    assert_eq!(parsed.logs.len(), 1);
    let entry = &parsed.logs[0];
    assert!(entry.matched);
    assert_eq!(entry.rule, "digit");
    assert_eq!(entry.index, 1);
    assert_eq!(entry.location, "input.txt:1:2");
}

#[test]
fn test_failure_logs_follow_successes() {
    let err = greeting::parse_with("hello planet", "", |_| {})
        .test()
        .assert_failure();
    let logs = &err.syntax().expect("syntax error").logs;
    assert!(logs[0].matched);
    assert_eq!(logs[0].rule, "greeting");
    let failed = logs.last().expect("failure entry");
    assert!(!failed.matched);
    assert_eq!(failed.rule, "world");
    assert_eq!(failed.index, 6);
    assert_eq!(failed.snippet, "planet");
}

#[test]
fn test_on_failure_sees_partial_root() {
    let mut partial = None;
    greeting::parse_with("hello!", "", |root| {
        partial = root.map(|r| r.world.is_none());
    })
    .test()
    .assert_failure();
    assert_eq!(partial, Some(true));

    let mut called = false;
    digits::parse_with("x", "", |root| {
        called = root.is_none();
    })
    .test()
    .assert_failure();
    assert!(called);
}

#[test]
fn test_ignore_case_flag() {
    let word = shouting::parse("ABC").test().assert_success();
    assert_eq!(word.value, "ABC");
    shouting::parse("aBc").test().assert_success();
    shouting::parse("abd").test().assert_failure();
}

#[test]
fn test_loose_flag_in_strict_grammar() {
    flagged::parse("ab").test().assert_success();
    flagged::parse("a  b").test().assert_success();
    flagged::parse(" ab").test().assert_failure();
}

#[test]
fn test_strict_flag_in_loose_grammar() {
    let pair = glued::parse("ac").test().assert_success();
    assert_eq!(pair.tail.value, "c");
    glued::parse("a c").test().assert_failure();
    glued::parse(" ac").test().assert_success();
}

#[test]
fn test_word_boundary_sees_previous_token() {
    bounded::parse("foo bar").test().assert_success();
    let err = bounded::parse("foobar").test().assert_failure();
    assert_eq!(err.syntax().map(|s| s.index), Some(3));
}

#[test]
fn test_multiline_anchors() {
    let lines = stanzas::parse("ab\ncd").test().assert_success();
    assert_eq!(lines.tail.value, "cd");
    stanzas::parse("ab cd").test().assert_failure();
    stanzas::parse("ab\ncd\n").test().assert_failure();

    // Without `m`, `^` only matches at the start of the whole text.
    anchored::parse("ab\ncd").test().assert_failure();
}

#[test]
fn test_item_node_next_to_declared_item_rule() {
    let pair = shadowed::parse("b, b a").test().assert_success();
    assert_eq!(pair.list.items.len(), 2);
    assert_eq!(pair.list.items[1].x.value, "b");
    assert_eq!(pair.list_item.value, "a");
}

#[test]
fn test_long_input_keeps_trail_bounded() {
    let input = vec!["ab"; 10_000].join(",");
    let parsed = words::parse_with(&input, "", |_| {}).test().assert_success();
    assert_eq!(parsed.root.items.len(), 10_000);
    let kept = parsed.logs.iter().filter(|entry| entry.matched).count();
    assert!(kept <= words::rt::SUCCESS_TRAIL_LEN, "kept {kept} entries");
}
