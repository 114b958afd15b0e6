use std::path::PathBuf;

use serde_json::json;

use yangtree::context::Context;
use yangtree::data::InstanceNode;
use yangtree::xpath::XPathValue;
use yangtree::Error;

static YANG_LIBRARY: &str = "./assets/yang-library.json";
static SEARCH_DIR: &str = "./assets/yang";

static JSON_BOOK: &str = r#"
    {
        "example-module:address-book": {
            "address": [
                {
                    "last": "Flintstone",
                    "first": "Fred",
                    "street": "301 Cobblestone Way",
                    "city": "Bedrock"
                },
                {
                    "last": "Root",
                    "first": "Charlie",
                    "street": "4711 Cobblestone Way",
                    "city": "Bedrock"
                }
            ]
        }
    }"#;

fn create_context() -> Context {
    Context::from_yang_library_file(YANG_LIBRARY, &[PathBuf::from(SEARCH_DIR)])
        .expect("Failed to create context")
}

fn num(node: &InstanceNode<'_>, expr: &str, module: &str) -> f64 {
    node.eval_xpath(expr, module)
        .expect("Failed to evaluate")
        .number()
}

fn text(node: &InstanceNode<'_>, expr: &str, module: &str) -> String {
    node.eval_xpath(expr, module)
        .expect("Failed to evaluate")
        .string()
}

fn truth(node: &InstanceNode<'_>, expr: &str, module: &str) -> bool {
    node.eval_xpath(expr, module)
        .expect("Failed to evaluate")
        .boolean()
}

#[test]
fn arithmetic() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({})).unwrap();

    assert_eq!(num(&inst, "2 + 3 * 4", "example-2"), 14.0);
    assert_eq!(num(&inst, "(2 + 3) * 4", "example-2"), 20.0);
    assert_eq!(num(&inst, "7 mod 2", "example-2"), 1.0);
    assert_eq!(num(&inst, "10 div 4", "example-2"), 2.5);
    assert_eq!(num(&inst, "1 div 0", "example-2"), f64::INFINITY);
    assert_eq!(num(&inst, "-1 div 0", "example-2"), f64::NEG_INFINITY);
    assert!(num(&inst, "0 div 0", "example-2").is_nan());
    assert!(num(&inst, "5 mod 0", "example-2").is_nan());
    assert_eq!(num(&inst, "--4", "example-2"), 4.0);
}

#[test]
fn string_functions() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({})).unwrap();

    assert_eq!(text(&inst, "concat('foo', '-', 'bar')", "example-2"), "foo-bar");
    assert_eq!(text(&inst, "substring('12345', 2, 3)", "example-2"), "234");
    assert_eq!(text(&inst, "substring('12345', 2)", "example-2"), "2345");
    assert_eq!(
        text(&inst, "substring-before('1999/04/01', '/')", "example-2"),
        "1999"
    );
    assert_eq!(
        text(&inst, "substring-after('1999/04/01', '/')", "example-2"),
        "04/01"
    );
    assert_eq!(
        text(&inst, "translate('abcabc', 'ab', 'x')", "example-2"),
        "xcxc"
    );
    assert_eq!(
        text(&inst, "normalize-space('  a   b  ')", "example-2"),
        "a b"
    );
    assert_eq!(num(&inst, "string-length('hello')", "example-2"), 5.0);
    assert!(truth(&inst, "starts-with('hello', 'he')", "example-2"));
    assert!(truth(&inst, "contains('hello', 'ell')", "example-2"));
    assert_eq!(text(&inst, "string(4 div 2)", "example-2"), "2");
    assert_eq!(text(&inst, "string(10 div 4)", "example-2"), "2.5");
    assert_eq!(text(&inst, "string(1 div 0)", "example-2"), "Infinity");
}

#[test]
fn booleans_and_comparisons() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({})).unwrap();

    assert!(truth(&inst, "true()", "example-2"));
    assert!(!truth(&inst, "false()", "example-2"));
    assert!(truth(&inst, "not(false())", "example-2"));
    assert!(truth(&inst, "1 = 1", "example-2"));
    assert!(truth(&inst, "1 != 2", "example-2"));
    assert!(truth(&inst, "2 < 3 and 3 <= 3", "example-2"));
    assert!(truth(&inst, "4 > 3 or false()", "example-2"));
}

#[test]
fn location_paths_and_predicates() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();

    assert_eq!(num(&inst, "count(address-book/address)", "example-module"), 2.0);
    assert_eq!(
        num(&inst, "count(/example-module:address-book/address)", "example-module"),
        2.0
    );
    assert_eq!(
        num(
            &inst,
            "count(address-book/address[city = 'Bedrock'])",
            "example-module"
        ),
        2.0
    );
    assert_eq!(
        text(&inst, "address-book/address[first = 'Fred']/street", "example-module"),
        "301 Cobblestone Way"
    );
    // a purely numeric predicate selects by position
    assert_eq!(
        text(&inst, "address-book/address[2]/first", "example-module"),
        "Charlie"
    );
    assert_eq!(
        text(
            &inst,
            "address-book/address[position() = last()]/first",
            "example-module"
        ),
        "Charlie"
    );
    // descendants
    assert_eq!(num(&inst, "count(//city)", "example-module"), 2.0);
    // union deduplicates by instance route
    assert_eq!(
        num(
            &inst,
            "count(address-book/address | address-book/address)",
            "example-module"
        ),
        2.0
    );
    assert_eq!(num(&inst, "count(address-book/bogus)", "example-module"), 0.0);
}

#[test]
fn axes() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let fred = inst
        .member("example-module:address-book")
        .unwrap()
        .member("address")
        .unwrap()
        .entry(0)
        .unwrap();

    assert_eq!(text(&fred, "first", "example-module"), "Fred");
    assert_eq!(
        num(&fred, "count(following-sibling::address)", "example-module"),
        1.0
    );
    assert_eq!(
        num(&fred, "count(preceding-sibling::address)", "example-module"),
        0.0
    );
    assert_eq!(
        num(&fred, "count(ancestor::address-book)", "example-module"),
        1.0
    );
    assert_eq!(text(&fred, "../address[1]/first", "example-module"), "Fred");
    assert!(truth(&fred, "self::address", "example-module"));
    // current() refers to the origin of the whole evaluation
    assert!(truth(&fred, "first = current()/first", "example-module"));
}

#[test]
fn yang_extension_functions() {
    let ctx = create_context();

    // deref follows a leafref to its target
    let inst = ctx
        .from_raw(&json!({"t1:indirect": {"target": 42, "ref": 42}}))
        .unwrap();
    let refleaf = inst.member("t1:indirect").unwrap().member("ref").unwrap();
    let target = refleaf.eval_xpath("deref(.)", "t1").unwrap();
    assert_eq!(target.number(), 42.0);
    match target {
        XPathValue::Nodes(ns) => assert_eq!(ns.len(), 1),
        other => panic!("expected node set, got {:?}", other),
    }

    // identity derivation checks
    let inst = ctx.from_raw(&json!({"t1:id-reference": "t1:type-t1"})).unwrap();
    assert!(truth(&inst, "derived-from(id-reference, 'd:type-a')", "t1"));
    assert!(!truth(&inst, "derived-from(id-reference, 't1:type-t1')", "t1"));
    assert!(truth(
        &inst,
        "derived-from-or-self(id-reference, 't1:type-t1')",
        "t1"
    ));

    // enum-value and bit-is-set
    let inst = ctx
        .from_raw(&json!({"example-2:bag": {"mood": "wild", "flags": "a"}}))
        .unwrap();
    let bag = inst.member("example-2:bag").unwrap();
    assert_eq!(num(&bag, "enum-value(mood)", "example-2"), 2.0);
    assert!(truth(&bag, "bit-is-set(flags, 'a')", "example-2"));
    assert!(!truth(&bag, "bit-is-set(flags, 'b')", "example-2"));

    // re-match uses the YANG (XSD) pattern dialect
    let inst = ctx.from_raw(&json!({})).unwrap();
    assert!(truth(
        &inst,
        r"re-match('1.22.333', '\d{1,3}\.\d{1,3}\.\d{1,3}')",
        "example-2"
    ));
    assert!(!truth(
        &inst,
        r"re-match('x.22.333', '\d{1,3}\.\d{1,3}\.\d{1,3}')",
        "example-2"
    ));
}

#[test]
fn unsupported_features_are_reported() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({})).unwrap();

    match inst.eval_xpath("id('x')", "example-2") {
        Err(Error::XPathNotSupported { .. }) => (),
        other => panic!("expected XPathNotSupported, got {:?}", other),
    }
    match inst.eval_xpath("following::x", "example-2") {
        Err(Error::XPathNotSupported { .. }) => (),
        other => panic!("expected XPathNotSupported, got {:?}", other),
    }
    match inst.eval_xpath("text()", "example-2") {
        Err(Error::XPathNotSupported { .. }) => (),
        other => panic!("expected XPathNotSupported, got {:?}", other),
    }
}

#[test]
fn type_errors_are_reported() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({})).unwrap();
    match inst.eval_xpath("count(1)", "example-2") {
        Err(Error::XPathTypeError { .. }) => (),
        other => panic!("expected XPathTypeError, got {:?}", other),
    }
}
