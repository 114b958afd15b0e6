use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{json, Value as RawValue};

use yangtree::context::Context;
use yangtree::data::{ContentType, InstanceNode, NoFilter, OutputFilter, ValidationScope};
use yangtree::types::ScalarValue;
use yangtree::value::Value;
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
                    "city": "Bedrock",
                    "example-module-aug:zipcode": "70777"
                },
                {
                    "last": "Root",
                    "first": "Charlie",
                    "street": "4711 Cobblestone Way",
                    "city": "Bedrock",
                    "example-module-aug:zipcode": "70777"
                }
            ]
        }
    }"#;

fn create_context() -> Context {
    let _ = env_logger::builder().is_test(true).try_init();
    Context::from_yang_library_file(YANG_LIBRARY, &[PathBuf::from(SEARCH_DIR)])
        .expect("Failed to create context")
}

fn scalar(node: &InstanceNode<'_>) -> ScalarValue {
    node.value().as_scalar().expect("scalar value").clone()
}

#[test]
fn cook_address_book() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).expect("Failed to cook data");

    let book = inst.member("example-module:address-book").unwrap();
    let address = book.member("address").unwrap();
    assert_eq!(address.value().as_array().unwrap().entries.len(), 2);

    let fred = address.entry(0).unwrap();
    assert_eq!(scalar(&fred.member("city").unwrap()), ScalarValue::String("Bedrock".into()));
    assert_eq!(
        scalar(&fred.member("example-module-aug:zipcode").unwrap()),
        ScalarValue::String("70777".into())
    );
    // negative indexes count from the end
    let charlie = address.entry(-1).unwrap();
    assert_eq!(
        scalar(&charlie.member("first").unwrap()),
        ScalarValue::String("Charlie".into())
    );
}

#[test]
fn list_look_up() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let address = inst
        .member("example-module:address-book")
        .unwrap()
        .member("address")
        .unwrap();
    let entry = address
        .look_up(&[
            ("first".to_string(), ScalarValue::String("Charlie".into())),
            ("last".to_string(), ScalarValue::String("Root".into())),
        ])
        .expect("Failed to look up entry");
    assert_eq!(
        scalar(&entry.member("city").unwrap()),
        ScalarValue::String("Bedrock".into())
    );

    assert!(address
        .look_up(&[("first".to_string(), ScalarValue::String("Wilma".into()))])
        .is_err());
}

#[test]
fn zipper_laws() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let book = inst.member("example-module:address-book").unwrap();

    // down and up restores the original cursor
    assert_eq!(book.member("address").unwrap().up().unwrap(), book);

    // sibling navigation inside an entry
    let fred = book.member("address").unwrap().entry(0).unwrap();
    let last = fred.member("last").unwrap();
    let first = last.sibling("first").unwrap();
    assert_eq!(scalar(&first), ScalarValue::String("Fred".into()));
    assert_eq!(first.up().unwrap(), fred);

    // entry stepping
    let e0 = book.member("address").unwrap().entry(0).unwrap();
    let e1 = e0.next().unwrap();
    assert_eq!(e1.index(), Some(1));
    assert_eq!(e1.previous().unwrap(), e0);
    assert!(e1.next().is_err());
}

#[test]
fn persistence_of_edits() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let book = inst.member("example-module:address-book").unwrap();
    let fred = book.member("address").unwrap().entry(0).unwrap();

    let before = fred.value().clone();
    let ts_before = fred.timestamp();

    let edited = fred.put_member_raw("city", &json!("Granite City")).unwrap();
    let new_fred = edited.up().unwrap();

    // the original cursor still sees the old value
    assert_eq!(fred.value(), &before);
    assert_eq!(
        scalar(&fred.member("city").unwrap()),
        ScalarValue::String("Bedrock".into())
    );
    assert_eq!(
        scalar(&new_fred.member("city").unwrap()),
        ScalarValue::String("Granite City".into())
    );

    // timestamps are non-decreasing along the chain of modifications
    assert!(new_fred.timestamp() >= ts_before);
    let top = new_fred.top();
    assert!(top.timestamp() >= new_fred.timestamp());
}

#[test]
fn put_member_rejects_unknown_names() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let book = inst.member("example-module:address-book").unwrap();
    match book.put_member_raw("bogus", &json!(1)) {
        Err(Error::NonexistentSchemaNode { .. }) => (),
        other => panic!("expected NonexistentSchemaNode, got {:?}", other),
    }
}

#[test]
fn raw_round_trip() {
    let ctx = create_context();
    let raw: RawValue = serde_json::from_str(JSON_BOOK).unwrap();
    let inst = ctx.from_raw(&raw).unwrap();
    assert_eq!(inst.raw_value(&NoFilter), raw);
}

#[test]
fn unknown_member_is_raw_member_error() {
    let ctx = create_context();
    let raw = json!({"example-module:address-book": {"bogus": 1}});
    match ctx.from_raw(&raw) {
        Err(Error::RawMember { member, .. }) => assert_eq!(member, "bogus"),
        other => panic!("expected RawMember, got {:?}", other),
    }
}

#[test]
fn wrong_shape_is_raw_type_error() {
    let ctx = create_context();
    let raw = json!({"example-2:bag": {"baz": "not-a-number"}});
    match ctx.from_raw(&raw) {
        Err(Error::RawType { .. }) => (),
        other => panic!("expected RawTypeError, got {:?}", other),
    }
}

#[test]
fn default_insertion() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({"example-2:bag": {}})).unwrap();
    let with_defaults = inst.add_defaults(ContentType::ALL, false).unwrap();
    assert_eq!(
        with_defaults.raw_value(&NoFilter),
        json!({"example-2:bag": {"baz": 99}})
    );
    // the source cursor is untouched
    assert_eq!(inst.raw_value(&NoFilter), json!({"example-2:bag": {}}));
}

#[test]
fn default_insertion_with_tags() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({"example-2:bag": {}})).unwrap();
    let tagged = inst.add_defaults(ContentType::ALL, true).unwrap();
    assert_eq!(
        tagged.raw_value(&NoFilter),
        json!({"example-2:bag": {
            "baz": 99,
            "@baz": {"ietf-netconf-with-defaults:default": true}
        }})
    );
}

#[test]
fn validate_ok() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    inst.validate(ValidationScope::ALL, ContentType::ALL)
        .expect("Failed to validate");
}

#[test]
fn missing_list_key_is_schema_error() {
    let ctx = create_context();
    let raw = json!({"example-module:address-book": {
        "address": [{"last": "Root", "city": "Bedrock", "street": "x"}]
    }});
    let inst = ctx.from_raw(&raw).unwrap();
    match inst.validate(ValidationScope::ALL, ContentType::ALL) {
        Err(Error::SchemaViolation { tag, .. }) => assert_eq!(tag, "missing-data"),
        other => panic!("expected SchemaViolation, got {:?}", other),
    }
}

#[test]
fn state_member_not_allowed_in_config() {
    let ctx = create_context();
    let raw = json!({"example-2:bag": {"counter": "42"}});
    let inst = ctx.from_raw(&raw).unwrap();
    // fine as full datastore content
    inst.validate(ValidationScope::ALL, ContentType::ALL).unwrap();
    // not allowed in pure configuration
    match inst.validate(ValidationScope::ALL, ContentType::CONFIG) {
        Err(Error::SchemaViolation { tag, .. }) => {
            assert_eq!(tag, "member-not-allowed")
        }
        other => panic!("expected SchemaViolation, got {:?}", other),
    }
}

#[test]
fn choice_accepts_one_case_only() {
    let ctx = create_context();
    let ok = ctx
        .from_raw(&json!({"example-2:bag": {"text": "hi"}}))
        .unwrap();
    ok.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    let bad = ctx
        .from_raw(&json!({"example-2:bag": {"text": "hi", "markup": "<b>hi</b>"}}))
        .unwrap();
    assert!(bad.validate(ValidationScope::ALL, ContentType::ALL).is_err());
}

#[test]
fn must_constraint() {
    let ctx = create_context();
    let ok = ctx
        .from_raw(&json!({"example-2:bag": {"limits": {"low": 1, "high": 3}}}))
        .unwrap();
    ok.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    let bad = ctx
        .from_raw(&json!({"example-2:bag": {"limits": {"low": 5, "high": 3}}}))
        .unwrap();
    match bad.validate(ValidationScope::ALL, ContentType::ALL) {
        Err(Error::SemanticViolation { tag, message, .. }) => {
            assert_eq!(tag, "must-violation");
            assert_eq!(message.as_deref(), Some("high must not be lower than low"));
        }
        other => panic!("expected SemanticViolation, got {:?}", other),
    }
    // syntax-only validation skips must evaluation
    bad.validate(ValidationScope::SYNTAX, ContentType::ALL).unwrap();
}

#[test]
fn when_constraint() {
    let ctx = create_context();
    let ok = ctx
        .from_raw(&json!({"t1:gated": {"switch": true, "extra": "on"}}))
        .unwrap();
    ok.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    let bad = ctx
        .from_raw(&json!({"t1:gated": {"switch": false, "extra": "on"}}))
        .unwrap();
    assert!(bad.validate(ValidationScope::ALL, ContentType::ALL).is_err());
}

#[test]
fn leaf_list_uniqueness() {
    let ctx = create_context();
    let bad = ctx
        .from_raw(&json!({"example-2:bag": {"tags": ["a", "b", "a"]}}))
        .unwrap();
    match bad.validate(ValidationScope::ALL, ContentType::ALL) {
        Err(Error::SemanticViolation { tag, .. }) => assert_eq!(tag, "data-not-unique"),
        other => panic!("expected SemanticViolation, got {:?}", other),
    }
}

#[test]
fn list_unique_constraint() {
    let ctx = create_context();
    let bad = ctx
        .from_raw(&json!({"example-module:address-book": {"address": [
            {"last": "Flintstone", "first": "Fred", "street": "301", "city": "Bedrock"},
            {"last": "Rubble", "first": "Barney", "street": "301", "city": "Bedrock"}
        ]}}))
        .unwrap();
    let errors = bad.validate_all(ValidationScope::ALL, ContentType::ALL);
    assert!(errors
        .iter()
        .any(|e| matches!(e, Error::SemanticViolation { tag, .. } if tag == "data-not-unique")));
}

#[test]
fn identityref_resolution() {
    let ctx = create_context();

    let inst = ctx.from_raw(&json!({"t1:id-reference": "t1:type-t1"})).unwrap();
    let leaf = inst.member("t1:id-reference").unwrap();
    assert_eq!(
        scalar(&leaf),
        ScalarValue::IdentityRef {
            name: "type-t1".to_string(),
            ns: "t1".to_string()
        }
    );
    inst.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    // derived in another module is fine as well
    let inst = ctx.from_raw(&json!({"t1:id-reference": "defs:type-b"})).unwrap();
    inst.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    // the base itself is not derived from the base
    let inst = ctx.from_raw(&json!({"t1:id-reference": "defs:type-a"})).unwrap();
    match inst.validate(ValidationScope::ALL, ContentType::ALL) {
        Err(Error::TypeViolation { .. }) => (),
        other => panic!("expected TypeViolation, got {:?}", other),
    }
}

#[test]
fn leafref_require_instance() {
    let ctx = create_context();

    let ok = ctx
        .from_raw(&json!({"t1:indirect": {"target": 42, "ref": 42}}))
        .unwrap();
    ok.validate(ValidationScope::ALL, ContentType::ALL).unwrap();

    let bad = ctx
        .from_raw(&json!({"t1:indirect": {"target": 42, "ref": 43}}))
        .unwrap();
    match bad.validate(ValidationScope::ALL, ContentType::ALL) {
        Err(Error::SemanticViolation { tag, .. }) => {
            assert_eq!(tag, "instance-required")
        }
        other => panic!("expected SemanticViolation, got {:?}", other),
    }
}

#[test]
fn merge_semantics() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let book = inst.member("example-module:address-book").unwrap();

    let merged = book
        .merge_raw(&json!({"address": [
            {"last": "Root", "first": "Charlie", "city": "Granite City"},
            {"last": "Rubble", "first": "Barney", "street": "303", "city": "Bedrock"}
        ]}))
        .unwrap();
    let address = merged.member("address").unwrap();
    let entries = address.value().as_array().unwrap();
    // Charlie matched by key and was merged in place, Barney was appended
    assert_eq!(entries.entries.len(), 3);
    let charlie = address
        .look_up(&[("last".to_string(), ScalarValue::String("Root".into()))])
        .unwrap();
    assert_eq!(
        scalar(&charlie.member("city").unwrap()),
        ScalarValue::String("Granite City".into())
    );
    assert_eq!(
        scalar(&charlie.member("street").unwrap()),
        ScalarValue::String("4711 Cobblestone Way".into())
    );

    // leaf-list merge unites by value
    let bag = ctx
        .from_raw(&json!({"example-2:bag": {"tags": ["a", "b"]}}))
        .unwrap()
        .member("example-2:bag")
        .unwrap();
    let merged = bag.merge_raw(&json!({"tags": ["b", "c"]})).unwrap();
    let tags = merged.member("tags").unwrap();
    let entries: Vec<_> = tags
        .value()
        .as_array()
        .unwrap()
        .entries
        .iter()
        .map(|v| v.as_scalar().unwrap().canonical_string())
        .collect();
    assert_eq!(entries, vec!["a", "b", "c"]);
}

#[test]
fn entry_insertion_and_deletion() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let address = inst
        .member("example-module:address-book")
        .unwrap()
        .member("address")
        .unwrap();

    let raw = json!({"last": "Rubble", "first": "Barney", "street": "303", "city": "Bedrock"});
    let fred = address.entry(0).unwrap();
    let barney = fred.insert_before(fred.update_raw(&raw).unwrap().value().clone()).unwrap();
    let grown = barney.up().unwrap();
    assert_eq!(grown.value().as_array().unwrap().entries.len(), 3);

    let shrunk = grown.delete_entry(0).unwrap();
    assert_eq!(shrunk.value().as_array().unwrap().entries.len(), 2);

    // the original is untouched
    assert_eq!(address.value().as_array().unwrap().entries.len(), 2);
}

#[test]
fn instance_route_round_trip() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let city = inst
        .member("example-module:address-book")
        .unwrap()
        .member("address")
        .unwrap()
        .entry(1)
        .unwrap()
        .member("city")
        .unwrap();

    let route = city.instance_route();
    let text = route.to_string();
    assert_eq!(
        text,
        "/example-module:address-book/address[last=\"Root\"][first=\"Charlie\"]/city"
    );
    let parsed = ctx.parse_instance_id(&text).unwrap();
    let again = inst.goto(&parsed).unwrap();
    assert_eq!(again.value(), city.value());
}

#[test]
fn goto_restconf_route() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let route = ctx
        .parse_resource_id("/example-module:address-book/address=Root,Charlie/city")
        .unwrap();
    let city = inst.goto(&route).unwrap();
    assert_eq!(scalar(&city), ScalarValue::String("Bedrock".into()));
}

#[test]
fn peek_does_not_move() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let route = ctx
        .parse_instance_id("/example-module:address-book/address[2]/first")
        .unwrap();
    let value = inst.peek(&route).expect("peek failed");
    assert_eq!(
        value.as_scalar().unwrap(),
        &ScalarValue::String("Charlie".into())
    );
    assert!(inst.is_root());
}

struct DropAddressMembers;

impl OutputFilter for DropAddressMembers {
    fn begin_member(
        &self,
        parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &serde_json::Map<String, RawValue>,
    ) -> bool {
        parent.name() != "address"
    }

    fn end_member(
        &self,
        parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &serde_json::Map<String, RawValue>,
    ) -> bool {
        parent.name() != "address"
    }
}

#[test]
fn output_filter_drops_empty_entries() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let raw = inst.raw_value(&DropAddressMembers);
    // entries whose members were all filtered out do not appear
    assert_eq!(
        raw,
        json!({"example-module:address-book": {"address": []}})
    );
}

#[test]
fn metadata_round_trip() {
    let ctx = create_context();
    let raw = json!({
        "example-2:bag": {
            "baz": 7,
            "@baz": {"example-2:note": "tuned"}
        }
    });
    let inst = ctx.from_raw(&raw).unwrap();
    assert_eq!(inst.raw_value(&NoFilter), raw);
}

#[test]
fn annotation_errors() {
    let ctx = create_context();
    let missing_target = json!({"example-2:bag": {"@baz": {"example-2:note": "x"}}});
    match ctx.from_raw(&missing_target) {
        Err(Error::MissingAnnotationTarget { name, .. }) => assert_eq!(name, "baz"),
        other => panic!("expected MissingAnnotationTarget, got {:?}", other),
    }

    let unqualified = json!({"example-2:bag": {"baz": 7, "@baz": {"note": "x"}}});
    match ctx.from_raw(&unqualified) {
        Err(Error::UndefinedAnnotation { name, .. }) => assert_eq!(name, "note"),
        other => panic!("expected UndefinedAnnotation, got {:?}", other),
    }

    let structured = json!({"example-2:bag": {"baz": 7, "@baz": {"example-2:n": []}}});
    match ctx.from_raw(&structured) {
        Err(Error::AnnotationType { .. }) => (),
        other => panic!("expected AnnotationType, got {:?}", other),
    }
}

#[test]
fn xml_round_trip() {
    let ctx = create_context();
    let inst = ctx.from_raw_str(JSON_BOOK).unwrap();
    let xml = inst.to_xml_string(&NoFilter).expect("Failed to serialize XML");
    assert!(xml.starts_with("<content-data"));
    assert!(xml.contains("<address-book xmlns=\"urn:example:example-module\">"));
    assert!(xml.contains("<zipcode xmlns=\"urn:example:example-module-aug\">"));

    let again = ctx.from_xml_str(&xml).expect("Failed to cook XML");
    assert_eq!(
        again.raw_value(&NoFilter),
        serde_json::from_str::<RawValue>(JSON_BOOK).unwrap()
    );
}

#[test]
fn xml_identityref_declares_value_namespace() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({"t1:id-reference": "defs:type-b"})).unwrap();
    let xml = inst.to_xml_string(&NoFilter).unwrap();
    assert!(xml.contains("xmlns:defs=\"urn:example:defs\""));
    assert!(xml.contains(">defs:type-b<"));
}

#[test]
fn scalar_encodings() {
    let ctx = create_context();
    // 64-bit integers travel as strings, bits in position order
    let raw = json!({"example-2:bag": {"counter": "18446744073709551615",
                                       "flags": "b a"}});
    let inst = ctx.from_raw(&raw).unwrap();
    let bag = inst.member("example-2:bag").unwrap();
    assert_eq!(
        scalar(&bag.member("counter").unwrap()),
        ScalarValue::Uint64(u64::MAX)
    );
    assert_eq!(
        scalar(&bag.member("flags").unwrap()),
        ScalarValue::Bits(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(
        bag.raw_value(&NoFilter),
        json!({"counter": "18446744073709551615", "flags": "a b"})
    );
}

#[test]
fn update_keeps_schema() {
    let ctx = create_context();
    let inst = ctx.from_raw(&json!({"example-2:bag": {"baz": 3}})).unwrap();
    let baz = inst.member("example-2:bag").unwrap().member("baz").unwrap();
    let updated = baz.update(Value::Scalar(ScalarValue::Uint8(5)));
    assert_eq!(scalar(&updated), ScalarValue::Uint8(5));
    assert_eq!(
        updated.up().unwrap().raw_value(&NoFilter),
        json!({"baz": 5})
    );
}
