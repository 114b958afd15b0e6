use std::path::PathBuf;

use yangtree::context::Context;
use yangtree::route::RouteItem;
use yangtree::schema::SchemaNodeKind;
use yangtree::types::ScalarValue;
use yangtree::Error;

static YANG_LIBRARY: &str = "./assets/yang-library.json";
static SEARCH_DIR: &str = "./assets/yang";

fn create_context() -> Context {
    Context::from_yang_library_file(YANG_LIBRARY, &[PathBuf::from(SEARCH_DIR)])
        .expect("Failed to create context")
}

#[test]
fn module_set_id() {
    let ctx = create_context();
    assert_eq!(ctx.module_set_id(), "b3e1");
}

#[test]
fn module_registry() {
    let ctx = create_context();
    assert_eq!(ctx.modules().count(), 7);

    let ex2 = ctx
        .get_module_implemented("example-2")
        .expect("Failed to look up module");
    assert_eq!(ex2.name(), "example-2");
    assert_eq!(ex2.prefix(), "ex2");
    assert_eq!(ex2.namespace(), Some("urn:example:example-2"));
    assert!(ex2.is_implemented());
    assert!(ex2.revision().is_none());

    let defs = ctx.get_module("defs", "").expect("Failed to look up module");
    assert!(!defs.is_implemented());

    let tm = ctx.get_module_latest("tm").expect("Failed to look up module");
    assert!(tm.feature_value("head-stay"));
    assert!(!ex2.feature_value("fancy"));
}

#[test]
fn schema_find_path() {
    let ctx = create_context();

    let baz = ctx
        .find_path("/example-2:bag/baz")
        .expect("Failed to lookup schema node");
    assert_eq!(baz.kind(), SchemaNodeKind::Leaf);
    assert_eq!(baz.name(), Some("baz"));
    assert_eq!(baz.namespace(), Some("example-2"));
    assert_eq!(baz.default_value_canonical(), Some("99"));
    assert_eq!(baz.default_value(), Some(ScalarValue::Uint8(99)));
    assert!(baz.config());
    assert!(!baz.mandatory());

    let bag = ctx
        .find_path("/example-2:bag")
        .expect("Failed to lookup schema node");
    assert_eq!(bag.kind(), SchemaNodeKind::Container);
    assert!(bag.is_np_container());
    assert_eq!(bag.data_path(), "/example-2:bag");

    let limits = ctx
        .find_path("/example-2:bag/limits")
        .expect("Failed to lookup schema node");
    assert!(!limits.is_np_container());
}

#[test]
fn schema_tree_iteration() {
    let ctx = create_context();
    let bag = ctx.find_path("/example-2:bag").unwrap();
    let names: Vec<_> = bag
        .data_children()
        .iter()
        .map(|snode| snode.name().unwrap().to_string())
        .collect();
    // choice members surface through the choice, feature-gated "secret"
    // is pruned
    assert_eq!(
        names,
        vec!["baz", "volume", "mood", "flags", "tags", "counter", "text", "markup", "limits"]
    );

    let baz = ctx.find_path("/example-2:bag/baz").unwrap();
    let ancestors: Vec<_> = baz
        .ancestors()
        .filter_map(|snode| snode.name().map(str::to_string))
        .collect();
    assert_eq!(ancestors, vec!["bag"]);
}

#[test]
fn feature_pruning() {
    let ctx = create_context();
    match ctx.find_path("/example-2:bag/secret") {
        Err(Error::NonexistentSchemaNode { .. }) => (),
        other => panic!("expected NonexistentSchemaNode, got {:?}", other),
    }
}

#[test]
fn grouping_expansion_and_augment() {
    let ctx = create_context();

    // "uses person" expands inside the list
    let city = ctx
        .find_path("/example-module:address-book/address/city")
        .expect("Failed to lookup schema node");
    assert_eq!(city.kind(), SchemaNodeKind::Leaf);
    assert_eq!(city.namespace(), Some("example-module"));

    // the augment from example-module-aug grafts "zipcode"
    let zipcode = ctx
        .find_path("/example-module:address-book/address/example-module-aug:zipcode")
        .expect("Failed to lookup schema node");
    assert_eq!(zipcode.namespace(), Some("example-module-aug"));
    assert_eq!(zipcode.iname(), "example-module-aug:zipcode");
}

#[test]
fn list_properties() {
    let ctx = create_context();
    let address = ctx
        .find_path("/example-module:address-book/address")
        .expect("Failed to lookup schema node");
    assert_eq!(address.kind(), SchemaNodeKind::List);
    assert_eq!(
        address.list_keys_qnames(),
        &[
            ("last".to_string(), "example-module".to_string()),
            ("first".to_string(), "example-module".to_string()),
        ]
    );
    let keys: Vec<_> = address
        .list_keys()
        .map(|snode| snode.name().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["last", "first"]);
    // key leaves are implicitly mandatory
    assert!(address.list_keys().all(|snode| snode.mandatory()));
    assert!(address.min_elements().is_none());
    assert!(address.max_elements().is_none());
    assert!(!address.is_user_ordered());
}

#[test]
fn choice_default_case() {
    let ctx = create_context();
    let bag = ctx.find_path("/example-2:bag").unwrap();
    let choice = bag
        .children()
        .find(|snode| snode.kind() == SchemaNodeKind::Choice)
        .expect("Failed to find choice node");
    assert_eq!(choice.name(), Some("payload"));
    assert_eq!(
        choice.default_case(),
        Some(&("plain".to_string(), "example-2".to_string()))
    );
}

#[test]
fn submodule_typedef() {
    let ctx = create_context();
    let volume = ctx.find_path("/example-2:bag/volume").unwrap();
    let dtype = volume.leaf_type().expect("leaf has a type");
    // "gain" comes from the submodule and narrows uint8 to 0..11
    assert!(dtype.parse_canonical("7", "example-2").is_some());
    let cooked = dtype.parse_canonical("12", "example-2").unwrap();
    assert!(dtype.check(&cooked).is_err());
}

#[test]
fn enumeration_values() {
    let ctx = create_context();
    let mood = ctx.find_path("/example-2:bag/mood").unwrap();
    let dtype = mood.leaf_type().unwrap();
    assert_eq!(dtype.enum_value("calm"), Some(1));
    assert_eq!(dtype.enum_value("wild"), Some(2));
    assert_eq!(dtype.enum_value("grumpy"), None);
}

#[test]
fn feature_expressions() {
    let ctx = create_context();
    // operator precedence is not > and > or, parentheses override
    assert!(!ctx
        .feature_expr("(head-stay or not tm:head-stay) and not tm:head-stay", "tm")
        .unwrap());
    assert!(ctx
        .feature_expr("head-stay or not tm:head-stay and not tm:head-stay", "tm")
        .unwrap());
    assert!(ctx.feature_expr("head-stay", "tm").unwrap());
    assert!(!ctx.feature_expr("fancy", "example-2").unwrap());
    assert!(ctx.feature_expr("not fancy", "example-2").unwrap());
    assert!(ctx.feature_expr("not (fancy and fancy)", "example-2").unwrap());
    assert!(ctx.feature_expr("bogus or", "tm").is_err());
}

#[test]
fn rpc_and_action_nodes() {
    let ctx = create_context();
    let rpcs = ctx.find_path("/testc:rpcs").unwrap();
    let rpcb = rpcs
        .children()
        .find(|snode| snode.kind() == SchemaNodeKind::RpcAction)
        .expect("Failed to find action node");
    assert_eq!(rpcb.name(), Some("rpcB"));
    assert_eq!(rpcb.data_path(), "/testc:rpcs/rpcB");
    let kinds: Vec<_> = rpcb.children().map(|snode| snode.kind()).collect();
    assert_eq!(kinds, vec![SchemaNodeKind::Input, SchemaNodeKind::Output]);
}

#[test]
fn restconf_action_resource() {
    let ctx = create_context();
    let route = ctx
        .parse_resource_id("/testc:rpcs/rpcB")
        .expect("Failed to parse resource id");
    match route.0.last() {
        Some(RouteItem::ActionName { name, .. }) => assert_eq!(name, "rpcB"),
        other => panic!("expected ActionName, got {:?}", other),
    }
    // action nodes are not data nodes
    assert!(route.data_path().is_empty());
}

#[test]
fn restconf_list_resource() {
    let ctx = create_context();
    let route = ctx
        .parse_resource_id("/example-module:address-book/address=Root,Charlie/city")
        .expect("Failed to parse resource id");
    assert_eq!(route.0.len(), 4);
    match &route.0[2] {
        RouteItem::EntryKeys(keys) => {
            assert_eq!(keys[0].0 .0, "last");
            assert_eq!(keys[0].1, "Root");
            assert_eq!(keys[1].0 .0, "first");
            assert_eq!(keys[1].1, "Charlie");
        }
        other => panic!("expected EntryKeys, got {:?}", other),
    }
}

#[test]
fn ascii_tree() {
    let ctx = create_context();
    let tree = ctx.ascii_tree();
    assert!(tree.contains("+--rw bag"));
    assert!(tree.contains("+--rw baz?"));
    assert!(tree.contains("+--ro counter?"));
    assert!(tree.contains("+--rw address*"));
}

#[test]
fn bad_library_data() {
    match Context::from_yang_library_str("{}", &[PathBuf::from(SEARCH_DIR)]) {
        Err(Error::BadYangLibraryData { .. }) => (),
        other => panic!("expected BadYangLibraryData, got {:?}", other),
    }
}

#[test]
fn multiple_implemented_revisions() {
    let library = r#"{
      "ietf-yang-library:modules-state": {
        "module-set-id": "x",
        "module": [
          {"name": "tm", "revision": "", "namespace": "urn:example:tm",
           "conformance-type": "implement"},
          {"name": "tm", "revision": "2020-01-01", "namespace": "urn:example:tm",
           "conformance-type": "implement"}
        ]
      }
    }"#;
    match Context::from_yang_library_str(library, &[PathBuf::from(SEARCH_DIR)]) {
        Err(Error::MultipleImplementedRevisions { name }) => assert_eq!(name, "tm"),
        other => panic!("expected MultipleImplementedRevisions, got {:?}", other),
    }
}

#[test]
fn missing_module() {
    let library = r#"{
      "ietf-yang-library:modules-state": {
        "module-set-id": "x",
        "module": [
          {"name": "no-such-module", "revision": "",
           "namespace": "urn:example:nope", "conformance-type": "implement"}
        ]
      }
    }"#;
    match Context::from_yang_library_str(library, &[PathBuf::from(SEARCH_DIR)]) {
        Err(Error::ModuleNotFound { name, .. }) => assert_eq!(name, "no-such-module"),
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }
}
