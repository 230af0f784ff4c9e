use scim2_sdk as scim;

use scim::{DocumentEngine, PatchOperation, PatchOptions, PatchRequest, Path, ScimError};
use serde_json::{json, Value};

const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

fn emails() -> Value {
    json!({
        "emails": [
            {"type": "work", "value": "w@x.com"},
            {"type": "home", "value": "h@x.com"}
        ]
    })
}

fn patch(body: Value) -> PatchRequest {
    serde_json::from_value(body).unwrap()
}

fn path(s: &str) -> Path {
    s.parse().unwrap()
}

#[test]
fn empty_array_replace_deletes_the_attribute() {
    let mut doc = json!({"emails": [{"value": "a@x.com"}, {"value": "b@x.com"}], "userName": "a"});
    scim::replace_value(&path("emails"), &mut doc, json!([])).unwrap();
    assert_eq!(doc, json!({"userName": "a"}));
}

#[test]
fn empty_array_replace_through_filter_removes_matches() {
    let mut doc = emails();
    let n = scim::replace_value(&path(r#"emails[type eq "work"]"#), &mut doc, json!([])).unwrap();
    assert_eq!(n, 1);
    assert_eq!(doc, json!({"emails": [{"type": "home", "value": "h@x.com"}]}));
}

#[test]
fn value_filter_replace_changes_only_matches() {
    let mut doc = emails();
    scim::replace_value(&path(r#"emails[type eq "work"].value"#), &mut doc, json!("new@x.com")).unwrap();
    assert_eq!(
        doc,
        json!({
            "emails": [
                {"type": "work", "value": "new@x.com"},
                {"type": "home", "value": "h@x.com"}
            ]
        })
    );
}

#[test]
fn remove_is_reported_once() {
    let mut doc = emails();
    let p = path(r#"emails[type eq "home"]"#);
    let removed = scim::remove_values(&p, &mut doc).unwrap();
    assert_eq!(removed, vec![json!({"type": "home", "value": "h@x.com"})]);
    let after_first = doc.clone();
    let err = scim::remove_values(&p, &mut doc).unwrap_err();
    assert!(err.is_no_target());
    assert_eq!(err.scim_type(), "noTarget");
    assert_eq!(doc, after_first);
}

#[test]
fn removing_every_value_deletes_the_key() {
    let mut doc = emails();
    scim::remove_values(&path(r#"emails[type pr]"#), &mut doc).unwrap();
    assert_eq!(doc, json!({}));
}

#[test]
fn operations_apply_in_order() {
    let mut doc = json!({"a": 0});
    let req = patch(json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
        "Operations": [
            {"op": "remove", "path": "a"},
            {"op": "add", "path": "a", "value": 1}
        ]
    }));
    req.apply(&mut doc).unwrap();
    assert_eq!(doc, json!({"a": 1}));

    let mut doc = json!({"a": 0});
    let reversed = PatchRequest::new(req.operations.iter().rev().cloned().collect());
    reversed.apply(&mut doc).unwrap();
    assert_eq!(doc, json!({}));
}

#[test]
fn failure_reports_index_and_path_without_rollback() {
    let mut doc = json!({"userName": "a", "title": "x"});
    let req = patch(json!({
        "Operations": [
            {"op": "replace", "path": "userName", "value": "b"},
            {"op": "remove", "path": "nickName"},
            {"op": "remove", "path": "title"}
        ]
    }));
    let err = req.apply(&mut doc).unwrap_err();
    match &err {
        ScimError::Operation { index, op, path, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(*op, "remove");
            assert_eq!(path, "nickName");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(err.scim_type(), "noTarget");
    assert_eq!(doc, json!({"userName": "b", "title": "x"}));
}

#[test]
fn atomic_apply_keeps_document_on_failure() {
    let mut doc = json!({"userName": "a"});
    let req = patch(json!({
        "Operations": [
            {"op": "replace", "path": "userName", "value": "b"},
            {"op": "add", "path": "userName[value eq \"x\"].y", "value": 1}
        ]
    }));
    let err = req
        .apply_atomically(&mut doc, &DocumentEngine::new(), &PatchOptions::default())
        .unwrap_err();
    assert_eq!(err.scim_type(), "invalidPath");
    assert_eq!(doc, json!({"userName": "a"}));
}

#[test]
fn ignore_no_target_skips_empty_matches() {
    let mut doc = json!({"userName": "a"});
    let req = patch(json!({
        "Operations": [
            {"op": "remove", "path": "nickName"},
            {"op": "replace", "path": "emails[type eq \"work\"].value", "value": "x"},
            {"op": "add", "path": "title", "value": "t"}
        ]
    }));
    let opts = PatchOptions {
        ignore_no_target: true,
        ..PatchOptions::default()
    };
    req.apply_with(&mut doc, &DocumentEngine::new(), &opts).unwrap();
    assert_eq!(doc, json!({"userName": "a", "title": "t"}));

    let mut doc = json!({"userName": "a"});
    let nested = patch(json!({
        "Operations": [
            {"op": "replace", "path": "x.emails[type eq \"work\"].value", "value": "w"},
            {"op": "add", "path": "name.nicks[value eq \"x\"]", "value": "y"}
        ]
    }));
    nested.apply_with(&mut doc, &DocumentEngine::new(), &opts).unwrap();
    assert_eq!(doc, json!({"userName": "a"}));
}

#[test]
fn add_matching_nothing_leaves_document_unchanged() {
    let mut doc = json!({"userName": "a", "emails": [{"type": "home", "value": "h@x.com"}]});
    let before = doc.clone();
    for target in [
        r#"emails[type eq "work"].display"#,
        r#"name.nicks[value eq "x"]"#,
        r#"urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.ids[value eq "1"]"#,
    ] {
        let n = scim::add_value(&path(target), &mut doc, json!("v")).unwrap();
        assert_eq!(n, 0, "{target}");
        assert_eq!(doc, before, "{target}");
    }
}

#[test]
fn failed_nested_operation_leaves_document_unchanged() {
    let mut doc = json!({"userName": "a", "emails": []});
    let before = doc.clone();
    let failing = [
        json!({"op": "replace", "path": "x.emails[type eq \"work\"].value", "value": "w"}),
        json!({"op": "replace", "path": "name.emails[type eq \"work\"]", "value": []}),
        json!({"op": "remove", "path": "emails[type eq \"work\"]"}),
        json!({"op": "replace", "path": "emails[type eq \"work\"]", "value": []}),
    ];
    for op in failing {
        let req = patch(json!({"Operations": [op.clone()]}));
        let err = req.apply(&mut doc).unwrap_err();
        assert_eq!(err.scim_type(), "noTarget", "{op}");
        assert_eq!(doc, before, "{op}");
    }
}

#[test]
fn root_add_and_replace() {
    let mut doc = json!({"emails": [{"value": "a"}], "name": {"givenName": "B"}});
    let req = patch(json!({
        "Operations": [
            {"op": "add", "value": {"emails": [{"value": "b"}], "name": {"familyName": "J"}}},
            {"op": "replace", "value": {"nickName": "bj", "name": {"formatted": "B J"}}}
        ]
    }));
    req.apply(&mut doc).unwrap();
    assert_eq!(
        doc,
        json!({
            "emails": [{"value": "a"}, {"value": "b"}],
            "name": {"formatted": "B J"},
            "nickName": "bj"
        })
    );
}

#[test]
fn root_value_must_be_an_object() {
    let err = serde_json::from_value::<PatchRequest>(json!({
        "Operations": [{"op": "add", "value": "x"}]
    }))
    .unwrap_err();
    assert!(err.to_string().contains("JSON object"), "{err}");
}

#[test]
fn extension_writes_register_schema() {
    let mut doc = json!({"schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"]});
    let req = PatchRequest::new(vec![
        PatchOperation::add(Some(path(&format!("{ENTERPRISE}:employeeNumber"))), json!("42")).unwrap(),
    ]);
    req.apply(&mut doc).unwrap();
    assert_eq!(
        doc,
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User", ENTERPRISE],
            ENTERPRISE: {"employeeNumber": "42"}
        })
    );

    let mut plain = json!({"schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"]});
    let opts = PatchOptions {
        update_schemas: false,
        ..PatchOptions::default()
    };
    req.apply_with(&mut plain, &DocumentEngine::new(), &opts).unwrap();
    assert_eq!(plain["schemas"], json!(["urn:ietf:params:scim:schemas:core:2.0:User"]));
}

#[test]
fn removing_last_extension_attribute_prunes_namespace() {
    let mut doc = json!({ENTERPRISE: {"costCenter": "1"}, "userName": "a"});
    scim::remove_values(&path(&format!("{ENTERPRISE}:costCenter")), &mut doc).unwrap();
    assert_eq!(doc, json!({"userName": "a"}));
}

#[test]
fn group_member_removal_by_value_list() {
    let mut group = json!({
        "displayName": "Admins",
        "members": [{"value": "1"}, {"value": "2"}, {"value": "3"}]
    });
    let req = patch(json!({
        "Operations": [{"op": "Remove", "path": "members", "value": [{"value": "1"}, {"value": "3"}]}]
    }));
    req.apply(&mut group).unwrap();
    assert_eq!(group, json!({"displayName": "Admins", "members": [{"value": "2"}]}));
}

#[test]
fn add_through_filter_merges_into_matches() {
    let mut doc = emails();
    let req = patch(json!({
        "Operations": [{"op": "add", "path": "emails[type eq \"work\"]", "value": {"primary": true}}]
    }));
    req.apply(&mut doc).unwrap();
    assert_eq!(doc["emails"][0], json!({"type": "work", "value": "w@x.com", "primary": true}));
    assert_eq!(doc["emails"][1], json!({"type": "home", "value": "h@x.com"}));
}
