use scim2_sdk as scim;

use proptest::prelude::*;
use scim::{Filter, ParseError, ParserOptions, Path};

const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

#[test]
fn invalid_paths_are_rejected_with_offsets() {
    let cases: &[(&str, usize)] = &[
        (".", 0),
        ("attr.", 5),
        ("urn:attr", 3),
        ("attr[].", 4),
        ("emails[type eq \"work\"", 6),
        ("na me", 2),
        ("emails[type eq \"work\"]x", 22),
        ("a..b", 2),
    ];
    for (input, offset) in cases {
        let err = input.parse::<Path>().unwrap_err();
        assert!(matches!(err, ParseError::Path { .. }), "{input}: {err}");
        assert_eq!(err.offset(), *offset, "offset for {input:?}: {err}");
    }
}

#[test]
fn filter_errors_inside_paths_are_path_errors() {
    let err = r#"emails[type eq]"#.parse::<Path>().unwrap_err();
    assert!(matches!(err, ParseError::Path { .. }));
    assert_eq!(err.offset(), 14);

    let err = r#"emails[type[value eq 1] eq 2]"#.parse::<Path>().unwrap_err();
    assert!(matches!(err, ParseError::Path { .. }));
}

#[test]
fn canonical_paths_round_trip() {
    let cases = [
        "",
        "userName",
        "name.familyName",
        r#"emails[type eq "work"].value"#,
        r#"members[value eq "2819c223"]"#,
        r#"emails[type eq "work" and not (primary eq true)]"#,
        r#"addresses[(type eq "home" or type eq "work") and primary pr].streetAddress"#,
    ];
    for text in cases {
        let path: Path = text.parse().unwrap();
        assert_eq!(path.to_string(), text);
    }
    let manager = format!("{ENTERPRISE}:manager.value");
    assert_eq!(manager.parse::<Path>().unwrap().to_string(), manager);
}

#[test]
fn parsing_normalises_whitespace_in_filters() {
    let path: Path = r#"emails[ type  eq "work" ]"#.parse().unwrap();
    assert_eq!(path.to_string(), r#"emails[type eq "work"]"#);
}

#[test]
fn urn_colons_inside_filters_belong_to_the_filter() {
    let path: Path = r#"emails[value eq "urn:x:y"]"#.parse().unwrap();
    assert_eq!(path.schema_urn(), None);
    let path: Path = format!(r#"{ENTERPRISE}:manager[value eq "a:b"].displayName"#)
        .parse()
        .unwrap();
    assert_eq!(path.schema_urn(), Some(ENTERPRISE));
    assert_eq!(path.len(), 2);
}

#[test]
fn builder_matches_parser() {
    let built = Path::attribute("emails")
        .sub_filtered("x", Filter::pr(Path::attribute("y")))
        .parent()
        .unwrap()
        .sub_filtered("members", Filter::eq(Path::attribute("value"), "1"));
    let parsed: Path = r#"emails.members[value eq "1"]"#.parse().unwrap();
    assert_eq!(built, parsed);
}

#[test]
fn extended_characters() {
    assert!("a;b".parse::<Path>().is_err());
    let opts = ParserOptions::default().allow_chars([';']);
    assert_eq!(Path::parse("a;b.c", &opts).unwrap().len(), 2);
}

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "pr", "eq", "ne", "co", "sw", "ew", "gt", "ge", "lt", "le", "true", "false", "null",
];

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,8}".prop_filter("keyword", |n| !KEYWORDS.contains(&n.to_ascii_lowercase().as_str()))
}

fn filter() -> impl Strategy<Value = Filter> {
    let leaf = prop_oneof![
        (name(), "[a-z0-9 ]{0,6}").prop_map(|(n, v)| Filter::eq(Path::attribute(n), v)),
        (name(), any::<i32>()).prop_map(|(n, v)| Filter::gt(Path::attribute(n), v)),
        name().prop_map(|n| Filter::pr(Path::attribute(n))),
        (name(), any::<bool>()).prop_map(|(n, v)| Filter::ne(Path::attribute(n), v)),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Filter::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Filter::or(l, r)),
            inner.prop_map(Filter::not),
        ]
    })
}

fn path() -> impl Strategy<Value = Path> {
    (
        proptest::option::of(Just(ENTERPRISE.to_string())),
        prop::collection::vec((name(), proptest::option::of(filter())), 1..4),
    )
        .prop_map(|(urn, elements)| {
            let start = match urn {
                Some(urn) => Path::with_schema(urn),
                None => Path::root(),
            };
            elements.into_iter().fold(start, |p, (n, f)| match f {
                Some(f) => p.sub_filtered(n, f),
                None => p.sub(n),
            })
        })
}

proptest! {
    #[test]
    fn rendered_paths_parse_back(path in path()) {
        let text = path.to_string();
        let parsed: Path = text.parse().map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        prop_assert_eq!(parsed, path);
    }
}
