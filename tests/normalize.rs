use delivery_toolkit::normalize::{ListValue, is_list_literal, normalize, normalize_cell};

fn shapes() -> Vec<ListValue> {
    vec![
        ListValue::from(r#""foo", "bar""#),
        ListValue::from("foo"),
        ListValue::from("  spaced token  "),
        ListValue::from(vec!["foo".to_string(), "bar".to_string()]),
        ListValue::from(vec![" foo ".to_string(), "  bar".to_string()]),
        ListValue::from("['x', \"y\" ,'z']"),
    ]
}

#[test]
fn delimited_string() {
    assert_eq!(normalize(&ListValue::from(r#""foo", "bar""#)), vec!["foo", "bar"]);
}

#[test]
fn bare_string() {
    assert_eq!(normalize(&ListValue::from("foo")), vec!["foo"]);
}

#[test]
fn list_with_whitespace() {
    let value = ListValue::from(vec!["foo".to_string(), "  bar".to_string()]);
    assert_eq!(normalize(&value), vec!["foo", "bar"]);
}

#[test]
fn normalization_is_idempotent() {
    for shape in shapes() {
        let once = normalize(&shape);
        let twice = normalize(&ListValue::List(once.clone()));
        assert_eq!(once, twice, "shape {shape:?}");
    }
}

#[test]
fn empty_cell_is_empty_list() {
    assert!(normalize_cell("   ").is_empty());
}

#[test]
fn unquoted_commas_are_a_single_token() {
    assert_eq!(normalize_cell("a, b"), vec!["a, b"]);
    assert!(!is_list_literal("a, b"));
    assert!(is_list_literal(r#""a""#));
}

#[test]
fn deserializes_untagged() {
    let text: ListValue = serde_json::from_str(r#""\"a\", \"b\"""#).unwrap();
    let list: ListValue = serde_json::from_str(r#"["a", " b"]"#).unwrap();
    assert_eq!(normalize(&text), normalize(&list));
}
