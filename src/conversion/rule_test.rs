//! Tests for conversion rule encoding

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

#[test]
fn test_rule_from_short_id() {
    let rule = ConversionRule::from_id("asd->qwe");
    assert_eq!(rule.from_version, "asd");
    assert_eq!(rule.to_version, "qwe");
}

#[test]
fn test_rule_from_qualified_id() {
    let rule = ConversionRule::from_id("unstable.example.com/asd->stable.example.com/qwe");
    assert_eq!(rule.from_version, "unstable.example.com/asd");
    assert_eq!(rule.to_version, "stable.example.com/qwe");
}

#[test]
fn test_rule_from_mixed_id() {
    let rule = ConversionRule::from_id("stable.example.com/asd->v1");
    assert_eq!(rule.from_version, "stable.example.com/asd");
    assert_eq!(rule.to_version, "v1");
}

#[test]
fn test_rule_splits_on_first_separator() {
    let rule = ConversionRule::from_id("a->b->c");
    assert_eq!(rule.from_version, "a");
    assert_eq!(rule.to_version, "b->c");
}

#[test]
fn test_rule_without_separator() {
    let rule = ConversionRule::from_id("v1");
    assert_eq!(rule.from_version, "v1");
    assert_eq!(rule.to_version, "");
}

#[test]
fn test_rule_display_survives_decoding() {
    let rules = [
        ConversionRule::new("v1", "v2"),
        ConversionRule::new("a.io/v1", "v2"),
        ConversionRule::new("v1", "b.io/v2"),
        ConversionRule::new("a.io/v1", "b.io/v2"),
    ];
    for rule in rules {
        assert_eq!(ConversionRule::from_id(&rule.to_string()), rule);
    }
}

#[test]
fn test_short_versions() {
    let rule = ConversionRule::new("a.io/v1alpha1", "v1");
    assert_eq!(rule.short_from_version(), "v1alpha1");
    assert_eq!(rule.short_to_version(), "v1");
}

#[test]
fn test_rule_deserializes_camel_case() {
    let rule: ConversionRule =
        serde_json::from_str(r#"{"fromVersion":"v1","toVersion":"v2"}"#).unwrap();
    assert_eq!(rule, ConversionRule::new("v1", "v2"));
}
