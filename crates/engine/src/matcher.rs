//! Expectation matching
//!
//! One exhaustive function decides every verdict. It is pure: the same
//! value and expectation always give the same answer.

use std::collections::BTreeMap;

use uiparity_common::{Expectation, FailureKind, Role, ValidationResult};

use crate::extractor::PropertySet;

/// Whether `actual` satisfies `expectation`
pub fn satisfies(expectation: &Expectation, actual: &str) -> bool {
    match expectation {
        Expectation::Literal(expected) => actual == expected,
        Expectation::Pattern(pattern) => pattern.is_match(actual),
        Expectation::OneOf(accepted) => accepted.contains(actual),
    }
}

/// Match one captured value for `role`. `actual` is `None` when nothing
/// informative was captured, which never satisfies an expectation.
pub fn match_value(
    role: &Role,
    check: &str,
    actual: Option<&str>,
    expectation: &Expectation,
) -> ValidationResult {
    match actual {
        Some(value) if satisfies(expectation, value) => {
            ValidationResult::pass(role, check, format!("{}.{} = {:?}", role, check, value))
        }
        Some(value) => ValidationResult::fail(
            role,
            check,
            FailureKind::PropertyMismatch,
            format!("{}.{}: expected {}, got {:?}", role, check, expectation, value),
        ),
        None => ValidationResult::fail(
            role,
            check,
            FailureKind::PropertyMismatch,
            format!("{}.{}: expected {}, got no value", role, check, expectation),
        ),
    }
}

/// Match every expected property against a captured set
pub fn match_properties(
    set: &PropertySet,
    expectations: &BTreeMap<String, Expectation>,
) -> Vec<ValidationResult> {
    expectations
        .iter()
        .map(|(property, expectation)| {
            match_value(&set.role, property, set.get(property), expectation).with_selector(&set.selector)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn pattern(source: &str) -> Expectation {
        Expectation::pattern(source).unwrap()
    }

    #[test_case(Expectation::literal("rgb(255, 220, 97)"), "rgb(255, 220, 97)", true ; "literal equal")]
    #[test_case(Expectation::literal("rgb(255, 220, 97)"), "rgb(255, 220, 98)", false ; "literal off by one")]
    #[test_case(Expectation::literal("700"), "700 ", false ; "literal is exact")]
    #[test_case(pattern("^(48|60)px$"), "60px", true ; "pattern accepts")]
    #[test_case(pattern("^(48|60)px$"), "44px", false ; "pattern rejects")]
    #[test_case(pattern("px"), "16px", true ; "pattern is unanchored")]
    #[test_case(Expectation::one_of(["rgb(0, 0, 0)", "oklch(0 0 0)"]), "oklch(0 0 0)", true ; "set member")]
    #[test_case(Expectation::one_of(["block", "flex"]), "grid", false ; "set non member")]
    fn test_satisfies(expectation: Expectation, actual: &str, expected: bool) {
        assert_eq!(satisfies(&expectation, actual), expected);
    }

    #[test]
    fn test_literal_mismatch_message_has_both_values() {
        let result = match_value(
            &Role::from("ctaButton"),
            "backgroundColor",
            Some("rgb(255, 220, 98)"),
            &Expectation::literal("rgb(255, 220, 97)"),
        );
        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::PropertyMismatch));
        assert!(result.message.contains("ctaButton"));
        assert!(result.message.contains("backgroundColor"));
        assert!(result.message.contains("rgb(255, 220, 97)"));
        assert!(result.message.contains("rgb(255, 220, 98)"));
    }

    #[test]
    fn test_pattern_scenario() {
        let role = Role::from("heroTitle");
        let expectation = pattern("^(48|60)px$");
        assert!(match_value(&role, "fontSize", Some("60px"), &expectation).passed);

        let failed = match_value(&role, "fontSize", Some("44px"), &expectation);
        assert!(!failed.passed);
        assert_eq!(failed.message, "heroTitle.fontSize: expected /^(48|60)px$/, got \"44px\"");
    }

    #[test]
    fn test_missing_value_fails() {
        let result = match_value(&Role::from("logo"), "width", None, &Expectation::literal("120px"));
        assert!(!result.passed);
        assert!(result.message.contains("got no value"));
    }

    #[test]
    fn test_match_is_deterministic() {
        let role = Role::from("heroTitle");
        let expectation = Expectation::one_of(["48px", "60px"]);
        let first = match_value(&role, "fontSize", Some("48px"), &expectation);
        for _ in 0..10 {
            assert_eq!(match_value(&role, "fontSize", Some("48px"), &expectation), first);
        }
    }

    #[test]
    fn test_match_properties_tags_selector() {
        let mut values = BTreeMap::new();
        values.insert("color".to_string(), "rgb(17, 17, 17)".to_string());
        let set = PropertySet {
            role: Role::from("heroTitle"),
            selector: "h1.hero-title".to_string(),
            values,
        };
        let mut expectations = BTreeMap::new();
        expectations.insert("color".to_string(), Expectation::literal("rgb(17, 17, 17)"));
        expectations.insert("fontWeight".to_string(), Expectation::literal("700"));

        let results = match_properties(&set, &expectations);
        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results.iter().all(|r| r.selector.as_deref() == Some("h1.hero-title")));
    }
}
