//! Override filter for candidate runs
//!
//! Baseline results are ground truth and pass through untouched. For the
//! candidate, a failing result is moved to the section's suppressed list
//! when every field of an override scope matches it exactly. No substring
//! or category matching: an override for `logo` never touches `navLinks`.

use tracing::debug;

use uiparity_common::{ImplementationId, Override, OverrideRegistry, SectionResult, SuppressedFailure, ValidationResult};

/// Whether `entry` covers the failing `result`.
///
/// Every field the scope sets must match; a scope naming neither a role
/// nor a selector covers nothing.
pub fn covers(entry: &Override, result: &ValidationResult) -> bool {
    let scope = &entry.scope;
    if scope.role.is_none() && scope.selector.is_none() {
        return false;
    }
    if let Some(role) = &scope.role {
        if *role != result.role {
            return false;
        }
    }
    if let Some(selector) = &scope.selector {
        if result.selector.as_deref() != Some(selector.as_str()) {
            return false;
        }
    }
    if let Some(check) = &scope.check {
        if *check != result.check {
            return false;
        }
    }
    if let Some(viewport) = &scope.viewport {
        if result.viewport.as_deref() != Some(viewport.as_str()) {
            return false;
        }
    }
    true
}

/// Suppress covered failures in `section` when validating the candidate
pub fn apply_overrides(
    section: &mut SectionResult,
    registry: &OverrideRegistry,
    implementation: ImplementationId,
) {
    if implementation != ImplementationId::Candidate || registry.is_empty() {
        return;
    }

    let results = std::mem::take(&mut section.results);
    for result in results {
        if result.passed {
            section.results.push(result);
            continue;
        }
        match registry.iter().find(|entry| covers(entry, &result)) {
            Some(entry) => {
                debug!(
                    "[{}] suppressed {}.{}, see override {}",
                    section.name, result.role, result.check, entry.id
                );
                section.suppressed.push(SuppressedFailure {
                    override_id: entry.id.clone(),
                    result,
                });
            }
            None => section.results.push(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uiparity_common::{FailureKind, OverrideCategory, OverrideScope, Role};

    fn entry(id: &str, scope: OverrideScope) -> Override {
        Override {
            id: id.to_string(),
            category: OverrideCategory::Markup,
            scope,
            description: format!("{} is intentional", id),
        }
    }

    fn role_scope(role: &str) -> OverrideScope {
        OverrideScope {
            role: Some(Role::from(role)),
            ..Default::default()
        }
    }

    fn failure(role: &str, check: &str) -> ValidationResult {
        ValidationResult::fail(
            &Role::from(role),
            check,
            FailureKind::PropertyMismatch,
            format!("{}.{}: expected \"a\", got \"b\"", role, check),
        )
    }

    fn section() -> SectionResult {
        let mut section = SectionResult::new("header");
        section.push(failure("logo", "width"));
        section.push(failure("logo", "height"));
        section.push(failure("navLinks", "color"));
        section.push(failure("ctaButton", "backgroundColor"));
        section.push(ValidationResult::pass(&Role::from("heroTitle"), "fontSize", "ok"));
        section
    }

    #[test]
    fn test_baseline_is_never_filtered() {
        let registry = OverrideRegistry::new(vec![entry("logo-svg", role_scope("logo"))]);
        let mut section = section();
        apply_overrides(&mut section, &registry, ImplementationId::Baseline);
        assert_eq!(section.failed(), 4);
        assert!(section.suppressed.is_empty());
    }

    #[test]
    fn test_precision_n_minus_k() {
        let registry = OverrideRegistry::new(vec![
            entry("logo-width", OverrideScope { check: Some("width".into()), ..role_scope("logo") }),
            entry("cta-color", role_scope("ctaButton")),
            entry("unrelated", role_scope("footerLinks")),
        ]);
        let original = section();
        let untouched: Vec<_> = original
            .failures()
            .filter(|r| !(r.role.as_str() == "logo" && r.check == "width") && r.role.as_str() != "ctaButton")
            .cloned()
            .collect();

        let mut filtered = original.clone();
        apply_overrides(&mut filtered, &registry, ImplementationId::Candidate);

        assert_eq!(filtered.failed(), original.failed() - 2);
        assert_eq!(filtered.failures().cloned().collect::<Vec<_>>(), untouched);
        assert_eq!(filtered.tested(), original.tested());
        let ids: Vec<_> = filtered.suppressed.iter().map(|s| s.override_id.as_str()).collect();
        assert_eq!(ids, vec!["logo-width", "cta-color"]);
    }

    #[test]
    fn test_role_scope_is_exact() {
        let registry = OverrideRegistry::new(vec![entry("nav", role_scope("nav"))]);
        let mut section = section();
        apply_overrides(&mut section, &registry, ImplementationId::Candidate);
        assert_eq!(section.failed(), 4);
    }

    #[test]
    fn test_selector_scope() {
        let scope = OverrideScope {
            selector: Some("header svg.logo".into()),
            ..Default::default()
        };
        let registry = OverrideRegistry::new(vec![entry("svg-logo", scope)]);
        let mut section = SectionResult::new("header");
        section.push(failure("logo", "width").with_selector("header svg.logo"));
        section.push(failure("logo", "height").with_selector(".site-logo img"));
        apply_overrides(&mut section, &registry, ImplementationId::Candidate);
        assert_eq!(section.failed(), 1);
        assert_eq!(section.suppressed.len(), 1);
    }

    #[test]
    fn test_role_and_selector_must_both_match() {
        let scope = OverrideScope {
            selector: Some(".site-logo img".into()),
            ..role_scope("logo")
        };
        let registry = OverrideRegistry::new(vec![entry("logo-img", scope)]);
        let mut section = SectionResult::new("hero");
        section.push(failure("heroImage", "width").with_selector(".site-logo img"));
        section.push(failure("logo", "width").with_selector("header svg.logo"));
        section.push(failure("logo", "height"));
        apply_overrides(&mut section, &registry, ImplementationId::Candidate);
        assert_eq!(section.failed(), 3);
        assert!(section.suppressed.is_empty());

        section.push(failure("logo", "width").with_selector(".site-logo img"));
        apply_overrides(&mut section, &registry, ImplementationId::Candidate);
        assert_eq!(section.failed(), 3);
        assert_eq!(section.suppressed.len(), 1);
    }

    #[test]
    fn test_viewport_scope() {
        let scope = OverrideScope {
            viewport: Some("mobile".into()),
            ..role_scope("heroTitle")
        };
        let registry = OverrideRegistry::new(vec![entry("mobile-hero", scope)]);
        let mut section = SectionResult::new("responsive");
        section.push(failure("heroTitle", "fontSize").with_viewport("mobile"));
        section.push(failure("heroTitle", "fontSize").with_viewport("tablet"));
        apply_overrides(&mut section, &registry, ImplementationId::Candidate);
        assert_eq!(section.failed(), 1);
        assert_eq!(section.failures().next().unwrap().viewport.as_deref(), Some("tablet"));
    }
}
