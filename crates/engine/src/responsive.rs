//! Responsive variation runner
//!
//! Re-extracts a handful of roles at each named viewport and folds the
//! viewport-tagged results into one section.

use std::collections::BTreeMap;
use tracing::debug;

use uiparity_common::{Expectation, FailureKind, ResponsiveCheck, ResponsivePlan, SectionResult, ValidationResult};

use crate::context::RunContext;
use crate::error::HarnessResult;
use crate::extractor::{extract, ExtractError};
use crate::matcher::match_properties;
use crate::resolver::Resolution;

/// Run every responsive check, visiting viewports in configured order, and
/// leave the page at the run's viewport
pub async fn run_responsive(ctx: &RunContext<'_>, plan: &ResponsivePlan) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(&plan.section);

    let mut selectors = BTreeMap::new();
    for check in &plan.checks {
        match ctx.resolve(&check.role)? {
            Resolution::Selector(selector) => {
                selectors.insert(check.role.clone(), selector);
            }
            Resolution::NotApplicable => {
                if !section.skipped.contains(&check.role) {
                    section.skipped.push(check.role.clone());
                }
            }
        }
    }

    for viewport in ctx.viewports {
        let due: Vec<_> = plan
            .checks
            .iter()
            .filter_map(|check| {
                let expectations = check.viewports.get(&viewport.name)?;
                let selector = selectors.get(&check.role)?;
                Some((check, selector, expectations))
            })
            .collect();
        if due.is_empty() {
            continue;
        }

        debug!("[{}] responsive pass at {}", ctx.implementation, viewport);
        ctx.session.set_viewport(viewport).await?;
        for (check, selector, expectations) in due {
            let results = check_at_viewport(ctx, check, selector, expectations).await;
            match results {
                Ok(results) => {
                    for result in results {
                        section.push(result.with_viewport(viewport.name.clone()));
                    }
                }
                Err(e) => {
                    ctx.session.set_viewport(ctx.viewport).await?;
                    return Err(e);
                }
            }
        }
    }

    ctx.session.set_viewport(ctx.viewport).await?;
    Ok(section)
}

async fn check_at_viewport(
    ctx: &RunContext<'_>,
    check: &ResponsiveCheck,
    selector: &str,
    expectations: &BTreeMap<String, Expectation>,
) -> HarnessResult<Vec<ValidationResult>> {
    let properties: Vec<&str> = expectations.keys().map(String::as_str).collect();
    match extract(ctx.session, &check.role, selector, &properties, ctx.timeouts.selector()).await {
        Ok(set) => Ok(match_properties(&set, expectations)),
        Err(ExtractError::ElementNotFound { selector, .. }) => Ok(vec![ValidationResult::fail(
            &check.role,
            "presence",
            FailureKind::ElementNotFound,
            format!("{}: no element matches '{}'", check.role, selector),
        )
        .with_selector(selector)]),
        Err(ExtractError::Session(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Fixture;
    use crate::memory::{MemoryElement, MemoryPage};
    use uiparity_common::{ImplementationId, Role};

    const SELECTORS: &str = r#"
heroTitle: "h1.hero-title"
menuToggle: "button.menu-toggle"
desktopNav:
  primary: "nav.desktop"
  unique_to: baseline
"#;

    fn plan() -> ResponsivePlan {
        serde_yaml::from_str(
            r#"
checks:
  - role: heroTitle
    viewports:
      mobile: { fontSize: { pattern: "^3[0-9]px$" } }
      desktop: { fontSize: "60px" }
  - role: menuToggle
    viewports:
      mobile: { display: "block" }
      desktop: { display: "none" }
  - role: desktopNav
    viewports:
      desktop: { display: "flex" }
"#,
        )
        .unwrap()
    }

    fn page() -> MemoryPage {
        let page = MemoryPage::new();
        page.add(
            MemoryElement::new("h1.hero-title")
                .style("fontSize", "60px")
                .style_below(480, "fontSize", "44px"),
        );
        page.add(
            MemoryElement::new("button.menu-toggle")
                .style("display", "none")
                .style_below(480, "display", "block"),
        );
        page
    }

    #[tokio::test]
    async fn test_results_are_tagged_per_viewport() {
        let page = page();
        let fixture = Fixture::new(SELECTORS, ImplementationId::Candidate);
        let section = run_responsive(&fixture.context(&page), &plan()).await.unwrap();

        assert_eq!(section.name, "responsive");
        assert_eq!(section.tested(), 4);
        assert_eq!(section.failed(), 1);
        let failure = section.failures().next().unwrap();
        assert_eq!(failure.viewport.as_deref(), Some("mobile"));
        assert!(failure.message.starts_with("[mobile] heroTitle.fontSize"));
        assert_eq!(section.skipped, vec![Role::from("desktopNav")]);
    }

    #[tokio::test]
    async fn test_viewport_is_restored() {
        let page = page();
        let fixture = Fixture::new(SELECTORS, ImplementationId::Candidate);
        run_responsive(&fixture.context(&page), &plan()).await.unwrap();
        assert_eq!(page.viewport().unwrap().name, "desktop");
    }
}
