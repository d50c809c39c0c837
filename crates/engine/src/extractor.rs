//! Computed-style extraction
//!
//! Values are opaque strings: no unit conversion and no color-space
//! normalization happen here. Equivalent serializations are the matcher's
//! concern.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

use uiparity_common::properties::{all_properties, is_informative};
use uiparity_common::Role;

use crate::error::HarnessError;
use crate::session::PageSession;
use crate::wait::{await_condition, Found, WaitBound, WaitError};

/// Captured computed style for one role at one moment.
///
/// Never cached: layout, viewport and interaction state all change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySet {
    pub role: Role,
    pub selector: String,
    pub values: BTreeMap<String, String>,
}

impl PropertySet {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no element matches '{selector}'")]
    ElementNotFound { selector: String, waited: Duration },

    #[error(transparent)]
    Session(#[from] HarnessError),
}

/// Wait until at least one element matches `selector`
pub async fn wait_for_element(
    session: &dyn PageSession,
    selector: &str,
    bound: WaitBound,
) -> Result<Found, ExtractError> {
    let result = await_condition(bound, move || async move {
        Ok::<_, HarnessError>(session.count(selector).await? > 0)
    })
    .await;

    match result {
        Ok(found) => Ok(found),
        Err(WaitError::TimedOut { waited }) => Err(ExtractError::ElementNotFound {
            selector: selector.to_string(),
            waited,
        }),
        Err(WaitError::Session(e)) => Err(ExtractError::Session(e)),
    }
}

/// Read `properties` from the first element matching `selector`, keeping
/// only informative values
pub async fn extract(
    session: &dyn PageSession,
    role: &Role,
    selector: &str,
    properties: &[&str],
    bound: WaitBound,
) -> Result<PropertySet, ExtractError> {
    let found = wait_for_element(session, selector, bound).await?;

    let raw = session
        .computed_style(selector, 0, properties)
        .await?
        .ok_or_else(|| ExtractError::ElementNotFound {
            selector: selector.to_string(),
            waited: found.waited,
        })?;

    let values: BTreeMap<String, String> = raw
        .into_iter()
        .filter(|(name, value)| properties.contains(&name.as_str()) && is_informative(value))
        .collect();

    trace!("{} ({}): captured {} properties", role, selector, values.len());

    Ok(PropertySet {
        role: role.clone(),
        selector: selector.to_string(),
        values,
    })
}

/// Extract the full categorized property list
pub async fn extract_all(
    session: &dyn PageSession,
    role: &Role,
    selector: &str,
    bound: WaitBound,
) -> Result<PropertySet, ExtractError> {
    extract(session, role, selector, &all_properties(), bound).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryElement, MemoryPage};

    fn page() -> MemoryPage {
        let page = MemoryPage::new();
        page.add(
            MemoryElement::new("h1.hero-title")
                .style("fontSize", "60px")
                .style("color", "rgb(17, 17, 17)")
                .style("width", "auto")
                .style("zIndex", "auto")
                .style("marginTop", "")
                .style("fontFamily", "inherit")
                .style("lineHeight", "initial"),
        );
        page.add(MemoryElement::new("h1.hero-title").style("fontSize", "12px"));
        page
    }

    #[tokio::test]
    async fn test_extract_filters_uninformative_values() {
        let page = page();
        let set = extract_all(&page, &Role::from("heroTitle"), "h1.hero-title", WaitBound::from_millis(50, 5))
            .await
            .unwrap();
        assert_eq!(set.get("fontSize"), Some("60px"));
        assert_eq!(set.get("color"), Some("rgb(17, 17, 17)"));
        for filtered in ["width", "zIndex", "marginTop", "fontFamily", "lineHeight"] {
            assert_eq!(set.get(filtered), None, "{} should be filtered", filtered);
        }
    }

    #[tokio::test]
    async fn test_extract_reads_first_match_only() {
        let page = page();
        let set = extract(&page, &Role::from("heroTitle"), "h1.hero-title", &["fontSize"], WaitBound::from_millis(50, 5))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("fontSize"), Some("60px"));
    }

    #[tokio::test]
    async fn test_missing_element_reports_not_found() {
        let page = page();
        let err = extract_all(&page, &Role::from("ctaButton"), "a.cta", WaitBound::from_millis(30, 5))
            .await
            .unwrap_err();
        match err {
            ExtractError::ElementNotFound { selector, waited } => {
                assert_eq!(selector, "a.cta");
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_re_extraction_is_idempotent() {
        let page = page();
        let role = Role::from("heroTitle");
        let bound = WaitBound::from_millis(50, 5);
        let first = extract_all(&page, &role, "h1.hero-title", bound).await.unwrap();
        let second = extract_all(&page, &role, "h1.hero-title", bound).await.unwrap();
        assert_eq!(first, second);
    }
}
