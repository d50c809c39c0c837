//! Declarative catalogs: selectors, expectations and overrides
//!
//! All three are plain YAML loaded once at startup and never mutated
//! afterwards. [`Catalog::validate`] rejects anything that would otherwise
//! surface as a confusing failure in the middle of a run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::properties::{is_informative, is_known_property};
use crate::types::{Expectation, Override, Role, SelectorSpec};

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_yaml::from_str(&content).map_err(|e| Error::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Role -> SelectorSpec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorTable {
    roles: BTreeMap<Role, SelectorSpec>,
}

impl SelectorTable {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        read_yaml(path)
    }

    pub fn get(&self, role: &Role) -> Option<&SelectorSpec> {
        self.roles.get(role)
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    pub fn insert(&mut self, role: Role, spec: SelectorSpec) {
        self.roles.insert(role, spec);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Role, &SelectorSpec)> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Static checks for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleCheck {
    pub role: Role,

    /// Computed-style property -> expectation
    #[serde(default)]
    pub properties: BTreeMap<String, Expectation>,

    /// DOM attribute -> expectation
    #[serde(default)]
    pub attributes: BTreeMap<String, Expectation>,

    /// Expectation on the trimmed text content
    #[serde(default)]
    pub text: Option<Expectation>,

    /// Minimum number of elements the selector must match
    #[serde(default)]
    pub min_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    pub name: String,
    #[serde(default)]
    pub checks: Vec<RoleCheck>,
}

/// Mobile navigation toggle: Closed -> Open -> Closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MobileMenuSpec {
    #[serde(default = "default_menu_section")]
    pub section: String,
    /// Control carrying `aria-expanded`
    pub toggle: Role,
    pub panel: Role,
    /// Viewport to switch to before exercising the menu
    #[serde(default)]
    pub viewport: Option<String>,
    /// Element expected to hold focus once the menu is open
    #[serde(default)]
    pub focus_target: Option<Role>,
    #[serde(default)]
    pub close_on_escape: bool,
}

fn default_menu_section() -> String {
    "mobile-menu".to_string()
}

/// Accordion items: each Collapsed <-> Expanded independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccordionSpec {
    #[serde(default = "default_accordion_section")]
    pub section: String,
    /// Control carrying `aria-expanded`, one per item
    pub item: Role,
    /// Content region, one per item
    pub content: Role,
}

fn default_accordion_section() -> String {
    "accordion".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyLinkSpec {
    pub role: Role,
    /// Expectation on the `href` attribute
    pub href: Expectation,
}

/// Consent banner: Hidden -> Shown -> {Accepted | Rejected | SettingsOpened}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsentSpec {
    #[serde(default = "default_consent_section")]
    pub section: String,
    pub banner: Role,
    #[serde(default)]
    pub accept: Option<Role>,
    #[serde(default)]
    pub reject: Option<Role>,
    #[serde(default)]
    pub settings: Option<Role>,
    /// Panel expected to appear after activating `settings`
    #[serde(default)]
    pub settings_panel: Option<Role>,
    /// Static links checked whether or not a banner exists
    #[serde(default)]
    pub policy_links: Vec<PolicyLinkSpec>,
}

fn default_consent_section() -> String {
    "consent".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoverSpec {
    pub role: Role,
    pub properties: BTreeMap<String, Expectation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionPlan {
    #[serde(default)]
    pub mobile_menu: Option<MobileMenuSpec>,
    #[serde(default)]
    pub accordion: Option<AccordionSpec>,
    #[serde(default)]
    pub consent: Option<ConsentSpec>,
    #[serde(default)]
    pub hover: Vec<HoverSpec>,
    #[serde(default = "default_hover_section")]
    pub hover_section: String,
}

fn default_hover_section() -> String {
    "hover".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponsiveCheck {
    pub role: Role,
    /// Viewport name -> property -> expectation
    pub viewports: BTreeMap<String, BTreeMap<String, Expectation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponsivePlan {
    #[serde(default = "default_responsive_section")]
    pub section: String,
    #[serde(default)]
    pub checks: Vec<ResponsiveCheck>,
}

fn default_responsive_section() -> String {
    "responsive".to_string()
}

/// Everything the pipeline asserts, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationCatalog {
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub interactions: InteractionPlan,
    #[serde(default)]
    pub responsive: Option<ResponsivePlan>,
}

impl ExpectationCatalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        read_yaml(path)
    }

    /// Every role this catalog touches, with where it was referenced
    pub fn referenced_roles(&self) -> Vec<(&Role, String)> {
        let mut refs = Vec::new();
        for section in &self.sections {
            for check in &section.checks {
                refs.push((&check.role, format!("section '{}'", section.name)));
            }
        }

        let plan = &self.interactions;
        if let Some(menu) = &plan.mobile_menu {
            refs.push((&menu.toggle, "mobile_menu.toggle".to_string()));
            refs.push((&menu.panel, "mobile_menu.panel".to_string()));
            if let Some(focus) = &menu.focus_target {
                refs.push((focus, "mobile_menu.focus_target".to_string()));
            }
        }
        if let Some(accordion) = &plan.accordion {
            refs.push((&accordion.item, "accordion.item".to_string()));
            refs.push((&accordion.content, "accordion.content".to_string()));
        }
        if let Some(consent) = &plan.consent {
            refs.push((&consent.banner, "consent.banner".to_string()));
            let optional = [
                (&consent.accept, "consent.accept"),
                (&consent.reject, "consent.reject"),
                (&consent.settings, "consent.settings"),
                (&consent.settings_panel, "consent.settings_panel"),
            ];
            for (role, label) in optional {
                if let Some(role) = role {
                    refs.push((role, label.to_string()));
                }
            }
            for link in &consent.policy_links {
                refs.push((&link.role, "consent.policy_links".to_string()));
            }
        }
        for hover in &plan.hover {
            refs.push((&hover.role, "hover".to_string()));
        }
        if let Some(responsive) = &self.responsive {
            for check in &responsive.checks {
                refs.push((&check.role, "responsive".to_string()));
            }
        }
        refs
    }

    /// Every (context, property, expectation) triple on computed styles
    fn property_expectations(&self) -> Vec<(String, &String, &Expectation)> {
        let mut out = Vec::new();
        for section in &self.sections {
            for check in &section.checks {
                for (property, expectation) in &check.properties {
                    out.push((format!("{}.{}", check.role, property), property, expectation));
                }
            }
        }
        for hover in &self.interactions.hover {
            for (property, expectation) in &hover.properties {
                out.push((format!("hover {}.{}", hover.role, property), property, expectation));
            }
        }
        if let Some(responsive) = &self.responsive {
            for check in &responsive.checks {
                for (viewport, properties) in &check.viewports {
                    for (property, expectation) in properties {
                        out.push((
                            format!("[{}] {}.{}", viewport, check.role, property),
                            property,
                            expectation,
                        ));
                    }
                }
            }
        }
        out
    }
}

/// The registry of intentional candidate deviations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRegistry {
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl OverrideRegistry {
    pub fn new(overrides: Vec<Override>) -> Self {
        Self { overrides }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Load a registry file, or every `*.yaml` / `*.yml` file under a directory
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return read_yaml(path);
        }

        let mut files: Vec<_> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();

        let mut merged = Self::default();
        for file in files {
            let registry: Self = read_yaml(&file)?;
            debug!("Loaded {} override(s) from {}", registry.overrides.len(), file.display());
            merged.overrides.extend(registry.overrides);
        }
        Ok(merged)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.overrides.iter()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// The three declarative inputs of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub selectors: SelectorTable,
    pub expectations: ExpectationCatalog,
    pub overrides: OverrideRegistry,
}

impl Catalog {
    pub fn load(selectors: &Path, expectations: &Path, overrides: Option<&Path>) -> Result<Self> {
        let overrides = match overrides {
            Some(path) => OverrideRegistry::load(path)?,
            None => OverrideRegistry::default(),
        };
        Ok(Self {
            selectors: SelectorTable::from_file(selectors)?,
            expectations: ExpectationCatalog::from_file(expectations)?,
            overrides,
        })
    }

    /// Reject configuration that can never produce a meaningful run.
    ///
    /// `viewports` is the set of viewport names the harness defines.
    pub fn validate(&self, viewports: &BTreeSet<String>) -> Result<()> {
        for (role, referenced_by) in self.expectations.referenced_roles() {
            if !self.selectors.contains(role) {
                return Err(Error::UnknownRole {
                    role: role.to_string(),
                    referenced_by,
                });
            }
        }

        for (context, property, expectation) in self.expectations.property_expectations() {
            if !is_known_property(property) {
                return Err(Error::InvalidConfig(format!(
                    "{}: '{}' is not an extracted property",
                    context, property
                )));
            }
            if let Expectation::Literal(value) = expectation {
                if !is_informative(value) {
                    return Err(Error::InvalidConfig(format!(
                        "{}: literal {:?} can never match, the extractor discards it",
                        context, value
                    )));
                }
            }
        }

        let mut seen_sections = HashSet::new();
        for section in &self.expectations.sections {
            if !seen_sections.insert(section.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "section '{}' is declared twice",
                    section.name
                )));
            }
        }

        if let Some(menu) = &self.expectations.interactions.mobile_menu {
            if let Some(viewport) = &menu.viewport {
                if !viewports.contains(viewport) {
                    return Err(Error::InvalidConfig(format!(
                        "mobile_menu.viewport '{}' is not a configured viewport",
                        viewport
                    )));
                }
            }
        }
        if let Some(responsive) = &self.expectations.responsive {
            for check in &responsive.checks {
                for viewport in check.viewports.keys() {
                    if !viewports.contains(viewport) {
                        return Err(Error::InvalidConfig(format!(
                            "responsive check for '{}' names unknown viewport '{}'",
                            check.role, viewport
                        )));
                    }
                }
            }
        }

        let mut ids = HashSet::new();
        for entry in self.overrides.iter() {
            if !ids.insert(entry.id.as_str()) {
                return Err(Error::MalformedOverride {
                    id: entry.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
            if entry.scope.role.is_none() && entry.scope.selector.is_none() {
                return Err(Error::MalformedOverride {
                    id: entry.id.clone(),
                    reason: "scope must name a role or a selector".to_string(),
                });
            }
            if let Some(role) = &entry.scope.role {
                if !self.selectors.contains(role) {
                    return Err(Error::UnknownRole {
                        role: role.to_string(),
                        referenced_by: format!("override '{}'", entry.id),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OverrideCategory, OverrideScope};

    const SELECTORS: &str = r#"
heroTitle: "h1.hero-title"
ctaButton:
  primary: "a.cta"
  alternate: "button[data-cta]"
faqQuestion: ".faq button"
faqAnswer: ".faq .answer"
"#;

    const EXPECTATIONS: &str = r#"
sections:
  - name: hero
    checks:
      - role: heroTitle
        properties:
          fontSize: { pattern: "^(48|60)px$" }
        text: { pattern: "\\S" }
      - role: ctaButton
        properties:
          backgroundColor: "rgb(255, 220, 97)"
        attributes:
          href: { pattern: "^/" }
interactions:
  accordion:
    section: faq
    item: faqQuestion
    content: faqAnswer
responsive:
  checks:
    - role: heroTitle
      viewports:
        mobile:
          fontSize: "36px"
"#;

    fn viewports() -> BTreeSet<String> {
        ["mobile", "desktop"].iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> Catalog {
        Catalog {
            selectors: SelectorTable::from_yaml(SELECTORS).unwrap(),
            expectations: ExpectationCatalog::from_yaml(EXPECTATIONS).unwrap(),
            overrides: OverrideRegistry::default(),
        }
    }

    #[test]
    fn test_valid_catalog_passes() {
        let catalog = catalog();
        catalog.validate(&viewports()).unwrap();
        assert_eq!(catalog.expectations.sections[0].checks.len(), 2);
        assert_eq!(
            catalog.expectations.interactions.accordion.as_ref().unwrap().section,
            "faq"
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let mut catalog = catalog();
        catalog.expectations.sections[0].checks.push(RoleCheck {
            role: Role::from("footerLogo"),
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            text: None,
            min_count: None,
        });
        let err = catalog.validate(&viewports()).unwrap_err();
        assert!(matches!(err, Error::UnknownRole { ref role, .. } if role == "footerLogo"));
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let mut catalog = catalog();
        catalog.expectations.sections[0].checks[0]
            .properties
            .insert("font-size".to_string(), Expectation::literal("48px"));
        assert!(matches!(catalog.validate(&viewports()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_sentinel_literal_is_rejected() {
        let mut catalog = catalog();
        catalog.expectations.sections[0].checks[0]
            .properties
            .insert("width".to_string(), Expectation::literal("auto"));
        assert!(matches!(catalog.validate(&viewports()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_viewport_is_rejected() {
        let catalog = catalog();
        let only_desktop: BTreeSet<String> = ["desktop".to_string()].into_iter().collect();
        assert!(matches!(catalog.validate(&only_desktop), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_override_without_role_or_selector_is_malformed() {
        let mut catalog = catalog();
        catalog.overrides = OverrideRegistry::new(vec![Override {
            id: "broad".into(),
            category: OverrideCategory::Typography,
            scope: OverrideScope {
                check: Some("fontSize".into()),
                ..Default::default()
            },
            description: "would suppress every fontSize failure".into(),
        }]);
        let err = catalog.validate(&viewports()).unwrap_err();
        assert!(matches!(err, Error::MalformedOverride { ref id, .. } if id == "broad"));
    }

    #[test]
    fn test_duplicate_override_ids_are_rejected() {
        let entry = Override {
            id: "cta-color".into(),
            category: OverrideCategory::Color,
            scope: OverrideScope {
                role: Some(Role::from("ctaButton")),
                ..Default::default()
            },
            description: "new brand color".into(),
        };
        let mut catalog = catalog();
        catalog.overrides = OverrideRegistry::new(vec![entry.clone(), entry]);
        assert!(matches!(
            catalog.validate(&viewports()),
            Err(Error::MalformedOverride { .. })
        ));
    }

    #[test]
    fn test_override_registry_loads_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            r#"
overrides:
  - id: logo-svg
    category: markup
    scope: { role: logo }
    description: Logo is an inline SVG in the rewrite
"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested/b.yml"),
            r#"
overrides:
  - id: nav-gap
    category: layout
    scope: { role: navLinks, check: columnGap }
    description: Flex gap replaces margins
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = OverrideRegistry::load(dir.path()).unwrap();
        let ids: Vec<_> = registry.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["logo-svg", "nav-gap"]);
    }
}
