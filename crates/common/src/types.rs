//! Core types for uiparity

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Abstract, stable name for a UI element (`heroTitle`, `ctaButton`, ...).
///
/// Roles are the join key across selectors, expectations, overrides and
/// results. They never change between implementations even when the
/// markup does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Which of the two renderings is under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationId {
    /// The reference rendering; ground truth, never filtered by overrides
    Baseline,
    /// The reimplementation being verified
    Candidate,
}

impl ImplementationId {
    pub const ALL: [ImplementationId; 2] = [ImplementationId::Baseline, ImplementationId::Candidate];

    pub fn other(self) -> Self {
        match self {
            ImplementationId::Baseline => ImplementationId::Candidate,
            ImplementationId::Candidate => ImplementationId::Baseline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImplementationId::Baseline => "baseline",
            ImplementationId::Candidate => "candidate",
        }
    }
}

impl fmt::Display for ImplementationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named browser viewport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

/// How a role maps to concrete selectors.
///
/// In YAML a bare string is a [`SelectorSpec::Literal`]; a mapping with
/// `primary` (and optionally `alternate`, `unique_to`) is a
/// [`SelectorSpec::PerTarget`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    /// Used verbatim on both implementations
    Literal(String),
    PerTarget(TargetSelectors),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSelectors {
    /// Selector for the baseline, and the fallback for the candidate
    pub primary: String,

    /// Selector for the candidate when its markup differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<String>,

    /// The only implementation on which this role exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_to: Option<ImplementationId>,
}

/// A compiled regular expression that remembers its source text
#[derive(Debug, Clone)]
pub struct PropertyPattern {
    source: String,
    regex: Regex,
}

impl PropertyPattern {
    pub fn new(source: impl Into<String>) -> crate::Result<Self> {
        let source = source.into();
        let regex = Regex::new(&source).map_err(|e| crate::Error::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for PropertyPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PropertyPattern {}

/// The accepted value(s) for one (role, property) pair.
///
/// YAML accepts a bare string (literal), a bare list (accepted set), or an
/// explicit `{ literal | pattern | one_of: ... }` mapping. Patterns are
/// unanchored regular expressions; write `^...$` to require a full match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExpectationRepr", into = "ExpectationRepr")]
pub enum Expectation {
    Literal(String),
    Pattern(PropertyPattern),
    OneOf(BTreeSet<String>),
}

impl Expectation {
    pub fn literal(value: impl Into<String>) -> Self {
        Expectation::Literal(value.into())
    }

    pub fn pattern(source: &str) -> crate::Result<Self> {
        PropertyPattern::new(source).map(Expectation::Pattern)
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expectation::OneOf(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Literal(value) => write!(f, "{:?}", value),
            Expectation::Pattern(pattern) => write!(f, "/{}/", pattern.as_str()),
            Expectation::OneOf(values) => {
                let joined: Vec<String> = values.iter().map(|v| format!("{:?}", v)).collect();
                write!(f, "one of [{}]", joined.join(", "))
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ExpectationRepr {
    Bare(String),
    Set(Vec<String>),
    Tagged(TaggedExpectation),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedExpectation {
    Literal(String),
    Pattern(String),
    OneOf(Vec<String>),
}

impl TryFrom<ExpectationRepr> for Expectation {
    type Error = String;

    fn try_from(repr: ExpectationRepr) -> std::result::Result<Self, Self::Error> {
        let tagged = match repr {
            ExpectationRepr::Bare(value) => TaggedExpectation::Literal(value),
            ExpectationRepr::Set(values) => TaggedExpectation::OneOf(values),
            ExpectationRepr::Tagged(tagged) => tagged,
        };
        match tagged {
            TaggedExpectation::Literal(value) => Ok(Expectation::Literal(value)),
            TaggedExpectation::Pattern(source) => {
                PropertyPattern::new(source).map(Expectation::Pattern).map_err(|e| e.to_string())
            }
            TaggedExpectation::OneOf(values) => {
                if values.is_empty() {
                    return Err("one_of expectation must list at least one value".to_string());
                }
                Ok(Expectation::OneOf(values.into_iter().collect()))
            }
        }
    }
}

impl From<Expectation> for ExpectationRepr {
    fn from(expectation: Expectation) -> Self {
        ExpectationRepr::Tagged(match expectation {
            Expectation::Literal(value) => TaggedExpectation::Literal(value),
            Expectation::Pattern(pattern) => TaggedExpectation::Pattern(pattern.source),
            Expectation::OneOf(values) => TaggedExpectation::OneOf(values.into_iter().collect()),
        })
    }
}

/// Grouping used for override bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideCategory {
    Typography,
    Color,
    Layout,
    Content,
    Markup,
    Behavior,
    Other,
}

impl fmt::Display for OverrideCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverrideCategory::Typography => "typography",
            OverrideCategory::Color => "color",
            OverrideCategory::Layout => "layout",
            OverrideCategory::Content => "content",
            OverrideCategory::Markup => "markup",
            OverrideCategory::Behavior => "behavior",
            OverrideCategory::Other => "other",
        };
        f.write_str(label)
    }
}

/// Which failures an override may suppress.
///
/// At least one of `role` or `selector` must be set. `check` and
/// `viewport` narrow the scope further when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Property or check name (`fontSize`, `@href`, `menu.opens`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
}

/// A declared, intentional deviation of the candidate from the baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Override {
    pub id: String,
    pub category: OverrideCategory,
    pub scope: OverrideScope,
    pub description: String,
}

/// Why a check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The selector matched nothing within the wait bound
    ElementNotFound,
    /// A captured value did not satisfy its expectation
    PropertyMismatch,
    /// An expected state transition did not happen within the wait bound
    InteractionFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ElementNotFound => write!(f, "element not found"),
            FailureKind::PropertyMismatch => write!(f, "property mismatch"),
            FailureKind::InteractionFailure => write!(f, "interaction failure"),
        }
    }
}

/// Outcome of one check against one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub role: Role,
    /// Property name or check name
    pub check: String,
    pub passed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
}

impl ValidationResult {
    pub fn pass(role: &Role, check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            role: role.clone(),
            check: check.into(),
            passed: true,
            message: message.into(),
            failure: None,
            selector: None,
            viewport: None,
        }
    }

    pub fn fail(
        role: &Role,
        check: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            role: role.clone(),
            check: check.into(),
            passed: false,
            message: message.into(),
            failure: Some(kind),
            selector: None,
            viewport: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        let viewport = viewport.into();
        self.message = format!("[{}] {}", viewport, self.message);
        self.viewport = Some(viewport);
        self
    }
}

/// A failure removed from the failing set by a declared override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedFailure {
    pub override_id: String,
    pub result: ValidationResult,
}

/// All results for one logical area of the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub name: String,
    pub results: Vec<ValidationResult>,
    #[serde(default)]
    pub suppressed: Vec<SuppressedFailure>,
    /// Roles resolved to NotApplicable for this implementation
    #[serde(default)]
    pub skipped: Vec<Role>,
}

impl SectionResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, result: ValidationResult) {
        self.results.push(result);
    }

    /// Checks executed, including those whose failure was suppressed
    pub fn tested(&self) -> usize {
        self.results.len() + self.suppressed.len()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    pub fn passed(&self) -> usize {
        self.tested() - self.failed()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Fold another result set for the same section into this one
    pub fn merge(&mut self, other: SectionResult) {
        self.results.extend(other.results);
        self.suppressed.extend(other.suppressed);
        self.skipped.extend(other.skipped);
    }
}
