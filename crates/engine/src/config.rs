//! Harness configuration (`uiparity.toml`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use uiparity_common::{Catalog, ImplementationId, Viewport};

use crate::error::{HarnessError, HarnessResult};
use crate::wait::WaitBound;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub targets: Targets,
    pub browser: BrowserConfig,
    pub timeouts: Timeouts,
    pub viewports: Vec<Viewport>,
    /// Name of the viewport every run starts in
    pub default_viewport: String,
    /// Failures tolerated before a run counts as failing
    pub failure_tolerance: usize,
    pub catalog: CatalogPaths,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            targets: Targets::default(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
            viewports: vec![
                Viewport::new("mobile", 375, 812),
                Viewport::new("tablet", 768, 1024),
                Viewport::new("desktop", 1440, 900),
            ],
            default_viewport: "desktop".to_string(),
            failure_tolerance: 0,
            catalog: CatalogPaths::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Targets {
    pub baseline: TargetConfig,
    pub candidate: TargetConfig,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            baseline: TargetConfig::new("http://127.0.0.1:4321/"),
            candidate: TargetConfig::new("http://127.0.0.1:3000/"),
        }
    }
}

/// Where one implementation is served
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,

    /// Command that starts a preview server for this target
    #[serde(default)]
    pub serve: Option<Vec<String>>,

    /// Path polled to decide the preview server is up
    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    60
}

impl TargetConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            serve: None,
            health_path: default_health_path(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    pub headless: bool,
    /// Directory holding the `playwright` package, exported as NODE_PATH
    pub node_path: Option<PathBuf>,
    /// Deadline for a single bridge request
    pub request_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chromium,
            headless: true,
            node_path: None,
            request_timeout_ms: 30_000,
        }
    }
}

/// Wait bounds, in milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Waiting for a selector to match (property extraction)
    pub selector_ms: u64,
    /// Waiting for a widget to settle after an interaction
    pub transition_ms: u64,
    /// Initial page load
    pub navigation_ms: u64,
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            selector_ms: 5_000,
            transition_ms: 3_000,
            navigation_ms: 30_000,
            poll_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn selector(&self) -> WaitBound {
        WaitBound::from_millis(self.selector_ms, self.poll_ms)
    }

    pub fn transition(&self) -> WaitBound {
        WaitBound::from_millis(self.transition_ms, self.poll_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPaths {
    pub selectors: PathBuf,
    pub expectations: PathBuf,
    /// A YAML file or a directory of YAML files
    pub overrides: Option<PathBuf>,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self {
            selectors: PathBuf::from("selectors.yaml"),
            expectations: PathBuf::from("expectations.yaml"),
            overrides: Some(PathBuf::from("overrides.yaml")),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields the defaults.
    ///
    /// Relative catalog paths are resolved against the file's directory.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.check()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        self.catalog.selectors = resolve(&self.catalog.selectors);
        self.catalog.expectations = resolve(&self.catalog.expectations);
        self.catalog.overrides = self.catalog.overrides.as_deref().map(resolve);
        self.browser.node_path = self.browser.node_path.as_deref().map(resolve);
    }

    fn check(&self) -> HarnessResult<()> {
        let mut names = BTreeSet::new();
        for viewport in &self.viewports {
            if viewport.width == 0 || viewport.height == 0 {
                return Err(HarnessError::Configuration(format!(
                    "viewport '{}' has a zero dimension",
                    viewport.name
                )));
            }
            if !names.insert(viewport.name.as_str()) {
                return Err(HarnessError::Configuration(format!(
                    "viewport '{}' is defined twice",
                    viewport.name
                )));
            }
        }
        if self.viewport(&self.default_viewport).is_none() {
            return Err(HarnessError::Configuration(format!(
                "default_viewport '{}' is not a configured viewport",
                self.default_viewport
            )));
        }
        Ok(())
    }

    pub fn target(&self, implementation: ImplementationId) -> &TargetConfig {
        match implementation {
            ImplementationId::Baseline => &self.targets.baseline,
            ImplementationId::Candidate => &self.targets.candidate,
        }
    }

    pub fn viewport(&self, name: &str) -> Option<&Viewport> {
        self.viewports.iter().find(|v| v.name == name)
    }

    pub fn default_viewport(&self) -> HarnessResult<&Viewport> {
        self.viewport(&self.default_viewport).ok_or_else(|| {
            HarnessError::Configuration(format!("unknown default viewport '{}'", self.default_viewport))
        })
    }

    pub fn viewport_names(&self) -> BTreeSet<String> {
        self.viewports.iter().map(|v| v.name.clone()).collect()
    }

    /// Apply a `name=WIDTHxHEIGHT` override, replacing or adding a viewport
    pub fn apply_viewport_override(&mut self, spec: &str) -> HarnessResult<()> {
        let viewport = parse_viewport(spec)?;
        match self.viewports.iter_mut().find(|v| v.name == viewport.name) {
            Some(existing) => *existing = viewport,
            None => self.viewports.push(viewport),
        }
        Ok(())
    }

    /// Load and validate the three catalogs this config points at
    pub fn load_catalog(&self) -> HarnessResult<Catalog> {
        let catalog = Catalog::load(
            &self.catalog.selectors,
            &self.catalog.expectations,
            self.catalog.overrides.as_deref(),
        )?;
        catalog.validate(&self.viewport_names())?;
        Ok(catalog)
    }
}

fn parse_viewport(spec: &str) -> HarnessResult<Viewport> {
    let invalid = || {
        HarnessError::Configuration(format!(
            "invalid viewport '{}', expected name=WIDTHxHEIGHT",
            spec
        ))
    };
    let (name, dims) = spec.split_once('=').ok_or_else(invalid)?;
    let (width, height) = dims.split_once(|c| c == 'x' || c == 'X').ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if name.trim().is_empty() || width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok(Viewport::new(name.trim(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.default_viewport().unwrap().width, 1440);
        assert_eq!(config.timeouts.selector().timeout, Duration::from_secs(5));
        assert_eq!(config.failure_tolerance, 0);
    }

    #[test]
    fn test_parse_toml() {
        let config = HarnessConfig::from_toml(
            r#"
default_viewport = "narrow"
failure_tolerance = 3

[targets.baseline]
url = "http://localhost:4321/"
serve = ["npm", "run", "preview"]

[targets.candidate]
url = "http://localhost:5173/"

[browser]
kind = "firefox"

[timeouts]
transition_ms = 1500

[[viewports]]
name = "narrow"
width = 360
height = 740
"#,
        )
        .unwrap();
        assert_eq!(config.browser.kind, BrowserKind::Firefox);
        assert_eq!(config.timeouts.transition_ms, 1500);
        assert_eq!(config.timeouts.selector_ms, 5_000);
        assert_eq!(config.targets.baseline.serve.as_ref().unwrap().len(), 3);
        assert_eq!(config.targets.candidate.health_path, "/");
        assert_eq!(config.viewport_names().len(), 1);
    }

    #[test]
    fn test_unknown_default_viewport_is_rejected() {
        let result = HarnessConfig::from_toml("default_viewport = \"watch\"\n");
        assert!(matches!(result, Err(HarnessError::Configuration(_))));
    }

    #[test]
    fn test_viewport_override() {
        let mut config = HarnessConfig::default();
        config.apply_viewport_override("mobile=390x844").unwrap();
        config.apply_viewport_override("wide=1920X1080").unwrap();
        assert_eq!(config.viewport("mobile").unwrap().width, 390);
        assert_eq!(config.viewport("wide").unwrap().height, 1080);
        assert!(config.apply_viewport_override("broken").is_err());
        assert!(config.apply_viewport_override("zero=0x100").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("uiparity.toml")).unwrap();
        assert_eq!(config.catalog.selectors, dir.path().join("selectors.yaml"));
    }
}
