//! The catalogs shipped under `parity/` must load and validate

use std::path::PathBuf;

use uiparity_common::{ImplementationId, Role};
use uiparity_engine::resolver::{resolve, Resolution};
use uiparity_engine::HarnessConfig;

fn sample_config() -> HarnessConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../parity/uiparity.toml");
    HarnessConfig::load(&path).unwrap()
}

#[test]
fn test_sample_config_loads() {
    let config = sample_config();
    assert_eq!(config.default_viewport().unwrap().width, 1440);
    assert_eq!(config.viewports.len(), 3);
    assert!(config.target(ImplementationId::Baseline).serve.is_some());
    assert!(config.catalog.overrides.as_ref().unwrap().is_dir());
}

#[test]
fn test_sample_catalogs_validate() {
    let config = sample_config();
    let catalog = config.load_catalog().unwrap();

    assert_eq!(catalog.expectations.sections.len(), 3);
    assert_eq!(catalog.overrides.len(), 3);
    assert_eq!(
        resolve(&catalog.selectors, &Role::from("announcementBar"), ImplementationId::Candidate).unwrap(),
        Resolution::NotApplicable
    );
    assert_eq!(
        resolve(&catalog.selectors, &Role::from("themeToggle"), ImplementationId::Baseline).unwrap(),
        Resolution::NotApplicable
    );
}
