//! uiparity Common Library
//!
//! Data model and declarative configuration shared by the parity engine
//! and the command-line front end.

pub mod catalog;
pub mod error;
pub mod properties;
pub mod types;

// Re-export commonly used types
pub use catalog::{
    AccordionSpec, Catalog, ConsentSpec, ExpectationCatalog, HoverSpec, InteractionPlan, MobileMenuSpec,
    OverrideRegistry, PolicyLinkSpec, ResponsiveCheck, ResponsivePlan, RoleCheck, SectionSpec, SelectorTable,
};
pub use error::{Error, Result};
pub use types::*;

/// uiparity version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
