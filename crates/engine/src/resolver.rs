//! Role -> concrete selector, per implementation

use uiparity_common::{ImplementationId, Role, SelectorSpec, SelectorTable};

use crate::error::{HarnessError, HarnessResult};

/// What to query for a role on one implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Selector(String),
    /// The role exists only on the other implementation; skip, don't fail
    NotApplicable,
}

impl Resolution {
    pub fn selector(&self) -> Option<&str> {
        match self {
            Resolution::Selector(selector) => Some(selector),
            Resolution::NotApplicable => None,
        }
    }
}

pub fn resolve_spec(spec: &SelectorSpec, implementation: ImplementationId) -> Resolution {
    match spec {
        SelectorSpec::Literal(selector) => Resolution::Selector(selector.clone()),
        SelectorSpec::PerTarget(targets) => {
            if let Some(owner) = targets.unique_to {
                if owner != implementation {
                    return Resolution::NotApplicable;
                }
            }
            let selector = match implementation {
                ImplementationId::Baseline => &targets.primary,
                ImplementationId::Candidate => targets.alternate.as_ref().unwrap_or(&targets.primary),
            };
            Resolution::Selector(selector.clone())
        }
    }
}

/// Resolve a role; an unknown role is a configuration error
pub fn resolve(
    table: &SelectorTable,
    role: &Role,
    implementation: ImplementationId,
) -> HarnessResult<Resolution> {
    let spec = table.get(role).ok_or_else(|| {
        HarnessError::Catalog(uiparity_common::Error::UnknownRole {
            role: role.to_string(),
            referenced_by: format!("{} run", implementation),
        })
    })?;
    Ok(resolve_spec(spec, implementation))
}
