//! Per-run context
//!
//! A [`RunContext`] is built once per implementation run and passed by
//! reference to every step. Nothing about "which target is under test"
//! lives anywhere else, so two runs can proceed side by side.

use tracing::{info, warn};

use uiparity_common::{ImplementationId, Role, SelectorTable, Viewport};

use crate::config::Timeouts;
use crate::error::{HarnessError, HarnessResult};
use crate::resolver::{resolve, Resolution};
use crate::session::PageSession;

#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub implementation: ImplementationId,
    pub url: &'a str,
    /// Viewport the page is expected to be in between steps
    pub viewport: &'a Viewport,
    /// Every viewport the harness knows by name
    pub viewports: &'a [Viewport],
    pub session: &'a dyn PageSession,
    pub selectors: &'a SelectorTable,
    pub timeouts: Timeouts,
}

impl<'a> RunContext<'a> {
    pub fn resolve(&self, role: &Role) -> HarnessResult<Resolution> {
        resolve(self.selectors, role, self.implementation)
    }

    pub fn viewport_named(&self, name: &str) -> HarnessResult<&'a Viewport> {
        self.viewports
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| HarnessError::Configuration(format!("unknown viewport '{}'", name)))
    }

    /// Switch the page to `viewport` for a scoped step
    pub async fn enter_viewport(&self, viewport: &Viewport) -> HarnessResult<()> {
        if viewport != self.viewport {
            self.session.set_viewport(viewport).await?;
        }
        Ok(())
    }

    /// Return the page to the run's viewport after a scoped step
    pub async fn restore_viewport(&self, from: &Viewport) -> HarnessResult<()> {
        if from != self.viewport {
            self.session.set_viewport(self.viewport).await?;
        }
        Ok(())
    }

    /// Load the target page, retrying up to `attempts` times in total
    pub async fn load_page(&self, attempts: u32) -> HarnessResult<()> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.session.navigate(self.url, self.timeouts.navigation()).await {
                Ok(()) => {
                    info!("[{}] loaded {} (attempt {})", self.implementation, self.url, attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "[{}] navigation to {} failed (attempt {}/{}): {}",
                        self.implementation, self.url, attempt, attempts, e
                    );
                    last_error = e.to_string();
                }
            }
        }
        Err(HarnessError::Navigation {
            implementation: self.implementation,
            url: self.url.to_string(),
            attempts,
            reason: last_error,
        })
    }

    /// Clear persisted state and load the page again
    pub async fn fresh_page(&self) -> HarnessResult<()> {
        self.session.reset_state().await?;
        self.load_page(1).await
    }
}

/// Turn a page-level error into a recordable reason.
///
/// A query or input the page rejects (a hidden element, an invalid
/// selector) is reported as a failed check. A dead bridge or a timed-out
/// request is fatal.
pub(crate) fn recoverable(err: HarnessError) -> HarnessResult<String> {
    match err {
        HarnessError::Browser { op, reason } => Ok(format!("{} failed: {}", op, reason)),
        other => Err(other),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Context over `page` at the default desktop viewport
    pub struct Fixture {
        pub selectors: SelectorTable,
        pub viewports: Vec<Viewport>,
        pub implementation: ImplementationId,
    }

    impl Fixture {
        pub fn new(selectors: &str, implementation: ImplementationId) -> Self {
            Self {
                selectors: SelectorTable::from_yaml(selectors).unwrap(),
                viewports: vec![
                    Viewport::new("mobile", 375, 812),
                    Viewport::new("desktop", 1440, 900),
                ],
                implementation,
            }
        }

        pub fn context<'a>(&'a self, session: &'a dyn PageSession) -> RunContext<'a> {
            RunContext {
                implementation: self.implementation,
                url: "http://127.0.0.1:4321/",
                viewport: &self.viewports[1],
                viewports: &self.viewports,
                session,
                selectors: &self.selectors,
                timeouts: Timeouts {
                    selector_ms: 40,
                    transition_ms: 40,
                    navigation_ms: 1_000,
                    poll_ms: 5,
                },
            }
        }
    }
}
