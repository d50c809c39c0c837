//! Per-implementation pipeline
//!
//! resolve -> extract -> match -> override filter for every role check,
//! then the interactive driver, then the responsive runner, then
//! aggregation. Steps run strictly in order against one page session.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use uiparity_common::{
    Catalog, FailureKind, ImplementationId, Role, RoleCheck, SectionResult, SectionSpec, ValidationResult,
};

use crate::config::HarnessConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::extractor::{extract, extract_all, wait_for_element, ExtractError, PropertySet};
use crate::interactive::{check_accordion, check_consent, check_hover, check_mobile_menu};
use crate::matcher::{match_properties, match_value};
use crate::overrides::apply_overrides;
use crate::playwright::PlaywrightSession;
use crate::report::{ReportBuilder, RunAbort, RunOutcome};
use crate::resolver::Resolution;
use crate::responsive::run_responsive;
use crate::server::ServerHandle;
use crate::session::PageSession;

/// Initial navigation is retried once
const NAVIGATION_ATTEMPTS: u32 = 2;

/// Result of capturing one role's full property set
#[derive(Debug)]
pub enum Capture {
    Captured(PropertySet),
    /// The role does not exist on this implementation
    NotApplicable,
    NotFound { selector: String, waited_ms: u128 },
}

/// Runs the parity pipeline for one implementation at a time
pub struct ParityRunner<'a> {
    config: &'a HarnessConfig,
    catalog: &'a Catalog,
}

impl<'a> ParityRunner<'a> {
    pub fn new(config: &'a HarnessConfig, catalog: &'a Catalog) -> Self {
        Self { config, catalog }
    }

    /// Start the preview server if configured and launch a browser
    async fn open(&self, implementation: ImplementationId) -> HarnessResult<(Option<ServerHandle>, PlaywrightSession)> {
        let target = self.config.target(implementation);
        let server = match &target.serve {
            Some(_) => Some(ServerHandle::spawn(target).await?),
            None => None,
        };
        let session = PlaywrightSession::launch(&self.config.browser, self.config.default_viewport()?).await?;
        Ok((server, session))
    }

    /// Full run against a real browser
    pub async fn run(&self, implementation: ImplementationId) -> HarnessResult<RunOutcome> {
        let (_server, session) = self.open(implementation).await?;
        let outcome = self.run_with_session(implementation, &session).await;
        if let Err(e) = session.close().await {
            warn!("[{}] closing browser: {}", implementation, e);
        }
        outcome
    }

    /// Run the pipeline over an already open session.
    ///
    /// Navigation failure yields `RunOutcome::Aborted`; other fatal errors
    /// are returned as `Err`.
    pub async fn run_with_session(
        &self,
        implementation: ImplementationId,
        session: &dyn PageSession,
    ) -> HarnessResult<RunOutcome> {
        let ctx = self.context(implementation, session)?;
        info!("[{}] parity run against {}", implementation, ctx.url);

        let mut builder = ReportBuilder::new(implementation, ctx.url);
        debug!("[{}] run id {}", implementation, builder.run_id());

        match self.execute(&ctx, &mut builder).await {
            Ok(()) => {}
            Err(HarnessError::Navigation {
                implementation,
                url,
                attempts,
                reason,
            }) => {
                error!("[{}] run aborted: {} unreachable ({})", implementation, url, reason);
                return Ok(RunOutcome::Aborted(RunAbort {
                    implementation,
                    url,
                    attempts,
                    reason,
                    at: Utc::now(),
                }));
            }
            Err(e) => return Err(e),
        }

        let report = builder.finish();
        info!(
            "[{}] {} tested, {} failed, {} suppressed, {} skipped ({:.1}% pass)",
            implementation,
            report.totals.tested,
            report.totals.failed,
            report.totals.suppressed,
            report.totals.skipped,
            report.pass_rate * 100.0
        );
        Ok(RunOutcome::Completed(report))
    }

    fn context<'s>(
        &'s self,
        implementation: ImplementationId,
        session: &'s dyn PageSession,
    ) -> HarnessResult<RunContext<'s>> {
        Ok(RunContext {
            implementation,
            url: &self.config.target(implementation).url,
            viewport: self.config.default_viewport()?,
            viewports: &self.config.viewports,
            session,
            selectors: &self.catalog.selectors,
            timeouts: self.config.timeouts,
        })
    }

    async fn execute(&self, ctx: &RunContext<'_>, builder: &mut ReportBuilder) -> HarnessResult<()> {
        ctx.session.set_viewport(ctx.viewport).await?;
        ctx.load_page(NAVIGATION_ATTEMPTS).await?;

        let record = |builder: &mut ReportBuilder, mut section: SectionResult| {
            apply_overrides(&mut section, &self.catalog.overrides, ctx.implementation);
            debug!(
                "[{}] section {}: {} tested, {} failed",
                ctx.implementation,
                section.name,
                section.tested(),
                section.failed()
            );
            builder.record(section);
        };

        for spec in &self.catalog.expectations.sections {
            record(builder, run_section(ctx, spec).await?);
        }

        let plan = &self.catalog.expectations.interactions;
        if let Some(menu) = &plan.mobile_menu {
            record(builder, check_mobile_menu(ctx, menu).await?);
        }
        if let Some(accordion) = &plan.accordion {
            record(builder, check_accordion(ctx, accordion).await?);
        }
        if let Some(consent) = &plan.consent {
            record(builder, check_consent(ctx, consent).await?);
        }
        if !plan.hover.is_empty() {
            record(builder, check_hover(ctx, &plan.hover_section, &plan.hover).await?);
        }

        if let Some(responsive) = &self.catalog.expectations.responsive {
            record(builder, run_responsive(ctx, responsive).await?);
        }
        Ok(())
    }

    /// Extract every informative property of `role`, for authoring
    /// expectations
    pub async fn capture(
        &self,
        implementation: ImplementationId,
        session: &dyn PageSession,
        role: &Role,
        viewport: Option<&str>,
    ) -> HarnessResult<Capture> {
        let ctx = self.context(implementation, session)?;
        let selector = match ctx.resolve(role)? {
            Resolution::Selector(selector) => selector,
            Resolution::NotApplicable => return Ok(Capture::NotApplicable),
        };
        let viewport = match viewport {
            Some(name) => ctx.viewport_named(name)?,
            None => ctx.viewport,
        };

        session.set_viewport(viewport).await?;
        ctx.load_page(NAVIGATION_ATTEMPTS).await?;
        match extract_all(session, role, &selector, ctx.timeouts.selector()).await {
            Ok(set) => Ok(Capture::Captured(set)),
            Err(ExtractError::ElementNotFound { selector, waited }) => Ok(Capture::NotFound {
                selector,
                waited_ms: waited.as_millis(),
            }),
            Err(ExtractError::Session(e)) => Err(e),
        }
    }

    /// Capture against a real browser
    pub async fn capture_in_browser(
        &self,
        implementation: ImplementationId,
        role: &Role,
        viewport: Option<&str>,
    ) -> HarnessResult<Capture> {
        let (_server, session) = self.open(implementation).await?;
        let capture = self.capture(implementation, &session, role, viewport).await;
        if let Err(e) = session.close().await {
            warn!("[{}] closing browser: {}", implementation, e);
        }
        capture
    }
}

/// Run one expectation section's role checks in order
pub async fn run_section(ctx: &RunContext<'_>, spec: &SectionSpec) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(&spec.name);
    for check in &spec.checks {
        check_role(ctx, check, &mut section).await?;
    }
    Ok(section)
}

async fn check_role(ctx: &RunContext<'_>, check: &RoleCheck, section: &mut SectionResult) -> HarnessResult<()> {
    let role = &check.role;
    let selector = match ctx.resolve(role)? {
        Resolution::Selector(selector) => selector,
        Resolution::NotApplicable => {
            debug!("[{}] {} does not exist here, skipping", ctx.implementation, role);
            section.skipped.push(role.clone());
            return Ok(());
        }
    };

    let found = match wait_for_element(ctx.session, &selector, ctx.timeouts.selector()).await {
        Ok(found) => found,
        Err(ExtractError::ElementNotFound { selector, waited }) => {
            debug!("[{}] {} absent after {}ms", ctx.implementation, role, waited.as_millis());
            section.push(
                ValidationResult::fail(
                    role,
                    "presence",
                    FailureKind::ElementNotFound,
                    format!("{}: no element matches '{}'", role, selector),
                )
                .with_selector(selector),
            );
            return Ok(());
        }
        Err(ExtractError::Session(e)) => return Err(e),
    };
    section.push(
        ValidationResult::pass(role, "presence", format!("{}: present after {}ms", role, found.waited.as_millis()))
            .with_selector(&selector),
    );

    if let Some(min) = check.min_count {
        let count = ctx.session.count(&selector).await?;
        let result = if count >= min {
            ValidationResult::pass(role, "count", format!("{}: {} element(s)", role, count))
        } else {
            ValidationResult::fail(
                role,
                "count",
                FailureKind::PropertyMismatch,
                format!("{}.count: expected at least {}, got {}", role, min, count),
            )
        };
        section.push(result.with_selector(&selector));
    }

    if !check.properties.is_empty() {
        let properties: Vec<&str> = check.properties.keys().map(String::as_str).collect();
        match extract(ctx.session, role, &selector, &properties, ctx.timeouts.selector()).await {
            Ok(set) => {
                for result in match_properties(&set, &check.properties) {
                    section.push(result);
                }
            }
            Err(ExtractError::ElementNotFound { selector, .. }) => section.push(
                ValidationResult::fail(
                    role,
                    "presence",
                    FailureKind::ElementNotFound,
                    format!("{}: '{}' disappeared before its styles were read", role, selector),
                )
                .with_selector(selector),
            ),
            Err(ExtractError::Session(e)) => return Err(e),
        }
    }

    for (name, expectation) in &check.attributes {
        let value = ctx.session.attribute(&selector, 0, name).await?;
        let check_name = format!("@{}", name);
        section.push(match_value(role, &check_name, value.as_deref(), expectation).with_selector(&selector));
    }

    if let Some(expectation) = &check.text {
        let text = ctx.session.text(&selector, 0).await?;
        let text = text.as_deref().map(str::trim);
        section.push(match_value(role, "text", text, expectation).with_selector(&selector));
    }
    Ok(())
}
