//! Interactive state driver
//!
//! Each widget is driven as an explicit state machine. A transition that
//! does not settle within the transition bound is recorded as an
//! `InteractionFailure`; only session-level errors abort the run.

use std::time::Duration;
use tracing::{debug, info, warn};

use uiparity_common::{
    AccordionSpec, ConsentSpec, FailureKind, HoverSpec, MobileMenuSpec, PolicyLinkSpec, Role, SectionResult,
    ValidationResult,
};

use crate::context::{recoverable, RunContext};
use crate::error::{HarnessError, HarnessResult};
use crate::extractor::{extract, wait_for_element, ExtractError};
use crate::matcher::match_value;
use crate::resolver::Resolution;
use crate::wait::{await_condition, WaitError};

const EXPANDED: &str = "aria-expanded";

/// Mobile menu lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl MenuState {
    /// State entered when the toggle is activated
    pub fn activate(self) -> Self {
        match self {
            MenuState::Closed => MenuState::Opening,
            MenuState::Open => MenuState::Closing,
            transitional => transitional,
        }
    }

    /// State reached once a transition settles
    pub fn settle(self) -> Self {
        match self {
            MenuState::Opening => MenuState::Open,
            MenuState::Closing => MenuState::Closed,
            stable => stable,
        }
    }

    pub fn is_expanded(self) -> bool {
        matches!(self, MenuState::Open | MenuState::Opening)
    }
}

/// Accordion item lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Collapsed,
    Expanded,
}

impl ItemState {
    fn from_flag(flag: Option<&str>) -> Self {
        if flag == Some("true") {
            ItemState::Expanded
        } else {
            ItemState::Collapsed
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ItemState::Collapsed => ItemState::Expanded,
            ItemState::Expanded => ItemState::Collapsed,
        }
    }
}

/// Consent banner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Hidden,
    Shown,
    Accepted,
    Rejected,
    SettingsOpened,
}

/// Resolve every role or report the first that is not applicable
fn resolve_all(ctx: &RunContext<'_>, roles: &[&Role]) -> HarnessResult<Result<Vec<String>, Role>> {
    let mut selectors = Vec::with_capacity(roles.len());
    for role in roles {
        match ctx.resolve(role)? {
            Resolution::Selector(selector) => selectors.push(selector),
            Resolution::NotApplicable => return Ok(Err((*role).clone())),
        }
    }
    Ok(Ok(selectors))
}

/// Wait until a toggle's expansion flag and its region's visibility agree
/// with `expanded`
async fn await_expansion(
    ctx: &RunContext<'_>,
    control: (&str, usize),
    region: (&str, usize),
    expanded: bool,
) -> HarnessResult<Result<Duration, Duration>> {
    let session = ctx.session;
    let want = expanded.to_string();
    let want = want.as_str();
    let outcome = await_condition(ctx.timeouts.transition(), move || async move {
        let flag = session.attribute(control.0, control.1, EXPANDED).await?;
        let visible = session.is_visible(region.0, region.1).await?;
        Ok::<_, HarnessError>(flag.as_deref() == Some(want) && visible == expanded)
    })
    .await;
    match outcome {
        Ok(found) => Ok(Ok(found.waited)),
        Err(WaitError::TimedOut { waited }) => Ok(Err(waited)),
        Err(WaitError::Session(e)) => Err(e),
    }
}

/// Describe where a stuck transition stopped
async fn describe_stuck(
    ctx: &RunContext<'_>,
    control: (&str, usize),
    region: (&str, usize),
) -> HarnessResult<String> {
    let flag = ctx.session.attribute(control.0, control.1, EXPANDED).await?;
    let visible = ctx.session.is_visible(region.0, region.1).await?;
    Ok(format!(
        "{}={} and region {}",
        EXPANDED,
        flag.as_deref().unwrap_or("<absent>"),
        if visible { "visible" } else { "hidden" }
    ))
}

/// Attribute selector for an element id. Generated ids such as
/// `radix-:r1:` are not valid in `#id` form.
fn id_selector(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\a "),
            c => escaped.push(c),
        }
    }
    format!("[id=\"{}\"]", escaped)
}

/// Record a step the page rejected as a failed check.
///
/// Only `Browser` errors are recorded; a dead bridge or a timed-out
/// request still aborts the run.
fn record_rejection(
    ctx: &RunContext<'_>,
    section: &mut SectionResult,
    role: &Role,
    check: &str,
    selector: &str,
    outcome: HarnessResult<()>,
) -> HarnessResult<()> {
    let Err(e) = outcome else {
        return Ok(());
    };
    let reason = recoverable(e)?;
    warn!("[{}] {} ({}): {}", ctx.implementation, role, check, reason);
    section.push(
        ValidationResult::fail(role, check, FailureKind::InteractionFailure, format!("{}: {}", role, reason))
            .with_selector(selector),
    );
    Ok(())
}

/// Drive the mobile menu Closed -> Open -> Closed
pub async fn check_mobile_menu(ctx: &RunContext<'_>, spec: &MobileMenuSpec) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(&spec.section);
    let (toggle, panel) = match resolve_all(ctx, &[&spec.toggle, &spec.panel])? {
        Ok(selectors) => (selectors[0].clone(), selectors[1].clone()),
        Err(role) => {
            section.skipped.push(role);
            return Ok(section);
        }
    };

    let viewport = match &spec.viewport {
        Some(name) => ctx.viewport_named(name)?,
        None => ctx.viewport,
    };
    ctx.enter_viewport(viewport).await?;
    let outcome = drive_menu(ctx, spec, &toggle, &panel, &mut section).await;
    ctx.restore_viewport(viewport).await?;
    record_rejection(ctx, &mut section, &spec.toggle, "menu", &toggle, outcome)?;

    if spec.viewport.is_some() {
        let tag = viewport.name.clone();
        section.results = section
            .results
            .into_iter()
            .map(|r| r.with_viewport(tag.clone()))
            .collect();
    }
    Ok(section)
}

async fn drive_menu(
    ctx: &RunContext<'_>,
    spec: &MobileMenuSpec,
    toggle: &str,
    panel: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    let role = &spec.toggle;
    let record = |result: ValidationResult| result.with_selector(toggle);

    match wait_for_element(ctx.session, toggle, ctx.timeouts.selector()).await {
        Ok(_) => {}
        Err(ExtractError::ElementNotFound { selector, .. }) => {
            section.push(record(ValidationResult::fail(
                role,
                "menu.toggle",
                FailureKind::ElementNotFound,
                format!("{}: no menu toggle matches '{}'", role, selector),
            )));
            return Ok(());
        }
        Err(ExtractError::Session(e)) => return Err(e),
    }

    let initial = ctx.session.attribute(toggle, 0, EXPANDED).await?;
    if initial.as_deref() == Some("true") {
        section.push(record(ValidationResult::fail(
            role,
            "menu.initial",
            FailureKind::InteractionFailure,
            format!("{}: menu starts open ({}=true)", role, EXPANDED),
        )));
        return Ok(());
    }

    let mut state = MenuState::Closed;
    for (check, closing) in [("menu.opens", false), ("menu.closes", true)] {
        state = state.activate();
        debug!("[{}] {} -> {:?}", ctx.implementation, role, state);
        if let Err(e) = ctx.session.click(toggle, 0).await {
            let reason = recoverable(e)?;
            section.push(record(ValidationResult::fail(
                role,
                check,
                FailureKind::InteractionFailure,
                format!("{}: {}", role, reason),
            )));
            return Ok(());
        }

        let target = state.settle();
        match await_expansion(ctx, (toggle, 0), (panel, 0), target.is_expanded()).await? {
            Ok(waited) => {
                state = target;
                section.push(record(ValidationResult::pass(
                    role,
                    check,
                    format!("{}: {:?} after {}ms", role, state, waited.as_millis()),
                )));
            }
            Err(waited) => {
                debug!("[{}] {} gave up on {:?} after {}ms", ctx.implementation, role, target, waited.as_millis());
                let observed = describe_stuck(ctx, (toggle, 0), (panel, 0)).await?;
                section.push(record(ValidationResult::fail(
                    role,
                    check,
                    FailureKind::InteractionFailure,
                    format!("{}: stuck in {:?}, expected {:?} but {}", role, state, target, observed),
                )));
                return Ok(());
            }
        }

        if !closing {
            if let Some(focus_role) = &spec.focus_target {
                check_focus(ctx, focus_role, section).await?;
            }
        }
    }

    if spec.close_on_escape {
        check_escape(ctx, role, toggle, panel, section).await?;
    }
    Ok(())
}

async fn check_focus(ctx: &RunContext<'_>, role: &Role, section: &mut SectionResult) -> HarnessResult<()> {
    let selector = match ctx.resolve(role)? {
        Resolution::Selector(selector) => selector,
        Resolution::NotApplicable => {
            section.skipped.push(role.clone());
            return Ok(());
        }
    };
    let session = ctx.session;
    let target = selector.as_str();
    let outcome = await_condition(ctx.timeouts.transition(), move || async move {
        session.is_focused(target).await
    })
    .await;
    let result = match outcome {
        Ok(_) => ValidationResult::pass(role, "menu.focus", format!("{}: focused after opening", role)),
        Err(WaitError::TimedOut { .. }) => ValidationResult::fail(
            role,
            "menu.focus",
            FailureKind::InteractionFailure,
            format!("{}: not focused after opening", role),
        ),
        Err(WaitError::Session(e)) => return Err(e),
    };
    section.push(result.with_selector(selector));
    Ok(())
}

async fn check_escape(
    ctx: &RunContext<'_>,
    role: &Role,
    toggle: &str,
    panel: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    let fail = |message: String| {
        ValidationResult::fail(role, "menu.escape", FailureKind::InteractionFailure, message).with_selector(toggle)
    };

    if let Err(e) = ctx.session.click(toggle, 0).await {
        section.push(fail(format!("{}: {}", role, recoverable(e)?)));
        return Ok(());
    }
    if await_expansion(ctx, (toggle, 0), (panel, 0), true).await?.is_err() {
        section.push(fail(format!("{}: menu did not reopen before Escape", role)));
        return Ok(());
    }

    ctx.session.press("Escape").await?;
    match await_expansion(ctx, (toggle, 0), (panel, 0), false).await? {
        Ok(waited) => section.push(
            ValidationResult::pass(role, "menu.escape", format!("{}: Escape closed the menu in {}ms", role, waited.as_millis()))
                .with_selector(toggle),
        ),
        Err(_) => {
            let observed = describe_stuck(ctx, (toggle, 0), (panel, 0)).await?;
            section.push(fail(format!("{}: Escape left the menu open, {}", role, observed)));
        }
    }
    Ok(())
}

/// Expand then collapse the first collapsed accordion item
pub async fn check_accordion(ctx: &RunContext<'_>, spec: &AccordionSpec) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(&spec.section);
    let (item, content) = match resolve_all(ctx, &[&spec.item, &spec.content])? {
        Ok(selectors) => (selectors[0].clone(), selectors[1].clone()),
        Err(role) => {
            section.skipped.push(role);
            return Ok(section);
        }
    };

    let outcome = drive_accordion(ctx, &spec.item, &item, content, &mut section).await;
    record_rejection(ctx, &mut section, &spec.item, "accordion", &item, outcome)?;
    Ok(section)
}

async fn drive_accordion(
    ctx: &RunContext<'_>,
    role: &Role,
    item: &str,
    content: String,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    match wait_for_element(ctx.session, item, ctx.timeouts.selector()).await {
        Ok(_) => {}
        Err(ExtractError::ElementNotFound { selector, .. }) => {
            section.push(
                ValidationResult::fail(
                    role,
                    "accordion.item",
                    FailureKind::ElementNotFound,
                    format!("{}: no accordion item matches '{}'", role, selector),
                )
                .with_selector(item),
            );
            return Ok(());
        }
        Err(ExtractError::Session(e)) => return Err(e),
    }

    let count = ctx.session.count(item).await?;
    let mut collapsed = None;
    for index in 0..count {
        let flag = ctx.session.attribute(item, index, EXPANDED).await?;
        if ItemState::from_flag(flag.as_deref()) == ItemState::Collapsed {
            collapsed = Some(index);
            break;
        }
    }
    let Some(index) = collapsed else {
        section.push(
            ValidationResult::fail(
                role,
                "accordion.item",
                FailureKind::InteractionFailure,
                format!("{}: all {} items are already expanded", role, count),
            )
            .with_selector(item),
        );
        return Ok(());
    };

    // Prefer the region the control points at
    let controls = ctx.session.attribute(item, index, "aria-controls").await?;
    let (region, region_index) = match controls.as_deref().and_then(|ids| ids.split_whitespace().next()) {
        Some(id) => (id_selector(id), 0),
        None => (content, index),
    };
    debug!("[{}] {}[{}] controls {}[{}]", ctx.implementation, role, index, region, region_index);

    let mut state = ItemState::Collapsed;
    for check in ["accordion.expand", "accordion.collapse"] {
        let target = state.toggled();
        if let Err(e) = ctx.session.click(item, index).await {
            section.push(
                ValidationResult::fail(
                    role,
                    check,
                    FailureKind::InteractionFailure,
                    format!("{}[{}]: {}", role, index, recoverable(e)?),
                )
                .with_selector(item),
            );
            return Ok(());
        }

        let expanded = target == ItemState::Expanded;
        match await_expansion(ctx, (item, index), (&region, region_index), expanded).await? {
            Ok(waited) => {
                state = target;
                section.push(
                    ValidationResult::pass(
                        role,
                        check,
                        format!("{}[{}]: {:?} after {}ms", role, index, state, waited.as_millis()),
                    )
                    .with_selector(item),
                );
            }
            Err(waited) => {
                debug!("[{}] {}[{}] gave up on {:?} after {}ms", ctx.implementation, role, index, target, waited.as_millis());
                let observed = describe_stuck(ctx, (item, index), (&region, region_index)).await?;
                section.push(
                    ValidationResult::fail(
                        role,
                        check,
                        FailureKind::InteractionFailure,
                        format!("{}[{}]: expected {:?} but {}", role, index, target, observed),
                    )
                    .with_selector(item),
                );
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Wait for `selector` to be present and visible
async fn await_visible(ctx: &RunContext<'_>, selector: &str, visible: bool) -> HarnessResult<bool> {
    let session = ctx.session;
    let outcome = await_condition(ctx.timeouts.transition(), move || async move {
        Ok::<_, HarnessError>(session.is_visible(selector, 0).await? == visible)
    })
    .await;
    match outcome {
        Ok(_) => Ok(true),
        Err(WaitError::TimedOut { .. }) => Ok(false),
        Err(WaitError::Session(e)) => Err(e),
    }
}

/// Exercise the consent banner, then check the static policy links.
///
/// A page without a banner is valid: only the policy links are checked.
pub async fn check_consent(ctx: &RunContext<'_>, spec: &ConsentSpec) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(&spec.section);

    match ctx.resolve(&spec.banner)? {
        Resolution::NotApplicable => section.skipped.push(spec.banner.clone()),
        Resolution::Selector(banner) => {
            let outcome = exercise_banner(ctx, spec, &banner, &mut section).await;
            record_rejection(ctx, &mut section, &spec.banner, "consent", &banner, outcome)?;
        }
    }

    for link in &spec.policy_links {
        let selector = match ctx.resolve(&link.role)? {
            Resolution::Selector(selector) => selector,
            Resolution::NotApplicable => {
                section.skipped.push(link.role.clone());
                continue;
            }
        };
        let outcome = check_policy_link(ctx, link, &selector, &mut section).await;
        record_rejection(ctx, &mut section, &link.role, "@href", &selector, outcome)?;
    }
    Ok(section)
}

async fn exercise_banner(
    ctx: &RunContext<'_>,
    spec: &ConsentSpec,
    banner: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    if await_visible(ctx, banner, true).await? {
        section.push(
            ValidationResult::pass(&spec.banner, "consent.shown", format!("{}: banner shown", spec.banner))
                .with_selector(banner),
        );
        drive_consent(ctx, spec, banner, section).await
    } else {
        info!(
            "[{}] no consent banner ({}), checking policy links only",
            ctx.implementation, banner
        );
        Ok(())
    }
}

async fn check_policy_link(
    ctx: &RunContext<'_>,
    link: &PolicyLinkSpec,
    selector: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    match wait_for_element(ctx.session, selector, ctx.timeouts.selector()).await {
        Ok(_) => {
            let href = ctx.session.attribute(selector, 0, "href").await?;
            section.push(match_value(&link.role, "@href", href.as_deref(), &link.href).with_selector(selector));
        }
        Err(ExtractError::ElementNotFound { selector, .. }) => section.push(
            ValidationResult::fail(
                &link.role,
                "@href",
                FailureKind::ElementNotFound,
                format!("{}: no link matches '{}'", link.role, selector),
            )
            .with_selector(selector),
        ),
        Err(ExtractError::Session(e)) => return Err(e),
    }
    Ok(())
}

async fn drive_consent(
    ctx: &RunContext<'_>,
    spec: &ConsentSpec,
    banner: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    let flows = [
        (&spec.accept, ConsentState::Accepted, "consent.accept"),
        (&spec.reject, ConsentState::Rejected, "consent.reject"),
        (&spec.settings, ConsentState::SettingsOpened, "consent.settings"),
    ];

    let mut exercised = false;
    for (control, outcome, check) in flows {
        let Some(control) = control else { continue };
        let selector = match ctx.resolve(control)? {
            Resolution::Selector(selector) => selector,
            Resolution::NotApplicable => {
                section.skipped.push(control.clone());
                continue;
            }
        };

        // Each flow starts from a banner nobody has answered yet
        if exercised {
            ctx.fresh_page().await?;
        }
        exercised = true;

        let mut state = ConsentState::Hidden;
        if await_visible(ctx, banner, true).await? {
            state = ConsentState::Shown;
        }
        if state != ConsentState::Shown {
            section.push(
                ValidationResult::fail(
                    &spec.banner,
                    check,
                    FailureKind::InteractionFailure,
                    format!("{}: banner did not reappear after clearing storage", spec.banner),
                )
                .with_selector(banner),
            );
            continue;
        }

        if let Err(e) = ctx.session.click(&selector, 0).await {
            section.push(
                ValidationResult::fail(
                    control,
                    check,
                    FailureKind::InteractionFailure,
                    format!("{}: {}", control, recoverable(e)?),
                )
                .with_selector(&selector),
            );
            continue;
        }

        let (settled, expected) = match (outcome, &spec.settings_panel) {
            (ConsentState::SettingsOpened, Some(panel_role)) => match ctx.resolve(panel_role)? {
                Resolution::Selector(panel) => (
                    await_visible(ctx, &panel, true).await?,
                    format!("settings panel '{}' visible", panel),
                ),
                Resolution::NotApplicable => {
                    section.skipped.push(panel_role.clone());
                    continue;
                }
            },
            // Settings without a declared panel: activation is all we can assert
            (ConsentState::SettingsOpened, None) => (true, "settings control activated".to_string()),
            _ => (await_visible(ctx, banner, false).await?, "banner dismissed".to_string()),
        };

        let result = if settled {
            state = outcome;
            ValidationResult::pass(control, check, format!("{}: {:?}, {}", control, state, expected))
        } else {
            ValidationResult::fail(
                control,
                check,
                FailureKind::InteractionFailure,
                format!("{}: expected {:?} ({})", control, outcome, expected),
            )
        };
        section.push(result.with_selector(&selector));
    }

    // Leave the page as a first-time visitor would see it
    if exercised {
        ctx.fresh_page().await?;
    }
    Ok(())
}

/// Hover each role and match its hover-state properties
pub async fn check_hover(
    ctx: &RunContext<'_>,
    section_name: &str,
    specs: &[HoverSpec],
) -> HarnessResult<SectionResult> {
    let mut section = SectionResult::new(section_name);
    for spec in specs {
        let selector = match ctx.resolve(&spec.role)? {
            Resolution::Selector(selector) => selector,
            Resolution::NotApplicable => {
                section.skipped.push(spec.role.clone());
                continue;
            }
        };
        let outcome = hover_role(ctx, spec, &selector, &mut section).await;
        record_rejection(ctx, &mut section, &spec.role, "hover", &selector, outcome)?;
    }
    Ok(section)
}

async fn hover_role(
    ctx: &RunContext<'_>,
    spec: &HoverSpec,
    selector: &str,
    section: &mut SectionResult,
) -> HarnessResult<()> {
    let role = &spec.role;
    match wait_for_element(ctx.session, selector, ctx.timeouts.selector()).await {
        Ok(_) => {}
        Err(ExtractError::ElementNotFound { selector, .. }) => {
            section.push(
                ValidationResult::fail(
                    role,
                    "hover",
                    FailureKind::ElementNotFound,
                    format!("{}: no element matches '{}'", role, selector),
                )
                .with_selector(selector),
            );
            return Ok(());
        }
        Err(ExtractError::Session(e)) => return Err(e),
    }

    // A failed hover is recorded by the caller
    ctx.session.hover(selector, 0).await?;

    let properties: Vec<&str> = spec.properties.keys().map(String::as_str).collect();
    let set = match extract(ctx.session, role, selector, &properties, ctx.timeouts.selector()).await {
        Ok(set) => set,
        Err(ExtractError::Session(e)) => return Err(e),
        Err(not_found) => {
            section.push(
                ValidationResult::fail(role, "hover", FailureKind::ElementNotFound, format!("{}: {}", role, not_found))
                    .with_selector(selector),
            );
            return Ok(());
        }
    };
    for (property, expectation) in &spec.properties {
        let check = format!("hover:{}", property);
        section.push(match_value(role, &check, set.get(property), expectation).with_selector(selector));
    }
    Ok(())
}
