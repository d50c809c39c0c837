//! Deterministic in-memory page
//!
//! [`MemoryPage`] implements [`PageSession`] over a flat list of elements.
//! Selectors are matched by exact string: an element answers to every
//! selector it was built with. Clicks and key presses apply scripted
//! [`Effect`]s, navigation restores the page to its initial state, and a
//! small persistent storage survives navigation until `reset_state`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use uiparity_common::Viewport;

use crate::error::{HarnessError, HarnessResult};
use crate::session::PageSession;

/// Index of an element within a [`MemoryPage`]
pub type ElementId = usize;

/// A scripted reaction to a click or key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Flip `name` between `"true"` and `"false"` on the target
    ToggleFlag { target: ElementId, name: String },
    SetAttribute { target: ElementId, name: String, value: String },
    ToggleVisible(ElementId),
    Show(ElementId),
    Hide(ElementId),
    Focus(ElementId),
    /// Persist a storage key across navigations
    Store(String),
}

impl Effect {
    pub fn toggle_expanded(target: ElementId) -> Self {
        Effect::ToggleFlag {
            target,
            name: "aria-expanded".to_string(),
        }
    }

    pub fn set_expanded(target: ElementId, expanded: bool) -> Self {
        Effect::SetAttribute {
            target,
            name: "aria-expanded".to_string(),
            value: expanded.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryElement {
    selectors: Vec<String>,
    styles: BTreeMap<String, String>,
    /// (max viewport width, styles) applied when the viewport is that narrow
    narrow_styles: Vec<(u32, BTreeMap<String, String>)>,
    hover_styles: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    text: String,
    visible: bool,
    parent: Option<ElementId>,
    on_click: Vec<Effect>,
    hidden_when_stored: Option<String>,
}

impl MemoryElement {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selectors: vec![selector.into()],
            visible: true,
            ..Default::default()
        }
    }

    /// Also answer to `selector`
    pub fn matches(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    /// Style that applies while the viewport is at most `max_width` wide
    pub fn style_below(
        mut self,
        max_width: u32,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        match self.narrow_styles.iter_mut().find(|(w, _)| *w == max_width) {
            Some((_, styles)) => {
                styles.insert(property.into(), value.into());
            }
            None => {
                let mut styles = BTreeMap::new();
                styles.insert(property.into(), value.into());
                self.narrow_styles.push((max_width, styles));
            }
        }
        self
    }

    pub fn hover_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.hover_styles.insert(property.into(), value.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Nest under `parent`; hiding the parent hides this element
    pub fn inside(mut self, parent: ElementId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    /// Hide this element once `key` is in storage
    pub fn hidden_when_stored(mut self, key: impl Into<String>) -> Self {
        self.hidden_when_stored = Some(key.into());
        self
    }

    fn answers_to(&self, selector: &str) -> bool {
        self.selectors.iter().any(|s| s == selector)
    }

    fn computed(&self, width: u32, hovered: bool) -> BTreeMap<String, String> {
        let mut values = self.styles.clone();
        let mut narrow: Vec<_> = self.narrow_styles.iter().filter(|(max, _)| width <= *max).collect();
        // Widest breakpoint first so the narrowest one wins
        narrow.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, styles) in narrow {
            values.extend(styles.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if hovered {
            values.extend(self.hover_styles.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        values
    }
}

#[derive(Debug, Default)]
struct PageState {
    initial: Vec<MemoryElement>,
    live: Vec<MemoryElement>,
    key_effects: HashMap<String, Vec<Effect>>,
    storage: BTreeSet<String>,
    viewport: Option<Viewport>,
    hovered: Option<ElementId>,
    focused: Option<ElementId>,
    url: Option<String>,
    navigations: usize,
    failing_navigations: usize,
    /// Selectors every query fails on
    rejected: BTreeSet<String>,
    closed: bool,
}

impl PageState {
    fn width(&self) -> u32 {
        self.viewport.as_ref().map(|v| v.width).unwrap_or(DEFAULT_WIDTH)
    }

    fn nth(&self, selector: &str, index: usize) -> Option<ElementId> {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, e)| e.answers_to(selector))
            .map(|(id, _)| id)
            .nth(index)
    }

    fn visible(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(element) = self.live.get(id) else {
                return false;
            };
            if !element.visible {
                return false;
            }
            if let Some(key) = &element.hidden_when_stored {
                if self.storage.contains(key) {
                    return false;
                }
            }
            current = element.parent;
        }
        true
    }

    fn within(&self, id: ElementId, selector: &str) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.live.get(id) {
                Some(element) if element.answers_to(selector) => return true,
                Some(element) => current = element.parent,
                None => return false,
            }
        }
        false
    }

    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::ToggleFlag { target, name } => {
                if let Some(element) = self.live.get_mut(*target) {
                    let next = match element.attributes.get(name).map(String::as_str) {
                        Some("true") => "false",
                        _ => "true",
                    };
                    element.attributes.insert(name.clone(), next.to_string());
                }
            }
            Effect::SetAttribute { target, name, value } => {
                if let Some(element) = self.live.get_mut(*target) {
                    element.attributes.insert(name.clone(), value.clone());
                }
            }
            Effect::ToggleVisible(target) => {
                if let Some(element) = self.live.get_mut(*target) {
                    element.visible = !element.visible;
                }
            }
            Effect::Show(target) => {
                if let Some(element) = self.live.get_mut(*target) {
                    element.visible = true;
                }
            }
            Effect::Hide(target) => {
                if let Some(element) = self.live.get_mut(*target) {
                    element.visible = false;
                }
            }
            Effect::Focus(target) => self.focused = Some(*target),
            Effect::Store(key) => {
                self.storage.insert(key.clone());
            }
        }
    }

    fn ensure_open(&self) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::Bridge("page is closed".to_string()));
        }
        Ok(())
    }

    fn accept(&self, op: &str, selector: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        if self.rejected.contains(selector) {
            return Err(HarnessError::Browser {
                op: op.to_string(),
                reason: format!("'{}' is not a valid selector", selector),
            });
        }
        Ok(())
    }
}

const DEFAULT_WIDTH: u32 = 1440;

/// An in-memory [`PageSession`]
#[derive(Debug, Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element to both the live page and its initial snapshot
    pub fn add(&self, element: MemoryElement) -> ElementId {
        let mut state = self.state.lock();
        state.initial.push(element.clone());
        state.live.push(element);
        state.live.len() - 1
    }

    /// Apply `effects` whenever `key` is pressed
    pub fn on_key(&self, key: impl Into<String>, effects: Vec<Effect>) {
        self.state.lock().key_effects.entry(key.into()).or_default().extend(effects);
    }

    /// Make the next `count` navigations fail
    pub fn fail_navigations(&self, count: usize) {
        self.state.lock().failing_navigations = count;
    }

    /// Fail every query for `selector` as a browser does for invalid CSS
    pub fn reject_selector(&self, selector: impl Into<String>) {
        self.state.lock().rejected.insert(selector.into());
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().navigations
    }

    pub fn url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.state.lock().viewport.clone()
    }

    pub fn stored(&self, key: &str) -> bool {
        self.state.lock().storage.contains(key)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl PageSession for MemoryPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.navigations += 1;
        if state.failing_navigations > 0 {
            state.failing_navigations -= 1;
            return Err(HarnessError::Browser {
                op: "goto".to_string(),
                reason: format!("net::ERR_CONNECTION_REFUSED at {}", url),
            });
        }
        state.live = state.initial.clone();
        state.hovered = None;
        state.focused = None;
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn count(&self, selector: &str) -> HarnessResult<usize> {
        let state = self.state.lock();
        state.accept("count", selector)?;
        Ok(state.live.iter().filter(|e| e.answers_to(selector)).count())
    }

    async fn computed_style(
        &self,
        selector: &str,
        index: usize,
        properties: &[&str],
    ) -> HarnessResult<Option<BTreeMap<String, String>>> {
        let state = self.state.lock();
        state.accept("style", selector)?;
        let Some(id) = state.nth(selector, index) else {
            return Ok(None);
        };
        let computed = state.live[id].computed(state.width(), state.hovered == Some(id));
        Ok(Some(
            computed
                .into_iter()
                .filter(|(name, _)| properties.contains(&name.as_str()))
                .collect(),
        ))
    }

    async fn attribute(&self, selector: &str, index: usize, name: &str) -> HarnessResult<Option<String>> {
        let state = self.state.lock();
        state.accept("attribute", selector)?;
        Ok(state
            .nth(selector, index)
            .and_then(|id| state.live[id].attributes.get(name).cloned()))
    }

    async fn text(&self, selector: &str, index: usize) -> HarnessResult<Option<String>> {
        let state = self.state.lock();
        state.accept("text", selector)?;
        Ok(state.nth(selector, index).map(|id| state.live[id].text.clone()))
    }

    async fn is_visible(&self, selector: &str, index: usize) -> HarnessResult<bool> {
        let state = self.state.lock();
        state.accept("visible", selector)?;
        Ok(state.nth(selector, index).map(|id| state.visible(id)).unwrap_or(false))
    }

    async fn is_focused(&self, selector: &str) -> HarnessResult<bool> {
        let state = self.state.lock();
        state.accept("focused", selector)?;
        Ok(state.focused.map(|id| state.within(id, selector)).unwrap_or(false))
    }

    async fn click(&self, selector: &str, index: usize) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.accept("click", selector)?;
        let id = state.nth(selector, index).ok_or_else(|| HarnessError::Browser {
            op: "click".to_string(),
            reason: format!("no element matches '{}' at index {}", selector, index),
        })?;
        if !state.visible(id) {
            return Err(HarnessError::Browser {
                op: "click".to_string(),
                reason: format!("element '{}' at index {} is not visible", selector, index),
            });
        }
        state.focused = Some(id);
        let effects = state.live[id].on_click.clone();
        for effect in &effects {
            state.apply(effect);
        }
        Ok(())
    }

    async fn hover(&self, selector: &str, index: usize) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.accept("hover", selector)?;
        let id = state.nth(selector, index).ok_or_else(|| HarnessError::Browser {
            op: "hover".to_string(),
            reason: format!("no element matches '{}' at index {}", selector, index),
        })?;
        state.hovered = Some(id);
        Ok(())
    }

    async fn press(&self, key: &str) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let effects = state.key_effects.get(key).cloned().unwrap_or_default();
        for effect in &effects {
            state.apply(effect);
        }
        Ok(())
    }

    async fn set_viewport(&self, viewport: &Viewport) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.viewport = Some(viewport.clone());
        Ok(())
    }

    async fn reset_state(&self) -> HarnessResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.storage.clear();
        Ok(())
    }

    async fn close(&self) -> HarnessResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_click_effects_and_navigation_reset() {
        let page = MemoryPage::new();
        let panel = page.add(MemoryElement::new("#menu").hidden());
        page.add(
            MemoryElement::new("button.menu")
                .attr("aria-expanded", "false")
                .on_click(Effect::toggle_expanded(1))
                .on_click(Effect::ToggleVisible(panel)),
        );

        page.click("button.menu", 0).await.unwrap();
        assert_eq!(
            page.attribute("button.menu", 0, "aria-expanded").await.unwrap().as_deref(),
            Some("true")
        );
        assert!(page.is_visible("#menu", 0).await.unwrap());

        page.navigate("http://localhost/", WAIT).await.unwrap();
        assert!(!page.is_visible("#menu", 0).await.unwrap());
        assert_eq!(page.navigations(), 1);
    }

    async fn font(page: &MemoryPage) -> String {
        let styles = page.computed_style("h1", 0, &["fontSize"]).await.unwrap().unwrap();
        styles["fontSize"].clone()
    }

    #[tokio::test]
    async fn test_narrow_styles_follow_viewport() {
        let page = MemoryPage::new();
        page.add(
            MemoryElement::new("h1")
                .style("fontSize", "60px")
                .style_below(1024, "fontSize", "48px")
                .style_below(480, "fontSize", "36px"),
        );
        assert_eq!(font(&page).await, "60px");
        page.set_viewport(&Viewport::new("tablet", 768, 1024)).await.unwrap();
        assert_eq!(font(&page).await, "48px");
        page.set_viewport(&Viewport::new("mobile", 375, 812)).await.unwrap();
        assert_eq!(font(&page).await, "36px");
    }

    #[tokio::test]
    async fn test_storage_survives_navigation_until_reset() {
        let page = MemoryPage::new();
        let banner = page.add(MemoryElement::new("#consent").hidden_when_stored("consent"));
        page.add(
            MemoryElement::new("#consent .accept")
                .inside(banner)
                .on_click(Effect::Store("consent".into())),
        );

        page.click("#consent .accept", 0).await.unwrap();
        page.navigate("http://localhost/", WAIT).await.unwrap();
        assert!(!page.is_visible("#consent", 0).await.unwrap());
        assert!(!page.is_visible("#consent .accept", 0).await.unwrap());

        page.reset_state().await.unwrap();
        page.navigate("http://localhost/", WAIT).await.unwrap();
        assert!(page.is_visible("#consent", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_scripted_navigation_failure() {
        let page = MemoryPage::new();
        page.fail_navigations(1);
        assert!(page.navigate("http://localhost/", WAIT).await.is_err());
        assert!(page.navigate("http://localhost/", WAIT).await.is_ok());
        assert_eq!(page.url().as_deref(), Some("http://localhost/"));
    }

    #[tokio::test]
    async fn test_focus_inside_selector() {
        let page = MemoryPage::new();
        let nav = page.add(MemoryElement::new("nav.mobile"));
        let link = page.add(MemoryElement::new("nav.mobile a").inside(nav));
        page.add(MemoryElement::new("button").on_click(Effect::Focus(link)));

        assert!(!page.is_focused("nav.mobile").await.unwrap());
        page.click("button", 0).await.unwrap();
        assert!(page.is_focused("nav.mobile").await.unwrap());
        assert!(page.is_focused("nav.mobile a").await.unwrap());
    }

    #[tokio::test]
    async fn test_click_on_hidden_element_is_an_error() {
        let page = MemoryPage::new();
        page.add(MemoryElement::new("button").hidden());
        assert!(matches!(
            page.click("button", 0).await,
            Err(HarnessError::Browser { .. })
        ));
        assert!(page.click("missing", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_selector_fails_every_query() {
        let page = MemoryPage::new();
        page.add(MemoryElement::new("#a:b"));
        page.reject_selector("#a:b");
        assert!(matches!(page.count("#a:b").await, Err(HarnessError::Browser { op, .. }) if op == "count"));
        assert!(page.is_visible("#a:b", 0).await.is_err());
        assert!(page.attribute("#a:b", 0, "id").await.is_err());
        assert_eq!(page.count("#other").await.unwrap(), 0);
    }
}
