//! The browser control seam
//!
//! Everything the pipeline knows about a live page goes through
//! [`PageSession`]. Queries address elements as `(selector, index)` where
//! index 0 is the first match in document order.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use uiparity_common::Viewport;

use crate::error::HarnessResult;

#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load `url` and wait for the initial document to be ready
    async fn navigate(&self, url: &str, timeout: Duration) -> HarnessResult<()>;

    /// Number of elements currently matching `selector`
    async fn count(&self, selector: &str) -> HarnessResult<usize>;

    /// Raw computed values of `properties` for the index-th match, or
    /// `None` when there is no such element
    async fn computed_style(
        &self,
        selector: &str,
        index: usize,
        properties: &[&str],
    ) -> HarnessResult<Option<BTreeMap<String, String>>>;

    async fn attribute(&self, selector: &str, index: usize, name: &str) -> HarnessResult<Option<String>>;

    async fn text(&self, selector: &str, index: usize) -> HarnessResult<Option<String>>;

    /// False when the element is missing
    async fn is_visible(&self, selector: &str, index: usize) -> HarnessResult<bool>;

    /// Whether the active element matches `selector` or sits inside a match
    async fn is_focused(&self, selector: &str) -> HarnessResult<bool>;

    async fn click(&self, selector: &str, index: usize) -> HarnessResult<()>;

    async fn hover(&self, selector: &str, index: usize) -> HarnessResult<()>;

    async fn press(&self, key: &str) -> HarnessResult<()>;

    async fn set_viewport(&self, viewport: &Viewport) -> HarnessResult<()>;

    /// Clear cookies and web storage so persisted UI choices are forgotten
    async fn reset_state(&self) -> HarnessResult<()>;

    async fn close(&self) -> HarnessResult<()>;
}
