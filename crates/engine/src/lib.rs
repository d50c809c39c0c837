//! uiparity parity engine
//!
//! Renders a baseline and a candidate implementation of the same page and
//! checks, role by role and property by property, that the candidate
//! matches, while tolerating declared deviations and exercising
//! interactive widgets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ParityRunner (one per target)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  resolver    role -> selector | NotApplicable               │
//! │  extractor   selector -> PropertySet | ElementNotFound      │
//! │  matcher     (value, Expectation) -> ValidationResult       │
//! │  overrides   candidate failures -> suppressed               │
//! │  interactive menu / accordion / consent / hover             │
//! │  responsive  extraction per viewport                        │
//! │  report      sections -> RunReport, compare -> ParityGap    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageSession (trait)                                        │
//! │    ├── PlaywrightSession   node bridge, JSON lines          │
//! │    └── MemoryPage          in-memory page (`testing`)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod interactive;
pub mod matcher;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod overrides;
pub mod playwright;
pub mod report;
pub mod resolver;
pub mod responsive;
pub mod runner;
pub mod server;
pub mod session;
pub mod wait;

pub use config::HarnessConfig;
pub use context::RunContext;
pub use error::{HarnessError, HarnessResult};
pub use report::{compare, ParityGap, RunOutcome, RunReport};
pub use runner::{Capture, ParityRunner};
pub use session::PageSession;
