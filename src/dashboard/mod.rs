//! State shared by the dashboard views.
//!
//! - [`ledger`]: Optimistic and confirmed credit balances.
//! - [`highlight`]: Dependency highlighting driven by selection.
//! - [`refresh`]: Background reload of users, programs and functions.

pub mod highlight;
pub mod ledger;
pub mod refresh;

pub use highlight::{DependencyHighlighter, DependencySet};
pub use ledger::CreditLedger;
pub use refresh::{DashboardSnapshot, RefreshHandle, Refresher, TickOutcome};
