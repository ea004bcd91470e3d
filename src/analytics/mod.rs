//! Spending analytics
//!
//! Summarises a user's debits by category and by month, and gathers the
//! figures shown on the dashboard.

mod aggregation;
mod handlers;
mod history;
mod stats;

pub use aggregation::{CategoryTotal, MonthlyTotal};
pub use handlers::{get_dashboard_summary_endpoint, get_spending_stats_endpoint};
pub use stats::{DashboardSummary, SpendingSummary, get_dashboard_summary, get_spending_stats};
