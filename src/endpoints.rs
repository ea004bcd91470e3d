//! The API endpoints URIs.

/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/health";
/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for the user's spending summary.
pub const TRANSACTION_STATS: &str = "/api/transactions/stats";
/// The route for the user's flagged transactions.
pub const FLAGGED_TRANSACTIONS: &str = "/api/transactions/flagged";
/// The route to get, update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to mark a flagged transaction as legitimate.
pub const MARK_LEGITIMATE: &str = "/api/transactions/{transaction_id}/legitimate";
/// The route for the dashboard summary.
pub const DASHBOARD_SUMMARY: &str = "/api/dashboard/summary";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_endpoint("/api/transactions/{transaction_id}", 1), "/api/transactions/1");
/// ```
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    match (endpoint_path.find('{'), endpoint_path.find('}')) {
        (Some(start), Some(end)) => format!(
            "{}{}{}",
            &endpoint_path[..start],
            id,
            &endpoint_path[end + 1..]
        ),
        _ => endpoint_path.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{MARK_LEGITIMATE, TRANSACTION, TRANSACTIONS, format_endpoint};

    #[test]
    fn formats_parameterised_endpoints() {
        assert_eq!(format_endpoint(TRANSACTION, 12), "/api/transactions/12");
        assert_eq!(
            format_endpoint(MARK_LEGITIMATE, 3),
            "/api/transactions/3/legitimate"
        );
        assert_eq!(format_endpoint(TRANSACTIONS, 3), "/api/transactions");
    }
}
