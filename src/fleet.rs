//! Higher-level fleet operations: status, lifecycle ops, fire-and-forget
//! bulk fan-out, creation, and the per-country usage aggregation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::api::{Operation, Sandbox, SandboxAdminApi, expect_success};
use crate::directory::{AssignedSandbox, UserDirectory};
use crate::error::{FleetError, Result};

/// Country key used when the owning administrator's country is unknown.
pub const OTHER_COUNTRY: &str = "Other";

/// Up/down minutes for a single sandbox over a queried window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageRecord {
    pub minutes_up: u64,
    pub minutes_down: u64,
}

/// Running per-country totals plus the set of unique sandbox labels.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CountryUsage {
    pub minutes_up: u64,
    pub minutes_down: u64,
    pub sandboxes: BTreeSet<String>,
}

/// Fleet service built on the admin API and the user directory.
pub struct SandboxFleetService {
    api: Arc<SandboxAdminApi>,
    directory: Arc<dyn UserDirectory>,
}

impl SandboxFleetService {
    pub fn new(api: Arc<SandboxAdminApi>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { api, directory }
    }

    /// Current state of one sandbox.
    pub async fn get_status(&self, sandbox_id: &str) -> Result<Value> {
        self.api.get_status(sandbox_id).await
    }

    /// Run one lifecycle operation on one sandbox.
    pub async fn execute_operation(&self, operation: Operation, sandbox_id: &str) -> Result<Value> {
        self.api.execute_operation(operation, sandbox_id).await
    }

    /// Issue the same operation across many sandboxes without waiting for
    /// any of them. Calls are initiated in input order; completion order is
    /// unspecified. Individual failures are logged and never aggregated into
    /// the bulk result — partial failure is silent to the caller by design.
    pub fn execute_operation_bulk(&self, operation: Operation, sandbox_ids: &[String]) -> String {
        for sandbox_id in sandbox_ids {
            let api = Arc::clone(&self.api);
            let sandbox_id = sandbox_id.clone();
            tokio::spawn(async move {
                if let Err(err) = api.execute_operation(operation, &sandbox_id).await {
                    warn!("bulk {operation} on sandbox {sandbox_id} failed: {err}");
                }
            });
        }

        format!("Bulk operation {operation} executed")
    }

    /// Create a sandbox and return its canonical data. The backend's error
    /// message is surfaced verbatim on failure. The caller is responsible for
    /// durably recording the assignment in the user directory before
    /// acknowledging the command.
    pub async fn create_sandbox(&self, end_of_life_days: u32) -> Result<Sandbox> {
        let response = self.api.create_sandbox(end_of_life_days).await?;
        let data = expect_success(&response, 201)?;
        serde_json::from_value(data)
            .map_err(|err| FleetError::Transport(format!("Invalid create response: {err}")))
    }

    /// Assigned sandboxes the given administrator has access to.
    pub fn used_sandboxes_by_admin(&self, admin_id: &str) -> Vec<AssignedSandbox> {
        self.directory
            .users()
            .into_iter()
            .filter(|user| user.administers(admin_id))
            .filter_map(|user| user.sandbox)
            .collect()
    }

    /// Aggregate up/down minutes per owning administrator's country over a
    /// date window, deduplicating sandbox labels per country.
    ///
    /// Per-sandbox usage fetches run sequentially in list order; a failed or
    /// malformed fetch drops that sandbox's contribution and the aggregation
    /// carries on. Without a country filter every directory country is
    /// present in the result (zero default); with one, at least that key is.
    pub async fn get_sandboxes_usage(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        country: Option<&str>,
    ) -> Result<BTreeMap<String, CountryUsage>> {
        let sandboxes = self.working_sandboxes(start_date, end_date).await?;
        let admin_countries = self.directory.admin_countries();
        let mut usage: BTreeMap<String, CountryUsage> = BTreeMap::new();

        for sandbox in &sandboxes {
            let (Some(id), Some(created_by)) = (sandbox.id.as_deref(), sandbox.created_by.as_deref())
            else {
                continue;
            };

            let admin_country = admin_countries
                .get(created_by)
                .map(String::as_str)
                .unwrap_or(OTHER_COUNTRY);
            if country.is_some_and(|filter| filter != admin_country) {
                continue;
            }

            match self.sandbox_usage(id, start_date, end_date).await {
                Ok(record) => {
                    let entry = usage.entry(admin_country.to_string()).or_default();
                    entry.minutes_up += record.minutes_up;
                    entry.minutes_down += record.minutes_down;
                    entry.sandboxes.insert(sandbox.owner_label());
                }
                Err(err) => {
                    warn!("usage fetch for sandbox {id} failed, skipping: {err}");
                }
            }
        }

        match country {
            None => {
                for known in self.directory.all_countries() {
                    usage.entry(known).or_default();
                }
            }
            Some(filter) => {
                usage.entry(filter.to_string()).or_default();
            }
        }

        Ok(usage)
    }

    /// Sandboxes whose lifetime overlapped the `[start, end]` window,
    /// including entries deleted on the boundary day.
    async fn working_sandboxes(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<Sandbox>> {
        let sandboxes = self.api.list_sandboxes().await?;
        Ok(sandboxes
            .into_iter()
            .filter(|sandbox| overlaps_window(sandbox, start_date, end_date))
            .collect())
    }

    /// Usage for one sandbox over the window. Malformed envelopes and
    /// non-numeric minutes reject with the fetch error rather than a partial
    /// record.
    async fn sandbox_usage(
        &self,
        sandbox_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<UsageRecord> {
        let response = self.api.get_usage(sandbox_id, start_date, end_date).await?;
        let data = expect_success(&response, 200)?;

        let minutes_up = data.get("minutesUp").and_then(coerce_minutes);
        let minutes_down = data.get("minutesDown").and_then(coerce_minutes);
        match (minutes_up, minutes_down) {
            (Some(minutes_up), Some(minutes_down)) => Ok(UsageRecord {
                minutes_up,
                minutes_down,
            }),
            _ => Err(FleetError::Transport(format!(
                "Malformed usage payload for sandbox {sandbox_id}: {data}"
            ))),
        }
    }
}

/// Window check: keep a sandbox iff it was created before the day after
/// `end_date` and not deleted on or before `start_date` midnight.
fn overlaps_window(sandbox: &Sandbox, start_date: NaiveDate, end_date: NaiveDate) -> bool {
    let Some(created_at) = sandbox.created_at else {
        return false;
    };
    let window_start = midnight_utc(start_date);
    let Some(window_end) = end_date
        .checked_add_days(Days::new(1))
        .map(midnight_utc)
    else {
        return false;
    };

    created_at < window_end
        && sandbox
            .deleted_at
            .is_none_or(|deleted_at| deleted_at > window_start)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

/// Minutes arrive as numbers or numeric strings depending on backend version.
fn coerce_minutes(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    fn sandbox(created_at: &str, deleted_at: Option<&str>) -> Sandbox {
        Sandbox {
            id: Some("sbx".into()),
            created_at: Some(created_at.parse().unwrap()),
            deleted_at: deleted_at.map(|raw| raw.parse().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn live_sandbox_created_inside_window_is_kept() {
        let sbx = sandbox("2024-01-15T10:00:00Z", None);
        assert!(overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_created_after_window_end_is_dropped() {
        let sbx = sandbox("2024-02-01T00:00:00Z", None);
        assert!(!overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_created_on_boundary_day_is_kept() {
        // window_end is end + 1 day at midnight, so the end day itself counts
        let sbx = sandbox("2024-01-31T23:59:59Z", None);
        assert!(overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_deleted_exactly_at_window_start_is_dropped() {
        let sbx = sandbox("2023-12-01T00:00:00Z", Some("2024-01-01T00:00:00Z"));
        assert!(!overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_deleted_a_second_into_the_window_is_kept() {
        let sbx = sandbox("2023-12-01T00:00:00Z", Some("2024-01-01T00:00:01Z"));
        assert!(overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_deleted_on_boundary_day_is_kept() {
        let sbx = sandbox("2024-01-15T00:00:00Z", Some("2024-02-01T08:00:00Z"));
        assert!(overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn sandbox_without_created_at_is_dropped() {
        let sbx = Sandbox::default();
        assert!(!overlaps_window(&sbx, date("2024-01-01"), date("2024-01-31")));
    }

    #[test]
    fn minutes_coerce_from_numbers_and_strings() {
        assert_eq!(coerce_minutes(&json!(120)), Some(120));
        assert_eq!(coerce_minutes(&json!("120")), Some(120));
        assert_eq!(coerce_minutes(&json!(" 30 ")), Some(30));
        assert_eq!(coerce_minutes(&json!(-5)), None);
        assert_eq!(coerce_minutes(&json!("later")), None);
        assert_eq!(coerce_minutes(&json!(null)), None);
    }
}
