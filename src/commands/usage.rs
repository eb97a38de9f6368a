use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::error;

use crate::commands::DENIED_MESSAGE;
use crate::directory::User;
use crate::dispatch::{CommandHandler, Trigger};
use crate::error::Result;
use crate::fleet::{CountryUsage, SandboxFleetService};
use crate::messaging::MessagingSink;

/// `sbxusage <start> <end> [CC]`: per-country up/down minutes over a window,
/// rendered as a markdown summary.
pub struct UsageCommand {
    roles: Vec<String>,
    fleet: Arc<SandboxFleetService>,
    messenger: Arc<dyn MessagingSink>,
}

pub(crate) struct UsageParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub country: Option<String>,
}

/// `<start> <end> [CC]` with ISO dates and an optional two-letter uppercase
/// country code.
pub(crate) fn parse_usage_params(args: &[&str]) -> Option<UsageParams> {
    let (dates, country) = match args {
        [start, end] => ([start, end], None),
        [start, end, country]
            if country.len() == 2 && country.chars().all(|ch| ch.is_ascii_uppercase()) =>
        {
            ([start, end], Some(country.to_string()))
        }
        _ => return None,
    };

    let start_date: NaiveDate = dates[0].parse().ok()?;
    let end_date: NaiveDate = dates[1].parse().ok()?;
    if end_date < start_date {
        return None;
    }

    Some(UsageParams {
        start_date,
        end_date,
        country,
    })
}

pub(crate) fn render_usage(usage: &BTreeMap<String, CountryUsage>) -> String {
    let mut lines = Vec::with_capacity(usage.len());
    for (country, aggregate) in usage {
        lines.push(format!(
            "**{country}**: {} min up, {} min down, {} sandboxes",
            aggregate.minutes_up,
            aggregate.minutes_down,
            aggregate.sandboxes.len()
        ));
    }
    lines.join("\n\n")
}

impl UsageCommand {
    pub fn new(fleet: Arc<SandboxFleetService>, messenger: Arc<dyn MessagingSink>) -> Self {
        Self {
            roles: vec!["admin".to_string()],
            fleet,
            messenger,
        }
    }
}

#[async_trait]
impl CommandHandler for UsageCommand {
    fn applicable_roles(&self) -> &[String] {
        &self.roles
    }

    async fn process(&self, trigger: &Trigger, caller: &User) -> Result<()> {
        let Some(params) = parse_usage_params(&trigger.args()) else {
            self.messenger
                .send_message(
                    &trigger.context,
                    &format!("{}, you entered incorrect params", caller.first_name),
                )
                .await?;
            return Ok(());
        };

        let text = match self
            .fleet
            .get_sandboxes_usage(params.start_date, params.end_date, params.country.as_deref())
            .await
        {
            Ok(usage) => render_usage(&usage),
            Err(err) => {
                error!("usage aggregation failed: {err}");
                format!(
                    "{}, operation was not executed. Please, contact admin.",
                    caller.first_name
                )
            }
        };

        self.messenger.send_message(&trigger.context, &text).await?;
        Ok(())
    }

    async fn fail(&self, trigger: &Trigger, _caller: &User) -> Result<()> {
        self.messenger
            .send_message(&trigger.context, DENIED_MESSAGE)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn usage_params_parse_with_and_without_country() {
        let params = parse_usage_params(&["2024-01-01", "2024-01-31"]).unwrap();
        assert_eq!(params.country, None);

        let params = parse_usage_params(&["2024-01-01", "2024-01-31", "FR"]).unwrap();
        assert_eq!(params.country.as_deref(), Some("FR"));
    }

    #[test]
    fn usage_params_reject_inverted_window_and_bad_dates() {
        assert!(parse_usage_params(&["2024-02-01", "2024-01-01"]).is_none());
        assert!(parse_usage_params(&["yesterday", "2024-01-31"]).is_none());
        assert!(parse_usage_params(&["2024-01-01", "2024-01-31", "fra"]).is_none());
    }

    #[test]
    fn render_lists_every_country() {
        let mut usage = BTreeMap::new();
        usage.insert(
            "FR".to_string(),
            CountryUsage {
                minutes_up: 120,
                minutes_down: 30,
                sandboxes: BTreeSet::from(["zzky-001/alice".to_string()]),
            },
        );
        usage.insert("US".to_string(), CountryUsage::default());

        let text = render_usage(&usage);
        assert!(text.contains("**FR**: 120 min up, 30 min down, 1 sandboxes"));
        assert!(text.contains("**US**: 0 min up, 0 min down, 0 sandboxes"));
    }
}
