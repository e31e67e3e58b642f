//! Repeating event definitions and the time arithmetic used when a series is edited.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::types::CalendarEvent;

pub const MAX_OCCURRENCES: u32 = 366;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    fn nth_start(&self, first: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        let steps = n.checked_mul(self.interval)?;
        match self.frequency {
            Frequency::Daily => first.checked_add_signed(Duration::days(i64::from(steps))),
            Frequency::Weekly => first.checked_add_signed(Duration::weeks(i64::from(steps))),
            Frequency::Monthly => first.checked_add_months(Months::new(steps)),
        }
    }

    /// Start/end pairs of every occurrence, the first being `(start, end)`.
    pub fn expand(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, String> {
        if self.interval == 0 {
            return Err("Recurrence interval must be at least 1".to_string());
        }
        if self.count.is_none() && self.until.is_none() {
            return Err("Recurrence needs either count or until".to_string());
        }
        if let Some(count) = self.count {
            if count == 0 || count > MAX_OCCURRENCES {
                return Err(format!(
                    "Recurrence count must be between 1 and {MAX_OCCURRENCES}"
                ));
            }
        }
        if self.until.is_some_and(|until| until < start) {
            return Err("Recurrence end is before the first occurrence".to_string());
        }

        let length = end - start;
        let limit = self.count.unwrap_or(MAX_OCCURRENCES + 1);
        let mut occurrences = Vec::new();

        for n in 0..limit {
            let Some(occurrence) = self.nth_start(start, n) else {
                break;
            };
            if self.until.is_some_and(|until| occurrence > until) {
                break;
            }
            occurrences.push((occurrence, occurrence + length));
        }

        if occurrences.len() > MAX_OCCURRENCES as usize {
            return Err(format!(
                "Recurrence produces more than {MAX_OCCURRENCES} occurrences"
            ));
        }
        Ok(occurrences)
    }
}

/// Offsets applied to later occurrences when one occurrence of a series is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeShift {
    pub start_delta: Duration,
    pub end_delta: Duration,
}

impl TimeShift {
    pub fn between(
        old_start: DateTime<Utc>,
        old_end: DateTime<Utc>,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Self {
        Self {
            start_delta: Duration::milliseconds((new_start - old_start).num_milliseconds()),
            end_delta: Duration::milliseconds((new_end - old_end).num_milliseconds()),
        }
    }

    pub fn apply(&self, event: &mut CalendarEvent) {
        event.start_time += self.start_delta;
        event.end_time += self.end_delta;
    }
}

/// Occurrences of the same group that start after `original_start`, excluding
/// the edited event itself.
pub fn later_siblings(
    siblings: Vec<CalendarEvent>,
    edited_id: &str,
    original_start: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    siblings
        .into_iter()
        .filter(|e| e.id != edited_id && e.start_time > original_start)
        .collect()
}
