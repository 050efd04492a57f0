//! Summaries derived from the full event set: counts per location and per
//! hour of day.
//!
//! Hours are bucketed in the machine's local timezone. There is no timezone
//! setting.

use crate::traffic::TrafficEvent;
use chrono::{Local, Timelike};
use std::collections::HashMap;

pub const HOURS: usize = 24;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateSummary {
    /// `"city, country"` -> occurrences
    pub location_counts: HashMap<String, usize>,
    /// Index = local hour of day
    pub hour_histogram: [usize; HOURS],
}

/// Recompute both summaries in one pass
pub fn summarize<'a, I>(events: I) -> AggregateSummary
where
    I: IntoIterator<Item = &'a TrafficEvent>,
{
    let mut summary = AggregateSummary::default();
    for event in events {
        *summary
            .location_counts
            .entry(event.location.key())
            .or_insert(0) += 1;

        let hour = event.timestamp.with_timezone(&Local).hour() as usize;
        summary.hour_histogram[hour % HOURS] += 1;
    }
    summary
}

impl AggregateSummary {
    pub fn total(&self) -> usize {
        self.hour_histogram.iter().sum()
    }

    /// Most frequent locations, count descending then name ascending
    pub fn top_locations(&self, n: usize) -> Vec<(&str, usize)> {
        let mut sorted: Vec<(&str, usize)> = self
            .location_counts
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sorted.truncate(n);
        sorted
    }

    /// Busiest hour and its count, `None` when empty
    pub fn peak_hour(&self) -> Option<(usize, usize)> {
        self.hour_histogram
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::Location;
    use chrono::{TimeZone, Utc};

    fn event(city: &str, country: &str, secs: i64) -> TrafficEvent {
        TrafficEvent::new("10.1.2.3", 0.0, 0.0, Utc.timestamp_opt(secs, 0).unwrap())
            .with_location(Location::new(city, country))
    }

    fn sample() -> Vec<TrafficEvent> {
        let base = 1_700_000_000;
        vec![
            event("Montreal", "Canada", base),
            event("Montreal", "Canada", base + 3600),
            event("Tokyo", "Japan", base + 7200),
            event("Unknown", "Unknown", base + 86_400),
            event("Berlin", "Germany", base + 5 * 3600),
            event("Tokyo", "Japan", base + 11 * 3600),
        ]
    }

    #[test]
    fn histogram_sums_to_event_count() {
        let events = sample();
        let summary = summarize(&events);
        assert_eq!(summary.hour_histogram.iter().sum::<usize>(), events.len());
        assert_eq!(summary.total(), events.len());
    }

    #[test]
    fn location_counts_sum_to_event_count() {
        let events = sample();
        let summary = summarize(&events);
        assert_eq!(summary.location_counts.values().sum::<usize>(), events.len());
        assert_eq!(summary.location_counts.get("Montreal, Canada"), Some(&2));
        assert_eq!(summary.location_counts.get("Unknown, Unknown"), Some(&1));
    }

    #[test]
    fn hour_bucket_uses_local_time() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let expected = ts.with_timezone(&Local).hour() as usize;
        let events = vec![event("Paris", "France", 1_700_000_000); 3];
        let summary = summarize(&events);
        assert_eq!(summary.hour_histogram[expected], 3);
        assert_eq!(summary.peak_hour(), Some((expected, 3)));
    }

    #[test]
    fn top_locations_sorted_with_stable_ties() {
        let summary = summarize(&sample());
        let top = summary.top_locations(10);
        assert_eq!(top[0], ("Montreal, Canada", 2));
        assert_eq!(top[1], ("Tokyo, Japan", 2));
        assert_eq!(top[2], ("Berlin, Germany", 1));
        assert_eq!(top.len(), 4);
        assert_eq!(summary.top_locations(1).len(), 1);
    }

    #[test]
    fn empty_input() {
        let summary = summarize(&Vec::<TrafficEvent>::new());
        assert_eq!(summary.total(), 0);
        assert!(summary.location_counts.is_empty());
        assert_eq!(summary.peak_hour(), None);
        assert!(summary.top_locations(10).is_empty());
    }

    #[test]
    fn recomputation_is_deterministic() {
        let events = sample();
        assert_eq!(summarize(&events), summarize(&events));
    }
}
