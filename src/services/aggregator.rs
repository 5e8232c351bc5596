//! Per-individual and per-class event counts

use crate::domain::types::{Event, LegendMap, UNKNOWN_CLASS};
use serde::Serialize;
use std::collections::BTreeMap;

/// Count tables over one run's enriched events.
///
/// BTreeMap keeps output ordering stable for printing and the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub per_individual: BTreeMap<String, usize>,
    pub per_class: BTreeMap<String, usize>,
    /// Events that never received a land-cover code
    pub unclassified: usize,
}

impl Aggregates {
    pub fn total_events(&self) -> usize {
        self.per_individual.values().sum()
    }

    /// "There are N data points for bat_id X." per individual, sorted by id
    pub fn individual_lines(&self) -> Vec<String> {
        self.per_individual
            .iter()
            .map(|(id, count)| format!("There are {count} data points for bat_id {id}."))
            .collect()
    }

    /// "class: count" per land-cover class, sorted by class name
    pub fn class_lines(&self) -> Vec<String> {
        self.per_class.iter().map(|(class, count)| format!("{class}: {count}")).collect()
    }
}

/// Tally events per individual and per resolved class.
///
/// Every event counts for its individual. Events with a code count for the
/// legend's class name, or `Unknown` if the legend lacks the code. Events
/// without a code count only as unclassified.
pub fn aggregate(events: &[Event], legend: &LegendMap) -> Aggregates {
    let mut out = Aggregates::default();

    for event in events {
        *out.per_individual.entry(event.individual_id.0.clone()).or_insert(0) += 1;

        match &event.landcover_code {
            Some(code) => {
                let class = legend.get(code).map(String::as_str).unwrap_or(UNKNOWN_CLASS);
                *out.per_class.entry(class.to_string()).or_insert(0) += 1;
            }
            None => out.unclassified += 1,
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LandcoverCode;
    use chrono::Utc;
    use proptest::prelude::*;

    fn event(id: &str, individual: &str, code: Option<&str>) -> Event {
        let mut e = Event::new(id, individual, Utc::now(), 14.0, 40.0);
        e.landcover_code = code.map(|c| LandcoverCode(c.to_string()));
        e
    }

    fn legend() -> LegendMap {
        LegendMap::from([
            (LandcoverCode("311".into()), "Broad-leaved forest".to_string()),
            (LandcoverCode("512".into()), "Water bodies".to_string()),
        ])
    }

    #[test]
    fn test_counts_per_individual_and_class() {
        let events = vec![
            event("1", "bat-1", Some("311")),
            event("2", "bat-1", Some("311")),
            event("3", "bat-2", Some("512")),
        ];
        let agg = aggregate(&events, &legend());

        assert_eq!(agg.per_individual["bat-1"], 2);
        assert_eq!(agg.per_individual["bat-2"], 1);
        assert_eq!(agg.per_class["Broad-leaved forest"], 2);
        assert_eq!(agg.per_class["Water bodies"], 1);
        assert_eq!(agg.unclassified, 0);
    }

    #[test]
    fn test_unresolvable_code_is_unknown_and_absent_is_unclassified() {
        let events = vec![
            event("1", "bat-1", Some("999")),
            event("2", "bat-1", None),
            event("3", "bat-1", Some("311")),
        ];
        let agg = aggregate(&events, &legend());

        assert_eq!(agg.per_class[UNKNOWN_CLASS], 1);
        assert_eq!(agg.per_class["Broad-leaved forest"], 1);
        assert_eq!(agg.per_class.values().sum::<usize>(), 2);
        assert_eq!(agg.unclassified, 1);
        assert_eq!(agg.per_individual["bat-1"], 3);
    }

    #[test]
    fn test_summary_lines_sorted() {
        let events = vec![event("1", "bat-2", None), event("2", "bat-1", Some("512"))];
        let agg = aggregate(&events, &legend());

        assert_eq!(
            agg.individual_lines(),
            vec![
                "There are 1 data points for bat_id bat-1.".to_string(),
                "There are 1 data points for bat_id bat-2.".to_string(),
            ]
        );
        assert_eq!(agg.class_lines(), vec!["Water bodies: 1".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate(&[], &legend());
        assert_eq!(agg, Aggregates::default());
        assert_eq!(agg.total_events(), 0);
    }

    proptest! {
        #[test]
        fn prop_individual_counts_sum_to_len(
            rows in prop::collection::vec((0u8..5, prop::option::of(0u8..4)), 0..200)
        ) {
            let events: Vec<Event> = rows
                .iter()
                .enumerate()
                .map(|(i, (ind, code))| {
                    let code = code.map(|c| if c == 0 { "311".to_string() } else { c.to_string() });
                    event(&i.to_string(), &format!("bat-{ind}"), code.as_deref())
                })
                .collect();
            let agg = aggregate(&events, &legend());

            prop_assert_eq!(agg.total_events(), events.len());
            prop_assert_eq!(agg.per_class.values().sum::<usize>() + agg.unclassified, events.len());
        }
    }
}
