use std::collections::BTreeMap;

use chrono::Datelike;
use counter::Counter;
use serde::Serialize;

use crate::models::{EventRecord, TerritoryChange};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FatalitySummary {
    pub events: usize,
    pub total: u64,
    pub mean: f64,
    pub max: u32,
}

/// Shape of the filtered dataset, printed ahead of the text analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetOverview {
    pub class_counts: BTreeMap<TerritoryChange, usize>,
    pub admin1_counts: Vec<(String, usize)>,
    pub year_counts: BTreeMap<i32, BTreeMap<TerritoryChange, usize>>,
    pub fatalities: BTreeMap<TerritoryChange, FatalitySummary>,
}

pub fn overview(records: &[EventRecord]) -> DatasetOverview {
    let mut overview = DatasetOverview::default();
    let mut admin1: Counter<String> = Counter::new();

    for record in records {
        let Some(class) = record.territory_change() else {
            continue;
        };
        *overview.class_counts.entry(class).or_insert(0) += 1;
        admin1[&record.admin1] += 1;
        *overview
            .year_counts
            .entry(record.event_date.year())
            .or_default()
            .entry(class)
            .or_insert(0) += 1;

        let summary = overview.fatalities.entry(class).or_default();
        summary.events += 1;
        summary.total += u64::from(record.fatalities);
        summary.max = summary.max.max(record.fatalities);
    }

    for summary in overview.fatalities.values_mut() {
        if summary.events > 0 {
            summary.mean = summary.total as f64 / summary.events as f64;
        }
    }
    overview.admin1_counts = admin1.most_common_ordered();
    overview
}
