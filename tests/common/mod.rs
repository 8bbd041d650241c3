#![allow(dead_code)]

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use territory_analyze::models::{EventRecord, TerritoryChange};
use territory_analyze::AnalysisConfig;

const VILLAGES: [&str; 10] = [
    "Kafr Battikh", "Tal Sultan", "Abu Dali", "Maarshourin", "Khan Sheikhoun",
    "Tamanah", "Hish", "Saraqib", "Kafranbel", "Jarjanaz",
];
const DISTRICTS: [&str; 3] = ["Ariha", "Maarrat An Nu'man", "Jebel Saman"];

pub fn event(id: u64, class: TerritoryChange, notes: &str) -> EventRecord {
    let day = (id % 28) as u32 + 1;
    let month = (id % 12) as u32 + 1;
    EventRecord {
        id,
        event_date: NaiveDate::from_ymd_opt(2017 + (id % 5) as i32, month, day).unwrap(),
        actor1: match class {
            TerritoryChange::GovernmentRegains => "Military Forces of Syria (2000-)".to_string(),
            TerritoryChange::NonStateOvertakes => "Hayat Tahrir al Sham".to_string(),
        },
        admin1: "Idleb".to_string(),
        admin2: DISTRICTS[(id % 3) as usize].to_string(),
        event_type: "Strategic developments".to_string(),
        sub_event_type: class.label().to_string(),
        fatalities: (id % 4) as u32,
        notes: notes.to_string(),
    }
}

/// Half government gains with "regains control" in every note, half non-state gains that never use it.
pub fn territorial_events(count: usize) -> Vec<EventRecord> {
    (0..count as u64)
        .map(|id| {
            let village = VILLAGES[(id / 2 % VILLAGES.len() as u64) as usize];
            if id % 2 == 0 {
                event(
                    id,
                    TerritoryChange::GovernmentRegains,
                    &format!("Syrian regime forces regains control of {village} village after heavy shelling."),
                )
            } else {
                event(
                    id,
                    TerritoryChange::NonStateOvertakes,
                    &format!("Islamic State militants overtook {village} village following an ambush on checkpoints."),
                )
            }
        })
        .collect()
}

/// Writes records in the ACLED export layout, with a few columns the loader ignores.
pub fn write_csv(records: &[EventRecord]) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut writer = csv::Writer::from_path(file.path()).unwrap();
    writer
        .write_record([
            "data_id", "iso", "event_date", "year", "event_type", "sub_event_type",
            "actor1", "admin1", "admin2", "fatalities", "notes",
        ])
        .unwrap();
    for r in records {
        writer
            .write_record([
                r.id.to_string(),
                "760".to_string(),
                r.event_date.format("%d %B %Y").to_string(),
                r.event_date.format("%Y").to_string(),
                r.event_type.clone(),
                r.sub_event_type.clone(),
                r.actor1.clone(),
                r.admin1.clone(),
                r.admin2.clone(),
                r.fatalities.to_string(),
                r.notes.clone(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    file
}

/// Defaults scaled down so a full run stays quick.
pub fn small_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.lexical.min_cooccurrence = 40;
    config.lda.iterations = 50;
    config.classifier.bootstraps = 4;
    config.classifier.penalty_levels = 5;
    config.classifier.penalty_range = (-3.0, -1.0);
    config
}
