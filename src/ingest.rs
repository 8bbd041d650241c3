use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::models::EventRecord;

/// Columns the event file must carry. `data_id` is renamed to `id` on load.
pub const EXPECTED_COLUMNS: [&str; 9] = [
    "data_id",
    "event_date",
    "actor1",
    "admin1",
    "admin2",
    "event_type",
    "sub_event_type",
    "fatalities",
    "notes",
];

const DATE_FORMATS: [&str; 3] = ["%d %B %Y", "%Y-%m-%d", "%d-%b-%y"];

#[derive(Debug, Deserialize)]
struct RawEventRow {
    #[serde(rename = "data_id")]
    id: u64,
    event_date: String,
    actor1: String,
    admin1: String,
    admin2: String,
    event_type: String,
    sub_event_type: String,
    fatalities: u32,
    notes: String,
}

pub fn load_events(path: &Path) -> Result<Vec<EventRecord>> {
    info!(path = %path.display(), "loading event file");
    let file = std::fs::File::open(path)?;
    load_events_from_reader(file)
}

pub fn load_events_from_reader<R: Read>(reader: R) -> Result<Vec<EventRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    for column in EXPECTED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(AnalysisError::MissingColumn(column.to_string()));
        }
    }

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<RawEventRow>().enumerate() {
        let row = row?;
        let event_date = parse_event_date(&row.event_date).ok_or_else(|| AnalysisError::InvalidRecord {
            row: i + 1,
            message: format!("unrecognised event_date '{}'", row.event_date),
        })?;
        records.push(EventRecord {
            id: row.id,
            event_date,
            actor1: row.actor1,
            admin1: row.admin1,
            admin2: row.admin2,
            event_type: row.event_type,
            sub_event_type: row.sub_event_type,
            fatalities: row.fatalities,
            notes: row.notes,
        });
    }

    info!(records = records.len(), "loaded events");
    Ok(records)
}

pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Keeps only the two territorial-control sub-event types.
pub fn filter_territorial(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let before = records.len();
    let kept: Vec<EventRecord> = records
        .into_iter()
        .filter(|r| r.territory_change().is_some())
        .collect();
    debug!(before, after = kept.len(), "filtered to territorial sub-event types");
    kept
}

/// Copies every n-th data row of `input` to `output` so that roughly `percentage`
/// percent of rows survive. The header row is always written. Returns rows written.
pub fn sample_rows(input: &Path, output: &Path, percentage: f64) -> Result<usize> {
    if !(percentage > 0.0 && percentage <= 100.0) {
        return Err(AnalysisError::Computation(format!(
            "sample percentage must be in (0, 100], got {percentage}"
        )));
    }

    let total = csv::Reader::from_path(input)?.byte_records().count();
    let sample_size = (total as f64 * (percentage / 100.0)) as usize;
    // a sample rounding to zero rows keeps only the first one
    let step = if sample_size > 0 { total / sample_size } else { total };
    let step = step.max(1);
    debug!(total, sample_size, step, "sampling rows");

    let mut reader = csv::Reader::from_path(input)?;
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_byte_record(reader.byte_headers()?)?;

    let mut written = 0;
    for (i, row) in reader.byte_records().enumerate() {
        let row = row?;
        if i % step == 0 {
            writer.write_byte_record(&row)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "data_id,iso,event_id_cnty,event_date,year,event_type,sub_event_type,actor1,admin1,admin2,fatalities,notes\n";

    #[test]
    fn loads_acled_layout_and_renames_identifier() {
        let csv = format!(
            "{HEADER}\
             8120841,760,SYR100001,04 December 2021,2021,Strategic developments,Government regains territory,Military Forces of Syria (2000-),Idleb,Ariha,0,\"On 4 December 2021, regime forces regained control of Kafr Battikh.\"\n\
             8120842,760,SYR100002,2020-01-12,2020,Battles,Non-state actor overtakes territory,HTS,Aleppo,Jebel Saman,3,HTS captured a hill.\n"
        );
        let records = load_events_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 8120841);
        assert_eq!(records[0].event_date, NaiveDate::from_ymd_opt(2021, 12, 4).unwrap());
        assert_eq!(records[1].admin2, "Jebel Saman");
        assert_eq!(records[1].fatalities, 3);
        assert!(records[0].notes.contains("Kafr Battikh"));
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let csv = "data_id,event_date,actor1,admin1,admin2,event_type,sub_event_type,fatalities\n";
        match load_events_from_reader(csv.as_bytes()) {
            Err(AnalysisError::MissingColumn(column)) => assert_eq!(column, "notes"),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_reports_row() {
        let csv = format!(
            "{HEADER}1,760,A,04 December 2021,2021,Battles,Armed clash,X,Idleb,Ariha,0,ok\n\
             2,760,B,someday,2021,Battles,Armed clash,X,Idleb,Ariha,0,ok\n"
        );
        match load_events_from_reader(csv.as_bytes()) {
            Err(AnalysisError::InvalidRecord { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected invalid record, got {other:?}"),
        }
    }

    #[test]
    fn malformed_number_propagates_loader_error() {
        let csv = format!("{HEADER}1,760,A,04 December 2021,2021,Battles,Armed clash,X,Idleb,Ariha,many,ok\n");
        assert!(matches!(
            load_events_from_reader(csv.as_bytes()),
            Err(AnalysisError::Csv(_))
        ));
    }

    #[test]
    fn filter_keeps_two_sub_event_types() {
        let csv = format!(
            "{HEADER}1,760,A,04 December 2021,2021,Battles,Armed clash,X,Idleb,Ariha,0,a\n\
             2,760,B,04 December 2021,2021,Strategic developments,Government regains territory,X,Idleb,Ariha,0,b\n\
             3,760,C,04 December 2021,2021,Battles,Non-state actor overtakes territory,X,Idleb,Ariha,0,c\n"
        );
        let records = filter_territorial(load_events_from_reader(csv.as_bytes()).unwrap());
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn parses_supported_date_formats() {
        assert_eq!(parse_event_date("31 December 2017"), NaiveDate::from_ymd_opt(2017, 12, 31));
        assert_eq!(parse_event_date("2018-06-01"), NaiveDate::from_ymd_opt(2018, 6, 1));
        assert_eq!(parse_event_date("05-Mar-19"), NaiveDate::from_ymd_opt(2019, 3, 5));
        assert_eq!(parse_event_date("not a date"), None);
    }

    #[test]
    fn sampling_keeps_header_and_every_nth_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.csv");
        let output = dir.path().join("sample.csv");
        let mut csv = HEADER.to_string();
        for id in 0..10 {
            csv.push_str(&format!(
                "{id},760,SYR{id},04 December 2021,2021,Battles,Armed clash,X,Idleb,Ariha,0,note {id}\n"
            ));
        }
        std::fs::write(&input, csv).unwrap();

        // 30% of 10 rows gives a step of 3
        assert_eq!(sample_rows(&input, &output, 30.0).unwrap(), 4);
        let ids: Vec<u64> = load_events(&output).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 3, 6, 9]);
        assert!(sample_rows(&input, &output, 0.0).is_err());
    }

    #[test]
    fn tiny_percentage_keeps_only_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.csv");
        let output = dir.path().join("sample.csv");
        let mut csv = HEADER.to_string();
        for id in 0..10 {
            csv.push_str(&format!(
                "{id},760,SYR{id},04 December 2021,2021,Battles,Armed clash,X,Idleb,Ariha,0,note {id}\n"
            ));
        }
        std::fs::write(&input, csv).unwrap();

        assert_eq!(sample_rows(&input, &output, 5.0).unwrap(), 1);
        let ids: Vec<u64> = load_events(&output).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn padded_headers_are_trimmed() {
        let csv = "data_id, event_date,actor1,admin1,admin2,event_type,sub_event_type,fatalities, notes\n\
                   7,04 December 2021,Regime,Idleb,Ariha,Strategic developments,Government regains territory,0,Regime forces advanced.\n";
        let records = load_events_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].notes, "Regime forces advanced.");
    }
}
