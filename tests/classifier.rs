mod common;

use chrono::NaiveDate;
use territory_analyze::config::ClassifierConfig;
use territory_analyze::models::{EventRecord, TerritoryChange};
use territory_analyze::pipeline::{self, Stages};

use common::{event, small_config};

const FILLERS: [&str; 5] = ["northern", "eastern", "hilltop", "farmland", "orchard"];
const DISTINCTIVE: [&str; 6] = ["regime", "troops", "regained", "rebel", "fighters", "seized"];

/// Records that differ only in the wording of their notes.
fn wording_only_records() -> Vec<EventRecord> {
    (0..120u64)
        .map(|id| {
            let filler = FILLERS[(id / 2 % 5) as usize];
            let mut record = if id % 2 == 0 {
                event(id, TerritoryChange::GovernmentRegains, &format!("regime troops regained the {filler} area"))
            } else {
                event(id, TerritoryChange::NonStateOvertakes, &format!("rebel fighters seized the {filler} area"))
            };
            // only the notes carry signal
            record.event_date = NaiveDate::from_ymd_opt(2019, 6, 3).unwrap();
            record.admin2 = "Ariha".to_string();
            record.fatalities = 0;
            record
        })
        .collect()
}

#[test]
fn distinctive_wording_separates_the_classes() {
    let records = wording_only_records();
    let stages = Stages { skip_topics: true, skip_classifier: false };
    let report = pipeline::analyze(&records, &small_config(), stages).unwrap();
    let classification = report.classification.unwrap();

    assert_eq!(classification.train_size, 90);
    assert_eq!(classification.test_size, 30);
    let auc = classification.final_fit.test_metrics.roc_auc.unwrap();
    assert!(auc > 0.95, "test roc_auc was {auc}");

    let fit = &classification.final_fit;
    assert!(fit.feature_names.iter().all(|n| n.starts_with("tfidf_notes_")));
    let strongest = fit
        .positive_importances
        .iter()
        .chain(&fit.negative_importances)
        .max_by(|a, b| a.importance.total_cmp(&b.importance))
        .unwrap();
    assert!(
        DISTINCTIVE.iter().any(|w| strongest.feature.contains(w)),
        "strongest feature was {}",
        strongest.feature
    );
}

#[test]
fn default_penalty_grid_tunes_on_separable_notes() {
    let records = wording_only_records();
    let mut config = small_config();
    config.classifier = ClassifierConfig { bootstraps: 5, ..ClassifierConfig::default() };

    let stages = Stages { skip_topics: true, skip_classifier: false };
    let report = pipeline::analyze(&records, &config, stages).unwrap();
    let classification = report.classification.unwrap();

    // 40 levels over 1e-10 ..= 1
    assert_eq!(classification.tuning.summaries.len(), 40);
    assert!((classification.tuning.grid[0] - 1e-10).abs() < 1e-20);
    assert!(classification.tuning.summaries.iter().all(|s| s.scored == 5));

    let fit = &classification.final_fit;
    assert!(fit.model.intercept.is_finite());
    assert!(fit.model.coefficients.iter().all(|c| c.is_finite()));
    assert!(fit.model.nonzero() >= 1);
    let auc = fit.test_metrics.roc_auc.unwrap();
    assert!(auc > 0.95, "test roc_auc was {auc}");
}
