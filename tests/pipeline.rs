mod common;

use territory_analyze::lexical;
use territory_analyze::models::TerritoryChange;
use territory_analyze::pipeline::{self, Stages};
use territory_analyze::AnalysisError;

use common::{event, small_config, territorial_events, write_csv};

#[test]
fn full_run_over_acled_export() {
    let mut records = territorial_events(100);
    let mut clash = event(500, TerritoryChange::GovernmentRegains, "Clashes between regime forces and HTS.");
    clash.sub_event_type = "Armed clash".to_string();
    records.push(clash);
    let file = write_csv(&records);

    let report = pipeline::run(file.path(), &small_config(), Stages::default()).unwrap();
    assert_eq!(report.records, 100);
    assert_eq!(report.overview.class_counts[&TerritoryChange::GovernmentRegains], 50);
    assert_eq!(report.overview.class_counts[&TerritoryChange::NonStateOvertakes], 50);

    let government_bigrams = &report.bigram_counts[&TerritoryChange::GovernmentRegains];
    let other_bigrams = &report.bigram_counts[&TerritoryChange::NonStateOvertakes];
    assert!(government_bigrams.len() <= 20);
    assert!(government_bigrams.iter().any(|(b, n)| b == "regains control" && *n == 50));
    assert!(other_bigrams.iter().all(|(b, _)| b != "regains control"));

    assert_eq!(
        lexical::cooccurrence_count(&report.cooccurrence_edges, TerritoryChange::GovernmentRegains, "regime", "forces"),
        50
    );
    assert!(report.cooccurrence_edges.iter().all(|e| e.count >= 40));

    let government_tf_idf = &report.tf_idf[&TerritoryChange::GovernmentRegains];
    assert!(government_tf_idf.iter().any(|s| s.term == "regains" && s.tf_idf > 0.0));
    // village names appear in both classes
    assert!(government_tf_idf
        .iter()
        .filter(|s| s.term == "village")
        .all(|s| s.tf_idf == 0.0));

    let lda = report.lda.as_ref().unwrap();
    assert_eq!(lda.num_topics(), 6);
    assert!(lda.topics.iter().all(|t| t.words.len() == 10));

    let stm = report.structural.as_ref().unwrap();
    assert_eq!(stm.num_topics(), 2);
    for class in TerritoryChange::ALL {
        let gamma = stm.gamma(class.label()).unwrap();
        assert!((gamma.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    let classification = report.classification.as_ref().unwrap();
    assert_eq!(classification.train_size + classification.test_size, 100);
    assert_eq!(classification.tuning.summaries.len(), 5);
}

#[test]
fn skipped_stages_are_absent() {
    let records = territorial_events(40);
    let stages = Stages { skip_topics: true, skip_classifier: true };
    let report = pipeline::analyze(&records, &small_config(), stages).unwrap();
    assert!(report.lda.is_none());
    assert!(report.structural.is_none());
    assert!(report.classification.is_none());
    assert!(!report.unigram_counts.is_empty());
}

#[test]
fn same_seed_reproduces_the_run() {
    let records = territorial_events(80);
    let config = small_config().with_seed(99);
    let first = pipeline::analyze(&records, &config, Stages::default()).unwrap();
    let second = pipeline::analyze(&records, &config, Stages::default()).unwrap();

    let (a, b) = (first.lda.unwrap(), second.lda.unwrap());
    assert_eq!(a.word_topic_matrix, b.word_topic_matrix);
    assert_eq!(a.doc_topic_matrix, b.doc_topic_matrix);
    assert_eq!(first.structural.unwrap().beta, second.structural.unwrap().beta);

    let (a, b) = (first.classification.unwrap(), second.classification.unwrap());
    assert_eq!(a.best, b.best);
    assert_eq!(a.final_fit.test_metrics, b.final_fit.test_metrics);
    assert_eq!(a.final_fit.model, b.final_fit.model);
}

#[test]
fn missing_column_fails_the_run() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        "data_id,event_date,actor1,admin1,admin2,event_type,sub_event_type,fatalities\n\
         1,04 December 2021,Regime,Idleb,Ariha,Strategic developments,Government regains territory,0\n",
    )
    .unwrap();
    match pipeline::run(file.path(), &small_config(), Stages::default()) {
        Err(AnalysisError::MissingColumn(column)) => assert_eq!(column, "notes"),
        other => panic!("expected a missing column error, got {:?}", other.map(|r| r.records)),
    }
}
