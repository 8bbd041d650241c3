use crate::config::AnalysisConfig;
use crate::explore::DatasetOverview;
use crate::models::{CooccurrencePair, TerritoryChange};
use crate::pipeline::{AnalysisReport, ClassificationReport};
use crate::structural::StmFit;
use crate::topic_modeling::TopicModel;
use crate::tuning::FeatureImportance;

const BAR_WIDTH: usize = 30;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let filled = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.min(BAR_WIDTH))
}

fn heading(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "─".repeat(64));
}

pub fn print_report(report: &AnalysisReport, config: &AnalysisConfig) {
    print_overview(report.records, &report.overview);
    print_counts("📊 Top words", &report.unigram_counts);
    print_counts("📊 Top bigrams", &report.bigram_counts);
    print_edges(&report.cooccurrence_edges, config.lexical.min_cooccurrence);
    print_tf_idf(report);
    if let Some(lda) = &report.lda {
        print_lda(lda);
    }
    if let Some(stm) = &report.structural {
        print_structural(stm, config.structural.top_terms);
    }
    if let Some(classification) = &report.classification {
        print_classification(classification);
    }
}

fn print_overview(records: usize, overview: &DatasetOverview) {
    heading(&format!("📁 Dataset: {records} territorial-control events"));
    for (class, count) in &overview.class_counts {
        let fatalities = overview.fatalities.get(class).cloned().unwrap_or_default();
        println!(
            "   {:<38} {:>6} events  {:>6} fatalities (mean {:.2}, max {})",
            class.label(),
            count,
            fatalities.total,
            fatalities.mean,
            fatalities.max
        );
    }
    println!("   By year:");
    for (year, counts) in &overview.year_counts {
        let cells: Vec<String> = TerritoryChange::ALL
            .iter()
            .map(|c| format!("{}", counts.get(c).copied().unwrap_or(0)))
            .collect();
        println!("   {year}  {}", cells.join(" / "));
    }
    println!("   Top governorates:");
    for (admin1, count) in overview.admin1_counts.iter().take(10) {
        println!("   {admin1:<20} {count}");
    }
}

fn print_counts(title: &str, counts: &std::collections::BTreeMap<TerritoryChange, Vec<(String, usize)>>) {
    heading(title);
    for (class, terms) in counts {
        println!("   {}", class.label());
        let max = terms.first().map(|(_, n)| *n as f64).unwrap_or(0.0);
        for (i, (term, n)) in terms.iter().enumerate() {
            println!("   {:<2}. {:<24} {:>6} {}", i + 1, term, n, bar(*n as f64, max));
        }
    }
}

fn print_edges(edges: &[CooccurrencePair], threshold: usize) {
    heading(&format!("🔗 Word co-occurrence edges (≥ {threshold} records)"));
    if edges.is_empty() {
        println!("   No pair reaches the threshold");
        return;
    }
    for class in TerritoryChange::ALL {
        let class_edges: Vec<&CooccurrencePair> = edges.iter().filter(|e| e.class == class).collect();
        println!("   {} ({} edges)", class.label(), class_edges.len());
        for edge in class_edges.iter().take(25) {
            println!("     {:<18} ── {:<18} {}", edge.token_a, edge.token_b, edge.count);
        }
    }
}

fn print_tf_idf(report: &AnalysisReport) {
    heading("📈 Highest tf-idf words per class");
    for (class, stats) in &report.tf_idf {
        println!("   {}", class.label());
        let max = stats.first().map(|s| s.tf_idf).unwrap_or(0.0);
        for stat in stats {
            println!("   {:<24} {:.5} {}", stat.term, stat.tf_idf, bar(stat.tf_idf, max));
        }
    }
}

fn print_lda(model: &TopicModel) {
    heading(&format!("🎯 LDA topics (k = {})", model.num_topics()));
    for topic in &model.topics {
        println!("   Topic {} [{}] coherence {:.4}", topic.id + 1, topic.name, topic.coherence_score);
        let words: Vec<String> = topic.words.iter().map(|(w, p)| format!("{w} ({p:.4})")).collect();
        println!("     {}", words.join(", "));
    }
    println!("   Document proportions:");
    for (doc, gamma) in model.documents.iter().zip(&model.doc_topic_matrix) {
        let cells: Vec<String> = gamma.iter().map(|g| format!("{g:.3}")).collect();
        println!("     {:<38} {}", doc, cells.join("  "));
    }
}

fn print_structural(fit: &StmFit, top_terms: usize) {
    heading(&format!(
        "🎯 Structural topic model (k = {}, anchors: {})",
        fit.num_topics(),
        fit.anchors.join(", ")
    ));
    for topic in fit.topics(top_terms) {
        let words: Vec<String> = topic.words.iter().map(|(w, p)| format!("{w} ({p:.4})")).collect();
        println!("   Topic {} [{}] coherence {:.4}", topic.id + 1, topic.name, topic.coherence_score);
        println!("     {}", words.join(", "));
    }
    println!("   Gamma:");
    for (doc, gamma) in fit.documents.iter().zip(&fit.gamma) {
        let cells: Vec<String> = gamma.iter().map(|g| format!("{g:.3}")).collect();
        println!("     {:<38} {}", doc, cells.join("  "));
    }
    println!("   Converged after {} EM iterations (log-likelihood {:.2})", fit.iterations, fit.log_likelihood);
}

fn format_metric(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_else(|| "  n/a".to_string())
}

fn print_importances(title: &str, importances: &[FeatureImportance]) {
    println!("   {title}");
    let max = importances.first().map(|f| f.importance).unwrap_or(0.0);
    for feature in importances {
        println!("   {:<40} {:>8.4} {}", feature.feature, feature.importance, bar(feature.importance, max));
    }
}

fn print_classification(report: &ClassificationReport) {
    heading(&format!(
        "🤖 LASSO classifier (train {}, test {})",
        report.train_size, report.test_size
    ));
    println!("   {:>12}  {:>8}  {:>6}  {:>6}  {:>6}", "penalty", "roc_auc", "ppv", "npv", "n");
    for summary in &report.tuning.summaries {
        let marker = if summary.candidate == report.best.candidate { "✓" } else { " " };
        println!(
            " {} {:>12.3e}  {:>8}  {:>6}  {:>6}  {:>6}",
            marker,
            summary.penalty,
            format_metric(summary.mean_roc_auc),
            format_metric(summary.mean_ppv),
            format_metric(summary.mean_npv),
            summary.scored
        );
    }

    let metrics = &report.final_fit.test_metrics;
    println!();
    println!("   Selected penalty: {:.3e}", report.final_fit.penalty);
    println!("   Non-zero coefficients: {}", report.final_fit.model.nonzero());
    println!("   Test roc_auc:     {}", format_metric(metrics.roc_auc));
    println!("   Test accuracy:    {:.3}", metrics.accuracy);
    println!("   Test sensitivity: {}", format_metric(metrics.sensitivity));
    println!("   Test specificity: {}", format_metric(metrics.specificity));
    println!("   Test ppv:         {}", format_metric(metrics.ppv));
    println!("   Test npv:         {}", format_metric(metrics.npv));

    let c = &metrics.confusion;
    println!();
    println!("   Confusion matrix       truth: government   truth: non-state");
    println!("   predicted government   {:>17}   {:>16}", c.true_positive, c.false_positive);
    println!("   predicted non-state    {:>17}   {:>16}", c.false_negative, c.true_negative);

    println!();
    print_importances(
        &format!("Features pointing to '{}'", TerritoryChange::GovernmentRegains.label()),
        &report.final_fit.positive_importances,
    );
    print_importances(
        &format!("Features pointing to '{}'", TerritoryChange::NonStateOvertakes.label()),
        &report.final_fit.negative_importances,
    );
}
