use std::collections::{BTreeMap, BTreeSet, HashMap};

use counter::Counter;

use crate::models::{CooccurrencePair, TermStatistic, TerritoryChange, TokenRow};

/// Token frequencies per class, most frequent first (ties alphabetical).
pub fn token_counts(rows: &[TokenRow]) -> BTreeMap<TerritoryChange, Vec<(String, usize)>> {
    let mut counters: BTreeMap<TerritoryChange, Counter<String>> = BTreeMap::new();
    for row in rows {
        counters.entry(row.class).or_default()[&row.token] += 1;
    }
    counters
        .into_iter()
        .map(|(class, counter)| (class, counter.most_common_ordered()))
        .collect()
}

/// For each class, the number of records containing both tokens of every unordered pair.
/// Each pair is stored once with `token_a < token_b`; output is sorted by count descending.
pub fn pairwise_cooccurrence(rows: &[TokenRow]) -> Vec<CooccurrencePair> {
    let mut documents: BTreeMap<(TerritoryChange, u64), BTreeSet<&str>> = BTreeMap::new();
    for row in rows {
        documents.entry((row.class, row.id)).or_default().insert(row.token.as_str());
    }

    let mut counts: HashMap<(TerritoryChange, &str, &str), usize> = HashMap::new();
    for ((class, _), tokens) in &documents {
        let tokens: Vec<&str> = tokens.iter().copied().collect();
        for (i, a) in tokens.iter().enumerate() {
            for b in &tokens[i + 1..] {
                *counts.entry((*class, *a, *b)).or_insert(0) += 1;
            }
        }
    }

    let mut pairs: Vec<CooccurrencePair> = counts
        .into_iter()
        .map(|((class, a, b), count)| CooccurrencePair {
            class,
            token_a: a.to_string(),
            token_b: b.to_string(),
            count,
        })
        .collect();
    pairs.sort_by(|x, y| {
        y.count
            .cmp(&x.count)
            .then_with(|| x.class.cmp(&y.class))
            .then_with(|| x.token_a.cmp(&y.token_a))
            .then_with(|| x.token_b.cmp(&y.token_b))
    });
    pairs
}

/// Looks up a pair regardless of argument order.
pub fn cooccurrence_count(pairs: &[CooccurrencePair], class: TerritoryChange, a: &str, b: &str) -> usize {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    pairs
        .iter()
        .find(|p| p.class == class && p.token_a == a && p.token_b == b)
        .map(|p| p.count)
        .unwrap_or(0)
}

/// Network edges: pairs seen in at least `min_count` records.
pub fn filter_edges(pairs: &[CooccurrencePair], min_count: usize) -> Vec<CooccurrencePair> {
    pairs.iter().filter(|p| p.count >= min_count).cloned().collect()
}

/// tf-idf with one document per class: tf = n / document length, idf = ln(N / df).
pub fn tf_idf(rows: &[TokenRow]) -> Vec<TermStatistic> {
    let mut counts: BTreeMap<TerritoryChange, Counter<String>> = BTreeMap::new();
    for row in rows {
        counts.entry(row.class).or_default()[&row.token] += 1;
    }

    let total_documents = counts.len() as f64;
    let mut document_frequency: Counter<&str> = Counter::new();
    for counter in counts.values() {
        for term in counter.keys() {
            document_frequency[&term.as_str()] += 1;
        }
    }

    let mut statistics = Vec::new();
    for (document, counter) in &counts {
        let length: usize = counter.values().sum();
        for (term, &count) in counter.iter() {
            let tf = count as f64 / length as f64;
            let idf = (total_documents / document_frequency[&term.as_str()] as f64).ln();
            statistics.push(TermStatistic {
                document: *document,
                term: term.clone(),
                count,
                tf,
                idf,
                tf_idf: tf * idf,
            });
        }
    }
    statistics
}

/// Highest tf-idf terms of each class.
pub fn top_tf_idf(statistics: &[TermStatistic], n: usize) -> BTreeMap<TerritoryChange, Vec<TermStatistic>> {
    let mut grouped: BTreeMap<TerritoryChange, Vec<TermStatistic>> = BTreeMap::new();
    for stat in statistics {
        grouped.entry(stat.document).or_default().push(stat.clone());
    }
    for stats in grouped.values_mut() {
        stats.sort_by(|a, b| b.tf_idf.total_cmp(&a.tf_idf).then_with(|| a.term.cmp(&b.term)));
        stats.truncate(n);
    }
    grouped
}
