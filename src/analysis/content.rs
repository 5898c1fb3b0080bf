//! analysis::content
//!
//! Content pattern analysis over a set of issues.
//!
//! # Design
//!
//! Everything here is frequency- and rule-based:
//!
//! - term frequencies over summaries, descriptions and comment bodies
//! - common terms by document frequency
//! - repetition anomalies: one term dominating an issue's comments
//! - label usage and co-occurrence, component usage
//! - comment statistics and fixed-lexicon tone signals
//!
//! The analyzer is a pure function of its input. Issues are deduplicated by
//! key, so term counts never decrease when the input grows.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::core::issue::Issue;
use crate::core::types::IssueKey;

use super::error::Completeness;

/// Tokens shorter than this are dropped.
const MIN_TOKEN_LEN: usize = 3;

/// Words too common to carry meaning.
pub const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "cannot", "could", "did",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has",
    "have", "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself", "just",
    "more", "most", "not", "now", "off", "once", "only", "other", "our", "ours", "out", "over",
    "own", "same", "she", "should", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "then", "there", "these", "they", "this", "those", "through", "too", "under", "until",
    "very", "was", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours",
];

const URGENCY_WORDS: &[&str] = &[
    "urgent", "asap", "critical", "blocker", "immediately", "emergency", "severe", "escalate",
    "escalated", "outage",
];

const NEGATIVE_WORDS: &[&str] = &[
    "broken", "fails", "failed", "failing", "failure", "error", "errors", "crash", "crashes",
    "regression", "wrong", "unacceptable", "frustrating", "annoying", "worse",
];

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank", "great", "fixed", "resolved", "works", "working", "good", "awesome",
    "appreciate", "nice", "perfect",
];

/// Tuning for content analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentConfig {
    /// Fraction of issues a term must appear in to be common.
    pub common_term_ratio: f64,
    /// Maximum common terms reported.
    pub top_terms: usize,
    /// How far above an issue's average a term's count must be.
    pub anomaly_factor: f64,
    /// Minimum occurrences for a repetition anomaly.
    pub anomaly_min_repeats: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            common_term_ratio: 0.10,
            top_terms: 50,
            anomaly_factor: 4.0,
            anomaly_min_repeats: 5,
        }
    }
}

/// Split text into normalized terms.
///
/// Lowercases, splits on anything that is not alphanumeric, and drops short
/// tokens, numbers and stop words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !t.chars().all(|c| c.is_numeric()))
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

/// Count and contributing issues for one term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermStats {
    pub count: usize,
    pub issues: BTreeSet<IssueKey>,
}

/// Term frequencies over an issue set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermFrequencyReport {
    pub terms: BTreeMap<String, TermStats>,
}

impl TermFrequencyReport {
    /// Count of `term`, zero if absent.
    pub fn count(&self, term: &str) -> usize {
        self.terms.get(term).map_or(0, |s| s.count)
    }

    fn add(&mut self, term: String, issue: &IssueKey) {
        let stats = self.terms.entry(term).or_default();
        stats.count += 1;
        stats.issues.insert(issue.clone());
    }
}

/// A term appearing across many issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonTerm {
    pub term: String,
    pub count: usize,
    /// Number of issues containing the term.
    pub issue_count: usize,
}

/// A term repeated far more often than usual in one issue's comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepetitionAnomaly {
    pub issue: IssueKey,
    pub term: String,
    pub count: usize,
    /// Average count of the issue's other comment terms.
    pub average: f64,
}

/// How often a label or component is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub count: usize,
    pub issues: BTreeSet<IssueKey>,
}

/// Two labels appearing on the same issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelPair {
    pub first: String,
    pub second: String,
    pub count: usize,
}

/// Label usage across the issue set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelUsage {
    pub usage: BTreeMap<String, UsageStats>,
    /// Ordered by count descending, then by names.
    pub co_occurrence: Vec<LabelPair>,
}

/// Comment volume and length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentStats {
    pub total: usize,
    /// Mean body length in characters.
    pub average_length: f64,
    /// Comments by creation day. Undated comments are left out.
    pub per_day: BTreeMap<NaiveDate, usize>,
    /// Comments without a usable timestamp.
    pub undated: usize,
    pub per_author: BTreeMap<String, usize>,
}

/// Fixed-lexicon tone categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToneSignal {
    Urgency,
    Negative,
    Positive,
}

impl ToneSignal {
    pub const ALL: [ToneSignal; 3] = [ToneSignal::Urgency, ToneSignal::Negative, ToneSignal::Positive];

    fn lexicon(&self) -> &'static [&'static str] {
        match self {
            ToneSignal::Urgency => URGENCY_WORDS,
            ToneSignal::Negative => NEGATIVE_WORDS,
            ToneSignal::Positive => POSITIVE_WORDS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToneSignal::Urgency => "urgency",
            ToneSignal::Negative => "negative",
            ToneSignal::Positive => "positive",
        }
    }
}

/// Hits for one tone signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignalStats {
    /// Lexicon words found.
    pub hits: usize,
    /// Comments with at least one hit.
    pub comments: usize,
    pub issues: BTreeSet<IssueKey>,
}

/// Everything the content analyzer found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentReport {
    pub issues_analyzed: usize,
    pub terms: TermFrequencyReport,
    pub common_terms: Vec<CommonTerm>,
    pub repetition_anomalies: Vec<RepetitionAnomaly>,
    pub labels: LabelUsage,
    pub components: BTreeMap<String, UsageStats>,
    pub comments: CommentStats,
    pub tone: BTreeMap<ToneSignal, SignalStats>,
    pub completeness: Completeness,
}

/// Runs content analysis.
#[derive(Debug, Clone, Default)]
pub struct ContentAnalyzer {
    config: ContentConfig,
}

impl ContentAnalyzer {
    pub fn new(config: ContentConfig) -> Self {
        Self { config }
    }

    /// Analyze an issue set. Repeated keys are counted once.
    pub fn analyze<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) -> ContentReport {
        let mut seen = BTreeSet::new();
        let issues: Vec<&Issue> = issues
            .into_iter()
            .filter(|i| seen.insert(i.key.clone()))
            .collect();

        let terms = term_frequencies(&issues);
        let common_terms = self.common_terms(&terms, issues.len());

        ContentReport {
            issues_analyzed: issues.len(),
            common_terms,
            terms,
            repetition_anomalies: issues
                .iter()
                .flat_map(|i| self.repetition_anomalies(i))
                .collect(),
            labels: label_usage(&issues),
            components: usage(&issues, |i| &i.components),
            comments: comment_stats(&issues),
            tone: tone_signals(&issues),
            completeness: Completeness::Complete,
        }
    }

    /// Minimum number of issues a common term must appear in.
    pub fn common_threshold(&self, issue_count: usize) -> usize {
        let threshold = (self.config.common_term_ratio * issue_count as f64).ceil() as usize;
        threshold.max(1)
    }

    fn common_terms(&self, report: &TermFrequencyReport, issue_count: usize) -> Vec<CommonTerm> {
        let threshold = self.common_threshold(issue_count);
        let mut common: Vec<CommonTerm> = report
            .terms
            .iter()
            .filter(|(_, stats)| stats.issues.len() >= threshold)
            .map(|(term, stats)| CommonTerm {
                term: term.clone(),
                count: stats.count,
                issue_count: stats.issues.len(),
            })
            .collect();
        common.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        common.truncate(self.config.top_terms);
        common
    }

    fn repetition_anomalies(&self, issue: &Issue) -> Vec<RepetitionAnomaly> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for comment in &issue.comments {
            for term in tokenize(&comment.body) {
                *counts.entry(term).or_default() += 1;
            }
        }
        if counts.is_empty() {
            return Vec::new();
        }

        // Baseline is the mean count of the other terms.
        let total: usize = counts.values().sum();
        let distinct = counts.len();
        counts
            .into_iter()
            .filter_map(|(term, count)| {
                if count < self.config.anomaly_min_repeats {
                    return None;
                }
                let average = if distinct > 1 {
                    (total - count) as f64 / (distinct - 1) as f64
                } else {
                    0.0
                };
                (count as f64 >= self.config.anomaly_factor * average).then(|| {
                    RepetitionAnomaly {
                        issue: issue.key.clone(),
                        term,
                        count,
                        average,
                    }
                })
            })
            .collect()
    }
}

/// Term frequencies over summaries, descriptions and comments.
pub fn term_frequencies(issues: &[&Issue]) -> TermFrequencyReport {
    let mut report = TermFrequencyReport::default();
    for issue in issues {
        for text in issue.text_fields() {
            for term in tokenize(text) {
                report.add(term, &issue.key);
            }
        }
    }
    report
}

fn usage(issues: &[&Issue], names: fn(&Issue) -> &BTreeSet<String>) -> BTreeMap<String, UsageStats> {
    let mut usage: BTreeMap<String, UsageStats> = BTreeMap::new();
    for issue in issues {
        for name in names(issue) {
            let stats = usage.entry(name.clone()).or_default();
            stats.count += 1;
            stats.issues.insert(issue.key.clone());
        }
    }
    usage
}

fn label_usage(issues: &[&Issue]) -> LabelUsage {
    let mut pairs: HashMap<(&str, &str), usize> = HashMap::new();
    for issue in issues {
        let labels: Vec<&str> = issue.labels.iter().map(String::as_str).collect();
        for (i, first) in labels.iter().enumerate() {
            for second in &labels[i + 1..] {
                *pairs.entry((*first, *second)).or_default() += 1;
            }
        }
    }

    let mut co_occurrence: Vec<LabelPair> = pairs
        .into_iter()
        .map(|((first, second), count)| LabelPair {
            first: first.to_string(),
            second: second.to_string(),
            count,
        })
        .collect();
    co_occurrence.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });

    LabelUsage {
        usage: usage(issues, |i| &i.labels),
        co_occurrence,
    }
}

fn comment_stats(issues: &[&Issue]) -> CommentStats {
    let mut stats = CommentStats::default();
    let mut total_length = 0usize;

    for comment in issues.iter().flat_map(|i| &i.comments) {
        stats.total += 1;
        total_length += comment.body.chars().count();
        match comment.created {
            Some(created) => *stats.per_day.entry(created.date_naive()).or_default() += 1,
            None => stats.undated += 1,
        }
        *stats.per_author.entry(comment.author.clone()).or_default() += 1;
    }

    if stats.total > 0 {
        stats.average_length = total_length as f64 / stats.total as f64;
    }
    stats
}

fn tone_signals(issues: &[&Issue]) -> BTreeMap<ToneSignal, SignalStats> {
    let mut signals: BTreeMap<ToneSignal, SignalStats> = BTreeMap::new();

    for issue in issues {
        for comment in &issue.comments {
            let words: Vec<String> = comment
                .body
                .split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .collect();

            for signal in ToneSignal::ALL {
                let lexicon = signal.lexicon();
                let hits = words.iter().filter(|w| lexicon.contains(&w.as_str())).count();
                if hits > 0 {
                    let stats = signals.entry(signal).or_default();
                    stats.hits += hits;
                    stats.comments += 1;
                    stats.issues.insert(issue.key.clone());
                }
            }
        }
    }
    signals
}
