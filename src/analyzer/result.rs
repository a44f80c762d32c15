//! Merging of per-segment and per-call results.
//!
//! This module provides:
//! - `CallResultBuilder` - Builder pattern for folding segment outcomes into a `CallAnalysis`
//! - `merge_sentiment` - token-weighted sentiment merge with swing detection
//! - `merge_across_calls` - engagement-level action item dedup with provenance
//!
//! # Deduplication
//!
//! Key points and action items are compared on normalized text: whitespace
//! runs collapsed to one space, trimmed, lowercased. Two entries are the same
//! only when their normalized forms are identical; paraphrases are kept apart.

use super::task::{ActionItemDraft, SegmentPosition, SummaryResult};
use super::types::{
    ActionItem, CallAnalysis, CallType, EngagementLevel, MergedActionItem, Priority, Sentiment,
    SentimentResult, TaskFailure, TextStats,
};
use std::collections::HashMap;

/// Normalize text for duplicate detection.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop empty and duplicate entries, keeping the first occurrence.
pub fn dedup_texts<I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    texts
        .into_iter()
        .filter(|t| {
            let key = normalize_text(t);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Deduplicate one call's action items.
///
/// The first occurrence wins; later duplicates only fill in an owner,
/// due date or priority the first one lacked.
pub fn merge_action_items(items: Vec<ActionItem>) -> Vec<ActionItem> {
    let mut merged: Vec<ActionItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = normalize_text(&item.description);
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&pos) => fill_missing(&mut merged[pos], &item),
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }
    merged
}

fn fill_missing(target: &mut ActionItem, other: &ActionItem) {
    if target.owner.is_none() {
        target.owner = other.owner.clone();
    }
    if target.due_date.is_none() {
        target.due_date = other.due_date.clone();
    }
    if target.priority == Priority::Unset {
        target.priority = other.priority;
    }
}

/// Deduplicate action items across calls, keeping every source call id.
///
/// Items keep call order, then in-call order. `item` is the first call's
/// copy unchanged, so its owner, due date and priority all come from
/// `item.source_call_id`.
pub fn merge_across_calls(analyses: &[CallAnalysis]) -> Vec<MergedActionItem> {
    let mut merged: Vec<MergedActionItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for analysis in analyses {
        for item in &analysis.action_items {
            let key = normalize_text(&item.description);
            if key.is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&pos) => {
                    let entry = &mut merged[pos];
                    if !entry.source_call_ids.contains(&analysis.call_id) {
                        entry.source_call_ids.push(analysis.call_id.clone());
                    }
                }
                None => {
                    index.insert(key, merged.len());
                    merged.push(MergedActionItem {
                        item: item.clone(),
                        source_call_ids: vec![analysis.call_id.clone()],
                    });
                }
            }
        }
    }
    merged
}

/// One segment's sentiment with its weight in the merge.
#[derive(Debug, Clone)]
pub struct WeightedSentiment {
    pub segment: usize,
    pub weight: usize,
    pub result: SentimentResult,
}

/// Merge per-segment sentiment into one call-level result.
///
/// - No segments: the "unavailable" stand-in.
/// - Segments spanning Positive and Negative: the last segment decides, and
///   the notes describe the swing.
/// - Otherwise: token-weighted vote; ties go to the later segment.
///
/// Engagement level always uses the weighted vote.
pub fn merge_sentiment(segments: &[WeightedSentiment]) -> SentimentResult {
    let Some(last) = segments.last() else {
        return SentimentResult::unavailable();
    };
    if segments.len() == 1 {
        return last.result.clone();
    }

    let sequence: Vec<Sentiment> = segments.iter().map(|s| s.result.overall).collect();
    let swing = sequence.contains(&Sentiment::Positive) && sequence.contains(&Sentiment::Negative);

    let overall = if swing {
        last.result.overall
    } else {
        weighted_vote(segments.iter().map(|s| (s.result.overall, s.weight)))
            .unwrap_or(last.result.overall)
    };
    let engagement_level: EngagementLevel =
        weighted_vote(segments.iter().map(|s| (s.result.engagement_level, s.weight)))
            .unwrap_or(last.result.engagement_level);

    let mut notes: Vec<String> = Vec::new();
    let labels: Vec<String> = sequence.iter().map(|s| s.to_string()).collect();
    if swing {
        notes.push(format!(
            "Sentiment shifted during the call ({}); the call ended {}.",
            labels.join(" -> "),
            last.result.overall
        ));
    } else if sequence.iter().any(|s| *s != sequence[0]) {
        notes.push(format!(
            "Sentiment varied across segments ({}).",
            labels.join(" -> ")
        ));
    }
    for s in segments {
        let text = s.result.progression_notes.trim();
        if !text.is_empty() {
            notes.push(format!("Segment {}: {}", s.segment + 1, text));
        }
    }

    SentimentResult {
        overall,
        engagement_level,
        progression_notes: notes.join(" "),
    }
}

/// Pick the value with the largest total weight; ties go to the value seen latest.
fn weighted_vote<T, I>(values: I) -> Option<T>
where
    T: Copy + Eq + std::hash::Hash,
    I: IntoIterator<Item = (T, usize)>,
{
    let mut totals: HashMap<T, (usize, usize)> = HashMap::new();
    let mut order = Vec::new();
    for (position, (value, weight)) in values.into_iter().enumerate() {
        let entry = totals.entry(value).or_insert_with(|| {
            order.push(value);
            (0, 0)
        });
        entry.0 += weight;
        entry.1 = position;
    }
    // Totals compare as (weight, latest position), so equal weights favor
    // the later value.
    order.into_iter().max_by_key(|value| totals[value])
}

/// What one segment contributed. `None` marks a task that degraded.
#[derive(Debug, Clone)]
pub struct SegmentOutcome {
    pub position: SegmentPosition,
    pub estimated_tokens: usize,
    pub summary: Option<SummaryResult>,
    pub action_items: Option<Vec<ActionItemDraft>>,
    pub sentiment: Option<SentimentResult>,
}

impl SegmentOutcome {
    pub fn new(position: SegmentPosition, estimated_tokens: usize) -> Self {
        Self {
            position,
            estimated_tokens,
            summary: None,
            action_items: None,
            sentiment: None,
        }
    }
}

/// Placeholder text for a segment whose summary is unavailable.
pub fn unavailable_placeholder(position: SegmentPosition) -> String {
    format!(
        "[analysis unavailable for segment {} of {}]",
        position.index + 1,
        position.total
    )
}

/// Builds a `CallAnalysis` from segment outcomes in sequence order.
#[derive(Debug)]
pub struct CallResultBuilder {
    call_id: String,
    call_type: CallType,
    stats: TextStats,
    segments: Vec<SegmentOutcome>,
    failures: Vec<TaskFailure>,
}

impl CallResultBuilder {
    pub fn new(call_id: impl Into<String>, stats: TextStats) -> Self {
        Self {
            call_id: call_id.into(),
            call_type: CallType::Unknown,
            stats,
            segments: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn record_failure(&mut self, failure: TaskFailure) {
        self.failures.push(failure);
    }

    pub fn push_segment(&mut self, outcome: SegmentOutcome) {
        self.segments.push(outcome);
    }

    pub fn build(self) -> CallAnalysis {
        let mut summaries = Vec::new();
        let mut key_points = Vec::new();
        let mut snippets = Vec::new();
        let mut participants = Vec::new();
        let mut call_date = None;
        let mut action_items = Vec::new();
        let mut sentiments = Vec::new();

        for segment in &self.segments {
            match &segment.summary {
                Some(s) => {
                    summaries.push(s.summary.clone());
                    key_points.extend(s.key_points.iter().cloned());
                    snippets.extend(s.snippets.iter().cloned());
                    participants.extend(s.participants.iter().cloned());
                    if call_date.is_none() {
                        call_date = s.call_date.clone();
                    }
                }
                None => summaries.push(unavailable_placeholder(segment.position)),
            }

            if let Some(items) = &segment.action_items {
                action_items.extend(items.iter().map(|draft| ActionItem {
                    description: draft.description.clone(),
                    owner: draft.owner.clone(),
                    due_date: draft.due_date.clone(),
                    priority: draft.priority,
                    source_call_id: self.call_id.clone(),
                }));
            }

            if let Some(sentiment) = &segment.sentiment {
                sentiments.push(WeightedSentiment {
                    segment: segment.position.index,
                    weight: segment.estimated_tokens.max(1),
                    result: sentiment.clone(),
                });
            }
        }

        CallAnalysis {
            call_id: self.call_id,
            call_type: self.call_type,
            summary: summaries.join("\n\n"),
            key_points: dedup_texts(key_points),
            action_items: merge_action_items(action_items),
            sentiment: merge_sentiment(&sentiments),
            raw_snippets: dedup_texts(snippets),
            participants: dedup_texts(participants),
            call_date,
            partial: !self.failures.is_empty(),
            failures: self.failures,
            stats: self.stats,
            chunk_count: self.segments.len(),
        }
    }
}
