//! Engagement-level aggregation of per-call analyses.
//!
//! The aggregator validates provenance, merges action items across calls,
//! renders consolidated call data for the model and turns the model's
//! replies (or the heuristic fallbacks) into an `EngagementReport`.
//!
//! Consolidated input that would overflow the context window is rendered
//! again at lower detail. If even the minimal rendering does not fit, the
//! heuristic fallback is used, so computed call analyses are never lost.

use super::error::AnalysisError;
use super::heuristic::{heuristic_assessment, heuristic_deployment, technical_terms};
use super::result::{dedup_texts, merge_across_calls};
use super::retry::RetryOrchestrator;
use super::task::{Assessment, TaskKind};
use super::types::{
    AssessmentSource, CallAnalysis, CallType, EngagementReport, EngagementStats,
    MergedActionItem, Sentiment, TechnicalDeployment,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};

/// Action item keywords that mark an item as technical.
const TECHNICAL_ITEM_KEYWORDS: &[&str] = &[
    "integration",
    "api",
    "deploy",
    "setup",
    "set up",
    "configur",
    "language",
    "platform",
    "tool",
    "system",
    "pipeline",
    "scan",
];

/// How much per-call detail the consolidated input carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDetail {
    Full,
    Compact,
    Minimal,
}

impl SummaryDetail {
    /// Levels from most to least detailed.
    pub const ALL: [SummaryDetail; 3] = [
        SummaryDetail::Full,
        SummaryDetail::Compact,
        SummaryDetail::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryDetail::Full => "full",
            SummaryDetail::Compact => "compact",
            SummaryDetail::Minimal => "minimal",
        }
    }

    /// Characters of each call summary included.
    fn summary_chars(&self) -> usize {
        match self {
            SummaryDetail::Full => 500,
            SummaryDetail::Compact => 150,
            SummaryDetail::Minimal => 0,
        }
    }

    /// Key points and action items listed per call.
    fn items_per_call(&self) -> usize {
        match self {
            SummaryDetail::Full => 5,
            SummaryDetail::Compact => 2,
            SummaryDetail::Minimal => 0,
        }
    }

    /// Cross-call action items listed in the overview.
    fn common_items(&self) -> usize {
        match self {
            SummaryDetail::Full => 10,
            SummaryDetail::Compact => 5,
            SummaryDetail::Minimal => 3,
        }
    }
}

/// Rolls N call analyses into one engagement report.
pub struct EngagementAggregator<'a> {
    orchestrator: &'a RetryOrchestrator,
}

impl<'a> EngagementAggregator<'a> {
    pub fn new(orchestrator: &'a RetryOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Aggregate the analyses of one engagement.
    ///
    /// Fails on an empty input or broken provenance. An unavailable or
    /// oversized model step degrades to its heuristic fallback.
    pub fn aggregate(&self, analyses: &[CallAnalysis]) -> Result<EngagementReport, AnalysisError> {
        if analyses.is_empty() {
            return Err(AnalysisError::EmptyEngagement);
        }
        validate_provenance(analyses)?;

        let merged_items = merge_across_calls(analyses);
        let mut diagnostics = partial_call_diagnostics(analyses);

        tracing::info!(
            calls = analyses.len(),
            merged_action_items = merged_items.len(),
            "Requesting engagement assessment"
        );
        let (assessment, source) = self.assess(analyses, &merged_items, &mut diagnostics)?;
        let (deployment, deployment_source) = self.assess_deployment(analyses, &mut diagnostics)?;

        Ok(build_report(
            analyses,
            merged_items,
            Assessed {
                assessment,
                source,
                deployment,
                deployment_source,
            },
            diagnostics,
        ))
    }

    /// Render at the highest detail level whose prompt fits the window.
    fn fit_input<F>(&self, task: TaskKind, diagnostics: &mut Vec<String>, render: F) -> Option<String>
    where
        F: Fn(SummaryDetail) -> String,
    {
        for detail in SummaryDetail::ALL {
            let text = render(detail);
            if !self.orchestrator.fits(task, &text) {
                continue;
            }
            if detail != SummaryDetail::Full {
                tracing::warn!(
                    task = %task,
                    detail = detail.as_str(),
                    "Consolidated input trimmed to fit the context window"
                );
                diagnostics.push(format!(
                    "{} input trimmed to {} detail to fit the context window",
                    task,
                    detail.as_str()
                ));
            }
            return Some(text);
        }
        None
    }

    fn assess(
        &self,
        analyses: &[CallAnalysis],
        merged_items: &[MergedActionItem],
        diagnostics: &mut Vec<String>,
    ) -> Result<(Assessment, AssessmentSource), AnalysisError> {
        let task = TaskKind::EngagementAssessment;
        let heuristic = || {
            (
                heuristic_assessment(analyses, merged_items),
                AssessmentSource::Heuristic,
            )
        };

        let Some(summary) = self.fit_input(task, diagnostics, |detail| {
            build_engagement_summary(analyses, merged_items, detail)
        }) else {
            tracing::warn!("Engagement data exceeds the context window, using heuristic");
            diagnostics.push(
                "Engagement data exceeds the context window at every detail level; \
                 used heuristic assessment"
                    .to_string(),
            );
            return Ok(heuristic());
        };

        match self.orchestrator.analyze(&summary, task) {
            Ok(result) => result
                .into_assessment()
                .map(|assessment| (assessment, AssessmentSource::Model))
                .ok_or_else(|| AnalysisError::model_response(task, "reply had the wrong shape", "")),
            Err(err) if err.is_degradable() => {
                tracing::warn!(error = %err, "Engagement assessment unavailable, using heuristic");
                diagnostics.push(format!(
                    "Engagement assessment unavailable ({}); used heuristic assessment",
                    err
                ));
                Ok(heuristic())
            }
            Err(err) => Err(err),
        }
    }

    fn assess_deployment(
        &self,
        analyses: &[CallAnalysis],
        diagnostics: &mut Vec<String>,
    ) -> Result<(TechnicalDeployment, AssessmentSource), AnalysisError> {
        let task = TaskKind::TechnicalDeployment;
        let heuristic = || {
            (
                heuristic_deployment(&call_text(analyses)),
                AssessmentSource::Heuristic,
            )
        };

        let Some(summary) = self.fit_input(task, diagnostics, |detail| {
            build_deployment_summary(analyses, detail)
        }) else {
            diagnostics.push(
                "Technical data exceeds the context window at every detail level; \
                 used keyword detection"
                    .to_string(),
            );
            return Ok(heuristic());
        };

        match self.orchestrator.analyze(&summary, task) {
            Ok(result) => result
                .into_deployment()
                .map(|deployment| (deployment, AssessmentSource::Model))
                .ok_or_else(|| AnalysisError::model_response(task, "reply had the wrong shape", "")),
            Err(err) if err.is_degradable() => {
                tracing::warn!(error = %err, "Technical deployment analysis unavailable, using keyword detection");
                diagnostics.push(format!(
                    "Technical deployment analysis unavailable ({}); used keyword detection",
                    err
                ));
                Ok(heuristic())
            }
            Err(err) => Err(err),
        }
    }
}

/// Check that every analysis and action item traces back to one call.
pub fn validate_provenance(analyses: &[CallAnalysis]) -> Result<(), AnalysisError> {
    let mut seen = HashSet::new();
    for analysis in analyses {
        let call_id = analysis.call_id.trim();
        if call_id.is_empty() {
            return Err(AnalysisError::Validation {
                call_id: analysis.call_id.clone(),
                reason: "call_id is empty".to_string(),
            });
        }
        if !seen.insert(call_id) {
            return Err(AnalysisError::Validation {
                call_id: analysis.call_id.clone(),
                reason: "call_id appears more than once".to_string(),
            });
        }
        if let Some(item) = analysis
            .action_items
            .iter()
            .find(|item| item.source_call_id != analysis.call_id)
        {
            return Err(AnalysisError::Validation {
                call_id: analysis.call_id.clone(),
                reason: format!(
                    "action item '{}' claims source call '{}'",
                    item.description, item.source_call_id
                ),
            });
        }
    }
    Ok(())
}

fn partial_call_diagnostics(analyses: &[CallAnalysis]) -> Vec<String> {
    analyses
        .iter()
        .filter(|a| a.partial)
        .map(|a| {
            format!(
                "Call '{}' analysis is partial ({} task(s) unavailable)",
                a.call_id,
                a.failures.len()
            )
        })
        .collect()
}

/// Render the consolidated engagement data sent to the model.
pub fn build_engagement_summary(
    analyses: &[CallAnalysis],
    merged_items: &[MergedActionItem],
    detail: SummaryDetail,
) -> String {
    let mut out = String::new();
    let type_counts = count_by(analyses, |a| a.call_type);
    let sentiment_counts = count_by(analyses, |a| a.sentiment.overall);
    let engagement_counts = count_by(analyses, |a| a.sentiment.engagement_level);

    out.push_str("ENGAGEMENT OVERVIEW\n");
    out.push_str(&format!("Total calls: {}\n", analyses.len()));
    out.push_str(&format!("Call types: {}\n", join_counts(&type_counts)));
    out.push_str(&format!("Sentiment: {}\n", join_counts(&sentiment_counts)));
    out.push_str(&format!(
        "Engagement levels: {}\n\n",
        join_counts(&engagement_counts)
    ));

    out.push_str("CALL DETAILS\n");
    for (i, analysis) in analyses.iter().enumerate() {
        if detail == SummaryDetail::Minimal {
            out.push_str(&format!(
                "Call {}: {} | {} | {} ({} engagement) | {} action item(s){}\n",
                i + 1,
                analysis.call_id,
                analysis.call_type,
                analysis.sentiment.overall,
                analysis.sentiment.engagement_level,
                analysis.action_items.len(),
                if analysis.partial { " | incomplete" } else { "" }
            ));
            continue;
        }

        out.push_str(&format!("\nCall {}: {}\n", i + 1, analysis.call_id));
        out.push_str(&format!("Type: {}\n", analysis.call_type));
        if let Some(date) = &analysis.call_date {
            out.push_str(&format!("Date: {}\n", date));
        }
        out.push_str(&format!(
            "Sentiment: {} (engagement {})\n",
            analysis.sentiment.overall, analysis.sentiment.engagement_level
        ));
        if detail == SummaryDetail::Full {
            if !analysis.participants.is_empty() {
                out.push_str(&format!(
                    "Participants: {}\n",
                    analysis.participants.join(", ")
                ));
            }
            if !analysis.sentiment.progression_notes.is_empty() {
                out.push_str(&format!(
                    "Sentiment notes: {}\n",
                    analysis.sentiment.progression_notes
                ));
            }
        }
        out.push_str(&format!(
            "Summary: {}\n",
            preview(&analysis.summary, detail.summary_chars())
        ));
        if detail == SummaryDetail::Full && !analysis.key_points.is_empty() {
            out.push_str("Key points:\n");
            for point in analysis.key_points.iter().take(detail.items_per_call()) {
                out.push_str(&format!("- {}\n", point));
            }
        }
        if !analysis.action_items.is_empty() {
            out.push_str("Action items:\n");
            for item in analysis.action_items.iter().take(detail.items_per_call()) {
                let owner = item.owner.as_deref().unwrap_or("unassigned");
                out.push_str(&format!(
                    "- {} (owner: {}, priority: {})\n",
                    item.description, owner, item.priority
                ));
            }
        }
        if analysis.partial {
            out.push_str("Note: parts of this call could not be analyzed; treat it as incomplete.\n");
        }
    }

    let mut common: Vec<&MergedActionItem> = merged_items
        .iter()
        .filter(|m| m.source_call_ids.len() > 1)
        .collect();
    if !common.is_empty() {
        common.sort_by(|a, b| b.source_call_ids.len().cmp(&a.source_call_ids.len()));
        out.push_str("\nRECURRING ACTION ITEMS\n");
        for merged in common.into_iter().take(detail.common_items()) {
            if detail == SummaryDetail::Minimal {
                out.push_str(&format!(
                    "- {} (mentioned in {} calls)\n",
                    merged.item.description,
                    merged.source_call_ids.len()
                ));
            } else {
                out.push_str(&format!(
                    "- {} (mentioned in {} calls: {})\n",
                    merged.item.description,
                    merged.source_call_ids.len(),
                    merged.source_call_ids.join(", ")
                ));
            }
        }
    }

    out
}

fn is_technical_item(description: &str) -> bool {
    let lower = description.to_lowercase();
    TECHNICAL_ITEM_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// All free text the calls produced, for keyword detection.
fn call_text(analyses: &[CallAnalysis]) -> String {
    let mut text = String::new();
    for analysis in analyses {
        text.push_str(&analysis.summary);
        text.push('\n');
        for line in analysis
            .key_points
            .iter()
            .chain(&analysis.raw_snippets)
            .chain(analysis.action_items.iter().map(|item| &item.description))
        {
            text.push_str(line);
            text.push('\n');
        }
    }
    text
}

/// Render the technical call data sent for the deployment analysis.
pub fn build_deployment_summary(analyses: &[CallAnalysis], detail: SummaryDetail) -> String {
    let mut out = String::new();
    out.push_str("TECHNICAL DEPLOYMENT OVERVIEW\n");
    out.push_str(&format!("Total calls: {}\n", analyses.len()));
    out.push_str(&format!(
        "Call types: {}\n",
        join_counts(&count_by(analyses, |a| a.call_type))
    ));

    out.push_str("\nTECHNICAL DETAILS\n");
    for (i, analysis) in analyses.iter().enumerate() {
        out.push_str(&format!(
            "\nCall {}: {} ({})\n",
            i + 1,
            analysis.call_id,
            analysis.call_type
        ));
        if detail == SummaryDetail::Minimal {
            continue;
        }

        let points = match detail {
            SummaryDetail::Full => 10,
            _ => 3,
        };
        if !analysis.key_points.is_empty() {
            out.push_str("Discussion points:\n");
            for point in analysis.key_points.iter().take(points) {
                out.push_str(&format!("- {}\n", point));
            }
        }
        let technical: Vec<_> = analysis
            .action_items
            .iter()
            .filter(|item| is_technical_item(&item.description))
            .take(detail.items_per_call())
            .collect();
        if !technical.is_empty() {
            out.push_str("Technical action items:\n");
            for item in technical {
                out.push_str(&format!(
                    "- {} (owner: {})\n",
                    item.description,
                    item.owner.as_deref().unwrap_or("unassigned")
                ));
            }
        }
        let summary_chars = match detail {
            SummaryDetail::Full => 1000,
            _ => 300,
        };
        out.push_str(&format!(
            "Details: {}\n",
            preview(&analysis.summary, summary_chars)
        ));
    }

    let terms = technical_terms(&call_text(analyses));
    if !terms.is_empty() {
        out.push_str(&format!(
            "\nTECHNICAL TERMS MENTIONED\n{}\n",
            terms.join(", ")
        ));
    }
    out
}

fn count_by<K, F>(analyses: &[CallAnalysis], key: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&CallAnalysis) -> K,
{
    let mut counts = BTreeMap::new();
    for analysis in analyses {
        *counts.entry(key(analysis)).or_insert(0) += 1;
    }
    counts
}

fn join_counts<K: std::fmt::Display>(counts: &BTreeMap<K, usize>) -> String {
    counts
        .iter()
        .map(|(k, v)| format!("{} {}", v, k))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Action item, participant and word counts across the engagement.
pub fn engagement_stats(analyses: &[CallAnalysis], merged_items: &[MergedActionItem]) -> EngagementStats {
    let mut stats = EngagementStats {
        total_calls: analyses.len(),
        unique_action_items: merged_items.len(),
        ..Default::default()
    };
    for item in analyses.iter().flat_map(|a| &a.action_items) {
        stats.total_action_items += 1;
        *stats.action_items_by_priority.entry(item.priority).or_insert(0) += 1;
        let owner = item.owner.clone().unwrap_or_else(|| "Unassigned".to_string());
        *stats.action_items_by_owner.entry(owner).or_insert(0) += 1;
    }
    stats.unique_participants =
        dedup_texts(analyses.iter().flat_map(|a| a.participants.iter().cloned()));
    stats.total_words = analyses.iter().map(|a| a.stats.words).sum();
    if !analyses.is_empty() {
        stats.average_words_per_call = stats.total_words as f64 / analyses.len() as f64;
    }
    stats
}

/// Clamp a raw probability into 0..=100, reporting out-of-range values.
pub fn clamp_probability(raw: i64, diagnostics: &mut Vec<String>) -> u8 {
    let clamped = raw.clamp(0, 100);
    if clamped != raw {
        tracing::warn!(
            raw,
            clamped,
            "Model returned an out-of-range win probability"
        );
        diagnostics.push(format!(
            "win_probability {} out of range; clamped to {}",
            raw, clamped
        ));
    }
    clamped as u8
}

fn supporting_snippets(assessment: &Assessment, analyses: &[CallAnalysis]) -> Vec<String> {
    if !assessment.snippets.is_empty() {
        return assessment
            .snippets
            .iter()
            .map(|s| {
                let call = if s.call.is_empty() { "unknown call" } else { s.call.as_str() };
                if s.significance.is_empty() {
                    format!("[{}] \"{}\"", call, s.quote)
                } else {
                    format!("[{}] \"{}\" ({})", call, s.quote, s.significance)
                }
            })
            .collect();
    }

    analyses
        .iter()
        .filter_map(|a| {
            a.raw_snippets
                .first()
                .map(|quote| format!("[{}] \"{}\"", a.call_id, quote))
        })
        .collect()
}

/// Outcome of the two engagement-level model steps.
struct Assessed {
    assessment: Assessment,
    source: AssessmentSource,
    deployment: TechnicalDeployment,
    deployment_source: AssessmentSource,
}

fn build_report(
    analyses: &[CallAnalysis],
    merged_items: Vec<MergedActionItem>,
    assessed: Assessed,
    mut diagnostics: Vec<String>,
) -> EngagementReport {
    let Assessed {
        assessment,
        source,
        deployment,
        deployment_source,
    } = assessed;
    let win_probability = clamp_probability(assessment.win_probability, &mut diagnostics);
    let supporting_snippets = supporting_snippets(&assessment, analyses);
    let stats = engagement_stats(analyses, &merged_items);

    let call_type_counts: BTreeMap<CallType, usize> = count_by(analyses, |a| a.call_type);
    let sentiment_counts: BTreeMap<Sentiment, usize> = count_by(analyses, |a| a.sentiment.overall);

    EngagementReport {
        win_probability,
        probability_reasoning: assessment.probability_reasoning,
        positive_factors: assessment.positive_factors,
        risks: assessment.risks,
        unresolved_questions: assessment.unresolved_questions,
        recommended_demos: assessment.recommended_demos,
        competitive_advantages: assessment.competitive_advantages,
        next_steps: assessment.next_steps,
        merged_action_items: merged_items,
        supporting_snippets,
        call_ids: analyses.iter().map(|a| a.call_id.clone()).collect(),
        call_type_counts,
        sentiment_counts,
        partial_calls: analyses
            .iter()
            .filter(|a| a.partial)
            .map(|a| a.call_id.clone())
            .collect(),
        assessment_source: source,
        technical_deployment: deployment,
        deployment_source,
        stats,
        diagnostics,
        generated_at: Utc::now(),
    }
}
