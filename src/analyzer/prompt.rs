//! Prompt building for the analysis tasks.
//!
//! Templates live in `src/analyzer/prompts/` and are compiled in with
//! `include_str!`. Each has a `{transcript}` placeholder; the per-segment
//! templates also carry `{segment_note}`.

use super::task::{SegmentPosition, TaskKind};

const CLASSIFY_TEMPLATE: &str = include_str!("prompts/classify.txt");
const SUMMARY_TEMPLATE: &str = include_str!("prompts/summary.txt");
const ACTION_ITEMS_TEMPLATE: &str = include_str!("prompts/action_items.txt");
const SENTIMENT_TEMPLATE: &str = include_str!("prompts/sentiment.txt");
const ENGAGEMENT_TEMPLATE: &str = include_str!("prompts/engagement.txt");
const DEPLOYMENT_TEMPLATE: &str = include_str!("prompts/deployment.txt");

fn template(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Classification => CLASSIFY_TEMPLATE,
        TaskKind::Summary => SUMMARY_TEMPLATE,
        TaskKind::ActionItems => ACTION_ITEMS_TEMPLATE,
        TaskKind::Sentiment => SENTIMENT_TEMPLATE,
        TaskKind::EngagementAssessment => ENGAGEMENT_TEMPLATE,
        TaskKind::TechnicalDeployment => DEPLOYMENT_TEMPLATE,
    }
}

/// Render the prompt for `task` over `text`.
///
/// `segment` is set when `text` is one chunk of a longer transcript; the
/// note tells the model to focus on that segment.
pub fn build_prompt(task: TaskKind, text: &str, segment: Option<SegmentPosition>) -> String {
    // Substitute the note before the transcript so transcript text that
    // happens to contain a placeholder is left alone.
    template(task)
        .replace("{segment_note}", &segment_note(segment))
        .replace("{transcript}", text)
}

/// Extra instruction for multi-segment transcripts.
fn segment_note(segment: Option<SegmentPosition>) -> String {
    match segment {
        Some(pos) if pos.total > 1 => {
            let mut note = format!(
                "\nNote: This is {} of a longer transcript. Focus on the content in this segment; \
                 its opening overlaps slightly with the previous segment.",
                pos.label()
            );
            if pos.is_last() {
                note.push_str(" This segment contains the end of the call.");
            }
            note.push('\n');
            note
        }
        _ => String::new(),
    }
}
