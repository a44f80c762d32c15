//! Data structures shared across the analysis pipeline.
//!
//! Everything a transcript turns into lives here: the per-call
//! `CallAnalysis`, the engagement-level `EngagementReport`, and the
//! enumerations the model responses are validated against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::task::TaskKind;

/// Estimate token count from text content.
///
/// Takes the larger of a character-based and a word-based estimate so that
/// prose with many short words is not undercounted. Deterministic and
/// monotonic in the length of the text.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    /// Characters per token (default: 4.0)
    chars_per_token: f64,
    /// Tokens per whitespace-separated word (default: 1.3)
    tokens_per_word: f64,
}

impl TokenEstimator {
    /// Create a new estimator with custom parameters.
    pub fn new(chars_per_token: f64, tokens_per_word: f64) -> Self {
        Self {
            chars_per_token,
            tokens_per_word,
        }
    }

    /// Estimate token count for the given text.
    pub fn estimate(&self, text: &str) -> usize {
        let char_count = text.chars().count();
        let word_count = text.split_whitespace().count();
        let by_chars = char_count as f64 / self.chars_per_token;
        let by_words = word_count as f64 * self.tokens_per_word;
        by_chars.max(by_words) as usize
    }

    /// Character budget implied by a token budget.
    pub fn chars_for_tokens(&self, tokens: usize) -> usize {
        (tokens as f64 * self.chars_per_token) as usize
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
            tokens_per_word: 1.3,
        }
    }
}

/// Basic size statistics for a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
    pub estimated_tokens: usize,
}

impl TextStats {
    pub fn compute(text: &str, estimator: &TokenEstimator) -> Self {
        Self {
            characters: text.chars().count(),
            words: text.split_whitespace().count(),
            lines: text.lines().count(),
            estimated_tokens: estimator.estimate(text),
        }
    }
}

/// One transcript as supplied by the file loader.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub call_id: String,
    pub text: String,
}

impl Transcript {
    pub fn new(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            text: text.into(),
        }
    }
}

/// Kind of sales call, determined once per transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    DiscoveryCall,
    DemoCall,
    PovCheckIn,
    Unknown,
}

impl CallType {
    /// Map a free-form label ("Demo Call", "pov check", ...) to a call type.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.contains("discovery") {
            Some(CallType::DiscoveryCall)
        } else if label.contains("demo") {
            Some(CallType::DemoCall)
        } else if label.contains("pov") || label.contains("proof of value") {
            Some(CallType::PovCheckIn)
        } else if label.contains("unknown") {
            Some(CallType::Unknown)
        } else {
            None
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::DiscoveryCall => write!(f, "Discovery Call"),
            CallType::DemoCall => write!(f, "Demo Call"),
            CallType::PovCheckIn => write!(f, "POV Check-in"),
            CallType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Priority of an action item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    #[default]
    Unset,
}

impl Priority {
    /// Lenient parse; anything unrecognized is `Unset`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("high") | Some("urgent") | Some("critical") => Priority::High,
            Some("medium") | Some("normal") => Priority::Medium,
            Some("low") => Priority::Low,
            _ => Priority::Unset,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
            Priority::Unset => write!(f, "unset"),
        }
    }
}

/// A follow-up extracted from a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub description: String,
    pub owner: Option<String>,
    pub due_date: Option<String>,
    pub priority: Priority,
    /// The call this item was extracted from
    pub source_call_id: String,
}

/// Overall tone of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" | "mixed" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }

    /// Position on the Negative..Positive scale.
    pub fn score(self) -> i32 {
        match self {
            Sentiment::Positive => 1,
            Sentiment::Neutral => 0,
            Sentiment::Negative => -1,
        }
    }

    /// Number of levels between two sentiments (0..=2).
    pub fn distance(self, other: Sentiment) -> u32 {
        self.score().abs_diff(other.score())
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Negative => write!(f, "Negative"),
        }
    }
}

/// How engaged the customer was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(EngagementLevel::High),
            "medium" | "moderate" => Some(EngagementLevel::Medium),
            "low" => Some(EngagementLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementLevel::High => write!(f, "High"),
            EngagementLevel::Medium => write!(f, "Medium"),
            EngagementLevel::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub overall: Sentiment,
    pub engagement_level: EngagementLevel,
    pub progression_notes: String,
}

impl SentimentResult {
    /// Stand-in used when no segment produced a sentiment.
    pub fn unavailable() -> Self {
        Self {
            overall: Sentiment::Neutral,
            engagement_level: EngagementLevel::Medium,
            progression_notes: "Sentiment analysis unavailable for this call.".to_string(),
        }
    }
}

/// A unit of work that degraded to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Chunk index, or `None` for call-level tasks such as classification
    pub segment: Option<usize>,
    pub task: TaskKind,
    pub reason: String,
}

/// Structured analysis of one call transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub call_id: String,
    pub call_type: CallType,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub sentiment: SentimentResult,
    pub raw_snippets: Vec<String>,
    /// Speakers named in the transcript, in order of first mention
    pub participants: Vec<String>,
    /// Call date as stated in the transcript, if any
    pub call_date: Option<String>,
    /// True when any chunk or task fell back to a placeholder
    pub partial: bool,
    pub failures: Vec<TaskFailure>,
    pub stats: TextStats,
    pub chunk_count: usize,
}

/// Severity of an engagement risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Lenient parse; unknown values are treated as `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" | "critical" => Severity::High,
            "low" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub description: String,
    pub severity: Severity,
    pub time_open: String,
    pub mitigation: String,
}

/// An action item deduplicated across calls.
///
/// `item.source_call_id` is the first call the item appeared in;
/// `source_call_ids` lists every call that mentioned it, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedActionItem {
    pub item: ActionItem,
    pub source_call_ids: Vec<String>,
}

/// Where the win/loss narrative came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentSource {
    Model,
    Heuristic,
}

/// Engagement-level win/loss assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementReport {
    pub win_probability: u8,
    pub probability_reasoning: String,
    pub positive_factors: Vec<String>,
    pub risks: Vec<Risk>,
    pub unresolved_questions: Vec<String>,
    pub recommended_demos: Vec<String>,
    pub competitive_advantages: Vec<String>,
    pub next_steps: Vec<String>,
    pub merged_action_items: Vec<MergedActionItem>,
    pub supporting_snippets: Vec<String>,
    pub call_ids: Vec<String>,
    pub call_type_counts: BTreeMap<CallType, usize>,
    pub sentiment_counts: BTreeMap<Sentiment, usize>,
    pub partial_calls: Vec<String>,
    pub assessment_source: AssessmentSource,
    pub technical_deployment: TechnicalDeployment,
    pub deployment_source: AssessmentSource,
    pub stats: EngagementStats,
    /// Data-quality warnings raised while building the report
    pub diagnostics: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Counts over every call of an engagement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementStats {
    pub total_calls: usize,
    /// Action items before cross-call dedup
    pub total_action_items: usize,
    pub unique_action_items: usize,
    pub action_items_by_priority: BTreeMap<Priority, usize>,
    /// Keyed by owner, "Unassigned" when none was named
    pub action_items_by_owner: BTreeMap<String, usize>,
    pub unique_participants: Vec<String>,
    pub total_words: usize,
    pub average_words_per_call: f64,
}

/// How hard the rollout looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentComplexity {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl DeploymentComplexity {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => DeploymentComplexity::Low,
            "medium" | "moderate" => DeploymentComplexity::Medium,
            "high" => DeploymentComplexity::High,
            _ => DeploymentComplexity::Unknown,
        }
    }
}

/// Source control setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScmPlatform {
    pub platform: Option<String>,
    /// Cloud, on-prem or hybrid
    pub deployment_type: Option<String>,
    pub details: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiPipelines {
    pub primary_ci: Option<String>,
    pub additional_ci: Vec<String>,
    pub details: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgrammingLanguages {
    pub primary_languages: Vec<String>,
    /// Languages the evaluation concentrates on
    pub poc_focus_languages: Vec<String>,
    pub details: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Integrations {
    pub interested_integrations: Vec<String>,
    pub current_integrations: Vec<String>,
    pub details: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyChainSecurity {
    pub languages_tested: Vec<String>,
    pub package_managers: Vec<String>,
    pub details: String,
    pub evidence: String,
}

/// Security tooling already in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityTools {
    pub sast: Option<String>,
    pub dast: Option<String>,
    pub sca: Option<String>,
    pub secrets_detection: Option<String>,
    pub aspm: Option<String>,
    pub details: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeEnvironment {
    pub primary_ide: Option<String>,
    pub additional_tools: Vec<String>,
    pub details: String,
    pub evidence: String,
}

/// The customer's technical landscape as discussed across the calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalDeployment {
    pub scm_platform: ScmPlatform,
    pub ci_pipelines: CiPipelines,
    pub programming_languages: ProgrammingLanguages,
    pub integrations: Integrations,
    pub supply_chain_security: SupplyChainSecurity,
    pub current_security_tools: SecurityTools,
    pub ide_environment: IdeEnvironment,
    pub additional_technical_details: Vec<String>,
    pub deployment_complexity: DeploymentComplexity,
    pub migration_considerations: Vec<String>,
    pub technical_risks: Vec<String>,
    pub recommendations: Vec<String>,
}
