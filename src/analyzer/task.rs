//! Analysis tasks and their validated result schemas.
//!
//! Each `TaskKind` has exactly one expected response shape. Model replies
//! are parsed into the matching `StructuredResult` variant; a reply that
//! does not fit the schema is rejected instead of being read loosely.

use super::backend::extract_json;
use super::types::{
    CallType, CiPipelines, DeploymentComplexity, EngagementLevel, IdeEnvironment, Integrations,
    Priority, ProgrammingLanguages, Risk, ScmPlatform, SecurityTools, Sentiment, SentimentResult,
    Severity, SupplyChainSecurity, TechnicalDeployment,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One kind of model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Summary,
    ActionItems,
    Sentiment,
    EngagementAssessment,
    TechnicalDeployment,
}

impl TaskKind {
    /// Tasks issued once per transcript chunk, in order.
    pub const PER_SEGMENT: [TaskKind; 3] =
        [TaskKind::Summary, TaskKind::ActionItems, TaskKind::Sentiment];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Summary => "summary",
            TaskKind::ActionItems => "action_items",
            TaskKind::Sentiment => "sentiment",
            TaskKind::EngagementAssessment => "engagement_assessment",
            TaskKind::TechnicalDeployment => "technical_deployment",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a segment within its transcript (0-based index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    pub index: usize,
    pub total: usize,
}

impl SegmentPosition {
    pub fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }

    /// Human-facing label, e.g. "segment 2 of 3".
    pub fn label(&self) -> String {
        format!("segment {} of {}", self.index + 1, self.total)
    }
}

/// Summary and key points for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub key_points: Vec<String>,
    /// Verbatim quotes worth surfacing in the engagement report
    pub snippets: Vec<String>,
    pub participants: Vec<String>,
    pub call_date: Option<String>,
}

/// An action item as extracted, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemDraft {
    pub description: String,
    pub owner: Option<String>,
    pub due_date: Option<String>,
    pub priority: Priority,
}

/// A quote the assessment cites as evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSnippet {
    pub call: String,
    pub context: String,
    pub quote: String,
    pub significance: String,
}

/// Engagement-level assessment as returned by the model.
///
/// `win_probability` is the raw value, which may be outside 0..=100;
/// the aggregator clamps it and reports the discrepancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub win_probability: i64,
    pub probability_reasoning: String,
    pub positive_factors: Vec<String>,
    pub risks: Vec<Risk>,
    pub unresolved_questions: Vec<String>,
    pub recommended_demos: Vec<String>,
    pub competitive_advantages: Vec<String>,
    pub next_steps: Vec<String>,
    pub snippets: Vec<TranscriptSnippet>,
}

/// Validated payload of a model reply, one variant per `TaskKind`.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResult {
    Classification(CallType),
    Summary(SummaryResult),
    ActionItems(Vec<ActionItemDraft>),
    Sentiment(SentimentResult),
    EngagementAssessment(Assessment),
    TechnicalDeployment(TechnicalDeployment),
}

impl StructuredResult {
    pub fn task(&self) -> TaskKind {
        match self {
            StructuredResult::Classification(_) => TaskKind::Classification,
            StructuredResult::Summary(_) => TaskKind::Summary,
            StructuredResult::ActionItems(_) => TaskKind::ActionItems,
            StructuredResult::Sentiment(_) => TaskKind::Sentiment,
            StructuredResult::EngagementAssessment(_) => TaskKind::EngagementAssessment,
            StructuredResult::TechnicalDeployment(_) => TaskKind::TechnicalDeployment,
        }
    }

    /// Parse a model reply into the schema expected for `task`.
    ///
    /// Returns a human-readable reason on failure.
    pub fn parse(task: TaskKind, response: &str) -> Result<Self, String> {
        match task {
            TaskKind::Classification => parse_classification(response).map(Self::Classification),
            TaskKind::Summary => parse_summary(response).map(Self::Summary),
            TaskKind::ActionItems => parse_action_items(response).map(Self::ActionItems),
            TaskKind::Sentiment => parse_sentiment(response).map(Self::Sentiment),
            TaskKind::EngagementAssessment => {
                parse_assessment(response).map(Self::EngagementAssessment)
            }
            TaskKind::TechnicalDeployment => {
                parse_deployment(response).map(Self::TechnicalDeployment)
            }
        }
    }

    pub fn into_classification(self) -> Option<CallType> {
        match self {
            StructuredResult::Classification(call_type) => Some(call_type),
            _ => None,
        }
    }

    pub fn into_summary(self) -> Option<SummaryResult> {
        match self {
            StructuredResult::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn into_action_items(self) -> Option<Vec<ActionItemDraft>> {
        match self {
            StructuredResult::ActionItems(items) => Some(items),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn into_sentiment(self) -> Option<SentimentResult> {
        match self {
            StructuredResult::Sentiment(sentiment) => Some(sentiment),
            _ => None,
        }
    }

    pub fn into_assessment(self) -> Option<Assessment> {
        match self {
            StructuredResult::EngagementAssessment(assessment) => Some(assessment),
            _ => None,
        }
    }

    pub fn into_deployment(self) -> Option<TechnicalDeployment> {
        match self {
            StructuredResult::TechnicalDeployment(deployment) => Some(deployment),
            _ => None,
        }
    }
}

// ============================================
// Wire schemas
// ============================================

#[derive(Debug, Deserialize)]
struct ClassificationWire {
    #[serde(alias = "type", alias = "classification")]
    call_type: String,
}

#[derive(Debug, Deserialize)]
struct SummaryWire {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    snippets: Vec<String>,
    #[serde(default)]
    participants: Vec<String>,
    #[serde(default, alias = "date")]
    call_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionItemsWire {
    action_items: Vec<ActionItemWire>,
}

#[derive(Debug, Deserialize)]
struct ActionItemWire {
    #[serde(alias = "action", alias = "task")]
    description: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentimentWire {
    #[serde(alias = "overall_sentiment", alias = "sentiment")]
    overall: String,
    engagement_level: String,
    #[serde(default, alias = "sentiment_changes")]
    progression_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssessmentWire {
    win_probability: serde_json::Value,
    #[serde(default)]
    probability_reasoning: String,
    #[serde(default)]
    key_positive_factors: Vec<String>,
    #[serde(default)]
    key_risks: Vec<RiskWire>,
    #[serde(default)]
    technical_win_strategy: StrategyWire,
    #[serde(default)]
    next_steps: Vec<String>,
    #[serde(default)]
    key_transcript_snippets: Vec<SnippetWire>,
}

#[derive(Debug, Deserialize)]
struct RiskWire {
    #[serde(alias = "description")]
    risk: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    time_open: String,
    #[serde(default)]
    mitigation: String,
}

#[derive(Debug, Default, Deserialize)]
struct StrategyWire {
    #[serde(default)]
    unresolved_technical_questions: Vec<String>,
    #[serde(default)]
    recommended_demonstrations: Vec<String>,
    #[serde(default)]
    competitive_advantages: Vec<String>,
}

/// Every area is optional on the wire, but a reply must carry at least one.
#[derive(Debug, Deserialize)]
struct DeploymentWire {
    #[serde(default)]
    scm_platform: Option<ScmPlatform>,
    #[serde(default)]
    ci_pipelines: Option<CiPipelines>,
    #[serde(default)]
    programming_languages: Option<ProgrammingLanguages>,
    #[serde(default)]
    integrations: Option<Integrations>,
    #[serde(default)]
    supply_chain_security: Option<SupplyChainSecurity>,
    #[serde(default)]
    current_security_tools: Option<SecurityTools>,
    #[serde(default)]
    ide_environment: Option<IdeEnvironment>,
    #[serde(default)]
    additional_technical_details: Vec<String>,
    #[serde(default)]
    deployment_complexity: String,
    #[serde(default)]
    migration_considerations: Vec<String>,
    #[serde(default)]
    technical_risks: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnippetWire {
    #[serde(default)]
    call: String,
    #[serde(default)]
    context: String,
    quote: String,
    #[serde(default)]
    significance: String,
}

/// Extract a JSON object from the reply and deserialize it into `T`.
fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    let value: serde_json::Value = extract_json(response)
        .map_err(|_| "response did not contain a JSON object".to_string())?;
    serde_json::from_value(value).map_err(|e| format!("response did not match schema: {}", e))
}

fn parse_classification(response: &str) -> Result<CallType, String> {
    if let Ok(wire) = parse_json::<ClassificationWire>(response) {
        return CallType::from_label(&wire.call_type)
            .ok_or_else(|| format!("unknown call type '{}'", wire.call_type));
    }

    // Plain-text label such as "Demo Call"
    let first_line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    CallType::from_label(first_line)
        .ok_or_else(|| format!("could not read a call type from '{}'", first_line))
}

fn parse_summary(response: &str) -> Result<SummaryResult, String> {
    let wire: SummaryWire = parse_json(response)?;
    let summary = wire.summary.trim().to_string();
    if summary.is_empty() {
        return Err("summary is empty".to_string());
    }
    Ok(SummaryResult {
        summary,
        key_points: non_empty(wire.key_points),
        snippets: non_empty(wire.snippets),
        participants: non_empty(wire.participants),
        call_date: optional_text(wire.call_date),
    })
}

fn parse_action_items(response: &str) -> Result<Vec<ActionItemDraft>, String> {
    let wire: ActionItemsWire = parse_json(response)?;
    wire.action_items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let description = item.description.trim().to_string();
            if description.is_empty() {
                return Err(format!("action item {} has an empty description", i + 1));
            }
            Ok(ActionItemDraft {
                description,
                owner: optional_text(item.owner),
                due_date: optional_text(item.due_date),
                priority: Priority::parse(item.priority.as_deref()),
            })
        })
        .collect()
}

fn parse_sentiment(response: &str) -> Result<SentimentResult, String> {
    let wire: SentimentWire = parse_json(response)?;
    let overall = Sentiment::parse(&wire.overall)
        .ok_or_else(|| format!("unknown sentiment '{}'", wire.overall))?;
    let engagement_level = EngagementLevel::parse(&wire.engagement_level)
        .ok_or_else(|| format!("unknown engagement level '{}'", wire.engagement_level))?;
    Ok(SentimentResult {
        overall,
        engagement_level,
        progression_notes: wire.progression_notes.unwrap_or_default().trim().to_string(),
    })
}

fn parse_assessment(response: &str) -> Result<Assessment, String> {
    let wire: AssessmentWire = parse_json(response)?;
    let win_probability = parse_probability(&wire.win_probability)?;

    let risks = wire
        .key_risks
        .into_iter()
        .filter(|r| !r.risk.trim().is_empty())
        .map(|r| Risk {
            description: r.risk.trim().to_string(),
            severity: Severity::parse(&r.severity),
            time_open: r.time_open.trim().to_string(),
            mitigation: r.mitigation.trim().to_string(),
        })
        .collect();

    let snippets = wire
        .key_transcript_snippets
        .into_iter()
        .filter(|s| !s.quote.trim().is_empty())
        .map(|s| TranscriptSnippet {
            call: s.call.trim().to_string(),
            context: s.context.trim().to_string(),
            quote: s.quote.trim().to_string(),
            significance: s.significance.trim().to_string(),
        })
        .collect();

    Ok(Assessment {
        win_probability,
        probability_reasoning: wire.probability_reasoning.trim().to_string(),
        positive_factors: non_empty(wire.key_positive_factors),
        risks,
        unresolved_questions: non_empty(wire.technical_win_strategy.unresolved_technical_questions),
        recommended_demos: non_empty(wire.technical_win_strategy.recommended_demonstrations),
        competitive_advantages: non_empty(wire.technical_win_strategy.competitive_advantages),
        next_steps: non_empty(wire.next_steps),
        snippets,
    })
}

fn parse_deployment(response: &str) -> Result<TechnicalDeployment, String> {
    let wire: DeploymentWire = parse_json(response)?;
    let has_area = wire.scm_platform.is_some()
        || wire.ci_pipelines.is_some()
        || wire.programming_languages.is_some()
        || wire.integrations.is_some()
        || wire.supply_chain_security.is_some()
        || wire.current_security_tools.is_some()
        || wire.ide_environment.is_some();
    if !has_area {
        return Err("response has none of the deployment areas".to_string());
    }

    let scm = wire.scm_platform.unwrap_or_default();
    let ci = wire.ci_pipelines.unwrap_or_default();
    let languages = wire.programming_languages.unwrap_or_default();
    let integrations = wire.integrations.unwrap_or_default();
    let supply_chain = wire.supply_chain_security.unwrap_or_default();
    let tools = wire.current_security_tools.unwrap_or_default();
    let ide = wire.ide_environment.unwrap_or_default();

    Ok(TechnicalDeployment {
        scm_platform: ScmPlatform {
            platform: known_value(scm.platform),
            deployment_type: known_value(scm.deployment_type),
            details: scm.details.trim().to_string(),
            evidence: scm.evidence.trim().to_string(),
        },
        ci_pipelines: CiPipelines {
            primary_ci: known_value(ci.primary_ci),
            additional_ci: known_values(ci.additional_ci),
            details: ci.details.trim().to_string(),
            evidence: ci.evidence.trim().to_string(),
        },
        programming_languages: ProgrammingLanguages {
            primary_languages: known_values(languages.primary_languages),
            poc_focus_languages: known_values(languages.poc_focus_languages),
            details: languages.details.trim().to_string(),
            evidence: languages.evidence.trim().to_string(),
        },
        integrations: Integrations {
            interested_integrations: known_values(integrations.interested_integrations),
            current_integrations: known_values(integrations.current_integrations),
            details: integrations.details.trim().to_string(),
            evidence: integrations.evidence.trim().to_string(),
        },
        supply_chain_security: SupplyChainSecurity {
            languages_tested: known_values(supply_chain.languages_tested),
            package_managers: known_values(supply_chain.package_managers),
            details: supply_chain.details.trim().to_string(),
            evidence: supply_chain.evidence.trim().to_string(),
        },
        current_security_tools: SecurityTools {
            sast: known_value(tools.sast),
            dast: known_value(tools.dast),
            sca: known_value(tools.sca),
            secrets_detection: known_value(tools.secrets_detection),
            aspm: known_value(tools.aspm),
            details: tools.details.trim().to_string(),
            evidence: tools.evidence.trim().to_string(),
        },
        ide_environment: IdeEnvironment {
            primary_ide: known_value(ide.primary_ide),
            additional_tools: known_values(ide.additional_tools),
            details: ide.details.trim().to_string(),
            evidence: ide.evidence.trim().to_string(),
        },
        additional_technical_details: non_empty(wire.additional_technical_details),
        deployment_complexity: DeploymentComplexity::parse(&wire.deployment_complexity),
        migration_considerations: non_empty(wire.migration_considerations),
        technical_risks: non_empty(wire.technical_risks),
        recommendations: non_empty(wire.recommendations),
    })
}

/// Drop the placeholders models use for "not mentioned".
fn known_value(value: Option<String>) -> Option<String> {
    optional_text(value).filter(|v| {
        !v.eq_ignore_ascii_case("unknown")
            && !v.eq_ignore_ascii_case("none")
            && !v.eq_ignore_ascii_case("not mentioned")
    })
}

fn known_values(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| known_value(Some(v)))
        .collect()
}

/// Read a probability given as a number or a string like "75%".
fn parse_probability(value: &serde_json::Value) -> Result<i64, String> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v.round() as i64),
        _ => Err(format!("win_probability is not a number: {}", value)),
    }
}

fn non_empty(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null") && !v.eq_ignore_ascii_case("n/a"))
}
