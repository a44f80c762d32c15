//! Deterministic engagement assessment from structured per-call data.
//!
//! Used when the model assessment is unavailable. Scoring:
//!
//! - start at 50
//! - per call: +10 Positive / -10 Negative sentiment, +5 High / -5 Low engagement
//! - +5 once if any demo took place, +5 once if any POV check-in took place
//! - clamp to 0..=100
//!
//! The technical deployment fallback matches a fixed catalogue of tool and
//! language names against the call data.

use super::task::Assessment;
use super::types::{
    CallAnalysis, CallType, CiPipelines, EngagementLevel, IdeEnvironment, Integrations,
    MergedActionItem, ProgrammingLanguages, Risk, ScmPlatform, Sentiment, Severity,
    SupplyChainSecurity, TechnicalDeployment,
};

const BASE_SCORE: i64 = 50;
const SENTIMENT_WEIGHT: i64 = 10;
const ENGAGEMENT_WEIGHT: i64 = 5;
const MILESTONE_BONUS: i64 = 5;
const MAX_NEXT_STEPS: usize = 5;

/// Score the engagement from sentiment, engagement and call milestones.
pub fn heuristic_score(analyses: &[CallAnalysis]) -> i64 {
    let mut score = BASE_SCORE;
    for analysis in analyses {
        score += match analysis.sentiment.overall {
            Sentiment::Positive => SENTIMENT_WEIGHT,
            Sentiment::Neutral => 0,
            Sentiment::Negative => -SENTIMENT_WEIGHT,
        };
        score += match analysis.sentiment.engagement_level {
            EngagementLevel::High => ENGAGEMENT_WEIGHT,
            EngagementLevel::Medium => 0,
            EngagementLevel::Low => -ENGAGEMENT_WEIGHT,
        };
    }
    if has_call_type(analyses, CallType::DemoCall) {
        score += MILESTONE_BONUS;
    }
    if has_call_type(analyses, CallType::PovCheckIn) {
        score += MILESTONE_BONUS;
    }
    score.clamp(0, 100)
}

fn has_call_type(analyses: &[CallAnalysis], call_type: CallType) -> bool {
    analyses.iter().any(|a| a.call_type == call_type)
}

/// Build a full assessment without a model call.
pub fn heuristic_assessment(
    analyses: &[CallAnalysis],
    merged_items: &[MergedActionItem],
) -> Assessment {
    let total = analyses.len();
    let count_sentiment =
        |s: Sentiment| analyses.iter().filter(|a| a.sentiment.overall == s).count();
    let positive = count_sentiment(Sentiment::Positive);
    let negative = count_sentiment(Sentiment::Negative);
    let high_engagement = analyses
        .iter()
        .filter(|a| a.sentiment.engagement_level == EngagementLevel::High)
        .count();
    let had_demo = has_call_type(analyses, CallType::DemoCall);
    let had_pov = has_call_type(analyses, CallType::PovCheckIn);

    let mut positive_factors = Vec::new();
    if positive > 0 {
        positive_factors.push(format!(
            "{} of {} calls had positive sentiment",
            positive, total
        ));
    }
    if high_engagement > 0 {
        positive_factors.push(format!(
            "High customer engagement in {} of {} calls",
            high_engagement, total
        ));
    }
    if had_demo {
        positive_factors.push("Product demo completed".to_string());
    }
    if had_pov {
        positive_factors.push("Proof of value evaluation under way".to_string());
    }

    let mut risks = Vec::new();
    for analysis in analyses {
        if analysis.sentiment.overall == Sentiment::Negative {
            risks.push(Risk {
                description: format!("Negative sentiment in call '{}'", analysis.call_id),
                severity: Severity::High,
                time_open: String::new(),
                mitigation: "Follow up directly to address the concerns raised".to_string(),
            });
        }
        if analysis.sentiment.engagement_level == EngagementLevel::Low {
            risks.push(Risk {
                description: format!("Low engagement in call '{}'", analysis.call_id),
                severity: Severity::Medium,
                time_open: String::new(),
                mitigation: "Confirm stakeholder interest and involve a champion".to_string(),
            });
        }
        if analysis.partial {
            risks.push(Risk {
                description: format!("Analysis of call '{}' is incomplete", analysis.call_id),
                severity: Severity::Low,
                time_open: String::new(),
                mitigation: "Review the transcript manually".to_string(),
            });
        }
    }
    if !had_demo {
        risks.push(Risk {
            description: "No product demo recorded in this engagement".to_string(),
            severity: Severity::Medium,
            time_open: String::new(),
            mitigation: "Schedule a tailored product demo".to_string(),
        });
    }

    let mut next_steps: Vec<String> = merged_items
        .iter()
        .take(MAX_NEXT_STEPS)
        .map(|m| m.item.description.clone())
        .collect();
    if next_steps.is_empty() {
        next_steps.push("Schedule a follow-up call to agree on next steps".to_string());
    }

    let score = heuristic_score(analyses);
    let probability_reasoning = format!(
        "Heuristic estimate from {} call(s): {} positive and {} negative sentiment, \
         {} with high engagement{}{}.",
        total,
        positive,
        negative,
        high_engagement,
        if had_demo { ", demo completed" } else { "" },
        if had_pov { ", POV in progress" } else { "" },
    );

    Assessment {
        win_probability: score,
        probability_reasoning,
        positive_factors,
        risks,
        unresolved_questions: Vec::new(),
        recommended_demos: if had_demo {
            Vec::new()
        } else {
            vec!["Core product walkthrough".to_string()]
        },
        competitive_advantages: Vec::new(),
        next_steps,
        snippets: Vec::new(),
    }
}

// (needle, label) pairs; needles are lowercase and matched on word boundaries.
const SCM_PLATFORMS: &[(&str, &str)] = &[
    ("github", "GitHub"),
    ("gitlab", "GitLab"),
    ("azure devops", "Azure DevOps"),
    ("bitbucket", "Bitbucket"),
];
const CI_SYSTEMS: &[(&str, &str)] = &[
    ("jenkins", "Jenkins"),
    ("github actions", "GitHub Actions"),
    ("gitlab ci", "GitLab CI"),
    ("circleci", "CircleCI"),
    ("azure pipelines", "Azure Pipelines"),
    ("buildkite", "Buildkite"),
];
const LANGUAGES: &[(&str, &str)] = &[
    ("java", "Java"),
    ("python", "Python"),
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("golang", "Go"),
    ("kotlin", "Kotlin"),
    ("c#", "C#"),
    ("ruby", "Ruby"),
    ("php", "PHP"),
    ("scala", "Scala"),
];
const PACKAGE_MANAGERS: &[(&str, &str)] = &[
    ("npm", "npm"),
    ("yarn", "Yarn"),
    ("maven", "Maven"),
    ("gradle", "Gradle"),
    ("pip", "pip"),
    ("nuget", "NuGet"),
];
const INTEGRATIONS: &[(&str, &str)] = &[
    ("jira", "Jira"),
    ("slack", "Slack"),
    ("microsoft teams", "Microsoft Teams"),
    ("servicenow", "ServiceNow"),
];
const IDES: &[(&str, &str)] = &[
    ("vs code", "VS Code"),
    ("vscode", "VS Code"),
    ("intellij", "IntelliJ"),
    ("visual studio", "Visual Studio"),
    ("eclipse", "Eclipse"),
];
/// Infrastructure terms worth flagging to the model.
const INFRASTRUCTURE: &[(&str, &str)] = &[
    ("aws", "AWS"),
    ("azure", "Azure"),
    ("docker", "Docker"),
    ("kubernetes", "Kubernetes"),
    ("monorepo", "monorepo"),
    ("microservices", "microservices"),
    ("graphql", "GraphQL"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mongodb", "MongoDB"),
    ("redis", "Redis"),
];

/// Whether `needle` occurs in `haystack` with no letter or digit on either side.
fn mentions(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn detect(lower: &str, catalogue: &[(&str, &'static str)]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (needle, label) in catalogue {
        if mentions(lower, needle) && !found.iter().any(|f| f == label) {
            found.push(label.to_string());
        }
    }
    found
}

/// Every catalogued technology named in `text`, deduplicated by label.
pub fn technical_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut terms = Vec::new();
    for catalogue in [
        SCM_PLATFORMS,
        CI_SYSTEMS,
        LANGUAGES,
        PACKAGE_MANAGERS,
        INTEGRATIONS,
        IDES,
        INFRASTRUCTURE,
    ] {
        for term in detect(&lower, catalogue) {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

/// Build a deployment picture from keyword matches over `text`.
pub fn heuristic_deployment(text: &str) -> TechnicalDeployment {
    let lower = text.to_lowercase();
    let details = "Detected by keyword matching over the call data".to_string();

    let mut ci = detect(&lower, CI_SYSTEMS);
    let primary_ci = (!ci.is_empty()).then(|| ci.remove(0));
    let languages = detect(&lower, LANGUAGES);
    let mut ides = detect(&lower, IDES);
    let primary_ide = (!ides.is_empty()).then(|| ides.remove(0));

    let mut deployment = TechnicalDeployment {
        scm_platform: ScmPlatform {
            platform: detect(&lower, SCM_PLATFORMS).into_iter().next(),
            details: details.clone(),
            ..Default::default()
        },
        ci_pipelines: CiPipelines {
            primary_ci,
            additional_ci: ci,
            details: details.clone(),
            ..Default::default()
        },
        programming_languages: ProgrammingLanguages {
            primary_languages: languages.clone(),
            poc_focus_languages: languages.clone(),
            details: details.clone(),
            ..Default::default()
        },
        integrations: Integrations {
            interested_integrations: detect(&lower, INTEGRATIONS),
            details: details.clone(),
            ..Default::default()
        },
        supply_chain_security: SupplyChainSecurity {
            languages_tested: languages,
            package_managers: detect(&lower, PACKAGE_MANAGERS),
            details: details.clone(),
            ..Default::default()
        },
        ide_environment: IdeEnvironment {
            primary_ide,
            additional_tools: ides,
            details,
            ..Default::default()
        },
        ..Default::default()
    };

    if deployment.scm_platform.platform.is_none() {
        deployment
            .recommendations
            .push("Confirm the source control platform and hosting model".to_string());
    }
    if deployment.programming_languages.primary_languages.is_empty() {
        deployment
            .recommendations
            .push("Confirm the languages in scope for the evaluation".to_string());
    }
    deployment
}
