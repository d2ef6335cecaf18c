//! services/api/src/study/analysis.rs
//!
//! The Topic Analyzer: prompts the text-generation provider with the study
//! material and scrapes its free-text reply into a structured outline. The
//! parsing is a deliberate best-effort heuristic, not a grammar; its exact
//! fallback behavior is part of the contract with the client.

const TOPIC_PROMPT_TEMPLATE: &str = r#"Analyze the following topic for study purposes: "{input}". Extract 4-6 key concepts and subtopics that students should focus on. Format as a study outline."#;

const TEXT_PROMPT_TEMPLATE: &str = r#"Analyze the following study material: "{input}". Extract the main topics and key concepts that students should focus on. Organize into 4-6 major topics with 3-5 subtopics each."#;

use regex::Regex;
use std::time::Duration;
use study_assistant_core::domain::{InputType, Topic, TopicOutline};
use study_assistant_core::ports::{GenerationParams, TextGenerationService};
use tracing::info;

use super::StudyError;

/// Upper bound on the number of topics in an outline.
pub const MAX_TOPICS: usize = 6;
/// Upper bound on the subtopics kept per topic.
pub const MAX_SUBTOPICS: usize = 6;

/// Wall-clock cap on one analysis round trip.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);

const ANALYSIS_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    top_k: 40,
    top_p: 0.8,
    max_output_tokens: 2048,
};

//=========================================================================================
// Orchestration
//=========================================================================================

/// Analyzes study material (or a bare topic name) into a `TopicOutline`.
///
/// The upstream call is raced against a 60-second timeout; an elapsed
/// timeout surfaces as `StudyError::Timeout` rather than an upstream error.
pub async fn analyze_content(
    llm: &dyn TextGenerationService,
    input: &str,
    input_type: InputType,
) -> Result<TopicOutline, StudyError> {
    let template = match input_type {
        InputType::Topic => TOPIC_PROMPT_TEMPLATE,
        InputType::Text => TEXT_PROMPT_TEMPLATE,
    };
    let prompt = template.replace("{input}", input);

    info!("Analyzing content with the text-generation provider...");
    let reply = tokio::time::timeout(ANALYSIS_TIMEOUT, llm.generate_text(&prompt, ANALYSIS_PARAMS))
        .await
        .map_err(|_| StudyError::Timeout)??;

    Ok(parse_analysis_into_topics(&reply))
}

//=========================================================================================
// Reply Parsing
//=========================================================================================

/// Scrapes the provider's free-text reply into topics and subtopics.
///
/// Header lines open a new topic: a numbered item with bold markup
/// (`1. **Title**`), a Markdown heading (`# Title`), or a line that is
/// entirely bold (`**Title**`). Bullet lines (`-`, `*`, `•`) become
/// subtopics of the open topic, capped at 6; any other non-blank line that
/// is not itself a numbered item also counts as a subtopic under the same
/// cap, because the provider frequently answers in loose prose. A topic is
/// kept only once it has at least one subtopic. An empty result falls back
/// to a fixed two-topic outline, and the final list is cut to 6 topics.
pub fn parse_analysis_into_topics(analysis_text: &str) -> TopicOutline {
    let numbered_bold_re = Regex::new(r"^\d+\.\s*\*\*").unwrap();
    let numbered_re = Regex::new(r"^\d+\.").unwrap();
    let bold_only_re = Regex::new(r"^\*\*.+\*\*$").unwrap();
    let bullet_re = Regex::new(r"^[-*•]\s+").unwrap();

    let mut topics: Vec<Topic> = Vec::new();
    let mut current: Option<Topic> = None;

    for line in analysis_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let is_header = numbered_bold_re.is_match(trimmed)
            || trimmed.starts_with('#')
            || bold_only_re.is_match(trimmed);

        if is_header {
            flush_topic(&mut topics, current.take());
            current = Some(Topic {
                title: strip_topic_markup(trimmed),
                subtopics: Vec::new(),
            });
        } else if bullet_re.is_match(trimmed) {
            if let Some(topic) = current.as_mut() {
                if topic.subtopics.len() < MAX_SUBTOPICS {
                    topic
                        .subtopics
                        .push(bullet_re.replace(trimmed, "").to_string());
                }
            }
        } else if let Some(topic) = current.as_mut() {
            // Unformatted reply text: treat it as a subtopic unless it looks
            // like a numbered item that simply lacks the bold markup.
            if !numbered_re.is_match(trimmed) && topic.subtopics.len() < MAX_SUBTOPICS {
                topic.subtopics.push(trimmed.to_string());
            }
        }
    }
    flush_topic(&mut topics, current.take());

    if topics.is_empty() {
        return default_outline();
    }

    topics.truncate(MAX_TOPICS);
    TopicOutline::new(topics)
}

fn flush_topic(topics: &mut Vec<Topic>, topic: Option<Topic>) {
    if let Some(topic) = topic {
        if !topic.subtopics.is_empty() {
            topics.push(topic);
        }
    }
}

fn strip_topic_markup(line: &str) -> String {
    let number_prefix_re = Regex::new(r"^\d+\.\s*").unwrap();
    let without_number = number_prefix_re.replace(line, "");
    without_number
        .trim_start_matches('#')
        .replace("**", "")
        .trim()
        .to_string()
}

/// The outline handed back when the reply yields no recognizable topics.
fn default_outline() -> TopicOutline {
    TopicOutline::new(vec![
        Topic {
            title: "Key Concepts".to_string(),
            subtopics: vec![
                "Main principles".to_string(),
                "Core definitions".to_string(),
                "Important theories".to_string(),
                "Practical applications".to_string(),
            ],
        },
        Topic {
            title: "Study Focus Areas".to_string(),
            subtopics: vec![
                "Primary topics".to_string(),
                "Secondary concepts".to_string(),
                "Review materials".to_string(),
                "Practice areas".to_string(),
            ],
        },
    ])
}

//=========================================================================================
// Tests
//=========================================================================================
