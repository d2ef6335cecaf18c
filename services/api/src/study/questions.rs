//! services/api/src/study/questions.rs
//!
//! The Question Generator: renders a topic outline into a prompt, parses
//! the provider's reply into question records, and orchestrates the trial
//! gate and the session snapshot around the call.

const QUESTIONS_PROMPT_TEMPLATE: &str = r#"Based on these study topics, generate exactly {count} exam-style questions with detailed answers:

{topics}

Format every question exactly like this, separated by a line containing only ---:

**Question N:** the question text (varied types: multiple choice, short answer, essay)
**Answer:** a comprehensive answer/explanation
**Difficulty:** Easy, Medium, or Hard
**Topic:** the main topic it covers"#;

use chrono::NaiveDate;
use regex::Regex;
use study_assistant_core::domain::{
    Caller, Difficulty, NewStudySession, Question, Topic, TopicOutline,
};
use study_assistant_core::ports::{DatabaseService, GenerationParams, TextGenerationService};
use tracing::{info, warn};
use uuid::Uuid;

use super::trial::{self, FREE_DAILY_QUESTION_LIMIT, PREMIUM_QUESTION_LIMIT};
use super::StudyError;

/// Hard cap on one generated batch, whatever the caller's tier asked for.
pub const MAX_QUESTIONS_PER_BATCH: usize = 20;

const QUESTION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.4,
    top_k: 40,
    top_p: 0.8,
    max_output_tokens: 4096,
};

/// What one successful generation run produced, plus the trial bookkeeping
/// the response reports back to the client.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub questions: Vec<Question>,
    pub session_id: Option<Uuid>,
    /// Batch cap for this caller's tier, which is also the daily allowance.
    pub limit: u32,
    pub free_trial: bool,
    /// Counter value after this run: what the stored row now holds for a
    /// signed-in free user, the batch size for an anonymous caller, and 0
    /// for premium users, whose counter is never touched.
    pub questions_used: u32,
}

//=========================================================================================
// Orchestration
//=========================================================================================

/// Generates a question batch from an outline for the given caller.
///
/// Free signed-in callers pass through the trial gate before the upstream
/// call and are charged for the questions actually produced afterwards.
/// The session snapshot and the usage increment are best-effort: either
/// failing is logged and degrades the response, never fails it.
pub async fn generate_questions(
    db: &dyn DatabaseService,
    llm: &dyn TextGenerationService,
    caller: Caller,
    outline: &TopicOutline,
    today: NaiveDate,
) -> Result<GenerationOutcome, StudyError> {
    // 1. Resolve the caller's tier. A missing profile row reads as free.
    let is_premium = match caller.user_id() {
        Some(user_id) => db
            .get_profile(user_id)
            .await?
            .map(|p| p.is_premium)
            .unwrap_or(false),
        None => false,
    };
    let limit = if is_premium {
        PREMIUM_QUESTION_LIMIT
    } else {
        FREE_DAILY_QUESTION_LIMIT
    };

    // 2. Gate free signed-in callers on today's counter. Anonymous callers
    //    get the free allowance with no persisted tracking.
    let mut used_before = 0;
    if !is_premium {
        if let Some(user_id) = caller.user_id() {
            used_before = trial::check_trial(db, user_id, today).await?;
        }
    }

    // 3. Ask the provider for the batch.
    let prompt = QUESTIONS_PROMPT_TEMPLATE
        .replace("{count}", &limit.to_string())
        .replace("{topics}", &render_outline(&outline.topics));

    info!("Generating questions with the text-generation provider...");
    let reply = llm.generate_text(&prompt, QUESTION_PARAMS).await?;

    // 4. Parse the reply, fall back to template questions if nothing usable
    //    came back, and cap the batch.
    let mut questions = parse_questions_from_text(&reply, &outline.topics);
    if questions.is_empty() {
        questions = fallback_questions(&outline.topics);
    }
    questions.truncate((limit as usize).min(MAX_QUESTIONS_PER_BATCH));
    let produced = questions.len() as u32;

    // 5. Persist the session snapshot for signed-in callers.
    let session_id = match caller.user_id() {
        Some(user_id) => {
            let session = NewStudySession {
                user_id,
                title: format!("Study Session - {}", today.format("%-m/%-d/%Y")),
                topics: outline.topics.clone(),
                questions: questions.clone(),
                input_type: "text".to_string(),
                source: "gemini-ai".to_string(),
            };
            match db.create_study_session(session).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Failed to save study session for user {}: {}", user_id, e);
                    None
                }
            }
        }
        None => None,
    };

    // 6. Charge the trial counter with what was actually produced.
    let questions_used = if is_premium {
        0
    } else {
        match caller.user_id() {
            Some(user_id) => trial::record_usage(db, user_id, used_before, produced, today).await,
            None => produced,
        }
    };

    Ok(GenerationOutcome {
        questions,
        session_id,
        limit,
        free_trial: !is_premium,
        questions_used,
    })
}

fn render_outline(topics: &[Topic]) -> String {
    topics
        .iter()
        .map(|t| format!("{}: {}", t.title, t.subtopics.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

//=========================================================================================
// Reply Parsing
//=========================================================================================

/// Scrapes the provider's reply into question records.
///
/// The reply is split into blocks on `---` delimiter lines. Within a block
/// the four field markers may appear in any order; unmarked lines are
/// joined onto the question text until an answer line has been seen, and
/// onto the answer text from then on. A block contributes a question only
/// if both the question and the answer text ended up non-empty. Topic
/// defaults to the outline topic at the block's index (mod outline length)
/// and difficulty defaults to Medium; explicit fields override both.
pub fn parse_questions_from_text(questions_text: &str, topics: &[Topic]) -> Vec<Question> {
    let question_re = Regex::new(r"(?i)^\*\*question\s*\d*\s*:\*\*\s*(.*)$").unwrap();
    let answer_re = Regex::new(r"(?i)^\*\*answer:\*\*\s*(.*)$").unwrap();
    let difficulty_re = Regex::new(r"(?i)^\*\*difficulty:\*\*\s*(.*)$").unwrap();
    let topic_re = Regex::new(r"(?i)^\*\*topic:\*\*\s*(.*)$").unwrap();

    let mut questions = Vec::new();

    for (block_index, block) in split_blocks(questions_text).iter().enumerate() {
        let mut question_text = String::new();
        let mut answer_text = String::new();
        let mut difficulty: Option<Difficulty> = None;
        let mut topic: Option<String> = None;
        let mut answer_seen = false;
        let mut question_seen = false;

        for line in block.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(caps) = question_re.captures(trimmed) {
                question_text = caps[1].trim().to_string();
                question_seen = true;
            } else if let Some(caps) = answer_re.captures(trimmed) {
                answer_text = caps[1].trim().to_string();
                answer_seen = true;
            } else if let Some(caps) = difficulty_re.captures(trimmed) {
                if let Some(parsed) = parse_difficulty(&caps[1]) {
                    difficulty = Some(parsed);
                }
            } else if let Some(caps) = topic_re.captures(trimmed) {
                let value = caps[1].trim();
                if !value.is_empty() {
                    topic = Some(value.to_string());
                }
            } else if answer_seen {
                if !answer_text.is_empty() {
                    answer_text.push(' ');
                }
                answer_text.push_str(trimmed);
            } else if question_seen {
                if !question_text.is_empty() {
                    question_text.push(' ');
                }
                question_text.push_str(trimmed);
            }
        }

        if question_text.is_empty() || answer_text.is_empty() {
            continue;
        }

        let topic = topic.unwrap_or_else(|| {
            topics
                .get(block_index % topics.len().max(1))
                .map(|t| t.title.clone())
                .unwrap_or_else(|| "General".to_string())
        });

        questions.push(Question {
            id: questions.len() as u32 + 1,
            question: question_text,
            answer: answer_text,
            difficulty: difficulty.unwrap_or(Difficulty::Medium),
            topic,
        });
    }

    questions
}

fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == "---" {
            blocks.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    blocks.push(current);
    blocks
}

/// Case-insensitive easy/medium/hard substring match; the earliest
/// occurrence in the value wins.
fn parse_difficulty(value: &str) -> Option<Difficulty> {
    let lowered = value.to_lowercase();
    [
        (lowered.find("easy"), Difficulty::Easy),
        (lowered.find("medium"), Difficulty::Medium),
        (lowered.find("hard"), Difficulty::Hard),
    ]
    .into_iter()
    .filter_map(|(position, difficulty)| position.map(|p| (p, difficulty)))
    .min_by_key(|(position, _)| *position)
    .map(|(_, difficulty)| difficulty)
}

/// Mechanically derived questions for when parsing found nothing: one per
/// subtopic, first three subtopics per topic, difficulty by position.
fn fallback_questions(topics: &[Topic]) -> Vec<Question> {
    let mut questions = Vec::new();
    for topic in topics {
        for (index, subtopic) in topic.subtopics.iter().take(3).enumerate() {
            questions.push(Question {
                id: questions.len() as u32 + 1,
                question: format!(
                    "Explain the concept of \"{}\" in relation to {}.",
                    subtopic, topic.title
                ),
                answer: format!(
                    "This question focuses on understanding {} within the context of {}. \
                     Consider the key principles, definitions, and practical applications.",
                    subtopic, topic.title
                ),
                difficulty: match index {
                    0 => Difficulty::Easy,
                    1 => Difficulty::Medium,
                    _ => Difficulty::Hard,
                },
                topic: topic.title.clone(),
            });
        }
    }
    questions
}

//=========================================================================================
// Tests
//=========================================================================================
