//! services/api/src/web/rest.rs
//!
//! Contains the Axum handler for the study-assistant endpoint and the
//! master definition for the OpenAPI specification. The endpoint mirrors
//! the single function the web client invokes: one POST route, two
//! actions selected by the `action` field of the JSON body.

use crate::study::{analysis, questions, StudyError};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_assistant_core::domain::{Caller, Difficulty, InputType, Question, Topic, TopicOutline};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        study_assistant_handler,
        crate::web::webhook::paystack_webhook_handler,
    ),
    components(
        schemas(
            StudyRequest,
            AnalysisData,
            TopicPayload,
            QuestionPayload,
            AnalyzeResponse,
            QuestionsResponse,
            TrialLimitResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "Study Assistant API", description = "Topic analysis, question generation, and payment webhooks.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request Structs
//=========================================================================================

/// The request body for both study actions.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyRequest {
    /// `"analyze"` or `"generate-questions"`.
    action: Option<String>,
    /// Study material or topic name; used by `analyze`.
    #[serde(default)]
    input: Option<String>,
    /// `"text"` (default) or `"topic"`; used by `analyze`.
    #[serde(default)]
    input_type: Option<String>,
    /// The outline to generate from; used by `generate-questions`.
    #[serde(default)]
    analysis_data: Option<AnalysisData>,
}

#[derive(Deserialize, ToSchema)]
pub struct AnalysisData {
    #[serde(default)]
    topics: Option<Vec<TopicPayload>>,
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One outline topic as it travels over the wire.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TopicPayload {
    title: String,
    #[serde(default)]
    subtopics: Vec<String>,
}

impl TopicPayload {
    fn from_domain(topic: &Topic) -> Self {
        Self {
            title: topic.title.clone(),
            subtopics: topic.subtopics.clone(),
        }
    }

    fn into_domain(self) -> Topic {
        Topic {
            title: self.title,
            subtopics: self.subtopics,
        }
    }
}

/// One generated question as it travels over the wire.
#[derive(Serialize, ToSchema)]
pub struct QuestionPayload {
    id: u32,
    question: String,
    answer: String,
    difficulty: String,
    topic: String,
}

impl QuestionPayload {
    fn from_domain(question: &Question) -> Self {
        Self {
            id: question.id,
            question: question.question.clone(),
            answer: question.answer.clone(),
            difficulty: match question.difficulty {
                Difficulty::Easy => "Easy",
                Difficulty::Medium => "Medium",
                Difficulty::Hard => "Hard",
            }
            .to_string(),
            topic: question.topic.clone(),
        }
    }
}

/// The response payload for a successful topic analysis.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    topics: Vec<TopicPayload>,
    total_topics: usize,
    total_subtopics: usize,
}

/// The response payload for a successful question generation.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsResponse {
    questions: Vec<QuestionPayload>,
    /// Null when the caller is anonymous or the session snapshot could not
    /// be persisted.
    session_id: Option<Uuid>,
    total_questions: usize,
    limit: u32,
    free_trial: bool,
    questions_allowed: u32,
    questions_used: u32,
}

/// The 403 payload when the daily free-trial allowance is exhausted.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrialLimitResponse {
    error: String,
    limit_reached: bool,
    questions_allowed: u32,
    questions_used: u32,
}

/// The generic failure payload.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
}

//=========================================================================================
// REST API Handler
//=========================================================================================

/// Analyze study material or generate practice questions.
///
/// The `action` field of the JSON body selects the behavior. A signed-in
/// caller is identified by the `x-user-id` header the authenticating
/// gateway sets; without it the request runs anonymously.
#[utoipa::path(
    post,
    path = "/ai-study-assistant",
    request_body = StudyRequest,
    responses(
        (status = 200, description = "The topic outline (action `analyze`) or the generated question batch (action `generate-questions`)"),
        (status = 403, description = "Daily free-trial limit reached", body = TrialLimitResponse),
        (status = 500, description = "Upstream, validation, or storage failure", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the signed-in user, if any.")
    )
)]
pub async fn study_assistant_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match handle_study_request(app_state, &headers, &body).await {
        Ok(response) => response,
        Err(e) => study_error_response(e),
    }
}

async fn handle_study_request(
    app_state: Arc<AppState>,
    headers: &HeaderMap,
    body: &str,
) -> Result<Response, StudyError> {
    // 1. Resolve the caller before touching the body.
    let caller = caller_from_headers(headers)?;

    // 2. Parse the body ourselves so every malformed request surfaces as
    //    the same {error} shape instead of a framework rejection.
    let request: StudyRequest = serde_json::from_str(body)
        .map_err(|e| StudyError::Validation(format!("Invalid request body: {}", e)))?;

    let action = request.action.as_deref().unwrap_or_default().to_string();
    info!(
        "Processing request: action={}, has_input={}",
        action,
        request.input.is_some()
    );

    // 3. Dispatch on the action.
    match action.as_str() {
        "analyze" => {
            let input = request.input.unwrap_or_default();
            let input_type = match request.input_type.as_deref() {
                Some("topic") => InputType::Topic,
                _ => InputType::Text,
            };

            let outline =
                analysis::analyze_content(app_state.llm.as_ref(), &input, input_type).await?;

            let topics: Vec<TopicPayload> =
                outline.topics.iter().map(TopicPayload::from_domain).collect();
            let response = AnalyzeResponse {
                total_topics: topics.len(),
                total_subtopics: outline.total_subtopics(),
                topics,
            };
            Ok(Json(response).into_response())
        }
        "generate-questions" => {
            let outline = outline_from_request(request.analysis_data)?;
            let today = Utc::now().date_naive();

            let outcome = questions::generate_questions(
                app_state.db.as_ref(),
                app_state.llm.as_ref(),
                caller,
                &outline,
                today,
            )
            .await?;

            let response = QuestionsResponse {
                total_questions: outcome.questions.len(),
                questions: outcome
                    .questions
                    .iter()
                    .map(QuestionPayload::from_domain)
                    .collect(),
                session_id: outcome.session_id,
                limit: outcome.limit,
                free_trial: outcome.free_trial,
                questions_allowed: outcome.limit,
                questions_used: outcome.questions_used,
            };
            Ok(Json(response).into_response())
        }
        _ => Err(StudyError::Validation("Invalid action".to_string())),
    }
}

/// Resolves the caller from the `x-user-id` header. No header means an
/// anonymous caller; a header that is not a UUID is a validation failure.
fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, StudyError> {
    let Some(value) = headers.get("x-user-id") else {
        return Ok(Caller::Anonymous);
    };

    let raw = value
        .to_str()
        .map_err(|_| StudyError::Validation("Invalid x-user-id header".to_string()))?;
    let user_id = Uuid::parse_str(raw)
        .map_err(|_| StudyError::Validation(format!("Invalid x-user-id format: {}", raw)))?;
    Ok(Caller::User(user_id))
}

/// Validates and converts the submitted outline. Generation needs at least
/// one topic and one subtopic overall; the fallback questions are derived
/// from subtopics, so an outline without any could produce an empty batch.
fn outline_from_request(analysis_data: Option<AnalysisData>) -> Result<TopicOutline, StudyError> {
    let topics = analysis_data
        .and_then(|d| d.topics)
        .ok_or_else(|| StudyError::Validation("analysisData.topics is required".to_string()))?;

    if topics.is_empty() {
        return Err(StudyError::Validation(
            "analysisData.topics must not be empty".to_string(),
        ));
    }

    let outline = TopicOutline::new(topics.into_iter().map(TopicPayload::into_domain).collect());
    if outline.total_subtopics() == 0 {
        return Err(StudyError::Validation(
            "analysisData.topics must carry at least one subtopic".to_string(),
        ));
    }
    Ok(outline)
}

fn study_error_response(error: StudyError) -> Response {
    match &error {
        StudyError::TrialLimitReached { allowed, used } => {
            let body = TrialLimitResponse {
                error: error.to_string(),
                limit_reached: true,
                questions_allowed: *allowed,
                questions_used: *used,
            };
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
        _ => {
            error!("Study request failed: {}", error);
            let body = ErrorResponse {
                error: error.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeDb, FakeTextGen};
    use axum::http::HeaderValue;
    use serde_json::{json, Value};

    fn state(db: Arc<FakeDb>, llm: Arc<FakeTextGen>) -> Arc<AppState> {
        Arc::new(AppState { db, llm })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn user_headers(user_id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-user-id",
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        );
        headers
    }

    fn outline_body() -> String {
        json!({
            "action": "generate-questions",
            "analysisData": {
                "topics": [
                    { "title": "Biology", "subtopics": ["Cells", "Genetics"] }
                ]
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn analyze_returns_the_outline_with_totals() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply(
            "1. **Photosynthesis**\n- Light reactions\n- Calvin cycle",
        ));
        let body = json!({ "action": "analyze", "input": "plant biology notes", "inputType": "text" })
            .to_string();

        let response =
            study_assistant_handler(State(state(db, llm)), HeaderMap::new(), body).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["totalTopics"], 1);
        assert_eq!(json["totalSubtopics"], 2);
        assert_eq!(json["topics"][0]["title"], "Photosynthesis");
    }

    #[tokio::test]
    async fn malformed_body_is_a_500_with_an_error_message() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));

        let response = study_assistant_handler(
            State(state(db, llm)),
            HeaderMap::new(),
            "{not json".to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));
        let body = json!({ "action": "summarize" }).to_string();

        let response =
            study_assistant_handler(State(state(db, llm)), HeaderMap::new(), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Invalid action");
    }

    #[tokio::test]
    async fn malformed_user_header_is_rejected() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("not-a-uuid"));

        let response = study_assistant_handler(
            State(state(db, llm)),
            headers,
            json!({ "action": "analyze", "input": "x" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("x-user-id"));
    }

    #[tokio::test]
    async fn anonymous_generation_reports_a_null_session_id() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply(
            "**Question 1:** Q?\n**Answer:** A.",
        ));

        let response =
            study_assistant_handler(State(state(db, llm)), HeaderMap::new(), outline_body())
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["sessionId"], Value::Null);
        assert_eq!(json["totalQuestions"], 1);
        assert_eq!(json["freeTrial"], true);
        assert_eq!(json["limit"], 5);
        assert_eq!(json["questionsAllowed"], 5);
        assert_eq!(json["questionsUsed"], 1);
    }

    #[tokio::test]
    async fn signed_in_generation_returns_the_session_id() {
        let user = Uuid::new_v4();
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply(
            "**Question 1:** Q?\n**Answer:** A.",
        ));

        let response = study_assistant_handler(
            State(state(db.clone(), llm)),
            user_headers(user),
            outline_body(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["sessionId"].is_string());
        assert_eq!(db.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_outline_is_rejected() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));
        let body = json!({ "action": "generate-questions" }).to_string();

        let response =
            study_assistant_handler(State(state(db, llm)), HeaderMap::new(), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "analysisData.topics is required"
        );
    }

    #[tokio::test]
    async fn outline_without_subtopics_is_rejected() {
        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));
        let body = json!({
            "action": "generate-questions",
            "analysisData": { "topics": [{ "title": "Bare", "subtopics": [] }] }
        })
        .to_string();

        let response =
            study_assistant_handler(State(state(db, llm)), HeaderMap::new(), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn exhausted_trial_is_a_403_with_the_usage_figures() {
        let user = Uuid::new_v4();
        let db = Arc::new(FakeDb::new());
        db.seed_usage(user, 6, Utc::now().date_naive());
        let llm = Arc::new(FakeTextGen::with_reply("unused"));

        let response = study_assistant_handler(
            State(state(db, llm)),
            user_headers(user),
            outline_body(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["limitReached"], true);
        assert_eq!(json["questionsAllowed"], 5);
        assert_eq!(json["questionsUsed"], 6);
        assert!(json["error"].as_str().unwrap().contains("daily free trial limit"));
    }

    #[tokio::test]
    async fn upstream_failures_collapse_to_a_500_message() {
        use study_assistant_core::ports::PortError;

        let db = Arc::new(FakeDb::new());
        let llm = Arc::new(FakeTextGen::with_replies(vec![Err(
            PortError::UpstreamUnavailable("Gemini API error: 503".to_string()),
        )]));

        let response = study_assistant_handler(
            State(state(db, llm)),
            HeaderMap::new(),
            json!({ "action": "analyze", "input": "x" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Gemini API error: 503");
    }
}
