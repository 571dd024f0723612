//! Boundary to the external text-generation provider.
//!
//! The gateway owns the prompts, the single request/response exchange and the
//! best-effort extraction of structured content from free-form replies.
//! Summaries are routed by exact header lines and fall back to an
//! equal-thirds split of the raw reply; quizzes take the text between the
//! first `[` and the last `]` and fall back to one canned question when that
//! is not a usable JSON array. Assistant replies are passed through as text.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::metrics::{record_gateway_call, GATEWAY_CALL_DURATION_SECONDS};
use crate::models::{Question, QuestionType, SummaryContent};
use crate::services::fallback_content;

const BULLET_POINTS_HEADER: &str = "BULLET_POINTS:";
const PARAGRAPHS_HEADER: &str = "PARAGRAPHS:";
const CONCEPTS_HEADER: &str = "CONCEPTS:";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Generation provider credential not configured")]
    Unconfigured,

    #[error("Generation provider unreachable: {0}")]
    Unreachable(String),

    #[error("Generation provider returned status {status}: {body}")]
    ProviderError { status: u16, body: String },

    #[error("Generation provider returned no choices")]
    EmptyResponse,
}

impl GatewayError {
    pub fn outcome(&self) -> &'static str {
        match self {
            GatewayError::Unconfigured => "unconfigured",
            GatewayError::Unreachable(_) => "unreachable",
            GatewayError::ProviderError { .. } => "provider_error",
            GatewayError::EmptyResponse => "empty_response",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One request/response exchange with a chat-completion provider.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the candidate replies in provider order.
    async fn complete(&self, model: &str, messages: &[ChatMessage])
        -> Result<Vec<String>, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter-compatible HTTP client.
pub struct OpenRouterClient {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
    referer: String,
}

impl OpenRouterClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            referer: config.referer.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<String>, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::Unconfigured)?;

        let response = self
            .http_client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("HTTP-Referer", &self.referer)
            .json(&ChatCompletionRequest { model, messages })
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::ProviderError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|_| GatewayError::ProviderError {
                status: status.as_u16(),
                body: body.clone(),
            })?;

        if parsed.choices.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(parsed
            .choices
            .into_iter()
            .map(|choice| choice.message.content.unwrap_or_default())
            .collect())
    }
}

pub struct GenerationGateway {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl GenerationGateway {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub async fn generate_summary(&self, material_text: &str) -> Result<SummaryContent, GatewayError> {
        let reply = self.call("summary", summary_prompt(material_text)).await?;
        record_gateway_call("summary", "success");
        Ok(parse_summary_reply(&reply))
    }

    /// Unusable replies resolve to the canned single-question quiz rather than
    /// an error; only transport and provider failures are errors.
    pub async fn generate_quiz(
        &self,
        material_text: &str,
        subject: &str,
    ) -> Result<Vec<Question>, GatewayError> {
        let reply = self.call("quiz", quiz_prompt(material_text, subject)).await?;

        match parse_quiz_reply(&reply) {
            Some(questions) => {
                record_gateway_call("quiz", "success");
                Ok(questions)
            }
            None => {
                tracing::warn!("Quiz reply held no usable question array, using canned question");
                record_gateway_call("quiz", "unparsed");
                Ok(vec![fallback_content::unparsed_reply_question()])
            }
        }
    }

    /// Answers a free-form study question, optionally grounded in material text.
    pub async fn chat(&self, message: &str, context: &str) -> Result<String, GatewayError> {
        let reply = self.call("assistant", assistant_prompt(message, context)).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            record_gateway_call("assistant", GatewayError::EmptyResponse.outcome());
            return Err(GatewayError::EmptyResponse);
        }
        record_gateway_call("assistant", "success");
        Ok(reply.to_string())
    }

    async fn call(&self, kind: &str, prompt: String) -> Result<String, GatewayError> {
        let messages = [ChatMessage::user(prompt)];
        let start = Instant::now();
        let result = self.client.complete(&self.model, &messages).await;
        GATEWAY_CALL_DURATION_SECONDS
            .with_label_values(&[kind])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(reply) => Ok(reply),
                None => {
                    record_gateway_call(kind, GatewayError::EmptyResponse.outcome());
                    Err(GatewayError::EmptyResponse)
                }
            },
            Err(err) => {
                record_gateway_call(kind, err.outcome());
                Err(err)
            }
        }
    }
}

fn summary_prompt(material_text: &str) -> String {
    format!(
        r#"Summarize the following learning material in three formats:

1. BULLET_POINTS: 6-8 key points as bullet points
2. PARAGRAPHS: a 2-3 paragraph summary that is easy to understand
3. CONCEPTS: 4-5 key concepts, each with a short explanation

Material:
{}

Answer format:
BULLET_POINTS:
• [point 1]
• [point 2]
...

PARAGRAPHS:
[paragraph 1]

[paragraph 2]

CONCEPTS:
[concept 1]: [explanation]
[concept 2]: [explanation]
..."#,
        material_text
    )
}

fn quiz_prompt(material_text: &str, subject: &str) -> String {
    format!(
        r#"Write 10 quiz questions about the following {} material:

{}

Answer with a JSON array in exactly this shape:
[
  {{
    "id": 1,
    "type": "multiple_choice",
    "question": "Question text",
    "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
    "correct_answer": "Option 1",
    "explanation": "Why Option 1 is correct",
    "difficulty": "medium"
  }}
]

Rules:
- "type" is "multiple_choice" or "true_false"; true_false questions omit "options" and answer "true" or "false"
- "correct_answer" repeats the exact text of the correct option
- mix difficulties (easy, medium, hard)
- cover the main concepts of the material
- give a clear explanation for every answer
- make every option plausible"#,
        subject, material_text
    )
}

fn assistant_prompt(message: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no material selected)"
    } else {
        context
    };

    format!(
        r#"You are the AI study assistant of StudyForge, a learning platform.
Give a helpful, informative answer to the question below that is easy to understand.

Material context: {}

Question: {}

Your answer should:
- be clear and easy to follow
- use examples where they help
- relate to the material context when it is relevant
- encourage further learning"#,
        context, message
    )
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Bullets,
    Paragraphs,
    Concepts,
}

/// Routes reply lines into the three summary sections by exact header match.
/// Falls back to an equal-thirds character split when no header is present.
pub fn parse_summary_reply(reply: &str) -> SummaryContent {
    let mut content = SummaryContent::default();
    let mut current: Option<Section> = None;
    let mut saw_header = false;

    for raw_line in reply.lines() {
        let line = raw_line.trim();

        let header = match line {
            BULLET_POINTS_HEADER => Some(Section::Bullets),
            PARAGRAPHS_HEADER => Some(Section::Paragraphs),
            CONCEPTS_HEADER => Some(Section::Concepts),
            _ => None,
        };
        if header.is_some() {
            current = header;
            saw_header = true;
            continue;
        }

        if line.is_empty() {
            continue;
        }

        let buffer = match current {
            Some(Section::Bullets) => &mut content.bullet_points,
            Some(Section::Paragraphs) => &mut content.paragraphs,
            Some(Section::Concepts) => &mut content.concepts,
            None => continue,
        };
        buffer.push_str(line);
        buffer.push('\n');
    }

    if !saw_header
        && content.bullet_points.is_empty()
        && content.paragraphs.is_empty()
        && content.concepts.is_empty()
    {
        return split_into_thirds(reply);
    }

    content
}

fn split_into_thirds(reply: &str) -> SummaryContent {
    let chars: Vec<char> = reply.chars().collect();
    let len = chars.len();
    let first = len / 3;
    let second = 2 * len / 3;

    SummaryContent {
        bullet_points: chars[..first].iter().collect(),
        paragraphs: chars[first..second].iter().collect(),
        concepts: chars[second..].iter().collect(),
    }
}

/// Text between the first `[` and the last `]`, inclusive.
pub fn extract_json_array(reply: &str) -> Option<&str> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

/// Extracts the question array from a quiz reply. `None` means the reply is
/// unusable: no bracketed region, invalid JSON, or no consistent question.
pub fn parse_quiz_reply(reply: &str) -> Option<Vec<Question>> {
    let raw = extract_json_array(reply)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;

    let mut questions: Vec<Question> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Question>(value) {
            Ok(question) => Some(question),
            Err(e) => {
                tracing::warn!("Dropping malformed quiz question: {}", e);
                None
            }
        })
        .map(normalize_answer)
        .filter(|question| {
            let consistent = question.is_consistent();
            if !consistent {
                tracing::warn!(
                    "Dropping question {}: correct answer is not among its options",
                    question.id
                );
            }
            consistent
        })
        .collect();

    if questions.is_empty() {
        return None;
    }
    ensure_unique_ids(&mut questions);
    Some(questions)
}

/// Answers are keyed by question id, so a quiz with a repeated id is
/// renumbered 1..n in reply order.
fn ensure_unique_ids(questions: &mut [Question]) {
    let mut seen = HashSet::new();
    if questions.iter().all(|question| seen.insert(question.id)) {
        return;
    }

    tracing::warn!("Quiz reply repeated question ids, renumbering {} questions", questions.len());
    for (index, question) in questions.iter_mut().enumerate() {
        question.id = index as u32 + 1;
    }
}

/// Rewrites a bare option letter ("B") into the text of the matching option.
fn normalize_answer(mut question: Question) -> Question {
    if question.question_type != QuestionType::MultipleChoice || question.is_consistent() {
        return question;
    }

    let letter = question
        .correct_answer
        .trim()
        .trim_end_matches(['.', ')'])
        .to_ascii_uppercase();
    let Some(options) = question.options.as_ref() else {
        return question;
    };
    if letter.len() != 1 || !letter.as_bytes()[0].is_ascii_uppercase() {
        return question;
    }

    let labelled = options.iter().find(|option| {
        let option = option.trim_start().to_ascii_uppercase();
        option.starts_with(&format!("{}.", letter)) || option.starts_with(&format!("{})", letter))
    });
    let index = (letter.as_bytes()[0] - b'A') as usize;

    if let Some(option) = labelled.or_else(|| options.get(index)) {
        question.correct_answer = option.clone();
    }
    question
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedClient {
        reply: Result<Vec<String>, fn() -> GatewayError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
        ) -> Result<Vec<String>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(candidates) => Ok(candidates.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn gateway(reply: Result<Vec<String>, fn() -> GatewayError>) -> GenerationGateway {
        GenerationGateway::new(
            Arc::new(CannedClient {
                reply,
                calls: AtomicUsize::new(0),
            }),
            "test-model",
        )
    }

    #[test]
    fn summary_headers_route_lines_regardless_of_order() {
        let reply = "Here you go!\n\nCONCEPTS:\nOsmosis: water movement\n\nBULLET_POINTS:\n• Cells are small\n  • Cells divide  \nPARAGRAPHS:\nCells are the unit of life.\n\nThey divide.\n";

        let content = parse_summary_reply(reply);
        assert_eq!(content.bullet_points, "• Cells are small\n• Cells divide\n");
        assert_eq!(content.paragraphs, "Cells are the unit of life.\nThey divide.\n");
        assert_eq!(content.concepts, "Osmosis: water movement\n");
    }

    #[test]
    fn summary_without_headers_splits_into_thirds() {
        let content = parse_summary_reply("abcdefghi");
        assert_eq!(content.bullet_points, "abc");
        assert_eq!(content.paragraphs, "def");
        assert_eq!(content.concepts, "ghi");

        let uneven = parse_summary_reply("abcdefghij");
        assert_eq!(uneven.bullet_points, "abc");
        assert_eq!(uneven.paragraphs, "def");
        assert_eq!(uneven.concepts, "ghij");
    }

    #[test]
    fn thirds_split_respects_multibyte_characters() {
        let content = parse_summary_reply("ééé日日日ааа");
        assert_eq!(content.bullet_points, "ééé");
        assert_eq!(content.paragraphs, "日日日");
        assert_eq!(content.concepts, "ааа");
    }

    #[test]
    fn header_lines_must_match_exactly() {
        let reply = "bullet_points:\n- lower case header\n";
        assert_eq!(parse_summary_reply(reply), split_into_thirds(reply));
    }

    #[test]
    fn extracts_exactly_the_array_between_prose() {
        let array = r#"[{"id": 1, "type": "true_false", "question": "Sky is blue", "correct_answer": "true"}]"#;
        let reply = format!("Sure! Here is the quiz:\n{}\nGood luck.", array);

        assert_eq!(extract_json_array(&reply), Some(array));
        let questions = parse_quiz_reply(&reply).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_type, QuestionType::TrueFalse);
        assert_eq!(questions[0].difficulty, "medium");
    }

    #[test]
    fn trailing_bracket_in_prose_makes_region_unusable() {
        let reply = r#"Quiz: [{"id": 1, "type": "true_false", "question": "Q", "correct_answer": "true"}] see [notes]"#;
        assert!(parse_quiz_reply(reply).is_none());
    }

    #[test]
    fn unbalanced_or_malformed_regions_are_unusable() {
        assert!(parse_quiz_reply("no brackets at all").is_none());
        assert!(parse_quiz_reply("[ {\"id\": 1 ").is_none());
        assert!(parse_quiz_reply("] backwards [").is_none());
        assert!(parse_quiz_reply("[not json]").is_none());
        assert!(parse_quiz_reply("[]").is_none());
    }

    #[test]
    fn letter_answers_are_resolved_to_option_text() {
        let reply = r#"[
            {"id": 1, "type": "multiple_choice", "question": "Q1",
             "options": ["A. Mitosis", "B. Meiosis"], "correct_answer": "B",
             "explanation": "", "difficulty": "hard"},
            {"id": 2, "type": "multiple_choice", "question": "Q2",
             "options": ["Red", "Green", "Blue"], "correct_answer": "c",
             "explanation": "", "difficulty": "easy"},
            {"id": 3, "type": "multiple_choice", "question": "Q3",
             "options": ["Yes", "No"], "correct_answer": "Maybe",
             "explanation": "", "difficulty": "easy"}
        ]"#;

        let questions = parse_quiz_reply(reply).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_answer, "B. Meiosis");
        assert_eq!(questions[1].correct_answer, "Blue");
    }

    #[test]
    fn repeated_ids_are_renumbered_so_every_answer_counts() {
        let reply = r#"[
            {"id": 1, "type": "true_false", "question": "Cells divide", "correct_answer": "true"},
            {"id": 1, "type": "true_false", "question": "Cells are visible unaided", "correct_answer": "false"},
            {"id": 4, "type": "true_false", "question": "DNA is in the nucleus", "correct_answer": "true"}
        ]"#;

        let questions = parse_quiz_reply(reply).unwrap();
        let ids: Vec<u32> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(questions[1].question, "Cells are visible unaided");

        let now = chrono::Utc::now();
        let quiz = crate::models::Quiz {
            id: "q-1".to_string(),
            material_id: "m-1".to_string(),
            title: "Quiz: Cells".to_string(),
            questions,
            time_limit: 1800,
            passing_score: 70,
            created_at: now,
            updated_at: now,
        };
        let answers: std::collections::HashMap<String, String> =
            [("1", "true"), ("2", "false"), ("3", "true")]
                .into_iter()
                .map(|(id, answer)| (id.to_string(), answer.to_string()))
                .collect();
        let outcome = crate::services::grading_service::grade(&quiz, &answers).unwrap();
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn distinct_ids_are_kept_as_given() {
        let reply = r#"[
            {"id": 7, "type": "true_false", "question": "A", "correct_answer": "true"},
            {"id": 3, "type": "true_false", "question": "B", "correct_answer": "false"}
        ]"#;

        let ids: Vec<u32> = parse_quiz_reply(reply).unwrap().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[tokio::test]
    async fn chat_returns_trimmed_reply() {
        let gateway = gateway(Ok(vec!["  Osmosis moves water across membranes.\n".to_string()]));

        let reply = gateway.chat("What is osmosis?", "Cells and membranes").await.unwrap();
        assert_eq!(reply, "Osmosis moves water across membranes.");
    }

    #[tokio::test]
    async fn blank_chat_reply_is_empty_response() {
        let gateway = gateway(Ok(vec!["   ".to_string()]));

        let err = gateway.chat("What is osmosis?", "").await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[test]
    fn assistant_prompt_marks_missing_context() {
        let prompt = assistant_prompt("What is osmosis?", "  ");
        assert!(prompt.starts_with("You are the AI study assistant"));
        assert!(prompt.contains("Material context: (no material selected)"));
        assert!(prompt.contains("Question: What is osmosis?"));
    }

    #[tokio::test]
    async fn unusable_quiz_reply_resolves_to_canned_question() {
        let gateway = gateway(Ok(vec!["I cannot write a quiz today.".to_string()]));

        let questions = gateway.generate_quiz("text", "Biology").await.unwrap();
        assert_eq!(questions, vec![fallback_content::unparsed_reply_question()]);
        assert_eq!(questions[0].id, 1);
    }

    #[tokio::test]
    async fn empty_candidate_list_is_classified() {
        let gateway = gateway(Ok(vec![]));

        let err = gateway.generate_summary("text").await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn provider_failure_is_propagated_with_status() {
        let gateway = gateway(Err(|| GatewayError::ProviderError {
            status: 429,
            body: "rate limited".to_string(),
        }));

        let err = gateway.generate_quiz("text", "Math").await.unwrap_err();
        assert_eq!(err.outcome(), "provider_error");
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn missing_credential_fails_without_a_request() {
        let client = OpenRouterClient::new(&GenerationConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9/unreachable".to_string(),
            ..GenerationConfig::default()
        })
        .unwrap();

        let err = client
            .complete("model", &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unconfigured));
    }
}
