use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;

use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::CompletionResponse;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use crate::quiz::options::{top_up, OPTION_COUNT};

pub const TITLE: &str = "AI 数学故事教练";

pub const WRONG_OPTION_COUNT: usize = OPTION_COUNT - 1;

const STORY_TEMPERATURE: f32 = 0.8;
const STORY_TIMEOUT: Duration = Duration::from_secs(15);

const BASE_PROMPT: &str = "为7岁的孩子生成一个有趣的中文数学应用题。目标总是让总数等于10（加法）或将数字减少到10（减法）。确保数字是简单的整数。narrativeText（故事背景）、questionText（问题）、explanation（解释）字段必须全部使用中文。";

/// A story-wrapped make-ten question.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoryProblem {
    pub narrative_text: String,
    pub question_text: String,
    pub correct_answer: i32,
    pub wrong_options: [i32; WRONG_OPTION_COUNT],
    pub explanation: String,
    /// Correct answer plus the wrong options, shuffled.
    pub options: [i32; OPTION_COUNT],
}

impl StoryProblem {
    pub fn is_correct(&self, selected: i32) -> bool {
        selected == self.correct_answer
    }
}

/// Which way the story reaches ten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    MakeTen,
    DownToTen,
}

impl Scenario {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Scenario::MakeTen
        } else {
            Scenario::DownToTen
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Scenario::MakeTen => "这次请使用加法场景：故事里已经有一些东西，问还需要再加多少才能让总数正好等于10。",
            Scenario::DownToTen => "这次请使用减法场景：故事里的东西多于10个（11到19个），问需要拿走多少才能正好剩下10个。",
        }
    }
}

/// Everything the service needs to write one story.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub scenario: Scenario,
    pub prompt: String,
    pub schema: Value,
}

impl StoryRequest {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            prompt: format!("{} {}", BASE_PROMPT, scenario.instruction()),
            schema: story_schema(),
        }
    }

    /// The prompt followed by the schema the reply has to follow.
    pub fn message(&self) -> String {
        format!(
            "{}\n\n只返回一个符合以下 JSON Schema 的 JSON 对象，不要添加任何其他文字：\n{}",
            self.prompt, self.schema
        )
    }
}

pub fn story_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "narrativeText": {
                "type": "string",
                "description": "一个简短有趣的中文数学故事，适合7岁儿童，包含数字场景。必须是关于凑成10或减去得到10的场景。"
            },
            "questionText": {
                "type": "string",
                "description": "具体的中文问题，询问缺失的数字。"
            },
            "correctAnswer": {
                "type": "integer",
                "description": "达到10或减至10所需的数字。"
            },
            "wrongOptions": {
                "type": "array",
                "items": { "type": "integer" },
                "minItems": WRONG_OPTION_COUNT,
                "maxItems": WRONG_OPTION_COUNT,
                "description": "3个接近正确答案的错误选项。"
            },
            "explanation": {
                "type": "string",
                "description": "简短的中文鼓励性解释，说明数学原理。"
            }
        },
        "required": ["narrativeText", "questionText", "correctAnswer", "wrongOptions", "explanation"],
        "additionalProperties": false
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("story service failed: {0}")]
    Service(#[from] chatgpt::err::Error),
    #[error("story service returned an empty reply")]
    EmptyResponse,
    #[error("story reply does not match the schema: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("story reply failed validation: {0}")]
    Invalid(String),
}

/// Something that turns a [`StoryRequest`] into raw reply text.
pub trait StoryBackend: Send + Sync {
    fn complete(
        &self,
        request: &StoryRequest,
    ) -> impl Future<Output = Result<String, StoryError>> + Send;
}

pub struct ChatGptBackend {
    chat_gpt: ChatGPT,
}

impl ChatGptBackend {
    pub fn new(api_key: String) -> Result<Self, StoryError> {
        let mut chat_gpt = ChatGPT::new(api_key)?;
        chat_gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        chat_gpt.config.temperature = STORY_TEMPERATURE;
        chat_gpt.config.timeout = STORY_TIMEOUT;
        Ok(Self { chat_gpt })
    }
}

impl StoryBackend for ChatGptBackend {
    async fn complete(&self, request: &StoryRequest) -> Result<String, StoryError> {
        log::debug!("Requesting a {:?} story", request.scenario);
        let response: CompletionResponse = self.chat_gpt.send_message(request.message()).await?;
        let content = response.message().content.clone();
        log::debug!("Completion: {:?}", content);
        Ok(content)
    }
}

pub struct StoryClient<B> {
    backend: B,
}

impl<B: StoryBackend> StoryClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Asks the service for a new story problem.
    ///
    /// Every failure is logged and reported as `None`; callers only need to
    /// offer a retry.
    pub async fn fetch_story_problem(&self) -> Option<StoryProblem> {
        match self.try_fetch().await {
            Ok(problem) => Some(problem),
            Err(error) => {
                log::warn!("Error generating math story: {error}");
                None
            }
        }
    }

    async fn try_fetch(&self) -> Result<StoryProblem, StoryError> {
        let request = StoryRequest::new(Scenario::random(&mut rand::thread_rng()));
        let reply = self.backend.complete(&request).await?;
        parse_story(&reply, &mut rand::thread_rng())
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StoryPayload {
    narrative_text: String,
    question_text: String,
    correct_answer: i32,
    wrong_options: Vec<i32>,
    explanation: String,
}

/// Parses and validates one reply from the service.
pub fn parse_story<R: Rng + ?Sized>(reply: &str, rng: &mut R) -> Result<StoryProblem, StoryError> {
    let body = strip_code_fence(reply);
    if body.is_empty() {
        return Err(StoryError::EmptyResponse);
    }
    let payload: StoryPayload = serde_json::from_str(body)?;

    if payload.wrong_options.len() != WRONG_OPTION_COUNT {
        return Err(StoryError::Invalid(format!(
            "expected {} wrong options, got {}",
            WRONG_OPTION_COUNT,
            payload.wrong_options.len()
        )));
    }
    for (field, text) in [
        ("narrativeText", &payload.narrative_text),
        ("questionText", &payload.question_text),
        ("explanation", &payload.explanation),
    ] {
        if text.trim().is_empty() {
            return Err(StoryError::Invalid(format!("{field} is blank")));
        }
    }

    let correct_answer = payload.correct_answer;
    let mut picked = vec![correct_answer];
    for option in payload.wrong_options {
        if !picked.contains(&option) {
            picked.push(option);
        }
    }
    if picked.len() < OPTION_COUNT {
        // The service sometimes repeats the answer among the wrong options.
        log::warn!("Story reply had overlapping options, replacing the duplicates");
        top_up(&mut picked, distractor_range(correct_answer), rng);
    }
    if picked.len() != OPTION_COUNT {
        return Err(StoryError::Invalid(format!(
            "could not build {OPTION_COUNT} distinct options around {correct_answer}"
        )));
    }

    let mut wrong_options = [0; WRONG_OPTION_COUNT];
    wrong_options.copy_from_slice(&picked[1..]);
    let mut options = [0; OPTION_COUNT];
    options.copy_from_slice(&picked);
    options.shuffle(rng);

    Ok(StoryProblem {
        narrative_text: payload.narrative_text,
        question_text: payload.question_text,
        correct_answer,
        wrong_options,
        explanation: payload.explanation,
        options,
    })
}

/// Seven values around `correct`, never going below zero unless `correct` does.
/// Near the ends of `i32` the window slides inwards instead of overflowing.
fn distractor_range(correct: i32) -> RangeInclusive<i32> {
    let low = correct
        .saturating_sub(3)
        .max(correct.min(0))
        .min(i32::MAX - 6);
    low..=low + 6
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(fenced) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}
