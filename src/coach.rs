//! Client for the language-model coach and plan generator.
//!
//! Talks to any OpenAI-compatible chat completions endpoint. A `CoachClient`
//! is built per request from the shared HTTP connection pool and config.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::LlmError;

/// System prompt for free-form coaching questions.
const COACH_SYSTEM_PROMPT: &str = "You are an elite strength and conditioning coach. \
Your goal is to provide quick, actionable, and safe advice. \
Keep answers concise (under 3 sentences if possible). \
If the question is not about fitness, politely decline to answer.";

/// System prompt for weekly plan generation.
const PLAN_SYSTEM_PROMPT: &str = "You are an expert strength coach who designs weekly training splits. \
Respond only with a JSON object with the keys \"splitName\" (string), \"description\" \
(one or two sentences) and \"workouts\" (array of workout names, one per training day, in order).";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Most workouts a weekly plan can hold, one per day.
pub const MAX_PLAN_WORKOUTS: usize = 7;

/// Connection settings for the language model.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl LlmConfig {
    /// Builds the shared HTTP client with this config's timeouts.
    pub fn http_client(&self) -> Result<Client, LlmError> {
        Ok(Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()?)
    }
}

// === Wire Types ===

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// === Plan Types ===

/// Onboarding answers used to generate a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    pub experience: String,
    #[serde(deserialize_with = "deserialize_days")]
    pub days: u32,
}

/// A generated weekly split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    pub split_name: String,
    pub description: String,
    pub workouts: Vec<String>,
}

/// Accepts training days as a number or a numeric string ("3").
fn deserialize_days<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid days value: {}", s))),
    }
}

/// Extracts the outermost JSON object from model output, ignoring code fences.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses and validates a plan from model output.
pub fn parse_plan(text: &str) -> Result<GeneratedPlan, LlmError> {
    let json = extract_json_object(text)
        .ok_or_else(|| LlmError::MalformedPlan("no JSON object in reply".into()))?;
    let mut plan: GeneratedPlan =
        serde_json::from_str(json).map_err(|e| LlmError::MalformedPlan(e.to_string()))?;

    plan.workouts = plan
        .workouts
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();

    if plan.workouts.is_empty() {
        return Err(LlmError::MalformedPlan("plan has no workouts".into()));
    }
    if plan.workouts.len() > MAX_PLAN_WORKOUTS {
        return Err(LlmError::MalformedPlan(format!(
            "plan has {} workouts for one week",
            plan.workouts.len()
        )));
    }

    Ok(plan)
}

// === Client ===

/// Request-scoped client for the language model.
pub struct CoachClient<'a> {
    http: Client,
    config: &'a LlmConfig,
    api_key: &'a str,
}

impl<'a> CoachClient<'a> {
    /// Creates a client, failing if no API key is configured.
    pub fn new(http: Client, config: &'a LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::NotConfigured)?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Answers a free-form fitness question.
    pub async fn ask(&self, question: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: COACH_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: question.to_string(),
            },
        ];

        self.complete(messages, false).await
    }

    /// Generates a weekly training split.
    pub async fn generate_plan(&self, request: &PlanRequest) -> Result<GeneratedPlan, LlmError> {
        let prompt = format!(
            "Goal: {}\nExperience: {}\nTraining days per week: {}\n\
             Create a split with exactly {} workouts.",
            request.goal, request.experience, request.days, request.days
        );
        let messages = vec![
            ChatMessage {
                role: "system",
                content: PLAN_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ];

        let reply = self.complete(messages, true).await?;
        parse_plan(&reply)
    }

    async fn complete(&self, messages: Vec<ChatMessage>, json_mode: bool) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        log::debug!("Sending chat completion to {} ({})", url, self.config.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyReply)
    }
}
