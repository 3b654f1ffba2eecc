use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Row = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(rename = "name")]
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(rename = "data")]
    pub series: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(rename = "chart_data", skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.to_string(),
            chart: None,
            created_at: Utc::now(),
            status: MessageStatus::Pending,
        }
    }

    pub fn assistant(content: &str, chart: Option<ChartSpec>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.to_string(),
            chart,
            created_at: Utc::now(),
            status: MessageStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelIntent {
    AnalyzeDataset,
    SuggestQuestions,
    AnswerQuestion,
}

impl ModelIntent {
    pub fn action(&self) -> &'static str {
        match self {
            ModelIntent::AnalyzeDataset => "analyze-data",
            ModelIntent::SuggestQuestions => "generate-questions",
            ModelIntent::AnswerQuestion => "query-data",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub intent: ModelIntent,
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionsResult {
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub answer: String,
    pub chart: Option<ChartSpec>,
}
