use serde::Deserialize;
use serde_json::Value;

use crate::models::{AnalysisResult, AnswerResult, ChartSpec, QuestionsResult};

pub const SUGGESTED_QUESTION_COUNT: usize = 5;

pub const FALLBACK_QUESTIONS: [&str; SUGGESTED_QUESTION_COUNT] = [
    "What are the main trends in this data?",
    "What is the distribution of values?",
    "Are there any outliers or anomalies?",
    "What correlations exist between columns?",
    "What insights can we derive from this data?",
];

// Tags whether the model reply honored the contract or a substitute was served.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpreted<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Interpreted<T> {
    pub fn into_inner(self) -> T {
        match self {
            Interpreted::Parsed(value) | Interpreted::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Interpreted::Fallback(_))
    }
}

pub fn parse_summary(raw: &str) -> Interpreted<AnalysisResult> {
    Interpreted::Parsed(AnalysisResult {
        summary: raw.to_string(),
    })
}

pub fn parse_questions(raw: &str) -> Interpreted<QuestionsResult> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(questions) if questions.len() == SUGGESTED_QUESTION_COUNT => {
            Interpreted::Parsed(QuestionsResult { questions })
        }
        _ => Interpreted::Fallback(QuestionsResult {
            questions: FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RawAnswer {
    answer: String,
    #[serde(rename = "chartData", default)]
    chart_data: Option<Value>,
}

pub fn parse_answer(raw: &str) -> Interpreted<AnswerResult> {
    match serde_json::from_str::<RawAnswer>(raw) {
        Ok(parsed) => {
            let chart = parsed.chart_data.and_then(decode_chart);
            Interpreted::Parsed(AnswerResult {
                answer: parsed.answer,
                chart,
            })
        }
        Err(_) => Interpreted::Fallback(AnswerResult {
            answer: raw.to_string(),
            chart: None,
        }),
    }
}

fn decode_chart(value: Value) -> Option<ChartSpec> {
    match serde_json::from_value::<ChartSpec>(value) {
        Ok(chart) => Some(chart),
        Err(e) => {
            tracing::warn!("Discarding malformed chart payload: {}", e);
            None
        }
    }
}
