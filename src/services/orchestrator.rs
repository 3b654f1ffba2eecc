use std::sync::Arc;

use crate::clients::reasoning::ReasoningClient;
use crate::clients::session::SessionProvider;
use crate::error::AppError;
use crate::models::{AnalysisResult, AnswerResult, QuestionsResult, TabularDataset};
use crate::services::{prompts, reply, tabular};

const ANALYSIS_SAMPLE_ROWS: usize = 10;
const ANSWER_SAMPLE_ROWS: usize = 20;

pub struct QueryOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    client: Arc<dyn ReasoningClient>,
}

impl QueryOrchestrator {
    pub fn new(sessions: Arc<dyn SessionProvider>, client: Arc<dyn ReasoningClient>) -> Self {
        Self { sessions, client }
    }

    // Checked before any prompt is built or request sent.
    pub fn require_session(&self) -> Result<String, AppError> {
        self.sessions.current_token().ok_or(AppError::Unauthenticated)
    }

    pub async fn analyze_dataset(
        &self,
        dataset: &TabularDataset,
    ) -> Result<AnalysisResult, AppError> {
        let token = self.require_session()?;

        tracing::info!(
            "Requesting analysis for dataset with {} rows, {} columns",
            dataset.row_count,
            dataset.columns.len()
        );

        let sample = tabular::sample_rows(dataset, ANALYSIS_SAMPLE_ROWS);
        let request = prompts::analyze_dataset_request(&dataset.columns, sample, dataset.row_count);
        let raw = self.client.complete(&token, &request).await?;

        Ok(reply::parse_summary(&raw).into_inner())
    }

    pub async fn suggest_questions(
        &self,
        columns: &[String],
        summary: &str,
    ) -> Result<QuestionsResult, AppError> {
        let token = self.require_session()?;

        let request = prompts::suggest_questions_request(columns, summary);
        let raw = self.client.complete(&token, &request).await?;

        let interpreted = reply::parse_questions(&raw);
        if interpreted.is_fallback() {
            tracing::warn!("Model reply was not a usable question list, serving the fallback set");
        }
        Ok(interpreted.into_inner())
    }

    pub async fn answer_question(
        &self,
        question: &str,
        dataset: &TabularDataset,
        summary: &str,
    ) -> Result<AnswerResult, AppError> {
        let token = self.require_session()?;

        tracing::info!("Answering question against {} row dataset", dataset.row_count);

        let sample = tabular::sample_rows(dataset, ANSWER_SAMPLE_ROWS);
        let request =
            prompts::answer_question_request(question, &dataset.columns, sample, summary);
        let raw = self.client.complete(&token, &request).await?;

        let interpreted = reply::parse_answer(&raw);
        if interpreted.is_fallback() {
            tracing::warn!("Model reply was not valid JSON, using the raw text as the answer");
        }
        Ok(interpreted.into_inner())
    }
}
