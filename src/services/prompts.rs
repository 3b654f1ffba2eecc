use crate::models::{ModelIntent, ModelRequest, Row};

const ANALYZE_SYSTEM_PROMPT: &str =
    "You are a data analysis expert. Provide clear, concise insights about datasets.";

const QUESTIONS_SYSTEM_PROMPT: &str =
    "You are a data analyst. Generate relevant questions about datasets. Return only valid JSON arrays.";

const ANSWER_SYSTEM_PROMPT: &str =
    "You are a data analyst. Answer questions about datasets clearly and suggest visualizations when appropriate. Always return valid JSON.";

pub fn analyze_dataset_request(
    columns: &[String],
    sample: &[Row],
    row_count: usize,
) -> ModelRequest {
    let user_prompt = format!(
        r#"Analyze this dataset and provide:
1. A brief summary (2-3 sentences) of what this data contains
2. Key insights about the data structure
3. Any notable patterns or interesting findings

Dataset Info:
- Total Rows: {row_count}
- Columns: {columns}
- Sample Data (first few rows):
{sample}

Provide a concise, informative summary."#,
        row_count = row_count,
        columns = columns.join(", "),
        sample = render_sample(columns, sample),
    );

    ModelRequest {
        intent: ModelIntent::AnalyzeDataset,
        system_instruction: ANALYZE_SYSTEM_PROMPT.to_string(),
        user_prompt,
        temperature: 0.7,
        max_output_tokens: 500,
    }
}

pub fn suggest_questions_request(columns: &[String], summary: &str) -> ModelRequest {
    let user_prompt = format!(
        r#"Based on this dataset, generate 5 insightful questions that a user might want to ask:

Dataset Summary: {summary}
Available Columns: {columns}

Generate questions that:
- Explore trends and patterns
- Compare different aspects of the data
- Seek specific insights
- Are answerable from the available columns

Return ONLY a JSON array of strings (the questions), nothing else."#,
        summary = summary,
        columns = columns.join(", "),
    );

    ModelRequest {
        intent: ModelIntent::SuggestQuestions,
        system_instruction: QUESTIONS_SYSTEM_PROMPT.to_string(),
        user_prompt,
        temperature: 0.8,
        max_output_tokens: 300,
    }
}

pub fn answer_question_request(
    question: &str,
    columns: &[String],
    sample: &[Row],
    summary: &str,
) -> ModelRequest {
    let user_prompt = format!(
        r#"Answer this question about the dataset: "{question}"

Dataset Context:
{summary}

Available Columns: {columns}
Sample Data:
{sample}

Provide:
1. A clear, direct answer to the question
2. If applicable, suggest a visualization type (bar, line, pie, scatter, area) and provide chart data in this exact format:
{{
  "type": "bar",
  "data": [{{"name": "Category1", "value": 100}}, ...]
}}

Return your response as JSON with this structure:
{{
  "answer": "your detailed answer here",
  "chartData": {{"type": "bar", "data": [...]}} or null if no chart needed
}}"#,
        question = question,
        summary = summary,
        columns = columns.join(", "),
        sample = render_sample(columns, sample),
    );

    ModelRequest {
        intent: ModelIntent::AnswerQuestion,
        system_instruction: ANSWER_SYSTEM_PROMPT.to_string(),
        user_prompt,
        temperature: 0.7,
        max_output_tokens: 800,
    }
}

// Header line plus one line per sampled row, fields in column order.
fn render_sample(columns: &[String], sample: &[Row]) -> String {
    let mut lines = Vec::with_capacity(sample.len() + 1);
    lines.push(columns.join(" | "));
    for row in sample {
        let fields: Vec<&str> = columns
            .iter()
            .map(|name| row.get(name).map(String::as_str).unwrap_or(""))
            .collect();
        lines.push(fields.join(" | "));
    }
    lines.join("\n")
}
