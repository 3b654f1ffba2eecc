use anyhow::Result;
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub ai_endpoint_url: String,
    pub ai_access_token: Option<String>,
    pub conversation_db_path: Option<String>,
    pub port: u16,
    pub max_file_size: usize,
    pub dataset_cache_capacity: u64,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let ai_endpoint_url = std::env::var("AI_ENDPOINT_URL")
            .map_err(|e| anyhow::anyhow!("Failed to load AI_ENDPOINT_URL: {}", e))?;

        // A missing credential is surfaced per request, not at startup
        let ai_access_token = std::env::var("AI_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let conversation_db_path = std::env::var("CONVERSATION_DB_PATH")
            .ok()
            .filter(|path| !path.is_empty());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(3000);

        Ok(Config {
            ai_endpoint_url,
            ai_access_token,
            conversation_db_path,
            port,
            max_file_size: 10 * 1024 * 1024, // 10MB
            dataset_cache_capacity: 100,
        })
    }
}
