use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ChartSpec, Conversation, Message, MessageStatus, Role};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_latest_conversation(
        &self,
        file_id: &str,
    ) -> Result<Option<Conversation>, AppError>;

    async fn create_conversation(
        &self,
        file_id: &str,
        title: &str,
    ) -> Result<Conversation, AppError>;

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), AppError>;
}

pub struct SqliteConversationStore {
    conn: Connection,
}

impl SqliteConversationStore {
    pub async fn open(path: &str) -> Result<Self, AppError> {
        tracing::info!("Opening conversation store at {}", path);
        let conn = Connection::open(path.to_string()).await?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    pub async fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().await?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> Result<(), AppError> {
        conn.call(move |conn: &mut rusqlite::Connection| -> rusqlite::Result<()> {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    file_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL REFERENCES conversations(id),
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    chart_data TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_conversations_file
                    ON conversations(file_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages(conversation_id, created_at);",
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        let id_param = conversation_id.to_string();
        let rows = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| -> rusqlite::Result<Vec<MessageRow>> {
                let mut stmt = conn.prepare(
                    "SELECT id, role, content, chart_data, created_at FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id_param], |row| {
                        Ok(MessageRow {
                            id: row.get(0)?,
                            role: row.get(1)?,
                            content: row.get(2)?,
                            chart_data: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}

struct MessageRow {
    id: String,
    role: String,
    content: String,
    chart_data: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            // Anything not stored as a user turn renders as assistant
            role: match self.role.as_str() {
                "user" => Role::User,
                _ => Role::Assistant,
            },
            content: self.content,
            chart: self.chart_data.as_deref().and_then(decode_chart),
            created_at: parse_timestamp(&self.created_at),
            status: MessageStatus::Confirmed,
        }
    }
}

fn decode_chart(raw: &str) -> Option<ChartSpec> {
    match serde_json::from_str(raw) {
        Ok(chart) => Some(chart),
        Err(e) => {
            tracing::warn!("Discarding unreadable stored chart payload: {}", e);
            None
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        tracing::warn!("Unreadable timestamp in conversation store: {}", raw);
        Utc::now()
    })
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn find_latest_conversation(
        &self,
        file_id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let file_id_param = file_id.to_string();
        let found = self
            .conn
            .call(
                move |conn: &mut rusqlite::Connection| -> rusqlite::Result<Option<(String, String, String, String)>> {
                    let mut stmt = conn.prepare(
                        "SELECT id, file_id, title, created_at FROM conversations
                         WHERE file_id = ?1
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT 1",
                    )?;
                    let mut rows = stmt.query(rusqlite::params![file_id_param])?;
                    match rows.next()? {
                        Some(row) => Ok(Some((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))),
                        None => Ok(None),
                    }
                },
            )
            .await?;

        let Some((id, file_id, title, created_at)) = found else {
            return Ok(None);
        };

        let messages = self.load_messages(&id).await?;
        Ok(Some(Conversation {
            id,
            file_id,
            title,
            created_at: parse_timestamp(&created_at),
            messages,
        }))
    }

    async fn create_conversation(
        &self,
        file_id: &str,
        title: &str,
    ) -> Result<Conversation, AppError> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        };

        let id = conversation.id.clone();
        let file_id = conversation.file_id.clone();
        let title = conversation.title.clone();
        let created_at = conversation.created_at.to_rfc3339();

        self.conn
            .call(move |conn: &mut rusqlite::Connection| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO conversations (id, file_id, title, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, file_id, title, created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), AppError> {
        let chart_json = match &message.chart {
            Some(chart) => Some(
                serde_json::to_string(chart)
                    .map_err(|e| AppError::Internal(format!("Failed to encode chart: {}", e)))?,
            ),
            None => None,
        };

        let conversation_id = conversation_id.to_string();
        let id = message.id.clone();
        let role = message.role.as_str();
        let content = message.content.clone();
        let created_at = message.created_at.to_rfc3339();

        self.conn
            .call(move |conn: &mut rusqlite::Connection| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, role, content, chart_data, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![id, conversation_id, role, content, chart_json, created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartKind, ChartPoint};

    fn chart() -> ChartSpec {
        ChartSpec {
            kind: ChartKind::Bar,
            series: vec![ChartPoint {
                label: "Bob".to_string(),
                value: 31.0,
            }],
        }
    }

    #[tokio::test]
    async fn finds_nothing_for_unknown_file() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        assert!(store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn created_conversation_is_found_again() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let created = store
            .create_conversation("file-1", "Chat about people.csv")
            .await
            .unwrap();

        let found = store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.title, "Chat about people.csv");
        assert!(found.messages.is_empty());
    }

    #[tokio::test]
    async fn latest_conversation_wins_on_timestamp_ties() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        store.create_conversation("file-1", "first").await.unwrap();
        let second = store.create_conversation("file-1", "second").await.unwrap();

        let found = store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn messages_round_trip_in_order_with_charts() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let conversation = store.create_conversation("file-1", "t").await.unwrap();

        let user = Message::user("Who is the oldest?");
        let assistant = Message::assistant("Bob, at 31.", Some(chart()));
        store.append_message(&conversation.id, &user).await.unwrap();
        store
            .append_message(&conversation.id, &assistant)
            .await
            .unwrap();

        let found = store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.messages.len(), 2);
        assert_eq!(found.messages[0].role, Role::User);
        assert_eq!(found.messages[0].content, "Who is the oldest?");
        assert!(found.messages[0].chart.is_none());
        assert_eq!(found.messages[1].role, Role::Assistant);
        assert_eq!(found.messages[1].chart, Some(chart()));
        assert!(found
            .messages
            .iter()
            .all(|m| m.status == MessageStatus::Confirmed));
    }

    #[tokio::test]
    async fn identical_timestamps_keep_insertion_order() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let conversation = store.create_conversation("file-1", "t").await.unwrap();

        let stamp = Utc::now();
        for content in ["one", "two", "three"] {
            let mut message = Message::user(content);
            message.created_at = stamp;
            store
                .append_message(&conversation.id, &message)
                .await
                .unwrap();
        }

        let found = store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .unwrap();
        let contents: Vec<&str> = found.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_is_a_database_error() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let err = store
            .append_message("no-such-conversation", &Message::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn unreadable_stored_chart_is_dropped() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let conversation = store.create_conversation("file-1", "t").await.unwrap();

        let conversation_id = conversation.id.clone();
        store
            .conn
            .call(move |conn: &mut rusqlite::Connection| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, role, content, chart_data, created_at)
                     VALUES ('m1', ?1, 'assistant', 'hello', 'not json', ?2)",
                    rusqlite::params![conversation_id, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let found = store
            .find_latest_conversation("file-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.messages.len(), 1);
        assert_eq!(found.messages[0].content, "hello");
        assert!(found.messages[0].chart.is_none());
    }
}
