use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{Conversation, Message, MessageStatus};
use crate::services::orchestrator::QueryOrchestrator;
use crate::services::registry::{DatasetEntry, DatasetRegistry};
use crate::services::store::ConversationStore;

#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub conversation_id: String,
    pub user: Message,
    pub assistant: Message,
}

pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    orchestrator: Arc<QueryOrchestrator>,
    registry: Arc<DatasetRegistry>,
    in_flight: Mutex<HashSet<String>>,
}

// Releases the conversation's in-flight slot on every exit path.
struct InFlightGuard<'a> {
    manager: &'a ConversationManager,
    conversation_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.manager.in_flight.lock().remove(&self.conversation_id);
    }
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        orchestrator: Arc<QueryOrchestrator>,
        registry: Arc<DatasetRegistry>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            registry,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn open(&self, file_id: &str) -> Result<Conversation, AppError> {
        let entry = self.lookup(file_id)?;
        self.open_for_entry(&entry).await
    }

    pub async fn ask(&self, file_id: &str, question: &str) -> Result<Exchange, AppError> {
        let entry = self.lookup(file_id)?;
        let conversation = self.open_for_entry(&entry).await?;
        let _guard = self.claim(&conversation.id)?;

        self.orchestrator.require_session()?;

        let mut user = Message::user(question);
        self.persist(&conversation.id, &mut user).await;

        let mut assistant = match self
            .orchestrator
            .answer_question(question, &entry.dataset, &entry.summary)
            .await
        {
            Ok(result) => Message::assistant(&result.answer, result.chart),
            Err(e) => {
                tracing::error!("Query failed for conversation {}: {}", conversation.id, e);
                Message::assistant(&format!("Sorry, I encountered an error: {}", e), None)
            }
        };
        self.persist(&conversation.id, &mut assistant).await;

        Ok(Exchange {
            conversation_id: conversation.id,
            user,
            assistant,
        })
    }

    pub fn is_busy(&self, conversation_id: &str) -> bool {
        self.in_flight.lock().contains(conversation_id)
    }

    fn lookup(&self, file_id: &str) -> Result<Arc<DatasetEntry>, AppError> {
        self.registry
            .get(file_id)
            .ok_or_else(|| AppError::NotFound(format!("No dataset loaded for file {}", file_id)))
    }

    async fn open_for_entry(&self, entry: &DatasetEntry) -> Result<Conversation, AppError> {
        if let Some(conversation) = self.store.find_latest_conversation(&entry.id).await? {
            return Ok(conversation);
        }

        let title = format!("Chat about {}", entry.file_name);
        tracing::info!("Creating conversation for dataset {}", entry.id);
        self.store.create_conversation(&entry.id, &title).await
    }

    fn claim(&self, conversation_id: &str) -> Result<InFlightGuard<'_>, AppError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(conversation_id.to_string()) {
            return Err(AppError::ConversationBusy);
        }
        Ok(InFlightGuard {
            manager: self,
            conversation_id: conversation_id.to_string(),
        })
    }

    // The message keeps living in memory even when the write fails.
    async fn persist(&self, conversation_id: &str, message: &mut Message) {
        match self.store.append_message(conversation_id, message).await {
            Ok(()) => message.status = MessageStatus::Confirmed,
            Err(e) => {
                tracing::warn!("Failed to persist message {}: {}", message.id, e);
                message.status = MessageStatus::Failed;
            }
        }
    }
}
