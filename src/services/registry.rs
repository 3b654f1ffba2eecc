use std::sync::Arc;

use moka::sync::Cache;
use uuid::Uuid;

use crate::models::TabularDataset;

#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub id: String,
    pub file_name: String,
    pub file_size: usize,
    pub dataset: TabularDataset,
    pub summary: String,
}

// Session-scoped home of parsed datasets; entries are immutable once stored.
pub struct DatasetRegistry {
    entries: Cache<String, Arc<DatasetEntry>>,
}

impl DatasetRegistry {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
        }
    }

    pub fn register(
        &self,
        file_name: &str,
        file_size: usize,
        dataset: TabularDataset,
        summary: &str,
    ) -> Arc<DatasetEntry> {
        let entry = Arc::new(DatasetEntry {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            file_size,
            dataset,
            summary: summary.to_string(),
        });

        self.entries.insert(entry.id.clone(), entry.clone());
        tracing::info!(
            "Registered dataset {} ({} rows) as {}",
            entry.file_name,
            entry.dataset.row_count,
            entry.id
        );
        entry
    }

    pub fn get(&self, file_id: &str) -> Option<Arc<DatasetEntry>> {
        self.entries.get(file_id)
    }
}
