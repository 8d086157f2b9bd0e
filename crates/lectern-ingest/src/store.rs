//! Hand-off of assembled units to a store.

use crate::error::{IngestError, IngestResult};
use crate::pipeline::{BatchOutcome, Pipeline, UploadedFile};
use async_trait::async_trait;
use lectern_core::{BatchContext, ContentUnit, SourceId};
use lectern_db::Database;
use tracing::info;

/// Destination for content units.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert or replace units by id.
    async fn upsert(&self, units: &[ContentUnit]) -> IngestResult<usize>;

    /// Remove every unit of one source file.
    async fn delete_by_source_id(&self, source_id: &SourceId) -> IngestResult<usize>;

    /// Replace all units of `sources` with `units`.
    async fn replace_sources(&self, sources: &[SourceId], units: &[ContentUnit]) -> IngestResult<usize> {
        for source in sources {
            self.delete_by_source_id(source).await?;
        }
        self.upsert(units).await
    }
}

async fn blocking<T, F>(f: F) -> IngestResult<T>
where
    F: FnOnce() -> lectern_db::DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Task(e.to_string()))?
        .map_err(IngestError::from)
}

#[async_trait]
impl ContentStore for Database {
    async fn upsert(&self, units: &[ContentUnit]) -> IngestResult<usize> {
        let db = self.clone();
        let units = units.to_vec();
        blocking(move || db.upsert_units(&units)).await
    }

    async fn delete_by_source_id(&self, source_id: &SourceId) -> IngestResult<usize> {
        let db = self.clone();
        let source_id = source_id.clone();
        blocking(move || db.delete_units_by_source(&source_id)).await
    }

    async fn replace_sources(&self, sources: &[SourceId], units: &[ContentUnit]) -> IngestResult<usize> {
        let db = self.clone();
        let sources = sources.to_vec();
        let units = units.to_vec();
        let (_, inserted) = blocking(move || db.replace_source_units(&sources, &units)).await?;
        Ok(inserted)
    }
}

impl Pipeline {
    /// Ingest a batch and persist its units, replacing earlier units of the
    /// same sources.
    pub async fn ingest_into(
        &self,
        files: Vec<UploadedFile>,
        context: &BatchContext,
        store: &dyn ContentStore,
    ) -> IngestResult<BatchOutcome> {
        let outcome = self.ingest(files, context).await?;

        let sources: Vec<SourceId> = outcome.succeeded().map(|s| s.id.clone()).collect();
        let stored = store.replace_sources(&sources, &outcome.units).await?;
        info!("Stored {} units from batch {}", stored, outcome.batch_id);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{MediaFormat, SourceRef};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        units: Mutex<Vec<ContentUnit>>,
    }

    #[async_trait]
    impl ContentStore for MemoryStore {
        async fn upsert(&self, units: &[ContentUnit]) -> IngestResult<usize> {
            let mut stored = self.units.lock().unwrap();
            for unit in units {
                stored.retain(|u| u.id != unit.id);
                stored.push(unit.clone());
            }
            Ok(units.len())
        }

        async fn delete_by_source_id(&self, source_id: &SourceId) -> IngestResult<usize> {
            let mut stored = self.units.lock().unwrap();
            let before = stored.len();
            stored.retain(|u| &u.source_id != source_id);
            Ok(before - stored.len())
        }
    }

    fn unit(id: i64, text: &str) -> ContentUnit {
        ContentUnit::new(&SourceRef::new(id, "notes.txt"), MediaFormat::Text, text).with_chunk_index(0)
    }

    #[tokio::test]
    async fn test_default_replace_sources() {
        let store = MemoryStore::default();
        store.upsert(&[unit(1, "old"), unit(2, "keep")]).await.unwrap();

        store
            .replace_sources(&[SourceId::Numeric(1)], &[unit(1, "new")])
            .await
            .unwrap();

        let texts: Vec<String> = store.units.lock().unwrap().iter().map(|u| u.text.clone()).collect();
        assert_eq!(texts, vec!["keep", "new"]);
    }

    #[tokio::test]
    async fn test_database_store() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn ContentStore = &db;

        assert_eq!(store.upsert(&[unit(1, "a"), unit(2, "b")]).await.unwrap(), 2);
        assert_eq!(store.delete_by_source_id(&SourceId::Numeric(2)).await.unwrap(), 1);
        assert_eq!(
            store
                .replace_sources(&[SourceId::Numeric(1)], &[unit(1, "c")])
                .await
                .unwrap(),
            1
        );

        let units = db.units_by_source(&SourceId::Numeric(1)).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "c");
        assert_eq!(db.count_units(None).unwrap(), 1);
    }
}
