//! Diesel-based document repository.
//!
//! A row is created when OCR finishes and updated when reasoning completes
//! (or fails).

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::models::{Document, DocumentRecord, DocumentStatus, NewDocument};
use super::util::{now_rfc3339, to_diesel_error};
use crate::agents::Flag;
use crate::schema::documents;

/// Stage 1 output to record.
#[derive(Debug, Clone)]
pub struct OcrInsert<'a> {
    pub document: &'a str,
    pub content_hash: &'a str,
    pub ocr_text: &'a str,
    pub layout_json: &'a str,
    pub ocr_confidence: Option<f32>,
}

/// Stage 2 output to record.
#[derive(Debug, Clone)]
pub struct ReasoningUpdate<'a> {
    pub agent_reasoning: &'a str,
    pub confidence_score: f32,
    pub flag: Option<Flag>,
    pub intelligence: &'a str,
}

#[derive(diesel::QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::Integer, column_name = "last_insert_rowid()")]
    id: i32,
}

/// Repository for the `documents` table.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: AsyncSqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a row for a freshly OCR'd document. Returns its id.
    pub async fn insert_ocr(&self, ocr: &OcrInsert<'_>) -> Result<i32, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_rfc3339();

        diesel::insert_into(documents::table)
            .values(NewDocument {
                document: ocr.document,
                content_hash: ocr.content_hash,
                ocr_text: ocr.ocr_text,
                layout_json: ocr.layout_json,
                ocr_confidence: ocr.ocr_confidence,
                status: DocumentStatus::OcrComplete.as_str(),
                created_at: &now,
                updated_at: &now,
            })
            .execute(&mut conn)
            .await?;

        let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
            .get_result(&mut conn)
            .await?;
        Ok(row.id)
    }

    /// Record the validation result and mark the row complete.
    pub async fn complete_reasoning(
        &self,
        id: i32,
        update: &ReasoningUpdate<'_>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_rfc3339();

        let updated = diesel::update(documents::table.find(id))
            .set((
                documents::agent_reasoning.eq(update.agent_reasoning),
                documents::confidence_score.eq(update.confidence_score),
                documents::flag.eq(update.flag.map(|f| f.as_str())),
                documents::intelligence.eq(update.intelligence),
                documents::status.eq(DocumentStatus::Complete.as_str()),
                documents::error.eq(None::<&str>),
                documents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Err(DieselError::NotFound);
        }
        Ok(())
    }

    /// Mark a row as failed with the error message.
    pub async fn mark_failed(&self, id: i32, error: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_rfc3339();

        diesel::update(documents::table.find(id))
            .set((
                documents::status.eq(DocumentStatus::Failed.as_str()),
                documents::error.eq(error),
                documents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Store the embedding of a document's OCR text.
    pub async fn set_embedding(&self, id: i32, embedding: &[f32]) -> Result<(), DieselError> {
        let json = serde_json::to_string(embedding).map_err(to_diesel_error)?;
        let mut conn = self.pool.get().await?;

        diesel::update(documents::table.find(id))
            .set(documents::embedding.eq(json))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<DocumentRecord> = documents::table
            .find(id)
            .select(DocumentRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Document::from))
    }

    /// List documents, newest first.
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = documents::table
            .select(DocumentRecord::as_select())
            .order((documents::created_at.desc(), documents::id.desc()))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit as i64);
        }

        let records: Vec<DocumentRecord> = query.load(&mut conn).await?;
        Ok(records.into_iter().map(Document::from).collect())
    }

    /// Most recent document with this content hash.
    pub async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<DocumentRecord> = documents::table
            .filter(documents::content_hash.eq(content_hash))
            .select(DocumentRecord::as_select())
            .order(documents::id.desc())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Document::from))
    }

    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = documents::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Count rows in a given status.
    pub async fn count_by_status(&self, status: DocumentStatus) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = documents::table
            .filter(documents::status.eq(status.as_str()))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;
    use tempfile::TempDir;

    async fn setup() -> (DocumentRepository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx.documents(), dir)
    }

    fn ocr<'a>(document: &'a str, hash: &'a str) -> OcrInsert<'a> {
        OcrInsert {
            document,
            content_hash: hash,
            ocr_text: "# Tender\n\nBudget: 2,000,000 EUR",
            layout_json: r#"[{"page":1,"block":1,"lines":2,"text":"Tender"}]"#,
            ocr_confidence: Some(0.91),
        }
    }

    #[tokio::test]
    async fn test_insert_then_complete() {
        let (repo, _dir) = setup().await;

        let id = repo.insert_ocr(&ocr("/data/tender.pdf", "abc")).await.unwrap();
        let doc = repo.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::OcrComplete);
        assert_eq!(doc.file_name(), "tender.pdf");
        assert_eq!(doc.layout[0]["text"], "Tender");
        assert!(doc.confidence_score.is_none());

        repo.complete_reasoning(
            id,
            &ReasoningUpdate {
                agent_reasoning: "Stamp matches issuer",
                confidence_score: 0.85,
                flag: Some(Flag::Green),
                intelligence: "{\"confidence_score\": 0.85}",
            },
        )
        .await
        .unwrap();

        let doc = repo.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Complete);
        assert_eq!(doc.confidence_score, Some(0.85));
        assert_eq!(doc.flag, Some(Flag::Green));
        assert_eq!(doc.agent_reasoning.as_deref(), Some("Stamp matches issuer"));
    }

    #[tokio::test]
    async fn test_complete_missing_row() {
        let (repo, _dir) = setup().await;
        let update = ReasoningUpdate {
            agent_reasoning: "",
            confidence_score: 0.0,
            flag: None,
            intelligence: "",
        };
        assert!(matches!(
            repo.complete_reasoning(42, &update).await,
            Err(DieselError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_failed_and_embedding() {
        let (repo, _dir) = setup().await;
        let id = repo.insert_ocr(&ocr("/data/scan.png", "def")).await.unwrap();

        repo.set_embedding(id, &[0.25, -0.5]).await.unwrap();
        repo.mark_failed(id, "model server unreachable").await.unwrap();

        let doc = repo.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("model server unreachable"));
        assert_eq!(doc.embedding, Some(vec![0.25, -0.5]));
        assert_eq!(repo.count_by_status(DocumentStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_and_find_by_hash() {
        let (repo, _dir) = setup().await;
        let first = repo.insert_ocr(&ocr("/data/a.pdf", "hash-a")).await.unwrap();
        let second = repo.insert_ocr(&ocr("/data/b.pdf", "hash-b")).await.unwrap();

        let docs = repo.list(None).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, second);

        let limited = repo.list(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        let found = repo.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.id, first);
        assert!(repo.find_by_hash("missing").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo.get(999).await.unwrap().is_none());
    }
}
