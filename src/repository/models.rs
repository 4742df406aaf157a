//! Diesel records and the document model built from them.

use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::parse_datetime;
use crate::agents::Flag;
use crate::schema::documents;

/// Document row as stored.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentRecord {
    pub id: i32,
    pub document: String,
    pub content_hash: String,
    pub ocr_text: String,
    pub layout_json: String,
    pub ocr_confidence: Option<f32>,
    pub agent_reasoning: Option<String>,
    pub confidence_score: Option<f32>,
    pub flag: Option<String>,
    pub intelligence: Option<String>,
    pub embedding: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row inserted after Stage 1.
#[derive(Insertable, Debug)]
#[diesel(table_name = documents)]
pub struct NewDocument<'a> {
    pub document: &'a str,
    pub content_hash: &'a str,
    pub ocr_text: &'a str,
    pub layout_json: &'a str,
    pub ocr_confidence: Option<f32>,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Processing state of a document row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Stage 1 done, reasoning pending or running.
    OcrComplete,
    Complete,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcrComplete => "ocr_complete",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ocr_complete" => Some(Self::OcrComplete),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A processed document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i32,
    /// Path of the source file.
    pub document: String,
    pub content_hash: String,
    pub ocr_text: String,
    /// Layout blocks as stored (JSON array).
    pub layout: serde_json::Value,
    pub ocr_confidence: Option<f32>,
    pub agent_reasoning: Option<String>,
    pub confidence_score: Option<f32>,
    pub flag: Option<Flag>,
    /// Raw output of the final fusion or thinking pass.
    pub intelligence: Option<String>,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// File name of the source document.
    pub fn file_name(&self) -> String {
        Path::new(&self.document)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.document.clone())
    }

    pub fn embedding_dims(&self) -> Option<usize> {
        self.embedding.as_ref().map(|e| e.len())
    }
}

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            layout: serde_json::from_str(&record.layout_json)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            flag: record.flag.as_deref().and_then(Flag::from_str),
            embedding: record
                .embedding
                .as_deref()
                .and_then(|e| serde_json::from_str(e).ok()),
            status: DocumentStatus::from_str(&record.status).unwrap_or(DocumentStatus::Failed),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
            document: record.document,
            content_hash: record.content_hash,
            ocr_text: record.ocr_text,
            ocr_confidence: record.ocr_confidence,
            agent_reasoning: record.agent_reasoning,
            confidence_score: record.confidence_score,
            intelligence: record.intelligence,
            error: record.error,
        }
    }
}
