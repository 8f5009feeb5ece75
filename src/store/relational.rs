use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::models::{AgendaRecord, AgendaType, Attachment, VectorRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("agenda not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("stored column is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// SQLite-backed metadata store. List-valued columns are stored as JSON text;
/// `source_meeting_id` on both tables makes re-ingestion of a meeting a
/// simple delete-then-insert.
#[derive(Clone)]
pub struct AgendaStore {
    pool: SqlitePool,
}

impl AgendaStore {
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. Single connection, otherwise every
    /// pooled connection would see its own empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agendas (
                agenda_id TEXT PRIMARY KEY,
                source_meeting_id TEXT NOT NULL,
                agenda_title TEXT NOT NULL,
                meeting_title TEXT NOT NULL,
                meeting_date TEXT NOT NULL,
                meeting_url TEXT NOT NULL,
                main_speaker TEXT NOT NULL,
                all_speakers TEXT NOT NULL,
                speaker_count INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                chunk_ids TEXT NOT NULL,
                combined_text TEXT NOT NULL,
                ai_summary TEXT,
                key_issues TEXT,
                attachments TEXT NOT NULL,
                agenda_type TEXT NOT NULL DEFAULT 'other',
                status TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agenda_chunks (
                chunk_id TEXT PRIMARY KEY,
                agenda_id TEXT NOT NULL,
                source_meeting_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                speaker TEXT NOT NULL,
                full_text TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_agendas_meeting ON agendas(source_meeting_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_agenda ON agenda_chunks(agenda_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically replace everything previously ingested for a meeting.
    /// Nothing from a failed pipeline run is visible here because this is
    /// the only write path.
    pub async fn replace_meeting(
        &self,
        meeting_id: &str,
        records: &[AgendaRecord],
        vectors: &[VectorRecord],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM agenda_chunks WHERE source_meeting_id = ?")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM agendas WHERE source_meeting_id = ?")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO agendas (
                    agenda_id, source_meeting_id, agenda_title, meeting_title,
                    meeting_date, meeting_url, main_speaker, all_speakers,
                    speaker_count, chunk_count, chunk_ids, combined_text,
                    ai_summary, key_issues, attachments, agenda_type, status
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.agenda_id)
            .bind(meeting_id)
            .bind(&record.agenda_title)
            .bind(&record.meeting_title)
            .bind(&record.meeting_date)
            .bind(&record.meeting_url)
            .bind(&record.main_speaker)
            .bind(serde_json::to_string(&record.all_speakers)?)
            .bind(record.speaker_count() as i64)
            .bind(record.chunk_count as i64)
            .bind(serde_json::to_string(&record.chunk_ids)?)
            .bind(&record.combined_text)
            .bind(&record.ai_summary)
            .bind(
                record
                    .key_issues
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
            )
            .bind(serde_json::to_string(&record.attachments)?)
            .bind(record.agenda_type.as_str())
            .bind(&record.status)
            .execute(&mut *tx)
            .await?;
        }

        for vector in vectors {
            sqlx::query(
                r#"
                INSERT INTO agenda_chunks (
                    chunk_id, agenda_id, source_meeting_id, chunk_index,
                    speaker, full_text
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&vector.chunk_id)
            .bind(&vector.metadata.agenda_id)
            .bind(meeting_id)
            .bind(vector.metadata.chunk_index as i64)
            .bind(&vector.metadata.speaker)
            .bind(&vector.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Persisted {} agendas and {} chunks for {}",
            records.len(),
            vectors.len(),
            meeting_id
        );
        Ok(())
    }

    pub async fn delete_meeting(&self, meeting_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM agenda_chunks WHERE source_meeting_id = ?")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM agendas WHERE source_meeting_id = ?")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, agenda_id: &str) -> Result<AgendaRecord, StoreError> {
        let row: Option<AgendaRow> = sqlx::query_as("SELECT * FROM agendas WHERE agenda_id = ?")
            .bind(agenda_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.into_record(),
            None => Err(StoreError::NotFound(agenda_id.to_string())),
        }
    }

    /// Fetch records for the given keys, dropping any whose type is in
    /// `exclude_types`. Missing keys are skipped, not an error; vector hits
    /// can outlive their relational rows during re-ingestion.
    pub async fn find_by_ids(
        &self,
        agenda_ids: &[String],
        exclude_types: &[AgendaType],
    ) -> Result<Vec<AgendaRecord>, StoreError> {
        if agenda_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; agenda_ids.len()].join(", ");
        let sql = format!("SELECT * FROM agendas WHERE agenda_id IN ({})", placeholders);
        let mut query = sqlx::query_as::<_, AgendaRow>(&sql);
        for id in agenda_ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            if !exclude_types.contains(&record.agenda_type) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn update_summary(
        &self,
        agenda_id: &str,
        summary: &str,
        key_issues: &[String],
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE agendas SET ai_summary = ?, key_issues = ? WHERE agenda_id = ?",
        )
        .bind(summary)
        .bind(serde_json::to_string(key_issues)?)
        .bind(agenda_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(agenda_id.to_string()));
        }
        Ok(())
    }

    /// Agendas with transcript text but no summary yet, oldest keys first
    pub async fn missing_summaries(&self, limit: u32) -> Result<Vec<AgendaRecord>, StoreError> {
        let rows: Vec<AgendaRow> = sqlx::query_as(
            r#"
            SELECT * FROM agendas
            WHERE ai_summary IS NULL AND combined_text != ''
            ORDER BY agenda_id
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AgendaRow::into_record).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgendaRow {
    agenda_id: String,
    agenda_title: String,
    meeting_title: String,
    meeting_date: String,
    meeting_url: String,
    main_speaker: String,
    all_speakers: String,
    chunk_count: i64,
    chunk_ids: String,
    combined_text: String,
    ai_summary: Option<String>,
    key_issues: Option<String>,
    attachments: String,
    agenda_type: String,
    status: String,
}

impl AgendaRow {
    fn into_record(self) -> Result<AgendaRecord, StoreError> {
        let all_speakers: Vec<String> = serde_json::from_str(&self.all_speakers)?;
        let chunk_ids: Vec<String> = serde_json::from_str(&self.chunk_ids)?;
        let attachments: Vec<Attachment> = serde_json::from_str(&self.attachments)?;
        let key_issues = self
            .key_issues
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(AgendaRecord {
            agenda_id: self.agenda_id,
            agenda_title: self.agenda_title,
            meeting_title: self.meeting_title,
            meeting_date: self.meeting_date,
            meeting_url: self.meeting_url,
            main_speaker: self.main_speaker,
            all_speakers,
            chunk_count: self.chunk_count as usize,
            chunk_ids,
            combined_text: self.combined_text,
            ai_summary: self.ai_summary,
            key_issues,
            attachments,
            agenda_type: AgendaType::parse(&self.agenda_type),
            status: self.status,
        })
    }
}
