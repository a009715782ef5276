//! Persistent index on SQLite + sqlite-vec.
//!
//! Fact rows live in `facts`, vectors in the `facts_vec` vec0 table under the
//! same id. Every write touches both tables inside one transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::{EmbeddingIndex, IndexError};
use crate::db::{self, embedding_to_bytes, migrations};
use crate::embedding::EmbeddingProvider;
use crate::memory::types::{Fact, FactMetadata, RetrievalResult};

pub struct SqliteIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteIndex {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn = db::open_database(path)?;
        Self::from_connection(conn, embedder)
    }

    /// Wrap a connection whose schema is already initialized.
    ///
    /// An unlabelled database is stamped with the embedder's model id. A label
    /// that differs is left alone and reported.
    pub fn from_connection(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let model_id = embedder.model_id();
        match migrations::get_embedding_model(&conn)? {
            None => migrations::set_embedding_model(&conn, &model_id)?,
            Some(stored) if stored != model_id => {
                tracing::warn!(
                    stored = %stored,
                    embedder = %model_id,
                    "stored vectors were written by a different embedding model"
                );
            }
            Some(_) => {}
        }
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.embedder.embed(text).map_err(IndexError::embedding)
    }
}

fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_fact((id, content, metadata): (String, String, String)) -> Result<Fact, IndexError> {
    Ok(Fact {
        id,
        content,
        metadata: serde_json::from_str(&metadata)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl EmbeddingIndex for SqliteIndex {
    fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalResult>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embed(text)?;
        let conn = self.conn()?;

        let hits: Vec<(String, f64)> = conn
            .prepare(
                "SELECT id, distance FROM facts_vec \
                 WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
            )?
            .query_map(params![embedding_to_bytes(&embedding), k as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<_, _>>()?;

        let mut stmt = conn.prepare("SELECT id, content, metadata FROM facts WHERE id = ?1")?;
        let mut results = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            let Some(raw) = stmt.query_row([&id], fact_from_row).optional()? else {
                tracing::warn!(id = %id, "vector without fact row, skipping");
                continue;
            };
            let fact = decode_fact(raw)?;
            results.push(RetrievalResult {
                id: fact.id,
                content: fact.content,
                metadata: fact.metadata,
                distance,
            });
        }
        Ok(results)
    }

    fn add(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError> {
        let embedding = self.embed(document)?;
        let metadata_json = serde_json::to_string(metadata)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO facts (id, content, metadata, created_at, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, document, metadata_json, metadata.created_at, metadata.last_updated],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                IndexError::DuplicateId(id.to_string())
            } else {
                e.into()
            }
        })?;
        tx.execute(
            "INSERT INTO facts_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError> {
        let embedding = self.embed(document)?;
        let metadata_json = serde_json::to_string(metadata)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE facts SET content = ?2, metadata = ?3, last_updated = ?4 WHERE id = ?1",
            params![id, document, metadata_json, metadata.last_updated],
        )?;
        if changed == 0 {
            return Err(IndexError::NotFound(id.to_string()));
        }
        // vec0 rows are replaced rather than updated in place.
        tx.execute("DELETE FROM facts_vec WHERE id = ?1", [id])?;
        tx.execute(
            "INSERT INTO facts_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, ids: &[&str]) -> Result<usize, IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute("DELETE FROM facts WHERE id = ?1", [id])?;
            tx.execute("DELETE FROM facts_vec WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn get(&self, id: &str) -> Result<Option<Fact>, IndexError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, content, metadata FROM facts WHERE id = ?1",
            [id],
            fact_from_row,
        )
        .optional()?
        .map(decode_fact)
        .transpose()
    }

    fn get_all(&self) -> Result<Vec<Fact>, IndexError> {
        let conn = self.conn()?;
        let rows: Vec<(String, String, String)> = conn
            .prepare("SELECT id, content, metadata FROM facts ORDER BY rowid")?
            .query_map([], fact_from_row)?
            .collect::<Result<_, _>>()?;
        rows.into_iter().map(decode_fact).collect()
    }

    fn count(&self) -> Result<usize, IndexError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT count(*) FROM facts", [], |r| r.get(0))?;
        Ok(n as usize)
    }
}
