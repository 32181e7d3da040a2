//! Note repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use glossa_core::{Error, Note, NoteRepository, NoteStatus, Result, Tag};

const NOTE_COLUMNS: &str = "id, user_id, original_text, generated_content, status, error_message, created_at, updated_at";

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Replace a note's tag set, upserting tags by name.
    ///
    /// Returns the tags with their stored ids, in the given order.
    async fn replace_tags(
        tx: &mut Transaction<'_, Postgres>,
        note_id: Uuid,
        tags: &[Tag],
    ) -> Result<Vec<Tag>> {
        sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let mut stored = Vec::with_capacity(tags.len());
        for (position, tag) in tags.iter().enumerate() {
            let tag_id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (id, name) VALUES ($1, $2)
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(&tag.name)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;

            sqlx::query(
                "INSERT INTO note_tags (note_id, tag_id, position) VALUES ($1, $2, $3)
                 ON CONFLICT DO NOTHING",
            )
            .bind(note_id)
            .bind(tag_id)
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Tag {
                id: tag_id,
                name: tag.name.clone(),
            });
        }
        Ok(stored)
    }

    /// Load tags for a batch of notes in one query.
    async fn tags_for_notes(&self, note_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>> {
        if note_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT nt.note_id, t.id, t.name
             FROM note_tags nt
             JOIN tags t ON t.id = nt.tag_id
             WHERE nt.note_id = ANY($1)
             ORDER BY nt.note_id, nt.position",
        )
        .bind(note_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut by_note: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_note
                .entry(row.get("note_id"))
                .or_default()
                .push(Tag {
                    id: row.get("id"),
                    name: row.get("name"),
                });
        }
        Ok(by_note)
    }
}

/// Map a `notes` row (without tags).
fn note_from_row(row: &PgRow) -> Result<Note> {
    let status: String = row.get("status");
    let status: NoteStatus = status.parse().map_err(Error::Internal)?;
    Ok(Note {
        id: row.get("id"),
        user_id: row.get("user_id"),
        original_text: row.get("original_text"),
        generated_content: row.get("generated_content"),
        status,
        error_message: row.get("error_message"),
        tags: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, mut note: Note) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO notes (id, user_id, original_text, generated_content, status, error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.original_text)
        .bind(&note.generated_content)
        .bind(note.status.as_str())
        .bind(&note.error_message)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if !note.tags.is_empty() {
            note.tags = Self::replace_tags(&mut tx, note.id, &note.tags).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "create",
            note_id = %note.id,
            user_id = %note.user_id,
            "Note created"
        );
        Ok(note)
    }

    async fn get(&self, id: Uuid) -> Result<Note> {
        let row = sqlx::query(&format!("SELECT {} FROM notes WHERE id = $1", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;

        let mut note = note_from_row(&row)?;
        note.tags = self
            .tags_for_notes(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(note)
    }

    async fn update(&self, mut note: Note) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            "UPDATE notes
             SET original_text = $2, generated_content = $3, status = $4,
                 error_message = $5, updated_at = $6
             WHERE id = $1",
        )
        .bind(note.id)
        .bind(&note.original_text)
        .bind(&note.generated_content)
        .bind(note.status.as_str())
        .bind(&note.error_message)
        .bind(note.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(note.id));
        }

        note.tags = Self::replace_tags(&mut tx, note.id, &note.tags).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "update",
            note_id = %note.id,
            status = %note.status,
            tag_count = note.tags.len(),
            "Note updated"
        );
        Ok(note)
    }

    async fn claim_pending(&self, id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "UPDATE notes SET status = 'processing', updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut note = note_from_row(&row)?;
        note.tags = self
            .tags_for_notes(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        debug!(
            subsystem = "database",
            component = "notes",
            op = "claim_pending",
            note_id = %id,
            "Note claimed"
        );
        Ok(Some(note))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notes WHERE user_id = $1 ORDER BY created_at DESC, id",
            NOTE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut notes = rows
            .iter()
            .map(note_from_row)
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        let mut tags = self.tags_for_notes(&ids).await?;
        for note in &mut notes {
            note.tags = tags.remove(&note.id).unwrap_or_default();
        }
        Ok(notes)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }
}
