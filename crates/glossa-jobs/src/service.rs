//! Note submission and owner-scoped access.

use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use glossa_core::{
    Error, Note, NoteRepository, OperationContext, Result, Task, TaskQueue, UserRepository,
};

/// Front door for note creation and retrieval.
///
/// Submitting persists a pending note and hands a [`Task`] to the queue;
/// the worker pool moves it to a terminal state later.
#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
    users: Arc<dyn UserRepository>,
    queue: Arc<dyn TaskQueue>,
}

impl NoteService {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        users: Arc<dyn UserRepository>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            notes,
            users,
            queue,
        }
    }

    /// Create a pending note and queue it for enrichment.
    ///
    /// If the enqueue fails the note is left pending and `Error::Queue`
    /// is returned.
    #[instrument(
        skip(self, ctx, text),
        fields(subsystem = "jobs", component = "service", op = "submit", %user_id)
    )]
    pub async fn submit(&self, ctx: &OperationContext, user_id: Uuid, text: &str) -> Result<Note> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("note text must not be empty".to_string()));
        }
        ctx.check()?;

        let user = self.users.get_by_id(user_id).await?;
        let note = self.notes.create(Note::new(user_id, text)).await?;
        let task = Task::for_note(&note, &user);

        if let Err(e) = self.queue.enqueue(&task).await {
            error!(
                note_id = %note.id,
                error = %e,
                "Failed to enqueue task, note left pending"
            );
            return Err(match e {
                Error::Queue(msg) => Error::Queue(msg),
                other => Error::Queue(other.to_string()),
            });
        }

        info!(note_id = %note.id, "Note submitted");
        Ok(note)
    }

    /// Fetch a note owned by `user_id`.
    pub async fn get(&self, user_id: Uuid, note_id: Uuid) -> Result<Note> {
        let note = self.notes.get(note_id).await?;
        ensure_owner(&note, user_id)?;
        Ok(note)
    }

    /// All of a user's notes, newest first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Note>> {
        self.notes.list_by_user(user_id).await
    }

    /// Delete a note owned by `user_id`.
    pub async fn delete(&self, user_id: Uuid, note_id: Uuid) -> Result<()> {
        let note = self.notes.get(note_id).await?;
        ensure_owner(&note, user_id)?;
        self.notes.delete(note_id).await?;
        info!(%note_id, "Note deleted");
        Ok(())
    }
}

fn ensure_owner(note: &Note, user_id: Uuid) -> Result<()> {
    if note.user_id != user_id {
        return Err(Error::Forbidden(format!(
            "note {} belongs to another user",
            note.id
        )));
    }
    Ok(())
}
