//! In-memory stores for tests and database-less runs.
//!
//! Semantics match the PostgreSQL repositories: whole-row replacement on
//! update, tags deduplicated by name with a stable id per name.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use glossa_core::{
    Error, Note, NoteRepository, NoteStatus, Result, Tag, User, UserRepository,
};

#[derive(Default)]
struct NoteStore {
    notes: HashMap<Uuid, Note>,
    tag_ids: HashMap<String, Uuid>,
}

impl NoteStore {
    fn resolve_tags(&mut self, tags: &[Tag]) -> Vec<Tag> {
        let mut resolved: Vec<Tag> = Vec::with_capacity(tags.len());
        for tag in tags {
            if resolved.iter().any(|t| t.name == tag.name) {
                continue;
            }
            let id = *self
                .tag_ids
                .entry(tag.name.clone())
                .or_insert_with(Uuid::new_v4);
            resolved.push(Tag {
                id,
                name: tag.name.clone(),
            });
        }
        resolved
    }
}

/// In-memory implementation of NoteRepository.
#[derive(Default)]
pub struct InMemoryNoteRepository {
    store: RwLock<NoteStore>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tag names ever stored.
    pub async fn tag_count(&self) -> usize {
        self.store.read().await.tag_ids.len()
    }

    pub async fn note_count(&self) -> usize {
        self.store.read().await.notes.len()
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn create(&self, mut note: Note) -> Result<Note> {
        let mut store = self.store.write().await;
        if store.notes.contains_key(&note.id) {
            return Err(Error::InvalidInput(format!("note {} already exists", note.id)));
        }
        note.tags = store.resolve_tags(&note.tags);
        store.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn get(&self, id: Uuid) -> Result<Note> {
        self.store
            .read()
            .await
            .notes
            .get(&id)
            .cloned()
            .ok_or(Error::NoteNotFound(id))
    }

    async fn update(&self, mut note: Note) -> Result<Note> {
        let mut store = self.store.write().await;
        if !store.notes.contains_key(&note.id) {
            return Err(Error::NoteNotFound(note.id));
        }
        note.tags = store.resolve_tags(&note.tags);
        store.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn claim_pending(&self, id: Uuid) -> Result<Option<Note>> {
        let mut store = self.store.write().await;
        match store.notes.get_mut(&id) {
            Some(note) if note.status == NoteStatus::Pending => {
                note.mark_processing()?;
                Ok(Some(note.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let store = self.store.read().await;
        let mut notes: Vec<Note> = store
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(notes)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store
            .write()
            .await
            .notes
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::NoteNotFound(id))
    }
}

/// In-memory implementation of UserRepository.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::UserNotFound(id))
    }
}
