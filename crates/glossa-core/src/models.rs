//! Core data models for glossa.
//!
//! These types are shared across all glossa crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// NOTE TYPES
// =============================================================================

/// Lifecycle status of a note.
///
/// `Pending` is set at submission; only a worker moves a note forward.
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl NoteStatus {
    /// Whether no further automatic transition can leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: NoteStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoteStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid note status: {}", s)),
        }
    }
}

/// A tag attached to a note. Names are unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

impl Tag {
    /// An unsaved tag; the store resolves the id by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
        }
    }
}

/// A learner's note and its enrichment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_text: String,
    /// Set only once the note is `Completed`.
    pub generated_content: Option<String>,
    pub status: NoteStatus,
    /// Set only once the note is `Failed`.
    pub error_message: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a new pending note.
    pub fn new(user_id: Uuid, original_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            original_text: original_text.into(),
            generated_content: None,
            status: NoteStatus::Pending,
            error_message: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: NoteStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition(format!(
                "note {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Pending -> Processing.
    pub fn mark_processing(&mut self) -> Result<()> {
        self.transition(NoteStatus::Processing)
    }

    /// Processing -> Completed with the generated content and one tag per name.
    ///
    /// Duplicate names are collapsed, keeping first-seen order.
    pub fn complete<I, S>(&mut self, content: impl Into<String>, tag_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transition(NoteStatus::Completed)?;
        let mut tags: Vec<Tag> = Vec::new();
        for name in tag_names {
            let name = name.into();
            if !tags.iter().any(|t| t.name == name) {
                tags.push(Tag::named(name));
            }
        }
        self.generated_content = Some(content.into());
        self.tags = tags;
        self.error_message = None;
        Ok(())
    }

    /// Pending/Processing -> Failed with a human-readable reason.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(NoteStatus::Failed)?;
        self.error_message = Some(message.into());
        self.generated_content = None;
        self.tags.clear();
        Ok(())
    }

    /// Tag names in stored order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

// =============================================================================
// TASK TYPES
// =============================================================================

/// A unit of queued enrichment work for one note.
///
/// Immutable once enqueued. The JSON form is the queue payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub note_id: Uuid,
    pub original_text: String,
    pub user_id: Uuid,
    pub native_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build the task for a freshly created note and its owner's language pair.
    pub fn for_note(note: &Note, user: &User) -> Self {
        Self {
            note_id: note.id,
            original_text: note.original_text.clone(),
            user_id: note.user_id,
            native_language: user.native_language.clone(),
            target_language: user.target_language.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Output of the response parser: explanatory content plus tag names.
///
/// Never persisted directly; folded into a [`Note`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedContent {
    pub content: String,
    pub tags: Vec<String>,
}

// =============================================================================
// USER TYPES
// =============================================================================

/// A learner. Only the language pair is consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub native_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        native_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            native_language: native_language.into(),
            target_language: target_language.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
