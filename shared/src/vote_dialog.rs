//! Modal dialog for creating a vote or editing an existing one.
//!
//! The dialog keeps the loose field map the form edits, but only
//! whitelisted columns ever reach the backend: `save` strips everything else
//! and validates the rest into a typed [`VoteDraft`]. The dialog closes only
//! once the backend has answered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::BackendCall;
use crate::capabilities::ApiFailure;
use crate::model::{CaseId, Notice, VoteId};
use crate::{AppError, ErrorKind};

/// Columns sent when creating; the primary key is assigned by the backend.
pub const CREATE_COLUMNS: &[&str] = &["case", "email", "user", "opinion"];
pub const UPDATE_COLUMNS: &[&str] = &["id", "case", "email", "user", "opinion"];
pub const PRIMARY_KEYS: &[&str] = &["id"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("field '{0}' is required")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("either 'email' or 'user' must identify the voter")]
    MissingSubmitter,

    #[error("column '{0}' cannot be edited")]
    NotEditable(String),

    #[error("the dialog is not accepting changes")]
    NotEditing,
}

impl From<DraftError> for AppError {
    fn from(e: DraftError) -> Self {
        let kind = match e {
            DraftError::NotEditing => ErrorKind::InvalidState,
            _ => ErrorKind::Validation,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVote {
    pub case: CaseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub opinion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteUpdate {
    pub id: VoteId,
    pub case: CaseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub opinion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDraft {
    Create(NewVote),
    Update(VoteUpdate),
}

impl VoteDraft {
    /// Validates an already-whitelisted field map.
    pub fn from_fields(mode: DialogMode, fields: &Map<String, Value>) -> Result<Self, DraftError> {
        let case = CaseId(required_i64(fields, "case")?);
        let email = optional_string(fields, "email")?;
        let user = optional_string(fields, "user")?;
        let opinion = match fields.get("opinion") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => return Err(DraftError::MissingField("opinion")),
            Some(_) => {
                return Err(DraftError::InvalidField {
                    field: "opinion",
                    expected: "a boolean",
                })
            }
        };
        if email.is_none() && user.is_none() {
            return Err(DraftError::MissingSubmitter);
        }

        Ok(match mode {
            DialogMode::Create => Self::Create(NewVote {
                case,
                email,
                user,
                opinion,
            }),
            DialogMode::Edit => Self::Update(VoteUpdate {
                id: VoteId(required_i64(fields, "id")?),
                case,
                email,
                user,
                opinion,
            }),
        })
    }
}

fn required_i64(fields: &Map<String, Value>, field: &'static str) -> Result<i64, DraftError> {
    match fields.get(field) {
        Some(Value::Null) | None => Err(DraftError::MissingField(field)),
        Some(value) => value.as_i64().ok_or(DraftError::InvalidField {
            field,
            expected: "an integer",
        }),
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, DraftError> {
    match fields.get(field) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(DraftError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

/// Body returned by the create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: VoteId,
}

/// Body returned by the update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(rename = "updated-records")]
    pub updated_records: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialogResult {
    Saved(Map<String, Value>),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogState {
    Editing,
    Saving,
    Closed(DialogResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteEditDialog {
    mode: DialogMode,
    entity: Map<String, Value>,
    state: DialogState,
}

impl VoteEditDialog {
    /// `entity` is empty when creating.
    #[must_use]
    pub fn open(is_edit: bool, entity: Map<String, Value>) -> Self {
        let mode = if is_edit {
            DialogMode::Edit
        } else {
            DialogMode::Create
        };
        Self {
            mode,
            entity,
            state: DialogState::Editing,
        }
    }

    #[must_use]
    pub fn is_edit(&self) -> bool {
        self.mode == DialogMode::Edit
    }

    #[must_use]
    pub fn entity(&self) -> &Map<String, Value> {
        &self.entity
    }

    #[must_use]
    pub fn state(&self) -> &DialogState {
        &self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, DialogState::Closed(_))
    }

    #[must_use]
    pub fn result(&self) -> Option<&DialogResult> {
        match &self.state {
            DialogState::Closed(result) => Some(result),
            _ => None,
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self.mode {
            DialogMode::Create => CREATE_COLUMNS,
            DialogMode::Edit => UPDATE_COLUMNS,
        }
    }

    #[must_use]
    pub fn can_edit_column(&self, name: &str) -> bool {
        let listed = self.columns().contains(&name);
        match self.mode {
            DialogMode::Edit => listed && !PRIMARY_KEYS.contains(&name),
            DialogMode::Create => listed,
        }
    }

    #[must_use]
    pub fn editable_columns(&self) -> Vec<&'static str> {
        self.columns()
            .iter()
            .copied()
            .filter(|c| self.can_edit_column(c))
            .collect()
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), DraftError> {
        if self.state != DialogState::Editing {
            return Err(DraftError::NotEditing);
        }
        if !self.can_edit_column(name) {
            return Err(DraftError::NotEditable(name.to_string()));
        }
        self.entity.insert(name.to_string(), value);
        Ok(())
    }

    /// Strips non-whitelisted fields and returns the call to issue.
    pub fn save(&mut self) -> Result<BackendCall, DraftError> {
        if self.state != DialogState::Editing {
            return Err(DraftError::NotEditing);
        }

        let columns = self.columns();
        self.entity.retain(|name, _| columns.contains(&name.as_str()));

        let call = match VoteDraft::from_fields(self.mode, &self.entity)? {
            VoteDraft::Create(vote) => BackendCall::CreateVote(vote),
            VoteDraft::Update(vote) => BackendCall::UpdateVote(vote),
        };
        self.state = DialogState::Saving;
        Ok(call)
    }

    /// Closes on any answer from the backend; a count other than one closes
    /// with a warning. Transport failures keep the dialog open.
    pub fn on_updated(&mut self, result: Result<UpdateResponse, ApiFailure>) -> Option<Notice> {
        if self.state != DialogState::Saving || self.mode != DialogMode::Edit {
            warn!(state = ?self.state, "unexpected update response for vote dialog");
            return None;
        }

        match result {
            Ok(response) => {
                self.close_saved();
                if response.updated_records == 1 {
                    info!("vote updated");
                    None
                } else {
                    warn!(updated = response.updated_records, "vote update touched unexpected record count");
                    Some(Notice::warning(format!(
                        "Expected exactly 1 updated record, but the backend reported {}",
                        response.updated_records
                    )))
                }
            }
            Err(failure) => Some(self.reopen(&failure)),
        }
    }

    pub fn on_created(
        &mut self,
        result: Result<Option<CreatedRecord>, ApiFailure>,
    ) -> Option<Notice> {
        if self.state != DialogState::Saving || self.mode != DialogMode::Create {
            warn!(state = ?self.state, "unexpected create response for vote dialog");
            return None;
        }

        match result {
            Ok(Some(record)) => {
                info!(id = %record.id, "vote created");
                self.close_saved();
                None
            }
            Ok(None) => {
                warn!("vote create returned no record");
                self.close_saved();
                Some(Notice::warning("The backend returned no record for the new vote"))
            }
            Err(failure) => Some(self.reopen(&failure)),
        }
    }

    pub fn cancel(&mut self) {
        self.state = DialogState::Closed(DialogResult::Cancelled);
    }

    /// Back to editing when the save request never left the core.
    pub fn abort_save(&mut self) {
        if self.state == DialogState::Saving {
            warn!("vote save was not sent");
            self.state = DialogState::Editing;
        }
    }

    fn close_saved(&mut self) {
        self.state = DialogState::Closed(DialogResult::Saved(self.entity.clone()));
    }

    fn reopen(&mut self, failure: &ApiFailure) -> Notice {
        warn!(error = %failure, "vote save failed");
        self.state = DialogState::Editing;
        Notice::error(failure.message.clone())
    }
}
