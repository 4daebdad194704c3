use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::capabilities::{ApiFailure, StoredSession};
use crate::config::StartupConfig;
use crate::model::{CaseSlim, Eligibility, Region, ViewId};
use crate::vote_dialog::{CreatedRecord, UpdateResponse};

#[derive(Deserialize, Debug)]
pub enum Event {
    // --- Shell ---
    Started(StartupConfig),
    Navigated {
        path: String,
    },
    LoggedIn {
        username: String,
        token: SecretString,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
    LoggedOut,
    LoadMore,
    AskQuestion,
    OpenVoteDialog {
        is_edit: bool,
        #[serde(default)]
        entity: Map<String, Value>,
    },
    EditVoteField {
        name: String,
        value: Value,
    },
    SaveVote,
    CancelVote,
    DismissNotice,

    // --- Capability responses ---
    #[serde(skip)]
    SessionRestored(Option<StoredSession>),
    #[serde(skip)]
    SessionPersisted {
        ok: bool,
    },
    #[serde(skip)]
    CasesLoaded {
        view: ViewId,
        epoch: u64,
        result: Result<Option<Vec<CaseSlim>>, ApiFailure>,
    },
    #[serde(skip)]
    EligibilityLoaded {
        view: ViewId,
        epoch: u64,
        result: Result<Eligibility, ApiFailure>,
    },
    #[serde(skip)]
    RegionsLoaded {
        epoch: u64,
        result: Result<Option<Vec<Region>>, ApiFailure>,
    },
    #[serde(skip)]
    VoteCreated(Result<Option<CreatedRecord>, ApiFailure>),
    #[serde(skip)]
    VoteUpdated(Result<UpdateResponse, ApiFailure>),
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started(_) => "started",
            Self::Navigated { .. } => "navigated",
            Self::LoggedIn { .. } => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::LoadMore => "load_more",
            Self::AskQuestion => "ask_question",
            Self::OpenVoteDialog { .. } => "open_vote_dialog",
            Self::EditVoteField { .. } => "edit_vote_field",
            Self::SaveVote => "save_vote",
            Self::CancelVote => "cancel_vote",
            Self::DismissNotice => "dismiss_notice",
            Self::SessionRestored(_) => "session_restored",
            Self::SessionPersisted { .. } => "session_persisted",
            Self::CasesLoaded { .. } => "cases_loaded",
            Self::EligibilityLoaded { .. } => "eligibility_loaded",
            Self::RegionsLoaded { .. } => "regions_loaded",
            Self::VoteCreated(_) => "vote_created",
            Self::VoteUpdated(_) => "vote_updated",
        }
    }

    #[must_use]
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::Navigated { .. }
                | Self::LoadMore
                | Self::AskQuestion
                | Self::OpenVoteDialog { .. }
                | Self::EditVoteField { .. }
                | Self::SaveVote
                | Self::CancelVote
                | Self::DismissNotice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_events_deserialize() {
        let event: Event =
            serde_json::from_str(r#"{"Navigated":{"path":"/region/norge"}}"#).unwrap();
        assert_eq!(event.name(), "navigated");
        assert!(event.is_user_initiated());

        let event: Event = serde_json::from_str(
            r#"{"LoggedIn":{"username":"thomas","token":"a.b.c"}}"#,
        )
        .unwrap();
        assert!(!event.is_user_initiated());
        assert!(!format!("{event:?}").contains("a.b.c"));
    }

    #[test]
    fn internal_events_cannot_come_from_the_shell() {
        let result = serde_json::from_str::<Event>(r#"{"VoteUpdated":{"Ok":{"updated-records":1}}}"#);
        assert!(result.is_err());
    }
}
