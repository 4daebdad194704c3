use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::config::AppConfig;
use crate::home::HomeFeed;
use crate::region::RegionCaseView;
use crate::session::Session;
use crate::vote_dialog::{DialogResult, VoteEditDialog};
use crate::{MAX_NOTICES, NOTICE_DURATION_MS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} is too long ({len} > {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

// --- Typed IDs ---

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(CaseId);
numeric_id!(VoteId);

macro_rules! string_key {
    ($name:ident, $field:literal, $max:expr) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
                let s = s.into();
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Empty { field: $field });
                }
                if trimmed.len() > $max {
                    return Err(ValidationError::TooLong {
                        field: $field,
                        len: trimmed.len(),
                        max: $max,
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_key!(Region, "region", 128);
string_key!(Username, "username", 256);

impl Region {
    #[must_use]
    pub fn home_default() -> Self {
        Self(crate::DEFAULT_HOME_REGION.to_string())
    }
}

/// Case as returned by the open-cases listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CaseSlim {
    pub id: CaseId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub positive: u32,
    #[serde(default)]
    pub votes: u32,
    pub region: Region,
    pub created: DateTime<Utc>,
}

impl CaseSlim {
    /// `"{positive}/{negative}"`, as shown next to each case.
    #[must_use]
    pub fn tally(&self) -> String {
        format!("{}/{}", self.positive, self.votes.saturating_sub(self.positive))
    }
}

/// Backend answer to "may I create a case here?".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Eligibility {
    pub result: String,
}

impl Eligibility {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == crate::SUCCESS_SENTINEL
    }
}

/// Views that can subscribe to session changes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewId {
    Home,
    Region,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    Region { region: Region },
    Ask { region: Region },
    NotFound { path: String },
}

impl Route {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let not_found = || Self::NotFound {
            path: path.to_string(),
        };

        match segments.as_slice() {
            [] => Self::Home,
            ["region", region] => decode_region(region)
                .map(|region| Self::Region { region })
                .unwrap_or_else(not_found),
            ["ask", region] => decode_region(region)
                .map(|region| Self::Ask { region })
                .unwrap_or_else(not_found),
            _ => not_found(),
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Region { region } => format!("/region/{region}"),
            Self::Ask { region } => format!("/ask/{region}"),
            Self::NotFound { path } => path.clone(),
        }
    }

    #[must_use]
    pub fn view(&self) -> Option<ViewId> {
        match self {
            Self::Home => Some(ViewId::Home),
            Self::Region { .. } => Some(ViewId::Region),
            Self::Ask { .. } | Self::NotFound { .. } => None,
        }
    }
}

// Shells hand over the raw location path, so non-ASCII region names arrive
// percent-encoded.
fn decode_region(segment: &str) -> Option<Region> {
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    Region::new(decoded.into_owned()).ok()
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible transient message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub duration_ms: u64,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, message)
    }

    fn with_level(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            duration_ms: NOTICE_DURATION_MS,
        }
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: Option<AppConfig>,
    pub now: DateTime<Utc>,
    pub session: Session,
    pub route: Route,
    pub home: HomeFeed,
    pub region: RegionCaseView,
    pub vote_dialog: Option<VoteEditDialog>,
    pub last_dialog_result: Option<DialogResult>,
    pub notices: VecDeque<Notice>,
    /// Set when the session changed before storage was configured.
    pub session_unsynced: bool,
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.now = Utc::now();
    }

    /// Oldest notices are dropped once the queue is full.
    pub fn push_notice(&mut self, notice: Notice) {
        while self.notices.len() >= MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    #[must_use]
    pub fn username(&self) -> Option<&Username> {
        self.session.username_at(self.now)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CaseView {
    pub id: i64,
    pub subject: String,
    pub region: String,
    pub tally: String,
    pub created_label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DialogView {
    pub is_edit: bool,
    pub saving: bool,
    pub editable_columns: Vec<String>,
    pub entity: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ViewModel {
    pub route: String,
    pub logged_in: bool,
    pub username: Option<String>,
    pub region: Option<String>,
    pub cases: Vec<CaseView>,
    pub has_no_cases: bool,
    pub more: bool,
    pub can_create_case: bool,
    pub my_regions: Vec<String>,
    pub dialog: Option<DialogView>,
    pub notices: Vec<Notice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_parsing() {
        assert_eq!(Route::from_path("/"), Route::Home);
        assert_eq!(Route::from_path(""), Route::Home);
        assert_eq!(
            Route::from_path("/region/norge"),
            Route::Region {
                region: Region::new("norge").unwrap()
            }
        );
        assert_eq!(
            Route::from_path("/ask/oslo/"),
            Route::Ask {
                region: Region::new("oslo").unwrap()
            }
        );
        assert!(matches!(Route::from_path("/region"), Route::NotFound { .. }));
        assert!(matches!(Route::from_path("/admin/votes"), Route::NotFound { .. }));
    }

    #[test]
    fn route_segments_are_percent_decoded() {
        assert_eq!(
            Route::from_path("/region/s%C3%B8r-tr%C3%B8ndelag"),
            Route::Region {
                region: Region::new("sør-trøndelag").unwrap()
            }
        );
        assert_eq!(
            Route::from_path("/ask/m%C3%B8re%20og%20romsdal"),
            Route::Ask {
                region: Region::new("møre og romsdal").unwrap()
            }
        );
        // invalid UTF-8 after decoding
        assert!(matches!(
            Route::from_path("/region/%FF%FE"),
            Route::NotFound { .. }
        ));
    }

    #[test]
    fn route_path_matches_parse() {
        let route = Route::Region {
            region: Region::new("viken").unwrap(),
        };
        assert_eq!(Route::from_path(&route.path()), route);
    }

    #[test]
    fn region_rejects_blank() {
        assert_eq!(
            Region::new("   "),
            Err(ValidationError::Empty { field: "region" })
        );
        assert_eq!(Region::new(" oslo ").unwrap().as_str(), "oslo");
        assert!(matches!(
            Username::new("x".repeat(300)),
            Err(ValidationError::TooLong { max: 256, .. })
        ));
    }

    #[test]
    fn tally_shows_positive_over_negative() {
        let case: CaseSlim = serde_json::from_value(serde_json::json!({
            "id": 7,
            "subject": "New bridge?",
            "positive": 12,
            "votes": 20,
            "region": "norge",
            "created": "2020-03-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(case.tally(), "12/8");
    }

    #[test]
    fn eligibility_requires_exact_sentinel() {
        let ok = Eligibility {
            result: "SUCCESS".into(),
        };
        let lower = Eligibility {
            result: "success".into(),
        };
        assert!(ok.is_success());
        assert!(!lower.is_success());
    }

    #[test]
    fn notice_queue_is_bounded() {
        let mut model = Model::default();
        for i in 0..(MAX_NOTICES + 2) {
            model.push_notice(Notice::info(format!("n{i}")));
        }
        assert_eq!(model.notices.len(), MAX_NOTICES);
        assert_eq!(model.notices.front().unwrap().message, "n2");
    }
}
