use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{CaseId, Region, Username};
use crate::{AppError, AppResult, ErrorKind};

pub const OPEN_CASES_PATH: &str = "public/open-cases";
pub const CAN_CREATE_CASE_PATH: &str = "public/can-create-case";
pub const MY_REGIONS_PATH: &str = "users/my-regions";
pub const VOTES_PATH: &str = "admin/votes";

/// Where the next page of cases starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageCursor {
    Start,
    Offset(usize),
    After(CaseId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub cursor: PageCursor,
    pub region: Option<Region>,
    pub username: Option<Username>,
}

/// URL builder for the backend endpoints, rooted at the configured API base.
#[derive(Debug, Clone, Copy)]
pub struct Routes<'a> {
    base: &'a Url,
}

impl<'a> Routes<'a> {
    #[must_use]
    pub fn new(base: &'a Url) -> Self {
        Self { base }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base.join(path).map_err(|e| {
            AppError::new(ErrorKind::Configuration, "invalid backend endpoint")
                .with_internal(e.to_string())
                .with_context("path", path)
        })
    }

    pub fn open_cases(&self, query: &PageQuery) -> AppResult<Url> {
        let mut url = self.endpoint(OPEN_CASES_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            match &query.cursor {
                PageCursor::Start => {}
                PageCursor::Offset(offset) => {
                    pairs.append_pair("offset", &offset.to_string());
                }
                PageCursor::After(id) => {
                    pairs.append_pair("from", &id.to_string());
                }
            }
            if let Some(region) = &query.region {
                pairs.append_pair("region", region.as_str());
            }
            if let Some(username) = &query.username {
                pairs.append_pair("username", username.as_str());
            }
        }
        Ok(strip_empty_query(url))
    }

    pub fn can_create_case(&self, region: &Region) -> AppResult<Url> {
        let mut url = self.endpoint(CAN_CREATE_CASE_PATH)?;
        url.query_pairs_mut().append_pair("region", region.as_str());
        Ok(url)
    }

    pub fn my_regions(&self) -> AppResult<Url> {
        self.endpoint(MY_REGIONS_PATH)
    }

    pub fn votes(&self) -> AppResult<Url> {
        self.endpoint(VOTES_PATH)
    }
}

// query_pairs_mut leaves a dangling '?' when nothing was appended.
fn strip_empty_query(mut url: Url) -> Url {
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}

/// A failed backend call, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_status(status: u16, body: Option<&[u8]>) -> Self {
        let error = AppError::from_http_status(status, body);
        Self {
            status: Some(status),
            message: error.message,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.status.map_or(ErrorKind::Network, ErrorKind::from_status)
    }
}

impl From<crux_http::Error> for ApiFailure {
    fn from(error: crux_http::Error) -> Self {
        match error {
            crux_http::Error::Http(error) => {
                let status: u16 = error.code.into();
                match error.body.as_deref() {
                    Some(bytes) => Self::from_status(status, Some(bytes)),
                    None => Self {
                        status: Some(status),
                        message: error.message,
                    },
                }
            }
            other => Self::transport(other.to_string()),
        }
    }
}

impl From<ApiFailure> for AppError {
    fn from(failure: ApiFailure) -> Self {
        let kind = failure.kind();
        let error = AppError::new(kind, failure.message);
        match failure.status {
            Some(status) => error.with_context("http_status", status.to_string()),
            None => error,
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
