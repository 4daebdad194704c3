//! Backend client: turns the views' [`BackendCall`]s into HTTP requests and
//! maps each response back into an [`Event`].

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::{ApiFailure, Http, PageQuery, Routes};
use crate::config::AppConfig;
use crate::event::Event;
use crate::model::{CaseSlim, Eligibility, Region, ViewId};
use crate::vote_dialog::{CreatedRecord, NewVote, UpdateResponse, VoteUpdate};
use crate::{AppError, AppResult, ErrorKind};

/// A request a view wants issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendCall {
    OpenCases {
        view: ViewId,
        epoch: u64,
        query: PageQuery,
    },
    CanCreateCase {
        view: ViewId,
        epoch: u64,
        region: Region,
    },
    MyRegions {
        epoch: u64,
    },
    CreateVote(NewVote),
    UpdateVote(VoteUpdate),
}

pub struct Backend<'a> {
    http: &'a Http<Event>,
    routes: Routes<'a>,
    token: Option<&'a SecretString>,
}

impl<'a> Backend<'a> {
    #[must_use]
    pub fn new(http: &'a Http<Event>, config: &'a AppConfig, token: Option<&'a SecretString>) -> Self {
        Self {
            http,
            routes: Routes::new(config.api_base()),
            token,
        }
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    pub fn dispatch(&self, call: BackendCall) -> AppResult<()> {
        match call {
            BackendCall::OpenCases { view, epoch, query } => {
                let url = self.routes.open_cases(&query)?;
                debug!(?view, epoch, url = %url, "fetching open cases");

                let mut builder = self.http.get(url.as_str());
                if let Some(bearer) = self.bearer() {
                    builder = builder.header("Authorization", bearer.as_str());
                }
                builder
                    .expect_json::<Option<Vec<CaseSlim>>>()
                    .send(move |result| Event::CasesLoaded {
                        view,
                        epoch,
                        result: json_body(result).map(Option::flatten),
                    });
            }

            BackendCall::CanCreateCase {
                view,
                epoch,
                region,
            } => {
                let url = self.routes.can_create_case(&region)?;
                debug!(?view, epoch, region = %region, "checking case creation eligibility");

                let mut builder = self.http.get(url.as_str());
                if let Some(bearer) = self.bearer() {
                    builder = builder.header("Authorization", bearer.as_str());
                }
                builder
                    .expect_json::<Eligibility>()
                    .send(move |result| Event::EligibilityLoaded {
                        view,
                        epoch,
                        result: json_body(result).and_then(|body| {
                            body.ok_or_else(|| ApiFailure::transport("empty eligibility response"))
                        }),
                    });
            }

            BackendCall::MyRegions { epoch } => {
                let url = self.routes.my_regions()?;
                let mut builder = self.http.get(url.as_str());
                if let Some(bearer) = self.bearer() {
                    builder = builder.header("Authorization", bearer.as_str());
                }
                builder
                    .expect_json::<Option<Vec<Region>>>()
                    .send(move |result| Event::RegionsLoaded {
                        epoch,
                        result: json_body(result).map(Option::flatten),
                    });
            }

            BackendCall::CreateVote(vote) => {
                let url = self.routes.votes()?;
                let body = encode(&vote)?;
                debug!(case = %vote.case, "creating vote");

                let mut builder = self
                    .http
                    .post(url.as_str())
                    .header("Content-Type", "application/json");
                if let Some(bearer) = self.bearer() {
                    builder = builder.header("Authorization", bearer.as_str());
                }
                builder
                    .body(body)
                    .expect_json::<Option<CreatedRecord>>()
                    .send(|result| Event::VoteCreated(json_body(result).map(Option::flatten)));
            }

            BackendCall::UpdateVote(vote) => {
                let url = self.routes.votes()?;
                let body = encode(&vote)?;
                debug!(id = %vote.id, "updating vote");

                let mut builder = self
                    .http
                    .put(url.as_str())
                    .header("Content-Type", "application/json");
                if let Some(bearer) = self.bearer() {
                    builder = builder.header("Authorization", bearer.as_str());
                }
                builder
                    .body(body)
                    .expect_json::<UpdateResponse>()
                    .send(|result| {
                        Event::VoteUpdated(json_body(result).and_then(|body| {
                            body.ok_or_else(|| ApiFailure::transport("empty update response"))
                        }))
                    });
            }
        }
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> AppResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        AppError::new(ErrorKind::Serialization, "could not encode request").with_internal(e.to_string())
    })
}

fn json_body<T>(
    result: crux_http::Result<crux_http::Response<T>>,
) -> Result<Option<T>, ApiFailure> {
    result
        .map(|mut response| response.take_body())
        .map_err(ApiFailure::from)
}
