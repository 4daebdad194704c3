//! Landing feed: open cases across all regions, paged by the id of the
//! last case held.

use tracing::warn;

use crate::backend::BackendCall;
use crate::capabilities::{PageCursor, PageQuery};
use crate::model::{CaseSlim, Eligibility, Region, Username, ViewId};
use crate::PAGE_SIZE;

#[derive(Debug, Default)]
pub struct HomeFeed {
    cases: Vec<CaseSlim>,
    more: bool,
    regions: Vec<Region>,
    can_create_case: bool,
    epoch: u64,
}

impl HomeFeed {
    #[must_use]
    pub fn cases(&self) -> &[CaseSlim] {
        &self.cases
    }

    #[must_use]
    pub fn more(&self) -> bool {
        self.more
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[must_use]
    pub fn can_create_case(&self) -> bool {
        self.can_create_case
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn has_no_cases(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn activate(
        &mut self,
        username: Option<&Username>,
        home_region: &Region,
    ) -> Vec<BackendCall> {
        self.cases.clear();
        self.regions.clear();
        self.more = false;
        self.can_create_case = false;
        self.epoch = self.epoch.wrapping_add(1);

        let mut calls = vec![BackendCall::OpenCases {
            view: ViewId::Home,
            epoch: self.epoch,
            query: PageQuery {
                cursor: PageCursor::Start,
                region: None,
                username: None,
            },
        }];

        if username.is_some() {
            calls.push(BackendCall::MyRegions { epoch: self.epoch });
            calls.push(BackendCall::CanCreateCase {
                view: ViewId::Home,
                epoch: self.epoch,
                region: home_region.clone(),
            });
        }
        calls
    }

    /// Cases after the last one held; nothing to page from when empty.
    #[must_use]
    pub fn get_more(&self) -> Option<BackendCall> {
        let last = self.cases.last()?;
        Some(BackendCall::OpenCases {
            view: ViewId::Home,
            epoch: self.epoch,
            query: PageQuery {
                cursor: PageCursor::After(last.id),
                region: None,
                username: None,
            },
        })
    }

    pub fn on_page(&mut self, epoch: u64, page: Option<Vec<CaseSlim>>) -> bool {
        if epoch != self.epoch {
            warn!(epoch, current = self.epoch, "dropping stale home page");
            return false;
        }
        match page {
            Some(page) => {
                self.more = page.len() == PAGE_SIZE;
                self.cases.extend(page);
            }
            None => self.more = false,
        }
        true
    }

    pub fn on_regions(&mut self, epoch: u64, regions: Option<Vec<Region>>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.regions = regions.unwrap_or_default();
        true
    }

    pub fn on_eligibility(&mut self, epoch: u64, eligibility: &Eligibility) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.can_create_case = eligibility.is_success();
        true
    }

    pub fn session_changed(
        &mut self,
        username: Option<&Username>,
        home_region: &Region,
    ) -> Vec<BackendCall> {
        self.activate(username, home_region)
    }
}
