//! Open cases within a single region.
//!
//! The view never talks to the network itself: every operation returns the
//! [`BackendCall`]s to issue, and responses come back through `on_*`
//! handlers tagged with the epoch they were requested under. The epoch is
//! bumped whenever the list is reset, so a page requested before a reset
//! can no longer land in the fresh list.

use tracing::{debug, warn};

use crate::backend::BackendCall;
use crate::capabilities::{PageCursor, PageQuery};
use crate::model::{CaseSlim, Eligibility, Region, Route, Username, ViewId};
use crate::PAGE_SIZE;

#[derive(Debug, Default)]
pub struct RegionCaseView {
    region: Option<Region>,
    cases: Vec<CaseSlim>,
    more: bool,
    can_create_case: bool,
    epoch: u64,
}

impl RegionCaseView {
    #[must_use]
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    #[must_use]
    pub fn cases(&self) -> &[CaseSlim] {
        &self.cases
    }

    /// True iff the last page was full. A final page of exactly
    /// [`PAGE_SIZE`] cases still reports more.
    #[must_use]
    pub fn more(&self) -> bool {
        self.more
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

    /// Route parameters changed: resolve the region and start over at offset 0.
    pub fn navigate(&mut self, region: Region, username: Option<&Username>) -> Vec<BackendCall> {
        debug!(region = %region, "region view navigated");
        self.region = Some(region.clone());
        self.reset();

        let mut calls: Vec<BackendCall> = self.next_batch(username).into_iter().collect();
        calls.extend(self.can_ask_question(region, username));
        calls
    }

    /// Next page, offset by the number of cases already held.
    #[must_use]
    pub fn next_batch(&self, username: Option<&Username>) -> Option<BackendCall> {
        let region = self.region.clone()?;
        Some(BackendCall::OpenCases {
            view: ViewId::Region,
            epoch: self.epoch,
            query: PageQuery {
                cursor: PageCursor::Offset(self.cases.len()),
                region: Some(region),
                username: username.cloned(),
            },
        })
    }

    /// Re-resolves the region; eligibility is only asked for signed-in users.
    pub fn can_ask_question(
        &mut self,
        region: Region,
        username: Option<&Username>,
    ) -> Option<BackendCall> {
        self.region = Some(region.clone());
        username?;
        Some(BackendCall::CanCreateCase {
            view: ViewId::Region,
            epoch: self.epoch,
            region,
        })
    }

    /// Returns false when the page was dropped as stale.
    pub fn on_page(&mut self, epoch: u64, page: Option<Vec<CaseSlim>>) -> bool {
        if epoch != self.epoch {
            warn!(epoch, current = self.epoch, "dropping stale case page");
            return false;
        }

        match page {
            Some(page) => {
                self.more = page.len() == PAGE_SIZE;
                debug!(received = page.len(), held = self.cases.len(), "case page appended");
                self.cases.extend(page);
            }
            None => self.more = false,
        }
        true
    }

    pub fn on_eligibility(&mut self, epoch: u64, eligibility: &Eligibility) -> bool {
        if epoch != self.epoch {
            warn!(epoch, current = self.epoch, "dropping stale eligibility result");
            return false;
        }
        self.can_create_case = eligibility.is_success();
        true
    }

    /// Sign-in and sign-out both change which cases are relevant, so the
    /// list starts over and eligibility is asked again.
    pub fn session_changed(&mut self, username: Option<&Username>) -> Vec<BackendCall> {
        self.reset();
        let mut calls: Vec<BackendCall> = self.next_batch(username).into_iter().collect();
        if let Some(region) = self.region.clone() {
            calls.extend(self.can_ask_question(region, username));
        }
        calls
    }

    /// Where "ask a question" leads, when allowed.
    #[must_use]
    pub fn ask_question_route(&self) -> Option<Route> {
        if !self.can_create_case {
            return None;
        }
        self.region.clone().map(|region| Route::Ask { region })
    }

    fn reset(&mut self) {
        self.cases.clear();
        self.more = false;
        self.can_create_case = false;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn region(name: &str) -> Region {
        Region::new(name).unwrap()
    }

    fn user() -> Username {
        Username::new("thomas").unwrap()
    }

    fn page(start: i64, len: usize) -> Vec<CaseSlim> {
        (0..len)
            .map(|i| CaseSlim {
                id: crate::model::CaseId(start + i as i64),
                subject: format!("case {}", start + i as i64),
                positive: 1,
                votes: 2,
                region: region("norge"),
                created: Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap(),
            })
            .collect()
    }

    fn offset_of(call: &BackendCall) -> usize {
        match call {
            BackendCall::OpenCases {
                query:
                    PageQuery {
                        cursor: PageCursor::Offset(offset),
                        ..
                    },
                ..
            } => *offset,
            other => panic!("expected an offset page request, got {other:?}"),
        }
    }

    #[test]
    fn navigate_fetches_first_page_and_eligibility() {
        let mut view = RegionCaseView::default();
        let calls = view.navigate(region("norge"), Some(&user()));

        assert_eq!(calls.len(), 2);
        assert_eq!(offset_of(&calls[0]), 0);
        assert!(matches!(
            &calls[1],
            BackendCall::CanCreateCase { region, .. } if region.as_str() == "norge"
        ));
    }

    #[test]
    fn anonymous_navigation_skips_eligibility() {
        let mut view = RegionCaseView::default();
        let calls = view.navigate(region("norge"), None);
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            BackendCall::OpenCases { query, .. } => assert!(query.username.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn next_batch_without_region_is_none() {
        let view = RegionCaseView::default();
        assert!(view.next_batch(Some(&user())).is_none());
    }

    #[test]
    fn pages_append_and_offset_grows() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), None);
        let epoch = view.epoch();

        assert!(view.on_page(epoch, Some(page(0, PAGE_SIZE))));
        assert!(view.more());
        assert_eq!(offset_of(&view.next_batch(None).unwrap()), PAGE_SIZE);

        assert!(view.on_page(epoch, Some(page(25, 3))));
        assert!(!view.more());
        assert_eq!(view.cases().len(), PAGE_SIZE + 3);
        assert_eq!(view.cases()[25].id.get(), 25);
    }

    #[test]
    fn exact_multiple_still_reports_more() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), None);
        view.on_page(view.epoch(), Some(page(0, PAGE_SIZE)));
        // The backend has nothing else, but a full page cannot tell.
        assert!(view.more());
        view.on_page(view.epoch(), Some(Vec::new()));
        assert!(!view.more());
        assert_eq!(view.cases().len(), PAGE_SIZE);
    }

    #[test]
    fn null_page_leaves_cases_untouched() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), None);
        view.on_page(view.epoch(), Some(page(0, PAGE_SIZE)));
        assert!(view.on_page(view.epoch(), None));
        assert_eq!(view.cases().len(), PAGE_SIZE);
        assert!(!view.more());
    }

    #[test]
    fn stale_page_is_dropped_after_session_change() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), None);
        let before = view.epoch();
        view.on_page(before, Some(page(0, 10)));

        let calls = view.session_changed(Some(&user()));
        assert!(view.cases().is_empty());
        assert_eq!(calls.len(), 2);
        assert_eq!(offset_of(&calls[0]), 0);

        assert!(!view.on_page(before, Some(page(10, 5))));
        assert!(view.cases().is_empty());
    }

    #[test]
    fn logout_resets_eligibility_and_refetches() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), Some(&user()));
        let ok = Eligibility {
            result: crate::SUCCESS_SENTINEL.into(),
        };
        assert!(view.on_eligibility(view.epoch(), &ok));
        assert!(view.can_create_case());
        view.on_page(view.epoch(), Some(page(0, 4)));

        let calls = view.session_changed(None);
        assert!(view.cases().is_empty());
        assert!(!view.can_create_case());
        assert_eq!(calls.len(), 1);
        assert_eq!(offset_of(&calls[0]), 0);
    }

    #[test]
    fn eligibility_other_than_sentinel_is_denied() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), Some(&user()));
        view.on_eligibility(
            view.epoch(),
            &Eligibility {
                result: "NOT_ALLOWED".into(),
            },
        );
        assert!(!view.can_create_case());
        assert!(view.ask_question_route().is_none());
    }

    #[test]
    fn ask_question_route_uses_region() {
        let mut view = RegionCaseView::default();
        view.navigate(region("oslo"), Some(&user()));
        view.on_eligibility(
            view.epoch(),
            &Eligibility {
                result: "SUCCESS".into(),
            },
        );
        assert_eq!(view.ask_question_route().unwrap().path(), "/ask/oslo");
    }

    #[test]
    fn navigation_restarts_pagination() {
        let mut view = RegionCaseView::default();
        view.navigate(region("norge"), None);
        view.on_page(view.epoch(), Some(page(0, PAGE_SIZE)));

        let calls = view.navigate(region("oslo"), None);
        assert!(view.cases().is_empty());
        assert_eq!(offset_of(&calls[0]), 0);
        assert_eq!(view.region().unwrap().as_str(), "oslo");
    }

    proptest! {
        #[test]
        fn held_cases_equal_sum_of_pages(lens in proptest::collection::vec(0usize..=PAGE_SIZE, 1..12)) {
            let mut view = RegionCaseView::default();
            view.navigate(region("norge"), None);
            let mut total = 0usize;
            for (i, len) in lens.iter().enumerate() {
                let before = view.cases().len();
                view.on_page(view.epoch(), Some(page(total as i64, *len)));
                total += len;
                prop_assert_eq!(view.cases().len(), total);
                prop_assert!(view.cases().len() >= before);
                prop_assert_eq!(view.more(), *len == PAGE_SIZE, "page {}", i);
            }
        }
    }
}
