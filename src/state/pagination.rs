use crate::models::PageCursors;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PageStatus {
    Idle,
    LoadingPage,
    Loaded,
    Error(String),
}

/// Soft refusal: the requested move is not possible from here. Not a failure.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NavigationLimitation {
    #[error("There is no next page")]
    NoNextPage,
    #[error("Already on the first page")]
    AlreadyOnFirstPage,
    #[error("Went back to page 1: jumping back to page {0} directly is not supported")]
    ReturnedToFirstPage(u32),
    #[error("A page is already loading")]
    Busy,
    #[error("Connect an access token and select a business first")]
    NotReady,
}

/// One listing request the view should issue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FetchPlan {
    pub generation: u64,
    pub page_number: u32,
    pub after: Option<String>,
}

/// What a date preset change needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PresetChange {
    /// Accounts are on screen: keep the list and cursors, refetch spend only.
    RefreshEnrichment,
    Refetch(FetchPlan),
    Nothing,
}

/// Client-side cursor state for one listing view.
///
/// Cursors are only valid for the business/search that produced them, so
/// every filter change drops them and starts over at page 1. Responses are
/// matched to the plan that requested them by generation; anything older is
/// dropped.
#[derive(Clone, Debug)]
pub(crate) struct CursorController {
    status: PageStatus,
    page_number: u32,
    cursors: PageCursors,
    pending: Option<FetchPlan>,
    generation: u64,
    ready: bool,
}

impl Default for CursorController {
    fn default() -> Self {
        Self {
            status: PageStatus::Idle,
            page_number: 1,
            cursors: PageCursors::default(),
            pending: None,
            generation: 0,
            ready: false,
        }
    }
}

impl CursorController {
    pub fn status(&self) -> &PageStatus {
        &self.status
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn is_loading(&self) -> bool {
        self.status == PageStatus::LoadingPage
    }

    pub fn can_go_next(&self) -> bool {
        self.status == PageStatus::Loaded && self.cursors.has_next && self.cursors.next.is_some()
    }

    pub fn can_go_previous(&self) -> bool {
        !self.is_loading() && self.page_number > 1
    }

    fn plan(&mut self, page_number: u32, after: Option<String>) -> FetchPlan {
        self.generation = self.generation.saturating_add(1);
        let plan = FetchPlan {
            generation: self.generation,
            page_number,
            after,
        };
        self.status = PageStatus::LoadingPage;
        self.pending = Some(plan.clone());
        plan
    }

    /// Token and business availability changed. Loads page 1 the first time
    /// both are present.
    pub fn start(&mut self, has_token: bool, has_business: bool) -> Option<FetchPlan> {
        self.ready = has_token && has_business;
        if !self.ready {
            self.generation = self.generation.saturating_add(1);
            self.status = PageStatus::Idle;
            self.pending = None;
            self.page_number = 1;
            self.cursors = PageCursors::default();
            return None;
        }
        if self.status != PageStatus::Idle {
            return None;
        }
        Some(self.plan(1, None))
    }

    pub fn next(&mut self) -> Result<FetchPlan, NavigationLimitation> {
        if !self.ready {
            return Err(NavigationLimitation::NotReady);
        }
        if self.is_loading() {
            return Err(NavigationLimitation::Busy);
        }
        if !self.can_go_next() {
            return Err(NavigationLimitation::NoNextPage);
        }
        let cursor = self.cursors.next.clone();
        let page = self.page_number.saturating_add(1);
        Ok(self.plan(page, cursor))
    }

    /// Going back always lands on page 1 with cursors dropped. When that
    /// skips pages, the returned notice says so.
    pub fn previous(
        &mut self,
    ) -> Result<(FetchPlan, Option<NavigationLimitation>), NavigationLimitation> {
        if !self.ready {
            return Err(NavigationLimitation::NotReady);
        }
        if self.is_loading() {
            return Err(NavigationLimitation::Busy);
        }
        if self.page_number <= 1 {
            return Err(NavigationLimitation::AlreadyOnFirstPage);
        }

        let wanted = self.page_number - 1;
        let notice = (wanted > 1).then_some(NavigationLimitation::ReturnedToFirstPage(wanted));
        Ok((self.plan(1, None), notice))
    }

    /// Business or committed search changed.
    pub fn reset(&mut self) -> Option<FetchPlan> {
        self.cursors = PageCursors::default();
        self.page_number = 1;
        if !self.ready {
            self.generation = self.generation.saturating_add(1);
            self.status = PageStatus::Idle;
            self.pending = None;
            return None;
        }
        Some(self.plan(1, None))
    }

    pub fn preset_changed(&mut self) -> PresetChange {
        match self.status {
            PageStatus::Loaded => PresetChange::RefreshEnrichment,
            _ => match self.reset() {
                Some(plan) => PresetChange::Refetch(plan),
                None => PresetChange::Nothing,
            },
        }
    }

    /// Applies a listing outcome. Returns `false` when the response belongs
    /// to a superseded plan and was ignored.
    pub fn resolve(&mut self, generation: u64, result: Result<PageCursors, String>) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(plan) = self.pending.clone() else {
            return false;
        };

        match result {
            Ok(cursors) => {
                self.cursors = cursors;
                self.page_number = plan.page_number;
                self.status = PageStatus::Loaded;
                self.pending = None;
            }
            Err(message) => {
                // Keep the last good cursors and page so retry can reissue.
                self.status = PageStatus::Error(message);
            }
        }
        true
    }

    /// Reissues the plan that failed.
    pub fn retry(&mut self) -> Option<FetchPlan> {
        if !matches!(self.status, PageStatus::Error(_)) {
            return None;
        }
        let failed = self.pending.clone()?;
        Some(self.plan(failed.page_number, failed.after))
    }
}
