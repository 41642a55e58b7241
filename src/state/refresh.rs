use crate::models::normalize_account_id;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

pub(crate) const SEARCH_DEBOUNCE_MS: u64 = 500;

/// Buffers search keystrokes; only the last one within the quiet period
/// is committed.
#[derive(Clone, Debug, Default)]
pub(crate) struct SearchDebounce {
    ticket: u64,
    pending: String,
    committed: String,
}

impl SearchDebounce {
    /// Records a keystroke and returns the ticket its timer must present.
    pub fn input(&mut self, text: &str) -> u64 {
        self.ticket = self.ticket.saturating_add(1);
        self.pending = text.to_string();
        self.ticket
    }

    /// Timer callback. Returns the term to commit, or `None` if a newer
    /// keystroke superseded this timer or the term did not change.
    pub fn fire(&mut self, ticket: u64) -> Option<String> {
        if ticket != self.ticket {
            return None;
        }
        let term = self.pending.trim().to_string();
        if term == self.committed {
            return None;
        }
        self.committed = term.clone();
        Some(term)
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn clear(&mut self) {
        self.ticket = self.ticket.saturating_add(1);
        self.pending.clear();
        self.committed.clear();
    }
}

/// One account's spend lookup failed.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{0}")]
pub(crate) struct EnrichmentError(pub String);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SpendSlot {
    pub spend: Option<i64>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SpendSlot {
    fn loading() -> Self {
        Self {
            spend: None,
            loading: true,
            error: None,
        }
    }
}

/// Ids to look up, tagged with the board generation they belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EnrichmentBatch {
    pub generation: u64,
    pub ids: Vec<String>,
}

/// Per-account spend for the rows on screen.
///
/// Keyed by normalized account id. Every reset bumps the generation so
/// lookups issued for an older row set cannot land in the new one.
#[derive(Clone, Debug, Default)]
pub(crate) struct SpendBoard {
    generation: u64,
    ids: Vec<String>,
    slots: HashMap<String, SpendSlot>,
}

impl SpendBoard {
    pub fn slot(&self, account_id: &str) -> Option<&SpendSlot> {
        self.slots.get(normalize_account_id(account_id))
    }

    fn restart(&mut self) -> Option<EnrichmentBatch> {
        self.generation = self.generation.saturating_add(1);
        self.slots = self
            .ids
            .iter()
            .map(|id| (id.clone(), SpendSlot::loading()))
            .collect();
        if self.ids.is_empty() {
            return None;
        }
        Some(EnrichmentBatch {
            generation: self.generation,
            ids: self.ids.clone(),
        })
    }

    /// A page finished loading. Same ordered ids as before means the rows did
    /// not change and nothing is refetched.
    pub fn on_accounts_loaded<S: AsRef<str>>(&mut self, ids: &[S]) -> Option<EnrichmentBatch> {
        let ids: Vec<String> = ids
            .iter()
            .map(|id| normalize_account_id(id.as_ref()).to_string())
            .collect();
        if ids == self.ids && !self.slots.is_empty() {
            return None;
        }
        self.ids = ids;
        self.restart()
    }

    /// Same rows, different date window.
    pub fn on_preset_changed(&mut self) -> Option<EnrichmentBatch> {
        self.restart()
    }

    /// Row set is going away (new business, new search, new page).
    pub fn invalidate(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.ids.clear();
        self.slots.clear();
    }

    /// Stores one lookup result. Returns `false` for results from an older
    /// generation or for ids no longer on the board.
    pub fn apply(
        &mut self,
        generation: u64,
        account_id: &str,
        result: Result<i64, EnrichmentError>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(slot) = self.slots.get_mut(normalize_account_id(account_id)) else {
            return false;
        };
        *slot = match result {
            Ok(spend) => SpendSlot {
                spend: Some(spend),
                loading: false,
                error: None,
            },
            Err(e) => SpendSlot {
                spend: None,
                loading: false,
                error: Some(e.to_string()),
            },
        };
        true
    }
}

/// Runs one lookup per id, at most `concurrency` at a time, and hands each
/// result to `apply` as soon as it resolves.
pub(crate) async fn fan_out<F, Fut, A>(ids: Vec<String>, concurrency: usize, fetch: F, mut apply: A)
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<i64, EnrichmentError>>,
    A: FnMut(String, Result<i64, EnrichmentError>),
{
    let lookups = ids.into_iter().map(|id| {
        let fut = fetch(id.clone());
        async move { (id, fut.await) }
    });

    let mut results = futures::stream::iter(lookups).buffer_unordered(concurrency.max(1));
    while let Some((id, result)) = results.next().await {
        apply(id, result);
    }
}
