//! Turns one "load accounts" request into a filtered, enriched page.
//!
//! One gateway listing call per page. Filtering works on that page only;
//! accounts dropped here are never backfilled from later pages.

use crate::gateway::{
    AdsGateway, AuthContext, FilterOperator, FilterPredicate, GatewayResult, ListQuery,
};
use crate::models::{normalize_account_id, Account, AccountScope, DatePreset, PageCursors};
use crate::money::{sentinel_cap, AmountUnit, DEFAULT_CURRENCY};
use futures::StreamExt;
use log::{debug, info, warn};
use serde_json::json;

pub const DEFAULT_ACTIVE_STATUS: &str = "1";
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 6;

/// Which filters run remotely (pushed into `filtering`) and which run on
/// the fetched page. The two sides are independent; enabling both is fine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterStrategy {
    pub remote_status: bool,
    pub local_status: bool,
    pub remote_cap: bool,
    pub local_cap: bool,
}

impl Default for FilterStrategy {
    fn default() -> Self {
        Self {
            remote_status: true,
            local_status: true,
            remote_cap: false,
            local_cap: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Status code the platform uses for "active". Compared as an opaque string.
    pub active_status: String,
    /// Unit the listing endpoint reports `spend_cap` in.
    pub cap_unit: AmountUnit,
    pub strategy: FilterStrategy,
    /// Upper bound on concurrent insights calls per page.
    pub enrichment_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            active_status: DEFAULT_ACTIVE_STATUS.to_string(),
            cap_unit: AmountUnit::Minor,
            strategy: FilterStrategy::default(),
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
        }
    }
}

/// Post-enrichment filter on last-period spend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpendFilter {
    #[default]
    Any,
    /// Keep only accounts with no spend (failed lookups count as zero).
    ZeroOnly,
}

#[derive(Clone, Debug)]
pub struct PageRequest {
    pub scope: AccountScope,
    pub limit: u32,
    pub after: Option<String>,
    pub before: Option<String>,
    pub search: Option<String>,
    /// `Some(preset)` turns on per-account spend enrichment.
    pub enrich: Option<DatePreset>,
    pub spend_filter: SpendFilter,
}

impl PageRequest {
    pub fn new(scope: AccountScope, limit: u32) -> Self {
        Self {
            scope,
            limit,
            after: None,
            before: None,
            search: None,
            enrich: None,
            spend_filter: SpendFilter::Any,
        }
    }
}

/// Qualifying accounts for one page plus the untouched remote cursors.
#[derive(Clone, Debug, Default)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    pub cursors: PageCursors,
    /// Size of the raw page before any local filtering.
    pub fetched: usize,
}

/// Predicates pushed down to the remote listing call.
pub fn remote_filters(config: &PipelineConfig) -> Vec<FilterPredicate> {
    let mut filters = Vec::new();
    if config.strategy.remote_status {
        filters.push(FilterPredicate::status_equals(&config.active_status));
    }
    if config.strategy.remote_cap {
        // Remote side has no per-row currency; use the default currency's sentinel.
        let sentinel = match config.cap_unit {
            AmountUnit::Minor => sentinel_cap(DEFAULT_CURRENCY),
            AmountUnit::Major => 1,
        };
        filters.push(FilterPredicate::new(
            "spend_cap",
            FilterOperator::GreaterThan,
            json!(sentinel.to_string()),
        ));
    }
    filters
}

/// Cap is present and strictly above one major unit of its currency.
pub fn has_real_cap(account: &Account) -> bool {
    account
        .spend_cap
        .is_some_and(|cap| cap > sentinel_cap(&account.currency))
}

/// Local inclusion filter for one normalized account.
pub fn passes_inclusion(account: &Account, config: &PipelineConfig) -> bool {
    if config.strategy.local_status && !account.account_status.is(&config.active_status) {
        return false;
    }
    if config.strategy.local_cap && !has_real_cap(account) {
        return false;
    }
    true
}

/// Case-insensitive name substring, or id substring with the platform
/// prefix stripped from both sides.
pub fn matches_search(account: &Account, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }

    let needle = term.to_lowercase();
    if account.name.to_lowercase().contains(&needle) {
        return true;
    }

    let id_term = normalize_account_id(&needle);
    if id_term.is_empty() {
        return false;
    }
    normalize_account_id(&account.id.to_lowercase()).contains(id_term)
}

/// Fills `last_month_spend` on every account with bounded concurrency.
///
/// A failed lookup leaves the account in place with zero spend.
pub async fn enrich_accounts<G: AdsGateway>(
    gateway: &G,
    auth: &AuthContext,
    accounts: &mut [Account],
    preset: DatePreset,
    max_concurrent: usize,
) {
    if accounts.is_empty() {
        return;
    }

    let ids: Vec<String> = accounts.iter().map(|account| account.id.clone()).collect();
    let lookups = ids
        .into_iter()
        .enumerate()
        .map(|(idx, id)| async move { (idx, gateway.fetch_account_spend(auth, &id, preset).await) });

    let results: Vec<_> = futures::stream::iter(lookups)
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    for (idx, result) in results {
        let Some(account) = accounts.get_mut(idx) else {
            continue;
        };
        account.last_month_spend = Some(match result {
            Ok(spend) => spend.spend,
            Err(e) => {
                warn!("spend lookup failed for {}: {}", account.id, e);
                0
            }
        });
    }
}

/// Loads one page: list, normalize, filter, search, enrich.
pub async fn load_page<G: AdsGateway>(
    gateway: &G,
    auth: &AuthContext,
    config: &PipelineConfig,
    request: &PageRequest,
) -> GatewayResult<AccountPage> {
    let query = ListQuery {
        limit: request.limit,
        after: request.after.clone(),
        before: request.before.clone(),
        filtering: remote_filters(config),
    };

    let raw = gateway.list_accounts(auth, &request.scope, &query).await?;
    let fetched = raw.accounts.len();

    let term = request.search.as_deref().unwrap_or_default();
    let mut accounts: Vec<Account> = raw
        .accounts
        .iter()
        .map(|r| Account::from_raw(r, config.cap_unit))
        .filter(|a| passes_inclusion(a, config))
        .filter(|a| matches_search(a, term))
        .collect();

    debug!(
        "page filtered: fetched={} kept={} search={:?}",
        fetched,
        accounts.len(),
        request.search
    );

    if let Some(preset) = request.enrich {
        enrich_accounts(
            gateway,
            auth,
            &mut accounts,
            preset,
            config.enrichment_concurrency,
        )
        .await;
    }

    if request.spend_filter == SpendFilter::ZeroOnly {
        accounts.retain(|a| a.last_month_spend.unwrap_or(0) == 0);
    }

    info!(
        "loaded {} of {} accounts (has_next={})",
        accounts.len(),
        fetched,
        raw.cursors.has_next
    );

    Ok(AccountPage {
        accounts,
        cursors: raw.cursors,
        fetched,
    })
}

/// Check whose outcome decides whether remote cap filtering can be enabled.
pub const CAP_FILTER_CHECK: &str = "Spend Cap Filter";

/// Whether the combined status + `spend_cap` filter was accepted.
pub fn cap_filter_supported(results: &[crate::contract::ProbeResult]) -> bool {
    results
        .iter()
        .find(|r| r.test == CAP_FILTER_CHECK)
        .is_some_and(|r| r.success)
}

/// Probe the remote API with a fixed set of `filtering` variants.
///
/// Each probe reports whether the API accepted it; failures are results.
pub async fn probe_filters<G: AdsGateway>(
    gateway: &G,
    auth: &AuthContext,
    active_status: &str,
) -> Vec<crate::contract::ProbeResult> {
    let status = FilterPredicate::status_equals(active_status);
    let cap = |op, value| FilterPredicate::new("spend_cap", op, value);

    let probes: Vec<(&str, Vec<FilterPredicate>)> = vec![
        ("Basic Account Status Filter", vec![status.clone()]),
        (
            CAP_FILTER_CHECK,
            vec![status.clone(), cap(FilterOperator::GreaterThan, json!("1"))],
        ),
        (
            "Spend Cap GREATER_THAN",
            vec![status.clone(), cap(FilterOperator::GreaterThan, json!("1"))],
        ),
        (
            "Spend Cap NOT_EQUAL",
            vec![status.clone(), cap(FilterOperator::NotEqual, json!("1"))],
        ),
        (
            "Spend Cap IN",
            vec![status, cap(FilterOperator::In, json!(["2", "3", "4", "5"]))],
        ),
    ];

    let mut results = Vec::with_capacity(probes.len());
    for (name, filtering) in probes {
        let query = ListQuery {
            limit: 3,
            filtering,
            ..Default::default()
        };
        let result = match gateway.list_accounts(auth, &AccountScope::Me, &query).await {
            Ok(page) => crate::contract::ProbeResult {
                test: name.to_string(),
                success: true,
                account_count: page.accounts.len(),
                error: None,
            },
            Err(e) => crate::contract::ProbeResult {
                test: name.to_string(),
                success: false,
                account_count: 0,
                error: Some(e.to_string()),
            },
        };
        debug!("filter probe {}: success={}", name, result.success);
        results.push(result);
    }
    results
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory gateway shared by the pipeline and service tests.

    use super::*;
    use crate::gateway::GatewayError;
    use crate::models::{AccountSpend, BusinessManager, RawAccount, RawAccountPage};
    use rust_decimal::Decimal;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeGateway {
        pub page: RefCell<RawAccountPage>,
        pub list_error: Option<GatewayError>,
        pub spend: HashMap<String, Result<i64, GatewayError>>,
        pub businesses: Vec<BusinessManager>,
        pub caps: RefCell<HashMap<String, Decimal>>,
        pub queries: RefCell<Vec<ListQuery>>,
        pub writes: RefCell<usize>,
    }

    pub fn raw(id: &str, name: &str, cap: serde_json::Value, status: serde_json::Value) -> RawAccount {
        RawAccount {
            id: id.to_string(),
            name: name.to_string(),
            currency: Some("USD".to_string()),
            spend_cap: cap,
            account_status: status,
        }
    }

    impl FakeGateway {
        pub fn with_accounts(accounts: Vec<RawAccount>, cursors: PageCursors) -> Self {
            Self {
                page: RefCell::new(RawAccountPage { accounts, cursors }),
                ..Default::default()
            }
        }
    }

    impl AdsGateway for FakeGateway {
        async fn list_accounts(
            &self,
            _auth: &AuthContext,
            _scope: &AccountScope,
            query: &ListQuery,
        ) -> GatewayResult<RawAccountPage> {
            self.queries.borrow_mut().push(query.clone());
            if let Some(e) = &self.list_error {
                return Err(e.clone());
            }
            Ok(self.page.borrow().clone())
        }

        async fn fetch_account(
            &self,
            _auth: &AuthContext,
            account_id: &str,
        ) -> GatewayResult<RawAccount> {
            let cap = self
                .caps
                .borrow()
                .get(normalize_account_id(account_id))
                .map(|d| json!((*d * Decimal::from(100)).normalize().to_string()))
                .unwrap_or(serde_json::Value::Null);
            Ok(raw(account_id, "Fetched", cap, json!(1)))
        }

        async fn fetch_account_spend(
            &self,
            _auth: &AuthContext,
            account_id: &str,
            _preset: DatePreset,
        ) -> GatewayResult<AccountSpend> {
            match self.spend.get(account_id) {
                Some(Ok(v)) => Ok(AccountSpend {
                    spend: *v,
                    currency: Some("USD".into()),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(AccountSpend {
                    spend: 0,
                    currency: Some("USD".into()),
                }),
            }
        }

        async fn write_spend_cap(
            &self,
            _auth: &AuthContext,
            account_id: &str,
            cap: Decimal,
        ) -> GatewayResult<()> {
            *self.writes.borrow_mut() += 1;
            self.caps
                .borrow_mut()
                .insert(normalize_account_id(account_id).to_string(), cap);
            Ok(())
        }

        async fn list_business_managers(
            &self,
            _auth: &AuthContext,
        ) -> GatewayResult<Vec<BusinessManager>> {
            Ok(self.businesses.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{raw, FakeGateway};
    use super::*;
    use crate::gateway::GatewayError;
    use futures::executor::block_on;
    use std::collections::HashSet;

    fn auth() -> AuthContext {
        AuthContext::new("token")
    }

    fn account(id: &str, name: &str, cap: Option<i64>) -> Account {
        Account {
            id: id.into(),
            name: name.into(),
            currency: "USD".into(),
            spend_cap: cap,
            account_status: crate::models::AccountStatus("1".into()),
            last_month_spend: None,
        }
    }

    #[test]
    fn sentinel_and_missing_caps_are_excluded() {
        let config = PipelineConfig::default();
        for raw_cap in [json!(null), json!(0), json!("0"), json!(100), json!("100"), json!("100.0"), json!("100.00")] {
            let a = Account::from_raw(&raw("act_1", "A", raw_cap.clone(), json!(1)), AmountUnit::Minor);
            assert!(!passes_inclusion(&a, &config), "{raw_cap} should be excluded");
        }
        let a = Account::from_raw(&raw("act_1", "A", json!("101"), json!(1)), AmountUnit::Minor);
        assert!(passes_inclusion(&a, &config));
    }

    #[test]
    fn major_unit_caps_use_the_same_sentinel() {
        let config = PipelineConfig {
            cap_unit: AmountUnit::Major,
            ..Default::default()
        };
        for raw_cap in [json!(1), json!("1"), json!("1.0"), json!("1.00")] {
            let a = Account::from_raw(&raw("act_1", "A", raw_cap, json!("1")), config.cap_unit);
            assert!(!passes_inclusion(&a, &config));
        }
        let a = Account::from_raw(&raw("act_1", "A", json!("1.01"), json!("1")), config.cap_unit);
        assert!(passes_inclusion(&a, &config));
    }

    #[test]
    fn inactive_status_is_excluded_locally() {
        let config = PipelineConfig::default();
        let a = Account::from_raw(&raw("act_1", "A", json!(5000), json!(2)), AmountUnit::Minor);
        assert!(!passes_inclusion(&a, &config));

        let lenient = PipelineConfig {
            strategy: FilterStrategy {
                local_status: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(passes_inclusion(&a, &lenient));
    }

    #[test]
    fn search_matches_name_or_id_with_or_without_prefix() {
        let rows = [account("123", "Acme", Some(500)), account("456", "Other", Some(500))];
        let hits = |term: &str| -> Vec<String> {
            rows.iter()
                .filter(|a| matches_search(a, term))
                .map(|a| a.id.clone())
                .collect()
        };
        assert_eq!(hits("acme"), vec!["123"]);
        assert_eq!(hits("456"), vec!["456"]);
        assert_eq!(hits("act_456"), vec!["456"]);
        assert_eq!(hits("ACT_456"), vec!["456"]);
        assert_eq!(hits("  "), vec!["123", "456"]);

        let prefixed = account("act_456", "Other", Some(500));
        assert!(matches_search(&prefixed, "456"));
        assert!(matches_search(&prefixed, "act_456"));
        assert!(!matches_search(&prefixed, "act_"));
    }

    #[test]
    fn remote_filters_follow_strategy() {
        let config = PipelineConfig::default();
        assert_eq!(remote_filters(&config), vec![FilterPredicate::status_equals("1")]);

        let config = PipelineConfig {
            strategy: FilterStrategy {
                remote_status: false,
                remote_cap: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let filters = remote_filters(&config);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].field, "spend_cap");
        assert_eq!(filters[0].value, json!("100"));
    }

    #[test]
    fn three_accounts_two_qualify_single_page() {
        let gateway = FakeGateway::with_accounts(
            vec![
                raw("act_1", "Alpha", json!("5000"), json!(1)),
                raw("act_2", "Paused", json!("100"), json!(1)),
                raw("act_3", "Gamma", json!(25000), json!(1)),
            ],
            PageCursors::default(),
        );
        let request = PageRequest::new(AccountScope::Business("b1".into()), 20);
        let page = block_on(load_page(&gateway, &auth(), &PipelineConfig::default(), &request))
            .expect("page should load");

        let ids: Vec<_> = page.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["act_1", "act_3"]);
        assert!(!page.cursors.has_next);
        assert_eq!(page.fetched, 3);

        let queries = gateway.queries.borrow();
        assert_eq!(queries[0].limit, 20);
        assert_eq!(queries[0].filtering, vec![FilterPredicate::status_equals("1")]);
    }

    #[test]
    fn result_is_subset_of_raw_page_and_cursors_pass_through() {
        let cursors = PageCursors {
            next: Some("AFTER".into()),
            previous: Some("BEFORE".into()),
            has_next: true,
            has_previous: true,
        };
        let gateway = FakeGateway::with_accounts(
            vec![
                raw("act_1", "One", json!("1"), json!(1)),
                raw("act_2", "Two", json!("250"), json!("1")),
                raw("act_3", "Three", json!(null), json!(1)),
                raw("act_4", "Four", json!("999"), json!(3)),
            ],
            cursors.clone(),
        );
        let mut request = PageRequest::new(AccountScope::Business("b1".into()), 4);
        request.after = Some("PREV_AFTER".into());

        let page = block_on(load_page(&gateway, &auth(), &PipelineConfig::default(), &request))
            .expect("page should load");

        let raw_ids: HashSet<_> = gateway
            .page
            .borrow()
            .accounts
            .iter()
            .map(|a| a.id.clone())
            .collect();
        assert!(page.accounts.iter().all(|a| raw_ids.contains(&a.id)));
        assert!(page
            .accounts
            .iter()
            .all(|a| a.spend_cap.is_some_and(|c| c > 100)));
        assert_eq!(page.cursors, cursors);
        assert_eq!(gateway.queries.borrow()[0].after.as_deref(), Some("PREV_AFTER"));
    }

    #[test]
    fn failed_enrichment_keeps_account_with_zero_spend() {
        let mut gateway = FakeGateway::with_accounts(
            vec![
                raw("act_1", "A", json!("5000"), json!(1)),
                raw("act_2", "B", json!("5000"), json!(1)),
            ],
            PageCursors::default(),
        );
        gateway
            .spend
            .insert("act_1".into(), Err(GatewayError::Network("timeout".into())));
        gateway.spend.insert("act_2".into(), Ok(1234));

        let mut request = PageRequest::new(AccountScope::Business("b".into()), 20);
        request.enrich = Some(DatePreset::LastMonth);

        let page = block_on(load_page(&gateway, &auth(), &PipelineConfig::default(), &request))
            .expect("page should load");
        assert_eq!(page.accounts.len(), 2);
        assert_eq!(page.accounts[0].last_month_spend, Some(0));
        assert_eq!(page.accounts[1].last_month_spend, Some(1234));
    }

    #[test]
    fn zero_spend_filter_keeps_only_inactive() {
        let mut gateway = FakeGateway::with_accounts(
            vec![
                raw("act_1", "Busy", json!("5000"), json!(1)),
                raw("act_2", "Idle", json!("5000"), json!(1)),
                raw("act_3", "Broken", json!("5000"), json!(1)),
            ],
            PageCursors::default(),
        );
        gateway.spend.insert("act_1".into(), Ok(700));
        gateway.spend.insert("act_2".into(), Ok(0));
        gateway
            .spend
            .insert("act_3".into(), Err(GatewayError::Parse("bad".into())));

        let mut request = PageRequest::new(AccountScope::Me, 20);
        request.enrich = Some(DatePreset::LastMonth);
        request.spend_filter = SpendFilter::ZeroOnly;

        let page = block_on(load_page(&gateway, &auth(), &PipelineConfig::default(), &request))
            .expect("page should load");
        let ids: Vec<_> = page.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["act_2", "act_3"]);
    }

    #[test]
    fn listing_failure_propagates() {
        let gateway = FakeGateway {
            list_error: Some(GatewayError::Remote {
                status: 400,
                message: "Invalid OAuth access token.".into(),
            }),
            ..Default::default()
        };
        let request = PageRequest::new(AccountScope::Business("b".into()), 20);
        let err = block_on(load_page(&gateway, &auth(), &PipelineConfig::default(), &request))
            .expect_err("listing should fail");
        assert_eq!(err.to_string(), "Invalid OAuth access token.");
    }

    #[test]
    fn probes_report_failures_as_results() {
        let gateway = FakeGateway {
            list_error: Some(GatewayError::Remote {
                status: 400,
                message: "Filtering field spend_cap is invalid".into(),
            }),
            ..Default::default()
        };
        let results = block_on(probe_filters(&gateway, &auth(), "1"));
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| !r.success));
        assert_eq!(
            results[1].error.as_deref(),
            Some("Filtering field spend_cap is invalid")
        );
        assert_eq!(gateway.queries.borrow()[4].limit, 3);
        assert!(!cap_filter_supported(&results));
    }

    #[test]
    fn cap_support_follows_the_cap_check_only() {
        let result = |test: &str, success: bool| crate::contract::ProbeResult {
            test: test.to_string(),
            success,
            account_count: 0,
            error: None,
        };

        let results = block_on(probe_filters(&FakeGateway::default(), &auth(), "1"));
        assert!(results.iter().any(|r| r.test == CAP_FILTER_CHECK));
        assert!(cap_filter_supported(&results));

        // A passing status-only filter says nothing about spend_cap.
        let status_only = vec![
            result("Basic Account Status Filter", true),
            result(CAP_FILTER_CHECK, false),
            result("Spend Cap GREATER_THAN", true),
        ];
        assert!(!cap_filter_supported(&status_only));
        assert!(!cap_filter_supported(&[]));
    }
}
