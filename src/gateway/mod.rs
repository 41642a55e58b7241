//! Outbound calls to the ads platform's Graph API.
//!
//! Every method is one HTTP round trip (except `update_spend_cap`, which
//! writes then re-reads). No retries, no caching.

use crate::models::{
    normalize_account_id, remote_account_id, AccountScope, BusinessManager, DatePreset,
    PageCursors, RawAccount, RawAccountPage,
};
use crate::money::{major_to_wire, parse_money_cap, AmountUnit, DEFAULT_CURRENCY};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";

const ACCOUNT_LIST_FIELDS: &str = "id,name,spend_cap,currency,account_status";
const ACCOUNT_FIELDS: &str = "id,name,spend_cap,currency";

/// Remote call failure. All variants surface to the caller as one message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` is the upstream `error.message` when present.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response from the ads API: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Credential for one request. Passed explicitly into every call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    access_token: String,
}

impl AuthContext {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into().trim().to_string(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Safe-to-log prefix of the token.
    pub fn preview(&self) -> String {
        let head: String = self.access_token.chars().take(10).collect();
        format!("{head}...")
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    In,
}

/// One `{field, operator, value}` entry of the `filtering` parameter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl FilterPredicate {
    pub fn new(field: &str, operator: FilterOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }

    pub fn status_equals(active_status: &str) -> Self {
        Self::new(
            "account_status",
            FilterOperator::Equal,
            serde_json::Value::String(active_status.to_string()),
        )
    }
}

/// Paging and filtering for one listing call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub limit: u32,
    pub after: Option<String>,
    pub before: Option<String>,
    pub filtering: Vec<FilterPredicate>,
}

/// The remote operations the pipeline and handlers are written against.
#[allow(async_fn_in_trait)]
pub trait AdsGateway {
    async fn list_accounts(
        &self,
        auth: &AuthContext,
        scope: &AccountScope,
        query: &ListQuery,
    ) -> GatewayResult<RawAccountPage>;

    async fn fetch_account(&self, auth: &AuthContext, account_id: &str)
        -> GatewayResult<RawAccount>;

    /// Spend in minor units; an empty insights result is zero spend.
    async fn fetch_account_spend(
        &self,
        auth: &AuthContext,
        account_id: &str,
        preset: DatePreset,
    ) -> GatewayResult<crate::models::AccountSpend>;

    /// Write-only half of the spend cap mutation. `cap` is in major units.
    async fn write_spend_cap(
        &self,
        auth: &AuthContext,
        account_id: &str,
        cap: Decimal,
    ) -> GatewayResult<()>;

    async fn list_business_managers(&self, auth: &AuthContext)
        -> GatewayResult<Vec<BusinessManager>>;

    /// Writes the cap, then re-reads the account; the write response is not
    /// trusted for the new value.
    async fn update_spend_cap(
        &self,
        auth: &AuthContext,
        account_id: &str,
        cap: Decimal,
    ) -> GatewayResult<RawAccount> {
        self.write_spend_cap(auth, account_id, cap).await?;
        self.fetch_account(auth, account_id).await
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub graph_url: String,
    /// Unit the insights endpoint reports `spend` in.
    pub spend_unit: AmountUnit,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            spend_unit: AmountUnit::Major,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct GraphCursors {
    before: Option<String>,
    after: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct GraphPaging {
    #[serde(default)]
    cursors: Option<GraphCursors>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    previous: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GraphList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<GraphPaging>,
}

#[derive(Deserialize, Debug)]
struct GraphErrorBody {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GraphErrorEnvelope {
    error: Option<GraphErrorBody>,
}

#[derive(Deserialize, Debug)]
struct InsightsRow {
    #[serde(default)]
    spend: serde_json::Value,
    #[serde(default)]
    account_currency: Option<String>,
}

impl From<Option<GraphPaging>> for PageCursors {
    fn from(paging: Option<GraphPaging>) -> Self {
        let Some(p) = paging else {
            return Self::default();
        };
        let cursors = p.cursors.unwrap_or_default();
        Self {
            has_next: p.next.is_some(),
            has_previous: p.previous.is_some(),
            next: cursors.after,
            previous: cursors.before,
        }
    }
}

/// Graph API implementation of [`AdsGateway`].
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GraphClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.graph_url.trim_end_matches('/'), path)
    }

    fn scope_path(scope: &AccountScope) -> String {
        match scope {
            AccountScope::Business(id) => {
                format!("{}/owned_ad_accounts", urlencoding::encode(id.trim()))
            }
            AccountScope::Me => "me/adaccounts".to_string(),
        }
    }

    fn account_path(account_id: &str) -> String {
        urlencoding::encode(&remote_account_id(account_id)).into_owned()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        res: reqwest::Response,
        ctx: &str,
    ) -> GatewayResult<T> {
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GraphErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("{ctx} ({status})"));
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Parse(format!("{ctx}: {e}")))
    }
}

impl AdsGateway for GraphClient {
    async fn list_accounts(
        &self,
        auth: &AuthContext,
        scope: &AccountScope,
        query: &ListQuery,
    ) -> GatewayResult<RawAccountPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("fields", ACCOUNT_LIST_FIELDS.to_string()),
            ("limit", query.limit.to_string()),
            ("access_token", auth.access_token().to_string()),
        ];
        if !query.filtering.is_empty() {
            let filtering = serde_json::to_string(&query.filtering)
                .map_err(|e| GatewayError::Parse(e.to_string()))?;
            params.push(("filtering", filtering));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }
        if let Some(before) = &query.before {
            params.push(("before", before.clone()));
        }

        debug!(
            "listing accounts scope={:?} limit={} after={} token={}",
            scope,
            query.limit,
            query.after.is_some(),
            auth.preview()
        );

        let res = self
            .http
            .get(self.url(&Self::scope_path(scope)))
            .query(&params)
            .send()
            .await?;
        let list: GraphList<RawAccount> = Self::read_json(res, "Failed to fetch accounts").await?;

        Ok(RawAccountPage {
            accounts: list.data,
            cursors: list.paging.into(),
        })
    }

    async fn fetch_account(
        &self,
        auth: &AuthContext,
        account_id: &str,
    ) -> GatewayResult<RawAccount> {
        let res = self
            .http
            .get(self.url(&Self::account_path(account_id)))
            .query(&[
                ("fields", ACCOUNT_FIELDS),
                ("access_token", auth.access_token()),
            ])
            .send()
            .await?;
        Self::read_json(res, "Failed to fetch account details").await
    }

    async fn fetch_account_spend(
        &self,
        auth: &AuthContext,
        account_id: &str,
        preset: DatePreset,
    ) -> GatewayResult<crate::models::AccountSpend> {
        let path = format!("{}/insights", Self::account_path(account_id));
        let res = self
            .http
            .get(self.url(&path))
            .query(&[
                ("fields", "spend,account_currency"),
                ("date_preset", preset.as_ref()),
                ("access_token", auth.access_token()),
            ])
            .send()
            .await?;
        let list: GraphList<InsightsRow> = Self::read_json(res, "Failed to fetch insights").await?;

        let Some(row) = list.data.into_iter().next() else {
            return Ok(crate::models::AccountSpend {
                spend: 0,
                currency: None,
            });
        };

        let currency = row
            .account_currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let offset_currency = currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
        let spend = match parse_money_cap(&row.spend, self.config.spend_unit, offset_currency) {
            Some(v) => v,
            None => {
                if !row.spend.is_null() {
                    warn!(
                        "unparseable spend {:?} for account {}",
                        row.spend,
                        normalize_account_id(account_id)
                    );
                }
                0
            }
        };

        Ok(crate::models::AccountSpend { spend, currency })
    }

    async fn write_spend_cap(
        &self,
        auth: &AuthContext,
        account_id: &str,
        cap: Decimal,
    ) -> GatewayResult<()> {
        let res = self
            .http
            .post(self.url(&Self::account_path(account_id)))
            .form(&[
                ("access_token", auth.access_token().to_string()),
                ("spend_cap", major_to_wire(cap)),
            ])
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(res, "Failed to update spend cap").await?;
        Ok(())
    }

    async fn list_business_managers(
        &self,
        auth: &AuthContext,
    ) -> GatewayResult<Vec<BusinessManager>> {
        let res = self
            .http
            .get(self.url("me/businesses"))
            .query(&[("fields", "id,name"), ("access_token", auth.access_token())])
            .send()
            .await?;
        let list: GraphList<BusinessManager> =
            Self::read_json(res, "Failed to fetch business managers").await?;
        Ok(list.data)
    }
}
