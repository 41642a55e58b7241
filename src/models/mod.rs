use crate::money::{parse_money_cap, AmountUnit, DEFAULT_CURRENCY};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Id prefix the ads platform puts in front of account ids.
pub const ACCOUNT_ID_PREFIX: &str = "act_";

/// Strip the platform prefix so ids compare equal whether or not it was typed.
pub fn normalize_account_id(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix(ACCOUNT_ID_PREFIX).unwrap_or(id)
}

/// Account id in the form the remote API addresses it by.
pub fn remote_account_id(id: &str) -> String {
    format!("{}{}", ACCOUNT_ID_PREFIX, normalize_account_id(id))
}

/// Account record exactly as the listing endpoint returns it.
///
/// `spend_cap` and `account_status` arrive as either numbers or strings
/// depending on the endpoint; they stay as raw JSON until normalized.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RawAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub spend_cap: serde_json::Value,
    #[serde(default)]
    pub account_status: serde_json::Value,
}

/// Opaque status code. Only ever compared for equality.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct AccountStatus(pub String);

impl AccountStatus {
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::String(s) => Self(s.trim().to_string()),
            serde_json::Value::Number(n) => Self(n.to_string()),
            _ => Self(String::new()),
        }
    }

    pub fn is(&self, sentinel: &str) -> bool {
        self.0 == sentinel.trim()
    }
}

/// Normalized account. Amounts are in minor units of `currency`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub spend_cap: Option<i64>,
    pub account_status: AccountStatus,
    /// Enrichment result; absent until the spend lookup ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_month_spend: Option<i64>,
}

impl Account {
    pub fn from_raw(raw: &RawAccount, cap_unit: AmountUnit) -> Self {
        let currency = raw
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string();

        Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            spend_cap: parse_money_cap(&raw.spend_cap, cap_unit, &currency),
            currency,
            account_status: AccountStatus::from_raw(&raw.account_status),
            last_month_spend: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BusinessManager {
    pub id: String,
    pub name: String,
}

/// Cursor pair and link presence from one listing response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageCursors {
    pub next: Option<String>,
    pub previous: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
}

/// One page of raw accounts plus the paging envelope that produced it.
#[derive(Clone, Debug, Default)]
pub struct RawAccountPage {
    pub accounts: Vec<RawAccount>,
    pub cursors: PageCursors,
}

/// Spend for one account over one date preset, in minor units.
///
/// `currency` is absent when the insights endpoint returned no row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountSpend {
    pub spend: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Date windows the insights endpoint understands.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Default,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatePreset {
    Today,
    Yesterday,
    #[serde(rename = "last_7d")]
    #[strum(serialize = "last_7d")]
    Last7d,
    #[default]
    #[serde(rename = "last_30d")]
    #[strum(serialize = "last_30d")]
    Last30d,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    Maximum,
}

impl DatePreset {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::Last7d => "Last 7 days",
            Self::Last30d => "Last 30 days",
            Self::ThisMonth => "This month",
            Self::LastMonth => "Last month",
            Self::ThisQuarter => "This quarter",
            Self::Maximum => "All time",
        }
    }
}

/// Where the listing call looks for accounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountScope {
    /// Accounts owned by one business manager.
    Business(String),
    /// Accounts the token's user can reach directly.
    Me,
}
