//! JSON shapes shared by the API server and the browser client.
//!
//! Requests are camelCase; response payloads keep the remote platform's
//! snake_case field names. Amounts are minor-unit integers except
//! `spendCap` on the update request, which is what the operator typed.

use crate::models::{Account, AccountSpend, BusinessManager, DatePreset, PageCursors};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

pub mod paths {
    pub const ACCOUNT: &str = "/api/facebook/account";
    pub const UPDATE_SPEND_CAP: &str = "/api/facebook/update-spend-cap";
    pub const SET_SPEND_CAP_TO_ONE: &str = "/api/facebook/set-spend-cap-to-one";
    pub const BUSINESS_MANAGERS: &str = "/api/facebook/business-managers";
    pub const BUSINESS_MANAGER_ACCOUNTS: &str = "/api/facebook/business-manager-accounts";
    pub const ACCOUNT_SPEND: &str = "/api/facebook/account-spend";
    pub const INACTIVE_ACCOUNTS: &str = "/api/facebook/inactive-accounts";
    pub const FILTER_CAPABILITIES: &str = "/api/facebook/filter-capabilities";
}

/// Malformed caller input, rejected before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn require(field: &'static str, value: &str, label: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("{label} is required")));
    }
    Ok(())
}

fn check_limit(limit: Option<u32>) -> Result<u32, ValidationError> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ValidationError::new(
            "limit",
            format!("Limit must be between 1 and {MAX_PAGE_LIMIT}"),
        ));
    }
    Ok(limit)
}

/// Uniform response envelope.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
            pagination: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Page metadata. Totals describe the current filtered page only.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u32,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_cursor: Option<String>,
}

impl Pagination {
    pub fn for_page(current_page: u32, items: usize, limit: u32, cursors: &PageCursors) -> Self {
        let total_items = items as u32;
        Self {
            current_page,
            total_pages: total_items.div_ceil(limit.max(1)),
            total_items,
            items_per_page: limit,
            has_next_page: cursors.has_next,
            has_previous_page: cursors.has_previous,
            next_cursor: cursors.next.clone(),
            previous_cursor: cursors.previous.clone(),
        }
    }

    pub fn cursors(&self) -> PageCursors {
        PageCursors {
            next: self.next_cursor.clone(),
            previous: self.previous_cursor.clone(),
            has_next: self.has_next_page,
            has_previous: self.has_previous_page,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FetchAccountRequest {
    pub access_token: String,
    pub ad_account_id: String,
}

impl FetchAccountRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("accessToken", &self.access_token, "Access token")?;
        require("adAccountId", &self.ad_account_id, "Ad account ID")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpendCapRequest {
    pub access_token: String,
    pub ad_account_id: String,
    /// New cap in major units of the account currency.
    pub spend_cap: Option<Decimal>,
}

impl UpdateSpendCapRequest {
    pub fn validate(&self) -> Result<Decimal, ValidationError> {
        require("accessToken", &self.access_token, "Access token")?;
        require("adAccountId", &self.ad_account_id, "Ad account ID")?;
        match self.spend_cap {
            None => Err(ValidationError::new("spendCap", "Spend cap is required")),
            Some(v) if v.is_sign_negative() && !v.is_zero() => Err(ValidationError::new(
                "spendCap",
                "Spend cap must be a positive number",
            )),
            Some(v) => Ok(v),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BusinessManagersRequest {
    pub access_token: String,
}

impl BusinessManagersRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("accessToken", &self.access_token, "Access token")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAccountsRequest {
    pub access_token: String,
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub include_spend: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_preset: Option<DatePreset>,
}

impl BusinessAccountsRequest {
    /// Returns `(page, limit)` once the request is structurally valid.
    pub fn validate(&self) -> Result<(u32, u32), ValidationError> {
        require("accessToken", &self.access_token, "Access token")?;
        require("businessId", &self.business_id, "Business ID")?;
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ValidationError::new("page", "Page must be at least 1"));
        }
        Ok((page, check_limit(self.limit)?))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpendRequest {
    pub access_token: String,
    pub account_id: String,
    #[serde(default)]
    pub date_preset: Option<DatePreset>,
}

impl AccountSpendRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("accessToken", &self.access_token, "Access token")?;
        require("accountId", &self.account_id, "Account ID")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InactiveAccountsRequest {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl InactiveAccountsRequest {
    pub fn validate(&self) -> Result<(u32, u32), ValidationError> {
        require("accessToken", &self.access_token, "Access token")?;
        Ok((self.page.unwrap_or(1).max(1), check_limit(self.limit)?))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FilterProbeRequest {
    pub access_token: String,
}

/// Account projection returned by single-account endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub spend_cap: Option<i64>,
    pub currency: String,
}

impl From<Account> for AccountSummary {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            name: a.name,
            spend_cap: a.spend_cap,
            currency: a.currency,
        }
    }
}

pub type AccountResponse = ApiResponse<AccountSummary>;
pub type AccountsResponse = ApiResponse<Vec<Account>>;
pub type BusinessManagersResponse = ApiResponse<Vec<BusinessManager>>;
pub type AccountSpendResponse = ApiResponse<AccountSpend>;

/// Outcome of one remote filter probe.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub test: String,
    pub success: bool,
    pub account_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn business_accounts_request_defaults() {
        let req: BusinessAccountsRequest = serde_json::from_value(json!({
            "accessToken": "t",
            "businessId": "b1"
        }))
        .expect("request should parse");
        assert_eq!(req.validate(), Ok((1, 20)));
        assert!(!req.include_spend);
        assert!(req.after.is_none());
    }

    #[test]
    fn business_accounts_request_rejects_bad_limit_and_missing_ids() {
        let mut req = BusinessAccountsRequest {
            access_token: "t".into(),
            business_id: "b".into(),
            limit: Some(101),
            ..Default::default()
        };
        assert_eq!(req.validate().map_err(|e| e.field), Err("limit"));

        req.limit = Some(20);
        req.business_id = "  ".into();
        assert_eq!(req.validate().map_err(|e| e.field), Err("businessId"));

        req.business_id = "b".into();
        req.page = Some(0);
        assert_eq!(req.validate().map_err(|e| e.field), Err("page"));
    }

    #[test]
    fn update_request_accepts_number_or_string_cap() {
        let req: UpdateSpendCapRequest = serde_json::from_value(json!({
            "accessToken": "t",
            "adAccountId": "act_1",
            "spendCap": 25.5
        }))
        .expect("request should parse");
        assert_eq!(req.validate(), Ok(Decimal::from_str("25.5").unwrap()));

        let req = UpdateSpendCapRequest {
            spend_cap: Some(Decimal::from(-1)),
            ..req
        };
        assert_eq!(req.validate().map_err(|e| e.field), Err("spendCap"));
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let v = serde_json::to_value(ApiResponse::<AccountSummary>::fail("boom")).unwrap();
        assert_eq!(v, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn pagination_describes_current_page_only() {
        let cursors = PageCursors {
            next: Some("n".into()),
            previous: None,
            has_next: true,
            has_previous: false,
        };
        let p = Pagination::for_page(3, 2, 20, &cursors);
        assert_eq!(p.total_items, 2);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.current_page, 3);
        assert_eq!(p.cursors(), cursors);

        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["hasNextPage"], true);
        assert_eq!(v["nextCursor"], "n");
        assert!(v.get("previousCursor").is_none());
    }
}
