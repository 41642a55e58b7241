use crate::contract::{
    paths, AccountSpendRequest, AccountSummary, ApiResponse, BusinessAccountsRequest,
    BusinessManagersRequest, FetchAccountRequest, FilterProbeRequest, InactiveAccountsRequest,
    Pagination, ProbeResult, UpdateSpendCapRequest,
};
use crate::models::{Account, AccountSpend, BusinessManager, DatePreset};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    /// Server answered with `success: false`.
    Remote,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Access token was rejected".to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }

    fn remote(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Remote,
            message: message.into(),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Unwraps the envelope: `success: false` and a missing `data` are errors.
pub(crate) fn into_data<T>(resp: ApiResponse<T>) -> ApiResult<T> {
    if !resp.success {
        return Err(ApiError::remote(
            resp.error.unwrap_or_else(|| "Request failed".to_string()),
        ));
    }
    resp.data
        .ok_or_else(|| ApiError::parse("response is missing `data`"))
}

/// Envelope body on a non-2xx reply carries the real message; prefer it
/// over the raw status line.
fn error_from_body(status: reqwest::StatusCode, body: String) -> ApiError {
    if status.as_u16() == 401 {
        return ApiError::unauthorized();
    }
    match serde_json::from_str::<ApiResponse<serde_json::Value>>(&body) {
        Ok(env) if env.error.is_some() => {
            ApiError::remote(env.error.unwrap_or_default())
        }
        _ => ApiError::http(status, body, "Request failed"),
    }
}

/// One page of accounts as the server paginated it.
#[derive(Clone, Debug, Default)]
pub(crate) struct AccountsPage {
    pub accounts: Vec<Account>,
    pub pagination: Pagination,
}

/// Cursor and filter inputs for a business listing call.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct AccountsQuery {
    pub business_id: String,
    pub page: u32,
    pub limit: u32,
    pub after: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn require_token(&self) -> ApiResult<String> {
        self.token.clone().ok_or_else(ApiError::unauthorized)
    }

    async fn request_api<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> ApiResult<ApiResponse<T>> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let res = client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(ApiError::parse)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(error_from_body(status, body))
        }
    }

    pub async fn fetch_account(&self, account_id: &str) -> ApiResult<AccountSummary> {
        let req = FetchAccountRequest {
            access_token: self.require_token()?,
            ad_account_id: account_id.trim().to_string(),
        };
        into_data(self.request_api(paths::ACCOUNT, &req).await?)
    }

    pub async fn update_spend_cap(&self, account_id: &str, cap: Decimal) -> ApiResult<AccountSummary> {
        let req = UpdateSpendCapRequest {
            access_token: self.require_token()?,
            ad_account_id: account_id.trim().to_string(),
            spend_cap: Some(cap),
        };
        into_data(self.request_api(paths::UPDATE_SPEND_CAP, &req).await?)
    }

    pub async fn set_spend_cap_to_one(&self, account_id: &str) -> ApiResult<AccountSummary> {
        let req = FetchAccountRequest {
            access_token: self.require_token()?,
            ad_account_id: account_id.trim().to_string(),
        };
        into_data(self.request_api(paths::SET_SPEND_CAP_TO_ONE, &req).await?)
    }

    pub async fn business_managers(&self) -> ApiResult<Vec<BusinessManager>> {
        let req = BusinessManagersRequest {
            access_token: self.require_token()?,
        };
        into_data(self.request_api(paths::BUSINESS_MANAGERS, &req).await?)
    }

    /// Listing without spend; enrichment runs separately per row.
    pub async fn business_accounts(&self, query: &AccountsQuery) -> ApiResult<AccountsPage> {
        let req = BusinessAccountsRequest {
            access_token: self.require_token()?,
            business_id: query.business_id.clone(),
            page: Some(query.page.max(1)),
            limit: Some(query.limit),
            after: query.after.clone(),
            before: None,
            search: query.search.clone(),
            include_spend: false,
            date_preset: None,
        };
        let resp: ApiResponse<Vec<Account>> =
            self.request_api(paths::BUSINESS_MANAGER_ACCOUNTS, &req).await?;
        let pagination = resp.pagination.clone().unwrap_or_default();
        Ok(AccountsPage {
            accounts: into_data(resp)?,
            pagination,
        })
    }

    pub async fn account_spend(&self, account_id: &str, preset: DatePreset) -> ApiResult<AccountSpend> {
        let req = AccountSpendRequest {
            access_token: self.require_token()?,
            account_id: account_id.to_string(),
            date_preset: Some(preset),
        };
        into_data(self.request_api(paths::ACCOUNT_SPEND, &req).await?)
    }

    pub async fn inactive_accounts(&self, page: u32, after: Option<String>) -> ApiResult<AccountsPage> {
        let req = InactiveAccountsRequest {
            access_token: self.require_token()?,
            page: Some(page.max(1)),
            limit: None,
            after,
        };
        let resp: ApiResponse<Vec<Account>> =
            self.request_api(paths::INACTIVE_ACCOUNTS, &req).await?;
        let pagination = resp.pagination.clone().unwrap_or_default();
        Ok(AccountsPage {
            accounts: into_data(resp)?,
            pagination,
        })
    }

    pub async fn filter_capabilities(&self) -> ApiResult<Vec<ProbeResult>> {
        let req = FilterProbeRequest {
            access_token: self.require_token()?,
        };
        into_data(self.request_api(paths::FILTER_CAPABILITIES, &req).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_becomes_remote_error() {
        let err = into_data(ApiResponse::<AccountSummary>::fail("Invalid token")).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Remote);
        assert_eq!(err.to_string(), "Invalid token");
    }

    #[test]
    fn non_2xx_prefers_envelope_message() {
        let err = error_from_body(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"success":false,"error":"Business ID is required"}"#.to_string(),
        );
        assert_eq!(err.kind, ApiErrorKind::Remote);
        assert_eq!(err.message, "Business ID is required");

        let err = error_from_body(reqwest::StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(err.kind, ApiErrorKind::Http);

        let err = error_from_body(reqwest::StatusCode::UNAUTHORIZED, String::new());
        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    }

    #[test]
    fn missing_token_is_unauthorized_without_request() {
        let client = ApiClient::new("http://localhost:5000".into()).with_token(Some("  ".into()));
        let err = futures::executor::block_on(client.business_managers()).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    }
}
