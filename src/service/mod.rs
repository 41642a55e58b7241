//! Request handlers for the JSON POST surface.
//!
//! Each handler validates, runs one gateway or pipeline operation and
//! returns an HTTP status plus the response envelope. The HTTP framework
//! only maps the status code; nothing here depends on it.

use crate::contract::{
    AccountResponse, AccountSpendRequest, AccountSpendResponse, AccountSummary, AccountsResponse,
    ApiResponse, BusinessAccountsRequest, BusinessManagersRequest, BusinessManagersResponse,
    FetchAccountRequest, FilterProbeRequest, InactiveAccountsRequest, Pagination, ProbeResult,
    UpdateSpendCapRequest, ValidationError,
};
use crate::gateway::{AdsGateway, AuthContext, GatewayError};
use crate::models::{Account, AccountScope, DatePreset};
use crate::pipeline::{
    cap_filter_supported, load_page, probe_filters, PageRequest, PipelineConfig, SpendFilter,
};
use log::{error, info, warn};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Reply<T> = (u16, ApiResponse<T>);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ServiceError {
    /// Validation and upstream rejections are the caller's problem (400);
    /// transport and decoding failures are ours (500).
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Gateway(GatewayError::Remote { .. }) => 400,
            Self::Gateway(GatewayError::Network(_) | GatewayError::Parse(_)) => 500,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.message.clone(),
            Self::Gateway(e) => e.to_string(),
        }
    }
}

fn reply<T>(result: Result<ApiResponse<T>, ServiceError>, ctx: &str) -> Reply<T> {
    match result {
        Ok(body) => (200, body),
        Err(e) => {
            match &e {
                ServiceError::Validation(_) => warn!("{ctx}: rejected: {e}"),
                ServiceError::Gateway(_) => error!("{ctx}: {e}"),
            }
            (e.status(), ApiResponse::fail(e.user_message()))
        }
    }
}

/// Stateless handler set; one instance serves every request.
#[derive(Clone)]
pub struct AccountService<G> {
    gateway: G,
    pipeline: PipelineConfig,
}

impl<G: AdsGateway> AccountService<G> {
    pub fn new(gateway: G, pipeline: PipelineConfig) -> Self {
        Self { gateway, pipeline }
    }

    fn summary(&self, raw: &crate::models::RawAccount) -> AccountSummary {
        Account::from_raw(raw, self.pipeline.cap_unit).into()
    }

    pub async fn fetch_account(&self, req: FetchAccountRequest) -> Reply<AccountSummary> {
        let result = async {
            req.validate()?;
            let auth = AuthContext::new(&req.access_token);
            let raw = self.gateway.fetch_account(&auth, &req.ad_account_id).await?;
            Ok::<_, ServiceError>(AccountResponse::ok(
                self.summary(&raw),
                "Account details retrieved successfully",
            ))
        }
        .await;
        reply(result, "fetch account")
    }

    pub async fn update_spend_cap(&self, req: UpdateSpendCapRequest) -> Reply<AccountSummary> {
        let result = async {
            let cap = req.validate()?;
            self.write_cap(&req.access_token, &req.ad_account_id, cap)
                .await
                .map(|summary| AccountResponse::ok(summary, "Spend cap updated successfully"))
        }
        .await;
        reply(result, "update spend cap")
    }

    /// Writes the sentinel cap (one major unit).
    pub async fn set_spend_cap_to_one(&self, req: FetchAccountRequest) -> Reply<AccountSummary> {
        let result = async {
            req.validate()?;
            self.write_cap(&req.access_token, &req.ad_account_id, Decimal::ONE)
                .await
                .map(|summary| AccountResponse::ok(summary, "Spend cap set to 1 successfully"))
        }
        .await;
        reply(result, "set spend cap to one")
    }

    async fn write_cap(
        &self,
        token: &str,
        account_id: &str,
        cap: Decimal,
    ) -> Result<AccountSummary, ServiceError> {
        let auth = AuthContext::new(token);
        info!(
            "updating spend cap for {} to {} (token {})",
            account_id,
            cap,
            auth.preview()
        );
        let raw = self.gateway.update_spend_cap(&auth, account_id, cap).await?;
        Ok(self.summary(&raw))
    }

    pub async fn business_managers(
        &self,
        req: BusinessManagersRequest,
    ) -> Reply<Vec<crate::models::BusinessManager>> {
        let result = async {
            req.validate()?;
            let auth = AuthContext::new(&req.access_token);
            let managers = self.gateway.list_business_managers(&auth).await?;
            Ok::<_, ServiceError>(BusinessManagersResponse::ok(
                managers,
                "Business managers retrieved successfully",
            ))
        }
        .await;
        reply(result, "list business managers")
    }

    pub async fn business_accounts(&self, req: BusinessAccountsRequest) -> Reply<Vec<Account>> {
        let result = async {
            let (page, limit) = req.validate()?;
            let auth = AuthContext::new(&req.access_token);

            let mut request =
                PageRequest::new(AccountScope::Business(req.business_id.trim().to_string()), limit);
            request.after = req.after.clone().filter(|c| !c.is_empty());
            request.before = req.before.clone().filter(|c| !c.is_empty());
            request.search = req.search.clone().filter(|s| !s.trim().is_empty());
            if req.include_spend {
                request.enrich = Some(req.date_preset.unwrap_or_default());
            }

            let loaded = load_page(&self.gateway, &auth, &self.pipeline, &request).await?;
            let pagination = Pagination::for_page(page, loaded.accounts.len(), limit, &loaded.cursors);
            let message = format!("Found {} accounts with spend caps", loaded.accounts.len());
            Ok::<_, ServiceError>(
                AccountsResponse::ok(loaded.accounts, message).with_pagination(pagination),
            )
        }
        .await;
        reply(result, "list business accounts")
    }

    pub async fn account_spend(
        &self,
        req: AccountSpendRequest,
    ) -> Reply<crate::models::AccountSpend> {
        let result = async {
            req.validate()?;
            let auth = AuthContext::new(&req.access_token);
            let preset = req.date_preset.unwrap_or_default();
            let spend = self
                .gateway
                .fetch_account_spend(&auth, &req.account_id, preset)
                .await?;
            Ok::<_, ServiceError>(AccountSpendResponse::ok(
                spend,
                "Account spend retrieved successfully",
            ))
        }
        .await;
        reply(result, "account spend")
    }

    /// Accounts the token can reach directly that spent nothing last month.
    pub async fn inactive_accounts(&self, req: InactiveAccountsRequest) -> Reply<Vec<Account>> {
        let result = async {
            let (page, limit) = req.validate()?;
            let auth = AuthContext::new(&req.access_token);

            let mut request = PageRequest::new(AccountScope::Me, limit);
            request.after = req.after.clone().filter(|c| !c.is_empty());
            request.enrich = Some(DatePreset::LastMonth);
            request.spend_filter = SpendFilter::ZeroOnly;

            let loaded = load_page(&self.gateway, &auth, &self.pipeline, &request).await?;
            let pagination = Pagination::for_page(page, loaded.accounts.len(), limit, &loaded.cursors);
            let message = format!(
                "Found {} potentially inactive accounts",
                loaded.accounts.len()
            );
            Ok::<_, ServiceError>(
                AccountsResponse::ok(loaded.accounts, message).with_pagination(pagination),
            )
        }
        .await;
        reply(result, "inactive accounts")
    }

    pub async fn filter_capabilities(&self, req: FilterProbeRequest) -> Reply<Vec<ProbeResult>> {
        if req.access_token.trim().is_empty() {
            let e = ServiceError::from(ValidationError {
                field: "accessToken",
                message: "Access token is required".to_string(),
            });
            return reply(Err(e), "filter capabilities");
        }
        let auth = AuthContext::new(&req.access_token);
        let results = probe_filters(&self.gateway, &auth, &self.pipeline.active_status).await;
        let message = if cap_filter_supported(&results) {
            "spend_cap filtering is supported by the ads API"
        } else {
            "spend_cap filtering is not supported by the ads API"
        };
        (200, ApiResponse::ok(results, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageCursors;
    use crate::pipeline::testing::{raw, FakeGateway};
    use futures::executor::block_on;
    use serde_json::json;
    use std::str::FromStr;

    fn service(gateway: FakeGateway) -> AccountService<FakeGateway> {
        AccountService::new(gateway, PipelineConfig::default())
    }

    #[test]
    fn missing_token_is_rejected_before_any_call() {
        let svc = service(FakeGateway::default());
        let (status, body) = block_on(svc.business_accounts(BusinessAccountsRequest {
            access_token: " ".into(),
            business_id: "b".into(),
            ..Default::default()
        }));
        assert_eq!(status, 400);
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Access token is required"));
        assert!(svc.gateway.queries.borrow().is_empty());
    }

    #[test]
    fn business_accounts_page_carries_pagination() {
        let svc = service(FakeGateway::with_accounts(
            vec![
                raw("act_1", "Alpha", json!("5000"), json!(1)),
                raw("act_2", "Paused", json!("1"), json!(1)),
                raw("act_3", "Gamma", json!("9000"), json!(1)),
            ],
            PageCursors::default(),
        ));
        let (status, body) = block_on(svc.business_accounts(BusinessAccountsRequest {
            access_token: "t".into(),
            business_id: "b1".into(),
            limit: Some(20),
            ..Default::default()
        }));

        assert_eq!(status, 200);
        let accounts = body.data.expect("data");
        assert_eq!(accounts.len(), 2);
        let pagination = body.pagination.expect("pagination");
        assert_eq!(pagination.current_page, 1);
        assert_eq!(pagination.total_items, 2);
        assert!(!pagination.has_next_page);
    }

    #[test]
    fn search_term_is_applied() {
        let svc = service(FakeGateway::with_accounts(
            vec![
                raw("act_123", "Acme", json!("5000"), json!(1)),
                raw("act_456", "Other", json!("5000"), json!(1)),
            ],
            PageCursors::default(),
        ));
        for term in ["456", "act_456"] {
            let (_, body) = block_on(svc.business_accounts(BusinessAccountsRequest {
                access_token: "t".into(),
                business_id: "b1".into(),
                search: Some(term.into()),
                ..Default::default()
            }));
            let ids: Vec<_> = body.data.expect("data").into_iter().map(|a| a.id).collect();
            assert_eq!(ids, vec!["act_456"], "term {term}");
        }
    }

    #[test]
    fn update_spend_cap_is_idempotent_and_rereads() {
        let svc = service(FakeGateway::default());
        let req = UpdateSpendCapRequest {
            access_token: "t".into(),
            ad_account_id: "act_9".into(),
            spend_cap: Some(Decimal::from_str("250").unwrap()),
        };

        let (s1, first) = block_on(svc.update_spend_cap(req.clone()));
        let (s2, second) = block_on(svc.update_spend_cap(req));
        assert_eq!((s1, s2), (200, 200));

        let first = first.data.expect("data");
        let second = second.data.expect("data");
        assert_eq!(first.spend_cap, Some(25000));
        assert_eq!(first, second);
        assert_eq!(*svc.gateway.writes.borrow(), 2);
    }

    #[test]
    fn set_to_one_writes_the_sentinel() {
        let svc = service(FakeGateway::default());
        let (status, body) = block_on(svc.set_spend_cap_to_one(FetchAccountRequest {
            access_token: "t".into(),
            ad_account_id: "123".into(),
        }));
        assert_eq!(status, 200);
        assert_eq!(body.data.expect("data").spend_cap, Some(100));
        assert_eq!(svc.gateway.caps.borrow().get("123"), Some(&Decimal::ONE));
    }

    #[test]
    fn remote_failure_surfaces_upstream_message_without_data() {
        let svc = service(FakeGateway {
            list_error: Some(GatewayError::Remote {
                status: 400,
                message: "(#100) Unsupported get request.".into(),
            }),
            ..Default::default()
        });
        let (status, body) = block_on(svc.inactive_accounts(InactiveAccountsRequest {
            access_token: "t".into(),
            ..Default::default()
        }));
        assert_eq!(status, 400);
        assert!(body.data.is_none());
        assert_eq!(body.error.as_deref(), Some("(#100) Unsupported get request."));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ServiceError::from(GatewayError::Network("x".into())).status(), 500);
        assert_eq!(ServiceError::from(GatewayError::Parse("x".into())).status(), 500);
        assert_eq!(
            ServiceError::from(GatewayError::Remote {
                status: 403,
                message: "x".into()
            })
            .status(),
            400
        );
    }

    #[test]
    fn filter_probe_reports_support() {
        let svc = service(FakeGateway::default());
        let (status, body) = block_on(svc.filter_capabilities(FilterProbeRequest {
            access_token: "t".into(),
        }));
        assert_eq!(status, 200);
        assert_eq!(body.data.expect("data").len(), 5);
        assert_eq!(
            body.message.as_deref(),
            Some("spend_cap filtering is supported by the ads API")
        );
    }
}
