use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::Local;
use clap::Parser;
use serde::Serialize;
use spendcap_dashboard::contract::{
    paths, AccountSpendRequest, BusinessAccountsRequest, BusinessManagersRequest,
    FetchAccountRequest, FilterProbeRequest, InactiveAccountsRequest, UpdateSpendCapRequest,
};
use spendcap_dashboard::gateway::{GatewayConfig, GraphClient, DEFAULT_GRAPH_URL};
use spendcap_dashboard::money::AmountUnit;
use spendcap_dashboard::pipeline::{FilterStrategy, PipelineConfig};
use spendcap_dashboard::service::{AccountService, Reply};
use std::io::Write;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

type Service = Arc<AccountService<GraphClient>>;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "JSON API for the spend cap dashboard", long_about = None)]
struct Args {
    #[arg(long, env = "SPENDCAP_BIND", default_value = "0.0.0.0:5000")]
    bind: String,

    #[arg(long, env = "SPENDCAP_GRAPH_URL", default_value = DEFAULT_GRAPH_URL)]
    graph_url: String,

    /// Status code the ads API uses for active accounts.
    #[arg(long, env = "SPENDCAP_ACTIVE_STATUS", default_value = "1")]
    active_status: String,

    /// Unit of `spend_cap` on listing responses: `minor` or `major`.
    #[arg(long, env = "SPENDCAP_CAP_UNIT", default_value = "minor")]
    cap_unit: AmountUnit,

    #[arg(long, env = "SPENDCAP_ENRICHMENT_CONCURRENCY", default_value = "6")]
    enrichment_concurrency: usize,

    /// Push the spend cap floor into the remote `filtering` parameter.
    #[arg(long, env = "SPENDCAP_REMOTE_CAP_FILTER", default_value_t = false, action = clap::ArgAction::Set)]
    remote_cap_filter: bool,

    /// Re-check account status on the fetched page.
    #[arg(long, env = "SPENDCAP_LOCAL_STATUS_FILTER", default_value_t = true, action = clap::ArgAction::Set)]
    local_status_filter: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            active_status: self.active_status.trim().to_string(),
            cap_unit: self.cap_unit,
            strategy: FilterStrategy {
                remote_cap: self.remote_cap_filter,
                local_status: self.local_status_filter,
                ..Default::default()
            },
            enrichment_concurrency: self.enrichment_concurrency.max(1),
        }
    }
}

fn respond<T: Serialize>((status, body): Reply<T>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

async fn account(State(svc): State<Service>, Json(req): Json<FetchAccountRequest>) -> Response {
    respond(svc.fetch_account(req).await)
}

async fn update_spend_cap(
    State(svc): State<Service>,
    Json(req): Json<UpdateSpendCapRequest>,
) -> Response {
    respond(svc.update_spend_cap(req).await)
}

async fn set_spend_cap_to_one(
    State(svc): State<Service>,
    Json(req): Json<FetchAccountRequest>,
) -> Response {
    respond(svc.set_spend_cap_to_one(req).await)
}

async fn business_managers(
    State(svc): State<Service>,
    Json(req): Json<BusinessManagersRequest>,
) -> Response {
    respond(svc.business_managers(req).await)
}

async fn business_manager_accounts(
    State(svc): State<Service>,
    Json(req): Json<BusinessAccountsRequest>,
) -> Response {
    respond(svc.business_accounts(req).await)
}

async fn account_spend(
    State(svc): State<Service>,
    Json(req): Json<AccountSpendRequest>,
) -> Response {
    respond(svc.account_spend(req).await)
}

async fn inactive_accounts(
    State(svc): State<Service>,
    Json(req): Json<InactiveAccountsRequest>,
) -> Response {
    respond(svc.inactive_accounts(req).await)
}

async fn filter_capabilities(
    State(svc): State<Service>,
    Json(req): Json<FilterProbeRequest>,
) -> Response {
    respond(svc.filter_capabilities(req).await)
}

fn router(svc: Service) -> Router {
    Router::new()
        .route(paths::ACCOUNT, post(account))
        .route(paths::UPDATE_SPEND_CAP, post(update_spend_cap))
        .route(paths::SET_SPEND_CAP_TO_ONE, post(set_spend_cap_to_one))
        .route(paths::BUSINESS_MANAGERS, post(business_managers))
        .route(paths::BUSINESS_MANAGER_ACCOUNTS, post(business_manager_accounts))
        .route(paths::ACCOUNT_SPEND, post(account_spend))
        .route(paths::INACTIVE_ACCOUNTS, post(inactive_accounts))
        .route(paths::FILTER_CAPABILITIES, post(filter_capabilities))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(svc)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info");
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.module_path().unwrap_or("<unnamed>"),
                &record.args()
            )
        })
        .init();

    let args = Args::parse();
    let gateway = GraphClient::new(GatewayConfig {
        graph_url: args.graph_url.clone(),
        ..Default::default()
    });
    let svc = Arc::new(AccountService::new(gateway, args.pipeline_config()));

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    log::info!(
        "spendcap server listening on http://{} (graph api {})",
        args.bind,
        args.graph_url
    );
    axum::serve(listener, router(svc)).await
}
