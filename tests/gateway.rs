use rust_decimal::Decimal;
use serde_json::json;
use spendcap_dashboard::gateway::{
    AdsGateway, AuthContext, FilterPredicate, GatewayConfig, GatewayError, GraphClient, ListQuery,
};
use spendcap_dashboard::models::{AccountScope, DatePreset};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GraphClient {
    GraphClient::new(GatewayConfig {
        graph_url: server.uri(),
        ..Default::default()
    })
}

fn auth() -> AuthContext {
    AuthContext::new("test-token")
}

#[tokio::test]
async fn lists_business_accounts_with_filter_and_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/b1/owned_ad_accounts"))
        .and(query_param("access_token", "test-token"))
        .and(query_param("after", "CURSOR_1"))
        .and(query_param("limit", "20"))
        .and(query_param(
            "filtering",
            r#"[{"field":"account_status","operator":"EQUAL","value":"1"}]"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "act_1", "name": "Alpha", "spend_cap": "5000", "currency": "USD", "account_status": 1},
                {"id": "act_2", "name": "Beta", "spend_cap": 100, "account_status": "1"}
            ],
            "paging": {
                "cursors": {"before": "B2", "after": "A2"},
                "next": "https://graph.example/next",
                "previous": "https://graph.example/prev"
            }
        })))
        .mount(&server)
        .await;

    let query = ListQuery {
        limit: 20,
        after: Some("CURSOR_1".into()),
        before: None,
        filtering: vec![FilterPredicate::status_equals("1")],
    };
    let page = client(&server)
        .list_accounts(&auth(), &AccountScope::Business("b1".into()), &query)
        .await
        .expect("listing should succeed");

    assert_eq!(page.accounts.len(), 2);
    assert_eq!(page.accounts[1].spend_cap, json!(100));
    assert_eq!(page.cursors.next.as_deref(), Some("A2"));
    assert_eq!(page.cursors.previous.as_deref(), Some("B2"));
    assert!(page.cursors.has_next);
    assert!(page.cursors.has_previous);
}

#[tokio::test]
async fn remote_error_message_is_passed_through_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/adaccounts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Invalid OAuth access token - Cannot parse access token", "code": 190}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .list_accounts(&auth(), &AccountScope::Me, &ListQuery::default())
        .await
        .expect_err("listing should fail");

    assert_eq!(
        err,
        GatewayError::Remote {
            status: 400,
            message: "Invalid OAuth access token - Cannot parse access token".into()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/act_7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_account(&auth(), "7")
        .await
        .expect_err("fetch should fail");
    assert!(matches!(err, GatewayError::Parse(_)));
}

#[tokio::test]
async fn empty_insights_mean_zero_spend() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/act_9/insights"))
        .and(query_param("date_preset", "last_month"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let spend = client(&server)
        .fetch_account_spend(&auth(), "act_9", DatePreset::LastMonth)
        .await
        .expect("insights should succeed");
    assert_eq!(spend.spend, 0);
    assert_eq!(spend.currency, None);
}

#[tokio::test]
async fn insights_spend_is_converted_to_minor_units() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/act_9/insights"))
        .and(query_param("date_preset", "last_30d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"spend": "123.45", "account_currency": "EUR"}]
        })))
        .mount(&server)
        .await;

    let spend = client(&server)
        .fetch_account_spend(&auth(), "9", DatePreset::Last30d)
        .await
        .expect("insights should succeed");
    assert_eq!(spend.spend, 12345);
    assert_eq!(spend.currency.as_deref(), Some("EUR"));
}

#[tokio::test]
async fn update_posts_form_then_rereads_account() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/act_5"))
        .and(body_string_contains("spend_cap=250.5"))
        .and(body_string_contains("access_token=test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/act_5"))
        .and(query_param("fields", "id,name,spend_cap,currency"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "act_5", "name": "Five", "spend_cap": "25050", "currency": "USD"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let account = client(&server)
        .update_spend_cap(&auth(), "5", Decimal::new(25050, 2))
        .await
        .expect("update should succeed");
    assert_eq!(account.id, "act_5");
    assert_eq!(account.spend_cap, json!("25050"));
}

#[tokio::test]
async fn failed_write_skips_reread() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/act_5"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"message": "(#200) Permissions error"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/act_5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "act_5"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .update_spend_cap(&auth(), "act_5", Decimal::ONE)
        .await
        .expect_err("update should fail");
    assert_eq!(err.to_string(), "(#200) Permissions error");
}

#[tokio::test]
async fn lists_business_managers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/businesses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "b1", "name": "First"}, {"id": "b2", "name": "Second"}]
        })))
        .mount(&server)
        .await;

    let managers = client(&server)
        .list_business_managers(&auth())
        .await
        .expect("listing should succeed");
    let names: Vec<_> = managers.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second"]);
}
