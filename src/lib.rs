//! Spend cap dashboard for ad accounts.
//!
//! The library builds two ways: as the browser app (`App`, mounted by
//! `main` on wasm32) and as the shared core of the JSON API server in
//! `src/bin/server.rs`. `gateway`, `pipeline` and `service` never touch the
//! DOM; everything else is client side.

mod api;
mod app;
mod auth;
mod components;
mod config;
mod pages;
mod state;
mod storage;
mod util;

pub mod contract;
pub mod gateway;
pub mod models;
pub mod money;
pub mod pipeline;
pub mod service;

pub use app::App;

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}

#[cfg(test)]
mod tests {
    use crate::contract::{ApiResponse, AccountSummary};
    use crate::models::Account;

    #[test]
    fn test_account_response_contract_deserialize() {
        let json = r#"{
            "success": true,
            "data": {"id": "act_123", "name": "Acme", "spend_cap": 25000, "currency": "USD"},
            "message": "Account fetched"
        }"#;
        let parsed: ApiResponse<AccountSummary> =
            serde_json::from_str(json).expect("account response should parse");
        assert!(parsed.success);
        let data = parsed.data.expect("data present");
        assert_eq!(data.spend_cap, Some(25000));
        assert!(parsed.pagination.is_none());
    }

    #[test]
    fn test_listing_response_contract_deserialize() {
        let json = r#"{
            "success": true,
            "data": [{
                "id": "act_1",
                "name": "Acme",
                "currency": "EUR",
                "spend_cap": 50000,
                "account_status": "1",
                "last_month_spend": 0
            }],
            "pagination": {
                "currentPage": 2,
                "totalPages": 1,
                "totalItems": 1,
                "itemsPerPage": 20,
                "hasNextPage": true,
                "hasPreviousPage": true,
                "nextCursor": "QVFIUm"
            }
        }"#;
        let parsed: ApiResponse<Vec<Account>> =
            serde_json::from_str(json).expect("listing response should parse");
        let pagination = parsed.pagination.expect("pagination present");
        assert_eq!(pagination.next_cursor.as_deref(), Some("QVFIUm"));
        assert!(pagination.previous_cursor.is_none());
        let accounts = parsed.data.expect("data present");
        assert_eq!(accounts[0].last_month_spend, Some(0));
        assert!(accounts[0].account_status.is("1"));
    }

    #[test]
    fn test_failure_contract_deserialize() {
        let json = r#"{"success": false, "error": "Invalid OAuth access token."}"#;
        let parsed: ApiResponse<AccountSummary> =
            serde_json::from_str(json).expect("failure response should parse");
        assert!(!parsed.success);
        assert!(parsed.data.is_none());
        assert_eq!(parsed.error.as_deref(), Some("Invalid OAuth access token."));
    }
}
