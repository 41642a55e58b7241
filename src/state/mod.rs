pub(crate) mod pagination;
pub(crate) mod refresh;
pub(crate) mod reset;

use crate::api::{ApiClient, ApiErrorKind};
use crate::config::EnvConfig;
use crate::models::{BusinessManager, DatePreset};
use crate::storage::{
    clear_session, load_item, load_token, save_item, save_token, BUSINESS_KEY, DATE_PRESET_KEY,
};
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::str::FromStr;

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: StoredValue<EnvConfig>,
    pub api_client: RwSignal<ApiClient>,

    /// Mirrors sessionStorage; `None` until pasted or obtained via login.
    pub access_token: RwSignal<Option<String>>,

    pub businesses: RwSignal<Vec<BusinessManager>>,
    pub businesses_loading: RwSignal<bool>,
    pub businesses_error: RwSignal<Option<String>>,
    /// Stale-response guard for the business list.
    pub businesses_request_id: RwSignal<u64>,

    pub selected_business: RwSignal<Option<String>>,
    pub date_preset: RwSignal<DatePreset>,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::load();
        let token = load_token();
        let api_client = ApiClient::new(config.api_url.clone()).with_token(token.clone());

        let selected_business = load_item(BUSINESS_KEY);
        let date_preset = load_item(DATE_PRESET_KEY)
            .and_then(|v| DatePreset::from_str(&v).ok())
            .unwrap_or_default();

        Self {
            config: StoredValue::new(config),
            api_client: RwSignal::new(api_client),
            access_token: RwSignal::new(token),
            businesses: RwSignal::new(vec![]),
            businesses_loading: RwSignal::new(false),
            businesses_error: RwSignal::new(None),
            businesses_request_id: RwSignal::new(0),
            selected_business: RwSignal::new(selected_business),
            date_preset: RwSignal::new(date_preset),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        save_token(token.as_deref().unwrap_or_default());

        let client = self.api_client.get_untracked().with_token(token.clone());
        self.api_client.set(client);
        self.access_token.set(token);
        self.businesses.set(vec![]);
        self.businesses_error.set(None);
    }

    pub fn logout(&self) {
        crate::auth::logout();
        clear_session();
        self.selected_business.set(None);
        self.set_token(None);
    }

    pub fn select_business(&self, business_id: Option<String>) {
        match business_id.as_deref() {
            Some(id) => save_item(BUSINESS_KEY, id),
            None => crate::storage::remove_item(BUSINESS_KEY),
        }
        self.selected_business.set(business_id);
    }

    pub fn set_date_preset(&self, preset: DatePreset) {
        save_item(DATE_PRESET_KEY, preset.as_ref());
        self.date_preset.set(preset);
    }

    /// Loads business managers for the current token and auto-selects the
    /// first one when nothing valid is selected.
    pub fn load_businesses(&self) {
        let state = self.clone();
        let req_id = state.businesses_request_id.get_untracked().saturating_add(1);
        state.businesses_request_id.set(req_id);
        state.businesses_loading.set(true);
        state.businesses_error.set(None);

        let api_client = state.api_client.get_untracked();
        spawn_local(async move {
            let result = api_client.business_managers().await;

            // Ignore stale responses.
            if state.businesses_request_id.get_untracked() != req_id {
                return;
            }

            match result {
                Ok(list) => {
                    log!("[BUSINESS] loaded {} business managers", list.len());
                    let current = state.selected_business.get_untracked();
                    let still_valid = current
                        .as_ref()
                        .is_some_and(|id| list.iter().any(|b| &b.id == id));
                    if !still_valid {
                        state.select_business(list.first().map(|b| b.id.clone()));
                    }
                    state.businesses.set(list);
                }
                Err(e) => {
                    warn!("[BUSINESS] failed to load business managers: {}", e);
                    if e.kind == ApiErrorKind::Unauthorized {
                        state.set_token(None);
                    }
                    state.businesses_error.set(Some(e.message));
                }
            }
            state.businesses_loading.set(false);
        });
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
