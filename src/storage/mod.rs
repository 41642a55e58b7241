//! Session-scoped persistence. Nothing here outlives the browser tab.

pub(crate) const TOKEN_KEY: &str = "spendcap_access_token";
pub(crate) const BUSINESS_KEY: &str = "spendcap_business_id";
pub(crate) const DATE_PRESET_KEY: &str = "spendcap_date_preset";

fn session_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.session_storage().ok().flatten())
}

pub(crate) fn load_item(key: &str) -> Option<String> {
    session_storage()?
        .get_item(key)
        .ok()
        .flatten()
        .filter(|v| !v.trim().is_empty())
}

pub(crate) fn save_item(key: &str, value: &str) {
    if let Some(storage) = session_storage() {
        let _ = storage.set_item(key, value);
    }
}

pub(crate) fn remove_item(key: &str) {
    if let Some(storage) = session_storage() {
        let _ = storage.remove_item(key);
    }
}

pub(crate) fn load_token() -> Option<String> {
    load_item(TOKEN_KEY).map(|t| t.trim().to_string())
}

pub(crate) fn save_token(token: &str) {
    let token = token.trim();
    if token.is_empty() {
        remove_item(TOKEN_KEY);
    } else {
        save_item(TOKEN_KEY, token);
    }
}

/// Drop the token and every selection made with it.
pub(crate) fn clear_session() {
    remove_item(TOKEN_KEY);
    remove_item(BUSINESS_KEY);
    remove_item(DATE_PRESET_KEY);
}
