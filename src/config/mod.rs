use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:5000";
pub(crate) const DEFAULT_FACEBOOK_APP_ID: &str = "426361686419846";
pub(crate) const DEFAULT_GRAPH_API_VERSION: &str = "v19.0";
pub(crate) const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 6;
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 20;

/// Browser-side settings, read once from `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnvConfig {
    pub api_url: String,
    pub facebook_app_id: String,
    pub graph_api_version: String,
    /// Upper bound on in-flight spend lookups per page.
    pub enrichment_concurrency: usize,
    pub page_size: u32,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            facebook_app_id: DEFAULT_FACEBOOK_APP_ID.to_string(),
            graph_api_version: DEFAULT_GRAPH_API_VERSION.to_string(),
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn env_string(env: &wasm_bindgen::JsValue, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        js_sys::Reflect::get(env, &(*k).into())
            .ok()
            .and_then(|v| {
                v.as_string()
                    .or_else(|| v.as_f64().map(|n| n.to_string()))
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

impl EnvConfig {
    /// Reads `window.ENV`, falling back to defaults for anything missing.
    ///
    /// Both the documented upper-case keys (`API_URL`) and the lower-case
    /// variants (`api_url`) are accepted.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        let Some(window) = web_sys::window() else {
            return cfg;
        };
        let Some(env) = window.get("ENV") else {
            return cfg;
        };
        if env.is_undefined() || !env.is_object() {
            return cfg;
        }
        let env: wasm_bindgen::JsValue = env.into();

        if let Some(v) = env_string(&env, &["API_URL", "api_url"]) {
            cfg.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env_string(&env, &["FACEBOOK_APP_ID", "facebook_app_id"]) {
            cfg.facebook_app_id = v;
        }
        if let Some(v) = env_string(&env, &["GRAPH_API_VERSION", "graph_api_version"]) {
            cfg.graph_api_version = v;
        }
        cfg.enrichment_concurrency = env_string(&env, &["ENRICHMENT_CONCURRENCY"])
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(cfg.enrichment_concurrency);
        cfg.page_size = env_string(&env, &["PAGE_SIZE"])
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| (1..=100).contains(n))
            .unwrap_or(cfg.page_size);

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EnvConfig::default();
        assert_eq!(cfg.api_url, "http://localhost:5000");
        assert_eq!(cfg.graph_api_version, "v19.0");
        assert_eq!(cfg.enrichment_concurrency, 6);
        assert_eq!(cfg.page_size, 20);
    }
}
