//! Login popup wrapper around the ads platform's JavaScript SDK.
//!
//! The SDK script is loaded by `index.html`. Readiness is a single shared
//! promise that settles once: resolved when the SDK initialises, rejected
//! if it has not shown up within [`SDK_TIMEOUT_MS`].

use crate::config::EnvConfig;
use leptos::logging::{log, warn};
use std::cell::RefCell;
use thiserror::Error;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

pub(crate) const SDK_TIMEOUT_MS: i32 = 10_000;
pub(crate) const LOGIN_SCOPES: &str = "ads_read,ads_management";

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LoginError {
    #[error("Login SDK is not loaded. Refresh the page and try again.")]
    SdkNotReady,
    #[error("Authorize the app to access your ads data to continue.")]
    NotAuthorized,
    #[error(
        "The app is not configured for this site. Enable the JavaScript SDK and add this domain to the allowed URLs."
    )]
    AppMisconfigured,
    #[error("Login was cancelled.")]
    Cancelled,
}

/// Maps the SDK's `{status, authResponse}` onto a token or a login error.
pub(crate) fn classify_login_response(
    status: &str,
    access_token: Option<String>,
) -> Result<String, LoginError> {
    match (status, access_token) {
        ("connected", Some(token)) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        ("not_authorized", _) => Err(LoginError::NotAuthorized),
        ("unknown", _) => Err(LoginError::AppMisconfigured),
        _ => Err(LoginError::Cancelled),
    }
}

thread_local! {
    static SDK_READY: RefCell<Option<js_sys::Promise>> = const { RefCell::new(None) };
}

fn sdk_object() -> Option<JsValue> {
    let window = web_sys::window()?;
    let fb = js_sys::Reflect::get(&window, &"FB".into()).ok()?;
    (fb.is_object()).then_some(fb)
}

fn sdk_method(fb: &JsValue, name: &str) -> Option<js_sys::Function> {
    js_sys::Reflect::get(fb, &name.into())
        .ok()
        .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
}

fn set(obj: &js_sys::Object, key: &str, value: JsValue) {
    let _ = js_sys::Reflect::set(obj, &key.into(), &value);
}

fn init_sdk(fb: &JsValue, config: &EnvConfig) -> bool {
    let Some(init) = sdk_method(fb, "init") else {
        return false;
    };
    let opts = js_sys::Object::new();
    set(&opts, "appId", config.facebook_app_id.as_str().into());
    set(&opts, "cookie", JsValue::TRUE);
    set(&opts, "xfbml", JsValue::TRUE);
    set(&opts, "version", config.graph_api_version.as_str().into());
    init.call1(fb, &opts).is_ok()
}

fn build_ready_promise(config: &EnvConfig) -> js_sys::Promise {
    let config = config.clone();
    js_sys::Promise::new(&mut |resolve, reject| {
        let Some(window) = web_sys::window() else {
            let _ = reject.call1(&JsValue::NULL, &"no window".into());
            return;
        };

        if let Some(fb) = sdk_object() {
            if init_sdk(&fb, &config) {
                let _ = resolve.call0(&JsValue::NULL);
                return;
            }
        }

        let on_init = {
            let config = config.clone();
            let resolve = resolve.clone();
            Closure::once_into_js(move || {
                if let Some(fb) = sdk_object() {
                    if init_sdk(&fb, &config) {
                        log!("[LOGIN] SDK initialised");
                        let _ = resolve.call0(&JsValue::NULL);
                    }
                }
            })
        };
        let _ = js_sys::Reflect::set(&window, &"fbAsyncInit".into(), &on_init);

        // Settling twice is a no-op, so the timeout can fire unconditionally.
        let on_timeout = Closure::once_into_js(move || {
            let _ = reject.call1(&JsValue::NULL, &"SDK load timed out".into());
        });
        let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            on_timeout.as_ref().unchecked_ref(),
            SDK_TIMEOUT_MS,
        );
    })
}

/// Shared readiness promise; created on first use.
pub(crate) fn sdk_ready(config: &EnvConfig) -> js_sys::Promise {
    SDK_READY.with(|cell| {
        cell.borrow_mut()
            .get_or_insert_with(|| build_ready_promise(config))
            .clone()
    })
}

/// Opens the login popup and resolves with an access token.
pub(crate) async fn login(config: &EnvConfig) -> Result<String, LoginError> {
    if JsFuture::from(sdk_ready(config)).await.is_err() {
        warn!("[LOGIN] SDK did not become ready");
        return Err(LoginError::SdkNotReady);
    }

    let fb = sdk_object().ok_or(LoginError::SdkNotReady)?;
    let login_fn = sdk_method(&fb, "login").ok_or(LoginError::SdkNotReady)?;

    let response = js_sys::Promise::new(&mut |resolve, _reject| {
        let on_response = Closure::once_into_js(move |response: JsValue| {
            let _ = resolve.call1(&JsValue::NULL, &response);
        });
        let opts = js_sys::Object::new();
        set(&opts, "scope", LOGIN_SCOPES.into());
        set(&opts, "return_scopes", JsValue::TRUE);
        let _ = login_fn.call2(&fb, &on_response, &opts);
    });
    let response = JsFuture::from(response)
        .await
        .map_err(|_| LoginError::Cancelled)?;

    let status = js_sys::Reflect::get(&response, &"status".into())
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default();
    let token = js_sys::Reflect::get(&response, &"authResponse".into())
        .ok()
        .filter(|v| v.is_object())
        .and_then(|auth| js_sys::Reflect::get(&auth, &"accessToken".into()).ok())
        .and_then(|v| v.as_string());

    log!("[LOGIN] popup finished with status {:?}", status);
    classify_login_response(&status, token)
}

/// Best-effort SDK logout. Token storage is cleared by the caller.
pub(crate) fn logout() {
    if let Some(fb) = sdk_object() {
        if let Some(f) = sdk_method(&fb, "logout") {
            let _ = f.call0(&fb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_with_token_logs_in() {
        assert_eq!(
            classify_login_response("connected", Some(" EAAB ".into())),
            Ok("EAAB".into())
        );
    }

    #[test]
    fn statuses_map_to_distinct_errors() {
        assert_eq!(
            classify_login_response("not_authorized", None),
            Err(LoginError::NotAuthorized)
        );
        assert_eq!(
            classify_login_response("unknown", None),
            Err(LoginError::AppMisconfigured)
        );
        assert_eq!(classify_login_response("", None), Err(LoginError::Cancelled));
        assert_eq!(
            classify_login_response("connected", None),
            Err(LoginError::Cancelled)
        );
    }
}
