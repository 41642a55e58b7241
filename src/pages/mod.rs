mod spend;

pub use spend::AccountSpendPage;

use crate::api::ApiErrorKind;
use crate::components::ui::{
    Alert, AlertDescription, AlertSize, AlertTitle, AlertVariant, Badge, BadgeVariant, Button, ButtonSize,
    ButtonVariant, Card, CardContent, CardDescription, CardFooter, CardHeader, CardTitle, Input,
    Label, Spinner,
};
use crate::contract::{AccountSummary, ProbeResult};
use crate::models::{normalize_account_id, Account};
use crate::state::pagination::{CursorController, FetchPlan, PageStatus};
use crate::state::reset::RowResets;
use crate::state::AppContext;
use crate::util::{cap_kind, cap_label, parse_cap_input, token_preview, CapKind};
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_location;

fn nav_class(active: bool) -> &'static str {
    if active {
        "rounded-md bg-accent px-3 py-1.5 text-xs font-medium text-accent-foreground"
    } else {
        "rounded-md px-3 py-1.5 text-xs text-muted-foreground hover:bg-accent/50 hover:text-foreground"
    }
}

#[component]
pub fn AppShell(children: Children) -> impl IntoView {
    let pathname = use_location().pathname;

    let link = move |href: &'static str, label: &'static str| {
        view! {
            <a href=href class=move || nav_class(pathname.get() == href)>
                {label}
            </a>
        }
    };

    view! {
        <div class="min-h-screen bg-background text-foreground">
            <div class="mx-auto flex w-full max-w-5xl flex-col gap-4 px-4 py-6">
                <header class="flex flex-wrap items-center justify-between gap-3">
                    <a href="/" class="text-sm font-semibold">"Spend Cap Dashboard"</a>
                    <nav class="flex flex-wrap items-center gap-1">
                        {link("/", "Manage caps")}
                        {link("/ad-account-spend", "Account spend")}
                        {link("/reset-spend-cap", "Reset caps")}
                        {link("/test-filtering", "Filter support")}
                    </nav>
                </header>
                <TokenCard />
                {children()}
            </div>
        </div>
    }
}

/// Token entry: paste a token or obtain one through the login popup.
#[component]
pub fn TokenCard() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let token_input: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let logging_in: RwSignal<bool> = RwSignal::new(false);

    let state = app_state.0.clone();
    let on_use_token = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let token = token_input.get_untracked();
        if token.trim().is_empty() {
            error.set(Some("Paste an access token first".to_string()));
            return;
        }
        error.set(None);
        state.set_token(Some(token));
        token_input.set(String::new());
    };

    let state = app_state.0.clone();
    let on_login = move |_: leptos::ev::MouseEvent| {
        let state = state.clone();
        let config = state.config.get_value();
        logging_in.set(true);
        error.set(None);
        spawn_local(async move {
            match crate::auth::login(&config).await {
                Ok(token) => {
                    log!("[LOGIN] obtained token {}", token_preview(&token));
                    state.set_token(Some(token));
                }
                Err(e) => {
                    warn!("[LOGIN] {:?}", e);
                    error.set(Some(e.to_string()));
                }
            }
            logging_in.set(false);
        });
    };

    let state = app_state.0.clone();
    let on_logout = move |_: leptos::ev::MouseEvent| state.logout();

    let access_token = app_state.0.access_token;

    view! {
        <Card class="py-4">
            <CardContent class="px-4">
                <Show
                    when=move || access_token.with(|t| t.is_some())
                    fallback=move || view! {
                        <form class="flex flex-col gap-2 sm:flex-row sm:items-end" on:submit=on_use_token.clone()>
                            <div class="flex flex-1 flex-col gap-1.5">
                                <Label html_for="access-token">"Access token"</Label>
                                <Input
                                    id="access-token"
                                    r#type="password"
                                    placeholder="Paste an ads API access token"
                                    bind_value=token_input
                                    class="h-8"
                                />
                            </div>
                            <div class="flex gap-2">
                                <Button size=ButtonSize::Sm>"Use token"</Button>
                                <Button
                                    variant=ButtonVariant::Outline
                                    size=ButtonSize::Sm
                                    attr:r#type="button"
                                    attr:disabled=move || logging_in.get()
                                    on:click=on_login.clone()
                                >
                                    <Show when=move || logging_in.get() fallback=|| ().into_view()>
                                        <Spinner />
                                    </Show>
                                    "Log in with Facebook"
                                </Button>
                            </div>
                        </form>
                    }
                >
                    <div class="flex items-center justify-between gap-3">
                        <div class="text-xs text-muted-foreground">
                            "Connected with token "
                            <span class="font-mono text-foreground">
                                {move || access_token.get().map(|t| token_preview(&t)).unwrap_or_default()}
                            </span>
                        </div>
                        <Button variant=ButtonVariant::Ghost size=ButtonSize::Sm on:click=on_logout.clone()>
                            "Disconnect"
                        </Button>
                    </div>
                </Show>

                {move || error.get().map(|e| view! {
                    <Alert variant=AlertVariant::Destructive size=AlertSize::Compact class="mt-3">
                        <AlertDescription class="text-xs">{e}</AlertDescription>
                    </Alert>
                })}
            </CardContent>
        </Card>
    }
}

#[component]
fn CapBadge(cap: Option<i64>, #[prop(into)] currency: String) -> impl IntoView {
    let variant = match cap_kind(cap, &currency) {
        CapKind::None => BadgeVariant::Muted,
        CapKind::Paused => BadgeVariant::Paused,
        CapKind::Capped => BadgeVariant::Capped,
    };
    view! { <Badge variant=variant>{cap_label(cap, &currency)}</Badge> }
}

fn error_view(message: String) -> impl IntoView {
    view! {
        <Alert variant=AlertVariant::Destructive>
            <AlertDescription class="text-xs">{message}</AlertDescription>
        </Alert>
    }
}

/// Fetch one account, show its cap, write a new one.
#[component]
pub fn ManageCapsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let api_client = app_state.0.api_client;
    let access_token = app_state.0.access_token;

    let account_id: RwSignal<String> = RwSignal::new(String::new());
    let new_cap: RwSignal<String> = RwSignal::new(String::new());
    let account: RwSignal<Option<AccountSummary>> = RwSignal::new(None);
    let raw_response: RwSignal<Option<String>> = RwSignal::new(None);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let success: RwSignal<Option<String>> = RwSignal::new(None);
    let fetching: RwSignal<bool> = RwSignal::new(false);
    let updating: RwSignal<bool> = RwSignal::new(false);

    let on_fetch = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let id = account_id.get_untracked();
        if id.trim().is_empty() {
            error.set(Some("Enter an ad account ID".to_string()));
            return;
        }

        fetching.set(true);
        error.set(None);
        success.set(None);
        let api_client = api_client.get_untracked();
        spawn_local(async move {
            match api_client.fetch_account(&id).await {
                Ok(found) => {
                    raw_response.set(serde_json::to_string_pretty(&found).ok());
                    account.set(Some(found));
                }
                Err(e) => {
                    account.set(None);
                    error.set(Some(e.message));
                }
            }
            fetching.set(false);
        });
    };

    let on_update = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let Some(current) = account.get_untracked() else {
            return;
        };
        let cap = match parse_cap_input(&new_cap.get_untracked()) {
            Ok(cap) => cap,
            Err(msg) => {
                error.set(Some(msg));
                return;
            }
        };

        updating.set(true);
        error.set(None);
        success.set(None);
        let api_client = api_client.get_untracked();
        spawn_local(async move {
            // The displayed account only changes on success.
            match api_client.update_spend_cap(&current.id, cap).await {
                Ok(updated) => {
                    log!("[MANAGE] cap for {} is now {:?}", updated.id, updated.spend_cap);
                    raw_response.set(serde_json::to_string_pretty(&updated).ok());
                    success.set(Some(format!(
                        "Spend cap set to {}",
                        cap_label(updated.spend_cap, &updated.currency)
                    )));
                    account.set(Some(updated));
                    new_cap.set(String::new());
                }
                Err(e) => error.set(Some(e.message)),
            }
            updating.set(false);
        });
    };

    let no_token = move || access_token.with(|t| t.is_none());

    view! {
        <AppShell>
            <Card>
                <CardHeader>
                    <CardTitle class="text-base">"Manage spend cap"</CardTitle>
                    <CardDescription class="text-xs">
                        "Look up an ad account and set a new cap in the account currency."
                    </CardDescription>
                </CardHeader>
                <CardContent class="flex flex-col gap-4">
                    <form class="flex items-end gap-2" on:submit=on_fetch>
                        <div class="flex flex-1 flex-col gap-1.5">
                            <Label html_for="account-id">"Ad account ID"</Label>
                            <Input id="account-id" placeholder="act_1234567890" bind_value=account_id class="h-8" />
                        </div>
                        <Button size=ButtonSize::Sm attr:disabled=move || fetching.get() || no_token()>
                            <Show when=move || fetching.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            "Fetch"
                        </Button>
                    </form>

                    {move || error.get().map(error_view)}
                    {move || success.get().map(|msg| view! {
                        <Alert>
                            <AlertDescription class="text-xs">{msg}</AlertDescription>
                        </Alert>
                    })}

                    {move || account.get().map(|a| {
                        let currency = a.currency.clone();
                        view! {
                            <div class="flex flex-col gap-3 rounded-lg border p-4">
                                <div class="flex items-center justify-between gap-2">
                                    <div>
                                        <div class="text-sm font-medium">{a.name.clone()}</div>
                                        <div class="font-mono text-xs text-muted-foreground">{a.id.clone()}</div>
                                    </div>
                                    <CapBadge cap=a.spend_cap currency=currency.clone() />
                                </div>
                                <form class="flex items-end gap-2" on:submit=on_update>
                                    <div class="flex flex-1 flex-col gap-1.5">
                                        <Label html_for="new-cap">{format!("New cap ({currency})")}</Label>
                                        <Input
                                            id="new-cap"
                                            r#type="number"
                                            step="0.01"
                                            min="0"
                                            placeholder="250.00"
                                            bind_value=new_cap
                                            class="h-8"
                                        />
                                    </div>
                                    <Button size=ButtonSize::Sm attr:disabled=move || updating.get()>
                                        <Show when=move || updating.get() fallback=|| ().into_view()>
                                            <Spinner />
                                        </Show>
                                        "Update cap"
                                    </Button>
                                </form>
                            </div>
                        }
                    })}

                    {move || raw_response.get().map(|json| view! {
                        <details class="text-xs">
                            <summary class="cursor-pointer text-muted-foreground">"Raw response"</summary>
                            <pre class="mt-2 overflow-x-auto rounded-md bg-muted p-3 font-mono">{json}</pre>
                        </details>
                    })}
                </CardContent>
            </Card>
        </AppShell>
    }
}

/// Accounts with no spend last month, each with a one-click reset to the
/// paused sentinel.
#[component]
pub fn ResetCapsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let api_client = app_state.0.api_client;
    let access_token = app_state.0.access_token;

    let controller: RwSignal<CursorController> = RwSignal::new(CursorController::default());
    let accounts: RwSignal<Vec<Account>> = RwSignal::new(vec![]);
    let rows: RwSignal<RowResets> = RwSignal::new(RowResets::default());
    let notice: RwSignal<Option<String>> = RwSignal::new(None);

    let fetch = move |plan: FetchPlan| {
        let api_client = api_client.get_untracked();
        spawn_local(async move {
            let result = api_client.inactive_accounts(plan.page_number, plan.after.clone()).await;
            let outcome = result
                .as_ref()
                .map(|page| page.pagination.cursors())
                .map_err(|e| {
                    if e.kind == ApiErrorKind::Unauthorized {
                        "Access token was rejected".to_string()
                    } else {
                        e.message.clone()
                    }
                });
            let applied = controller
                .try_update(|c| c.resolve(plan.generation, outcome))
                .unwrap_or(false);
            if !applied {
                return;
            }
            if let Ok(page) = result {
                log!("[PAGINATION] {} inactive accounts on page {}", page.accounts.len(), plan.page_number);
                rows.update(|r| r.clear_errors());
                accounts.set(page.accounts);
            }
        });
    };

    Effect::new(move |_| {
        let has_token = access_token.with(|t| t.is_some());
        if !has_token {
            accounts.set(vec![]);
        }
        if let Some(plan) = controller.try_update(|c| c.start(has_token, true)).flatten() {
            fetch(plan);
        }
    });

    let on_reset = move |id: String| {
        if !rows.try_update(|r| r.begin(&id)).unwrap_or(false) {
            return;
        }
        let api_client = api_client.get_untracked();
        spawn_local(async move {
            let outcome = match api_client.set_spend_cap_to_one(&id).await {
                Ok(updated) => {
                    log!("[RESET] {} paused at {:?}", updated.id, updated.spend_cap);
                    let key = normalize_account_id(&id).to_string();
                    accounts.update(|list| list.retain(|a| normalize_account_id(&a.id) != key));
                    Ok(())
                }
                Err(e) => {
                    warn!("[RESET] {} failed: {}", id, e);
                    Err(e.message)
                }
            };
            rows.update(|r| r.finish(&id, outcome));
        });
    };

    let on_next = move |_| match controller.try_update(|c| c.next()) {
        Some(Ok(plan)) => {
            notice.set(None);
            fetch(plan);
        }
        Some(Err(limit)) => notice.set(Some(limit.to_string())),
        None => {}
    };

    let on_previous = move |_| match controller.try_update(|c| c.previous()) {
        Some(Ok((plan, limit))) => {
            notice.set(limit.map(|l| l.to_string()));
            fetch(plan);
        }
        Some(Err(limit)) => notice.set(Some(limit.to_string())),
        None => {}
    };

    let on_retry = move |_| {
        if let Some(plan) = controller.try_update(|c| c.retry()).flatten() {
            fetch(plan);
        }
    };

    let loading = move || controller.with(|c| c.is_loading());
    let status_error = move || {
        controller.with(|c| match c.status() {
            PageStatus::Error(msg) => Some(msg.clone()),
            _ => None,
        })
    };

    view! {
        <AppShell>
            <Card>
                <CardHeader>
                    <CardTitle class="text-base">"Reset inactive accounts"</CardTitle>
                    <CardDescription class="text-xs">
                        "Active accounts with a spend cap and no spend last month. Resetting sets the cap to 1."
                    </CardDescription>
                </CardHeader>
                <CardContent class="flex flex-col gap-3">
                    <Show when=move || access_token.with(|t| t.is_none()) fallback=|| ().into_view()>
                        <div class="text-xs text-muted-foreground">"Connect an access token to load accounts."</div>
                    </Show>

                    {move || status_error().map(|msg| view! {
                        <Alert variant=AlertVariant::Destructive>
                            <AlertTitle class="text-xs">"Could not load accounts"</AlertTitle>
                            <AlertDescription class="flex items-center justify-between gap-2 text-xs">
                                {msg}
                                <Button variant=ButtonVariant::Outline size=ButtonSize::Sm on:click=on_retry>"Retry"</Button>
                            </AlertDescription>
                        </Alert>
                    })}

                    {move || notice.get().map(|msg| view! {
                        <Alert variant=AlertVariant::Notice size=AlertSize::Compact>
                            <AlertDescription class="text-xs">{msg}</AlertDescription>
                        </Alert>
                    })}

                    <Show when=loading fallback=|| ().into_view()>
                        <div class="flex items-center gap-2 text-xs text-muted-foreground">
                            <Spinner />
                            "Loading accounts..."
                        </div>
                    </Show>

                    <div class="overflow-x-auto">
                        <table class="w-full text-left text-xs">
                            <thead class="text-muted-foreground">
                                <tr class="border-b">
                                    <th class="py-2 pr-3 font-medium">"Account"</th>
                                    <th class="py-2 pr-3 font-medium">"Spend cap"</th>
                                    <th class="py-2 pr-3 font-medium">"Last month"</th>
                                    <th class="py-2 font-medium"></th>
                                </tr>
                            </thead>
                            <tbody>
                                <For
                                    each=move || accounts.get()
                                    key=|a| a.id.clone()
                                    children=move |a: Account| {
                                        let id = a.id.clone();
                                        let id_busy = id.clone();
                                        let id_err = id.clone();
                                        let busy = Signal::derive(move || rows.with(|r| r.is_busy(&id_busy)));
                                        let row_error = move || rows.with(|r| r.error(&id_err));
                                        let spend = a
                                            .last_month_spend
                                            .map(|s| crate::money::format_minor(s, &a.currency))
                                            .unwrap_or_else(|| "-".to_string());
                                        view! {
                                            <tr class="border-b align-top">
                                                <td class="py-2 pr-3">
                                                    <div class="font-medium">{a.name.clone()}</div>
                                                    <div class="font-mono text-muted-foreground">{a.id.clone()}</div>
                                                    {move || row_error().map(|e| view! {
                                                        <div class="mt-1 text-destructive">{e}</div>
                                                    })}
                                                </td>
                                                <td class="py-2 pr-3">
                                                    <CapBadge cap=a.spend_cap currency=a.currency.clone() />
                                                </td>
                                                <td class="py-2 pr-3 tabular-nums">{spend}</td>
                                                <td class="py-2 text-right">
                                                    <Button
                                                        variant=ButtonVariant::Destructive
                                                        size=ButtonSize::Sm
                                                        attr:disabled=move || busy.get()
                                                        on:click=move |_| on_reset(id.clone())
                                                    >
                                                        <Show when=move || busy.get() fallback=|| ().into_view()>
                                                            <Spinner class="text-white" />
                                                        </Show>
                                                        "Set cap to 1"
                                                    </Button>
                                                </td>
                                            </tr>
                                        }
                                    }
                                />
                            </tbody>
                        </table>
                    </div>

                    <Show
                        when=move || !loading() && accounts.with(|a| a.is_empty()) && access_token.with(|t| t.is_some())
                        fallback=|| ().into_view()
                    >
                        <div class="py-4 text-center text-xs text-muted-foreground">
                            "No inactive accounts on this page."
                        </div>
                    </Show>
                </CardContent>
                <CardFooter class="border-t">
                    <span class="text-xs text-muted-foreground">
                        {move || format!("Page {}", controller.with(|c| c.page_number()))}
                    </span>
                    <div class="flex gap-2">
                        <Button
                            variant=ButtonVariant::Outline
                            size=ButtonSize::Sm
                            attr:disabled=move || !controller.with(|c| c.can_go_previous())
                            on:click=on_previous
                        >
                            "Previous"
                        </Button>
                        <Button
                            variant=ButtonVariant::Outline
                            size=ButtonSize::Sm
                            attr:disabled=move || !controller.with(|c| c.can_go_next())
                            on:click=on_next
                        >
                            "Next"
                        </Button>
                    </div>
                </CardFooter>
            </Card>
        </AppShell>
    }
}

/// Runs the remote filter probes and lists what the ads API accepted.
#[component]
pub fn FilterProbePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let api_client = app_state.0.api_client;
    let access_token = app_state.0.access_token;

    let results: RwSignal<Vec<ProbeResult>> = RwSignal::new(vec![]);
    let running: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let on_run = move |_| {
        running.set(true);
        error.set(None);
        let api_client = api_client.get_untracked();
        spawn_local(async move {
            match api_client.filter_capabilities().await {
                Ok(list) => results.set(list),
                Err(e) => error.set(Some(e.message)),
            }
            running.set(false);
        });
    };

    view! {
        <AppShell>
            <Card>
                <CardHeader>
                    <CardTitle class="text-base">"Remote filter support"</CardTitle>
                    <CardDescription class="text-xs">
                        "Checks which spend_cap filters the ads API accepts on account listings."
                    </CardDescription>
                </CardHeader>
                <CardContent class="flex flex-col gap-3">
                    <Button
                        size=ButtonSize::Sm
                        attr:disabled=move || running.get() || access_token.with(|t| t.is_none())
                        on:click=on_run
                    >
                        <Show when=move || running.get() fallback=|| ().into_view()>
                            <Spinner />
                        </Show>
                        "Run probes"
                    </Button>

                    {move || error.get().map(error_view)}

                    <ul class="flex flex-col gap-2">
                        {move || results.get().into_iter().map(|r| {
                            let variant = if r.success { BadgeVariant::Capped } else { BadgeVariant::Paused };
                            view! {
                                <li class="flex items-start justify-between gap-3 rounded-md border p-3 text-xs">
                                    <div>
                                        <div class="font-medium">{r.test.clone()}</div>
                                        {r.error.clone().map(|e| view! { <div class="text-muted-foreground">{e}</div> })}
                                    </div>
                                    <Badge variant=variant>
                                        {if r.success { format!("OK, {} rows", r.account_count) } else { "Rejected".to_string() }}
                                    </Badge>
                                </li>
                            }
                        }).collect_view()}
                    </ul>
                </CardContent>
            </Card>
        </AppShell>
    }
}
