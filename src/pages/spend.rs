use super::{AppShell, CapBadge};
use crate::api::{AccountsQuery, ApiErrorKind};
use crate::components::ui::{
    Alert, AlertDescription, AlertSize, AlertTitle, AlertVariant, Button, ButtonSize,
    ButtonVariant, Card, CardContent, CardDescription, CardFooter, CardHeader, CardTitle, Input,
    Label, NativeSelect, Spinner,
};
use crate::models::{Account, DatePreset};
use crate::money::format_minor;
use crate::state::pagination::{CursorController, FetchPlan, PageStatus, PresetChange};
use crate::state::refresh::{
    fan_out, EnrichmentBatch, EnrichmentError, SearchDebounce, SpendBoard, SEARCH_DEBOUNCE_MS,
};
use crate::state::AppContext;
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::{set_timeout_with_handle, TimeoutHandle};
use std::str::FromStr;
use std::time::Duration;
use strum::IntoEnumIterator;

/// Business account listing with per-row spend for the chosen date window.
#[component]
pub fn AccountSpendPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let state = app_state.0.clone();
    let config = state.config;
    let api_client = state.api_client;
    let access_token = state.access_token;
    let businesses = state.businesses;
    let selected_business = state.selected_business;
    let date_preset = state.date_preset;

    let controller: RwSignal<CursorController> = RwSignal::new(CursorController::default());
    let board: RwSignal<SpendBoard> = RwSignal::new(SpendBoard::default());
    let accounts: RwSignal<Vec<Account>> = RwSignal::new(vec![]);
    let notice: RwSignal<Option<String>> = RwSignal::new(None);

    let search_input: RwSignal<String> = RwSignal::new(String::new());
    let debounce: StoredValue<SearchDebounce> = StoredValue::new(SearchDebounce::default());
    let search_timer: StoredValue<Option<TimeoutHandle>> = StoredValue::new(None);

    let enrich = move |batch: EnrichmentBatch| {
        let api_client = api_client.get_untracked();
        let preset = date_preset.get_untracked();
        let concurrency = config.with_value(|c| c.enrichment_concurrency);
        let generation = batch.generation;
        log!(
            "[SPEND-LOADER] looking up {} accounts for {} (gen {})",
            batch.ids.len(),
            preset,
            generation
        );
        spawn_local(fan_out(
            batch.ids,
            concurrency,
            move |id| {
                let api_client = api_client.clone();
                async move {
                    api_client
                        .account_spend(&id, preset)
                        .await
                        .map(|s| s.spend)
                        .map_err(|e| EnrichmentError(e.message))
                }
            },
            move |id, result| {
                if let Err(e) = &result {
                    warn!("[SPEND-LOADER] {} failed: {}", id, e);
                }
                board.update(|b| {
                    b.apply(generation, &id, result);
                });
            },
        ));
    };

    let fetch = move |plan: FetchPlan| {
        let Some(business_id) = selected_business.get_untracked() else {
            return;
        };
        let search = debounce.with_value(|d| d.committed().to_string());
        let query = AccountsQuery {
            business_id,
            page: plan.page_number,
            limit: config.with_value(|c| c.page_size),
            after: plan.after.clone(),
            search: (!search.is_empty()).then_some(search),
        };
        let api_client = api_client.get_untracked();

        spawn_local(async move {
            let result = api_client.business_accounts(&query).await;
            let outcome = result
                .as_ref()
                .map(|page| page.pagination.cursors())
                .map_err(|e| match e.kind {
                    ApiErrorKind::Unauthorized => "Access token was rejected".to_string(),
                    _ => e.message.clone(),
                });

            // Superseded by a newer business, search, or page.
            let applied = controller
                .try_update(|c| c.resolve(plan.generation, outcome))
                .unwrap_or(false);
            if !applied {
                return;
            }

            let Ok(page) = result else {
                return;
            };
            log!(
                "[PAGINATION] page {} has {} accounts",
                plan.page_number,
                page.accounts.len()
            );
            let ids: Vec<String> = page.accounts.iter().map(|a| a.id.clone()).collect();
            accounts.set(page.accounts);
            if let Some(batch) = board.try_update(|b| b.on_accounts_loaded(&ids)).flatten() {
                enrich(batch);
            }
        });
    };

    // Business or committed search changed: drop rows and cursors, reload page 1.
    let restart = move || {
        notice.set(None);
        board.update(|b| b.invalidate());
        accounts.set(vec![]);
        if let Some(plan) = controller.try_update(|c| c.reset()).flatten() {
            fetch(plan);
        }
    };

    let loader = state.clone();
    Effect::new(move |_| {
        if access_token.with(|t| t.is_some()) {
            loader.load_businesses();
        }
    });

    Effect::new(move |prev: Option<Option<String>>| {
        let has_token = access_token.with(|t| t.is_some());
        let business = selected_business.get();
        let changed = prev.as_ref().is_some_and(|p| p != &business);

        if !has_token || business.is_none() {
            board.update(|b| b.invalidate());
            accounts.set(vec![]);
        }

        let started = controller
            .try_update(|c| c.start(has_token, business.is_some()))
            .flatten();
        match started {
            Some(plan) => fetch(plan),
            None if changed && has_token && business.is_some() => restart(),
            None => {}
        }
        business
    });

    let on_search_input = Callback::new(move |text: String| {
        if let Some(handle) = search_timer.get_value() {
            handle.clear();
        }
        let Some(ticket) = debounce.try_update_value(|d| d.input(&text)) else {
            return;
        };
        let handle = set_timeout_with_handle(
            move || {
                let committed = debounce.try_update_value(|d| d.fire(ticket)).flatten();
                if let Some(term) = committed {
                    log!("[SEARCH] committed: {:?}", term);
                    restart();
                }
            },
            Duration::from_millis(SEARCH_DEBOUNCE_MS),
        )
        .ok();
        search_timer.set_value(handle);
    });

    let on_clear_search = move |_| {
        if let Some(handle) = search_timer.get_value() {
            handle.clear();
        }
        search_input.set(String::new());
        let had_term = debounce.with_value(|d| !d.committed().is_empty());
        debounce.update_value(|d| d.clear());
        if had_term {
            restart();
        }
    };

    let selector_state = state.clone();
    let on_business_change = Callback::new(move |id: String| {
        let id = Some(id).filter(|v| !v.is_empty());
        selector_state.select_business(id);
    });

    let preset_state = state.clone();
    let on_preset_change = Callback::new(move |value: String| {
        let Ok(preset) = DatePreset::from_str(&value) else {
            return;
        };
        if preset == date_preset.get_untracked() {
            return;
        }
        preset_state.set_date_preset(preset);

        match controller.try_update(|c| c.preset_changed()) {
            Some(PresetChange::RefreshEnrichment) => {
                if let Some(batch) = board.try_update(|b| b.on_preset_changed()).flatten() {
                    enrich(batch);
                }
            }
            Some(PresetChange::Refetch(plan)) => {
                board.update(|b| b.invalidate());
                fetch(plan);
            }
            _ => {}
        }
    });

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

    let business_options = Signal::derive(move || {
        businesses
            .get()
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect::<Vec<_>>()
    });
    let business_value = Signal::derive(move || selected_business.get().unwrap_or_default());
    let preset_options = Signal::derive(|| {
        DatePreset::iter()
            .map(|p| (p.as_ref().to_string(), p.label().to_string()))
            .collect::<Vec<_>>()
    });
    let preset_value = Signal::derive(move || date_preset.get().as_ref().to_string());

    let loading = move || controller.with(|c| c.is_loading());
    let status_error = move || {
        controller.with(|c| match c.status() {
            PageStatus::Error(msg) => Some(msg.clone()),
            _ => None,
        })
    };
    let businesses_loading = state.businesses_loading;
    let businesses_error = state.businesses_error;

    view! {
        <AppShell>
            <Card>
                <CardHeader>
                    <CardTitle class="text-base">"Ad account spend"</CardTitle>
                    <CardDescription class="text-xs">
                        "Accounts owned by a business manager, with spend over the selected window."
                    </CardDescription>
                </CardHeader>
                <CardContent class="flex flex-col gap-3">
                    <div class="grid gap-3 sm:grid-cols-3">
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="business">"Business manager"</Label>
                            <NativeSelect
                                id="business"
                                class="h-8"
                                options=business_options
                                value=business_value
                                disabled=Signal::derive(move || businesses_loading.get() || access_token.with(|t| t.is_none()))
                                on_change=on_business_change
                            />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="date-preset">"Spend window"</Label>
                            <NativeSelect
                                id="date-preset"
                                class="h-8"
                                options=preset_options
                                value=preset_value
                                on_change=on_preset_change
                            />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="account-search">"Search"</Label>
                            <div class="flex gap-1">
                                <Input
                                    id="account-search"
                                    placeholder="Name or account ID"
                                    bind_value=search_input
                                    on_input=on_search_input
                                    class="h-8"
                                />
                                <Button
                                    variant=ButtonVariant::Ghost
                                    size=ButtonSize::Sm
                                    attr:title="Clear search"
                                    on:click=on_clear_search
                                >
                                    "Clear"
                                </Button>
                            </div>
                        </div>
                    </div>

                    {move || businesses_error.get().map(|msg| view! {
                        <Alert variant=AlertVariant::Destructive size=AlertSize::Compact>
                            <AlertDescription class="text-xs">{msg}</AlertDescription>
                        </Alert>
                    })}

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
                                    <th class="py-2 pr-3 font-medium">"Status"</th>
                                    <th class="py-2 pr-3 font-medium">"Spend cap"</th>
                                    <th class="py-2 text-right font-medium">
                                        {move || date_preset.get().label()}
                                    </th>
                                </tr>
                            </thead>
                            <tbody>
                                <For
                                    each=move || accounts.get()
                                    key=|a| a.id.clone()
                                    children=move |a: Account| {
                                        let id = a.id.clone();
                                        let currency = a.currency.clone();
                                        let slot = move || board.with(|b| b.slot(&id).cloned());
                                        view! {
                                            <tr class="border-b">
                                                <td class="py-2 pr-3">
                                                    <div class="font-medium">{a.name.clone()}</div>
                                                    <div class="font-mono text-muted-foreground">{a.id.clone()}</div>
                                                </td>
                                                <td class="py-2 pr-3 font-mono">{a.account_status.0.clone()}</td>
                                                <td class="py-2 pr-3">
                                                    <CapBadge cap=a.spend_cap currency=a.currency.clone() />
                                                </td>
                                                <td class="py-2 text-right tabular-nums">
                                                    {move || match slot() {
                                                        Some(s) if s.loading => view! { <Spinner class="ml-auto" /> }.into_any(),
                                                        Some(s) if s.error.is_some() => view! {
                                                            <span class="text-destructive" title=s.error.unwrap_or_default()>"Unavailable"</span>
                                                        }.into_any(),
                                                        Some(s) => s
                                                            .spend
                                                            .map(|v| format_minor(v, &currency))
                                                            .unwrap_or_else(|| "-".to_string())
                                                            .into_any(),
                                                        None => "-".into_any(),
                                                    }}
                                                </td>
                                            </tr>
                                        }
                                    }
                                />
                            </tbody>
                        </table>
                    </div>

                    <Show
                        when=move || controller.with(|c| c.status() == &PageStatus::Loaded) && accounts.with(|a| a.is_empty())
                        fallback=|| ().into_view()
                    >
                        <div class="py-4 text-center text-xs text-muted-foreground">
                            {move || {
                                if debounce.with_value(|d| d.committed().is_empty()) {
                                    "No accounts on this page.".to_string()
                                } else {
                                    "No accounts on this page match the search.".to_string()
                                }
                            }}
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
