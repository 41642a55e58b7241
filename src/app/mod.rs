use crate::pages::{AccountSpendPage, FilterProbePage, ManageCapsPage, ResetCapsPage};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    provide_context(AppContext(AppState::new()));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("") view=ManageCapsPage />
                <Route path=path!("ad-account-spend") view=AccountSpendPage />
                <Route path=path!("reset-spend-cap") view=ResetCapsPage />
                <Route path=path!("test-filtering") view=FilterProbePage />
            </Routes>
        </Router>
    }
}
