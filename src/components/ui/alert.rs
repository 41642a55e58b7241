use leptos::prelude::*;
use leptos_ui::{clx, variants};

variants! {
    Alert {
        base: "relative w-full rounded-lg border px-4 py-3 text-sm [&>svg+div]:translate-y-[-3px] [&>svg]:absolute [&>svg]:left-4 [&>svg]:top-4 [&>svg~*]:pl-7",
        variants: {
            variant: {
                Default: "bg-card text-card-foreground",
                // Failed listing or mutation.
                Destructive: "border-destructive/30 text-destructive [&>svg]:text-destructive",
                // Navigation limits and other soft notices.
                Notice: "border-amber-300/60 bg-amber-50 text-amber-900 dark:bg-amber-950/30 dark:text-amber-200",
            },
            size: {
                Default: "",
                Compact: "px-3 py-2 text-xs",
            }
        },
        component: {
            element: div
        }
    }
}

mod components {
    use super::*;
    clx! {AlertTitle, h4, "mb-1 font-medium tracking-tight leading-none"}
    clx! {AlertDescription, p, "text-sm [&_p]:leading-relaxed"}
}

pub use components::*;
