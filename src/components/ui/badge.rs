use leptos::prelude::*;
use leptos_ui::variants;

variants! {
    Badge {
        base: "inline-flex items-center rounded-md border px-2 py-0.5 text-xs font-medium whitespace-nowrap tabular-nums",
        variants: {
            variant: {
                Default: "border-transparent bg-primary text-primary-foreground",
                // Cap above the paused sentinel.
                Capped: "border-emerald-200 bg-emerald-50 text-emerald-800 dark:bg-emerald-950/30 dark:text-emerald-200",
                // Cap at the sentinel value.
                Paused: "border-amber-200 bg-amber-50 text-amber-800 dark:bg-amber-950/30 dark:text-amber-200",
                Muted: "border-border bg-muted text-muted-foreground",
            },
            size: {
                Default: "",
            }
        },
        component: {
            element: span
        }
    }
}
