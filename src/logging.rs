//! Logging facade.
//!
//! The router logs through five crate-local macros that forward to either
//! [`log`](https://docs.rs/log) or [`tracing`](https://docs.rs/tracing),
//! selected by cargo feature. Enable at most one of the two.
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! With neither feature the macros expand to nothing.
//!
//! What gets logged where:
//!
//! - `trace_log!`: per-branch matching attempts, cache hits, history moves.
//! - `debug_log!`: resolved match stacks, loader fan-out, revalidation sets.
//! - `info_log!`: navigation start and commit, registry swaps.
//! - `warn_log!`: route collisions, rejected rebuilds, off-origin redirects.
//! - `error_log!`: loader and action panics.
//!
//! Every macro is a statement; wrap it in braces when it is a match arm.
//!
//! ```ignore
//! use data_router::{debug_log, warn_log};
//!
//! debug_log!("Loading {} routes for '{}'", ids.len(), pathname);
//! warn_log!("Route collision on '{}'", pattern);
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __router_log {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        ::tracing::$level!($($arg)+);
        #[cfg(feature = "log")]
        ::log::$level!($($arg)+);
    };
}

/// Trace-level router diagnostics.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)+) => {
        $crate::__router_log!(trace, $($arg)+);
    };
}

/// Debug-level router diagnostics.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)+) => {
        $crate::__router_log!(debug, $($arg)+);
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)+) => {
        $crate::__router_log!(info, $($arg)+);
    };
}

#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)+) => {
        $crate::__router_log!(warn, $($arg)+);
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)+) => {
        $crate::__router_log!(error, $($arg)+);
    };
}
