//! ---
//! psd_section: "03-logging"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Structured logging adapters for data transfers."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __psd_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            scenario = ctx.scenario.unwrap_or(""),
            backend = ctx.backend.unwrap_or(""),
            path = ctx.path.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with transfer context.
#[macro_export]
macro_rules! psd_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with transfer context.
#[macro_export]
macro_rules! psd_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with transfer context.
#[macro_export]
macro_rules! psd_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with transfer context.
#[macro_export]
macro_rules! psd_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__psd_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
