//! Engine events
//!
//! With the `tracing` feature each macro forwards to a `tracing` event;
//! without it they expand to nothing.

/// Emit a debug-level event before a resolver is consulted.
///
/// ```ignore
/// drift_trace_resolve!(EntityKind::Table, created.len(), deleted.len());
/// ```
#[macro_export]
macro_rules! drift_trace_resolve {
    ($kind:expr, $created:expr, $deleted:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(
            kind = %$kind,
            created = $created,
            deleted = $deleted,
            "drift.resolve"
        );
    };
}

/// Emit an info-level event for an applied rename or move.
///
/// ```ignore
/// drift_trace_rename!(EntityKind::Column, "public.users.name", "public.users.full_name");
/// ```
#[macro_export]
macro_rules! drift_trace_rename {
    ($kind:expr, $from:expr, $to:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!(kind = %$kind, from = %$from, to = %$to, "drift.rename");
    };
}

/// Emit a debug-level event with the statement count of a finished diff phase.
#[macro_export]
macro_rules! drift_trace_phase {
    ($phase:expr, $count:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(phase = ?$phase, statements = $count, "drift.phase");
    };
}

/// Emit a warn-level event when a hint probe fails.
#[macro_export]
macro_rules! drift_trace_probe_failed {
    ($index:expr, $err:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!(statement = $index, error = %$err, "drift.hints.probe_failed");
    };
}
