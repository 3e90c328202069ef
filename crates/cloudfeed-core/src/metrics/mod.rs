//! Metrics emission.
//!
//! - `events`: Internal event types and the `InternalEvent` trait

pub mod events;

/// Macro for emitting metric events (Vector-style pattern).
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use cloudfeed_core::metrics::events::RowsEmitted;
///
/// emit!(RowsEmitted { count: 1, topic: "orders".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

// Re-export the macro at module level
pub use crate::emit;
