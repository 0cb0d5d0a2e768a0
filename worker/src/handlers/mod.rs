//! Per-message handlers
//!
//! One handler per job kind. Each runs as its own task; a failure inside
//! a handler surfaces only through the deployment's record and the logs,
//! never to other deployments.

pub mod clone;
pub mod delete;
pub mod stop;
pub mod trigger;

/// `None` for the empty strings the wire format uses to mean "absent"
pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
