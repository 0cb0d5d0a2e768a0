//! Topic names
//!
//! The backend routes jobs and results over two keys on one durable
//! exchange; on the broker side those become the two topics below.

/// Inbound job messages
pub const EXECUTE_TOPIC: &str = "blacktree/worker/execute";

/// Outbound result events
pub const RESULT_TOPIC: &str = "blacktree/api/result";
