//! Centralized constants for the controllers
//!
//! Timeouts, limits and log prefixes live here so they can be audited in one
//! place. Wire tags and sentinels belong to `xframe-protocol`.

// =============================================================================
// Origins
// =============================================================================

/// Origin reported for documents in a sandbox without `allow-same-origin`
pub const OPAQUE_ORIGIN: &str = "null";

/// Wildcard target origin for `postMessage`, and allow-list entry that
/// accepts any origin
pub const ANY_ORIGIN: &str = "*";

// =============================================================================
// Ready handshake
// =============================================================================

/// First ready retry, counted from the initial announcement
pub const READY_RETRY_INITIAL_MS: u64 = 1_000;

/// Upper bound for the doubling retry delay
pub const READY_RETRY_MAX_MS: u64 = 10_000;

// =============================================================================
// Resource limits
// =============================================================================

/// Uploads the parent tracks at once; further requests fail immediately
pub const MAX_PENDING_UPLOADS: usize = 16;

// =============================================================================
// Log prefixes
// =============================================================================

pub const PARENT_LOG_PREFIX: &str = "[parent-frame]";
pub const FRAME_LOG_PREFIX: &str = "[exercise-frame]";
