//! Well-known lookup categories and codes.
//!
//! These must match the `category` / `code` pairs seeded into the
//! `lookup_codes` table. The pipeline never hard-codes lookup ids; it resolves
//! these codes at runtime.

/// Rule comparison operators (`GT`, `GTE`, `LT`, `LTE`, `EQ`, `NEQ`).
pub const CATEGORY_OPERATOR: &str = "OPERATOR";

/// Rule severities.
pub const CATEGORY_SEVERITY: &str = "SEVERITY";

/// Signal lifecycle statuses.
pub const CATEGORY_SIGNAL_STATUS: &str = "SIGNAL_STATUS";

/// Notification channel types.
pub const CATEGORY_CHANNEL_TYPE: &str = "CHANNEL_TYPE";

/// Signal is open and awaiting resolution.
pub const SIGNAL_STATUS_OPEN: &str = "OPEN";

/// Plain-text email to `notify_target`.
pub const CHANNEL_EMAIL: &str = "EMAIL";

/// JSON POST of the notification payload to `notify_target`.
pub const CHANNEL_WEBHOOK: &str = "WEBHOOK";

/// Chat incoming-webhook message to `notify_target`.
pub const CHANNEL_CHAT: &str = "CHAT";
