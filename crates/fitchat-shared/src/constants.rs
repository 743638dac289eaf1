use std::time::Duration;

/// Product name used as the notification title for bot-authored messages
pub const APP_NAME: &str = "FitApp";

/// Icon shipped with every platform notification
pub const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";

/// How long a synced cache is served without a network round trip
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Minimum gap between two quota-recovery warnings from the same store
pub const RECOVERY_LOG_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Maximum number of message keys remembered by the notification de-dup set
pub const DEDUP_CAPACITY: usize = 200;

/// Maximum number of in-memory notification records
pub const MAX_NOTIFICATION_RECORDS: usize = 50;

/// Notification records older than this are dropped
pub const NOTIFICATION_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default poll interval for new-message detection
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 30_000;

/// Poll intervals offered to the user (15 s, 30 s, 1 min, 5 min)
pub const CHECK_INTERVAL_PRESETS_MS: [u64; 4] = [15_000, 30_000, 60_000, 300_000];

/// Characters of message text folded into a derived de-dup key
pub const DEDUP_TEXT_PREFIX: usize = 50;

/// Prefix of locally generated optimistic message ids
pub const TEMP_ID_PREFIX: &str = "temp-";
