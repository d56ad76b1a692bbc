/// Decimal places kept for percentage differences
pub const PCT_DECIMAL_PRECISION: u32 = 6;

/// Upper bound on symbols processed concurrently by one coverage pass
pub const MAX_COVERAGE_CHUNK: usize = 10;

/// Lookback used when a symbol has no stored rows to bound a refetch
pub const DEFAULT_LOOKBACK_YEARS: i32 = 20;

/// Width of the "recent" window whose dates get extra drift samples
pub const RECENT_SAMPLE_WINDOW_DAYS: i64 = 90;

/// Number of trailing dividends averaged to spot a special dividend
pub const DIVIDEND_HISTORY_LEN: usize = 8;

/// A dividend this many times the trailing mean counts as special
pub const SPECIAL_DIVIDEND_MULTIPLE: i64 = 2;

/// Lease on a distributed lock, after which other processes may steal it
pub const LOCK_LEASE_SECS: i64 = 300;

/// Key namespace for cached drift scans
pub const SCAN_CACHE_PREFIX: &str = "drift:scan:";

/// Key namespace for cached corporate actions
pub const ACTIONS_CACHE_PREFIX: &str = "drift:actions:";

/// Key namespace for per-symbol coverage locks
pub const COVERAGE_LOCK_PREFIX: &str = "coverage:";
