/// Widest date range a single availability query may cover.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 366;

/// Days before a query's first date that are also fetched, so an
/// appointment running past midnight into the window is seen.
pub const OCCUPANCY_LOOKBACK_DAYS: u64 = 1;

/// Stored durations are marked up to this many minutes; nothing a query can
/// see lies further out.
pub const MAX_OCCUPANCY_MINUTES: i64 = (MAX_QUERY_WINDOW_DAYS + OCCUPANCY_LOOKBACK_DAYS as i64) * 24 * 60;

pub const MAX_PATIENT_NAME_LEN: usize = 255;
pub const MAX_REASON_LEN: usize = 1000;

pub const MAX_SERVICES_PER_BOOKING: usize = 16;
pub const MIN_SERVICE_MINUTES: u32 = 5;
pub const MAX_SERVICE_MINUTES: u32 = 480;
