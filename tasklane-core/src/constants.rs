use std::time::Duration;

/// Consecutive missed cycles before an external item is soft-deleted.
pub const DEFAULT_DELETION_THRESHOLD: u32 = 2;

/// Page ceiling for a single provider cycle.
pub const DEFAULT_MAX_PAGES: usize = 50;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;
pub const DEFAULT_MAX_IN_FLIGHT_PER_USER: usize = 4;

pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// How long soft-deleted items are kept before garbage collection may purge them.
pub const DEFAULT_GC_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Priority given to items whose provider doesn't report one.
pub const DEFAULT_PRIORITY: i32 = 0;
