/// Delay before every channel reconnect attempt.
pub const RECONNECT_DELAY_SECS: u64 = 3;

/// Minimum displacement (meters) before a new position is reported.
pub const MOVEMENT_THRESHOLD_METERS: f64 = 20.0;

/// Interval between nearby-peer discovery polls.
pub const PEER_REFRESH_SECS: u64 = 5;

/// Interval for the unread-badge safety-net poll.
pub const UNREAD_POLL_SECS: u64 = 2;

/// Re-poll interval while location is degraded to the IP fallback.
pub const FALLBACK_LOCATION_POLL_SECS: u64 = 60;

/// Default discovery radius passed to the directory API (kilometers).
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Minimum Euclidean separation between placed peers (container units).
pub const MIN_PEER_SEPARATION: f64 = 96.0;

/// Inset border padding of the radar safe area (container units).
pub const LAYOUT_PADDING: f64 = 48.0;

/// Randomized placement attempts before overlap is tolerated.
pub const PLACEMENT_ATTEMPTS: u32 = 100;

/// Lifetime of the persisted current-conversation pointer.
pub const CHAT_POINTER_TTL_SECS: i64 = 30 * 60;

/// Mean earth radius used by the haversine distance (meters).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
