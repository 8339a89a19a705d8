//! Compile-time defaults and marker strings shared across the agent.

/// Library name reported in the wire `library` field.
pub const LIBRARY_NAME: &str = "beacon-rs";
/// Library version reported in the wire `library` field.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Queue depth at which a flush is forced.
pub const EVENT_UPLOAD_THRESHOLD: usize = 30;
/// Maximum events uploaded in a single request.
pub const EVENT_UPLOAD_MAX_BATCH_SIZE: usize = 100;
/// Maximum events retained locally before oldest-first eviction.
pub const EVENT_MAX_COUNT: usize = 1000;
/// Extra slack evicted in one pass once the queue exceeds `EVENT_MAX_COUNT`.
pub const EVENT_REMOVE_BATCH_SIZE: usize = 20;
/// Seconds between periodic flush attempts.
pub const EVENT_UPLOAD_PERIOD_SECONDS: u64 = 30;
/// Idle gap (ms) after which a new session starts.
pub const MIN_TIME_BETWEEN_SESSIONS_MILLIS: i64 = 15 * 60 * 1000;

/// Maximum length of any property string value; longer values are truncated.
pub const MAX_STRING_LENGTH: usize = 1024;
/// Maximum number of keys in one property map; extra keys are dropped.
pub const MAX_PROPERTY_KEYS: usize = 1000;

/// Session id stamped on events explicitly excluded from session tracking.
pub const OUT_OF_SESSION: i64 = -1;

/// Event type of the synthetic identify event.
pub const IDENTIFY_EVENT: &str = "$identify";
/// Event type of the synthetic session-start marker.
pub const SESSION_START_EVENT: &str = "session_start";
/// Event type of the synthetic session-end marker.
pub const SESSION_END_EVENT: &str = "session_end";
/// Event type carrying revenue data.
pub const REVENUE_EVENT: &str = "revenue_amount";

/// Identify op: set a property.
pub const OP_SET: &str = "$set";
/// Identify op: set a property only if not already set.
pub const OP_SET_ONCE: &str = "$setOnce";
/// Identify op: numeric increment.
pub const OP_ADD: &str = "$add";
/// Identify op: array append.
pub const OP_APPEND: &str = "$append";
/// Identify op: array prepend.
pub const OP_PREPEND: &str = "$prepend";
/// Identify op: remove a property.
pub const OP_UNSET: &str = "$unset";
/// Identify op: remove every property.
pub const OP_CLEAR_ALL: &str = "$clearAll";

/// Revenue event property: product identifier.
pub const REVENUE_PRODUCT_ID: &str = "$productId";
/// Revenue event property: quantity.
pub const REVENUE_QUANTITY: &str = "$quantity";
/// Revenue event property: unit price.
pub const REVENUE_PRICE: &str = "$price";
/// Revenue event property: revenue type (purchase, refund, ...).
pub const REVENUE_TYPE: &str = "$revenueType";
/// Revenue event property: base64 receipt blob.
pub const REVENUE_RECEIPT: &str = "$receipt";

/// Registry key of the default agent instance.
pub const DEFAULT_INSTANCE: &str = "$default_instance";
