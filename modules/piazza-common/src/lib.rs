pub mod config;
pub mod error;
pub mod geo;
pub mod ordering;
pub mod status;
pub mod time;
pub mod types;

pub use config::{BannerScope, ChatConfig, Config, MapConfig};
pub use error::PiazzaError;
pub use geo::{resolve_coordinates, Bounds, CoordinateRule, GeoPoint, COORDINATE_RULES};
pub use ordering::{
    compare_events, fill_missing_statuses, sort_events, status_priority, PriorityScheme,
    UNKNOWN_STATUS_PRIORITY,
};
pub use status::{classify, classify_event, EventStatus};
pub use time::{format_date_range, parse_timestamp};
pub use types::*;
