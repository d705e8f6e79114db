use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PiazzaError;
use crate::geo::GeoPoint;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // API
    pub api_base_url: String,
    pub api_token: Option<String>,

    // Viewer
    pub user_id: Option<String>,

    pub map: MapConfig,
    pub chat: ChatConfig,
    pub banners: BannerScope,
}

/// Map defaults used before any event is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub center: GeoPoint,
    pub zoom: u8,
    /// Lower bound for the zoom used when focusing a single marker.
    pub focus_min_zoom: u8,
    /// Fraction of the marker span added around fitted bounds.
    pub fit_padding: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: GeoPoint { lat: 42.5, lon: 12.5 },
            zoom: 6,
            focus_min_zoom: 14,
            fit_padding: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub poll_interval: Duration,
    /// How long transient notices stay visible.
    pub notice_ttl: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            notice_ttl: Duration::from_secs(4),
        }
    }
}

/// Where sponsored slots ask for banners.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BannerScope {
    pub placement: String,
    pub country: Option<String>,
    pub region: Option<String>,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, PiazzaError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PiazzaError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = get("PIAZZA_API_URL")
            .ok_or_else(|| PiazzaError::Config("PIAZZA_API_URL is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let map_defaults = MapConfig::default();
        let chat_defaults = ChatConfig::default();

        let map = MapConfig {
            center: GeoPoint {
                lat: parsed(&get, "PIAZZA_MAP_CENTER_LAT")?.unwrap_or(map_defaults.center.lat),
                lon: parsed(&get, "PIAZZA_MAP_CENTER_LON")?.unwrap_or(map_defaults.center.lon),
            },
            zoom: parsed(&get, "PIAZZA_MAP_ZOOM")?.unwrap_or(map_defaults.zoom),
            focus_min_zoom: parsed(&get, "PIAZZA_FOCUS_MIN_ZOOM")?
                .unwrap_or(map_defaults.focus_min_zoom),
            fit_padding: map_defaults.fit_padding,
        };

        let chat = ChatConfig {
            poll_interval: parsed::<u64>(&get, "PIAZZA_CHAT_POLL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(chat_defaults.poll_interval),
            notice_ttl: parsed::<u64>(&get, "PIAZZA_NOTICE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(chat_defaults.notice_ttl),
        };
        if chat.poll_interval.is_zero() {
            return Err(PiazzaError::Config(
                "PIAZZA_CHAT_POLL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            api_token: get("PIAZZA_API_TOKEN"),
            user_id: get("PIAZZA_USER_ID"),
            map,
            chat,
            banners: BannerScope {
                placement: get("PIAZZA_BANNER_PLACEMENT").unwrap_or_else(|| "following".to_string()),
                country: get("PIAZZA_COUNTRY"),
                region: get("PIAZZA_REGION"),
            },
        })
    }

    /// Log the loaded configuration without leaking the token.
    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(4).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  PIAZZA_API_URL: {}", self.api_base_url);
        tracing::info!("  PIAZZA_API_TOKEN: {}", preview_opt(&self.api_token));
        tracing::info!("  PIAZZA_USER_ID: {}", self.user_id.as_deref().unwrap_or("<anonymous>"));
        tracing::info!("  chat poll interval: {:?}", self.chat.poll_interval);
        tracing::info!(
            "  map center: {},{} zoom {}",
            self.map.center.lat,
            self.map.center.lon,
            self.map.zoom
        );
    }
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, PiazzaError> {
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PiazzaError::Config(format!("{key} has an invalid value: {raw}"))),
    }
}
