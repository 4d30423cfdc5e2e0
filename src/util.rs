use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const ALERT_THRESHOLD: &str = "ALERT_THRESHOLD";

const DEFAULT_MAX_THRESHOLD: f64 = 35.0;

pub fn get_max_threshold() -> f64 {
    let threshold_from_env = std::env::var(ALERT_THRESHOLD);
    threshold_from_env.map_or(DEFAULT_MAX_THRESHOLD, |res| {
        res.parse().unwrap_or(DEFAULT_MAX_THRESHOLD)
    })
}

const MIN_ALERT_THRESHOLD: &str = "MIN_ALERT_THRESHOLD";

const DEFAULT_MIN_THRESHOLD: f64 = 15.0;

pub fn get_min_threshold() -> f64 {
    let threshold_from_env = std::env::var(MIN_ALERT_THRESHOLD);
    threshold_from_env.map_or(DEFAULT_MIN_THRESHOLD, |res| {
        res.parse().unwrap_or(DEFAULT_MIN_THRESHOLD)
    })
}

const HUB_PORT: &str = "HUB_PORT";

const DEFAULT_PORT: u16 = 8000;

pub fn get_default_bind_addr() -> SocketAddr {
    let port = std::env::var(HUB_PORT).map_or(DEFAULT_PORT, |res| res.parse().unwrap_or(DEFAULT_PORT));
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

const LOG_LEVEL: &str = "LOG_LEVEL";

/// Log level for the crate's own targets, `INFO` unless overridden.
pub fn get_log_level() -> tracing::level_filters::LevelFilter {
    std::env::var(LOG_LEVEL)
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::level_filters::LevelFilter::INFO)
}
