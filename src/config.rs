use std::time::Duration;

use crate::gateway::GatewayConfig;

pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared secret for `POST /api/v1/rooms/{room_id}/status`. The endpoint
    /// refuses every request while unset.
    pub publish_key: Option<String>,
    pub gateway: GatewayConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = GatewayConfig::default();

        let gateway = GatewayConfig {
            authorize_timeout: env_parse::<u64>("ROOMCAST_AUTHORIZE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.authorize_timeout),
            outbound_capacity: env_parse::<usize>("ROOMCAST_OUTBOUND_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.outbound_capacity),
            history_limit: env_parse("ROOMCAST_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            persist_events: std::env::var("ROOMCAST_PERSIST_EVENTS")
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or(defaults.persist_events),
        };

        Self {
            port: env_parse("PORT").unwrap_or(39100),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:roomcast.db?mode=rwc".to_string()),
            publish_key: std::env::var("ROOMCAST_PUBLISH_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            gateway,
        }
    }
}
