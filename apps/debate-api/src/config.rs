/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Redis holding access tokens, shared with the identity issuer.
    pub redis_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Team capacity used when a room is created without one.
    pub default_team_capacity: i32,
    /// Global upper bound for a room's per-team capacity.
    pub max_team_capacity: i32,
    /// Buffered events per room broadcast group before slow sessions lag.
    pub room_channel_capacity: usize,
    /// Worker bits embedded in message snowflakes.
    pub snowflake_worker_id: u16,
}

pub const DEFAULT_PORT: u16 = 4002;
pub const DEFAULT_TEAM_CAPACITY: i32 = 15;
pub const MAX_TEAM_CAPACITY: i32 = 50;
pub const ROOM_CHANNEL_CAPACITY: usize = 256;

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing or
    /// the capacity bounds are inconsistent.
    pub fn from_env() -> Self {
        let config = Self {
            database_url: required_var("DATABASE_URL"),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            port: parsed_var("PORT").unwrap_or(DEFAULT_PORT),
            default_team_capacity: parsed_var("DEFAULT_TEAM_CAPACITY")
                .unwrap_or(DEFAULT_TEAM_CAPACITY),
            max_team_capacity: parsed_var("MAX_TEAM_CAPACITY").unwrap_or(MAX_TEAM_CAPACITY),
            room_channel_capacity: parsed_var("ROOM_CHANNEL_CAPACITY")
                .unwrap_or(ROOM_CHANNEL_CAPACITY),
            snowflake_worker_id: parsed_var("SNOWFLAKE_WORKER_ID").unwrap_or(0),
        };

        if let Err(reason) = config.validate() {
            panic!("invalid configuration: {reason}");
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_team_capacity < 1 {
            return Err("MAX_TEAM_CAPACITY must be at least 1".to_string());
        }
        if !(1..=self.max_team_capacity).contains(&self.default_team_capacity) {
            return Err(format!(
                "DEFAULT_TEAM_CAPACITY must be between 1 and {}",
                self.max_team_capacity
            ));
        }
        if self.room_channel_capacity == 0 {
            return Err("ROOM_CHANNEL_CAPACITY must be positive".to_string());
        }
        Ok(())
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Point a connection string at the `_test` sibling database, keeping any
/// query string. Already-suffixed URLs are returned unchanged.
pub fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}
