//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP bind port
pub const DEFAULT_PORT: u16 = 3000;

/// Default session time-to-live
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_millis(900_000);

/// Default hard cap on listeners per session
pub const DEFAULT_MAX_LISTENERS: usize = 200;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket bind port
    pub port: u16,

    /// Advertised hostname (used in logs and listen URLs)
    pub hostname: String,

    /// Session expiry: a session torn down this long after creation
    pub session_ttl: Duration,

    /// Directory that receives `broadcast-<id>-<createdAt>.webm` files
    pub recordings_dir: PathBuf,

    /// Hard cap on concurrently attached listeners per session
    pub max_listeners: usize,

    /// Per-listener outbound queue depth, in chunks
    pub listener_queue_depth: usize,

    /// Consecutive queue overflows within the window before a listener is
    /// dropped as a slow consumer
    pub slow_consumer_strikes: u32,

    /// Sliding window for counting slow-consumer strikes
    pub slow_consumer_window: Duration,

    /// Disconnect a broadcaster idle for longer than this
    pub broadcaster_idle_timeout: Duration,

    /// Recording sink buffered bytes above which writes report backpressure
    pub sink_high_water: usize,

    /// Recording sink buffered bytes below which the drain signal fires
    pub sink_low_water: usize,

    /// Maximum accepted WebSocket frame payload
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hostname: "localhost".to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            recordings_dir: PathBuf::from("./recordings"),
            max_listeners: DEFAULT_MAX_LISTENERS,
            listener_queue_depth: 32,
            slow_consumer_strikes: 3,
            slow_consumer_window: Duration::from_secs(4),
            broadcaster_idle_timeout: Duration::from_secs(30),
            sink_high_water: 4 * 1024 * 1024, // 4MB
            sink_low_water: 512 * 1024,
            max_frame_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl ServerConfig {
    /// Build a config from the process environment
    ///
    /// Recognised variables: `PORT`, `HOSTNAME`, `SESSION_TTL_MS`,
    /// `RECORDINGS_DIR`, `MAX_LISTENERS_PER_SESSION`. Unset or unparsable
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("PORT") {
            config.port = port;
        }
        if let Ok(hostname) = std::env::var("HOSTNAME") {
            if !hostname.is_empty() {
                config.hostname = hostname;
            }
        }
        if let Some(ttl_ms) = env_parse::<u64>("SESSION_TTL_MS") {
            config.session_ttl = Duration::from_millis(ttl_ms);
        }
        if let Ok(dir) = std::env::var("RECORDINGS_DIR") {
            if !dir.is_empty() {
                config.recordings_dir = PathBuf::from(dir);
            }
        }
        if let Some(max) = env_parse::<usize>("MAX_LISTENERS_PER_SESSION") {
            config.max_listeners = max;
        }

        config
    }

    /// Address to bind the HTTP listener to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Set the bind port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the session time-to-live
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the recordings output directory
    pub fn recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    /// Set the per-session listener cap
    pub fn max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Set the per-listener outbound queue depth
    pub fn listener_queue_depth(mut self, depth: usize) -> Self {
        self.listener_queue_depth = depth.max(1);
        self
    }

    /// Set the broadcaster idle timeout
    pub fn broadcaster_idle_timeout(mut self, timeout: Duration) -> Self {
        self.broadcaster_idle_timeout = timeout;
        self
    }

    /// Set the recording sink watermarks
    pub fn sink_watermarks(mut self, high: usize, low: usize) -> Self {
        self.sink_high_water = high;
        self.sink_low_water = low.min(high);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}
