/// CLI defaults, loaded from `FACEGATE_*` environment variables.
///
/// Command-line flags win over these; these win over the built-in
/// defaults.
pub struct Config {
    /// Acceptance threshold for the gate (clamped to [0.3, 0.9] downstream).
    pub threshold: f32,
    /// Tick period for simulated capture runs, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            threshold: env_f32("FACEGATE_THRESHOLD", 0.6),
            tick_interval_ms: env_u64("FACEGATE_TICK_INTERVAL_MS", 1000),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
