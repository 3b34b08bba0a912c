//! Shared environment-config plumbing, in the profiled-env-var style every
//! per-crate `Config` struct in this workspace follows: try `{PROFILE}_{KEY}`
//! first, fall back to `{KEY}`. Each crate defines its own `Config` type and
//! calls these helpers; there is no single workspace-wide `Config` struct
//! since each binary only cares about the concerns it touches.

use std::env;

/// Load a `.env` file if present (silently ignored if missing). Call once,
/// at the very start of `main()`, before constructing any `Config`.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`
/// (defaulting to `info`), the way every binary in this workspace starts up.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
pub fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

pub fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

pub fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// The active profile name, read from `PIPELINE_PROFILE` and upper-cased
/// (empty string = default/no profile prefixing).
pub fn active_profile() -> String {
    env_or("PIPELINE_PROFILE", "").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_lookup_falls_back_to_unprefixed_key() {
        // No env vars are set in test; both profiled and unprofiled lookups
        // should fall through to the supplied default.
        assert_eq!(profiled_env_or("PROD", "NONEXISTENT_KEY_XYZ", "fallback"), "fallback");
    }
}
