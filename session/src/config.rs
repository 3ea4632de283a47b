//! Session configuration parsed from environment variables.

use std::str::FromStr;
use std::time::Duration;

use frames::DecodePolicy;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:9001";
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// WebSocket URL of the peer, e.g. `"ws://127.0.0.1:9001"`.
    pub url: String,
    /// Deadline used by [`crate::Session::recv_next`].
    pub recv_timeout: Duration,
    /// Close the transport on the first frame that fails to decode.
    pub close_on_malformed: bool,
    pub decode_policy: DecodePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            close_on_malformed: true,
            decode_policy: DecodePolicy::Strict,
        }
    }
}

impl SessionConfig {
    /// Build config from environment variables with defaults.
    ///
    /// Optional:
    /// - `TAGWIRE_URL`: default `ws://127.0.0.1:9001`
    /// - `TAGWIRE_RECV_TIMEOUT_MS`: default 5000
    /// - `TAGWIRE_CLOSE_ON_MALFORMED`: default `true`
    /// - `TAGWIRE_LENIENT`: default `false`; `true` selects [`DecodePolicy::Lenient`]
    /// - `TAGWIRE_LEGACY`: default `false`; `true` selects [`DecodePolicy::Legacy`]
    ///   and wins over `TAGWIRE_LENIENT`
    #[must_use]
    pub fn from_env() -> Self {
        let url = match std::env::var("TAGWIRE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim().to_owned(),
            _ => DEFAULT_URL.to_owned(),
        };
        let recv_timeout_ms = env_parse("TAGWIRE_RECV_TIMEOUT_MS", DEFAULT_RECV_TIMEOUT_MS);
        let close_on_malformed = env_parse("TAGWIRE_CLOSE_ON_MALFORMED", true);
        let decode_policy = if env_parse("TAGWIRE_LEGACY", false) {
            DecodePolicy::Legacy
        } else if env_parse("TAGWIRE_LENIENT", false) {
            DecodePolicy::Lenient
        } else {
            DecodePolicy::Strict
        };

        Self {
            url,
            recv_timeout: Duration::from_millis(recv_timeout_ms),
            close_on_malformed,
            decode_policy,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
