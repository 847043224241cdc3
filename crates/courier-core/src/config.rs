use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

/// Typed configuration, sourced from the environment (plus an optional
/// `.env` file next to the working directory).
#[derive(Clone, Debug)]
pub struct Config {
    /// Process-wide bot token. When set, it takes precedence over any
    /// token supplied in a request body.
    pub bot_token: Option<String>,

    /// Address the HTTP/WebSocket server binds to.
    pub http_bind: String,

    /// Reply persistence path. Unset means replies live in memory only and
    /// are lost on restart.
    pub reply_store_path: Option<PathBuf>,

    /// Upper bound accepted for the per-request inter-message delay. The
    /// dispatch loop exposes no cancellation, so an absurd delay would pin
    /// the request open for hours.
    pub max_send_delay_ms: u64,

    /// Capacity of a session's inbound gateway event channel.
    pub inbound_event_buffer: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("DISCORD_BOT_TOKEN").and_then(non_empty);
        let http_bind = env_str("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let reply_store_path = env_path("REPLY_STORE_PATH");
        let max_send_delay_ms = env_u64("MAX_SEND_DELAY_MS").unwrap_or(60_000);
        let inbound_event_buffer = env_usize("INBOUND_EVENT_BUFFER").unwrap_or(256);

        if max_send_delay_ms == 0 {
            return Err(Error::Config(
                "MAX_SEND_DELAY_MS must be greater than zero".to_string(),
            ));
        }
        if inbound_event_buffer == 0 {
            return Err(Error::Config(
                "INBOUND_EVENT_BUFFER must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bot_token,
            http_bind,
            reply_store_path,
            max_send_delay_ms,
            inbound_event_buffer,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
