//! CLI flag parsing.
//!
//! The command line is the proxy's only configuration surface. Flags are
//! parsed with clap and folded into a [`ProxyConfig`], then semantically
//! validated before the server starts.
//!
//! Duration flags accept Go-style values such as `5s`, `200ms` or `1m30s`.

use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;

#[derive(Parser, Debug)]
#[command(
    name = "ws-stabilizer",
    about = "Stabilizing WebSocket proxy: keeps client sessions alive across transient backend failures"
)]
pub struct Cli {
    /// Address to listen on for client connections (host:port).
    #[arg(long, short = 'l', value_name = "ADDR")]
    pub listen: String,

    /// Backend WebSocket URL.
    #[arg(
        long,
        short = 'b',
        value_name = "URL",
        default_value = "ws://localhost:80/api/ws"
    )]
    pub backend: String,

    /// Per-dial timeout and total reconnection window.
    #[arg(
        long,
        short = 't',
        value_name = "DURATION",
        value_parser = parse_duration,
        default_value = "5s"
    )]
    pub dial_timeout: Duration,

    /// Sleep between failed dial attempts.
    #[arg(
        long,
        short = 'r',
        value_name = "DURATION",
        value_parser = parse_duration,
        default_value = "200ms"
    )]
    pub retry_backoff: Duration,

    /// Text frame payload sent to the client when the backend link is lost.
    #[arg(long, alias = "de", value_name = "STRING", default_value = "backend_disconnected")]
    pub disconnected_event: String,

    /// Text frame payload sent to the client when the backend link is restored.
    #[arg(long, alias = "ce", value_name = "STRING", default_value = "backend_connected")]
    pub connected_event: String,

    /// Maximum concurrent client sessions. 0 means unlimited.
    #[arg(long, alias = "mc", value_name = "N", default_value_t = 0)]
    pub max_connections: usize,
}

impl Cli {
    /// Fold parsed flags into a validated [`ProxyConfig`].
    pub fn into_config(self) -> Result<ProxyConfig, String> {
        let url = parse_backend_url(&self.backend)?;

        let mut config = ProxyConfig::default();
        config.listen.bind_address = normalize_listen_addr(&self.listen);
        config.listen.max_connections = self.max_connections;
        config.backend.url = url;
        config.reconnect.dial_timeout = self.dial_timeout;
        config.reconnect.retry_backoff = self.retry_backoff;
        config.events.disconnected = self.disconnected_event;
        config.events.connected = self.connected_event;

        validate_config(&config).map_err(|errors| {
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })?;

        Ok(config)
    }
}

/// Parse the process arguments, handling help and usage errors with the
/// documented exit codes: 0 for `--help`, 1 for a missing `--listen` or any
/// other invalid invocation.
pub fn parse_args() -> Result<ProxyConfig, ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return Err(ExitCode::SUCCESS);
        }
        Err(err) => {
            let _ = err.print();
            return Err(ExitCode::from(1));
        }
    };

    cli.into_config().map_err(|message| {
        eprintln!("error: {message}");
        ExitCode::from(1)
    })
}

/// Accept a bare `:port` the way Go's `net.Listen` does.
fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Parse the backend URL, mapping `http`/`https` schemes to their WebSocket
/// counterparts.
fn parse_backend_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| format!("invalid backend URL '{raw}': {e}"))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();
    if url.set_scheme(&scheme).is_err() {
        return Err(format!("invalid backend URL scheme '{scheme}'"));
    }

    Ok(url)
}

/// Parse a Go-style duration string: one or more `<number><unit>` pairs,
/// where unit is one of `ns`, `us`, `ms`, `s`, `m`, `h`.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration '{raw}'"))?;
        if digits == 0 {
            return Err(format!("invalid duration '{raw}'"));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in duration '{raw}'"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let unit_secs = match unit {
            "ns" => 1e-9,
            "us" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            other => return Err(format!("unknown duration unit '{other}' in '{raw}'")),
        };
        total += Duration::from_secs_f64(value * unit_secs);
    }

    Ok(total)
}
