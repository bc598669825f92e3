//! Service configuration.
//!
//! Every option is a command-line flag and can also be set through an
//! environment variable with the `SALES_` prefix, e.g. `SALES_WEB_API_HOST`.
//! Flags win over the environment; the environment wins over the defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sales API", long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub web: WebConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub db: DbConfig,
}

#[derive(Args, Debug, Clone)]
pub struct WebConfig {
    /// Address the API listens on.
    #[arg(long = "web-api-host", env = "SALES_WEB_API_HOST", default_value = "0.0.0.0:3000")]
    pub api_host: SocketAddr,

    /// Longest a single request may run before it is answered with 503.
    #[arg(long = "web-request-timeout", env = "SALES_WEB_REQUEST_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// Grace period for in-flight requests once shutdown starts.
    #[arg(long = "web-shutdown-timeout", env = "SALES_WEB_SHUTDOWN_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub shutdown_timeout: Duration,
}

#[derive(Args, Debug, Clone)]
pub struct AuthConfig {
    /// Key id stamped into issued tokens and used to find the verification key.
    #[arg(long = "auth-key-id", env = "SALES_AUTH_KEY_ID", default_value = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1")]
    pub key_id: String,

    #[arg(long = "auth-private-key-file", env = "SALES_AUTH_PRIVATE_KEY_FILE", default_value = "./private.pem")]
    pub private_key_file: PathBuf,

    #[arg(long = "auth-public-key-file", env = "SALES_AUTH_PUBLIC_KEY_FILE", default_value = "./public.pem")]
    pub public_key_file: PathBuf,

    /// Signing algorithm; tokens using any other are rejected.
    #[arg(long = "auth-algorithm", env = "SALES_AUTH_ALGORITHM", default_value = "RS256")]
    pub algorithm: String,
}

#[derive(Args, Debug, Clone)]
pub struct DbConfig {
    /// Database address probed by the readiness check.
    #[arg(long = "db-host", env = "SALES_DB_HOST", default_value = "localhost:5432")]
    pub host: String,

    /// How long the readiness check waits for the database.
    #[arg(long = "db-check-timeout", env = "SALES_DB_CHECK_TIMEOUT", default_value = "1s", value_parser = parse_duration)]
    pub check_timeout: Duration,
}

/// Parses durations such as `250ms`, `5s`, `2m` or `1h`. A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let n: u64 = digits.parse().map_err(|_| format!("invalid duration `{s}`"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "" | "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        other => Err(format!("unknown duration unit `{other}` in `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn defaults() {
        let cfg = Config::try_parse_from(["sales-api"]).unwrap();
        assert_eq!(cfg.web.api_host, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.web.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.web.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(cfg.auth.key_id, "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1");
        assert_eq!(cfg.auth.algorithm, "RS256");
        assert_eq!(cfg.db.host, "localhost:5432");
        assert_eq!(cfg.db.check_timeout, Duration::from_secs(1));
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "sales-api",
            "--web-api-host",
            "127.0.0.1:4000",
            "--db-check-timeout",
            "300ms",
        ])
        .unwrap();
        assert_eq!(cfg.web.api_host.port(), 4000);
        assert_eq!(cfg.db.check_timeout, Duration::from_millis(300));
    }
}
