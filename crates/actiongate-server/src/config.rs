//! Command-line and environment configuration.

use std::{net::SocketAddr, time::Duration};

use actiongate_executor::{
    ExecutorConfig,
    executor::{DEFAULT_SCRIPT_INTERPRETER, DEFAULT_TIMEOUT},
};
use actiongate_session::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, PasswordSecret};
use clap::Parser;

/// Password used when nothing else is configured.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Parser)]
#[command(name = "actiongate", version, about = "Run registered actions behind public keys")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "ACTIONGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, short, env = "ACTIONGATE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Operator login name.
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    /// Operator password, in plain text or as `sha256:<hex>`.
    #[arg(
        long,
        env = "ADMIN_PASSWORD",
        default_value = DEFAULT_ADMIN_PASSWORD,
        hide_env_values = true
    )]
    pub admin_password: String,

    /// SQLite database URL. Only honoured when built with the `sqlite` feature.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Interpreter for script actions.
    #[arg(long, default_value = DEFAULT_SCRIPT_INTERPRETER)]
    pub script_interpreter: String,

    /// Budget for a single action run.
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub execution_timeout_secs: u64,

    /// Idle minutes after which an operator session expires.
    #[arg(
        long,
        default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs() / 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub session_idle_minutes: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Socket address to listen on.
    ///
    /// # Errors
    /// Returns an error if `host` is not an IP address.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid host {:?}: {e}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Parsed operator password.
    ///
    /// # Errors
    /// Returns an error for a malformed `sha256:` secret.
    pub fn password_secret(&self) -> anyhow::Result<PasswordSecret> {
        Ok(self.admin_password.parse()?)
    }

    #[must_use]
    pub fn uses_default_password(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_timeout(Duration::from_secs(self.execution_timeout_secs))
            .with_script_interpreter(self.script_interpreter.clone())
    }

    #[must_use]
    pub const fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes * 60)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["actiongate"]).unwrap();
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(config.admin_username, "admin");
        assert!(config.uses_default_password());
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(900));
        assert_eq!(config.executor_config().timeout, Duration::from_secs(30));
        assert_eq!(config.sweep_interval(), DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        for flag in [
            "--sweep-interval-secs",
            "--execution-timeout-secs",
            "--session-idle-minutes",
        ] {
            assert!(ServerConfig::try_parse_from(["actiongate", flag, "0"]).is_err());
        }
        let config =
            ServerConfig::try_parse_from(["actiongate", "--sweep-interval-secs", "1"]).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "actiongate",
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "--admin-password",
            "s3cret",
            "--execution-timeout-secs",
            "5",
            "--script-interpreter",
            "python3.12",
        ])
        .unwrap();
        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert!(!config.uses_default_password());

        let executor = config.executor_config();
        assert_eq!(executor.timeout, Duration::from_secs(5));
        assert_eq!(executor.script_interpreter, "python3.12");
    }

    #[test]
    fn test_bad_host_and_secret() {
        let config =
            ServerConfig::try_parse_from(["actiongate", "--host", "not an ip"]).unwrap();
        assert!(config.listen_addr().is_err());

        let config =
            ServerConfig::try_parse_from(["actiongate", "--admin-password", "sha256:xyz"])
                .unwrap();
        assert!(config.password_secret().is_err());
    }
}
