use crate::alert::DINGTALK_ROBOT_URL;
use crate::error::ConfigError;
use alloy_primitives::Address;
use clap::{ArgAction, Parser};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

static WHOLE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\d+(?:\.\d*)?|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+$")
        .expect("valid duration regex")
});

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*)(?:\.(\d*))?(ns|us|µs|μs|ms|s|m|h)").expect("valid duration part regex")
});

#[derive(Parser, Debug, Clone)]
#[command(name = "balance-monitor")]
#[command(
    about = "Watch an ERC20 balance and alert a DingTalk robot above a threshold",
    long_about = None
)]
pub struct Args {
    /// JSON-RPC endpoint(s), comma separated; later ones are fallbacks
    #[arg(
        long,
        env = "MONITOR_NODE",
        value_delimiter = ',',
        default_value = "https://rpc.merlinchain.io/"
    )]
    pub node: Vec<String>,

    #[arg(
        long,
        env = "MONITOR_TOKEN",
        default_value = "0x967aEC3276b63c5E2262da9641DB9dbeBB07dC0d"
    )]
    pub token: String,

    #[arg(
        long,
        env = "MONITOR_ADDR",
        default_value = "0x25aB3Efd52e6470681CE037cD546Dc60726948D3"
    )]
    pub addr: String,

    #[arg(long, env = "MONITOR_ADDR_NAME", default_value = "Meson")]
    pub addr_name: String,

    #[arg(long, env = "MONITOR_THRESHOLD", default_value_t = 2000.0)]
    pub threshold: f64,

    /// Poll interval, e.g. `3s`, `500ms`, `1m30s`
    #[arg(long, env = "MONITOR_INTERVAL", default_value = "3s")]
    pub interval: String,

    #[arg(long, env = "MONITOR_DING_TOKEN", default_value = "")]
    pub ding_token: String,

    /// Log balances only, never notify
    #[arg(long, env = "MONITOR_MUTE")]
    pub mute: bool,

    /// Fractional digits shown in balances
    #[arg(long, env = "MONITOR_PRECISION", default_value_t = 2)]
    pub precision: usize,

    #[arg(long, env = "MONITOR_RPC_TIMEOUT", default_value = "10s")]
    pub rpc_timeout: String,

    #[arg(long, env = "MONITOR_WEBHOOK_TIMEOUT", default_value = "10s")]
    pub webhook_timeout: String,

    #[arg(long, env = "MONITOR_WEBHOOK_URL", default_value = DINGTALK_ROBOT_URL)]
    pub webhook_url: String,

    #[arg(
        long,
        env = "MONITOR_AT_ALL",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub at_all: bool,

    #[arg(long, env = "MONITOR_AT_MOBILES", value_delimiter = ',')]
    pub at_mobiles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node_urls: Vec<String>,
    pub token_address: Address,
    pub account_address: Address,
    pub account_alias: String,
    pub threshold: f64,
    pub interval: Duration,
    pub webhook_token: String,
    pub mute: bool,
    pub precision: usize,
    pub rpc_timeout: Duration,
    pub webhook_timeout: Duration,
    pub webhook_url: String,
    pub at_all: bool,
    pub at_mobiles: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if !args.mute && args.ding_token.trim().is_empty() {
            return Err(ConfigError::MissingWebhookToken);
        }

        let node_urls: Vec<String> = args
            .node
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if node_urls.is_empty() {
            return Err(ConfigError::NoNodeUrl);
        }

        if !args.threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold(args.threshold.to_string()));
        }

        Ok(Config {
            node_urls,
            token_address: parse_address("token", &args.token)?,
            account_address: parse_address("account", &args.addr)?,
            account_alias: args.addr_name,
            threshold: args.threshold,
            interval: parse_positive_duration("interval", &args.interval)?,
            webhook_token: args.ding_token.trim().to_string(),
            mute: args.mute,
            precision: args.precision,
            rpc_timeout: parse_positive_duration("rpc timeout", &args.rpc_timeout)?,
            webhook_timeout: parse_positive_duration("webhook timeout", &args.webhook_timeout)?,
            webhook_url: args.webhook_url,
            at_all: args.at_all,
            at_mobiles: args
                .at_mobiles
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        })
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value.trim()).map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn parse_positive_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration(field));
    }
    Ok(duration)
}

/// Parses Go-style durations: a sequence of `<number><unit>` groups such as
/// `300ms`, `1.5h` or `2h45m`. A bare `0` is also accepted.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(value.to_string());
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }

    if !WHOLE_DURATION.is_match(value) {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    for captures in DURATION_PART.captures_iter(value) {
        let unit_nanos: u128 = match &captures[3] {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(invalid()),
        };

        let int_digits = &captures[1];
        let int: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().map_err(|_| invalid())?
        };
        let mut nanos = int.checked_mul(unit_nanos).ok_or_else(invalid)?;

        if let Some(frac_digits) = captures
            .get(2)
            .map(|m| m.as_str())
            .filter(|f| !f.is_empty())
        {
            let scale = u32::try_from(frac_digits.len())
                .ok()
                .and_then(|len| 10u128.checked_pow(len))
                .ok_or_else(invalid)?;
            let frac: u128 = frac_digits.parse().map_err(|_| invalid())?;
            nanos += frac.checked_mul(unit_nanos).ok_or_else(invalid)? / scale;
        }

        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
    }

    u64::try_from(total_nanos)
        .map(Duration::from_nanos)
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["balance-monitor"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["", "3", "s", "3x", "-3s", "3 s", "1m30"] {
            assert_eq!(
                parse_duration(bad),
                Err(ConfigError::InvalidDuration(bad.to_string())),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn duration_patterns_are_shared_across_calls() {
        assert!(WHOLE_DURATION.is_match("1h2m3s4ms5us6ns"));
        assert!(!WHOLE_DURATION.is_match("1h 2m"));
        assert_eq!(DURATION_PART.captures_iter("1h2m3.5s").count(), 3);

        for _ in 0..1_000 {
            assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        }
        assert_eq!(
            parse_duration("1h2m3s4ms5us6ns").unwrap(),
            Duration::new(3723, 4_005_006)
        );
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn defaults_match_deployment() {
        let config = Config::from_args(args(&["--ding-token", "secret"])).unwrap();

        assert_eq!(
            config.node_urls,
            vec!["https://rpc.merlinchain.io/".to_string()]
        );
        assert_eq!(
            config.token_address,
            Address::from_str("0x967aEC3276b63c5E2262da9641DB9dbeBB07dC0d").unwrap()
        );
        assert_eq!(config.account_alias, "Meson");
        assert_eq!(config.threshold, 2000.0);
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.precision, 2);
        assert!(config.at_all);
        assert!(config.at_mobiles.is_empty());
        assert!(!config.mute);
    }

    #[test]
    fn webhook_token_required_unless_muted() {
        assert_eq!(
            Config::from_args(args(&[])).err(),
            Some(ConfigError::MissingWebhookToken)
        );
        assert_eq!(
            Config::from_args(args(&["--ding-token", "   "])).err(),
            Some(ConfigError::MissingWebhookToken)
        );
        assert!(Config::from_args(args(&["--mute"])).is_ok());
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            Config::from_args(args(&["--mute", "--token", "0x1234"])),
            Err(ConfigError::InvalidAddress { field: "token", .. })
        ));
        assert_eq!(
            Config::from_args(args(&["--mute", "--interval", "soon"])).err(),
            Some(ConfigError::InvalidDuration("soon".to_string()))
        );
        assert_eq!(
            Config::from_args(args(&["--mute", "--interval", "0s"])).err(),
            Some(ConfigError::ZeroDuration("interval"))
        );
        assert!(matches!(
            Config::from_args(args(&["--mute", "--threshold", "NaN"])),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn splits_lists() {
        let config = Config::from_args(args(&[
            "--mute",
            "--node",
            "http://a:8545,http://b:8545",
            "--at-all",
            "false",
            "--at-mobiles",
            "138, 139",
        ]))
        .unwrap();

        assert_eq!(config.node_urls, vec!["http://a:8545", "http://b:8545"]);
        assert!(!config.at_all);
        assert_eq!(config.at_mobiles, vec!["138", "139"]);
    }
}
