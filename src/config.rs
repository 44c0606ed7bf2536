use clap::Parser;
use std::time::Duration;

use crate::broadcast::BroadcastSettings;

/// Live sports snapshot broadcaster
#[derive(Parser, Debug, Clone)]
#[command(name = "livesports-broadcaster", version, about)]
pub struct Config {
    /// Address the push gateway listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// RapidAPI key shared by the cricket and football feeds. Without it the
    /// feeds broadcast empty lists.
    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true)]
    pub rapidapi_key: Option<String>,

    /// Cricbuzz (RapidAPI) base URL
    #[arg(
        long,
        env = "CRICKET_API_URL",
        default_value = "https://cricbuzz-cricket.p.rapidapi.com"
    )]
    pub cricket_api_url: String,

    /// API-Football (RapidAPI) base URL
    #[arg(
        long,
        env = "FOOTBALL_API_URL",
        default_value = "https://api-football-v1.p.rapidapi.com"
    )]
    pub football_api_url: String,

    /// Cricbuzz match whose scorecard is broadcast
    #[arg(long, env = "CRICKET_MATCH_ID", default_value = "40381")]
    pub cricket_match_id: u64,

    /// API-Football team id pair for the head-to-head feed, as `home-away`
    #[arg(long, env = "HEAD_TO_HEAD", default_value = "33-34")]
    pub head_to_head: String,

    /// Idle delay between broadcast cycles in seconds
    #[arg(long, env = "BROADCAST_INTERVAL_SECS", default_value = "30")]
    pub broadcast_interval_secs: u64,

    /// Cricket feed request timeout in seconds
    #[arg(long, env = "CRICKET_TIMEOUT_SECS", default_value = "15")]
    pub cricket_timeout_secs: u64,

    /// Football fixtures request timeout in seconds
    #[arg(long, env = "FOOTBALL_TIMEOUT_SECS", default_value = "20")]
    pub football_timeout_secs: u64,

    /// Head-to-head request timeout in seconds
    #[arg(long, env = "HEAD_TO_HEAD_TIMEOUT_SECS", default_value = "15")]
    pub head_to_head_timeout_secs: u64,

    /// Per-subscriber push timeout in seconds
    #[arg(long, env = "PUSH_TIMEOUT_SECS", default_value = "10")]
    pub push_timeout_secs: u64,

    /// Value of the `server` field in every snapshot
    #[arg(long, env = "SERVER_TAG", default_value = "MCP Live Server v2")]
    pub server_tag: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broadcast_interval_secs == 0 {
            anyhow::bail!("broadcast_interval_secs must be positive");
        }
        for (name, secs) in [
            ("cricket_timeout_secs", self.cricket_timeout_secs),
            ("football_timeout_secs", self.football_timeout_secs),
            ("head_to_head_timeout_secs", self.head_to_head_timeout_secs),
            ("push_timeout_secs", self.push_timeout_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }
        for (name, raw) in [
            ("cricket_api_url", &self.cricket_api_url),
            ("football_api_url", &self.football_api_url),
        ] {
            let url = url::Url::parse(raw)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", name, raw, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("{} must be an http(s) URL, got {}", name, raw);
            }
        }
        if !is_team_pair(&self.head_to_head) {
            anyhow::bail!(
                "head_to_head must look like `33-34`, got {:?}",
                self.head_to_head
            );
        }
        if self.server_tag.trim().is_empty() {
            anyhow::bail!("server_tag must not be empty");
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.rapidapi_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    pub fn broadcast_settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            interval: Duration::from_secs(self.broadcast_interval_secs),
            push_timeout: Duration::from_secs(self.push_timeout_secs),
            server_tag: self.server_tag.clone(),
        }
    }
}

fn is_team_pair(s: &str) -> bool {
    match s.split_once('-') {
        Some((home, away)) => {
            !home.is_empty()
                && !away.is_empty()
                && home.bytes().all(|b| b.is_ascii_digit())
                && away.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["livesports-broadcaster"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&[]);
        config.validate().unwrap();
        let settings = config.broadcast_settings();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.server_tag, "MCP Live Server v2");
        assert_eq!(config.cricket_match_id, 40381);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = parse(&["--broadcast-interval-secs", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(parse(&["--cricket-api-url", "not a url"]).validate().is_err());
        assert!(parse(&["--football-api-url", "ftp://example.com"]).validate().is_err());
    }

    #[test]
    fn test_head_to_head_pair() {
        assert!(is_team_pair("33-34"));
        assert!(!is_team_pair("33"));
        assert!(!is_team_pair("33-"));
        assert!(!is_team_pair("a-b"));
        assert!(parse(&["--head-to-head", "arsenal"]).validate().is_err());
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        assert!(!parse(&["--rapidapi-key", " "]).has_api_key());
        assert!(parse(&["--rapidapi-key", "abc"]).has_api_key());
    }
}
