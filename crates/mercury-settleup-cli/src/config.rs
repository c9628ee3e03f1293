use anyhow::{Context, Result, bail};
use mercury_settleup::{Decimal, SyncConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Talk to the Mercury and Settle Up sandboxes instead of production.
    #[serde(default)]
    pub sandbox: bool,
    pub sync: Vec<SyncConfig>,
}

// `config.json` may also be a bare list of sync entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonConfig {
    List(Vec<SyncConfig>),
    Full(Config),
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            match serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            {
                JsonConfig::List(sync) => Config {
                    sandbox: false,
                    sync,
                },
                JsonConfig::Full(config) => config,
            }
        } else {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn find_and_load() -> Result<Option<Self>> {
        let config_locations = [
            Path::new("mercury-settleup.toml"),
            Path::new(".mercury-settleup.toml"),
            Path::new("config.json"),
        ];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }

    fn validate(&self) -> Result<()> {
        if self.sync.is_empty() {
            bail!("at least one [[sync]] entry is required");
        }
        for (index, sync) in self.sync.iter().enumerate() {
            for (field, value) in [
                ("mercury_account", &sync.mercury_account),
                ("settleup_group", &sync.settleup_group),
                ("settleup_payer", &sync.settleup_payer),
            ] {
                if value.trim().is_empty() {
                    bail!("sync entry {index}: {field} must not be empty");
                }
            }
            if sync.window_start(chrono::Utc::now()).is_none() {
                bail!(
                    "sync entry {index}: num_days_history = {} reaches past the supported date range",
                    sync.history_days()
                );
            }
            for member in sync.settleup_split.iter().flatten() {
                member.weight.parse::<Decimal>().map_err(|_| {
                    anyhow::anyhow!(
                        "sync entry {index}: weight {:?} for member {} is not a number",
                        member.weight,
                        member.member_id
                    )
                })?;
            }
        }
        Ok(())
    }
}

/// Secrets for both services, read from the environment.
pub struct Credentials {
    pub mercury_token: String,
    pub settleup_email: String,
    pub settleup_password: String,
    pub settleup_api_key: String,
}

impl Credentials {
    pub fn from_env(tokens_page: &str) -> Result<Self> {
        Self::from_lookup(tokens_page, |name| std::env::var(name).ok())
    }

    fn from_lookup(tokens_page: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settleup_api_key = lookup("SETTLEUP_API_KEY")
            .context("Set $SETTLEUP_API_KEY to the Settle Up API key for this environment")?;
        let (Some(settleup_email), Some(settleup_password)) =
            (lookup("SETTLEUP_EMAIL"), lookup("SETTLEUP_PASSWORD"))
        else {
            bail!("Provide $SETTLEUP_EMAIL and $SETTLEUP_PASSWORD for authentication");
        };
        let mercury_token = lookup("MERCURY_TOKEN").with_context(|| {
            format!(
                "Provide a $MERCURY_TOKEN with read access to all synced accounts (generate one at {tokens_page})"
            )
        })?;

        Ok(Credentials {
            mercury_token,
            settleup_email,
            settleup_password,
            settleup_api_key,
        })
    }
}
