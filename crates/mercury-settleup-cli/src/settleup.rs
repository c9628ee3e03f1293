//! Settle Up client over the Firebase realtime database REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mercury_settleup::model::{LedgerEntry, Member};
use mercury_settleup::store::LedgerStore;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub const LIVE_DATABASE_URL: &str = "https://settle-up-live.firebaseio.com";
pub const SANDBOX_DATABASE_URL: &str = "https://settle-up-sandbox.firebaseio.com";
pub const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in request failed")]
    Request(#[from] reqwest::Error),
    #[error("invalid sign-in url: {0}")]
    Url(String),
    #[error("sign-in rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
}

#[derive(Deserialize)]
struct FirebaseErrorBody {
    error: FirebaseError,
}

#[derive(Deserialize)]
struct FirebaseError {
    message: String,
}

pub struct SettleUpClient {
    http: reqwest::Client,
    database_url: String,
    token: String,
}

impl SettleUpClient {
    /// Exchange email and password for an id token and connect to `database_url`.
    pub async fn sign_in(
        identity_url: &str,
        database_url: &str,
        api_key: &str,
        email: &str,
        password: &str,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mercury-settleup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let url = Url::parse_with_params(
            &format!(
                "{}/v1/accounts:signInWithPassword",
                identity_url.trim_end_matches('/')
            ),
            [("key", api_key)],
        )
        .map_err(|error| AuthError::Url(error.to_string()))?;

        let response = http
            .post(url)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<FirebaseErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let SignInResponse { id_token } = response.json().await?;
        tracing::debug!("signed in to Settle Up");

        Ok(SettleUpClient {
            http,
            database_url: database_url.trim_end_matches('/').to_owned(),
            token: id_token,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let url = format!("{}/{path}.json", self.database_url);
        let params = std::iter::once(("auth", self.token.as_str())).chain(params.iter().copied());
        Ok(Url::parse_with_params(&url, params)?)
    }

    // Firebase answers `null` for a missing path.
    async fn get_map<T: DeserializeOwned>(&self, url: Url) -> Result<BTreeMap<String, T>> {
        let map = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Option<BTreeMap<String, T>>>()
            .await?;
        Ok(map.unwrap_or_default())
    }
}

/// Firebase query parameters are JSON values.
fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

#[async_trait]
impl LedgerStore for SettleUpClient {
    async fn members(&self, group: &str) -> Result<BTreeMap<String, Member>> {
        let url = self.url(&format!("members/{group}"), &[])?;
        self.get_map(url)
            .await
            .with_context(|| format!("Failed to read members of group {group}"))
    }

    async fn entries_in_range(
        &self,
        group: &str,
        start_at: &str,
        end_at: &str,
    ) -> Result<BTreeMap<String, LedgerEntry>> {
        let order_by = json_string("$key");
        let start_at = json_string(start_at);
        let end_at = json_string(end_at);
        let url = self.url(
            &format!("transactions/{group}"),
            &[
                ("orderBy", &order_by),
                ("startAt", &start_at),
                ("endAt", &end_at),
            ],
        )?;
        self.get_map(url)
            .await
            .with_context(|| format!("Failed to read transactions of group {group}"))
    }

    async fn merge_entries(
        &self,
        group: &str,
        entries: &BTreeMap<String, LedgerEntry>,
    ) -> Result<()> {
        let url = self.url(&format!("transactions/{group}"), &[])?;
        self.http
            .patch(url)
            .json(entries)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Failed to write transactions of group {group}"))?;
        Ok(())
    }

    async fn delete_entry(&self, group: &str, id: &str) -> Result<()> {
        let url = self.url(&format!("transactions/{group}/{id}"), &[])?;
        self.http
            .delete(url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Failed to delete transaction {id} of group {group}"))?;
        Ok(())
    }
}
