//! Mercury banking API client for the transaction feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use mercury_settleup::store::{FeedPage, FeedQuery, FeedSource};
use reqwest::Url;

pub const LIVE_API_URL: &str = "https://api.mercury.com/api/v1";
pub const SANDBOX_API_URL: &str = "https://api-sandbox.mercury.com/api/v1";
pub const TOKENS_PAGE: &str = "https://app.mercury.com/settings/tokens";

pub struct MercuryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MercuryClient {
    pub fn new(token: String, sandbox: bool) -> Result<Self> {
        let base_url = if sandbox { SANDBOX_API_URL } else { LIVE_API_URL };
        Self::with_base_url(token, base_url.to_owned())
    }

    pub fn with_base_url(token: String, base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mercury-settleup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(MercuryClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    fn transactions_url(&self, query: &FeedQuery) -> Result<Url> {
        let url = format!(
            "{}/account/{}/transactions",
            self.base_url, query.account_id
        );
        Ok(Url::parse_with_params(
            &url,
            [
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
                ("order", query.order.as_str().to_owned()),
                (
                    "start",
                    query.start.to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                ("search", query.search.clone()),
            ],
        )?)
    }
}

#[async_trait]
impl FeedSource for MercuryClient {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage> {
        let url = self.transactions_url(query)?;
        tracing::debug!(account = %query.account_id, offset = query.offset, "fetching transactions");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Mercury request failed")?
            .error_for_status()
            .context("Mercury rejected the transactions request")?;

        response
            .json::<FeedPage>()
            .await
            .context("Failed to decode Mercury transactions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use mercury_settleup::model::{Category, FeedStatus};
    use mercury_settleup::store::SortOrder;

    fn query(offset: usize) -> FeedQuery {
        FeedQuery {
            account_id: "acct-1".into(),
            search: "#house".into(),
            start: Utc.with_ymd_and_hms(2024, 12, 3, 0, 0, 0).unwrap(),
            limit: 500,
            offset,
            order: SortOrder::Desc,
        }
    }

    #[tokio::test]
    async fn fetch_page_sends_query_and_token() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/account/acct-1/transactions")
                    .header("Authorization", "Bearer secret-token:abc")
                    .query_param("limit", "500")
                    .query_param("offset", "500")
                    .query_param("order", "desc")
                    .query_param("start", "2024-12-03T00:00:00.000Z")
                    .query_param("search", "#house");
                then.status(200).json_body(serde_json::json!({
                    "total": 1,
                    "transactions": [{
                        "id": "txn-1",
                        "amount": -42.5,
                        "createdAt": "2025-05-01T12:00:00.000Z",
                        "status": "sent",
                        "kind": "outgoingPayment",
                        "note": "#house",
                        "counterpartyName": "Utility Co",
                        "bankDescription": "UTILITY CO 1234"
                    }]
                }));
            })
            .await;

        let client =
            MercuryClient::with_base_url("secret-token:abc".into(), server.base_url()).unwrap();
        let page = client.fetch_page(&query(500)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.total, 1);
        let entry = &page.transactions[0];
        assert_eq!(entry.id, "txn-1");
        assert_eq!(entry.kind, Some(Category::OutgoingPayment));
        assert_eq!(entry.status, Some(FeedStatus::Sent));
        assert_eq!(entry.amount.map(|amount| amount.to_string()), Some("-42.5".into()));
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/account/acct-1/transactions");
                then.status(401)
                    .json_body(serde_json::json!({ "errors": { "message": "bad token" } }));
            })
            .await;

        let client = MercuryClient::with_base_url("wrong".into(), server.base_url()).unwrap();
        let error = client.fetch_page(&query(0)).await.unwrap_err();
        assert!(format!("{error:#}").contains("401"), "{error:#}");
    }

    #[tokio::test]
    async fn missing_transactions_is_an_empty_page() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/account/acct-1/transactions");
                then.status(200).json_body(serde_json::json!({ "total": 0 }));
            })
            .await;

        let client = MercuryClient::with_base_url("t".into(), server.base_url()).unwrap();
        let page = client.fetch_page(&query(0)).await.unwrap();
        assert!(page.transactions.is_empty());
    }
}
