//! Client side of the ledger's transaction feed API.

use std::time::Duration;

use async_trait::async_trait;
use ledger_types::feed::{
    ErrorBody, Feed, FeedCreate, FeedGet, FeedUpdate, TransactionPage, TransactionQuery,
};
use reqwest::Url;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info};
use uuid::Uuid;

use crate::FeedError;

pub type ResultFeed<T> = Result<T, FeedError>;

/// Error code the ledger uses when a long poll expires.
const CODE_TIMEOUT: &str = "CH001";
/// Error code the ledger uses when a feed alias is taken.
const CODE_ALIAS_TAKEN: &str = "CH050";

/// Extra time granted to the HTTP request on top of the long-poll wait, so
/// the ledger always answers before the client gives up.
const LONG_POLL_GRACE: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the importer needs from the ledger.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn create_feed(&self, alias: &str, filter: &str) -> ResultFeed<Feed>;

    async fn get_feed(&self, alias: &str) -> ResultFeed<Feed>;

    /// Next page after `query.after`, waiting up to `query.timeout` ms for one.
    async fn list_transactions(&self, query: &TransactionQuery) -> ResultFeed<TransactionPage>;

    /// Compare-and-swap the feed cursor.
    async fn update_feed(&self, update: &FeedUpdate) -> ResultFeed<Feed>;
}

/// Create the feed `alias`, or fetch it when it already exists.
pub async fn open_feed(api: &dyn FeedApi, alias: &str, filter: &str) -> ResultFeed<Feed> {
    match api.create_feed(alias, filter).await {
        Ok(feed) => {
            info!(feed = %alias, "created transaction feed");
            Ok(feed)
        }
        Err(FeedError::AlreadyExists(_)) => {
            let feed = api.get_feed(alias).await?;
            info!(feed = %alias, after = %feed.after, "resuming transaction feed");
            Ok(feed)
        }
        Err(err) => Err(err),
    }
}

/// [`FeedApi`] over the ledger's JSON-over-HTTP interface.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    base_url: Url,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl HttpFeedClient {
    /// `access_token` has the form `user:secret` and is sent as basic auth.
    pub fn new(base_url: &str, access_token: Option<&str>) -> ResultFeed<Self> {
        let mut raw = base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).map_err(|err| FeedError::InvalidUrl(format!("{base_url}: {err}")))?;

        let credentials = access_token
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once(':') {
                Some((user, secret)) => (user.to_string(), secret.to_string()),
                None => (token.to_string(), String::new()),
            });

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FeedError::Transport)?;

        Ok(Self {
            base_url,
            http,
            credentials,
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B, timeout: Option<Duration>) -> ResultFeed<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| FeedError::InvalidUrl(format!("{path}: {err}")))?;

        let mut request = self.http.post(endpoint).json(body);
        if let Some((user, secret)) = &self.credentials {
            request = request.basic_auth(user, Some(secret));
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let res = request.send().await.map_err(|err| {
            if err.is_timeout() {
                FeedError::Timeout
            } else {
                FeedError::Transport(err)
            }
        })?;

        if res.status().is_success() {
            return res.json::<T>().await.map_err(FeedError::Transport);
        }

        let status = res.status().as_u16();
        let body = res.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
            code: String::new(),
            message: "unknown error".to_string(),
        });
        debug!(path, status, code = %body.code, "ledger returned an error");

        let err = match (status, body.code.as_str()) {
            (_, CODE_TIMEOUT) => FeedError::Timeout,
            (_, CODE_ALIAS_TAKEN) => FeedError::AlreadyExists(body.message),
            (404, _) => FeedError::NotFound(body.message),
            (400 | 409 | 422, _) => FeedError::Rejected(body.message),
            _ => FeedError::Server {
                status,
                code: body.code,
                message: body.message,
            },
        };
        Err(err)
    }
}

#[async_trait]
impl FeedApi for HttpFeedClient {
    async fn create_feed(&self, alias: &str, filter: &str) -> ResultFeed<Feed> {
        let payload = FeedCreate {
            alias: alias.to_string(),
            filter: filter.to_string(),
            client_token: Uuid::new_v4(),
        };
        self.post("create-transaction-feed", &payload, None).await
    }

    async fn get_feed(&self, alias: &str) -> ResultFeed<Feed> {
        let payload = FeedGet {
            alias: alias.to_string(),
        };
        self.post("get-transaction-feed", &payload, None).await
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> ResultFeed<TransactionPage> {
        let timeout = Duration::from_millis(query.timeout) + LONG_POLL_GRACE;
        self.post("list-transactions", query, Some(timeout)).await
    }

    async fn update_feed(&self, update: &FeedUpdate) -> ResultFeed<Feed> {
        self.post("update-transaction-feed", update, None).await
    }
}
