// Hub HTTP client
//
// Wraps `reqwest::Client` with PocketBase URL construction, bearer-token
// caching, and the single re-authentication retry on 401. Collection
// helpers (systems, container stats) live in `collections.rs`.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{AuthResponse, Credentials, LOGIN_PATH, Session};
use crate::error::Error;
use crate::models::ListResult;
use crate::transport::TransportConfig;

/// Query parameters understood by PocketBase list endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    /// Sort expression, e.g. `-created`.
    pub sort: Option<String>,
    /// Relation to expand, e.g. `system`.
    pub expand: Option<String>,
}

impl ListQuery {
    pub fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("page", &self.page.max(1).to_string());
        if self.per_page > 0 {
            pairs.append_pair("perPage", &self.per_page.to_string());
        }
        if let Some(ref sort) = self.sort {
            pairs.append_pair("sort", sort);
        }
        if let Some(ref expand) = self.expand {
            pairs.append_pair("expand", expand);
        }
    }
}

/// Build the hub base URL from the scalar settings a user configures.
///
/// Bare IPv6 literals are bracketed so `::1` and port `8090` become
/// `http://[::1]:8090/`.
pub fn hub_url(host: &str, port: u16, use_ssl: bool) -> Result<Url, Error> {
    let scheme = if use_ssl { "https" } else { "http" };
    let host = host.trim().trim_end_matches('/');
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    Ok(Url::parse(&format!("{scheme}://{host}:{port}"))?)
}

/// HTTP client for one Beszel hub.
///
/// Owns the cached bearer session. The session is swapped atomically, so
/// the client can be shared behind an `Arc` and driven by concurrent
/// requests. Logins triggered by those requests are serialized: one login
/// replaces a refused or expired token for every request that held it.
pub struct BeszelClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    token_lifetime: Option<Duration>,
    session: ArcSwapOption<Session>,
    login_lock: Mutex<()>,
}

impl BeszelClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// Does not contact the hub; the first request authenticates lazily.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            token_lifetime: None,
            session: ArcSwapOption::empty(),
            login_lock: Mutex::new(()),
        }
    }

    /// Treat tokens as expired after `lifetime` and log in again proactively.
    pub fn with_token_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The identity used to log in.
    pub fn identity(&self) -> &str {
        &self.credentials.identity
    }

    /// The cached session, if authenticated.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.load().is_some()
    }

    /// Drop the cached token; the next request logs in again.
    pub fn clear_session(&self) {
        if self.session.swap(None).is_some() {
            debug!("cleared cached bearer token");
        }
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Exchange the configured credentials for a bearer token.
    ///
    /// `POST /api/collections/users/auth-with-password`
    ///
    /// A 400/401/403 answer is a credential rejection and is returned as
    /// [`Error::Authentication`]; callers must not retry it.
    pub async fn authenticate(&self) -> Result<Arc<Session>, Error> {
        let url = self.base_url.join(LOGIN_PATH)?;
        debug!(identity = %self.credentials.identity, "authenticating at {}", url);

        let body = json!({
            "identity": self.credentials.identity,
            "password": self.credentials.password.expose_secret(),
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            self.clear_session();
            return Err(Error::Authentication {
                message: format!("credentials rejected (HTTP {status})"),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await?;
        let auth: AuthResponse = decode(&body)?;
        let token = auth
            .token
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)?;

        let session = Arc::new(Session::new(
            SecretString::from(token),
            self.token_lifetime,
        ));
        self.session.store(Some(Arc::clone(&session)));
        debug!("authentication successful");
        Ok(session)
    }

    /// Return the cached session, logging in when there is none or it expired.
    async fn ensure_session(&self) -> Result<Arc<Session>, Error> {
        let stale = self.session.load_full();
        if let Some(ref session) = stale {
            if !session.is_expired_at(Utc::now()) {
                return Ok(Arc::clone(session));
            }
            debug!("cached token past its lifetime, refreshing");
        }
        self.replace_session(stale.as_ref()).await
    }

    /// Log in again in place of `stale`, unless a concurrent request already did.
    ///
    /// Holds the login lock across the login so requests that observed the
    /// same stale session wait for it and then reuse the new token.
    async fn replace_session(&self, stale: Option<&Arc<Session>>) -> Result<Arc<Session>, Error> {
        let _guard = self.login_lock.lock().await;
        if let Some(current) = self.session.load_full() {
            let replaced = stale.is_none_or(|old| !Arc::ptr_eq(old, &current));
            if replaced && !current.is_expired_at(Utc::now()) {
                trace!("session already replaced by a concurrent request");
                return Ok(current);
            }
        }
        self.authenticate().await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authorized GET, re-authenticating exactly once on 401.
    ///
    /// A second 401 after a fresh login fails with [`Error::Authentication`]
    /// and leaves the client unauthenticated.
    pub(crate) async fn get_authorized(&self, url: Url) -> Result<reqwest::Response, Error> {
        let session = self.ensure_session().await?;
        debug!("GET {}", url);
        let resp = self.send_get(&url, &session.token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        warn!("bearer token rejected, re-authenticating once");
        let session = self.replace_session(Some(&session)).await?;
        let resp = self.send_get(&url, &session.token).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.clear_session();
            return Err(Error::Authentication {
                message: "token rejected after re-authentication".into(),
            });
        }
        Ok(resp)
    }

    async fn send_get(&self, url: &Url, token: &SecretString) -> Result<reqwest::Response, Error> {
        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        trace!(status = %resp.status(), "response received");
        Ok(resp)
    }

    /// GET a URL and decode the JSON body, mapping HTTP failures.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        collection: &str,
    ) -> Result<T, Error> {
        let resp = self.get_authorized(url).await?;
        parse_response(resp, collection).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/collections/{collection}/records`
    pub(crate) fn records_url(&self, collection: &str) -> Result<Url, Error> {
        Ok(self
            .base_url
            .join(&format!("/api/collections/{collection}/records"))?)
    }

    /// `{base}/api/collections/{collection}/records/{id}`
    pub(crate) fn record_url(&self, collection: &str, id: &str) -> Result<Url, Error> {
        Ok(self
            .base_url
            .join(&format!("/api/collections/{collection}/records/{id}"))?)
    }

    // ── Generic record access ────────────────────────────────────────

    /// Fetch one page of a collection.
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<ListResult<T>, Error> {
        let mut url = self.records_url(collection)?;
        query.apply(&mut url);
        self.get_json(url, collection).await
    }

    /// Walk every page of a collection.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: ListQuery,
    ) -> Result<Vec<T>, Error> {
        let mut query = query;
        query.page = query.page.max(1);
        let mut all = Vec::new();

        loop {
            let page: ListResult<T> = self.list_page(collection, &query).await?;
            let received = page.items.len();
            all.extend(page.items);

            let total_pages = u32::try_from(page.total_pages).unwrap_or(0);
            if received == 0 || query.page >= total_pages {
                break;
            }
            query.page += 1;
        }

        Ok(all)
    }

    /// Fetch a single record by id.
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<T, Error> {
        let url = self.record_url(collection, id)?;
        self.get_json(url, collection).await
    }
}

/// Map a response to `T`, or to the error its status implies.
async fn parse_response<T: DeserializeOwned>(
    resp: reqwest::Response,
    collection: &str,
) -> Result<T, Error> {
    let status = resp.status();

    if status == StatusCode::NOT_FOUND {
        return Err(Error::CollectionNotFound {
            collection: collection.to_owned(),
        });
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "token rejected".into(),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await?;
    decode(&body)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

/// First 200 bytes of a body, cut on a char boundary.
fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hub_url_picks_scheme_from_ssl_flag() {
        assert_eq!(
            hub_url("beszel.lan", 8090, false).unwrap().as_str(),
            "http://beszel.lan:8090/"
        );
        assert_eq!(
            hub_url("beszel.lan", 443, true).unwrap().as_str(),
            "https://beszel.lan/"
        );
    }

    #[test]
    fn hub_url_brackets_ipv6_literals() {
        assert_eq!(
            hub_url("::1", 8090, false).unwrap().as_str(),
            "http://[::1]:8090/"
        );
    }

    #[test]
    fn list_query_serializes_pocketbase_params() {
        let mut url = Url::parse("http://hub/api/collections/x/records").unwrap();
        ListQuery::new(100)
            .sort("-created")
            .expand("system")
            .apply(&mut url);
        assert_eq!(url.query(), Some("page=1&perPage=100&sort=-created&expand=system"));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let cut = preview(&body);
        assert!(cut.len() <= 200);
        assert!(body.starts_with(cut));
    }
}
