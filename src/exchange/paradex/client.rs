//! Paradex REST API client.
//!
//! Authenticates with an interactive-usage session token and exposes the
//! subset of the API the trading loop needs:
//! - Balance, positions and market metadata
//! - Top-of-book snapshots
//! - Limit / market order submission and cancel-all

use super::types::*;
use crate::config::{Credentials, VenueConfig};
use crate::exchange::error::VenueError;
use crate::exchange::traits::{VenueClient, VenueResult};
use crate::exchange::types::{
    InstrumentMetadata, LimitOrder, MarketOrder, MarketSnapshot, OrderAck, Position, TimeInForce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

const PROD_BASE_URL: &str = "https://api.prod.paradex.trade/v1";
const TESTNET_BASE_URL: &str = "https://api.testnet.paradex.trade/v1";

/// Validity window of the auth request signature, and the assumed session
/// lifetime when the token carries no readable `exp` claim.
const SESSION_TTL_SECS: i64 = 300;
/// Renew the token when it has less than this left.
const SESSION_RENEW_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    expires_at: i64,
}

impl Session {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at > now + SESSION_RENEW_MARGIN_SECS
    }
}

/// Paradex API client bound to one account (or none, for public market data).
pub struct ParadexClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    session: RwLock<Option<Session>>,
    markets: RwLock<HashMap<String, InstrumentMetadata>>,
    unlisted: RwLock<HashSet<String>>,
}

/// Claims read from the session JWT payload.
#[derive(Debug, Default, serde::Deserialize)]
struct SessionClaims {
    exp: Option<i64>,
    token_usage: Option<String>,
}

impl SessionClaims {
    /// Decode the (unverified) payload segment of a JWT.
    fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl ParadexClient {
    /// Create an authenticated client for one account.
    pub fn new(config: &VenueConfig, credentials: Credentials) -> anyhow::Result<Self> {
        Self::build(config.base_url(), Some(credentials))
    }

    /// Create a client that only reads public market data.
    pub fn public(config: &VenueConfig) -> anyhow::Result<Self> {
        Self::build(config.base_url(), None)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(base_url: &str, credentials: Option<Credentials>) -> anyhow::Result<Self> {
        Self::build(base_url.to_string(), credentials)
    }

    fn build(base_url: String, credentials: Option<Credentials>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            session: RwLock::new(None),
            markets: RwLock::new(HashMap::new()),
            unlisted: RwLock::new(HashSet::new()),
        })
    }

    /// Default base URL for an environment name ("prod" or anything else = testnet).
    pub fn default_base_url(environment: &str) -> &'static str {
        if environment == "prod" {
            PROD_BASE_URL
        } else {
            TESTNET_BASE_URL
        }
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(secret: &str, payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn credentials(&self) -> VenueResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| VenueError::Auth("client has no credentials".to_string()))
    }

    /// Request a fresh interactive session token.
    #[instrument(skip(self), name = "paradex_auth")]
    async fn request_session(&self) -> VenueResult<Session> {
        let credentials = self.credentials()?;
        let timestamp = Utc::now().timestamp();
        let expiration = timestamp + SESSION_TTL_SECS;
        let signature = Self::sign(
            &credentials.private_key,
            &format!("{}POST/v1/auth{}", timestamp, expiration),
        );

        let url = format!("{}/auth?token_usage=interactive", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("PARADEX-STARKNET-ACCOUNT", &credentials.address)
            .header("PARADEX-TIMESTAMP", timestamp.to_string())
            .header("PARADEX-SIGNATURE-EXPIRATION", expiration.to_string())
            .header("PARADEX-STARKNET-SIGNATURE", signature)
            .send()
            .await?;

        let auth: AuthResponse = match Self::parse(response).await {
            Ok(auth) => auth,
            Err(VenueError::Http { status, message }) => {
                return Err(VenueError::Auth(format!("{} - {}", status, message)))
            }
            Err(e) => return Err(e),
        };

        let claims = SessionClaims::decode(&auth.jwt_token).unwrap_or_else(|| {
            warn!("Session token payload unreadable, assuming {}s lifetime", SESSION_TTL_SECS);
            SessionClaims::default()
        });
        match claims.token_usage.as_deref() {
            Some("interactive") => {}
            other => warn!(
                account = %credentials.short_address(),
                token_usage = ?other,
                "Session token is not interactive, orders will not get zero-fee treatment"
            ),
        }
        let expires_at = claims.exp.unwrap_or(expiration);

        info!(
            account = %credentials.short_address(),
            expires_in = expires_at - timestamp,
            "Interactive session established"
        );
        Ok(Session {
            token: auth.jwt_token,
            expires_at,
        })
    }

    /// Bearer token for the current session, renewing it near expiry.
    async fn bearer(&self) -> VenueResult<String> {
        let now = Utc::now().timestamp();
        if let Some(session) = self.session.read().await.as_ref() {
            if session.is_fresh(now) {
                return Ok(session.token.clone());
            }
        }

        debug!("Session missing or expiring, re-authenticating");
        let session = self.request_session().await?;
        let token = session.token.clone();
        *self.session.write().await = Some(session);
        Ok(token)
    }

    async fn authorized(&self, request: RequestBuilder) -> VenueResult<RequestBuilder> {
        let token = self.bearer().await?;
        Ok(request.bearer_auth(token))
    }

    /// Check the status code and decode the JSON body.
    async fn parse<T: DeserializeOwned>(response: Response) -> VenueResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VenueError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(VenueError::from)
    }

    async fn get_private<T: DeserializeOwned>(&self, path: &str) -> VenueResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.authorized(self.http.get(&url)).await?;
        let response = request.send().await?;
        Self::parse(response).await
    }

    async fn load_markets(&self) -> VenueResult<()> {
        let url = format!("{}/markets", self.base_url);
        let response = self.http.get(&url).send().await?;
        let page: ResultsPage<MarketEntry> = Self::parse(response).await?;

        let mut markets = self.markets.write().await;
        for entry in &page.results {
            markets.insert(entry.symbol.clone(), InstrumentMetadata::from(entry));
        }
        self.unlisted.write().await.retain(|m| !markets.contains_key(m));
        debug!("Loaded {} market definitions", markets.len());
        Ok(())
    }

    async fn post_order(&self, request: OrderRequest) -> VenueResult<OrderAck> {
        let url = format!("{}/orders", self.base_url);
        let builder = self.authorized(self.http.post(&url).json(&request)).await?;
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                VenueError::Rejected(format!("{} - {}", status, message))
            } else {
                VenueError::Http {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let body = response.text().await?;
        let order: OrderResponse = serde_json::from_str(&body)?;

        if !order.flags.iter().any(|f| f == "INTERACTIVE") {
            warn!(flags = ?order.flags, "Order accepted without INTERACTIVE flag");
        }

        Ok(OrderAck {
            order_id: order.id,
            client_id: order.client_id,
            market: order.market,
            side: order.side,
            size: order.size,
            price: order.price,
        })
    }

    fn signed_order(&self, mut request: OrderRequest) -> VenueResult<OrderRequest> {
        let credentials = self.credentials()?;
        request.signature = Self::sign(&credentials.private_key, &request.signing_payload());
        Ok(request)
    }
}

#[async_trait]
impl VenueClient for ParadexClient {
    async fn authenticate(&self) -> VenueResult<()> {
        self.bearer().await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn get_balance(&self) -> VenueResult<Option<Decimal>> {
        let page: ResultsPage<BalanceEntry> = self.get_private("/balance").await?;
        Ok(page
            .results
            .into_iter()
            .find(|b| b.token == "USDC")
            .map(|b| b.size))
    }

    #[instrument(skip(self))]
    async fn get_market_snapshot(&self, market: &str) -> VenueResult<Option<MarketSnapshot>> {
        let url = format!(
            "{}/orderbook/{}?depth=1",
            self.base_url,
            urlencoding::encode(market)
        );
        let mut request = self.http.get(&url);
        if self.credentials.is_some() {
            request = self.authorized(request).await?;
        }
        let response = request.send().await?;
        let book: OrderBookResponse = Self::parse(response).await?;
        Ok(book.to_snapshot())
    }

    #[instrument(skip(self))]
    async fn get_instrument_metadata(
        &self,
        market: &str,
    ) -> VenueResult<Option<InstrumentMetadata>> {
        if let Some(meta) = self.markets.read().await.get(market) {
            return Ok(Some(*meta));
        }
        if self.unlisted.read().await.contains(market) {
            return Ok(None);
        }

        self.load_markets().await?;
        let meta = self.markets.read().await.get(market).copied();
        if meta.is_none() {
            warn!(%market, "Market not listed by venue");
            self.unlisted.write().await.insert(market.to_string());
        }
        Ok(meta)
    }

    #[instrument(skip(self))]
    async fn get_open_position(&self, market: &str) -> VenueResult<Option<Position>> {
        let page: ResultsPage<PositionEntry> = self.get_private("/positions").await?;
        Ok(page
            .results
            .into_iter()
            .find(|p| p.market == market && p.is_open())
            .map(|p| Position {
                market: p.market,
                side: p.side,
                size: p.size,
            }))
    }

    #[instrument(skip(self))]
    async fn submit_limit_order(&self, order: &LimitOrder) -> VenueResult<OrderAck> {
        let timestamp = Utc::now().timestamp_millis();
        let request = self.signed_order(OrderRequest {
            market: order.market.clone(),
            side: order.side,
            order_type: WireOrderType::Limit,
            size: order.size,
            price: Some(order.price),
            instruction: order.time_in_force.as_str().to_string(),
            client_id: format!("sniper_{}", timestamp),
            flags: Vec::new(),
            signature: String::new(),
            signature_timestamp: timestamp,
        })?;

        let ack = self.post_order(request).await?;
        info!(
            order_id = %ack.order_id,
            side = %order.side,
            size = %order.size,
            price = %order.price,
            "Limit order accepted"
        );
        Ok(ack)
    }

    #[instrument(skip(self))]
    async fn submit_market_order(&self, order: &MarketOrder) -> VenueResult<OrderAck> {
        let timestamp = Utc::now().timestamp_millis();
        let flags = if order.reduce_only {
            vec!["REDUCE_ONLY".to_string()]
        } else {
            Vec::new()
        };
        let request = self.signed_order(OrderRequest {
            market: order.market.clone(),
            side: order.side,
            order_type: WireOrderType::Market,
            size: order.size,
            price: None,
            instruction: TimeInForce::Ioc.as_str().to_string(),
            client_id: format!("sniper_mkt_{}", timestamp),
            flags,
            signature: String::new(),
            signature_timestamp: timestamp,
        })?;

        let ack = self.post_order(request).await?;
        info!(
            order_id = %ack.order_id,
            side = %order.side,
            size = %order.size,
            reduce_only = order.reduce_only,
            "Market order accepted"
        );
        Ok(ack)
    }

    #[instrument(skip(self))]
    async fn cancel_all_orders(&self, market: &str) -> VenueResult<usize> {
        let query = format!("/orders?market={}", urlencoding::encode(market));
        let open: ResultsPage<OrderResponse> = self.get_private(&query).await?;
        if open.results.is_empty() {
            return Ok(0);
        }

        let url = format!("{}{}", self.base_url, query);
        let response = self.authorized(self.http.delete(&url)).await?.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VenueError::Http {
                status: status.as_u16(),
                message,
            });
        }

        info!(%market, cancelled = open.results.len(), "Open orders cancelled");
        Ok(open.results.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::{OrderSide, PositionSide};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_credentials() -> Credentials {
        Credentials {
            address: "0xabc123".to_string(),
            private_key: "secret".to_string(),
        }
    }

    async fn mount_auth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(query_param("token_usage", "interactive"))
            .and(header_exists("PARADEX-STARKNET-SIGNATURE"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"jwt_token": "jwt"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_session_is_reused_until_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"jwt_token": "jwt"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        client.authenticate().await.unwrap();
        client.authenticate().await.unwrap();
    }

    fn jwt_with_claims(claims: serde_json::Value) -> String {
        format!(
            "e30.{}.sig",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap())
        )
    }

    #[test]
    fn test_session_claims_decode() {
        let token = jwt_with_claims(serde_json::json!({"exp": 1700000000, "token_usage": "interactive"}));
        let claims = SessionClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, Some(1700000000));
        assert_eq!(claims.token_usage.as_deref(), Some("interactive"));

        assert!(SessionClaims::decode("jwt").is_none());
    }

    #[tokio::test]
    async fn test_short_lived_token_is_renewed() {
        let server = MockServer::start().await;
        let token = jwt_with_claims(serde_json::json!({
            "exp": Utc::now().timestamp() + 30,
            "token_usage": "interactive"
        }));
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"jwt_token": token})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        client.authenticate().await.unwrap();
        client.authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn test_long_lived_token_is_reused() {
        let server = MockServer::start().await;
        let token = jwt_with_claims(serde_json::json!({
            "exp": Utc::now().timestamp() + 3600,
            "token_usage": "interactive"
        }));
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"jwt_token": token})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        client.authenticate().await.unwrap();
        client.authenticate().await.unwrap();
        let session = client.session.read().await.clone().unwrap();
        assert!(session.expires_at > Utc::now().timestamp() + 3000);
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad signature"))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, VenueError::Auth(_)));
    }

    #[tokio::test]
    async fn test_public_client_cannot_authenticate() {
        let client = ParadexClient::with_base_url("http://127.0.0.1:1", None).unwrap();
        assert!(matches!(
            client.authenticate().await,
            Err(VenueError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_get_balance_picks_usdc() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"token": "ETH", "size": "2"},
                    {"token": "USDC", "size": "1234.5"}
                ]
            })))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        assert_eq!(client.get_balance().await.unwrap(), Some(dec!(1234.5)));
    }

    #[tokio::test]
    async fn test_market_snapshot_public() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orderbook/BTC-USD-PERP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bids": [["100.0", "10"]],
                "asks": [["100.004", "10"]]
            })))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), None).unwrap();
        let snapshot = client
            .get_market_snapshot("BTC-USD-PERP")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.bid, dec!(100.0));
        assert_eq!(snapshot.ask, dec!(100.004));
    }

    #[tokio::test]
    async fn test_instrument_metadata_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "symbol": "BTC-USD-PERP",
                    "price_tick_size": "0.1",
                    "order_size_increment": "0.0001",
                    "min_notional": "10"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), None).unwrap();
        let meta = client
            .get_instrument_metadata("BTC-USD-PERP")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.size_increment, dec!(0.0001));
        assert!(client
            .get_instrument_metadata("BTC-USD-PERP")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_unlisted_market_is_not_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"symbol": "BTC-USD-PERP"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), None).unwrap();
        for _ in 0..3 {
            assert!(client
                .get_instrument_metadata("ETH-USD-PERP")
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_open_position_filters_market_and_closed() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"market": "BTC-USD-PERP", "side": "LONG", "size": "0", "status": "CLOSED"},
                    {"market": "ETH-USD-PERP", "side": "LONG", "size": "1", "status": "OPEN"},
                    {"market": "BTC-USD-PERP", "side": "LONG", "size": "0.0179", "status": "OPEN"}
                ]
            })))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        let position = client
            .get_open_position("BTC-USD-PERP")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.size, dec!(0.0179));
    }

    #[tokio::test]
    async fn test_limit_order_accepted() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "order-1",
                "client_id": "sniper_1",
                "market": "BTC-USD-PERP",
                "side": "BUY",
                "size": "0.0179",
                "price": "50000.0",
                "flags": ["INTERACTIVE"]
            })))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        let ack = client
            .submit_limit_order(&LimitOrder {
                market: "BTC-USD-PERP".to_string(),
                side: OrderSide::Buy,
                size: dec!(0.0179),
                price: dec!(50000.0),
                time_in_force: TimeInForce::Gtc,
            })
            .await
            .unwrap();
        assert_eq!(ack.order_id, "order-1");
        assert_eq!(ack.price, Some(dec!(50000.0)));
    }

    #[tokio::test]
    async fn test_order_rejection_maps_to_rejected() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_string("insufficient margin"))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        let err = client
            .submit_market_order(&MarketOrder {
                market: "BTC-USD-PERP".to_string(),
                side: OrderSide::Sell,
                size: dec!(0.01),
                reduce_only: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, VenueError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_cancel_all_counts_open_orders() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(query_param("market", "BTC-USD-PERP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": "1", "market": "BTC-USD-PERP", "side": "BUY", "size": "0.1", "price": "100"},
                    {"id": "2", "market": "BTC-USD-PERP", "side": "BUY", "size": "0.2", "price": "99"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        assert_eq!(client.cancel_all_orders("BTC-USD-PERP").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/balance"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = ParadexClient::with_base_url(&server.uri(), Some(test_credentials())).unwrap();
        let err = client.get_balance().await.unwrap_err();
        assert!(err.is_transient());
    }
}
