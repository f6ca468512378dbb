use crate::config::toml_config::CarrierConfig;
use crate::core::geo;
use crate::domain::model::{CarrierSession, CatalogOption, Locality, PudoLocation, TraceEvent};
use crate::domain::ports::SessionCache;
use crate::utils::error::{Result, ShipError};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const LOGIN_ENDPOINT: &str = "LoginUser";

/// One outbound call to the carrier API.
#[derive(Debug, Clone)]
pub struct CarrierRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub use_auth: bool,
    pub timeout: Option<Duration>,
    pub accept: &'static str,
}

impl CarrierRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            use_auth: true,
            timeout: None,
            accept: "application/json",
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = accept;
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.use_auth = false;
        self
    }
}

/// Decoded answer of `POST /Awbs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwbCreation {
    Created(String),
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Party {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contact_person: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub county_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub locality_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address_text: String,
}

impl Party {
    pub fn location(location_id: i64) -> Self {
        Self {
            location_id: Some(location_id),
            ..Self::default()
        }
    }
}

/// AWB body as the carrier expects it (PascalCase keys).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwbPayload {
    pub sender: Party,
    pub recipient: Party,
    pub parcels: u32,
    pub envelopes: u32,
    pub total_weight: u32,
    pub declared_value: f64,
    pub cash_on_delivery: f64,
    pub observations: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_table_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_pudo_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_pudo_point: Option<String>,
}

/// HTTP client for the carrier API.
///
/// Owns login and session reuse through the injected `SessionCache`, classifies
/// HTTP failures into `ShipError`, and decodes responses once: every JSON object
/// key is lower-cased before callers see it.
pub struct CarrierApiClient {
    http: Client,
    config: CarrierConfig,
    base_url: String,
    sessions: Arc<dyn SessionCache>,
    login_lock: Mutex<()>,
}

impl CarrierApiClient {
    pub fn new(config: CarrierConfig, sessions: Arc<dyn SessionCache>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let base_url = config.api_url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            config,
            base_url,
            sessions,
            login_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// 取得有效的 bearer token，必要時登入
    ///
    /// Concurrent callers queue on one lock and re-check the cache, so a burst of
    /// requests on an expired session logs in once.
    pub async fn authenticate(&self) -> Result<String> {
        if let Some(session) = self.sessions.get().await {
            return Ok(session.token);
        }

        let _guard = self.login_lock.lock().await;
        if let Some(session) = self.sessions.get().await {
            return Ok(session.token);
        }

        self.login().await
    }

    async fn login(&self) -> Result<String> {
        let CarrierConfig {
            username,
            password,
            subscription_key,
            ..
        } = &self.config;

        if username.is_empty() || password.is_empty() || subscription_key.is_empty() {
            return Err(ShipError::Authentication {
                message: "Missing carrier username, password or subscription key".to_string(),
            });
        }

        tracing::debug!("📡 Logging in to carrier API as '{}'", username);

        let response = self
            .http
            .post(self.url(LOGIN_ENDPOINT))
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key)
            .header(ACCEPT, "application/json")
            .json(&json!({ "UserName": username, "Password": password }))
            .send()
            .await
            .map_err(|e| transport_error(e, LOGIN_ENDPOINT))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, LOGIN_ENDPOINT))?;

        if !status.is_success() {
            let detail = error_message(text.as_bytes())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::error!("❌ Carrier login rejected: {}", detail);
            return Err(ShipError::Authentication {
                message: format!("Login rejected (HTTP {}): {}", status.as_u16(), detail),
            });
        }

        let token = text.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(ShipError::Authentication {
                message: "Login answered with an empty token".to_string(),
            });
        }

        let ttl = chrono::Duration::seconds(self.config.token_ttl_seconds);
        self.sessions
            .refresh(CarrierSession::new(token.clone(), ttl))
            .await?;
        tracing::info!(
            "🔑 Carrier session cached for {}s",
            self.config.token_ttl_seconds
        );
        Ok(token)
    }

    /// JSON call. Empty bodies decode to `Value::Null`.
    pub async fn call(&self, request: &CarrierRequest) -> Result<Value> {
        let bytes = self.call_bytes(request).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(lowercase_keys(value))
    }

    /// Raw call, used for PDF documents. A 409 on an authenticated call
    /// re-authenticates and retries exactly once.
    pub async fn call_bytes(&self, request: &CarrierRequest) -> Result<Vec<u8>> {
        match self.send_once(request).await {
            Err(ShipError::SessionConflict { endpoint }) if request.use_auth => {
                tracing::warn!(
                    "⚠️ Session conflict on {}, logging in again and retrying once",
                    endpoint
                );
                self.sessions.invalidate().await?;
                self.send_once(request).await
            }
            other => other,
        }
    }

    async fn send_once(&self, request: &CarrierRequest) -> Result<Vec<u8>> {
        let endpoint = request.endpoint.as_str();
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(endpoint))
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .header(ACCEPT, request.accept);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if request.use_auth {
            let token = self.authenticate().await?;
            builder = builder.bearer_auth(token);
        }

        tracing::debug!("📡 {} {}", request.method, endpoint);
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, endpoint))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, endpoint))?;
        tracing::debug!("📡 {} answered {}", endpoint, status);

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        Err(self
            .classify_failure(status.as_u16(), &bytes, endpoint, request.use_auth)
            .await)
    }

    async fn classify_failure(
        &self,
        http_code: u16,
        body: &[u8],
        endpoint: &str,
        use_auth: bool,
    ) -> ShipError {
        match http_code {
            401 => {
                if use_auth {
                    if let Err(e) = self.sessions.invalidate().await {
                        tracing::warn!("⚠️ Could not drop cached session: {}", e);
                    }
                }
                ShipError::Authentication {
                    message: format!(
                        "Carrier rejected the credentials or subscription key on {} (HTTP 401)",
                        endpoint
                    ),
                }
            }
            404 => {
                tracing::error!(
                    "❌ Carrier endpoint {} answered 404, the API contract may have changed",
                    endpoint
                );
                ShipError::NotFound {
                    endpoint: endpoint.to_string(),
                }
            }
            409 => ShipError::SessionConflict {
                endpoint: endpoint.to_string(),
            },
            _ => ShipError::Api {
                http_code,
                message: error_message(body).unwrap_or_else(|| format!("HTTP {}", http_code)),
            },
        }
    }

    /// `POST /Awbs` with a one-element array body.
    pub async fn create_awb(&self, payload: &AwbPayload) -> Result<AwbCreation> {
        let body = serde_json::to_value([payload])?;
        let response = self.call(&CarrierRequest::post("Awbs", body)).await?;
        Ok(decode_awb_creation(&response))
    }

    /// Trace events for one barcode, latest first as the carrier returns them.
    pub async fn trace_awb(&self, barcode: &str) -> Result<Vec<TraceEvent>> {
        let request = CarrierRequest::get("Awbs/Trace").with_query("barCode", barcode);
        let response = self.call(&request).await?;

        Ok(as_items(&response)
            .iter()
            .filter_map(|event| {
                let event_id = field_string(event, "eventid")?;
                Some(TraceEvent {
                    event_id,
                    description: field_string(event, "description"),
                    date: field_string(event, "date"),
                })
            })
            .collect())
    }

    /// Full pickup-point snapshot. Entries without an id are dropped.
    pub async fn fetch_pudos(&self, country_id: u32, timeout: Duration) -> Result<Vec<PudoLocation>> {
        let request = CarrierRequest::get("Pudo")
            .with_query("countryId", country_id)
            .with_timeout(timeout);
        let response = self.call(&request).await?;

        let mut skipped = 0;
        let pudos: Vec<PudoLocation> = as_items(&response)
            .iter()
            .filter_map(|item| {
                let pudo = decode_pudo(item);
                if pudo.is_none() {
                    skipped += 1;
                }
                pudo
            })
            .collect();

        if skipped > 0 {
            tracing::warn!("⚠️ Skipped {} pickup points without an id", skipped);
        }
        Ok(pudos)
    }

    /// `GET /Localities` for the account's country. Entries without an id or a name are dropped.
    pub async fn fetch_localities(&self, country_id: u32, timeout: Duration) -> Result<Vec<Locality>> {
        let request = CarrierRequest::get("Localities")
            .with_query("countryId", country_id)
            .with_timeout(timeout);
        let response = self.call(&request).await?;
        Ok(as_items(&response).into_iter().filter_map(decode_locality).collect())
    }

    /// Remote quote from `POST /ShippingCalculation`. `None` when the carrier
    /// gives no usable total.
    pub async fn calculate_price(
        &self,
        weight_kg: u32,
        price_table_id: i64,
        sender_location_id: i64,
        pudo_delivery: bool,
    ) -> Result<Option<f64>> {
        let mut body = json!({
            "Sender": { "LocationId": sender_location_id },
            "PriceTableId": price_table_id,
            "Parcels": 1,
            "Envelopes": 0,
            "TotalWeight": weight_kg,
            "DeclaredValue": 0,
            "CashOnDelivery": 0,
        });
        if let (Some(service_id), Value::Object(map)) = (self.config.service_id, &mut body) {
            map.insert("ServiceId".to_string(), json!(service_id));
        }
        if let Value::Object(map) = &mut body {
            map.insert("PudoDelivery".to_string(), json!(pudo_delivery));
        }

        let response = self
            .call(&CarrierRequest::post("ShippingCalculation", body))
            .await?;
        Ok(field_f64(&response, "grandtotal"))
    }

    /// Raw entries of an account lookup (`/PickupLocations`, `/PriceTables`, `/Services`).
    pub async fn list_catalog(&self, endpoint: &str) -> Result<Vec<Value>> {
        let response = self.call(&CarrierRequest::get(endpoint)).await?;
        Ok(as_items(&response).into_iter().cloned().collect())
    }

    /// `GET /AwbDocuments` as raw PDF bytes.
    pub async fn awb_document(&self, barcode: &str, format: u8) -> Result<Vec<u8>> {
        let request = CarrierRequest::get("AwbDocuments")
            .with_query("type", "PDF")
            .with_query("format", format)
            .with_query("barCodes", barcode)
            .with_accept("application/pdf");
        self.call_bytes(&request).await
    }
}

fn transport_error(err: reqwest::Error, endpoint: &str) -> ShipError {
    if err.is_timeout() {
        ShipError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        ShipError::Network(err)
    }
}

/// `message` field of an error body, matched case-insensitively.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match lowercase_keys(value) {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

/// Lower-cases every object key, recursively.
pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Lists come back as arrays; a single object is treated as a one-item list.
fn as_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

pub(crate) fn field_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn field_f64(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn field_i64(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_awb_creation(response: &Value) -> AwbCreation {
    let Some(first) = as_items(response).into_iter().next() else {
        return AwbCreation::Rejected("Carrier returned no AWB".to_string());
    };

    if let Some(barcode) = field_string(first, "barcode") {
        return AwbCreation::Created(barcode);
    }

    let reason = field_string(first, "error")
        .or_else(|| field_string(first, "message"))
        .unwrap_or_else(|| "Unknown carrier error".to_string());
    AwbCreation::Rejected(reason)
}

fn decode_pudo(item: &Value) -> Option<PudoLocation> {
    let external_id = field_string(item, "id")?;
    Some(PudoLocation {
        external_id,
        name: field_string(item, "name").unwrap_or_default(),
        city: field_string(item, "city").unwrap_or_default(),
        county: field_string(item, "county").unwrap_or_default(),
        address: field_string(item, "address").unwrap_or_default(),
        lat: field_f64(item, "latitude").unwrap_or_default(),
        lng: field_f64(item, "longitude").unwrap_or_default(),
        kind: field_string(item, "pointtype").unwrap_or_else(|| "LOCKER".to_string()),
        is_active: true,
    })
}

fn decode_locality(item: &Value) -> Option<Locality> {
    let locality_id = field_string(item, "localityid")?;
    let name = field_string(item, "name")?;
    Some(Locality {
        locality_id,
        normalized_name: geo::normalize(&name),
        name,
        county: field_string(item, "countyname").unwrap_or_default(),
    })
}

/// Builds a lookup option from a lower-cased catalog entry. Entries without
/// an id or a name are dropped.
pub(crate) fn catalog_option(
    item: &Value,
    id_keys: &[&str],
    name_key: &str,
    extra_key: Option<&str>,
) -> Option<CatalogOption> {
    let id = id_keys.iter().find_map(|key| field_i64(item, key))?;
    let name = field_string(item, name_key)?;
    let name = match extra_key.and_then(|key| field_string(item, key)) {
        Some(extra) => format!("{} ({})", name, extra),
        None => name,
    };
    Some(CatalogOption { id, name })
}
