use crate::core::awb::StatusMap;
use crate::domain::model::OrderFulfillmentState;
use crate::utils::error::{Result, ShipError};
use crate::utils::validation::{
    validate_amount, validate_api_url, validate_bounded, validate_data_dir, validate_data_file,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_API_URL: &str = "https://urgentcargus.azure-api.net/api";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub awb: AwbConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub subscription_key: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// 低於承運商 2 小時的實際效期
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: i64,
    #[serde(default = "default_country_id")]
    pub country_id: u32,
    pub sender_location_id: Option<i64>,
    pub price_table_id: Option<i64>,
    pub service_id: Option<i64>,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            subscription_key: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_seconds: default_timeout_seconds(),
            token_ttl_seconds: default_token_ttl_seconds(),
            country_id: default_country_id(),
            sender_location_id: None,
            price_table_id: None,
            service_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_base_price")]
    pub base_price_standard: f64,
    #[serde(default = "default_base_price")]
    pub base_price_locker: f64,
    #[serde(default = "default_extra_kg_price")]
    pub extra_kg_price: f64,
    #[serde(default = "default_oversize_surcharge")]
    pub oversize_surcharge: f64,
    #[serde(default)]
    pub oversized_categories: Vec<u64>,
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price_standard: default_base_price(),
            base_price_locker: default_base_price(),
            extra_kg_price: default_extra_kg_price(),
            oversize_surcharge: default_oversize_surcharge(),
            oversized_categories: Vec::new(),
            quote_timeout_ms: default_quote_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwbConfig {
    #[serde(default = "default_cod_modules")]
    pub cod_payment_modules: Vec<String>,
    #[serde(default = "default_true")]
    pub transition_on_generate: bool,
    #[serde(default = "default_parcels")]
    pub default_parcels: u32,
}

impl Default for AwbConfig {
    fn default() -> Self {
        Self {
            cod_payment_modules: default_cod_modules(),
            transition_on_generate: true,
            default_parcels: default_parcels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// carrier event code → local state
    #[serde(default = "default_status_map")]
    pub status_map: BTreeMap<String, OrderFulfillmentState>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            status_map: default_status_map(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_pudo_timeout_seconds")]
    pub pudo_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pudo_timeout_seconds: default_pudo_timeout_seconds(),
        }
    }
}

/// Store contact data, used as the recipient of return shipments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub county: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub cron_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_file: default_state_file(),
            session_file: default_session_file(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_timeout_seconds() -> u64 {
    10
}
fn default_token_ttl_seconds() -> i64 {
    7000
}
fn default_country_id() -> u32 {
    1
}
fn default_base_price() -> f64 {
    15.0
}
fn default_extra_kg_price() -> f64 {
    4.9
}
fn default_oversize_surcharge() -> f64 {
    100.0
}
fn default_quote_timeout_ms() -> u64 {
    2500
}
fn default_cod_modules() -> Vec<String> {
    vec!["ps_cashondelivery".to_string(), "cashondelivery".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_parcels() -> u32 {
    1
}
pub(crate) fn default_status_map() -> BTreeMap<String, OrderFulfillmentState> {
    BTreeMap::from([
        ("3".to_string(), OrderFulfillmentState::InTransit),
        ("21".to_string(), OrderFulfillmentState::Delivered),
        ("35".to_string(), OrderFulfillmentState::Returned),
    ])
}
fn default_batch_size() -> usize {
    100
}
fn default_pudo_timeout_seconds() -> u64 {
    30
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_state_file() -> String {
    "shop_state.json".to_string()
}
fn default_session_file() -> String {
    "carrier_session.json".to_string()
}

impl BridgeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ShipError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ShipError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CARRIER_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ShipError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_api_url("carrier.api_url", &self.carrier.api_url)?;
        validate_bounded("carrier.timeout_seconds", self.carrier.timeout_seconds, 1..=120)?;
        validate_bounded("carrier.token_ttl_seconds", self.carrier.token_ttl_seconds, 60..=7200)?;

        validate_amount("pricing.base_price_standard", self.pricing.base_price_standard)?;
        validate_amount("pricing.base_price_locker", self.pricing.base_price_locker)?;
        validate_amount("pricing.extra_kg_price", self.pricing.extra_kg_price)?;
        validate_amount("pricing.oversize_surcharge", self.pricing.oversize_surcharge)?;
        validate_bounded("pricing.quote_timeout_ms", self.pricing.quote_timeout_ms, 100..=30_000)?;

        validate_bounded("awb.default_parcels", self.awb.default_parcels, 1..=99)?;
        validate_bounded("sync.batch_size", self.sync.batch_size, 1..=5_000)?;
        validate_bounded("sync.pudo_timeout_seconds", self.sync.pudo_timeout_seconds, 1..=300)?;

        // 事件對照表在啟動時驗證
        StatusMap::from_entries(&self.tracking.status_map)?;

        validate_data_dir("storage.data_dir", &self.storage.data_dir)?;
        validate_data_file("storage.state_file", &self.storage.state_file)?;
        validate_data_file("storage.session_file", &self.storage.session_file)?;
        Ok(())
    }

    /// Remote quotes need both a price table and a pickup location.
    pub fn remote_pricing_enabled(&self) -> bool {
        self.carrier.price_table_id.is_some() && self.carrier.sender_location_id.is_some()
    }
}

impl Validate for BridgeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let toml_content = r#"
[carrier]
api_url = "https://carrier.example.com/api"
subscription_key = "key"
username = "shop"
password = "secret"
"#;

        let config = BridgeConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.carrier.token_ttl_seconds, 7000);
        assert_eq!(config.pricing.oversize_surcharge, 100.0);
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(
            config.tracking.status_map.get("21"),
            Some(&OrderFulfillmentState::Delivered)
        );
        assert!(!config.remote_pricing_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHIPBRIDGE_TEST_PASSWORD", "from-env");

        let toml_content = r#"
[carrier]
username = "shop"
password = "${SHIPBRIDGE_TEST_PASSWORD}"
"#;

        let config = BridgeConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.carrier.password, "from-env");

        std::env::remove_var("SHIPBRIDGE_TEST_PASSWORD");
    }

    #[test]
    fn test_status_map_rejects_backward_target() {
        let toml_content = r#"
[tracking.status_map]
"3" = "in_transit"
"99" = "placed"
"#;

        let config = BridgeConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_state_name_fails_parsing() {
        let toml_content = r#"
[tracking.status_map]
"3" = "teleported"
"#;

        assert!(BridgeConfig::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_url_and_prices() {
        let mut config = BridgeConfig::default();
        config.carrier.api_url = "invalid-url".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.pricing.extra_kg_price = -2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_files_must_stay_in_data_dir() {
        let mut config = BridgeConfig::default();
        config.storage.state_file = "../elsewhere.json".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.storage.session_file = "sessions/carrier.json".to_string();
        assert!(config.validate().is_ok());

        let mut config = BridgeConfig::default();
        config.carrier.api_url = "https://carrier.example.com/api?env=prod".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[carrier]
sender_location_id = 201
price_table_id = 7

[shop]
name = "Magazin Demo"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = BridgeConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.shop.name, "Magazin Demo");
        assert!(config.remote_pricing_enabled());
    }
}
