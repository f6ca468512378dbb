use crate::core::carrier::{catalog_option, CarrierApiClient};
use crate::domain::model::CatalogOption;
use crate::utils::error::{Result, ShipError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// AWB label layout accepted by `/AwbDocuments`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    A4,
    /// thermal printer label
    #[default]
    A6,
}

impl LabelFormat {
    pub fn code(self) -> u8 {
        match self {
            LabelFormat::A4 => 0,
            LabelFormat::A6 => 1,
        }
    }
}

impl FromStr for LabelFormat {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" | "0" => Ok(LabelFormat::A4),
            "a6" | "1" => Ok(LabelFormat::A6),
            other => Err(ShipError::InvalidConfigValueError {
                field: "label_format".to_string(),
                value: other.to_string(),
                reason: "Expected 'a4' or 'a6'".to_string(),
            }),
        }
    }
}

impl fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFormat::A4 => f.write_str("a4"),
            LabelFormat::A6 => f.write_str("a6"),
        }
    }
}

/// Operator lookups against the carrier account, used to fill in the
/// `[carrier]` ids, plus label downloads.
pub struct AccountService {
    client: Arc<CarrierApiClient>,
}

impl AccountService {
    pub fn new(client: Arc<CarrierApiClient>) -> Self {
        Self { client }
    }

    pub async fn pickup_locations(&self) -> Result<Vec<CatalogOption>> {
        self.catalog("PickupLocations", "locationid", Some("localityname"))
            .await
    }

    pub async fn price_tables(&self) -> Result<Vec<CatalogOption>> {
        self.catalog("PriceTables", "pricetableid", None).await
    }

    pub async fn services(&self) -> Result<Vec<CatalogOption>> {
        self.catalog("Services", "serviceid", None).await
    }

    async fn catalog(
        &self,
        endpoint: &str,
        id_key: &str,
        extra_key: Option<&str>,
    ) -> Result<Vec<CatalogOption>> {
        let id_keys = [id_key, "senderlocationid", "id"];
        let items = self.client.list_catalog(endpoint).await?;

        let options: Vec<CatalogOption> = items
            .iter()
            .filter_map(|item| catalog_option(item, &id_keys, "name", extra_key))
            .collect();

        if options.is_empty() {
            tracing::warn!(
                "⚠️ {} returned no usable entries ({} raw item(s))",
                endpoint,
                items.len()
            );
        } else {
            tracing::info!("📡 {}: {} option(s)", endpoint, options.len());
        }
        Ok(options)
    }

    /// Label PDF for one AWB.
    pub async fn awb_pdf(&self, barcode: &str, format: LabelFormat) -> Result<Vec<u8>> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Err(ShipError::ApiValidation {
                message: "AWB number is required to print a label".to_string(),
            });
        }

        let pdf = self.client.awb_document(barcode, format.code()).await?;
        if pdf.is_empty() {
            return Err(ShipError::Api {
                http_code: 200,
                message: format!("Carrier returned an empty document for AWB {}", barcode),
            });
        }

        tracing::info!("📄 Label for AWB {} ({}, {} bytes)", barcode, format, pdf.len());
        Ok(pdf)
    }
}
