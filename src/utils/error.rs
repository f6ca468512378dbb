use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShipError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Carrier request timed out: {endpoint}")]
    Timeout { endpoint: String },

    #[error("Carrier API error (HTTP {http_code}): {message}")]
    Api { http_code: u16, message: String },

    #[error("Carrier rejected the request: {message}")]
    ApiValidation { message: String },

    #[error("Carrier session conflict (HTTP 409) on {endpoint}")]
    SessionConflict { endpoint: String },

    #[error("Carrier endpoint not found: {endpoint}")]
    NotFound { endpoint: String },

    #[error("AWB already generated for order {order_id}: {awb_number}")]
    AlreadyGenerated { order_id: u64, awb_number: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: u64 },

    #[error("Pickup point not found or inactive: {pudo_id}")]
    PudoNotFound { pudo_id: String },

    #[error("Carrier returned an empty snapshot for {endpoint}")]
    EmptySnapshot { endpoint: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Carrier,
    Network,
    Fulfillment,
    Configuration,
    Storage,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ShipError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ShipError::Authentication { .. }
            | ShipError::Api { .. }
            | ShipError::ApiValidation { .. }
            | ShipError::SessionConflict { .. }
            | ShipError::NotFound { .. }
            | ShipError::EmptySnapshot { .. } => ErrorCategory::Carrier,
            ShipError::Network(_) | ShipError::Timeout { .. } => ErrorCategory::Network,
            ShipError::AlreadyGenerated { .. }
            | ShipError::OrderNotFound { .. }
            | ShipError::PudoNotFound { .. } => ErrorCategory::Fulfillment,
            ShipError::ConfigValidationError { .. }
            | ShipError::InvalidConfigValueError { .. }
            | ShipError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ShipError::IoError(_) | ShipError::SerializationError(_) => ErrorCategory::Storage,
            ShipError::Forbidden { .. } => ErrorCategory::Security,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ShipError::AlreadyGenerated { .. } => ErrorSeverity::Low,
            ShipError::Network(_)
            | ShipError::Timeout { .. }
            | ShipError::SessionConflict { .. }
            | ShipError::EmptySnapshot { .. } => ErrorSeverity::Medium,
            ShipError::Authentication { .. }
            | ShipError::Api { .. }
            | ShipError::ApiValidation { .. }
            | ShipError::OrderNotFound { .. }
            | ShipError::PudoNotFound { .. }
            | ShipError::Forbidden { .. } => ErrorSeverity::High,
            // 端點消失代表整合已偏移
            ShipError::NotFound { .. }
            | ShipError::ConfigValidationError { .. }
            | ShipError::InvalidConfigValueError { .. }
            | ShipError::MissingConfigError { .. }
            | ShipError::IoError(_)
            | ShipError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    /// 暫時性錯誤，稍後重試即可
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShipError::Network(_) | ShipError::Timeout { .. } | ShipError::SessionConflict { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ShipError::Authentication { .. } => {
                "Check carrier username, password and subscription key in [carrier]"
            }
            ShipError::Network(_) | ShipError::Timeout { .. } => {
                "The carrier is unreachable or slow; retry later"
            }
            ShipError::Api { .. } => "Inspect the carrier response and the request payload",
            ShipError::ApiValidation { .. } => {
                "Fix the order data reported by the carrier, then generate again"
            }
            ShipError::SessionConflict { .. } => {
                "Another login replaced the carrier session; retry once"
            }
            ShipError::NotFound { .. } => "The carrier API changed; verify api_url and endpoints",
            ShipError::AlreadyGenerated { .. } => "Use the existing AWB number for this order",
            ShipError::OrderNotFound { .. } => "Verify the order id",
            ShipError::PudoNotFound { .. } => "Run a pickup point sync or choose another point",
            ShipError::EmptySnapshot { .. } => "Retry the sync later; the local cache was kept",
            ShipError::Forbidden { .. } => "Provide the configured job token",
            ShipError::ConfigValidationError { .. }
            | ShipError::InvalidConfigValueError { .. }
            | ShipError::MissingConfigError { .. } => "Fix the configuration file and rerun",
            ShipError::IoError(_) | ShipError::SerializationError(_) => {
                "Check the storage directory and the state file"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ShipError::Authentication { .. } => {
                "Carrier credentials are incorrect or the subscription key expired.".to_string()
            }
            ShipError::SessionConflict { .. } => {
                "Carrier session conflict (HTTP 409); the session is being renewed.".to_string()
            }
            ShipError::Timeout { .. } => "The carrier server answered too slowly.".to_string(),
            ShipError::ApiValidation { message } => format!("Carrier rejected the AWB: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_generated_is_low_severity() {
        let err = ShipError::AlreadyGenerated {
            order_id: 7,
            awb_number: "1000".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.category(), ErrorCategory::Fulfillment);
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ShipError::SessionConflict {
            endpoint: "Awbs".to_string()
        }
        .is_retryable());
        assert!(!ShipError::ApiValidation {
            message: "bad phone".to_string()
        }
        .is_retryable());
    }
}
