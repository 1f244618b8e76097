//! Error types for the Supabase provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Supabase provider errors
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// The backend answered with a non-success status
    #[error("Supabase API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The response body was not the expected JSON
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Connector was built with unusable coordinates
    #[error("Invalid Supabase configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Supabase operations
pub type Result<T> = std::result::Result<T, SupabaseError>;

impl From<SupabaseError> for BridgeError {
    fn from(error: SupabaseError) -> Self {
        match error {
            SupabaseError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "Page lookup failed (status {}): {}",
                status_code, message
            )),
            SupabaseError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            SupabaseError::InvalidConfig(msg) => BridgeError::NotAvailable(msg),
            SupabaseError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SupabaseError::ApiError {
            status_code: 401,
            message: "Invalid API key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Supabase API error (status 401): Invalid API key"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge: BridgeError = SupabaseError::ParseError("eof".to_string()).into();
        assert!(matches!(bridge, BridgeError::OperationFailed(_)));

        let bridge: BridgeError = SupabaseError::InvalidConfig("no url".to_string()).into();
        assert!(matches!(bridge, BridgeError::NotAvailable(_)));

        let inner = BridgeError::StorageError("disk".to_string());
        let bridge: BridgeError = SupabaseError::from(inner).into();
        assert!(matches!(bridge, BridgeError::StorageError(_)));
    }
}
