//! HTTP request handlers

pub mod audit;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod delivery;
pub mod health;
pub mod orders;
pub mod prediction;
pub mod reporting;
pub mod returns;
pub mod users;
pub mod wallet;
pub mod warranty;

pub use audit::*;
pub use auth::*;
pub use cart::*;
pub use catalog::*;
pub use delivery::*;
pub use health::*;
pub use orders::*;
pub use prediction::*;
pub use reporting::*;
pub use returns::*;
pub use users::*;
pub use wallet::*;
pub use warranty::*;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Decode a JSON body that may be omitted entirely; an empty body yields
/// the default, anything else must parse
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::returns::ApproveInput;
    use shared::RefundMethod;

    #[test]
    fn test_empty_body_uses_defaults() {
        let input: ApproveInput = optional_json(&Bytes::new()).unwrap();
        assert!(input.refund_amount.is_none());
        assert!(input.refund_method.is_none());

        let input: ApproveInput = optional_json(&Bytes::from_static(b"  \n")).unwrap();
        assert!(input.evaluation_notes.is_empty());
    }

    #[test]
    fn test_present_body_is_decoded() {
        let input: ApproveInput = optional_json(&Bytes::from_static(
            br#"{"refund_method":"BANK","refund_amount":"12.50"}"#,
        ))
        .unwrap();
        assert_eq!(input.refund_method, Some(RefundMethod::Bank));
        assert_eq!(input.refund_amount, Some("12.50".parse().unwrap()));
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let err = optional_json::<ApproveInput>(&Bytes::from_static(br#"{"refund_amount": "#))
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = optional_json::<ApproveInput>(&Bytes::from_static(
            br#"{"refund_method":"CASH"}"#,
        ))
        .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
