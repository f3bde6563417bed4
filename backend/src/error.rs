//! Error handling for the shop platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{
    CartCommandError, ClaimError, ForecastError, LedgerError, RefundAmountError, TransitionError,
};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_es: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    #[error("Warranty expired: {0}")]
    WarrantyExpired(String),

    // External service errors
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_es: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_es: message_es.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl AppError {
    pub fn forbidden(message: &str) -> Self {
        tracing::debug!("Permission denied: {}", message);
        AppError::InsufficientPermissions
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::InvalidStateTransition(_)
            | AppError::InsufficientStock(_)
            | AppError::InsufficientFunds { .. }
            | AppError::WarrantyExpired(_)
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::InvalidCredentials => ErrorDetail::new(
                "INVALID_CREDENTIALS",
                "Invalid username or password",
                "Usuario o contraseña incorrectos",
            ),
            AppError::TokenExpired => ErrorDetail::new(
                "TOKEN_EXPIRED",
                "Token has expired",
                "El token ha expirado",
            ),
            AppError::InvalidToken => {
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "Token inválido")
            }
            AppError::InsufficientPermissions => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action",
                "No tiene permiso para realizar esta acción",
            ),
            AppError::Unauthorized { message, message_es } => {
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_es.clone())
            }
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
                .with_field(field),
            AppError::ValidationError(msg) => ErrorDetail::new(
                "VALIDATION_ERROR",
                msg.clone(),
                format!("Datos inválidos: {}", msg),
            ),
            AppError::DuplicateEntry(field) => ErrorDetail::new(
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                format!("Ya existe un registro con este {}", field),
            )
            .with_field(field),
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => ErrorDetail::new("CONFLICT", message.clone(), message_es.clone())
                .with_field(resource),
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("No se encontró {}", resource),
            ),
            AppError::InvalidStateTransition(msg) => ErrorDetail::new(
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Cambio de estado no permitido: {}", msg),
            ),
            AppError::InsufficientStock(msg) => ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                msg.clone(),
                format!("Stock insuficiente: {}", msg),
            ),
            AppError::InsufficientFunds { balance, requested } => ErrorDetail::new(
                "INSUFFICIENT_FUNDS",
                format!(
                    "Insufficient balance: available {}, requested {}",
                    balance, requested
                ),
                format!(
                    "Saldo insuficiente: disponible {}, solicitado {}",
                    balance, requested
                ),
            )
            .with_field("amount"),
            AppError::WarrantyExpired(msg) => ErrorDetail::new(
                "WARRANTY_EXPIRED",
                msg.clone(),
                format!("Garantía vencida: {}", msg),
            ),
            AppError::PaymentGateway(msg) => ErrorDetail::new(
                "PAYMENT_GATEWAY_ERROR",
                format!("Payment gateway error: {}", msg),
                format!("Error de la pasarela de pago: {}", msg),
            ),
            AppError::InvalidSignature => ErrorDetail::new(
                "INVALID_SIGNATURE",
                "Invalid webhook signature",
                "Firma del webhook inválida",
            ),
            AppError::Configuration(msg) => ErrorDetail::new(
                "CONFIGURATION_ERROR",
                format!("Configuration error: {}", msg),
                format!("Error de configuración: {}", msg),
            ),
            AppError::DatabaseError(_) => ErrorDetail::new(
                "DATABASE_ERROR",
                "A database error occurred",
                "Ocurrió un error de base de datos",
            ),
            AppError::Internal(msg) => ErrorDetail::new(
                "INTERNAL_ERROR",
                msg.clone(),
                "Error interno del servidor",
            ),
            AppError::InternalError(_) => ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal server error occurred",
                "Error interno del servidor",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, requested } => {
                AppError::InsufficientFunds { balance, requested }
            }
            LedgerError::NonPositiveAmount => AppError::Validation {
                field: "amount".to_string(),
                message: err.to_string(),
                message_es: "El monto debe ser mayor que cero".to_string(),
            },
            LedgerError::InactiveWallet => AppError::ValidationError(err.to_string()),
            LedgerError::SubCentAmount(_) => AppError::Validation {
                field: "amount".to_string(),
                message: err.to_string(),
                message_es: "El monto admite como máximo dos decimales".to_string(),
            },
            LedgerError::BalanceLimitExceeded { .. } => AppError::Validation {
                field: "amount".to_string(),
                message: err.to_string(),
                message_es: "El saldo superaría el máximo permitido".to_string(),
            },
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<RefundAmountError> for AppError {
    fn from(err: RefundAmountError) -> Self {
        AppError::Validation {
            field: "refund_amount".to_string(),
            message: err.to_string(),
            message_es: "Monto de reembolso inválido".to_string(),
        }
    }
}

impl From<CartCommandError> for AppError {
    fn from(err: CartCommandError) -> Self {
        AppError::Validation {
            field: "prompt".to_string(),
            message_es: err.message_es(),
            message: err.to_string(),
        }
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Expired => AppError::WarrantyExpired(err.to_string()),
            ClaimError::NotActive => AppError::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        AppError::NotFound(format!("Sales prediction model ({})", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Map a unique-constraint violation to a 409 on `field`
pub fn unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_business_rule_violations_are_bad_requests() {
        let err: AppError = LedgerError::InsufficientFunds {
            balance: Decimal::from(5),
            requested: Decimal::from(10),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = ClaimError::Expired.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = LedgerError::SubCentAmount("0.004".parse().unwrap()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = RefundAmountError::SubCent("1.005".parse().unwrap()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::NotFound("Order".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DuplicateEntry("email".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::PaymentGateway("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        let err: AppError = ForecastError::InsufficientData {
            samples: 3,
            required: 10,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
