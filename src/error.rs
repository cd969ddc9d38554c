use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A user-facing form validation message.
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::InvalidInput(_) | AppError::Validation(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::ExternalService(_) => 502,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Serialization(_)
            | AppError::Config(_) => 500,
        }
    }

    /// Message safe to show to an end user.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m) => m.clone(),
            AppError::NotFound(_) => "No encontramos lo que buscabas.".to_string(),
            AppError::Unauthorized(m) | AppError::Forbidden(m) | AppError::InvalidInput(m) => {
                m.clone()
            }
            _ => "Ocurrió un error. Intenta nuevamente más tarde.".to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found in database".into()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::ExternalService("Request timeout".to_string())
        } else if err.is_connect() {
            AppError::ExternalService("Failed to connect to external service".to_string())
        } else if let Some(status) = err.status() {
            AppError::ExternalService(format!("HTTP {}: {}", status, err))
        } else {
            AppError::ExternalService(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::Unauthorized(format!("Credential check failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
