//! Unified error types for the BAPP tracker.
//!
//! Storage errors keep the backend's raw message; [`Error::user_message`]
//! turns them into something an operator can read.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Raw storage error, message preserved as returned by the backend
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input rejected before reaching the database
    #[error("Validation error: {message}")]
    Validation {
        /// What was rejected and why
        message: String,
    },

    /// No contract with the given id
    #[error("Contract not found: {id}")]
    ContractNotFound {
        /// The id that was looked up
        id: i64,
    },

    /// Period label or value that does not map to a supported cadence
    #[error("Unsupported period: {label}")]
    InvalidCadence {
        /// The offending label
        label: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Translates an error into a short message suitable for display.
    ///
    /// Storage errors are matched on the backend's message text: unique
    /// constraint violations become a duplicate-name message, foreign key
    /// violations a still-referenced message. Anything unrecognised falls
    /// back to a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(err) => translate_storage_message(&err.to_string()).to_string(),
            Self::Validation { message } => message.clone(),
            Self::ContractNotFound { .. } => "Kontrak tidak ditemukan".to_string(),
            Self::InvalidCadence { label } => format!("Periode tidak dikenal: {label}"),
            Self::Config { .. } | Self::Io(_) => GENERIC_MESSAGE.to_string(),
        }
    }
}

const GENERIC_MESSAGE: &str = "Terjadi kesalahan, silakan coba lagi";

fn translate_storage_message(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("unique") || lower.contains("duplicate key") {
        "Nama sudah digunakan, gunakan nama lain"
    } else if lower.contains("foreign key") {
        "Data masih digunakan oleh data lain"
    } else if lower.contains("not null") {
        "Data wajib belum diisi"
    } else if lower.contains("connection") || lower.contains("timed out") {
        "Tidak dapat terhubung ke database"
    } else {
        GENERIC_MESSAGE
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    #[test]
    fn test_unique_violation_maps_to_duplicate_name() {
        let err = Error::from(DbErr::Exec(sea_orm::RuntimeErr::Internal(
            "UNIQUE constraint failed: customers.name".to_string(),
        )));
        assert_eq!(err.user_message(), "Nama sudah digunakan, gunakan nama lain");
    }

    #[test]
    fn test_postgres_duplicate_key_maps_to_duplicate_name() {
        let err = Error::from(DbErr::Custom(
            "duplicate key value violates unique constraint \"areas_code_key\"".to_string(),
        ));
        assert_eq!(err.user_message(), "Nama sudah digunakan, gunakan nama lain");
    }

    #[test]
    fn test_foreign_key_violation() {
        let err = Error::from(DbErr::Custom("FOREIGN KEY constraint failed".to_string()));
        assert_eq!(err.user_message(), "Data masih digunakan oleh data lain");
    }

    #[test]
    fn test_unmatched_error_falls_back_to_generic() {
        let err = Error::from(DbErr::Custom("something odd".to_string()));
        assert_eq!(err.user_message(), GENERIC_MESSAGE);

        let err = Error::Config {
            message: "missing file".to_string(),
        };
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn test_raw_message_preserved_in_display() {
        let err = Error::from(DbErr::Custom("disk I/O error".to_string()));
        assert!(err.to_string().contains("disk I/O error"));
    }
}
