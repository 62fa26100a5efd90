//! Error types and handling
//!
//! This module provides the shared error type used outside the remote-call
//! path (configuration, profile validation, secret storage) and the
//! `FitErrorExt` trait every user-facing error in FitPlan implements.
//!
//! # Security
//!
//! Error messages never carry API keys. Callers that wrap transport errors
//! are expected to scrub them before constructing an error.

use thiserror::Error;

/// Trait for FitPlan error extensions
///
/// Provides a short hint that a dashboard can show to a coach, and whether
/// retrying the same operation later has a plausible chance of success.
pub trait FitErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are worth retrying later ("try again shortly").
    /// Non-recoverable errors need a configuration or credential fix.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, FitErrorExt};
///
/// let error = EngineError::InvalidProfile("weight must be positive".to_string());
/// assert!(!error.is_recoverable());
/// println!("Hint: {}", error.user_hint());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors
    #[error("Invalid client profile: {0}")]
    InvalidProfile(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Missing credentials
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FitErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::InvalidProfile(_) => "Check the client's intake data and try again",
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::MissingApiKey(_) => "Set GEMINI_API_KEY or store the key in the system keychain",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Config(_)
            | Self::InvalidProfile(_)
            | Self::KeyringError(_)
            | Self::MissingApiKey(_) => false,
        }
    }
}
