use thiserror::Error;

use crate::AutostartType;

/// Result type for autostart operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by providers and the manager.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was empty. Nothing was sent to the OS.
    #[error("{field} cannot be empty")]
    Validation { field: &'static str },

    /// The location string does not follow the scheme of its type.
    #[error("invalid {kind} location '{location}': {reason}")]
    InvalidLocation {
        kind: AutostartType,
        location: String,
        reason: &'static str,
    },

    /// The registry key, task or service being changed does not exist.
    #[error("{what} not found: {target}")]
    NotFound { what: &'static str, target: String },

    /// An OS call failed.
    #[error("failed to {operation} '{target}': {source}")]
    Native {
        operation: &'static str,
        target: String,
        #[source]
        source: NativeError,
    },

    /// Writing a registry entry's approval flag failed.
    #[error("failed to {verb} '{name}' ({location}): {source}", verb = toggle_verb(.enabled))]
    StateChange {
        name: String,
        location: String,
        enabled: bool,
        #[source]
        source: Box<Error>,
    },

    /// An identity-changing modify removed the old entry but could not
    /// create the new one. The entry now exists under neither identity.
    #[error("'{removed}' was removed but '{target}' could not be created: {source}")]
    PartiallyApplied {
        removed: String,
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// A modify tried to move an entry to another mechanism.
    #[error("cannot change an entry's type from {from} to {to}")]
    TypeChange { from: AutostartType, to: AutostartType },

    /// No provider is registered for the type. This is a wiring bug.
    #[error("no autostart provider registered for {0}")]
    ProviderNotFound(AutostartType),
}

impl Error {
    /// Builds an [`Error::Native`] from an OS error code and message.
    pub fn native(
        operation: &'static str,
        target: impl Into<String>,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::Native {
            operation,
            target: target.into(),
            source: NativeError {
                code,
                message: message.into(),
            },
        }
    }

    pub fn not_found(what: &'static str, target: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            target: target.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when a modify left the entry deleted.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartiallyApplied { .. })
    }
}

/// An error code reported by a Win32 or COM call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (0x{code:08X})")]
pub struct NativeError {
    /// `HRESULT` or Win32 error code.
    pub code: i32,
    pub message: String,
}

fn toggle_verb(enabled: &bool) -> &'static str {
    if *enabled { "enable" } else { "disable" }
}

/// Fails with [`Error::Validation`] when `value` is blank.
pub(crate) fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_message_includes_code_and_target() {
        // Arrange
        let err = Error::native("delete service", "VendorSvc", 1072, "marked for deletion");

        // Act
        let message = err.to_string();

        // Assert
        assert_eq!(
            message,
            "failed to delete service 'VendorSvc': marked for deletion (0x00000430)"
        );
    }

    #[test]
    fn state_change_names_direction() {
        let err = Error::StateChange {
            name: "Foo".into(),
            location: "CurrentUser\\Run".into(),
            enabled: false,
            source: Box::new(Error::not_found("registry key", "x")),
        };
        assert!(err.to_string().starts_with("failed to disable 'Foo'"));
    }

    #[test]
    fn partial_is_detectable() {
        let err = Error::PartiallyApplied {
            removed: "Foo".into(),
            target: "Bar".into(),
            source: Box::new(Error::Validation { field: "name" }),
        };
        assert!(err.is_partial());
        assert!(!Error::ProviderNotFound(AutostartType::Registry).is_partial());
    }

    #[test]
    fn require_rejects_whitespace() {
        assert!(matches!(
            require("name", "  "),
            Err(Error::Validation { field: "name" })
        ));
        assert!(require("name", "Foo").is_ok());
    }
}
