//! # Error Types
//!
//! All error types for deterministic instance creation and instance calls.

use crate::domain::abi::ParamType;
use crate::domain::value_objects::{Address, ParseHexError};
use thiserror::Error;

// =============================================================================
// FACTORY ERRORS
// =============================================================================

/// Errors surfaced by factory operations.
///
/// Every variant is returned after the pending journal has been discarded:
/// no code, no storage and no log entry survive a failed operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// Caller is not in the factory's admin set.
    #[error("unauthorized caller: {caller:?}")]
    Unauthorized { caller: Address },

    /// The derived address already hosts code (salt reuse for the same template).
    #[error("address collision: {0:?} is already occupied")]
    AddressCollision(Address),

    /// The fresh instance's one-time initializer rejected its payload.
    #[error("initialization of {instance:?} failed: {reason}")]
    InitializationFailed { instance: Address, reason: String },

    /// No implementation code is published at the registered base address.
    #[error("no base implementation registered at {0:?}")]
    InvalidBaseImplementation(Address),

    /// Proxy admin is the zero address.
    #[error("proxy admin must not be the zero address")]
    ZeroProxyAdmin,

    /// Salt input wider than 32 bytes.
    #[error("invalid salt: {len} bytes exceeds 32")]
    InvalidSalt { len: usize },

    /// A post-creation invariant check failed.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// A call on an existing instance failed.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Ledger access error.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl FactoryError {
    /// Returns true if resubmitting with a different salt could succeed.
    #[must_use]
    pub fn is_salt_conflict(&self) -> bool {
        matches!(self, Self::AddressCollision(_))
    }
}

// =============================================================================
// EXECUTION ERRORS
// =============================================================================

/// Errors raised while dispatching a call to an instance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Target account has no code.
    #[error("no code at {0:?}")]
    NoCode(Address),

    /// Account code is not a clone, a proxy or a registered implementation.
    #[error("unrecognized code at {0:?}")]
    UnknownCode(Address),

    /// The implementation does not expose the requested function.
    #[error("unknown selector 0x{}", hex::encode(.0))]
    UnknownSelector([u8; 4]),

    /// Initializer invoked on an already-initialized instance.
    #[error("instance already initialized")]
    AlreadyInitialized,

    /// Caller is not the proxy's own admin.
    #[error("unauthorized caller: {caller:?}")]
    Unauthorized { caller: Address },

    /// The proxy admin tried to reach implementation logic through the proxy.
    #[error("admin cannot fallback to proxy target")]
    AdminCannotFallback,

    /// Upgrade target has no code.
    #[error("new implementation is not a contract: {0:?}")]
    InvalidImplementation(Address),

    /// Storage write attempted during a read-only call.
    #[error("write operation in static context")]
    WriteInStaticContext,

    /// Delegation chain deeper than the configured limit.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded { depth: u16, max: u16 },

    /// Arguments could not be decoded.
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),

    /// Implementation logic rejected the call.
    #[error("revert: {0}")]
    Revert(String),
}

// =============================================================================
// ABI ERRORS
// =============================================================================

/// Errors from the call codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// Calldata shorter than a selector.
    #[error("calldata too short: {0} bytes")]
    ShortCalldata(usize),

    /// Offset or length points outside the payload.
    #[error("offset {offset} out of bounds for {len}-byte payload")]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// Length or offset word does not fit the platform word.
    #[error("value overflow")]
    ValueOverflow,

    /// Address word with non-zero high bytes.
    #[error("dirty address padding")]
    DirtyAddressPadding,

    /// Bool word other than 0 or 1.
    #[error("invalid bool")]
    InvalidBool,

    /// String payload is not UTF-8.
    #[error("invalid utf-8 string")]
    InvalidUtf8,

    /// Decoder asked for a type in the wrong position.
    #[error("unexpected type: {0:?}")]
    UnexpectedType(ParamType),
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from ledger access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Code may only be written once per address.
    #[error("code already present at {0:?}")]
    CodeAlreadyPresent(Address),

    /// Code must be non-empty.
    #[error("empty code for {0:?}")]
    EmptyCode(Address),
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base implementation address is zero.
    #[error("base implementation must not be the zero address")]
    ZeroBaseImplementation,

    /// An admin entry is the zero address.
    #[error("admin list contains the zero address")]
    ZeroAdmin,

    /// Address or salt could not be parsed.
    #[error("invalid value for {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: ParseHexError,
    },

    /// A required variable is missing.
    #[error("missing configuration value: {0}")]
    Missing(String),

    /// Numeric limit out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// JSON document could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Log filter directive rejected.
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),

    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberAlreadySet,
}

// =============================================================================
// DEPLOYMENT ERRORS
// =============================================================================

/// Errors from publishing an implementation or standing up a factory.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// Configuration rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Ledger rejected a write.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_error_display() {
        let err = FactoryError::AddressCollision(Address::new([1u8; 20]));
        assert!(err.to_string().contains("already occupied"));

        let err = FactoryError::InitializationFailed {
            instance: Address::ZERO,
            reason: "revert: zero address admin".to_string(),
        };
        assert!(err.to_string().contains("zero address admin"));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::UnknownSelector([0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(err.to_string(), "unknown selector 0xdeadbeef");

        let err = ExecutionError::CallDepthExceeded { depth: 5, max: 4 };
        assert_eq!(err.to_string(), "call depth exceeded: 5 > 4");
    }

    #[test]
    fn test_error_conversions() {
        let exec: ExecutionError = AbiError::InvalidBool.into();
        assert!(matches!(exec, ExecutionError::Abi(AbiError::InvalidBool)));

        let factory: FactoryError = StateError::EmptyCode(Address::ZERO).into();
        assert!(matches!(factory, FactoryError::State(_)));
    }

    #[test]
    fn test_salt_conflict_classification() {
        assert!(FactoryError::AddressCollision(Address::ZERO).is_salt_conflict());
        assert!(!FactoryError::Unauthorized {
            caller: Address::ZERO
        }
        .is_salt_conflict());
    }
}
