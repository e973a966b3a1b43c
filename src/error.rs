/*!
 * Error Handling for the QaSa PSA Crypto Core
 *
 * Provides the status taxonomy shared by the key-slot store, the driver
 * table, multi-part operations and the client facade, together with the
 * numeric status codes, user-friendly messages and retry classification.
 */

use thiserror::Error;

/// Error type for all operations of the crypto core
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Operation not supported: {what}")]
    NotSupported { what: String },

    #[error("Invalid argument: {parameter} - expected {expected} - got {actual}")]
    InvalidArgument {
        parameter: String,
        expected: String,
        actual: String,
    },

    #[error("Output buffer too small: {required} bytes required, {available} available")]
    BufferTooSmall { required: usize, available: usize },

    #[error("Insufficient memory: {resource}")]
    InsufficientMemory { resource: String },

    #[error("Key {key_id:#010x} is in use ({lock_count} outstanding lock(s))")]
    InUse { key_id: u32, lock_count: u32 },

    #[error("Key {key_id:#010x} does not exist")]
    DoesNotExist { key_id: u32 },

    #[error("Operation not permitted: {operation} - {reason}")]
    NotPermitted { operation: String, reason: String },

    #[error("Bad state: {operation} called while {state}")]
    BadState { operation: String, state: String },

    #[error("Hardware failure in driver '{driver}': {cause}")]
    HardwareFailure { driver: String, cause: String },

    #[error("Key {key_id:#010x} already exists")]
    AlreadyExists { key_id: u32 },

    #[error("Invalid signature or tag: {operation}")]
    InvalidSignature { operation: String },

    #[error("Invalid padding: {operation}")]
    InvalidPadding { operation: String },

    #[error("Insufficient entropy: {cause}")]
    InsufficientEntropy { cause: String },

    #[error("Insufficient data: {requested} bytes requested, {remaining} remaining")]
    InsufficientData { requested: usize, remaining: usize },

    #[error("Insufficient storage for uid {uid:#x}")]
    InsufficientStorage { uid: u64 },

    #[error("Storage failure: {operation} - {cause}")]
    StorageFailure { operation: String, cause: String },

    #[error("Stored data for uid {uid:#x} is corrupt: {cause}")]
    DataCorrupt { uid: u64, cause: String },

    #[error("Stored data is invalid: {cause}")]
    DataInvalid { cause: String },

    #[error("Internal corruption detected: {cause}")]
    CorruptionDetected { cause: String },

    #[error("Generic error: {operation} - {cause}")]
    GenericError { operation: String, cause: String },
}

/// Numeric status codes, compatible with the PSA Crypto API values
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC_ERROR: i32 = -132;
    pub const NOT_PERMITTED: i32 = -133;
    pub const NOT_SUPPORTED: i32 = -134;
    pub const INVALID_ARGUMENT: i32 = -135;
    pub const BAD_STATE: i32 = -137;
    pub const BUFFER_TOO_SMALL: i32 = -138;
    pub const ALREADY_EXISTS: i32 = -139;
    pub const DOES_NOT_EXIST: i32 = -140;
    pub const INSUFFICIENT_MEMORY: i32 = -141;
    pub const INSUFFICIENT_STORAGE: i32 = -142;
    pub const INSUFFICIENT_DATA: i32 = -143;
    pub const STORAGE_FAILURE: i32 = -146;
    pub const HARDWARE_FAILURE: i32 = -147;
    pub const INSUFFICIENT_ENTROPY: i32 = -148;
    pub const INVALID_SIGNATURE: i32 = -149;
    pub const INVALID_PADDING: i32 = -150;
    pub const CORRUPTION_DETECTED: i32 = -151;
    pub const DATA_CORRUPT: i32 = -152;
    pub const DATA_INVALID: i32 = -153;
    // Vendor range: destroying a locked key has no standard status.
    pub const IN_USE: i32 = -248;
}

impl CryptoError {
    /// Get the numeric status code for this error
    pub fn status(&self) -> i32 {
        match self {
            CryptoError::NotSupported { .. } => status::NOT_SUPPORTED,
            CryptoError::InvalidArgument { .. } => status::INVALID_ARGUMENT,
            CryptoError::BufferTooSmall { .. } => status::BUFFER_TOO_SMALL,
            CryptoError::InsufficientMemory { .. } => status::INSUFFICIENT_MEMORY,
            CryptoError::InUse { .. } => status::IN_USE,
            CryptoError::DoesNotExist { .. } => status::DOES_NOT_EXIST,
            CryptoError::NotPermitted { .. } => status::NOT_PERMITTED,
            CryptoError::BadState { .. } => status::BAD_STATE,
            CryptoError::HardwareFailure { .. } => status::HARDWARE_FAILURE,
            CryptoError::AlreadyExists { .. } => status::ALREADY_EXISTS,
            CryptoError::InvalidSignature { .. } => status::INVALID_SIGNATURE,
            CryptoError::InvalidPadding { .. } => status::INVALID_PADDING,
            CryptoError::InsufficientEntropy { .. } => status::INSUFFICIENT_ENTROPY,
            CryptoError::InsufficientData { .. } => status::INSUFFICIENT_DATA,
            CryptoError::InsufficientStorage { .. } => status::INSUFFICIENT_STORAGE,
            CryptoError::StorageFailure { .. } => status::STORAGE_FAILURE,
            CryptoError::DataCorrupt { .. } => status::DATA_CORRUPT,
            CryptoError::DataInvalid { .. } => status::DATA_INVALID,
            CryptoError::CorruptionDetected { .. } => status::CORRUPTION_DETECTED,
            CryptoError::GenericError { .. } => status::GENERIC_ERROR,
        }
    }

    /// Get the error type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::NotSupported { .. } => "NotSupported",
            CryptoError::InvalidArgument { .. } => "InvalidArgument",
            CryptoError::BufferTooSmall { .. } => "BufferTooSmall",
            CryptoError::InsufficientMemory { .. } => "InsufficientMemory",
            CryptoError::InUse { .. } => "InUse",
            CryptoError::DoesNotExist { .. } => "DoesNotExist",
            CryptoError::NotPermitted { .. } => "NotPermitted",
            CryptoError::BadState { .. } => "BadState",
            CryptoError::HardwareFailure { .. } => "HardwareFailure",
            CryptoError::AlreadyExists { .. } => "AlreadyExists",
            CryptoError::InvalidSignature { .. } => "InvalidSignature",
            CryptoError::InvalidPadding { .. } => "InvalidPadding",
            CryptoError::InsufficientEntropy { .. } => "InsufficientEntropy",
            CryptoError::InsufficientData { .. } => "InsufficientData",
            CryptoError::InsufficientStorage { .. } => "InsufficientStorage",
            CryptoError::StorageFailure { .. } => "StorageFailure",
            CryptoError::DataCorrupt { .. } => "DataCorrupt",
            CryptoError::DataInvalid { .. } => "DataInvalid",
            CryptoError::CorruptionDetected { .. } => "CorruptionDetected",
            CryptoError::GenericError { .. } => "GenericError",
        }
    }

    /// Whether a caller may reasonably retry the same request later
    ///
    /// Resource exhaustion and lock contention can clear up; everything
    /// else is either a caller bug or a permanent property of the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CryptoError::BufferTooSmall { .. }
                | CryptoError::InsufficientMemory { .. }
                | CryptoError::InsufficientStorage { .. }
                | CryptoError::InUse { .. }
                | CryptoError::InsufficientEntropy { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            CryptoError::NotSupported { what } => {
                format!("'{}' is not supported by any configured driver.", what)
            }
            CryptoError::InvalidArgument { parameter, expected, .. } => {
                format!("Invalid parameter '{}'. Expected {}.", parameter, expected)
            }
            CryptoError::BufferTooSmall { required, .. } => {
                format!("The output buffer is too small. Provide at least {} bytes.", required)
            }
            CryptoError::InsufficientMemory { resource } => {
                format!("Resource '{}' exhausted. Release unused keys and retry.", resource)
            }
            CryptoError::InUse { .. } => {
                "The key is still in use by another operation. Finish or abort it first."
                    .to_string()
            }
            CryptoError::DoesNotExist { key_id } => {
                format!("No key with identifier {:#x} exists.", key_id)
            }
            CryptoError::NotPermitted { operation, .. } => {
                format!("The key policy does not permit '{}'.", operation)
            }
            CryptoError::BadState { operation, .. } => {
                format!("'{}' was called in the wrong order.", operation)
            }
            CryptoError::HardwareFailure { driver, .. } => {
                format!("The '{}' driver reported a hardware fault.", driver)
            }
            CryptoError::AlreadyExists { key_id } => {
                format!("A key with identifier {:#x} already exists.", key_id)
            }
            CryptoError::InvalidSignature { .. } => {
                "Signature or authentication tag verification failed.".to_string()
            }
            CryptoError::InvalidPadding { .. } => {
                "Decrypted data has invalid padding.".to_string()
            }
            CryptoError::InsufficientEntropy { .. } => {
                "Not enough entropy is available to generate random data.".to_string()
            }
            CryptoError::InsufficientData { .. } => {
                "The key derivation capacity is exhausted.".to_string()
            }
            CryptoError::InsufficientStorage { .. } => {
                "Persistent key storage is full.".to_string()
            }
            CryptoError::StorageFailure { .. } => {
                "Persistent key storage failed. Check file permissions and disk space.".to_string()
            }
            CryptoError::DataCorrupt { .. } | CryptoError::DataInvalid { .. } => {
                "Stored key data could not be read. It may be corrupted.".to_string()
            }
            CryptoError::CorruptionDetected { .. } => {
                "Internal state corruption detected. Restart the crypto core.".to_string()
            }
            CryptoError::GenericError { operation, .. } => {
                format!("Operation '{}' failed.", operation)
            }
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: &str, expected: &str, actual: &str) -> Self {
        CryptoError::InvalidArgument {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a not-supported error
    pub fn not_supported(what: impl Into<String>) -> Self {
        CryptoError::NotSupported { what: what.into() }
    }

    /// Create a not-permitted error
    pub fn not_permitted(operation: &str, reason: &str) -> Self {
        CryptoError::NotPermitted {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a bad-state error
    pub fn bad_state(operation: &str, state: &str) -> Self {
        CryptoError::BadState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a buffer-too-small error
    pub fn buffer_too_small(required: usize, available: usize) -> Self {
        CryptoError::BufferTooSmall { required, available }
    }

    /// Create a storage failure error
    pub fn storage_failure(operation: &str, cause: impl ToString) -> Self {
        CryptoError::StorageFailure {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Create a generic error wrapping a primitive failure
    pub fn generic(operation: &str, cause: impl ToString) -> Self {
        CryptoError::GenericError {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Create a corruption-detected error
    pub fn corruption(cause: impl Into<String>) -> Self {
        CryptoError::CorruptionDetected { cause: cause.into() }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::storage_failure("io", err)
    }
}

impl From<bincode::Error> for CryptoError {
    fn from(err: bincode::Error) -> Self {
        CryptoError::DataInvalid {
            cause: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::invalid_argument("configuration", "valid JSON", &err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CryptoError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CryptoError::corruption("lock poisoned by a panicking thread")
    }
}

/// Result type for crypto core operations
pub type CryptoResult<T> = Result<T, CryptoError>;
