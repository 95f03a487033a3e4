//! Error types for shared library loading

/// Error type for shared library operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// The OS loader refused to open the file
    #[error("Cannot load library {path}: {reason}")]
    Open { path: String, reason: String },

    /// A required symbol is not exported
    #[error("Symbol {symbol} not found in {path}")]
    SymbolNotFound { symbol: String, path: String },

    /// A symbol resolved but its entry point returned null
    #[error("Entry point returned null: {0}")]
    NullSymbol(String),

    /// Symbol name was not null-terminated
    #[error("Invalid symbol name: {0}")]
    InvalidSymbolName(String),

    /// Plugin was built against a different framework build
    #[error("ABI mismatch in {path}: expected {expected}, found {found}")]
    AbiMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// The plugin is already bound to a different runtime
    #[error("Plugin {0} refused the host runtime")]
    AttachRefused(String),

    /// The OS loader failed to close the library
    #[error("Cannot unload library {path}: {reason}")]
    Unload { path: String, reason: String },
}
