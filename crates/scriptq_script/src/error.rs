use crate::convert::ConvertError;
use scriptq_core::CopyError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`ScriptRuntime`](crate::ScriptRuntime).
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// Uncaught JavaScript exception, rendered with its stack when available.
    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("failed to read script '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("global '{name}' already holds another queue")]
    NameTaken { name: String },

    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}
