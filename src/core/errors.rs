use thiserror::Error;

/// Errors surfaced by the core pipeline. The HTTP layer is the only
/// place these are translated into status codes and response bodies;
/// no component below the handlers writes HTTP semantics.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: bad JSON, missing required parameter, invalid id.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A referenced entity does not exist at lookup time. In auctions this
    /// means "skip candidate"; in postbacks it becomes a 200 body with an
    /// error field so the vendor does not tight-loop retries.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Failed S2S token or IP allowlist check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Pacing store / event store / partner I/O failure.
    #[error("downstream failure in {component}: {source}")]
    Downstream {
        component: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Anything unexpected. Callers convert to a generic 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn downstream(component: &'static str, source: impl Into<anyhow::Error>) -> Self {
        CoreError::Downstream {
            component,
            source: source.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
