//! API error taxonomy
//!
//! Every failure a request can hit maps onto one of these variants; the
//! HTTP layer turns them into status codes without inspecting messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid or missing credential. Rejected before any query runs.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to perform the action.
    #[error("{0}")]
    Forbidden(String),

    /// No live player/game selected yet. Distinct from empty data.
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with existing rows (duplicate name, stats
    /// still referencing a game).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    /// All pooled connections are unusable (poisoned slot).
    #[error("Database connection pool failure")]
    Pool,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized".to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotConfigured(_) | Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::BadRequest(_) => 400,
            Self::Pool | Self::Database(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::unauthorized().status_code(), 401);
        assert_eq!(ApiError::Forbidden("no".into()).status_code(), 403);
        assert_eq!(ApiError::NotConfigured("unset".into()).status_code(), 404);
        assert_eq!(ApiError::NotFound("gone".into()).status_code(), 404);
        assert_eq!(ApiError::Conflict("dup".into()).status_code(), 409);
        assert_eq!(ApiError::BadRequest("bad".into()).status_code(), 400);
        assert_eq!(ApiError::Pool.status_code(), 500);
    }
}
