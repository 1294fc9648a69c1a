use thiserror::Error;

/// Error category, spec'd so callers can tell a conflict from a precondition
/// failure without string matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("in use: {0}")]
    InUse(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("agent error: {0}")]
    Agent(String),
}

/// Every error names the entity kind, its identifier, and the operation that
/// failed, so "pool4 abc123: create: conflict with reserved pool" and
/// "pool4 abc123: delete: not found" are distinguishable at the API surface.
#[derive(Debug, Error)]
#[error("{entity} {id}: {op}: {kind}")]
pub struct Error {
    pub entity: &'static str,
    pub id: String,
    pub op: &'static str,
    #[source]
    pub kind: ErrorKind,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(entity: &'static str, id: impl Into<String>, op: &'static str, kind: ErrorKind) -> Self {
        Self {
            entity,
            id: id.into(),
            op,
            kind,
        }
    }

    pub fn validation(
        entity: &'static str,
        id: impl Into<String>,
        op: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(entity, id, op, ErrorKind::Validation(reason.into()))
    }

    pub fn conflict(
        entity: &'static str,
        id: impl Into<String>,
        op: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(entity, id, op, ErrorKind::Conflict(reason.into()))
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>, op: &'static str) -> Self {
        Self::new(entity, id, op, ErrorKind::NotFound)
    }

    pub fn in_use(
        entity: &'static str,
        id: impl Into<String>,
        op: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(entity, id, op, ErrorKind::InUse(reason.into()))
    }

    pub fn store(
        entity: &'static str,
        id: impl Into<String>,
        op: &'static str,
        source: impl std::fmt::Display,
    ) -> Self {
        Self::new(entity, id, op, ErrorKind::Store(source.to_string()))
    }

    pub fn agent(
        entity: &'static str,
        id: impl Into<String>,
        op: &'static str,
        source: impl std::fmt::Display,
    ) -> Self {
        Self::new(entity, id, op, ErrorKind::Agent(source.to_string()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self.kind, ErrorKind::InUse(_))
    }
}
