use crate::vars::VarScope;

/// Error type shared by the template, variable, and pipeline layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Configuration error: the template document is invalid and never
    /// partially usable.
    #[error("Template validation failed: {0}")]
    Validation(String),

    /// A required variable resolved to nothing after both phases. Fails the
    /// single indicator, not the whole report.
    #[error("Missing required {scope} variable: {name}")]
    MissingVariable { name: String, scope: VarScope },

    /// A declared variable value failed its type check.
    #[error("Variable {name} invalid: {reason}")]
    InvalidVariable { name: String, reason: String },

    /// A template string is malformed (e.g. unterminated `{{`). Substitution
    /// misses are not errors; they degrade to an empty value.
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    /// A backend query failed. Propagated verbatim; retry policy (if any)
    /// belongs to the caller.
    #[error("Backend query failed: {0}")]
    Backend(#[source] crate::backend::BackendError),
}
