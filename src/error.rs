use thiserror::Error;

/// Errors raised while building, compiling or executing a query.
///
/// Every variant is returned from the call that detects the problem; nothing
/// is retried or corrected internally.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid binding type: {0}")]
    InvalidBindingCategory(String),

    #[error("A subquery must be a query builder instance, a closure, or a string")]
    UnsupportedSubqueryType,

    #[error("You must specify an order by clause when using this function")]
    OrderRequired,

    #[error("The chunk by id operation was aborted because the [{0}] column is not present in the query result")]
    MissingCursorColumn(String),

    #[error("No records found")]
    RecordNotFound,

    #[error("{0} records were found")]
    MultipleRecordsFound(usize),

    #[error("Operator '{0}' has no inverse")]
    UnsupportedOperator(String),

    #[error("{0} is not implemented by this grammar")]
    NotImplemented(&'static str),

    #[error("No statement executor is attached to this query")]
    MissingExecutor,

    #[error("Statement execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl QueryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wraps an executor failure.
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Execution(err.into())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            QueryError::MissingCursorColumn("id".into()).to_string(),
            "The chunk by id operation was aborted because the [id] column is not present in the query result"
        );
        assert_eq!(QueryError::MultipleRecordsFound(2).to_string(), "2 records were found");
    }

    #[test]
    fn test_execution_wraps_source() {
        let err = QueryError::execution("connection reset");
        assert!(matches!(err, QueryError::Execution(_)));
        assert_eq!(err.to_string(), "Statement execution failed: connection reset");
    }
}
