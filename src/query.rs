//! Query status and the result builder used at the presentation boundary.
//!
//! Views call `QueryResult::create(status)`, attach the success and error
//! alternatives, and `build()` picks one. A pending status (or a branch that
//! was never attached) resolves to `None`, which callers render as a loading
//! placeholder.

/// Tri-state status of an async fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// Status strings from outside the crate; anything unrecognised is `Pending`.
impl From<&str> for QueryStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => QueryStatus::Success,
            "error" => QueryStatus::Error,
            other => {
                if other != "pending" && other != "loading" {
                    tracing::trace!(status = %other, "Unknown query status, treating as pending");
                }
                QueryStatus::Pending
            }
        }
    }
}

impl<T, E> From<&Result<T, E>> for QueryStatus {
    fn from(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => QueryStatus::Success,
            Err(_) => QueryStatus::Error,
        }
    }
}

/// Fluent builder resolving a status to one of two pre-built views.
#[derive(Debug, Clone)]
#[must_use = "call build() to resolve the view"]
pub struct QueryResult<V> {
    status: QueryStatus,
    success: Option<V>,
    error: Option<V>,
}

impl<V> QueryResult<V> {
    pub fn create(status: impl Into<QueryStatus>) -> Self {
        Self {
            status: status.into(),
            success: None,
            error: None,
        }
    }

    pub fn on_success(mut self, view: V) -> Self {
        self.success = Some(view);
        self
    }

    pub fn on_error(mut self, view: V) -> Self {
        self.error = Some(view);
        self
    }

    /// Resolve the branch for the status. `None` is the neutral result.
    pub fn build(self) -> Option<V> {
        match self.status {
            QueryStatus::Success => self.success,
            QueryStatus::Error => self.error,
            QueryStatus::Pending => None,
        }
    }
}
