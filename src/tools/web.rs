//! The `web_searcher` tool.

use crate::error::ToolError;
use crate::search::{SearchBackend, SearchHit};

pub async fn web_search(
    backend: &dyn SearchBackend,
    query: &str,
) -> Result<Vec<SearchHit>, ToolError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ToolError::invalid_args("web_searcher", "query must not be empty"));
    }
    Ok(backend.search(query).await?)
}
