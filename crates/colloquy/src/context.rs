use anyhow::Result;
use async_trait::async_trait;

/// Supplies text snippets relevant to a query, used to enrich the system prompt
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<String>>;
}

/// A context source that always returns the same snippets, e.g. fixed schema descriptions
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    snippets: Vec<String>,
}

impl StaticContext {
    pub fn new<S: Into<String>>(snippets: impl IntoIterator<Item = S>) -> Self {
        Self {
            snippets: snippets.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ContextSource for StaticContext {
    async fn lookup(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.snippets.clone())
    }
}

/// Look up snippets for a query, degrading to none when the source is absent or fails
pub async fn lookup_or_empty(source: Option<&dyn ContextSource>, query: &str) -> Vec<String> {
    let Some(source) = source else {
        return Vec::new();
    };
    match source.lookup(query).await {
        Ok(snippets) => snippets,
        Err(e) => {
            tracing::warn!("Context lookup failed, continuing without it: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct BrokenContext;

    #[async_trait]
    impl ContextSource for BrokenContext {
        async fn lookup(&self, _query: &str) -> Result<Vec<String>> {
            Err(anyhow!("index unavailable"))
        }
    }

    #[tokio::test]
    async fn test_static_context() {
        let source = StaticContext::new(["Table customer: Columns are Key, Name."]);
        let snippets = lookup_or_empty(Some(&source), "who are my customers?").await;
        assert_eq!(snippets, vec!["Table customer: Columns are Key, Name."]);
    }

    #[tokio::test]
    async fn test_missing_or_failing_source_degrades() {
        assert!(lookup_or_empty(None, "anything").await.is_empty());
        assert!(lookup_or_empty(Some(&BrokenContext), "anything")
            .await
            .is_empty());
    }
}
