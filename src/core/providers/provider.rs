use async_trait::async_trait;

/// Catalog change pushed by a provider after the initial load.
#[derive(Debug, Clone)]
pub enum ProviderEvent<T> {
    Added(T),
    Modified(T),
    Removed(String),
}

/// A backend that hands out catalog entities and optionally streams
/// changes. Managers subscribe at startup and keep their snapshots in
/// sync; nothing below the managers ever sees a concrete backend.
#[async_trait]
pub trait Provider<T>: Send + Sync {
    async fn start(
        &self,
        on_event: Box<dyn Fn(ProviderEvent<T>) + Send + Sync>,
    ) -> Result<Vec<T>, anyhow::Error>;
}
