//! Cost lookup backend.

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::types::cost::CostEntry;

#[async_trait]
pub trait CostBackend: Send + Sync {
    /// All currently active cost entries.
    async fn list_active_costs(&self) -> Result<Vec<CostEntry>, CatalogError>;
}
