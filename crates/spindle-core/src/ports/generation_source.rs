//! GenerationSource port - status endpoint of an external generation API.

use async_trait::async_trait;

use crate::domain::GenerationSnapshot;
use crate::error::GenerationError;

#[async_trait]
pub trait GenerationSource: Send + Sync {
    async fn poll(&self, external_id: &str) -> Result<GenerationSnapshot, GenerationError>;
}
