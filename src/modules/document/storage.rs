use crate::modules::document::schema::{
    DeleteResult, IdentifierPlan, NormalizedDocument, ResourceType, UploadResult, UrlResult,
};

/// Boundary to the remote blob store.
///
/// Implementations never return errors for provider-side failures: every
/// transport, auth, quota or validation failure comes back as an unsuccessful
/// result so a single bad request cannot take the service down.
#[async_trait::async_trait]
pub trait StorageGateway {
    async fn upload(
        &self,
        document: &NormalizedDocument,
        plan: &IdentifierPlan,
        resource_type: ResourceType,
    ) -> UploadResult;

    /// Deterministic URL construction, no existence check.
    fn resolve_url(&self, public_id: &str, resource_type: ResourceType) -> UrlResult;

    /// Removing an id that does not exist reports "not found", not an error.
    async fn delete(&self, public_id: &str, resource_type: ResourceType) -> DeleteResult;
}
