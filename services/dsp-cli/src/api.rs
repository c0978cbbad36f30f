//! Datasphere API helpers
//!
//! Thin wrappers over `AuthenticatedClient::request` for the calls the CLI
//! exposes. The paths are built here as plain strings; the client encodes
//! the OData filter's literal spaces when the request goes out.

use datasphere_auth::{ApiResponse, AuthenticatedClient, Method, Result};

/// List catalog assets for a space, filtered server-side with OData.
pub async fn list_assets(
    client: &AuthenticatedClient,
    space_name: &str,
    top: u32,
) -> Result<Option<ApiResponse>> {
    client
        .request(Method::GET, &assets_path(space_name, top), None)
        .await
}

/// Start a task chain in a space.
pub async fn start_task_chain(
    client: &AuthenticatedClient,
    space_id: &str,
    task_chain_id: &str,
) -> Result<Option<ApiResponse>> {
    client
        .request(Method::POST, &task_chain_path(space_id, task_chain_id), None)
        .await
}

fn assets_path(space_name: &str, top: u32) -> String {
    format!("/api/v1/dwc/catalog/assets?$filter=spaceName eq '{space_name}'&$top={top}")
}

// Route from the service's discovery document
fn task_chain_path(space_id: &str, task_chain_id: &str) -> String {
    format!("/dwaas-core/api/v1/tasks/chains/{space_id}/run/{task_chain_id}")
}
