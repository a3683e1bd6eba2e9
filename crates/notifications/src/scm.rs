//! Source control side channel for preview environments.

use async_trait::async_trait;
use converge_core::{DeliveryConfig, Environment};

use crate::error::Result;
use crate::types::{ArtifactVersion, DeploymentStatus};

/// Reports preview deployments back to the change request that created them.
#[async_trait]
pub trait ScmNotifier: Send + Sync {
    /// Comment on the pull request behind a preview environment.
    async fn comment_on_pull_request(
        &self,
        config: &DeliveryConfig,
        environment: &Environment,
        comment: &str,
    ) -> Result<()>;

    /// Post a deployment status to the commit that produced `artifact`.
    async fn post_deployment_status(
        &self,
        config: &DeliveryConfig,
        environment: &Environment,
        artifact: &ArtifactVersion,
        status: DeploymentStatus,
    ) -> Result<()>;
}

/// Markdown comment describing a preview deployment.
#[must_use]
pub fn deployment_comment(
    base_url: &str,
    config: &DeliveryConfig,
    environment: &Environment,
    status: DeploymentStatus,
) -> String {
    let link = format!(
        "{}/#/applications/{}/environments/overview",
        base_url.trim_end_matches('/'),
        config.application
    );

    match status {
        DeploymentStatus::Succeeded => environment
            .resources
            .iter()
            .map(|key| {
                format!(
                    "✅ &nbsp;[{} {} deployed to preview environment]({link})",
                    key.kind, key.name
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        DeploymentStatus::Failed => {
            format!("❌ &nbsp;[Preview environment deployment failed]({link})")
        }
    }
}
