use std::env;

use params::{PARAM_PREFIX, get_param};

use crate::turbot::Workspace;

/// Environment-provided settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub aws_region: String,
    pub workspace_name: String,
    pub raw_alarms_queue_url: String,
    pub findings_queue_url: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            aws_region: env::var("AWS_REGION").expect("AWS_REGION not set"),
            workspace_name: env::var("WORKSPACE_NAME").expect("WORKSPACE_NAME not set"),
            raw_alarms_queue_url: env::var("RAW_ALARMS_QUEUE_URL")
                .expect("RAW_ALARMS_QUEUE_URL not set"),
            findings_queue_url: env::var("FINDINGS_QUEUE_URL")
                .expect("FINDINGS_QUEUE_URL not set"),
        }
    }
}

/// Resolves the workspace endpoint and API key pair from Parameter Store.
/// Called once per non-empty batch; the secrets are decrypted on read.
pub async fn load_workspace(
    ssm_client: &aws_sdk_ssm::Client,
    workspace_name: &str,
) -> Result<Workspace, Box<dyn std::error::Error>> {
    let prefix = format!("{}/{}/workspace", PARAM_PREFIX, workspace_name);

    let workspace_url = get_param(ssm_client, &format!("{}/url", prefix), true).await?;
    let access_key = get_param(ssm_client, &format!("{}/access_key", prefix), true).await?;
    let secret_key = get_param(ssm_client, &format!("{}/secret_key", prefix), true).await?;

    Ok(Workspace {
        // the stored url ends with a trailing slash
        endpoint: format!("{}api/v5/graphql", workspace_url),
        access_key,
        secret_key,
    })
}
