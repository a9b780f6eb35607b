use crate::message::ControlState;

/// Credentials and endpoint for one Turbot workspace, resolved from SSM per
/// batch and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TurbotError {
    #[error("graphql request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("graphql response was not valid json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("graphql query failed: {0}")]
    Query(String),
}

/// Result of the authoritative lookup. A control the workspace no longer
/// knows about is a negative answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlLookup {
    Found {
        state: ControlState,
        akas: Vec<String>,
    },
    NotFound,
}

const CONTROL_QUERY: &str = "
    query Control($id: ID) {
      control(id: $id) {
        state
        resource {
          akas
        }
      }
    }
";

#[derive(Debug, serde::Deserialize)]
struct GraphQlResponse {
    data: Option<ControlData>,
    errors: Option<Vec<GraphQlProblem>>,
}

#[derive(Debug, serde::Deserialize)]
struct ControlData {
    control: Option<ControlNode>,
}

#[derive(Debug, serde::Deserialize)]
struct ControlNode {
    state: ControlState,
    resource: ResourceNode,
}

#[derive(Debug, serde::Deserialize)]
struct ResourceNode {
    #[serde(default)]
    akas: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct GraphQlProblem {
    message: String,
}

pub struct GraphQl {
    http: reqwest::Client,
    workspace: Workspace,
}

impl GraphQl {
    pub fn new(workspace: Workspace) -> Self {
        GraphQl {
            http: reqwest::Client::new(),
            workspace,
        }
    }

    /// Fetches the current state and resource akas for a control, fresh on
    /// every call. Never cached: this answer is what guards against acting
    /// on an event the queue delivered late.
    pub async fn get_control(&self, control_id: &str) -> Result<ControlLookup, TurbotError> {
        let response = self
            .http
            .post(&self.workspace.endpoint)
            .basic_auth(&self.workspace.access_key, Some(&self.workspace.secret_key))
            .json(&serde_json::json!({
                "query": CONTROL_QUERY,
                "variables": { "id": control_id },
            }))
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(TurbotError::Query(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        lookup_from_body(&body)
    }
}

fn lookup_from_body(body: &str) -> Result<ControlLookup, TurbotError> {
    let response: GraphQlResponse = serde_json::from_str(body)?;

    if let Some(errors) = response.errors {
        let messages: Vec<String> = errors.into_iter().map(|problem| problem.message).collect();
        return Err(TurbotError::Query(messages.join("; ")));
    }

    match response.data.and_then(|data| data.control) {
        Some(node) => Ok(ControlLookup::Found {
            state: node.state,
            akas: node.resource.akas,
        }),
        None => Ok(ControlLookup::NotFound),
    }
}
