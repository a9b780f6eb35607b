use serde::{Deserialize, Deserializer};

// SQS delivers the SNS envelope as the record body, and the actual Turbot
// notification is a separately JSON-encoded string inside it, so getting to
// the notification takes two decode passes.
#[derive(Debug, serde::Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Message")]
    pub message: String,
}

pub fn unwrap_notification(body: &str) -> Result<ControlChangeNotification, serde_json::Error> {
    let envelope: NotificationEnvelope = serde_json::from_str(body)?;
    serde_json::from_str(&envelope.message)
}

#[derive(Debug, serde::Deserialize)]
pub struct ControlChangeNotification {
    #[serde(rename = "notificationType")]
    pub notification_type: String,
    pub control: Control,
    #[serde(rename = "oldControl")]
    pub old_control: Option<OldControl>,
    pub turbot: NotificationMeta,
}

impl ControlChangeNotification {
    // The emitter omits oldControl when it has no prior state to report;
    // downstream the sentinel behaves like any other non-reportable state.
    pub fn old_state(&self) -> ControlState {
        self.old_control
            .as_ref()
            .map(|old| old.state.clone())
            .unwrap_or_else(|| ControlState::from("TBD".to_string()))
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct NotificationMeta {
    #[serde(rename = "createTimestamp")]
    pub create_timestamp: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct Control {
    pub state: ControlState,
    pub reason: Option<String>,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub turbot: ControlMeta,
    pub resource: ControlResource,
}

#[derive(Debug, serde::Deserialize)]
pub struct OldControl {
    pub state: ControlState,
}

#[derive(Debug, serde::Deserialize)]
pub struct ControlType {
    pub trunk: Trunk,
}

#[derive(Debug, serde::Deserialize)]
pub struct Trunk {
    pub title: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ControlMeta {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ControlResource {
    pub metadata: ResourceMetadata,
}

// Only the aws sub-object is recognized; records for any other provider
// carry no aws key and are dropped by the caller.
#[derive(Debug, serde::Deserialize)]
pub struct ResourceMetadata {
    pub aws: Option<AwsMetadata>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AwsMetadata {
    #[serde(rename = "accountId")]
    pub account_id: String,
    pub partition: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
}

/// Control state as Turbot reports it. Anything other than alarm/ok is kept
/// verbatim in `Other` so state comparisons stay exact string comparisons.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(from = "String")]
pub enum ControlState {
    Alarm,
    Ok,
    Other(String),
}

impl From<String> for ControlState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "alarm" => ControlState::Alarm,
            "ok" => ControlState::Ok,
            _ => ControlState::Other(state),
        }
    }
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlState::Alarm => write!(f, "alarm"),
            ControlState::Ok => write!(f, "ok"),
            ControlState::Other(state) => write!(f, "{}", state),
        }
    }
}

// The firehose serializes control ids as strings, but the API type is an ID
// that also accepts plain numbers; normalize both to the decimal string.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(u64),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(id) => id,
        IdRepr::Number(id) => id.to_string(),
    })
}
