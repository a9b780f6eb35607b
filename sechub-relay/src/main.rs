use std::env;

use aws_sdk_securityhub::error::BuildError;
use aws_sdk_securityhub::types::{
    AwsSecurityFinding, AwsSecurityFindingIdentifier, Compliance, ComplianceStatus, NoteUpdate,
    Partition, Resource, Severity, SeverityLabel, SeverityUpdate, WorkflowStatus, WorkflowUpdate,
};
use aws_sdk_sqs::Client;
use tracing_subscriber::filter;

use asff::Finding;
use params::{PARAM_PREFIX, get_param};

struct FindingRecord {
    pub body: String,
    pub receipt_handle: String,
}

// Cross-account reporting role, shared by every target account.
struct ReporterRole {
    pub name: String,
    pub external_id: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_level(true)
        .with_max_level(filter::LevelFilter::INFO)
        .init();

    let aws_region = env::var("AWS_REGION").expect("AWS_REGION not set");
    let queue_url = env::var("FINDINGS_QUEUE_URL").expect("FINDINGS_QUEUE_URL not set");

    let aws_config = aws_config::load_from_env().await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let ssm_client = aws_sdk_ssm::Client::new(&aws_config);
    let sts_client = aws_sdk_sts::Client::new(&aws_config);

    loop {
        let records = receive_findings(&sqs_client, &queue_url)
            .await
            .unwrap_or_else(|err| {
                tracing::error!("Error receiving findings: {}", err);
                Vec::new()
            });

        if !records.is_empty() {
            match load_reporter_role(&ssm_client).await {
                Ok(role) => {
                    for record in records {
                        let finding: Finding = match serde_json::from_str(&record.body) {
                            Ok(finding) => finding,
                            Err(err) => {
                                tracing::warn!("Discarding malformed finding record: {}", err);
                                delete_message(&sqs_client, &queue_url, &record.receipt_handle)
                                    .await
                                    .unwrap_or_else(|err| {
                                        tracing::error!("Error deleting message: {}", err);
                                    });
                                continue;
                            }
                        };

                        match report_finding(&finding, &role, &sts_client, &aws_region).await {
                            Ok(()) => {
                                tracing::info!("Finding {} reported", finding.id);
                                delete_message(&sqs_client, &queue_url, &record.receipt_handle)
                                    .await
                                    .unwrap_or_else(|err| {
                                        tracing::error!("Error deleting message: {}", err);
                                    });
                            }
                            Err(err) => {
                                tracing::error!(
                                    "Failed to report finding {}, leaving record for redelivery: {}",
                                    finding.id,
                                    err
                                );
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::error!("Failed to load reporter role from SSM: {}", err);
                }
            }
        }

        // Sleep for a while before checking the queue again
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
}

async fn receive_findings(
    client: &Client,
    queue_url: &str,
) -> Result<Vec<FindingRecord>, aws_sdk_sqs::Error> {
    let rcv_message_output = client
        .receive_message()
        .queue_url(queue_url)
        .max_number_of_messages(10)
        .send()
        .await?;

    let mut records = Vec::new();
    for message in rcv_message_output.messages.unwrap_or_default() {
        let body = match message.body {
            Some(body) => body,
            None => {
                tracing::warn!("Received message with no body, skipping.");
                continue;
            }
        };

        records.push(FindingRecord {
            body,
            receipt_handle: message.receipt_handle.unwrap_or_default(),
        });
    }

    Ok(records)
}

async fn delete_message(
    client: &Client,
    queue_url: &str,
    receipt_handle: &str,
) -> Result<(), aws_sdk_sqs::Error> {
    client
        .delete_message()
        .queue_url(queue_url)
        .receipt_handle(receipt_handle)
        .send()
        .await?;

    Ok(())
}

async fn load_reporter_role(
    ssm_client: &aws_sdk_ssm::Client,
) -> Result<ReporterRole, Box<dyn std::error::Error>> {
    let name = get_param(
        ssm_client,
        &format!("{}/reporter/role/name", PARAM_PREFIX),
        false,
    )
    .await?;
    let external_id = get_param(
        ssm_client,
        &format!("{}/reporter/role/externalid", PARAM_PREFIX),
        true,
    )
    .await?;

    Ok(ReporterRole { name, external_id })
}

async fn report_finding(
    finding: &Finding,
    role: &ReporterRole,
    sts_client: &aws_sdk_sts::Client,
    aws_region: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sechub_client = assume_reporting_role(finding, role, sts_client, aws_region).await?;

    if is_resolution(&finding.title) {
        resolve_finding(&sechub_client, finding).await
    } else {
        import_finding(&sechub_client, finding).await
    }
}

// The title prefix before the first colon is the only signal distinguishing
// a new finding from the resolution of an existing one.
fn is_resolution(title: &str) -> bool {
    title.split(':').next().unwrap_or_default().to_lowercase() == "ok"
}

async fn assume_reporting_role(
    finding: &Finding,
    role: &ReporterRole,
    sts_client: &aws_sdk_sts::Client,
    aws_region: &str,
) -> Result<aws_sdk_securityhub::Client, Box<dyn std::error::Error>> {
    let role_arn = format!("arn:aws:iam::{}:role/{}", finding.aws_account_id, role.name);
    tracing::info!("Assuming reporting role: {}", role_arn);

    let assumed = sts_client
        .assume_role()
        .role_arn(role_arn)
        .external_id(&role.external_id)
        .role_session_name("TurbotSecurityHubReporting")
        .send()
        .await?;

    let credentials = assumed
        .credentials
        .ok_or("assume role returned no credentials")?;
    let provider = aws_sdk_securityhub::config::Credentials::new(
        credentials.access_key_id,
        credentials.secret_access_key,
        Some(credentials.session_token),
        None,
        "turbot-sechub-reporting",
    );

    let config = aws_sdk_securityhub::Config::builder()
        .behavior_version(aws_sdk_securityhub::config::BehaviorVersion::latest())
        .region(aws_sdk_securityhub::config::Region::new(aws_region.to_string()))
        .credentials_provider(provider)
        .build();

    Ok(aws_sdk_securityhub::Client::from_conf(config))
}

async fn import_finding(
    client: &aws_sdk_securityhub::Client,
    finding: &Finding,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Importing finding {}", finding.id);

    client
        .batch_import_findings()
        .findings(to_sdk_finding(finding)?)
        .send()
        .await?;

    Ok(())
}

async fn resolve_finding(
    client: &aws_sdk_securityhub::Client,
    finding: &Finding,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Resolving finding {}", finding.id);

    let identifier = AwsSecurityFindingIdentifier::builder()
        .id(&finding.id)
        .product_arn(&finding.product_arn)
        .build();
    let note = NoteUpdate::builder()
        .text(&finding.description)
        .updated_by("string")
        .build();
    let severity = SeverityUpdate::builder()
        .label(SeverityLabel::Informational)
        .product(0.0)
        .build();
    let workflow = WorkflowUpdate::builder()
        .status(WorkflowStatus::Resolved)
        .build();

    client
        .batch_update_findings()
        .finding_identifiers(identifier)
        .note(note)
        .severity(severity)
        .confidence(100)
        .set_types(Some(finding.types.clone()))
        .workflow(workflow)
        .send()
        .await?;

    Ok(())
}

fn to_sdk_finding(finding: &Finding) -> Result<AwsSecurityFinding, BuildError> {
    let severity = Severity::builder()
        .label(SeverityLabel::from(finding.severity.label.as_str()))
        .product(finding.severity.product as f64)
        .build();
    let compliance = Compliance::builder()
        .status(ComplianceStatus::from(finding.compliance.status.as_str()))
        .build();

    let mut resources = Vec::new();
    for resource in &finding.resources {
        let mut builder = Resource::builder()
            .r#type(&resource.resource_type)
            .id(&resource.id);
        if let Some(partition) = &resource.partition {
            builder = builder.partition(Partition::from(partition.as_str()));
        }
        if let Some(region) = &resource.region {
            builder = builder.region(region);
        }
        if let Some(tags) = &resource.tags {
            builder = builder.tags("Source", &tags.source);
        }
        resources.push(builder.build());
    }

    Ok(AwsSecurityFinding::builder()
        .schema_version(&finding.schema_version)
        .id(&finding.id)
        .product_arn(&finding.product_arn)
        .generator_id(&finding.generator_id)
        .aws_account_id(&finding.aws_account_id)
        .set_types(Some(finding.types.clone()))
        .created_at(&finding.created_at)
        .updated_at(&finding.updated_at)
        .severity(severity)
        .compliance(compliance)
        .title(&finding.title)
        .description(&finding.description)
        .set_resources(Some(resources))
        .build())
}
