mod admission;
mod config;
mod finding;
mod message;
mod turbot;

use std::collections::HashMap;

use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::MessageAttributeValue;
use tracing_subscriber::filter;

use crate::admission::Verdict;
use crate::config::Settings;
use crate::message::AwsMetadata;
use crate::turbot::{ControlLookup, GraphQl};

struct ControlRecord {
    pub body: String,
    pub receipt_handle: String,
}

// What to do with the inbound record once processing finished. Consumed
// records are deleted; retained ones are left for SQS redelivery.
enum Disposition {
    Consume,
    Retain,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_level(true)
        .with_max_level(filter::LevelFilter::INFO)
        .init();

    let settings = Settings::from_env();
    let aws_config = aws_config::load_from_env().await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let ssm_client = aws_sdk_ssm::Client::new(&aws_config);

    loop {
        let records = receive_control_notifications(&sqs_client, &settings.raw_alarms_queue_url)
            .await
            .unwrap_or_else(|err| {
                tracing::error!("Error receiving control notifications: {}", err);
                Vec::new()
            });

        if !records.is_empty() {
            // one workspace lookup per batch, never per record
            match config::load_workspace(&ssm_client, &settings.workspace_name).await {
                Ok(workspace) => {
                    let gql = GraphQl::new(workspace);
                    for record in records {
                        if let Disposition::Consume =
                            process_record(&record.body, &gql, &sqs_client, &settings).await
                        {
                            delete_message(
                                &sqs_client,
                                &settings.raw_alarms_queue_url,
                                &record.receipt_handle,
                            )
                            .await
                            .unwrap_or_else(|err| {
                                tracing::error!("Error deleting message: {}", err);
                            });
                        }
                    }
                }
                Err(err) => {
                    // without workspace credentials no record in this batch can
                    // be validated; all of them stay queued for redelivery
                    tracing::error!("Failed to load workspace configuration: {}", err);
                }
            }
        }

        // Sleep for a while before checking the queue again
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
}

async fn receive_control_notifications(
    client: &Client,
    queue_url: &str,
) -> Result<Vec<ControlRecord>, aws_sdk_sqs::Error> {
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

        records.push(ControlRecord {
            body,
            receipt_handle: message.receipt_handle.unwrap_or_default(),
        });
    }

    Ok(records)
}

// One record, processed to completion in isolation. Nothing that happens in
// here may take down the rest of the batch.
async fn process_record(
    body: &str,
    gql: &GraphQl,
    sqs_client: &Client,
    settings: &Settings,
) -> Disposition {
    let notification = match message::unwrap_notification(body) {
        Ok(notification) => notification,
        Err(err) => {
            tracing::warn!("Discarding record with malformed body: {}", err);
            return Disposition::Consume;
        }
    };

    if notification.notification_type != "control_updated" {
        tracing::info!(
            "Ignoring record, notification type: {}",
            notification.notification_type
        );
        return Disposition::Consume;
    }

    let control = &notification.control;
    let aws_metadata = match &control.resource.metadata.aws {
        Some(aws_metadata) => aws_metadata,
        None => {
            tracing::info!("Ignoring record, cloud provider is not AWS");
            return Disposition::Consume;
        }
    };

    let (current_state, resource_akas) = match gql.get_control(&control.turbot.id).await {
        Ok(ControlLookup::Found { state, akas }) => (state, akas),
        Ok(ControlLookup::NotFound) => {
            tracing::info!(
                "Control {} not found in workspace, skipping event",
                control.turbot.id
            );
            return Disposition::Consume;
        }
        Err(err) => {
            tracing::error!(
                "Control {} lookup failed, leaving record for redelivery: {}",
                control.turbot.id,
                err
            );
            return Disposition::Retain;
        }
    };

    let old_state = notification.old_state();
    match admission::evaluate(&control.state, &current_state, &old_state) {
        Verdict::StaleEvent => {
            tracing::info!(
                "Filter: control states do not match, skipping event (current: {} | event: {})",
                current_state,
                control.state
            );
            return Disposition::Consume;
        }
        Verdict::NoTransition => {
            tracing::info!(
                "Filter: control state has not changed, skipping event (event: {} | old: {})",
                control.state,
                old_state
            );
            return Disposition::Consume;
        }
        Verdict::NotReportable => {
            tracing::info!(
                "Filter: control state is not alarm or ok, skipping event (event: {})",
                control.state
            );
            return Disposition::Consume;
        }
        Verdict::NotAResolution => {
            tracing::info!(
                "Filter: control is ok but previous state was not alarm, skipping event (event: {} | old: {})",
                control.state,
                old_state
            );
            return Disposition::Consume;
        }
        Verdict::Admit => {
            tracing::info!("Filter: control {} passes all filters", control.turbot.id);
        }
    }

    let finding = finding::convert_to_asff(
        &notification.turbot.create_timestamp,
        control,
        aws_metadata,
        &resource_akas,
        &settings.aws_region,
    );

    if let Err(err) = send_finding(sqs_client, &settings.findings_queue_url, &finding, aws_metadata).await
    {
        tracing::error!(
            "Could not send finding {} to {}, finding dropped: {}",
            finding.id,
            settings.findings_queue_url,
            err
        );
    }

    Disposition::Consume
}

async fn send_finding(
    client: &Client,
    queue_url: &str,
    finding: &asff::Finding,
    aws_metadata: &AwsMetadata,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut attributes = HashMap::new();
    attributes.insert(
        "account".to_string(),
        string_attribute(&aws_metadata.account_id)?,
    );
    if let Some(partition) = &aws_metadata.partition {
        attributes.insert("partition".to_string(), string_attribute(partition)?);
    }
    if let Some(region) = &aws_metadata.region_name {
        attributes.insert("region".to_string(), string_attribute(region)?);
    }

    let body = serde_json::to_string(finding)?;
    tracing::info!("Sending finding {} to SQS queue: {}", finding.id, queue_url);

    client
        .send_message()
        .queue_url(queue_url)
        .set_message_attributes(Some(attributes))
        .message_body(body)
        .send()
        .await?;

    Ok(())
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, aws_sdk_sqs::error::BuildError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
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
