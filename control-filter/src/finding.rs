use asff::{Compliance, Finding, FindingResource, ResourceTags, SCHEMA_VERSION, Severity};

use crate::message::{AwsMetadata, Control};

// Account that owns the turbot/turbot product registration in Security Hub.
const PRODUCT_ACCOUNT_ID: &str = "453761072151";
const FINDING_TYPE: &str = "Software and Configuration Checks/Governance/Out of Compliance";
const SOURCE_TAG: &str = "Turbot-Sec-Hub-Integration";

/// Builds the ASFF finding for an admitted control event. Deterministic:
/// every field derives from the event payload and the fetched akas, never
/// from the wall clock or any ambient state.
pub fn convert_to_asff(
    timestamp: &str,
    control: &Control,
    aws_metadata: &AwsMetadata,
    resource_akas: &[String],
    home_region: &str,
) -> Finding {
    let region = aws_metadata.region_name.as_deref().unwrap_or("global");
    let finding_id = format!(
        "arn:aws:securityhub:{}:{}:turbot/{}",
        region, aws_metadata.account_id, control.turbot.id
    );

    let mut resources: Vec<FindingResource> = resource_akas
        .iter()
        .map(|aka| FindingResource {
            resource_type: "Resource AKA".to_string(),
            id: aka.clone(),
            partition: aws_metadata.partition.clone(),
            region: aws_metadata.region_name.clone(),
            tags: Some(ResourceTags {
                source: SOURCE_TAG.to_string(),
            }),
        })
        .collect();
    resources.push(FindingResource {
        resource_type: "Resource ID".to_string(),
        id: finding_id.clone(),
        partition: None,
        region: None,
        tags: None,
    });

    let trunk_title = &control.control_type.trunk.title;
    let ruleset = trunk_title
        .replace(" > ", "-")
        .replace(' ', "-")
        .to_lowercase();

    Finding {
        schema_version: SCHEMA_VERSION.to_string(),
        id: finding_id,
        product_arn: format!(
            "arn:aws:securityhub:{}:{}:product/turbot/turbot",
            home_region, PRODUCT_ACCOUNT_ID
        ),
        generator_id: format!("arn:aws:securityhub:::ruleset/turbot/{}", ruleset),
        aws_account_id: aws_metadata.account_id.clone(),
        types: vec![FINDING_TYPE.to_string()],
        created_at: timestamp.to_string(),
        updated_at: timestamp.to_string(),
        severity: Severity {
            label: "HIGH".to_string(),
            product: 80,
        },
        compliance: Compliance {
            status: "WARNING".to_string(),
        },
        // Always the Alarm prefix, whatever the control state. The relay
        // branches on the text before the first colon of this title.
        title: format!("Alarm: {}", trunk_title),
        description: control
            .reason
            .clone()
            .unwrap_or_else(|| "No reason given".to_string()),
        resources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ControlMeta, ControlResource, ControlState, ControlType, ResourceMetadata, Trunk};

    fn control(state: &str, reason: Option<&str>) -> Control {
        Control {
            state: ControlState::from(state.to_string()),
            reason: reason.map(str::to_string),
            control_type: ControlType {
                trunk: Trunk {
                    title: "AWS > S3 > Bucket > Approved".to_string(),
                },
            },
            turbot: ControlMeta {
                id: "213971925119603".to_string(),
            },
            resource: ControlResource {
                metadata: ResourceMetadata { aws: None },
            },
        }
    }

    fn aws_metadata() -> AwsMetadata {
        AwsMetadata {
            account_id: "133534076130".to_string(),
            partition: Some("aws".to_string()),
            region_name: Some("us-east-2".to_string()),
        }
    }

    const TIMESTAMP: &str = "2021-02-11T00:36:24.987Z";

    #[test]
    fn builds_the_finding_for_a_genuine_alarm() {
        let akas = vec!["arn:aws:s3:::raj-switch-role-bucket".to_string()];
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("alarm", Some("Not approved")),
            &aws_metadata(),
            &akas,
            "us-east-2",
        );

        assert_eq!(
            finding.id,
            "arn:aws:securityhub:us-east-2:133534076130:turbot/213971925119603"
        );
        assert_eq!(
            finding.product_arn,
            "arn:aws:securityhub:us-east-2:453761072151:product/turbot/turbot"
        );
        assert_eq!(finding.title, "Alarm: AWS > S3 > Bucket > Approved");
        assert_eq!(finding.description, "Not approved");
        assert_eq!(finding.severity.label, "HIGH");
        assert_eq!(finding.severity.product, 80);
        assert_eq!(finding.compliance.status, "WARNING");
        assert_eq!(finding.created_at, TIMESTAMP);
        assert_eq!(finding.updated_at, TIMESTAMP);
    }

    #[test]
    fn one_resource_entry_per_aka_plus_the_synthetic_id_entry() {
        let akas = vec![
            "arn:aws:s3:::bucket-one".to_string(),
            "arn:aws:s3:::bucket-two".to_string(),
        ];
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("alarm", Some("Not approved")),
            &aws_metadata(),
            &akas,
            "us-east-2",
        );

        assert_eq!(finding.resources.len(), 3);
        assert_eq!(finding.resources[0].resource_type, "Resource AKA");
        assert_eq!(finding.resources[0].id, "arn:aws:s3:::bucket-one");
        assert_eq!(finding.resources[0].partition.as_deref(), Some("aws"));
        assert_eq!(finding.resources[0].region.as_deref(), Some("us-east-2"));
        assert_eq!(
            finding.resources[0].tags.as_ref().unwrap().source,
            "Turbot-Sec-Hub-Integration"
        );

        let synthetic = finding.resources.last().unwrap();
        assert_eq!(synthetic.resource_type, "Resource ID");
        assert_eq!(synthetic.id, finding.id);
        assert!(synthetic.tags.is_none());
    }

    #[test]
    fn missing_region_defaults_to_the_literal_global() {
        let metadata = AwsMetadata {
            account_id: "133534076130".to_string(),
            partition: None,
            region_name: None,
        };
        let akas = vec!["arn:aws:iam::133534076130:root".to_string()];
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("alarm", Some("Not approved")),
            &metadata,
            &akas,
            "us-east-2",
        );

        assert_eq!(
            finding.id,
            "arn:aws:securityhub:global:133534076130:turbot/213971925119603"
        );
        assert!(finding.resources[0].partition.is_none());
        assert!(finding.resources[0].region.is_none());
    }

    #[test]
    fn missing_reason_falls_back_to_the_fixed_text() {
        let finding = convert_to_asff(TIMESTAMP, &control("alarm", None), &aws_metadata(), &[], "us-east-2");
        assert_eq!(finding.description, "No reason given");
    }

    #[test]
    fn title_keeps_the_alarm_prefix_even_for_an_ok_event() {
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("ok", Some("Approved")),
            &aws_metadata(),
            &[],
            "us-east-2",
        );
        assert_eq!(finding.title, "Alarm: AWS > S3 > Bucket > Approved");
    }

    #[test]
    fn generator_id_is_the_slugged_trunk_title() {
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("alarm", Some("Not approved")),
            &aws_metadata(),
            &[],
            "us-east-2",
        );
        assert_eq!(
            finding.generator_id,
            "arn:aws:securityhub:::ruleset/turbot/aws-s3-bucket-approved"
        );
    }

    #[test]
    fn no_akas_still_yields_the_synthetic_entry() {
        let finding = convert_to_asff(
            TIMESTAMP,
            &control("alarm", Some("Not approved")),
            &aws_metadata(),
            &[],
            "us-east-2",
        );
        assert_eq!(finding.resources.len(), 1);
        assert_eq!(finding.resources[0].resource_type, "Resource ID");
    }
}
