//! Shared TLS certificate, created once and imported by every hosting stack

use crate::cfn::{StackTemplate, reference, sub};
use crate::model::{HostedZone, SiteConfig, TargetEnvironment};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// CloudFront only accepts certificates from this region
pub const CERTIFICATE_REGION: &str = "us-east-1";

const CERTIFICATE: &str = "Certificate";
const PIPELINE_ROLE: &str = "PipelineRole";
const ASSETS_POLICY: &str = "PipelineAssetsPolicy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateUnit {
    pub application: String,

    pub environment: TargetEnvironment,

    pub apex_domain: String,

    pub hosted_zone: HostedZone,

    /// Export name consumed by hosting stacks
    pub export_name: String,

    /// Buckets the pipeline role may read and write
    pub asset_buckets: Vec<String>,
}

impl CertificateUnit {
    pub fn new(config: &SiteConfig, hosted_zone: HostedZone, asset_buckets: Vec<String>) -> Self {
        Self {
            application: config.application.clone(),
            environment: TargetEnvironment::new(config.account.clone(), CERTIFICATE_REGION),
            apex_domain: config.apex_domain.clone(),
            hosted_zone,
            export_name: config.certificate_export(),
            asset_buckets,
        }
    }

    pub fn stack_name(&self) -> String {
        format!("{}PipelineStack", self.application)
    }

    /// Names covered by the certificate: the apex and one wildcard level
    pub fn subject_names(&self) -> Vec<String> {
        vec![self.apex_domain.clone(), format!("*.{}", self.apex_domain)]
    }

    pub fn template(&self) -> StackTemplate {
        let mut template = StackTemplate::new(
            self.stack_name(),
            self.environment.clone(),
            format!("{} shared certificate and pipeline role", self.application),
        );

        let validation: Vec<_> = self
            .subject_names()
            .iter()
            .map(|name| json!({ "DomainName": name, "HostedZoneId": self.hosted_zone.id }))
            .collect();

        template.add_resource(
            CERTIFICATE,
            "AWS::CertificateManager::Certificate",
            json!({
                "DomainName": self.apex_domain,
                "SubjectAlternativeNames": [format!("*.{}", self.apex_domain)],
                "ValidationMethod": "DNS",
                "DomainValidationOptions": validation
            }),
        );

        template.add_resource(
            PIPELINE_ROLE,
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "codebuild.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                }
            }),
        );

        if !self.asset_buckets.is_empty() {
            let resources: Vec<_> = self
                .asset_buckets
                .iter()
                .flat_map(|bucket| {
                    [
                        sub(&format!("arn:${{AWS::Partition}}:s3:::{bucket}")),
                        sub(&format!("arn:${{AWS::Partition}}:s3:::{bucket}/*")),
                    ]
                })
                .collect();

            template.add_resource(
                ASSETS_POLICY,
                "AWS::IAM::Policy",
                json!({
                    "PolicyName": format!("{}-assets", self.application),
                    "Roles": [reference(PIPELINE_ROLE)],
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": ["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
                            "Resource": resources
                        }]
                    }
                }),
            );
        }

        template.add_output(
            "CertificateArn",
            reference(CERTIFICATE),
            Some(self.export_name.clone()),
        );

        template
    }
}
