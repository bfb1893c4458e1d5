//! aws CLI wrapper
//!
//! Wraps the `aws` commands siteflow needs. Every call asks for JSON output
//! and parses it with the response types below.

use crate::error::{AwsError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const STACK_CAPABILITIES: &[&str] = &["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// aws CLI wrapper bound to a default region
pub struct AwsCli {
    region: String,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check if the aws CLI is installed and has credentials
    pub async fn check_auth(&self) -> Result<CallerIdentity> {
        let which = Command::new("which").arg("aws").output().await?;

        if !which.status.success() {
            return Err(AwsError::CliNotFound);
        }

        let output = self
            .run_command(None, &["sts", "get-caller-identity", "--output", "json"])
            .await
            .map_err(|e| match e {
                AwsError::CommandFailed(msg) => AwsError::AuthenticationFailed(msg),
                other => other,
            })?;

        Ok(serde_json::from_str(&output)?)
    }

    /// Run an aws command and return stdout
    async fn run_command(&self, region: Option<&str>, args: &[&str]) -> Result<String> {
        let region = region.unwrap_or(&self.region);

        let mut cmd = Command::new("aws");
        cmd.arg("--region").arg(region);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: aws --region {} {}", region, args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AwsError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Describe a stack, `None` when it does not exist
    pub async fn describe_stack(
        &self,
        stack_name: &str,
        region: &str,
    ) -> Result<Option<StackDescription>> {
        let result = self
            .run_command(
                Some(region),
                &[
                    "cloudformation",
                    "describe-stacks",
                    "--stack-name",
                    stack_name,
                    "--output",
                    "json",
                ],
            )
            .await;

        match result {
            Ok(output) => parse_describe_stacks(&output),
            Err(AwsError::CommandFailed(msg)) if msg.contains("does not exist") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Currently deployed template body
    pub async fn get_template(&self, stack_name: &str, region: &str) -> Result<serde_json::Value> {
        let output = self
            .run_command(
                Some(region),
                &[
                    "cloudformation",
                    "get-template",
                    "--stack-name",
                    stack_name,
                    "--output",
                    "json",
                ],
            )
            .await?;

        parse_template_body(&output)
    }

    /// Create or update a stack from a template body and wait for completion
    pub async fn deploy_stack(
        &self,
        stack_name: &str,
        region: &str,
        template: &serde_json::Value,
    ) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("siteflow-")
            .suffix(".template.json")
            .tempfile()?;
        file.write_all(serde_json::to_string_pretty(template)?.as_bytes())?;
        file.flush()?;

        let template_path = file.path().to_string_lossy().to_string();
        let mut args = vec![
            "cloudformation",
            "deploy",
            "--stack-name",
            stack_name,
            "--template-file",
            template_path.as_str(),
            "--no-fail-on-empty-changeset",
            "--capabilities",
        ];
        args.extend_from_slice(STACK_CAPABILITIES);

        self.run_command(Some(region), &args).await?;
        Ok(())
    }

    /// `aws s3 sync <dir> s3://<bucket>`
    pub async fn s3_sync(&self, source_dir: &Path, bucket: &str) -> Result<()> {
        let source = source_dir.to_string_lossy().to_string();
        let target = format!("s3://{bucket}");
        self.run_command(None, &["s3", "sync", source.as_str(), target.as_str()])
            .await?;
        Ok(())
    }

    pub async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<Invalidation> {
        let mut args = vec![
            "cloudfront",
            "create-invalidation",
            "--distribution-id",
            distribution_id,
            "--output",
            "json",
            "--paths",
        ];
        args.extend(paths.iter().map(String::as_str));

        let output = self.run_command(None, &args).await?;
        let response: CreateInvalidationResponse = serde_json::from_str(&output)?;
        Ok(response.invalidation)
    }

    /// Hosted zone whose name is exactly `domain`
    pub async fn find_hosted_zone(&self, domain: &str) -> Result<Option<HostedZoneInfo>> {
        let output = self
            .run_command(
                None,
                &[
                    "route53",
                    "list-hosted-zones-by-name",
                    "--dns-name",
                    domain,
                    "--max-items",
                    "1",
                    "--output",
                    "json",
                ],
            )
            .await?;

        parse_hosted_zone(&output, domain)
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String> {
        let output = self
            .run_command(
                None,
                &[
                    "ssm",
                    "get-parameter",
                    "--name",
                    name,
                    "--with-decryption",
                    "--output",
                    "json",
                ],
            )
            .await?;

        let response: GetParameterResponse = serde_json::from_str(&output)?;
        Ok(response.parameter.value)
    }
}

/// `sts get-caller-identity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "Arn")]
    pub arn: String,

    #[serde(rename = "UserId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DescribeStacksResponse {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDescription {
    #[serde(rename = "StackName")]
    pub stack_name: String,

    #[serde(rename = "StackStatus")]
    pub stack_status: String,

    #[serde(rename = "Outputs", default)]
    pub outputs: Vec<StackOutput>,
}

impl StackDescription {
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.output_key == key)
            .map(|o| o.output_value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutput {
    #[serde(rename = "OutputKey")]
    pub output_key: String,

    #[serde(rename = "OutputValue")]
    pub output_value: String,

    #[serde(rename = "ExportName")]
    pub export_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateInvalidationResponse {
    #[serde(rename = "Invalidation")]
    invalidation: Invalidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invalidation {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ListHostedZonesResponse {
    #[serde(rename = "HostedZones", default)]
    hosted_zones: Vec<HostedZoneInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZoneInfo {
    /// `/hostedzone/Z...`
    #[serde(rename = "Id")]
    pub id: String,

    /// Fully qualified, with the trailing dot
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GetParameterResponse {
    #[serde(rename = "Parameter")]
    parameter: Parameter,
}

#[derive(Debug, Clone, Deserialize)]
struct Parameter {
    #[serde(rename = "Value")]
    value: String,
}

fn parse_describe_stacks(output: &str) -> Result<Option<StackDescription>> {
    let response: DescribeStacksResponse = serde_json::from_str(output)?;
    Ok(response.stacks.into_iter().next())
}

/// The CLI returns JSON bodies as objects and YAML bodies as strings
fn parse_template_body(output: &str) -> Result<serde_json::Value> {
    let response: serde_json::Value = serde_json::from_str(output)?;
    match response.get("TemplateBody") {
        Some(serde_json::Value::String(body)) => Ok(serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.clone()))),
        Some(body) => Ok(body.clone()),
        None => Err(AwsError::UnexpectedOutput(
            "get-template response has no TemplateBody".to_string(),
        )),
    }
}

/// `list-hosted-zones-by-name` returns zones at or after the name, so the
/// first entry only counts when it matches exactly.
fn parse_hosted_zone(output: &str, domain: &str) -> Result<Option<HostedZoneInfo>> {
    let response: ListHostedZonesResponse = serde_json::from_str(output)?;
    let wanted = domain.trim_end_matches('.');
    Ok(response
        .hosted_zones
        .into_iter()
        .find(|z| z.name.trim_end_matches('.').eq_ignore_ascii_case(wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_describe_stacks() {
        let output = r#"{
            "Stacks": [{
                "StackName": "dev-ExampleSiteCloudFrontStack-dev",
                "StackStatus": "UPDATE_COMPLETE",
                "Outputs": [
                    {
                        "OutputKey": "CloudFrontDistributionId",
                        "OutputValue": "E2QWRUHEXAMPLE",
                        "ExportName": "CloudFrontDistributionId-dev"
                    },
                    { "OutputKey": "BucketName", "OutputValue": "dev-assets" }
                ]
            }]
        }"#;

        let stack = parse_describe_stacks(output).unwrap().unwrap();
        assert_eq!(stack.stack_status, "UPDATE_COMPLETE");
        assert_eq!(stack.output("CloudFrontDistributionId"), Some("E2QWRUHEXAMPLE"));
        assert_eq!(stack.output("Missing"), None);
    }

    #[test]
    fn test_parse_stack_without_outputs() {
        let output = r#"{ "Stacks": [{ "StackName": "s", "StackStatus": "CREATE_IN_PROGRESS" }] }"#;
        let stack = parse_describe_stacks(output).unwrap().unwrap();
        assert!(stack.outputs.is_empty());
    }

    #[test]
    fn test_parse_template_body_object_and_string() {
        let object = r#"{ "TemplateBody": { "Resources": {} } }"#;
        assert!(parse_template_body(object).unwrap()["Resources"].is_object());

        let string = r#"{ "TemplateBody": "{\"Resources\": {\"A\": 1}}" }"#;
        assert_eq!(parse_template_body(string).unwrap()["Resources"]["A"], 1);

        let yaml = r#"{ "TemplateBody": "Resources: {}" }"#;
        assert!(parse_template_body(yaml).unwrap().is_string());

        assert!(parse_template_body("{}").is_err());
    }

    #[test]
    fn test_parse_hosted_zone_exact_match() {
        let output = r#"{
            "HostedZones": [
                { "Id": "/hostedzone/Z0123456789", "Name": "example.com." }
            ]
        }"#;
        let zone = parse_hosted_zone(output, "example.com").unwrap().unwrap();
        assert_eq!(zone.id, "/hostedzone/Z0123456789");

        assert!(parse_hosted_zone(output, "example.org").unwrap().is_none());
    }

    #[test]
    fn test_parse_hosted_zone_skips_later_zones() {
        let output = r#"{ "HostedZones": [{ "Id": "/hostedzone/Z9", "Name": "examples.com." }] }"#;
        assert!(parse_hosted_zone(output, "example.com").unwrap().is_none());
    }

    #[test]
    fn test_parse_invalidation() {
        let output = r#"{
            "Location": "https://cloudfront.amazonaws.com/2020-05-31/distribution/E2/invalidation/I2",
            "Invalidation": { "Id": "I2J0I21PCUYOIK", "Status": "InProgress" }
        }"#;
        let response: CreateInvalidationResponse = serde_json::from_str(output).unwrap();
        assert_eq!(response.invalidation.id, "I2J0I21PCUYOIK");
    }

    #[test]
    fn test_parse_parameter() {
        let output = r#"{ "Parameter": { "Name": "/site/dev/client-id", "Type": "String", "Value": "abc" } }"#;
        let response: GetParameterResponse = serde_json::from_str(output).unwrap();
        assert_eq!(response.parameter.value, "abc");
    }
}
