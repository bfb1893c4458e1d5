//! Companion compute unit: a Lambda behind an IAM-authorized REST API

use crate::cfn::{StackTemplate, get_att, reference, sub};
use crate::model::{StageName, TargetEnvironment};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const FUNCTION_RUNTIME: &str = "python3.12";
pub const FUNCTION_HANDLER: &str = "index.lambda_handler";
pub const FUNCTION_MEMORY_MB: u32 = 128;
pub const FUNCTION_TIMEOUT_SECS: u32 = 300;
pub const ALIAS_NAME: &str = "live";
pub const API_RESOURCE_PATH: &str = "hello";

/// Stack output holding the API domain
pub const API_DOMAIN_OUTPUT: &str = "ApiDomain";

pub const HANDLER_CODE: &str = r#"import json
import os


def lambda_handler(event, context):
    print("Received event:", json.dumps(event, indent=2))
    print(f"ENV_VARIABLE: {os.getenv('ENV_VARIABLE')}")

    return {
        "statusCode": 200,
        "body": json.dumps({"message": "Hello from inline Python Lambda!"}),
    }
"#;

const ROLE: &str = "FunctionRole";
const FUNCTION: &str = "Function";
const VERSION: &str = "FunctionVersion";
const ALIAS: &str = "FunctionAlias";
const API: &str = "RestApi";
const RESOURCE: &str = "HelloResource";
const METHOD: &str = "HelloGet";
const DEPLOYMENT: &str = "ApiDeployment";
const API_STAGE: &str = "ApiStage";
const PERMISSION: &str = "InvokePermission";

pub fn compute_stack_name(application: &str, stage: StageName) -> String {
    format!("{stage}-{application}LambdaStack-{stage}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeUnit {
    pub application: String,

    pub stage: StageName,

    pub environment: TargetEnvironment,

    /// Domain the API is published under (`api.ecs.{stage}.{apex}`)
    pub api_domain: String,
}

impl ComputeUnit {
    pub fn stack_name(&self) -> String {
        compute_stack_name(&self.application, self.stage)
    }

    pub fn function_name(&self) -> String {
        format!("{}-{}", self.application, self.stage)
    }

    pub fn template(&self) -> StackTemplate {
        let mut template = StackTemplate::new(
            self.stack_name(),
            self.environment.clone(),
            format!("Create {} Lambda, API Gateway", self.application),
        );

        template.add_resource(
            ROLE,
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }]
                },
                "ManagedPolicyArns": [
                    sub("arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole")
                ]
            }),
        );

        template.add_raw_resource(
            FUNCTION,
            json!({
                "Type": "AWS::Lambda::Function",
                "DependsOn": [ROLE],
                "Properties": {
                    "FunctionName": self.function_name(),
                    "Runtime": FUNCTION_RUNTIME,
                    "Handler": FUNCTION_HANDLER,
                    "Code": { "ZipFile": HANDLER_CODE },
                    "Role": get_att(ROLE, "Arn"),
                    "Architectures": ["arm64"],
                    "MemorySize": FUNCTION_MEMORY_MB,
                    "Timeout": FUNCTION_TIMEOUT_SECS,
                    "Environment": {
                        "Variables": { "ENV_VARIABLE": self.stage.as_str() }
                    },
                    "SnapStart": { "ApplyOn": "PublishedVersions" },
                    "Tags": [
                        { "Key": "Project", "Value": self.application },
                        { "Key": "Environment", "Value": self.stage.as_str() }
                    ]
                }
            }),
        );

        template.add_resource(
            VERSION,
            "AWS::Lambda::Version",
            json!({ "FunctionName": reference(FUNCTION) }),
        );

        template.add_resource(
            ALIAS,
            "AWS::Lambda::Alias",
            json!({
                "FunctionName": reference(FUNCTION),
                "FunctionVersion": get_att(VERSION, "Version"),
                "Name": ALIAS_NAME
            }),
        );

        template.add_resource(
            API,
            "AWS::ApiGateway::RestApi",
            json!({
                "Name": self.function_name(),
                "Description": "This service handles requests with Lambda.",
                "Tags": [{ "Key": "CostCenter", "Value": "LambdaService" }]
            }),
        );

        template.add_resource(
            RESOURCE,
            "AWS::ApiGateway::Resource",
            json!({
                "RestApiId": reference(API),
                "ParentId": get_att(API, "RootResourceId"),
                "PathPart": API_RESOURCE_PATH
            }),
        );

        template.add_resource(
            METHOD,
            "AWS::ApiGateway::Method",
            json!({
                "RestApiId": reference(API),
                "ResourceId": reference(RESOURCE),
                "HttpMethod": "GET",
                "AuthorizationType": "AWS_IAM",
                "Integration": {
                    "Type": "AWS_PROXY",
                    "IntegrationHttpMethod": "POST",
                    "Uri": sub(&format!(
                        "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{ALIAS}}}/invocations"
                    ))
                }
            }),
        );

        template.add_raw_resource(
            DEPLOYMENT,
            json!({
                "Type": "AWS::ApiGateway::Deployment",
                "DependsOn": [METHOD],
                "Properties": { "RestApiId": reference(API) }
            }),
        );

        template.add_resource(
            API_STAGE,
            "AWS::ApiGateway::Stage",
            json!({
                "RestApiId": reference(API),
                "DeploymentId": reference(DEPLOYMENT),
                "StageName": self.stage.as_str()
            }),
        );

        template.add_resource(
            PERMISSION,
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": reference(ALIAS),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": sub(&format!(
                    "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{API}}}/*/GET/{API_RESOURCE_PATH}"
                ))
            }),
        );

        template.add_output(API_DOMAIN_OUTPUT, json!(self.api_domain), None);

        template
    }
}
