//! CloudFormation template rendering

use crate::error::{Result, SiteError};
use crate::model::TargetEnvironment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

const TEMPLATE_VERSION: &str = "2010-09-09";

/// A single stack ready to hand to CloudFormation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackTemplate {
    pub stack_name: String,

    pub environment: TargetEnvironment,

    pub description: String,

    resources: Map<String, Value>,

    outputs: Map<String, Value>,
}

impl StackTemplate {
    pub fn new(
        stack_name: impl Into<String>,
        environment: TargetEnvironment,
        description: impl Into<String>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            environment,
            description: description.into(),
            resources: Map::new(),
            outputs: Map::new(),
        }
    }

    /// Add a resource with only `Type` and `Properties`
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource_type: &str,
        properties: Value,
    ) -> &mut Self {
        self.resources.insert(
            logical_id.into(),
            json!({ "Type": resource_type, "Properties": properties }),
        );
        self
    }

    /// Add a fully formed resource body (for `DependsOn`, `DeletionPolicy`, ...)
    pub fn add_raw_resource(&mut self, logical_id: impl Into<String>, body: Value) -> &mut Self {
        self.resources.insert(logical_id.into(), body);
        self
    }

    /// Add a stack output, optionally exported for cross-stack import
    pub fn add_output(
        &mut self,
        key: impl Into<String>,
        value: Value,
        export_name: Option<String>,
    ) -> &mut Self {
        let mut output = json!({ "Value": value });
        if let Some(name) = export_name {
            output["Export"] = json!({ "Name": name });
        }
        self.outputs.insert(key.into(), output);
        self
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// All resources of a CloudFormation type, in insertion-independent order
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&String, &Value)> {
        self.resources
            .iter()
            .filter(|(_, r)| r["Type"] == resource_type)
            .collect()
    }

    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    /// The template document
    pub fn body(&self) -> Value {
        let mut body = json!({
            "AWSTemplateFormatVersion": TEMPLATE_VERSION,
            "Description": self.description,
            "Resources": self.resources,
        });
        if !self.outputs.is_empty() {
            body["Outputs"] = Value::Object(self.outputs.clone());
        }
        body
    }

    pub fn render(&self, format: TemplateFormat) -> Result<String> {
        let body = self.body();
        let rendered = match format {
            TemplateFormat::Json => serde_json::to_string_pretty(&body)?,
            TemplateFormat::Yaml => serde_yaml::to_string(&body)?,
        };
        Ok(rendered)
    }

    pub fn file_name(&self, format: TemplateFormat) -> String {
        format!("{}.template.{}", self.stack_name, format.extension())
    }
}

/// Output format for rendered templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TemplateFormat {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(TemplateFormat::Json),
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            other => Err(SiteError::InvalidConfig(format!(
                "unknown template format '{other}' (expected json or yaml)"
            ))),
        }
    }
}

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}
