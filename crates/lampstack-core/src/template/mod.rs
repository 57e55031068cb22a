//! Provider template model.
//!
//! A `Template` is the resource graph of one stack: parameters, resources and
//! outputs keyed by logical id. All maps are `BTreeMap`s and resource
//! properties are `serde_json::Value`s (sorted keys), so rendering the same
//! template twice is byte-identical.

pub mod intrinsic;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::{LampstackError, Result};

/// Template format version emitted in every template.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Maximum logical id length accepted by the provider.
pub const MAX_LOGICAL_ID_LEN: usize = 255;

/// Logical ids must be non-empty ASCII alphanumerics.
pub fn validate_logical_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_LOGICAL_ID_LEN {
        return Err(LampstackError::InvalidTemplate(format!(
            "logical id must be 1..={MAX_LOGICAL_ID_LEN} chars: {id:?}"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LampstackError::InvalidTemplate(format!(
            "logical id must be alphanumeric: {id:?}"
        )));
    }
    Ok(())
}

/// A single resource declaration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    /// Build a resource from any serializable property struct.
    pub fn new<P: Serialize>(resource_type: &str, properties: &P) -> Result<Self> {
        Ok(Self {
            resource_type: resource_type.to_string(),
            properties: serde_json::to_value(properties)?,
            depends_on: Vec::new(),
        })
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
        self
    }
}

/// Template input parameter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: String,
}

/// Stack output, optionally exported for cross-stack `Fn::ImportValue`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self { value, description: None, export: None }
    }

    pub fn exported_as(mut self, name: &str) -> Self {
        self.export = Some(Export { name: name.to_string() });
        self
    }
}

/// One stack's resource graph.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,
    resources: BTreeMap<String, Resource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION,
            description,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Add a resource. Duplicate or malformed logical ids are rejected.
    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<()> {
        validate_logical_id(logical_id)?;
        if self.resources.contains_key(logical_id) {
            return Err(LampstackError::InvalidTemplate(format!(
                "duplicate resource logical id: {logical_id}"
            )));
        }
        tracing::debug!(%logical_id, resource_type = %resource.resource_type, "resource added");
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_parameter(&mut self, logical_id: &str, parameter: Parameter) -> Result<()> {
        validate_logical_id(logical_id)?;
        if self.parameters.contains_key(logical_id) {
            return Err(LampstackError::InvalidTemplate(format!(
                "duplicate parameter: {logical_id}"
            )));
        }
        self.parameters.insert(logical_id.to_string(), parameter);
        Ok(())
    }

    /// Add an output. Export names must be unique within the template.
    pub fn add_output(&mut self, logical_id: &str, output: Output) -> Result<()> {
        validate_logical_id(logical_id)?;
        if self.outputs.contains_key(logical_id) {
            return Err(LampstackError::InvalidTemplate(format!(
                "duplicate output: {logical_id}"
            )));
        }
        if let Some(export) = &output.export {
            if self.exports().contains(&export.name) {
                return Err(LampstackError::InvalidTemplate(format!(
                    "duplicate export name: {}",
                    export.name
                )));
            }
        }
        self.outputs.insert(logical_id.to_string(), output);
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn parameter(&self, logical_id: &str) -> Option<&Parameter> {
        self.parameters.get(logical_id)
    }

    pub fn output(&self, logical_id: &str) -> Option<&Output> {
        self.outputs.get(logical_id)
    }

    /// Names this template exports.
    pub fn exports(&self) -> BTreeSet<String> {
        self.outputs
            .values()
            .filter_map(|o| o.export.as_ref().map(|e| e.name.clone()))
            .collect()
    }

    /// Names this template imports via `Fn::ImportValue`.
    pub fn imports(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for r in self.resources.values() {
            intrinsic::collect_imports(&r.properties, &mut out);
        }
        for o in self.outputs.values() {
            intrinsic::collect_imports(&o.value, &mut out);
        }
        out
    }

    /// Check that every `DependsOn` names a resource in this template.
    pub fn validate(&self) -> Result<()> {
        for (id, r) in &self.resources {
            for dep in &r.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(LampstackError::InvalidTemplate(format!(
                        "{id} depends on unknown resource {dep}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render as pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(self)?;
        s.push('\n');
        Ok(s)
    }
}
