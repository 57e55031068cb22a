//! Cloud assembly: the synthesized output directory.
//!
//! Layout:
//! - `manifest.json` : one artifact per stack (environment, template file,
//!   dependencies), in deployment order
//! - `<StackId>.template.json` : one template per stack

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use lampstack_core::error::{LampstackError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0.0";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

pub fn template_file_name(stack_id: &str) -> String {
    format!("{stack_id}.template.json")
}

/// Stack metadata recorded in the manifest.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub stack_id: String,
    pub environment: String,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestArtifact<'a> {
    #[serde(rename = "type")]
    artifact_type: &'static str,
    environment: &'a str,
    properties: ArtifactProperties<'a>,
    dependencies: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactProperties<'a> {
    template_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    version: &'static str,
    artifacts: BTreeMap<&'a str, ManifestArtifact<'a>>,
    #[serde(rename = "deploymentOrder")]
    deployment_order: Vec<&'a str>,
}

/// Rendered templates plus manifest metadata, in deployment order.
#[derive(Debug, Default)]
pub struct CloudAssembly {
    entries: Vec<(Artifact, String)>,
}

impl CloudAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, artifact: Artifact, template_json: String) {
        self.entries.push((artifact, template_json));
    }

    pub fn deployment_order(&self) -> Vec<&str> {
        self.entries.iter().map(|(a, _)| a.stack_id.as_str()).collect()
    }

    pub fn template(&self, stack_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a.stack_id == stack_id)
            .map(|(_, t)| t.as_str())
    }

    pub fn manifest_json(&self) -> Result<String> {
        let artifacts = self
            .entries
            .iter()
            .map(|(a, _)| {
                (
                    a.stack_id.as_str(),
                    ManifestArtifact {
                        artifact_type: STACK_ARTIFACT_TYPE,
                        environment: &a.environment,
                        properties: ArtifactProperties {
                            template_file: template_file_name(&a.stack_id),
                            description: a.description.as_deref(),
                        },
                        dependencies: &a.dependencies,
                    },
                )
            })
            .collect();

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            artifacts,
            deployment_order: self.deployment_order(),
        };
        let mut s = serde_json::to_string_pretty(&manifest)?;
        s.push('\n');
        Ok(s)
    }

    /// Every file of the assembly as (file name, contents), manifest last.
    pub fn files(&self) -> Result<Vec<(String, String)>> {
        let mut files: Vec<(String, String)> = self
            .entries
            .iter()
            .map(|(a, t)| (template_file_name(&a.stack_id), t.clone()))
            .collect();
        files.push((MANIFEST_FILE.to_string(), self.manifest_json()?));
        Ok(files)
    }

    /// Write the assembly into `dir`, creating it if needed.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            LampstackError::Io(format!("create {} failed: {e}", dir.display()))
        })?;

        let mut written = Vec::new();
        for (name, body) in self.files()? {
            let path = dir.join(&name);
            fs::write(&path, body).map_err(|e| {
                LampstackError::Io(format!("write {} failed: {e}", path.display()))
            })?;
            tracing::info!(path = %path.display(), "wrote");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn assembly() -> CloudAssembly {
        let mut a = CloudAssembly::new();
        a.add(
            Artifact {
                stack_id: "First".into(),
                environment: "aws://1/r".into(),
                description: Some("first".into()),
                dependencies: vec![],
            },
            "{}\n".into(),
        );
        a.add(
            Artifact {
                stack_id: "Second".into(),
                environment: "aws://1/r".into(),
                description: None,
                dependencies: vec!["First".into()],
            },
            "{}\n".into(),
        );
        a
    }

    #[test]
    fn manifest_lists_artifacts_and_order() {
        let m: Value = serde_json::from_str(&assembly().manifest_json().unwrap()).unwrap();
        assert_eq!(m["version"], json!(MANIFEST_VERSION));
        assert_eq!(m["deploymentOrder"], json!(["First", "Second"]));
        assert_eq!(m["artifacts"]["Second"]["dependencies"], json!(["First"]));
        assert_eq!(
            m["artifacts"]["First"]["properties"],
            json!({ "templateFile": "First.template.json", "description": "first" })
        );
        assert_eq!(m["artifacts"]["First"]["type"], json!(STACK_ARTIFACT_TYPE));
    }

    #[test]
    fn write_to_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/cdk.out");
        let written = assembly().write_to(&out).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out.join("First.template.json").is_file());
        assert!(out.join("Second.template.json").is_file());
        assert!(out.join(MANIFEST_FILE).is_file());
    }
}
