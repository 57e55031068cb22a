//! App composition: stacks, their ordering dependencies, and synthesis.
//!
//! The app is built once at startup, linearly: add stacks, declare
//! dependencies, then `synth()` into a `CloudAssembly`.

use std::collections::{BTreeMap, BTreeSet};

use lampstack_core::error::{LampstackError, Result};
use lampstack_core::template::Template;

use crate::assembly::{Artifact, CloudAssembly};

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: &str, region: &str) -> Self {
        Self {
            account: account.to_string(),
            region: region.to_string(),
        }
    }

    /// `aws://<account>/<region>`
    pub fn uri(&self) -> String {
        format!("aws://{}/{}", self.account, self.region)
    }
}

/// One deployable unit: an id, its environment, and its template.
#[derive(Debug, Clone)]
pub struct Stack {
    pub id: String,
    pub env: Environment,
    pub template: Template,
}

impl Stack {
    pub fn new(id: &str, env: Environment, description: &str) -> Self {
        Self {
            id: id.to_string(),
            env,
            template: Template::new(Some(description.to_string())),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.template.description()
    }
}

#[derive(Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
    // dependent -> dependencies
    deps: BTreeMap<String, BTreeSet<String>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<()> {
        if self.stack(&stack.id).is_some() {
            return Err(LampstackError::InvalidTemplate(format!(
                "duplicate stack id: {}",
                stack.id
            )));
        }
        tracing::info!(stack = %stack.id, env = %stack.env.uri(), "stack added");
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    /// `dependent` deploys after `dependency`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        if dependent == dependency {
            return Err(LampstackError::Dependency(format!(
                "stack {dependent} cannot depend on itself"
            )));
        }
        for id in [dependent, dependency] {
            if self.stack(id).is_none() {
                return Err(LampstackError::Dependency(format!("unknown stack: {id}")));
            }
        }
        self.deps
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
        Ok(())
    }

    pub fn dependencies_of(&self, id: &str) -> Vec<String> {
        self.deps
            .get(id)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stack ids in deployment order. Among stacks that are ready at the same
    /// time, the one added first comes first.
    pub fn deployment_order(&self) -> Result<Vec<String>> {
        let mut done: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.stacks.len());

        while order.len() < self.stacks.len() {
            let next = self.stacks.iter().find(|s| {
                !done.contains(s.id.as_str())
                    && self
                        .deps
                        .get(&s.id)
                        .map_or(true, |d| d.iter().all(|x| done.contains(x.as_str())))
            });
            match next {
                Some(s) => {
                    done.insert(s.id.as_str());
                    order.push(s.id.clone());
                }
                None => {
                    let stuck: Vec<&str> = self
                        .stacks
                        .iter()
                        .map(|s| s.id.as_str())
                        .filter(|id| !done.contains(id))
                        .collect();
                    return Err(LampstackError::Dependency(format!(
                        "dependency cycle among stacks: {}",
                        stuck.join(", ")
                    )));
                }
            }
        }
        Ok(order)
    }

    /// Imports that no stack in this app exports. These are left for the
    /// provider to resolve (or fail) at deploy time.
    pub fn unresolved_imports(&self) -> BTreeMap<String, BTreeSet<String>> {
        let exported: BTreeSet<String> = self
            .stacks
            .iter()
            .flat_map(|s| s.template.exports())
            .collect();

        let mut out = BTreeMap::new();
        for s in &self.stacks {
            let missing: BTreeSet<String> = s
                .template
                .imports()
                .into_iter()
                .filter(|i| !exported.contains(i))
                .collect();
            if !missing.is_empty() {
                out.insert(s.id.clone(), missing);
            }
        }
        out
    }

    /// Render every stack into a cloud assembly.
    pub fn synth(&self) -> Result<CloudAssembly> {
        let order = self.deployment_order()?;

        for (stack, missing) in self.unresolved_imports() {
            for name in missing {
                tracing::warn!(%stack, import = %name, "import is not exported by any stack in this app");
            }
        }

        let mut assembly = CloudAssembly::new();
        for id in &order {
            let Some(stack) = self.stack(id) else {
                return Err(LampstackError::Internal(format!("stack vanished: {id}")));
            };
            stack.template.validate()?;
            let body = stack.template.to_json_pretty()?;
            assembly.add(
                Artifact {
                    stack_id: stack.id.clone(),
                    environment: stack.env.uri(),
                    description: stack.description().map(str::to_string),
                    dependencies: self.dependencies_of(id),
                },
                body,
            );
        }
        tracing::info!(stacks = order.len(), order = %order.join(" -> "), "synthesized");
        Ok(assembly)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use lampstack_core::template::intrinsic::import_value;
    use lampstack_core::template::Resource;

    fn env() -> Environment {
        Environment::new("111111111111", "us-east-1")
    }

    fn app_of(ids: &[&str]) -> App {
        let mut app = App::new();
        for id in ids {
            app.add_stack(Stack::new(id, env(), "test")).unwrap();
        }
        app
    }

    #[test]
    fn environment_uri() {
        assert_eq!(env().uri(), "aws://111111111111/us-east-1");
    }

    #[test]
    fn dependency_reorders_stacks() {
        let mut app = app_of(&["Workload", "Policy"]);
        app.add_dependency("Workload", "Policy").unwrap();
        assert_eq!(app.deployment_order().unwrap(), vec!["Policy", "Workload"]);
    }

    #[test]
    fn independent_stacks_keep_insertion_order() {
        let app = app_of(&["B", "A", "C"]);
        assert_eq!(app.deployment_order().unwrap(), vec!["B", "A", "C"]);
    }

    #[test]
    fn cycle_is_an_error() {
        let mut app = app_of(&["A", "B"]);
        app.add_dependency("A", "B").unwrap();
        app.add_dependency("B", "A").unwrap();
        let err = app.deployment_order().unwrap_err();
        assert_eq!(err.code().as_str(), "DEPENDENCY");
    }

    #[test]
    fn unknown_and_self_dependencies_are_rejected() {
        let mut app = app_of(&["A"]);
        assert!(app.add_dependency("A", "Nope").is_err());
        assert!(app.add_dependency("A", "A").is_err());
    }

    #[test]
    fn duplicate_stack_id_is_rejected() {
        let mut app = app_of(&["A"]);
        assert!(app.add_stack(Stack::new("A", env(), "again")).is_err());
    }

    #[test]
    fn unresolved_imports_are_reported() {
        let mut s = Stack::new("Consumer", env(), "test");
        let props = serde_json::json!({ "Arn": import_value("Nobody:Exports") });
        s.template
            .add_resource("Thing", Resource::new("AWS::SQS::Queue", &props).unwrap())
            .unwrap();
        let mut app = App::new();
        app.add_stack(s).unwrap();

        let missing = app.unresolved_imports();
        assert!(missing["Consumer"].contains("Nobody:Exports"));
        // still synthesizes; the provider reports it at deploy time
        assert!(app.synth().is_ok());
    }
}
