//! Security policy (web ACL) model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lampstack_core::template::Resource;
use lampstack_core::Result;

use super::rules::{Rule, VisibilityConfig};

pub const WEB_ACL_TYPE: &str = "AWS::WAFv2::WebACL";

/// Which provider edge the policy attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Load balancers, API gateways.
    #[default]
    #[serde(rename = "REGIONAL")]
    Regional,
    /// CDN distributions; must be created in us-east-1.
    #[serde(rename = "CLOUDFRONT")]
    CloudFront,
}

/// Action for requests no rule matched. Traffic is allowed unless a rule
/// stops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefaultAction {
    Allow {},
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct WebAclProperties<'a> {
    name: &'a str,
    description: &'a str,
    scope: Scope,
    default_action: DefaultAction,
    visibility_config: &'a VisibilityConfig,
    rules: &'a [Rule],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<Tag>,
}

/// Named, ordered collection of rules plus a default action.
#[derive(Debug, Clone)]
pub struct WebAcl {
    pub name: String,
    pub description: String,
    pub scope: Scope,
    pub default_action: DefaultAction,
    pub visibility_config: VisibilityConfig,
    pub rules: Vec<Rule>,
    pub tags: BTreeMap<String, String>,
}

impl WebAcl {
    pub fn new(name: &str, description: &str, scope: Scope, rules: Vec<Rule>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            scope,
            default_action: DefaultAction::Allow {},
            visibility_config: VisibilityConfig::enabled(name),
            rules,
            tags: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Rules in the order the provider evaluates them (ascending priority).
    /// Ties keep declaration order.
    pub fn evaluation_order(&self) -> Vec<&Rule> {
        let mut ordered: Vec<&Rule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| r.priority);
        ordered
    }

    /// Priorities shared by more than one rule, ascending.
    pub fn duplicate_priorities(&self) -> Vec<u32> {
        let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
        for r in &self.rules {
            *seen.entry(r.priority).or_default() += 1;
        }
        seen.into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn to_resource(&self) -> Result<Resource> {
        let props = WebAclProperties {
            name: &self.name,
            description: &self.description,
            scope: self.scope,
            default_action: self.default_action,
            visibility_config: &self.visibility_config,
            rules: &self.rules,
            tags: self
                .tags
                .iter()
                .map(|(k, v)| Tag { key: k.clone(), value: v.clone() })
                .collect(),
        };
        Resource::new(WEB_ACL_TYPE, &props)
    }
}
