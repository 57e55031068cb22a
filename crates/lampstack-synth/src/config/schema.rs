use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;

use lampstack_core::error::{LampstackError, Result};

use crate::waf::rules::{
    default_managed_rule_groups, AggregateKeyType, OverrideActionKind, RuleActionKind,
    GEO_MATCH_PRIORITY, RATE_LIMIT_PRIORITY,
};
use crate::waf::Scope;

/// Provider bounds for a rate-based rule limit.
pub const MIN_RATE_LIMIT: u64 = 100;
pub const MAX_RATE_LIMIT: u64 = 2_000_000_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthConfig {
    pub version: u32,

    pub env: EnvSection,

    pub network: NetworkSection,

    pub workload: WorkloadSection,

    #[serde(default)]
    pub waf: WafSection,

    #[serde(default)]
    pub output: OutputSection,
}

impl SynthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(LampstackError::UnsupportedVersion(self.version));
        }

        self.env.validate()?;
        self.network.validate()?;
        self.workload.validate()?;
        self.waf.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvSection {
    pub account: String,
    pub region: String,
}

impl EnvSection {
    pub fn validate(&self) -> Result<()> {
        non_empty("env.account", &self.account)?;
        non_empty("env.region", &self.region)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    pub vpc_id: String,
    pub private_subnets: Vec<String>,
    pub public_subnets: Vec<String>,
}

impl NetworkSection {
    pub fn validate(&self) -> Result<()> {
        non_empty("network.vpc_id", &self.vpc_id)?;
        if self.private_subnets.is_empty() {
            return Err(bad("network.private_subnets must not be empty"));
        }
        if self.public_subnets.is_empty() {
            return Err(bad("network.public_subnets must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadSection {
    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    pub certificate_arn: String,

    /// Relative paths resolve against the working directory.
    #[serde(default = "default_user_data_path")]
    pub user_data_path: PathBuf,

    #[serde(default)]
    pub image: ImageSection,

    #[serde(default)]
    pub capacity: CapacitySection,

    #[serde(default = "default_target_requests_per_minute")]
    pub target_requests_per_minute: u32,

    #[serde(default = "default_root_volume_gib")]
    pub root_volume_gib: u32,
}

impl WorkloadSection {
    pub fn validate(&self) -> Result<()> {
        non_empty("workload.instance_type", &self.instance_type)?;
        non_empty("workload.certificate_arn", &self.certificate_arn)?;
        self.image.validate()?;
        self.capacity.validate()?;
        if self.target_requests_per_minute == 0 {
            return Err(bad("workload.target_requests_per_minute must be at least 1"));
        }
        if !(8..=16384).contains(&self.root_volume_gib) {
            return Err(bad("workload.root_volume_gib must be between 8 and 16384"));
        }
        Ok(())
    }
}

fn default_instance_type() -> String {
    "t3.micro".into()
}
fn default_user_data_path() -> PathBuf {
    PathBuf::from("user_data/user_data.sh")
}
fn default_target_requests_per_minute() -> u32 {
    1
}
fn default_root_volume_gib() -> u32 {
    8
}

/// Either an SSM parameter name (default: latest Amazon Linux 2) or a fixed
/// AMI id. Setting both is an error.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    #[serde(default)]
    pub ssm_parameter: Option<String>,
    #[serde(default)]
    pub ami_id: Option<String>,
}

impl ImageSection {
    pub fn validate(&self) -> Result<()> {
        if self.ssm_parameter.is_some() && self.ami_id.is_some() {
            return Err(bad("workload.image: set ssm_parameter or ami_id, not both"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacitySection {
    #[serde(default = "default_capacity")]
    pub min: u32,
    #[serde(default = "default_capacity")]
    pub max: u32,
    #[serde(default)]
    pub desired: Option<u32>,
}

impl Default for CapacitySection {
    fn default() -> Self {
        Self {
            min: default_capacity(),
            max: default_capacity(),
            desired: None,
        }
    }
}

impl CapacitySection {
    pub fn validate(&self) -> Result<()> {
        if self.max == 0 {
            return Err(bad("workload.capacity.max must be at least 1"));
        }
        if self.min > self.max {
            return Err(bad("workload.capacity.min must not exceed max"));
        }
        if let Some(d) = self.desired {
            if d < self.min || d > self.max {
                return Err(bad("workload.capacity.desired must be between min and max"));
            }
        }
        Ok(())
    }
}

fn default_capacity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WafSection {
    #[serde(default)]
    pub scope: Scope,

    #[serde(default = "default_managed_rules")]
    pub managed_rules: Vec<ManagedRuleConfig>,

    #[serde(default = "default_allowed_countries")]
    pub allowed_countries: Vec<String>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,

    /// `ip` (default) or `forwarded_ip` (`X-Forwarded-For`).
    #[serde(default)]
    pub rate_limit_key: AggregateKeyType,

    /// `block` enforces the custom rules, `count` only records matches.
    #[serde(default)]
    pub custom_rule_action: RuleActionKind,
}

impl Default for WafSection {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            managed_rules: default_managed_rules(),
            allowed_countries: default_allowed_countries(),
            rate_limit: default_rate_limit(),
            rate_limit_key: AggregateKeyType::default(),
            custom_rule_action: RuleActionKind::default(),
        }
    }
}

impl WafSection {
    pub fn validate(&self) -> Result<()> {
        if self.scope != Scope::Regional {
            return Err(bad(
                "waf.scope must be REGIONAL: the ACL is associated with a regional load balancer",
            ));
        }

        if self.allowed_countries.is_empty() {
            return Err(bad("waf.allowed_countries must not be empty"));
        }
        let mut countries = BTreeSet::new();
        for c in &self.allowed_countries {
            if c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_uppercase()) {
                return Err(bad(&format!(
                    "waf.allowed_countries: {c:?} is not a two-letter country code"
                )));
            }
            if !countries.insert(c.as_str()) {
                return Err(bad(&format!("waf.allowed_countries: duplicate {c}")));
            }
        }

        if !(MIN_RATE_LIMIT..=MAX_RATE_LIMIT).contains(&self.rate_limit) {
            return Err(bad(&format!(
                "waf.rate_limit must be between {MIN_RATE_LIMIT} and {MAX_RATE_LIMIT}"
            )));
        }

        let mut seen = BTreeSet::from([GEO_MATCH_PRIORITY, RATE_LIMIT_PRIORITY]);
        let mut names = BTreeSet::new();
        for r in &self.managed_rules {
            non_empty("waf.managed_rules[].name", &r.name)?;
            if !names.insert(r.name.as_str()) {
                return Err(bad(&format!("waf.managed_rules: duplicate group {}", r.name)));
            }
            if !seen.insert(r.priority) {
                return Err(bad(&format!(
                    "waf.managed_rules: priority {} of {} is already taken",
                    r.priority, r.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagedRuleConfig {
    pub name: String,
    pub priority: u32,
    #[serde(default)]
    pub override_action: OverrideActionKind,
    #[serde(default)]
    pub excluded_rules: Vec<String>,
}

fn default_managed_rules() -> Vec<ManagedRuleConfig> {
    default_managed_rule_groups()
        .into_iter()
        .map(|g| ManagedRuleConfig {
            name: g.name,
            priority: g.priority,
            override_action: OverrideActionKind::None,
            excluded_rules: g.excluded_rules,
        })
        .collect()
}
fn default_allowed_countries() -> Vec<String> {
    vec!["US".into(), "CA".into()]
}
fn default_rate_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self { dir: default_output_dir() }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("cdk.out")
}

fn non_empty(field: &str, v: &str) -> Result<()> {
    if v.trim().is_empty() {
        return Err(bad(&format!("{field} must not be empty")));
    }
    Ok(())
}

fn bad(msg: &str) -> LampstackError {
    LampstackError::BadConfig(msg.to_string())
}
