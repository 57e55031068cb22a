//! Traffic-filter rule model and rule-list assembly.
//!
//! Field names serialize exactly as `AWS::WAFv2::WebACL` rule properties.
//! Unit-like actions render as `{"Block": {}}` via empty struct variants.

use serde::{Deserialize, Serialize};

/// Priority slot reserved for the geographic allow-list rule.
pub const GEO_MATCH_PRIORITY: u32 = 0;
/// Priority slot reserved for the per-IP rate limit rule.
pub const RATE_LIMIT_PRIORITY: u32 = 1;

pub const GEO_MATCH_RULE_NAME: &str = "GeoMatch";
/// Stable rule and metric name. It does not track the configured limit, so
/// dashboards and alarms keyed on it survive a limit change.
pub const RATE_LIMIT_RULE_NAME: &str = "LimitRequests100";

pub const MANAGED_RULE_VENDOR: &str = "AWS";

/// Action taken by a custom rule when its statement matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleAction {
    Block {},
    Count {},
}

/// Override applied to a managed rule group's own actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverrideAction {
    None {},
    Count {},
}

/// Config-facing action names for the custom rules.
///
/// There is no `allow`: both custom rules match traffic that should be
/// stopped, so allowing it would end evaluation before any other rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleActionKind {
    #[default]
    Block,
    Count,
}

impl From<RuleActionKind> for RuleAction {
    fn from(k: RuleActionKind) -> Self {
        match k {
            RuleActionKind::Block => RuleAction::Block {},
            RuleActionKind::Count => RuleAction::Count {},
        }
    }
}

/// Config-facing override names (`none`, `count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideActionKind {
    #[default]
    None,
    Count,
}

impl From<OverrideActionKind> for OverrideAction {
    fn from(k: OverrideActionKind) -> Self {
        match k {
            OverrideActionKind::None => OverrideAction::None {},
            OverrideActionKind::Count => OverrideAction::Count {},
        }
    }
}

/// Request attribute a rate-based rule aggregates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateKeyType {
    /// Source address of the connection.
    #[default]
    #[serde(rename = "IP", alias = "ip")]
    Ip,
    /// First address in `X-Forwarded-For`; needs a `ForwardedIPConfig`.
    #[serde(rename = "FORWARDED_IP", alias = "forwarded_ip")]
    ForwardedIp,
}

/// Header the forwarded address is read from. Requests without it match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForwardedIpConfig {
    pub header_name: String,
    pub fallback_behavior: String,
}

impl ForwardedIpConfig {
    pub fn x_forwarded_for() -> Self {
        Self {
            header_name: "X-Forwarded-For".to_string(),
            fallback_behavior: "MATCH".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExcludedRule {
    pub name: String,
}

/// Match condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Statement {
    #[serde(rename = "ManagedRuleGroupStatement", rename_all = "PascalCase")]
    ManagedRuleGroup {
        name: String,
        vendor_name: String,
        excluded_rules: Vec<ExcludedRule>,
    },
    #[serde(rename = "NotStatement", rename_all = "PascalCase")]
    Not { statement: Box<Statement> },
    #[serde(rename = "GeoMatchStatement", rename_all = "PascalCase")]
    GeoMatch { country_codes: Vec<String> },
    #[serde(rename = "RateBasedStatement", rename_all = "PascalCase")]
    RateBased {
        limit: u64,
        aggregate_key_type: AggregateKeyType,
        #[serde(rename = "ForwardedIPConfig", skip_serializing_if = "Option::is_none")]
        forwarded_ip_config: Option<ForwardedIpConfig>,
    },
}

/// Metrics and request sampling toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VisibilityConfig {
    pub cloud_watch_metrics_enabled: bool,
    pub metric_name: String,
    pub sampled_requests_enabled: bool,
}

impl VisibilityConfig {
    /// Metrics and sampling both on.
    pub fn enabled(metric_name: &str) -> Self {
        Self {
            cloud_watch_metrics_enabled: true,
            metric_name: metric_name.to_string(),
            sampled_requests_enabled: true,
        }
    }
}

/// A single condition/action pair.
///
/// Exactly one of `action` (custom rules) and `override_action` (managed
/// rule groups) is set; the constructors enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    pub name: String,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<RuleAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    override_action: Option<OverrideAction>,
    pub statement: Statement,
    pub visibility_config: VisibilityConfig,
}

impl Rule {
    pub fn custom(name: &str, priority: u32, action: RuleAction, statement: Statement) -> Self {
        Self {
            name: name.to_string(),
            priority,
            action: Some(action),
            override_action: None,
            statement,
            visibility_config: VisibilityConfig::enabled(name),
        }
    }

    pub fn managed(group: &ManagedRuleGroup) -> Self {
        Self {
            name: group.name.clone(),
            priority: group.priority,
            action: None,
            override_action: Some(group.override_action),
            statement: Statement::ManagedRuleGroup {
                name: group.name.clone(),
                vendor_name: MANAGED_RULE_VENDOR.to_string(),
                excluded_rules: group
                    .excluded_rules
                    .iter()
                    .map(|n| ExcludedRule { name: n.clone() })
                    .collect(),
            },
            visibility_config: VisibilityConfig::enabled(&group.name),
        }
    }

    pub fn action(&self) -> Option<RuleAction> {
        self.action
    }
}

/// Reference to a provider-managed rule group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRuleGroup {
    pub name: String,
    pub priority: u32,
    pub override_action: OverrideAction,
    pub excluded_rules: Vec<String>,
}

impl ManagedRuleGroup {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            override_action: OverrideAction::None {},
            excluded_rules: Vec::new(),
        }
    }
}

/// The stock managed rule groups and their priorities.
pub fn default_managed_rule_groups() -> Vec<ManagedRuleGroup> {
    [
        ("AWSManagedRulesCommonRuleSet", 10),
        ("AWSManagedRulesAmazonIpReputationList", 20),
        ("AWSManagedRulesKnownBadInputsRuleSet", 30),
        ("AWSManagedRulesSQLiRuleSet", 40),
        ("AWSManagedRulesLinuxRuleSet", 50),
        ("AWSManagedRulesUnixRuleSet", 60),
    ]
    .into_iter()
    .map(|(name, priority)| ManagedRuleGroup::new(name, priority))
    .collect()
}

/// Settings for the two fixed custom rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRuleSettings {
    /// Requests from countries outside this list are blocked.
    pub allowed_countries: Vec<String>,
    /// Max requests per source address in a five-minute window.
    pub rate_limit: u64,
    pub rate_limit_key: AggregateKeyType,
    /// `Block` enforces both rules; `Count` only records matches.
    pub action: RuleAction,
}

impl Default for CustomRuleSettings {
    fn default() -> Self {
        Self {
            allowed_countries: vec!["US".to_string(), "CA".to_string()],
            rate_limit: 100,
            rate_limit_key: AggregateKeyType::Ip,
            action: RuleAction::Block {},
        }
    }
}

/// Managed groups in input order, then the geo-match and rate-limit rules
/// at their reserved priorities. Priorities are taken as given.
pub fn make_rules(managed: &[ManagedRuleGroup], custom: &CustomRuleSettings) -> Vec<Rule> {
    let mut rules: Vec<Rule> = managed.iter().map(Rule::managed).collect();

    rules.push(Rule::custom(
        GEO_MATCH_RULE_NAME,
        GEO_MATCH_PRIORITY,
        custom.action,
        Statement::Not {
            statement: Box::new(Statement::GeoMatch {
                country_codes: custom.allowed_countries.clone(),
            }),
        },
    ));

    rules.push(Rule::custom(
        RATE_LIMIT_RULE_NAME,
        RATE_LIMIT_PRIORITY,
        custom.action,
        Statement::RateBased {
            limit: custom.rate_limit,
            aggregate_key_type: custom.rate_limit_key,
            forwarded_ip_config: match custom.rate_limit_key {
                AggregateKeyType::Ip => None,
                AggregateKeyType::ForwardedIp => Some(ForwardedIpConfig::x_forwarded_for()),
            },
        },
    ));

    rules
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn managed_rule_serializes_with_override_action() {
        let rule = Rule::managed(&ManagedRuleGroup::new("AWSManagedRulesSQLiRuleSet", 40));
        let v = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            v,
            json!({
                "Name": "AWSManagedRulesSQLiRuleSet",
                "Priority": 40,
                "OverrideAction": { "None": {} },
                "Statement": {
                    "ManagedRuleGroupStatement": {
                        "Name": "AWSManagedRulesSQLiRuleSet",
                        "VendorName": "AWS",
                        "ExcludedRules": []
                    }
                },
                "VisibilityConfig": {
                    "CloudWatchMetricsEnabled": true,
                    "MetricName": "AWSManagedRulesSQLiRuleSet",
                    "SampledRequestsEnabled": true
                }
            })
        );
    }

    #[test]
    fn geo_rule_blocks_unless_listed() {
        let rules = make_rules(&[], &CustomRuleSettings::default());
        let geo = serde_json::to_value(&rules[0]).unwrap();
        assert_eq!(geo["Action"], json!({ "Block": {} }));
        assert_eq!(
            geo["Statement"],
            json!({ "NotStatement": { "Statement": {
                "GeoMatchStatement": { "CountryCodes": ["US", "CA"] }
            }}})
        );
        assert!(geo.get("OverrideAction").is_none());
    }

    #[test]
    fn rate_rule_aggregates_on_ip() {
        let rules = make_rules(&[], &CustomRuleSettings::default());
        let rate = serde_json::to_value(&rules[1]).unwrap();
        assert_eq!(rate["Priority"], json!(RATE_LIMIT_PRIORITY));
        assert_eq!(
            rate["Statement"],
            json!({ "RateBasedStatement": { "Limit": 100, "AggregateKeyType": "IP" } })
        );
    }

    #[test]
    fn forwarded_ip_key_carries_header_config() {
        let custom = CustomRuleSettings {
            rate_limit: 500,
            rate_limit_key: AggregateKeyType::ForwardedIp,
            ..Default::default()
        };
        let rules = make_rules(&[], &custom);
        let rate = serde_json::to_value(&rules[1]).unwrap();
        assert_eq!(
            rate["Statement"],
            json!({ "RateBasedStatement": {
                "Limit": 500,
                "AggregateKeyType": "FORWARDED_IP",
                "ForwardedIPConfig": { "HeaderName": "X-Forwarded-For", "FallbackBehavior": "MATCH" }
            }})
        );
        // name and metric stay fixed whatever the limit
        assert_eq!(rate["Name"], json!(RATE_LIMIT_RULE_NAME));
        assert_eq!(rate["VisibilityConfig"]["MetricName"], json!(RATE_LIMIT_RULE_NAME));
    }

    #[test]
    fn custom_rules_follow_managed_groups() {
        let rules = make_rules(&default_managed_rule_groups(), &CustomRuleSettings::default());
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "AWSManagedRulesCommonRuleSet");
        assert_eq!(&names[6..], &[GEO_MATCH_RULE_NAME, RATE_LIMIT_RULE_NAME]);
    }

    #[test]
    fn count_mode_applies_to_both_custom_rules() {
        let custom = CustomRuleSettings {
            action: RuleActionKind::Count.into(),
            ..Default::default()
        };
        let rules = make_rules(&[], &custom);
        assert!(rules.iter().all(|r| r.action() == Some(RuleAction::Count {})));
    }

    #[test]
    fn excluded_rules_are_carried() {
        let mut g = ManagedRuleGroup::new("AWSManagedRulesCommonRuleSet", 10);
        g.excluded_rules = vec!["SizeRestrictions_BODY".into()];
        let v = serde_json::to_value(Rule::managed(&g)).unwrap();
        assert_eq!(
            v["Statement"]["ManagedRuleGroupStatement"]["ExcludedRules"],
            json!([{ "Name": "SizeRestrictions_BODY" }])
        );
    }
}
