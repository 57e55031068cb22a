//! Security-policy unit (regional web ACL).
//!
//! Assembles managed rule groups and the two fixed custom rules into one web
//! ACL and exports its ARN under `WAF_ACL_EXPORT_NAME` so the workload unit
//! can import it.

pub mod acl;
pub mod rules;

use lampstack_core::template::intrinsic::get_att;
use lampstack_core::template::Output;
use lampstack_core::Result;

use crate::app::{Environment, Stack};

pub use acl::{DefaultAction, Scope, WebAcl, WEB_ACL_TYPE};
pub use rules::{
    default_managed_rule_groups, make_rules, CustomRuleSettings, ManagedRuleGroup, Rule,
    RuleAction,
};

pub const WAF_STACK_ID: &str = "WafRegionalStack";
pub const WAF_STACK_DESCRIPTION: &str = "Deploy WAF ACL";

/// Fixed name the workload unit imports the ACL ARN by.
pub const WAF_ACL_EXPORT_NAME: &str = "WafRegionalStack:WafAclRegionalArn";

pub const WEB_ACL_LOGICAL_ID: &str = "WAF";
pub const WEB_ACL_OUTPUT_ID: &str = "WafAclArn";
pub const WEB_ACL_NAME: &str = "waf-regional";
pub const WEB_ACL_DESCRIPTION: &str = "WAFv2 ACL for Regional";

/// Inputs of the security-policy unit.
#[derive(Debug, Clone)]
pub struct WafProps {
    pub env: Environment,
    pub scope: Scope,
    pub managed_rules: Vec<ManagedRuleGroup>,
    pub custom_rules: CustomRuleSettings,
}

/// Build the web ACL described by `props` (not yet placed in a stack).
pub fn build_web_acl(props: &WafProps) -> WebAcl {
    let rules = make_rules(&props.managed_rules, &props.custom_rules);
    WebAcl::new(WEB_ACL_NAME, WEB_ACL_DESCRIPTION, props.scope, rules)
        .tag("Name", WEB_ACL_NAME)
        .tag("Purpose", "WAF for Regional")
        .tag("CreatedBy", "Cloudformation")
}

pub fn build_waf_stack(props: &WafProps) -> Result<Stack> {
    let mut stack = Stack::new(WAF_STACK_ID, props.env.clone(), WAF_STACK_DESCRIPTION);
    let acl = build_web_acl(props);

    let dups = acl.duplicate_priorities();
    if !dups.is_empty() {
        tracing::warn!(?dups, "web ACL has rules sharing a priority");
    }
    tracing::info!(rules = acl.rules.len(), scope = ?acl.scope, "web ACL assembled");

    stack.template.add_resource(WEB_ACL_LOGICAL_ID, acl.to_resource()?)?;
    stack.template.add_output(
        WEB_ACL_OUTPUT_ID,
        Output::new(get_att(WEB_ACL_LOGICAL_ID, "Arn")).exported_as(WAF_ACL_EXPORT_NAME),
    )?;
    Ok(stack)
}
