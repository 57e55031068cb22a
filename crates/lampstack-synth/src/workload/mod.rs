//! Workload unit: compute fleet behind a TLS load balancer, protected by the
//! web ACL the security-policy unit exports.

pub mod alb;
pub mod compute;
pub mod network;

use lampstack_core::template::intrinsic::get_att;
use lampstack_core::template::Output;
use lampstack_core::Result;

use crate::app::{Environment, Stack};

pub use compute::{Capacity, FleetIds, FleetProps, MachineImage};
pub use network::VpcPlacement;

use network::CidrRule;

pub const LAMP_STACK_ID: &str = "CdkLampstackStack";
pub const LAMP_STACK_DESCRIPTION: &str = "Deploy LAMP Stack (qs-1t1gmgopk)";

pub const FLEET_IDS: FleetIds = FleetIds {
    role: "InstanceSSM",
    instance_profile: "InstanceSSMInstanceProfile",
    security_group: "myASGInstanceSecurityGroup",
    launch_template: "myASGLaunchTemplate",
    group: "myASG",
    ami_parameter: "LatestAmiId",
};

pub const LOAD_BALANCER_ID: &str = "lampALB";
pub const LOAD_BALANCER_SG_ID: &str = "lampALBSecurityGroup";
pub const LISTENER_ID: &str = "lampALBALBListenerHttps";
pub const TARGET_GROUP_ID: &str = "lampALBALBListenerHttpsTargetGroup";
pub const SCALING_POLICY_ID: &str = "myASGScalingPolicyAModestLoad";
pub const WEB_ACL_ASSOCIATION_ID: &str = "WAFACLAssociateALB";
pub const LOAD_BALANCER_OUTPUT_ID: &str = "LoadBalancer";
pub const LOAD_BALANCER_EXPORT_NAME: &str = "LoadBalancer";

/// Inputs of the workload unit.
#[derive(Debug, Clone)]
pub struct WorkloadProps {
    pub env: Environment,
    pub vpc: VpcPlacement,
    pub fleet: FleetProps,
    pub certificate_arn: String,
    /// Export name the web ACL ARN is imported by.
    pub web_acl_export: String,
}

pub fn build_lamp_stack(props: &WorkloadProps) -> Result<Stack> {
    let mut stack = Stack::new(LAMP_STACK_ID, props.env.clone(), LAMP_STACK_DESCRIPTION);
    let t = &mut stack.template;
    let ids = &FLEET_IDS;

    compute::add_instance_role(t, ids)?;
    network::add_security_group(
        t,
        ids.security_group,
        &props.vpc,
        "CdkLampstackStack/myASG/InstanceSecurityGroup",
        &[],
        &[CidrRule::allow_all_outbound()],
    )?;
    compute::add_launch_template(t, ids, &props.fleet)?;

    network::add_security_group(
        t,
        LOAD_BALANCER_SG_ID,
        &props.vpc,
        "Automatically created Security Group for ELB CdkLampstackStacklampALB",
        &[CidrRule::tcp(network::ANY_IPV4, alb::HTTPS_PORT, "Open to the world")],
        &[CidrRule::disallow_all_outbound()],
    )?;
    alb::add_load_balancer(t, LOAD_BALANCER_ID, &props.vpc, LOAD_BALANCER_SG_ID)?;
    alb::add_target_group(t, TARGET_GROUP_ID, &props.vpc)?;
    alb::add_https_listener(
        t,
        LISTENER_ID,
        LOAD_BALANCER_ID,
        TARGET_GROUP_ID,
        &props.certificate_arn,
    )?;
    network::connect_groups(
        t,
        LOAD_BALANCER_SG_ID,
        ids.security_group,
        alb::TARGET_PORT,
        "Load balancer to target",
    )?;

    compute::add_auto_scaling_group(t, ids, &props.fleet, &props.vpc, TARGET_GROUP_ID)?;
    compute::add_request_count_scaling(
        t,
        SCALING_POLICY_ID,
        ids,
        props.fleet.target_requests_per_minute,
        LOAD_BALANCER_ID,
        TARGET_GROUP_ID,
        LISTENER_ID,
    )?;

    alb::add_web_acl_association(t, WEB_ACL_ASSOCIATION_ID, LOAD_BALANCER_ID, &props.web_acl_export)?;

    t.add_output(
        LOAD_BALANCER_OUTPUT_ID,
        Output::new(get_att(LOAD_BALANCER_ID, "DNSName")).exported_as(LOAD_BALANCER_EXPORT_NAME),
    )?;

    tracing::info!(
        vpc = %props.vpc.vpc_id,
        instance_type = %props.fleet.instance_type,
        imports = ?stack.template.imports(),
        "workload assembled"
    );
    Ok(stack)
}
