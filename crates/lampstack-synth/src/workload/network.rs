//! Network placement and security groups.

use serde::Serialize;
use serde_json::Value;

use lampstack_core::template::intrinsic::get_att;
use lampstack_core::template::{Resource, Template};
use lampstack_core::Result;

pub const SECURITY_GROUP_TYPE: &str = "AWS::EC2::SecurityGroup";
pub const SECURITY_GROUP_INGRESS_TYPE: &str = "AWS::EC2::SecurityGroupIngress";
pub const SECURITY_GROUP_EGRESS_TYPE: &str = "AWS::EC2::SecurityGroupEgress";

pub const ANY_IPV4: &str = "0.0.0.0/0";

/// An existing VPC. Subnet ids are the values a provider lookup resolves
/// for the VPC; they are supplied up front instead of queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcPlacement {
    pub vpc_id: String,
    /// Private subnets with NAT egress; the fleet runs here.
    pub private_subnets: Vec<String>,
    /// Public subnets; the load balancer runs here.
    pub public_subnets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CidrRule {
    pub cidr_ip: String,
    pub ip_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    pub description: String,
}

impl CidrRule {
    pub fn tcp(cidr: &str, port: u16, description: &str) -> Self {
        Self {
            cidr_ip: cidr.to_string(),
            ip_protocol: "tcp".to_string(),
            from_port: Some(i32::from(port)),
            to_port: Some(i32::from(port)),
            description: description.to_string(),
        }
    }

    pub fn allow_all_outbound() -> Self {
        Self {
            cidr_ip: ANY_IPV4.to_string(),
            ip_protocol: "-1".to_string(),
            from_port: None,
            to_port: None,
            description: "Allow all outbound traffic by default".to_string(),
        }
    }

    /// Matches nothing; replaces the implicit allow-all egress rule.
    pub fn disallow_all_outbound() -> Self {
        Self {
            cidr_ip: "255.255.255.255/32".to_string(),
            ip_protocol: "icmp".to_string(),
            from_port: Some(252),
            to_port: Some(86),
            description: "Disallow all traffic".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroupProperties<'a> {
    group_description: &'a str,
    vpc_id: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    security_group_ingress: Vec<CidrRule>,
    security_group_egress: Vec<CidrRule>,
}

pub fn add_security_group(
    t: &mut Template,
    logical_id: &str,
    vpc: &VpcPlacement,
    description: &str,
    ingress: &[CidrRule],
    egress: &[CidrRule],
) -> Result<()> {
    let props = SecurityGroupProperties {
        group_description: description,
        vpc_id: &vpc.vpc_id,
        security_group_ingress: ingress.to_vec(),
        security_group_egress: egress.to_vec(),
    };
    t.add_resource(logical_id, Resource::new(SECURITY_GROUP_TYPE, &props)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct IngressProperties<'a> {
    group_id: Value,
    source_security_group_id: Value,
    ip_protocol: &'static str,
    from_port: u16,
    to_port: u16,
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EgressProperties<'a> {
    group_id: Value,
    destination_security_group_id: Value,
    ip_protocol: &'static str,
    from_port: u16,
    to_port: u16,
    description: &'a str,
}

/// Allow TCP `port` from group `from_sg` to group `to_sg`, declared on both
/// sides (egress on the source, ingress on the destination).
pub fn connect_groups(
    t: &mut Template,
    from_sg: &str,
    to_sg: &str,
    port: u16,
    description: &str,
) -> Result<()> {
    let ingress = IngressProperties {
        group_id: get_att(to_sg, "GroupId"),
        source_security_group_id: get_att(from_sg, "GroupId"),
        ip_protocol: "tcp",
        from_port: port,
        to_port: port,
        description,
    };
    t.add_resource(
        &format!("{to_sg}From{from_sg}{port}"),
        Resource::new(SECURITY_GROUP_INGRESS_TYPE, &ingress)?,
    )?;

    let egress = EgressProperties {
        group_id: get_att(from_sg, "GroupId"),
        destination_security_group_id: get_att(to_sg, "GroupId"),
        ip_protocol: "tcp",
        from_port: port,
        to_port: port,
        description,
    };
    t.add_resource(
        &format!("{from_sg}To{to_sg}{port}"),
        Resource::new(SECURITY_GROUP_EGRESS_TYPE, &egress)?,
    )
}
