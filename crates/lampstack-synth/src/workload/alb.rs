//! Traffic distributor: internet-facing ALB, HTTPS listener, target group,
//! and the web ACL association.

use serde::Serialize;
use serde_json::{json, Value};

use lampstack_core::template::intrinsic::{get_att, import_value, reference};
use lampstack_core::template::{Resource, Template};
use lampstack_core::Result;

use super::network::VpcPlacement;

pub const LOAD_BALANCER_TYPE: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
pub const LISTENER_TYPE: &str = "AWS::ElasticLoadBalancingV2::Listener";
pub const TARGET_GROUP_TYPE: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";
pub const WEB_ACL_ASSOCIATION_TYPE: &str = "AWS::WAFv2::WebACLAssociation";

pub const HTTPS_PORT: u16 = 443;
pub const TARGET_PORT: u16 = 80;
pub const TLS12_POLICY: &str = "ELBSecurityPolicy-TLS-1-2-2017-01";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Attribute {
    key: &'static str,
    value: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerProperties<'a> {
    #[serde(rename = "Type")]
    lb_type: &'static str,
    scheme: &'static str,
    subnets: &'a [String],
    security_groups: Vec<Value>,
    load_balancer_attributes: Vec<Attribute>,
}

/// Internet-facing ALB in the public subnets; malformed headers are dropped.
pub fn add_load_balancer(
    t: &mut Template,
    logical_id: &str,
    vpc: &VpcPlacement,
    security_group: &str,
) -> Result<()> {
    let props = LoadBalancerProperties {
        lb_type: "application",
        scheme: "internet-facing",
        subnets: &vpc.public_subnets,
        security_groups: vec![get_att(security_group, "GroupId")],
        load_balancer_attributes: vec![Attribute {
            key: "routing.http.drop_invalid_header_fields.enabled",
            value: "true",
        }],
    };
    t.add_resource(logical_id, Resource::new(LOAD_BALANCER_TYPE, &props)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TargetGroupProperties<'a> {
    port: u16,
    protocol: &'static str,
    target_type: &'static str,
    vpc_id: &'a str,
}

pub fn add_target_group(t: &mut Template, logical_id: &str, vpc: &VpcPlacement) -> Result<()> {
    let props = TargetGroupProperties {
        port: TARGET_PORT,
        protocol: "HTTP",
        target_type: "instance",
        vpc_id: &vpc.vpc_id,
    };
    t.add_resource(logical_id, Resource::new(TARGET_GROUP_TYPE, &props)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListenerProperties {
    load_balancer_arn: Value,
    port: u16,
    protocol: &'static str,
    certificates: Vec<Value>,
    ssl_policy: &'static str,
    default_actions: Vec<Value>,
}

/// TLS 1.2 listener on 443 terminating with an imported certificate and
/// forwarding to `target_group`.
pub fn add_https_listener(
    t: &mut Template,
    logical_id: &str,
    load_balancer: &str,
    target_group: &str,
    certificate_arn: &str,
) -> Result<()> {
    let props = ListenerProperties {
        load_balancer_arn: reference(load_balancer),
        port: HTTPS_PORT,
        protocol: "HTTPS",
        certificates: vec![json!({ "CertificateArn": certificate_arn })],
        ssl_policy: TLS12_POLICY,
        default_actions: vec![json!({
            "Type": "forward",
            "TargetGroupArn": reference(target_group),
        })],
    };
    t.add_resource(logical_id, Resource::new(LISTENER_TYPE, &props)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssociationProperties {
    resource_arn: Value,
    #[serde(rename = "WebACLArn")]
    web_acl_arn: Value,
}

/// Attach the web ACL exported under `export_name` to the load balancer.
/// The import is resolved by the provider; nothing checks it here.
pub fn add_web_acl_association(
    t: &mut Template,
    logical_id: &str,
    load_balancer: &str,
    export_name: &str,
) -> Result<()> {
    let props = AssociationProperties {
        resource_arn: reference(load_balancer),
        web_acl_arn: import_value(export_name),
    };
    t.add_resource(logical_id, Resource::new(WEB_ACL_ASSOCIATION_TYPE, &props)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn vpc() -> VpcPlacement {
        VpcPlacement {
            vpc_id: "vpc-1".into(),
            private_subnets: vec!["subnet-priv".into()],
            public_subnets: vec!["subnet-pub-a".into(), "subnet-pub-b".into()],
        }
    }

    #[test]
    fn load_balancer_is_public_and_drops_invalid_headers() {
        let mut t = Template::new(None);
        add_load_balancer(&mut t, "Lb", &vpc(), "LbSg").unwrap();
        let p = &t.resource("Lb").unwrap().properties;
        assert_eq!(p["Scheme"], json!("internet-facing"));
        assert_eq!(p["Subnets"], json!(["subnet-pub-a", "subnet-pub-b"]));
        assert_eq!(
            p["LoadBalancerAttributes"],
            json!([{ "Key": "routing.http.drop_invalid_header_fields.enabled", "Value": "true" }])
        );
    }

    #[test]
    fn listener_terminates_tls_and_forwards() {
        let mut t = Template::new(None);
        add_https_listener(&mut t, "Https", "Lb", "Tg", "arn:aws:acm:r:1:certificate/x").unwrap();
        let p = &t.resource("Https").unwrap().properties;
        assert_eq!(p["Port"], json!(443));
        assert_eq!(p["Protocol"], json!("HTTPS"));
        assert_eq!(p["SslPolicy"], json!(TLS12_POLICY));
        assert_eq!(p["Certificates"], json!([{ "CertificateArn": "arn:aws:acm:r:1:certificate/x" }]));
        assert_eq!(p["DefaultActions"][0]["TargetGroupArn"], json!({ "Ref": "Tg" }));
    }

    #[test]
    fn target_group_uses_port_80() {
        let mut t = Template::new(None);
        add_target_group(&mut t, "Tg", &vpc()).unwrap();
        let p = &t.resource("Tg").unwrap().properties;
        assert_eq!(p["Port"], json!(80));
        assert_eq!(p["Protocol"], json!("HTTP"));
    }

    #[test]
    fn association_imports_acl_arn() {
        let mut t = Template::new(None);
        add_web_acl_association(&mut t, "Assoc", "Lb", "Some:Export").unwrap();
        let p = &t.resource("Assoc").unwrap().properties;
        assert_eq!(p["WebACLArn"], json!({ "Fn::ImportValue": "Some:Export" }));
        assert_eq!(p["ResourceArn"], json!({ "Ref": "Lb" }));
    }
}
