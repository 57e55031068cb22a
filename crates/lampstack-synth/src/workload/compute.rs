//! Compute fleet: machine image, instance role, launch template, auto scaling
//! group, and request-count scaling.

use serde::Serialize;
use serde_json::{json, Value};

use lampstack_core::template::intrinsic::{base64, get_att, join, managed_policy_arn, reference};
use lampstack_core::template::{Parameter, Resource, Template};
use lampstack_core::Result;

use super::network::VpcPlacement;

pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const INSTANCE_PROFILE_TYPE: &str = "AWS::IAM::InstanceProfile";
pub const LAUNCH_TEMPLATE_TYPE: &str = "AWS::EC2::LaunchTemplate";
pub const AUTO_SCALING_GROUP_TYPE: &str = "AWS::AutoScaling::AutoScalingGroup";
pub const SCALING_POLICY_TYPE: &str = "AWS::AutoScaling::ScalingPolicy";

/// Public SSM parameter holding the latest Amazon Linux 2 AMI id.
pub const AMAZON_LINUX_2_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2";
pub const AMI_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

pub const SSM_MANAGED_POLICY: &str = "AmazonSSMManagedInstanceCore";
pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

pub const ROOT_DEVICE_NAME: &str = "/dev/xvda";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineImage {
    /// Resolved by the provider from an SSM parameter at deploy time.
    SsmParameter(String),
    /// A fixed AMI id.
    AmiId(String),
}

impl Default for MachineImage {
    fn default() -> Self {
        MachineImage::SsmParameter(AMAZON_LINUX_2_PARAMETER.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub min: u32,
    pub max: u32,
    pub desired: Option<u32>,
}

impl Default for Capacity {
    fn default() -> Self {
        Self { min: 1, max: 1, desired: None }
    }
}

/// Compute fleet descriptor.
#[derive(Debug, Clone)]
pub struct FleetProps {
    pub image: MachineImage,
    pub instance_type: String,
    /// Boot script, embedded verbatim.
    pub user_data: String,
    pub capacity: Capacity,
    pub root_volume_gib: u32,
    /// Scaling target: ALB requests per minute per instance.
    pub target_requests_per_minute: u32,
}

/// Logical ids of the fleet's resources.
#[derive(Debug, Clone, Copy)]
pub struct FleetIds {
    pub role: &'static str,
    pub instance_profile: &'static str,
    pub security_group: &'static str,
    pub launch_template: &'static str,
    pub group: &'static str,
    pub ami_parameter: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties {
    assume_role_policy_document: Value,
    managed_policy_arns: Vec<Value>,
}

/// Role assumable by EC2 with the SSM management policy attached, plus the
/// instance profile wrapping it.
pub fn add_instance_role(t: &mut Template, ids: &FleetIds) -> Result<()> {
    let role = RoleProperties {
        assume_role_policy_document: json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": EC2_SERVICE_PRINCIPAL }
            }]
        }),
        managed_policy_arns: vec![managed_policy_arn(SSM_MANAGED_POLICY)],
    };
    t.add_resource(ids.role, Resource::new(ROLE_TYPE, &role)?)?;

    let profile = json!({ "Roles": [reference(ids.role)] });
    t.add_resource(ids.instance_profile, Resource::new(INSTANCE_PROFILE_TYPE, &profile)?)
}

/// `ImageId` value for the launch template; declares the SSM parameter when
/// the image is resolved at deploy time.
pub fn image_id(t: &mut Template, ids: &FleetIds, image: &MachineImage) -> Result<Value> {
    match image {
        MachineImage::SsmParameter(name) => {
            t.add_parameter(
                ids.ami_parameter,
                Parameter {
                    param_type: AMI_PARAMETER_TYPE.to_string(),
                    default: Some(name.clone()),
                    description: None,
                },
            )?;
            Ok(reference(ids.ami_parameter))
        }
        MachineImage::AmiId(id) => Ok(Value::from(id.as_str())),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Ebs {
    volume_size: u32,
    encrypted: bool,
    volume_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BlockDeviceMapping {
    device_name: &'static str,
    ebs: Ebs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchTemplateData<'a> {
    image_id: Value,
    instance_type: &'a str,
    iam_instance_profile: Value,
    security_group_ids: Vec<Value>,
    user_data: Value,
    block_device_mappings: Vec<BlockDeviceMapping>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchTemplateProperties<'a> {
    launch_template_data: LaunchTemplateData<'a>,
}

pub fn add_launch_template(t: &mut Template, ids: &FleetIds, fleet: &FleetProps) -> Result<()> {
    let image_id = image_id(t, ids, &fleet.image)?;
    let props = LaunchTemplateProperties {
        launch_template_data: LaunchTemplateData {
            image_id,
            instance_type: &fleet.instance_type,
            iam_instance_profile: json!({ "Arn": get_att(ids.instance_profile, "Arn") }),
            security_group_ids: vec![get_att(ids.security_group, "GroupId")],
            user_data: base64(Value::from(fleet.user_data.as_str())),
            block_device_mappings: vec![BlockDeviceMapping {
                device_name: ROOT_DEVICE_NAME,
                ebs: Ebs {
                    volume_size: fleet.root_volume_gib,
                    encrypted: true,
                    volume_type: "gp2",
                },
            }],
        },
    };
    t.add_resource(
        ids.launch_template,
        Resource::new(LAUNCH_TEMPLATE_TYPE, &props)?.depends_on(ids.role),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AutoScalingGroupProperties<'a> {
    min_size: String,
    max_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    desired_capacity: Option<String>,
    launch_template: Value,
    #[serde(rename = "VPCZoneIdentifier")]
    vpc_zone_identifier: &'a [String],
    #[serde(rename = "TargetGroupARNs")]
    target_group_arns: Vec<Value>,
}

/// Auto scaling group in the private subnets, registered with `target_group`.
pub fn add_auto_scaling_group(
    t: &mut Template,
    ids: &FleetIds,
    fleet: &FleetProps,
    vpc: &VpcPlacement,
    target_group: &str,
) -> Result<()> {
    let props = AutoScalingGroupProperties {
        min_size: fleet.capacity.min.to_string(),
        max_size: fleet.capacity.max.to_string(),
        desired_capacity: fleet.capacity.desired.map(|d| d.to_string()),
        launch_template: json!({
            "LaunchTemplateId": reference(ids.launch_template),
            "Version": get_att(ids.launch_template, "LatestVersionNumber"),
        }),
        vpc_zone_identifier: &vpc.private_subnets,
        target_group_arns: vec![reference(target_group)],
    };
    t.add_resource(ids.group, Resource::new(AUTO_SCALING_GROUP_TYPE, &props)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScalingPolicyProperties {
    auto_scaling_group_name: Value,
    policy_type: &'static str,
    target_tracking_configuration: Value,
}

/// Target tracking on ALB request count per target.
///
/// The metric is only defined once the target group is attached to the load
/// balancer, so the policy waits for `listener`.
pub fn add_request_count_scaling(
    t: &mut Template,
    logical_id: &str,
    ids: &FleetIds,
    target_requests_per_minute: u32,
    load_balancer: &str,
    target_group: &str,
    listener: &str,
) -> Result<()> {
    let resource_label = join(
        "",
        vec![
            get_att(load_balancer, "LoadBalancerFullName"),
            Value::from("/"),
            get_att(target_group, "TargetGroupFullName"),
        ],
    );
    let props = ScalingPolicyProperties {
        auto_scaling_group_name: reference(ids.group),
        policy_type: "TargetTrackingScaling",
        target_tracking_configuration: json!({
            "PredefinedMetricSpecification": {
                "PredefinedMetricType": "ALBRequestCountPerTarget",
                "ResourceLabel": resource_label,
            },
            "TargetValue": target_requests_per_minute,
        }),
    };
    t.add_resource(
        logical_id,
        Resource::new(SCALING_POLICY_TYPE, &props)?.depends_on(listener),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const IDS: FleetIds = FleetIds {
        role: "Role",
        instance_profile: "Profile",
        security_group: "Sg",
        launch_template: "Lt",
        group: "Asg",
        ami_parameter: "Ami",
    };

    fn fleet() -> FleetProps {
        FleetProps {
            image: MachineImage::default(),
            instance_type: "t3.micro".into(),
            user_data: "#!/bin/bash\necho hi\n".into(),
            capacity: Capacity::default(),
            root_volume_gib: 8,
            target_requests_per_minute: 1,
        }
    }

    #[test]
    fn role_has_ssm_policy_and_profile() {
        let mut t = Template::new(None);
        add_instance_role(&mut t, &IDS).unwrap();
        let role = t.resource("Role").unwrap();
        assert_eq!(
            role.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"],
            json!({ "Service": "ec2.amazonaws.com" })
        );
        let arn = role.properties["ManagedPolicyArns"][0].to_string();
        assert!(arn.contains("AmazonSSMManagedInstanceCore"));
        assert_eq!(
            t.resource("Profile").unwrap().properties,
            json!({ "Roles": [{ "Ref": "Role" }] })
        );
    }

    #[test]
    fn launch_template_embeds_user_data_verbatim() {
        let mut t = Template::new(None);
        add_launch_template(&mut t, &IDS, &fleet()).unwrap();
        let data = &t.resource("Lt").unwrap().properties["LaunchTemplateData"];
        assert_eq!(data["UserData"], json!({ "Fn::Base64": "#!/bin/bash\necho hi\n" }));
        assert_eq!(data["ImageId"], json!({ "Ref": "Ami" }));
        assert_eq!(
            data["BlockDeviceMappings"],
            json!([{ "DeviceName": "/dev/xvda",
                     "Ebs": { "VolumeSize": 8, "Encrypted": true, "VolumeType": "gp2" } }])
        );
        assert_eq!(
            t.parameter("Ami").unwrap().default.as_deref(),
            Some(AMAZON_LINUX_2_PARAMETER)
        );
    }

    #[test]
    fn fixed_ami_declares_no_parameter() {
        let mut t = Template::new(None);
        let mut f = fleet();
        f.image = MachineImage::AmiId("ami-123".into());
        add_launch_template(&mut t, &IDS, &f).unwrap();
        assert!(t.parameter("Ami").is_none());
        assert_eq!(
            t.resource("Lt").unwrap().properties["LaunchTemplateData"]["ImageId"],
            json!("ami-123")
        );
    }

    #[test]
    fn group_sizes_render_as_strings() {
        let mut t = Template::new(None);
        let mut f = fleet();
        f.capacity = Capacity { min: 1, max: 4, desired: Some(2) };
        let vpc = VpcPlacement {
            vpc_id: "vpc-1".into(),
            private_subnets: vec!["subnet-a".into(), "subnet-b".into()],
            public_subnets: vec![],
        };
        add_auto_scaling_group(&mut t, &IDS, &f, &vpc, "Tg").unwrap();
        let p = &t.resource("Asg").unwrap().properties;
        assert_eq!(p["MinSize"], json!("1"));
        assert_eq!(p["MaxSize"], json!("4"));
        assert_eq!(p["DesiredCapacity"], json!("2"));
        assert_eq!(p["VPCZoneIdentifier"], json!(["subnet-a", "subnet-b"]));
        assert_eq!(p["TargetGroupARNs"], json!([{ "Ref": "Tg" }]));
    }

    #[test]
    fn scaling_tracks_requests_per_target() {
        let mut t = Template::new(None);
        add_request_count_scaling(&mut t, "Scale", &IDS, 1, "Lb", "Tg", "Listener").unwrap();
        let r = t.resource("Scale").unwrap();
        assert_eq!(r.depends_on, vec!["Listener".to_string()]);
        let cfg = &r.properties["TargetTrackingConfiguration"];
        assert_eq!(cfg["TargetValue"], json!(1));
        assert_eq!(
            cfg["PredefinedMetricSpecification"]["PredefinedMetricType"],
            json!("ALBRequestCountPerTarget")
        );
    }
}
