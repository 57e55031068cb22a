//! Config -> app wiring: policy unit, workload unit, ordering dependency.

use lampstack_core::Result;

use crate::app::{App, Environment};
use crate::assembly::CloudAssembly;
use crate::config::{self, SynthConfig};
use crate::waf::{self, CustomRuleSettings, ManagedRuleGroup, WafProps};
use crate::workload::{self, Capacity, FleetProps, MachineImage, VpcPlacement, WorkloadProps};

impl SynthConfig {
    pub fn environment(&self) -> Environment {
        Environment::new(&self.env.account, &self.env.region)
    }

    pub fn waf_props(&self) -> WafProps {
        WafProps {
            env: self.environment(),
            scope: self.waf.scope,
            managed_rules: self
                .waf
                .managed_rules
                .iter()
                .map(|r| ManagedRuleGroup {
                    name: r.name.clone(),
                    priority: r.priority,
                    override_action: r.override_action.into(),
                    excluded_rules: r.excluded_rules.clone(),
                })
                .collect(),
            custom_rules: CustomRuleSettings {
                allowed_countries: self.waf.allowed_countries.clone(),
                rate_limit: self.waf.rate_limit,
                rate_limit_key: self.waf.rate_limit_key,
                action: self.waf.custom_rule_action.into(),
            },
        }
    }

    pub fn workload_props(&self, user_data: String) -> WorkloadProps {
        let w = &self.workload;
        let image = match (&w.image.ami_id, &w.image.ssm_parameter) {
            (Some(id), _) => MachineImage::AmiId(id.clone()),
            (None, Some(param)) => MachineImage::SsmParameter(param.clone()),
            (None, None) => MachineImage::default(),
        };
        WorkloadProps {
            env: self.environment(),
            vpc: VpcPlacement {
                vpc_id: self.network.vpc_id.clone(),
                private_subnets: self.network.private_subnets.clone(),
                public_subnets: self.network.public_subnets.clone(),
            },
            fleet: FleetProps {
                image,
                instance_type: w.instance_type.clone(),
                user_data,
                capacity: Capacity {
                    min: w.capacity.min,
                    max: w.capacity.max,
                    desired: w.capacity.desired,
                },
                root_volume_gib: w.root_volume_gib,
                target_requests_per_minute: w.target_requests_per_minute,
            },
            certificate_arn: w.certificate_arn.clone(),
            web_acl_export: waf::WAF_ACL_EXPORT_NAME.to_string(),
        }
    }
}

/// Policy unit first, then the workload unit, which deploys after it.
pub fn build_app(cfg: &SynthConfig, user_data: String) -> Result<App> {
    let mut app = App::new();
    app.add_stack(waf::build_waf_stack(&cfg.waf_props())?)?;
    app.add_stack(workload::build_lamp_stack(&cfg.workload_props(user_data))?)?;
    app.add_dependency(workload::LAMP_STACK_ID, waf::WAF_STACK_ID)?;
    Ok(app)
}

/// Read the boot script named by the config and synthesize the assembly.
pub fn synth(cfg: &SynthConfig) -> Result<CloudAssembly> {
    let user_data = config::read_user_data(&cfg.workload.user_data_path)?;
    build_app(cfg, user_data)?.synth()
}
