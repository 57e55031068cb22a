//! Synth config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use lampstack_core::error::{LampstackError, Result};

pub use schema::{
    CapacitySection, EnvSection, ImageSection, ManagedRuleConfig, NetworkSection, OutputSection,
    SynthConfig, WafSection, WorkloadSection,
};

pub const DEFAULT_CONFIG_PATH: &str = "lampstack.yaml";

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SynthConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| LampstackError::Io(format!("read config {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<SynthConfig> {
    let cfg: SynthConfig = serde_yaml::from_str(s)
        .map_err(|e| LampstackError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read the boot script verbatim.
pub fn read_user_data<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map_err(|e| LampstackError::Io(format!("read user data {} failed: {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: 1
env: { account: "111111111111", region: "us-east-1" }
network:
  vpc_id: vpc-1
  private_subnets: [subnet-a]
  public_subnets: [subnet-b]
workload:
  certificate_arn: "arn:aws:acm:us-east-1:111111111111:certificate/abc"
"#;

    #[test]
    fn defaults_fill_in() {
        let cfg = load_from_str(MINIMAL).unwrap();
        assert_eq!(cfg.workload.instance_type, "t3.micro");
        assert_eq!(cfg.workload.capacity.min, 1);
        assert_eq!(cfg.workload.capacity.max, 1);
        assert_eq!(cfg.workload.target_requests_per_minute, 1);
        assert_eq!(cfg.waf.managed_rules.len(), 6);
        assert_eq!(cfg.waf.allowed_countries, vec!["US", "CA"]);
        assert_eq!(cfg.waf.rate_limit, 100);
        assert_eq!(cfg.output.dir, std::path::PathBuf::from("cdk.out"));
    }

    #[test]
    fn read_user_data_missing_file_is_io() {
        let err = read_user_data("/nonexistent/user_data.sh").unwrap_err();
        assert_eq!(err.code().as_str(), "IO");
    }

    #[test]
    fn read_user_data_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("boot.sh");
        fs::write(&p, "#!/bin/bash\r\nyum -y install httpd\n\n").unwrap();
        assert_eq!(read_user_data(&p).unwrap(), "#!/bin/bash\r\nyum -y install httpd\n\n");
    }
}
