//! lampstack synthesizer
//!
//! Usage: `lampstack [CONFIG]` (default `lampstack.yaml`)
//! - Load + validate config (strict YAML)
//! - Build WafRegionalStack, then CdkLampstackStack depending on it
//! - Write templates and manifest to `output.dir`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lampstack_synth::config;

#[derive(Parser)]
#[command(name = "lampstack", version)]
#[command(about = "Synthesize the WAF and LAMP stack templates into a cloud assembly", long_about = None)]
struct Cli {
    /// Path to the synth config
    #[arg(default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run(&cli.config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), "{e}");
            eprintln!("lampstack: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &std::path::Path) -> lampstack_core::Result<()> {
    let cfg = config::load_from_file(path)?;
    tracing::info!(config = %path.display(), env = %cfg.environment().uri(), "lampstack synth starting");

    let assembly = lampstack_synth::synth(&cfg)?;
    let written = assembly.write_to(&cfg.output.dir)?;

    tracing::info!(dir = %cfg.output.dir.display(), files = written.len(), "cloud assembly written");
    Ok(())
}
