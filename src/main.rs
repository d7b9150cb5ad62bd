//! Ensemble - stateful multi-agent orchestration
//!
//! Main entry point for the CLI application.

use clap::Parser;
use ensemble::Config;

/// Ensemble - stateful multi-agent orchestration
#[derive(Parser, Debug)]
#[command(name = "ensemble")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Financial request to run the advisory pipeline on
    #[arg(long, short = 'r')]
    request: Option<String>,

    /// Worker model
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Write a default config file to the config directory and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        if !config.is_known_model(model) {
            eprintln!("warning: model '{}' is not in the configured alternatives", model);
        }
        config.set_worker_model(model.clone());
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.init_config {
        // API keys stay in the environment, not on disk
        let mut defaults = Config::default();
        defaults.gemini.api_key = None;
        defaults.save()?;
        println!("Wrote {}", Config::config_file().display());
        print!("{}", Config::default_config_toml());
        return Ok(());
    }

    if args.show_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let Some(request) = args.request else {
        anyhow::bail!("no request given; pass one with --request");
    };

    ensemble::cli::run_advisory(&config, &request).await?;

    Ok(())
}
