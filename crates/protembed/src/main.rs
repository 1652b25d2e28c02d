use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use protembed::cli::Cli;
use protembed::pipeline::ExtractionRun;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Info)
        .parse_env(env_logger::Env::default().filter_or("PROTEMBED_LOG", "info"))
        .init();

    let cli = Cli::parse();
    let config = cli.into_config()?;
    let run = ExtractionRun::new(config)?;
    run.run()?;
    Ok(())
}
