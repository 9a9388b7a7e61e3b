use anyhow::Result;
use clap::Parser;

use tonytoken_cli::Config;

fn main() -> Result<()> {
    tonytoken_observability::init();

    let config = Config::parse();
    tracing::debug!(data_dir = %config.data_dir.display(), "starting tonytoken");

    let stdout = std::io::stdout();
    tonytoken_cli::run(&config, &mut stdout.lock())
}
