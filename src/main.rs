use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use termcord::core::config::{self, CliOverrides};
use termcord::tui;

#[derive(Parser)]
#[command(name = "termcord", about = "Terminal chat client")]
struct Args {
    /// Session state file (default ~/.termcord/state.json)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Directory of theme JSON files (default ~/.termcord/themes)
    #[arg(long)]
    themes_dir: Option<PathBuf>,

    /// Command prefix (default "/")
    #[arg(long)]
    prefix: Option<String>,

    /// Log file path
    #[arg(long, default_value = "termcord.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Failed to load config, using defaults: {}", e);
            config::TermcordConfig::default()
        }
    };
    let cli = CliOverrides {
        state_file: args.state_file,
        themes_dir: args.themes_dir,
        prefix: args.prefix,
    };
    let resolved = config::resolve(&file_config, &cli);
    log::info!(
        "termcord starting (state: {}, themes: {})",
        resolved.state_file.display(),
        resolved.themes_dir.display()
    );

    let env_token = std::env::var("TOKEN").ok();
    let code = tui::run(resolved, env_token)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
