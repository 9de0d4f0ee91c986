use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Path to the gis-map-server config file (KEY=VALUE lines).
    pub config_path: PathBuf,
    /// Enables human-friendly logging instead of JSON.
    #[arg(short, long, default_value_t)]
    pub debug: bool,
}
