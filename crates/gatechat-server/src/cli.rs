use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "gatechat-server", about = "Gated community chat server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "data/gatechat.toml")]
    pub config: String,

    /// Bind address (overrides config)
    #[arg(long)]
    pub bind: Option<String>,
}
