use clap::Parser;

/// Workshop queue CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "workshop-queue",
    version,
    about = "Equipment opening queue service for the repair workshop"
)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub bind: Option<String>,

    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Messaging gateway base URL
    #[arg(long)]
    pub messenger_url: Option<String>,
}
