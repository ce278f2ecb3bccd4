use clap::Parser;

#[derive(Parser)]
#[command(name = "hostprep")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a remote dev environment over SSH", long_about = None)]
pub struct Cli {
    /// Host to provision (SSH config alias, hostname or user@host)
    pub host: String,

    /// Show what would change without modifying the host
    #[arg(short, long)]
    pub preview: bool,
}
