//! Command-line argument parsing

use clap::Parser;

#[derive(Parser)]
#[command(name = "docker-registry-mirror")]
#[command(about = "Mirror a Docker registry repository into local content storage")]
#[command(version, author)]
pub struct Args {
    /// Remote registry URL
    #[arg(
        long = "url",
        short = 'r',
        help = "Base URL of the remote registry, e.g. https://registry-1.docker.io"
    )]
    pub url: String,

    /// Repository to mirror
    #[arg(
        long = "repository",
        short = 'n',
        help = "Repository name inside the registry, e.g. library/alpine"
    )]
    pub repository: String,

    /// Storage directory for downloaded artifacts
    #[arg(
        long = "storage",
        short = 's',
        default_value = "./mirror-storage",
        help = "Directory where downloaded artifacts are kept"
    )]
    pub storage: String,

    /// Registry username
    #[arg(
        long = "username",
        short = 'u',
        help = "Username for registry authentication"
    )]
    pub username: Option<String>,

    /// Registry password
    #[arg(
        long = "password",
        short = 'p',
        help = "Password for registry authentication"
    )]
    pub password: Option<String>,

    /// Number of concurrent downloads
    #[arg(
        long = "concurrency",
        short = 'j',
        default_value = "4",
        help = "Global cap on simultaneous downloads"
    )]
    pub concurrency: usize,

    /// Capacity of the queues between pipeline stages
    #[arg(
        long = "queue-capacity",
        default_value = "64",
        help = "Bounded queue capacity between pipeline stages"
    )]
    pub queue_capacity: usize,

    /// Enable verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable debug logging")]
    pub verbose: bool,
}
