use clap::Parser;
use docker_registry_mirror::cli::{Args, Runner};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(error) = Runner::run(args).await {
        eprintln!("sync failed: {}", error);
        std::process::exit(1);
    }
}
