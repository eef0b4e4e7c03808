//! Background removal Telegram bot
//!
//! Runs the long-polling dispatcher built by the bgremove-bot library.

#[cfg(feature = "cli")]
use bgremove_bot::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
