// ABOUTME: Binary entry point for the cliq command line tool
// ABOUTME: Loads configuration and dispatches to the selected subcommand

use anyhow::Result;
use cliq::cli::App;

#[tokio::main]
async fn main() -> Result<()> {
    let (mut app, args) = App::from_args()?;

    app.run(args).await?;

    Ok(())
}
