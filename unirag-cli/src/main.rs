use clap::Parser;
use unirag_cli::{Cli, logging, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            // A missing .env is fine.
            let _ = dotenvy::dotenv();
        }
    }

    logging::init(cli.log_json);

    let output = run(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
