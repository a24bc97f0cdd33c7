use anyhow::{Context, Result};
use clap::Parser;
use loan_assistant::{
    app::App,
    logging,
    settings::{Args, Settings},
    web,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())
        .context("Problem while loading settings")?;
    logging::init(&settings.log);
    info!("Loan assistant starting");

    let app = App::from_settings(&settings)?;
    app.build_index()
        .await
        .context("Problem while building the knowledge index")?;

    web::serve(app.assistant, settings.web.address)
        .await
        .context("Problem while serving")?;
    Ok(())
}
