use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use loan_assistant::{
    app::App,
    logging,
    settings::{Args, Settings},
};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())
        .context("Problem while loading settings")?;
    logging::init(&settings.log);

    let app = App::from_settings(&settings)?;
    app.build_index()
        .await
        .context("Problem while building the knowledge index")?;

    if !app.index.is_ready() {
        eprintln!("No knowledge index was built; loan questions will fail until documents are added.");
    }
    println!("Ask a loan question (type 'exit' to quit).");
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match app.assistant.run(question).await {
            Ok(outcome) => {
                debug!(
                    intent = ?outcome.state.intent,
                    escalated = outcome.state.escalate_to_human(),
                    path = ?outcome.path,
                    "Run finished"
                );
                println!("{}\n", outcome.state.final_answer().unwrap_or_default());
            }
            Err(e) => eprintln!("Problem while answering: {e}\n"),
        }
    }
    Ok(())
}
