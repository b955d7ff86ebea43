mod cli;
mod loader;
mod report;
mod run;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    //  Logging (stderr, so stdout stays clean for the token output)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,llama_tokenize=debug")),
        )
        .init();

    let args = cli::Cli::parse();
    let report = run::execute(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_plain());
    }
    Ok(())
}
