use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod cmd;
mod compose;
mod config;
mod document;
mod error;
mod geometry;
mod locate;
mod naming;
mod output;
mod prelude;
mod run;
mod text;
mod trim;
mod ui;

/// Split shipping-label PDFs into one image per order.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - LABEL_SPLITTER_BASE_DIR (optional): Where the `etiquetas` output folder
    is created. Defaults to the directory containing this executable.
  - RUST_LOG (optional): Log filter, for example `label_splitter=debug`.

  These variables may be set in a standard `.env` file.

Requires `pdfinfo`, `pdftotext` and `pdftocairo` from poppler-utils.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Cut every label out of a PDF and save it as `<identifier>.jpg`.
    Split(cmd::split::SplitOpts),
    /// Show the pages, output folder and identifiers of a PDF without
    /// rendering it.
    Info(cmd::info::InfoOpts),
    /// Print schemas for the event stream and profile files.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Split(_) => false,
            Cmd::Info(_) => true,
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Load environment variables from a `.env` file, if it exists. This
    // happens first so `RUST_LOG` can be set there too.
    dotenvy::dotenv().ok();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bar if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Split(split_opts) => cmd::split::cmd_split(ui, split_opts).await?,
        Cmd::Info(info_opts) => cmd::info::cmd_info(info_opts).await?,
        Cmd::Schema(schema_opts) => cmd::schema::cmd_schema(schema_opts).await?,
    }
    Ok(())
}
