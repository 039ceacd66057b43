//! The `split` subcommand.

use clap::Args;
use futures::StreamExt as _;
use tokio::{
    fs::File,
    io::{AsyncWriteExt as _, BufWriter},
};

use crate::{
    async_utils::{BoxedStream, blocking_iter_streams::BlockingIterStream},
    config::ConfigOpts,
    prelude::*,
    run::{LabelRun, RunEvent},
    ui::{ProgressConfig, Ui, set_fraction},
};

/// Split command line arguments.
#[derive(Debug, Args)]
pub struct SplitOpts {
    /// The label PDF to split.
    #[clap(value_name = "PDF")]
    pub input_path: PathBuf,

    /// Also write every run event to this file, as JSON Lines.
    #[clap(long = "events", value_name = "PATH")]
    pub events_path: Option<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigOpts,
}

/// The `split` subcommand.
#[instrument(level = "debug", skip_all, fields(input = %opts.input_path.display()))]
pub async fn cmd_split(ui: Ui, opts: &SplitOpts) -> Result<()> {
    let config = opts.config.resolve()?;

    let mut events_out = match &opts.events_path {
        Some(path) => Some(BufWriter::new(File::create(path).await.with_context(
            || format!("Failed to create events file {:?}", path),
        )?)),
        None => None,
    };

    let pb = ui.new_fraction_bar(&ProgressConfig {
        emoji: "🏷️",
        msg: "Splitting labels",
        done_msg: "Split labels",
    });

    // The run is blocking code, so each step runs on a worker thread.
    let run = LabelRun::open(opts.input_path.clone(), config);
    let mut events: BoxedStream<RunEvent> = BlockingIterStream::new(run).boxed();
    let mut outcome = None;
    while let Some(event) = events.next().await {
        if let Some(out) = events_out.as_mut() {
            let mut line =
                serde_json::to_string(&event).context("failed to serialize run event")?;
            line.push('\n');
            out.write_all(line.as_bytes())
                .await
                .context("failed to write run event")?;
        }
        match event {
            RunEvent::Progress { fraction, message } => {
                set_fraction(&pb, fraction);
                pb.set_message(message);
            }
            terminal => outcome = Some(terminal),
        }
    }
    if let Some(mut out) = events_out {
        out.flush().await.context("failed to flush events file")?;
    }

    match outcome {
        Some(RunEvent::Completed {
            count,
            output_dir,
            notices,
        }) => {
            pb.finish_using_style();
            for notice in &notices {
                println!("note: {}", notice);
            }
            println!("{} label(s) written to {}", count, output_dir.display());
            Ok(())
        }
        Some(RunEvent::Failed { error }) => {
            pb.abandon();
            Err(anyhow!(error))
        }
        _ => {
            pb.abandon();
            Err(anyhow!("label run ended without a result"))
        }
    }
}
