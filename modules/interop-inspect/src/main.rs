use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use interop_trace::{SpanId, TraceLog};

#[derive(Parser)]
#[command(name = "trace-inspect", about = "Inspect a persisted event trace")]
struct Cli {
    /// Trace file to read
    file: PathBuf,

    /// Show the causal ancestry of this span (hex)
    #[arg(long)]
    span: Option<String>,

    /// With --span: require causes carrying one of these event types
    #[arg(long = "cause-type")]
    cause_types: Vec<String>,

    /// With --cause-type: how many matching causes are required
    #[arg(long, default_value_t = 1)]
    min_causes: usize,

    /// List spans that carry an event of this type
    #[arg(long = "type")]
    event_type: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("interop=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!(file = %cli.file.display(), "Loading trace");
    let log = TraceLog::from_path(&cli.file)?;

    println!(
        "spans: {}  events: {}  roots: {}  unreadable lines: {}",
        log.span_count(),
        log.event_count(),
        log.root_spans().len(),
        log.skipped_lines()
    );

    if let Some(event_type) = cli.event_type.as_deref() {
        let spans = log.spans_with_event(event_type);
        println!("\n{} span(s) with {event_type}:", spans.len());
        for span in spans {
            println!("  {span}");
        }
    }

    if let Some(span) = cli.span.as_deref() {
        let span: SpanId = span.parse()?;
        let Some(causes) = log.causes(span) else {
            anyhow::bail!("span {span} is not in the trace");
        };

        println!("\n{span} {:?}", log.event_types(span));
        println!("direct causes:");
        for cause in causes {
            println!("  {cause} {:?}", log.event_types(*cause));
        }
        println!("ancestry:");
        for ancestor in log.ancestors(span) {
            println!("  {ancestor} {:?}", log.event_types(ancestor));
        }

        if !cli.cause_types.is_empty() {
            let types: Vec<&str> = cli.cause_types.iter().map(String::as_str).collect();
            let ok = log.check_event_trace_cause(span, &types, cli.min_causes);
            println!(
                "\ncause check ({} of {:?}): {}",
                cli.min_causes,
                types,
                if ok { "pass" } else { "fail" }
            );
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
