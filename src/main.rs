use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod decoder;
mod file_io;
mod message_types;
mod orderbook;
mod output;
mod pipeline;
mod pricer;
mod websocket;

use orderbook::Book;
use output::{OutputMode, ResultWriter};
use pipeline::{run_pipeline, PipelineError, PipelineStats};
use pricer::BsParams;
use websocket::{publish_update, BookUpdate, WebSocketServer};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// ITCH 5.0 order book + Black-Scholes pricer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the ITCH 5.0 byte stream, or "-" for standard input
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the result stream, or "-" for standard output
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Option strike price (K)
    #[arg(long, default_value_t = 100.0)]
    strike: f32,

    /// Risk-free rate (r)
    #[arg(long, default_value_t = 0.05)]
    rate: f32,

    /// Volatility (sigma)
    #[arg(long, default_value_t = 0.20)]
    volatility: f32,

    /// Maturity in years (T)
    #[arg(long, default_value_t = 1.0)]
    maturity: f32,

    /// "binary" (default) or "text"
    #[arg(long, value_enum, default_value = "binary")]
    output_mode: OutputMode,

    /// Emit a (0, 0) pair for every Ignored message too
    #[arg(long, default_value_t = false)]
    emit_on_ignored: bool,

    /// Start the WebSocket broadcast server
    #[arg(short, long, default_value_t = false)]
    serve: bool,

    /// WebSocket server port
    #[arg(short = 'p', long, default_value_t = 8473)]
    port: u16,
}

fn read_input(path: &PathBuf) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        // Memory-map real files, matching the teacher's file_io::map_file;
        // copy out of the map so the pipeline can own a plain byte slice
        // independent of the mmap's lifetime.
        let mmap = file_io::map_file(path)?;
        Ok(mmap.to_vec())
    }
}

/// Run the pipeline on a blocking-pool thread: `run_pipeline` is
/// synchronous, CPU-bound work, and must not occupy an async worker thread
/// that the WebSocket accept loop (spawned alongside it) needs to drive.
fn run_pipeline_blocking(
    data: Vec<u8>,
    params: BsParams,
    output_path: PathBuf,
    output_mode: OutputMode,
    emit_on_ignored: bool,
    publisher: Option<tokio::sync::broadcast::Sender<String>>,
) -> Result<(Book, PipelineStats), PipelineError> {
    let mut book = Book::new();
    let on_result = |top, prices| {
        if let Some(tx) = &publisher {
            publish_update(tx, BookUpdate { top, prices });
        }
    };

    let stats = if output_path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = ResultWriter::new(stdout.lock(), output_mode);
        run_pipeline(&data, &mut book, &params, &mut writer, emit_on_ignored, on_result)?
    } else {
        let file = std::fs::File::create(&output_path).map_err(PipelineError::OutputWrite)?;
        let mut writer = ResultWriter::new(io::BufWriter::new(file), output_mode);
        run_pipeline(&data, &mut book, &params, &mut writer, emit_on_ignored, on_result)?
    };

    Ok((book, stats))
}

async fn run(args: Args) -> Result<(), PipelineError> {
    tracing_subscriber::fmt::init();

    let data = read_input(&args.input).map_err(PipelineError::InputOpen)?;
    tracing::info!("loaded {} bytes from {:?}", data.len(), args.input);

    let params = BsParams {
        strike: args.strike,
        rate: args.rate,
        volatility: args.volatility,
        maturity: args.maturity,
    };

    // Bind (and start accepting on) the WebSocket server *before* the
    // pipeline runs. Publishing into a broadcast channel with no bound
    // listener behind it silently drops every update, so the listener has
    // to be live first, not started only after the run completes.
    let (publisher, server_task) = if args.serve {
        match WebSocketServer::bind(args.port).await {
            Ok(server) => {
                let publisher = server.publisher();
                let handle = tokio::spawn(async move {
                    if let Err(e) = server.serve().await {
                        tracing::error!("WebSocket server stopped: {}", e);
                    }
                });
                (Some(publisher), Some(handle))
            }
            Err(e) => {
                // Transport glue failing to bind is outside the core's
                // exit-code taxonomy (spec.md §6.4 covers input/framing/
                // output only); log and run the core pipeline regardless.
                tracing::error!("failed to start WebSocket server: {}", e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let (book, stats) = tokio::task::spawn_blocking(move || {
        run_pipeline_blocking(
            data,
            params,
            args.output,
            args.output_mode,
            args.emit_on_ignored,
            publisher,
        )
    })
    .await
    .expect("pipeline worker thread panicked")?;

    tracing::info!(
        "done: messages={} ignored={} live_orders={}",
        stats.messages,
        stats.ignored,
        book.order_count()
    );

    if let Some(handle) = server_task {
        // The accept loop only returns on a listener error; keep the
        // process alive to keep serving already-connected clients.
        let _ = handle.await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::from(0),
        Err(err @ PipelineError::InputOpen(_)) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
        Err(err @ PipelineError::Framing(_)) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err @ PipelineError::OutputWrite(_)) => {
            eprintln!("{err}");
            ExitCode::from(3)
        }
    }
}
