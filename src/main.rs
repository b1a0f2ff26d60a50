//! micstream binary
//!
//! Run with: micstream -d <DEVICE> [OPTIONS]
//!
//! Examples:
//!   micstream -d default                          # ALSA default device on 0.0.0.0:8080
//!   micstream -d hw:1,0 -c 2 -b 192               # stereo, 192 kbps
//!   micstream -s pulse -d default -p 9000 -v      # PulseAudio, debug logging
//!
//! Listen with:
//!   ffplay http://localhost:8080/stream.mp3
//!
//! Signals:
//!   SIGINT / SIGTERM   stop the encoder and exit
//!   SIGUSR1            pause capture
//!   SIGUSR2            resume capture

use std::process::ExitCode;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use micstream::cli::{self, Command, Options};
use micstream::error::{Error, Result};
use micstream::stats::ProducerStats;
use micstream::{pipeline, BroadcastHub, PacedSampleSource, ProcessSupervisor, StreamServer};

#[tokio::main]
async fn main() -> ExitCode {
    let options = match cli::parse(std::env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print!("{}", cli::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, cli::USAGE);
            return ExitCode::from(2);
        }
    };

    init_logging(options.verbose);

    for arg in &options.ignored {
        tracing::warn!(argument = %arg, "Ignoring unknown argument");
    }

    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "micstream=debug"
    } else {
        "micstream=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(options: Options) -> Result<()> {
    let encoder = options.encoder_config();
    let hub = BroadcastHub::new();

    let mut supervisor = ProcessSupervisor::from_config(&encoder);
    let output = supervisor.spawn(&encoder)?;

    let source = PacedSampleSource::from_output(output, encoder.chunk_size);
    let mut producer = tokio::spawn(pipeline::run(source.into_stream(), hub.clone()));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = StreamServer::new(options.server_config(), hub);
    let mut server_task = tokio::spawn(async move {
        server
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let result = supervise(&mut supervisor, &mut producer, &mut server_task).await;

    // Teardown runs on every exit path
    let _ = stop_tx.send(());
    if let Err(e) = supervisor.shutdown().await {
        tracing::warn!(error = %e, "Encoder shutdown failed");
    }

    result
}

/// Wait for an exit condition while handling pause/resume requests
///
/// The end of the encoder output is not an exit condition: listeners stay
/// connected and simply stop receiving data until the operator stops us.
async fn supervise(
    supervisor: &mut ProcessSupervisor,
    producer: &mut JoinHandle<ProducerStats>,
    server: &mut JoinHandle<Result<()>>,
) -> Result<()> {
    let mut terminate = ControlSignal::new(Control::Terminate)?;
    let mut pause = ControlSignal::new(Control::Pause)?;
    let mut resume = ControlSignal::new(Control::Resume)?;
    let mut producing = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                tracing::info!("Terminated, shutting down");
                return Ok(());
            }
            _ = pause.recv() => {
                if let Err(e) = supervisor.pause() {
                    tracing::warn!(error = %e, "Failed to pause encoder");
                }
            }
            _ = resume.recv() => {
                if let Err(e) = supervisor.resume() {
                    tracing::warn!(error = %e, "Failed to resume encoder");
                }
            }
            result = &mut *producer, if producing => {
                producing = false;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Producer task failed");
                }
                // Reaps the encoder if it has exited
                let running = supervisor.is_running();
                tracing::warn!(
                    encoder_running = running,
                    "Encoder output ended, still serving listeners"
                );
            }
            result = &mut *server => {
                return match result {
                    Ok(result) => result,
                    Err(e) => Err(Error::Io(std::io::Error::other(e))),
                };
            }
        }
    }
}

/// Operator signals beyond Ctrl-C
#[derive(Debug, Clone, Copy)]
enum Control {
    Terminate,
    Pause,
    Resume,
}

#[cfg(unix)]
struct ControlSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ControlSignal {
    fn new(control: Control) -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let kind = match control {
            Control::Terminate => SignalKind::terminate(),
            Control::Pause => SignalKind::user_defined1(),
            Control::Resume => SignalKind::user_defined2(),
        };

        Ok(Self(signal(kind)?))
    }

    async fn recv(&mut self) {
        self.0.recv().await;
    }
}

#[cfg(not(unix))]
struct ControlSignal;

#[cfg(not(unix))]
impl ControlSignal {
    fn new(_control: Control) -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
