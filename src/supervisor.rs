/*!
Startup wiring and lifecycle, spec §4.7.

Every fallible step here — config, rule file, output file, listener bind,
upstream connect — is fatal before any worker thread spawns, per spec §7.
Once running, `INT`/`TERM`/`HUP` all set the shared shutdown flag; workers
poll it cooperatively and the supervisor joins them before returning.
*/
use std::fs::OpenOptions;
use std::net::TcpListener;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::RelayConfig;
use crate::dispatch;
use crate::error::RelayError;
use crate::filter::FilterStore;
use crate::model::Envelope;
use crate::subscriber::{acceptor, Registry};
use crate::upstream::{TcpUpstreamClient, UpstreamClient};
use crate::xml::SimpleTranslator;

const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logger(config: &RelayConfig) -> Result<(), RelayError> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.log_level_filter());

    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(RelayError::Io)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Run the relay until shutdown. Returns only after a fatal startup error
/// or a clean shutdown.
pub fn run(config: RelayConfig) -> Result<(), RelayError> {
    let mut store = FilterStore::new();
    store.load(&config.rules_file)?;
    store.condense();
    info!(
        "loaded {} v4 / {} v6 / {} as / {} host rules",
        store.count_v4(),
        store.count_v6(),
        store.count_as(),
        store.count_host()
    );
    let store = Arc::new(store);

    let output_file = match &config.output_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(RelayError::Io)?,
        ),
        None => None,
    };

    let listener = TcpListener::bind(&config.listen_addr)
        .map_err(|e| RelayError::Bind(format!("{}: {e}", config.listen_addr)))?;

    let mut upstream = TcpUpstreamClient::new(config.upstream_addr.clone(), UPSTREAM_CONNECT_TIMEOUT);
    upstream.connect()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&shutdown)?;

    let registry = Arc::new(Registry::new());
    let (upstream_tx, upstream_rx) = crossbeam_channel::bounded::<Envelope>(config.queue_length);

    let reader_shutdown = shutdown.clone();
    let reader = thread::spawn(move || run_reader(upstream, upstream_tx, reader_shutdown));

    let dispatch_shutdown = shutdown.clone();
    let dispatch_store = store.clone();
    let dispatch_registry = registry.clone();
    let stdout_enabled = config.stdout;
    let dispatch_handle = thread::spawn(move || {
        dispatch::run(
            upstream_rx,
            Arc::new(SimpleTranslator),
            dispatch_store,
            dispatch_registry,
            output_file,
            stdout_enabled,
            dispatch_shutdown,
        )
    });

    let acceptor_shutdown = shutdown.clone();
    let acceptor_registry = registry.clone();
    let acceptor_handle =
        thread::spawn(move || acceptor::run(listener, acceptor_registry, config.queue_length, acceptor_shutdown));

    reader.join().expect("reader thread panicked");
    dispatch_handle.join().expect("dispatch thread panicked");
    acceptor_handle
        .join()
        .expect("acceptor thread panicked")?;

    registry.shutdown_all();
    info!("shutdown complete");
    Ok(())
}

const BACKPRESSURE_YIELD: Duration = Duration::from_millis(50);

fn run_reader(mut upstream: impl UpstreamClient, tx: crossbeam_channel::Sender<Envelope>, shutdown: Arc<AtomicBool>) {
    use std::sync::atomic::Ordering;

    let mut seq = 0u64;
    while !shutdown.load(Ordering::SeqCst) {
        match upstream.read_one_message() {
            Ok(Some(bytes)) => {
                seq += 1;
                // cooperative backpressure: retry a full queue in short
                // bounded waits rather than blocking indefinitely, so a
                // shutdown request is still observed promptly
                let mut envelope = Envelope::new(seq, bytes);
                loop {
                    match tx.send_timeout(envelope, BACKPRESSURE_YIELD) {
                        Ok(()) => break,
                        Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return,
                        Err(crossbeam_channel::SendTimeoutError::Timeout(env)) => {
                            if shutdown.load(Ordering::SeqCst) {
                                return;
                            }
                            envelope = env;
                        }
                    }
                }
            }
            Ok(None) => {
                warn!("upstream connection closed");
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                warn!("transient upstream read error: {e}");
            }
        }
    }
    upstream.close();
}

fn install_signal_handlers(shutdown: &Arc<AtomicBool>) -> Result<(), RelayError> {
    for sig in [
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGHUP,
    ] {
        signal_hook::flag::register(sig, shutdown.clone())
            .map_err(|e| RelayError::Config(format!("failed to install signal handler: {e}")))?;
    }
    Ok(())
}
