/*!
Subscriber acceptor, spec §4.5.

Grounded on the teacher's thread-per-connection pattern in its BMP listener
example: accept in a loop, spawn one OS thread per connection. That example
joins the spawned thread immediately, which serializes every connection
behind the one before it — here the thread is spawned and detached instead,
deregistering itself from the registry on exit.
*/
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{error, info};

use crate::error::RelayError;
use crate::subscriber::handler::run_handler;
use crate::subscriber::{Registry, Subscriber};

/// Accept subscriber connections until `shutdown` is set. Each accepted
/// connection gets a bounded envelope queue of `queue_capacity` and its own
/// detached handler thread.
pub fn run(
    listener: TcpListener,
    registry: Arc<Registry>,
    queue_capacity: usize,
    shutdown: Arc<AtomicBool>,
) -> Result<(), RelayError> {
    listener
        .set_nonblocking(true)
        .map_err(|e| RelayError::Bind(e.to_string()))?;

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let id = registry.next_id();
                let (tx, rx) = crossbeam_channel::bounded(queue_capacity);
                let subscriber = Subscriber::new(id, tx);
                let alive = subscriber.alive.clone();
                registry.insert(subscriber);
                info!("subscriber {id} connected from {peer}");

                let registry = registry.clone();
                let shutdown = shutdown.clone();
                thread::spawn(move || {
                    run_handler(id, stream, rx, alive, shutdown);
                    registry.remove(id);
                    info!("subscriber {id} disconnected");
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                error!("accept() failed: {e}");
                thread::sleep(std::time::Duration::from_millis(50));
            }
        }
    }
    Ok(())
}
