/*!
Subscriber handler, spec §4.6.

One thread per connected subscriber. Writes the literal `<xml>` prolog (no
trailing newline — subsequent envelope bytes are concatenated directly after
it, per spec §4.6/§6), then blocks on
its envelope queue until something arrives, the shutdown flag is set, or its
own `alive` flag is cleared (used to wake a handler that the acceptor or
dispatch worker wants to retire without going through the socket). The
handler never reads from its socket — subscribers are receive-only per spec
§6.
*/
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};

use crate::model::Envelope;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run_handler(
    id: u64,
    mut stream: TcpStream,
    rx: Receiver<Envelope>,
    alive: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    if let Err(e) = stream.write_all(b"<xml>") {
        warn!("subscriber {id}: failed to write prolog: {e}");
        return;
    }

    loop {
        if shutdown.load(Ordering::SeqCst) || !alive.load(Ordering::SeqCst) {
            return;
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(envelope) => {
                if let Err(e) = stream.write_all(&envelope.xml) {
                    debug!("subscriber {id}: write failed, deregistering: {e}");
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn writes_prolog_then_envelopes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let (tx, rx) = crossbeam_channel::bounded(4);
            let alive = Arc::new(AtomicBool::new(true));
            let shutdown = Arc::new(AtomicBool::new(false));
            tx.send(Envelope::new(1, &b"<BGP_MESSAGE/>"[..])).unwrap();
            let shutdown_clone = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                shutdown_clone.store(true, Ordering::SeqCst);
            });
            run_handler(1, stream, rx, alive, shutdown);
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let mut buf = Vec::new();
        client.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let _ = client.read_to_end(&mut buf);

        assert_eq!(buf, b"<xml><BGP_MESSAGE/>");

        server.join().unwrap();
    }
}
