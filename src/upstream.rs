/*!
Upstream BGP monitor client, spec §4.3 and §6.

The raw socket/framing library is an external collaborator in principle, but
a standalone binary needs something to run against, so [`TcpUpstreamClient`]
provides a minimal, textually-correct framer on top of a plain `TcpStream` —
reading whole `<BGP_MESSAGE>...</BGP_MESSAGE>` documents one at a time,
matching the byte-oriented reader construction in `io.rs`'s teacher pattern,
adapted from file opening to socket framing.
*/
use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::RelayError;

const OPEN_TAG: &str = "<BGP_MESSAGE>";
const CLOSE_TAG: &str = "</BGP_MESSAGE>";

/// Contract for the upstream BGP monitor connection, spec §4.3/§6.
pub trait UpstreamClient {
    fn connect(&mut self) -> Result<(), RelayError>;
    /// Blocks until one full message is available, the connection drops, or
    /// a transient I/O error occurs. `Ok(None)` means the peer closed the
    /// connection cleanly.
    fn read_one_message(&mut self) -> Result<Option<Vec<u8>>, RelayError>;
    fn is_connected(&self) -> bool;
    fn close(&mut self);
}

/// A [`UpstreamClient`] that frames whole `<BGP_MESSAGE>` documents out of a
/// TCP byte stream.
pub struct TcpUpstreamClient {
    addr: String,
    connect_timeout: Duration,
    reader: Option<BufReader<TcpStream>>,
}

impl TcpUpstreamClient {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        TcpUpstreamClient {
            addr: addr.into(),
            connect_timeout,
            reader: None,
        }
    }
}

impl UpstreamClient for TcpUpstreamClient {
    fn connect(&mut self) -> Result<(), RelayError> {
        let socket_addr = self
            .addr
            .parse()
            .map_err(|e| RelayError::Upstream(format!("invalid address '{}': {e}", self.addr)))?;
        let stream = TcpStream::connect_timeout(&socket_addr, self.connect_timeout)
            .map_err(|e| RelayError::Upstream(format!("{}: {e}", self.addr)))?;
        stream.set_nodelay(true).ok();
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    fn read_one_message(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(None),
        };

        // Skip forward to the next opening tag; bytes outside a message
        // frame (whitespace, stray newlines) are not meaningful.
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.len() > OPEN_TAG.len() {
                        buf.remove(0);
                    }
                    if buf.ends_with(OPEN_TAG.as_bytes()) {
                        break;
                    }
                }
                Err(e) => return Err(RelayError::Io(e)),
            }
        }

        let mut message = OPEN_TAG.as_bytes().to_vec();
        loop {
            let mut line = Vec::new();
            let n = reader
                .read_until(b'>', &mut line)
                .map_err(RelayError::Io)?;
            if n == 0 {
                return Ok(None);
            }
            message.extend_from_slice(&line);
            if message.ends_with(CLOSE_TAG.as_bytes()) {
                return Ok(Some(message));
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn reads_one_framed_message() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(b"<BGP_MESSAGE><ASCII_MSG>hello</ASCII_MSG></BGP_MESSAGE>")
                .unwrap();
        });

        let mut client = TcpUpstreamClient::new(addr.to_string(), Duration::from_secs(1));
        client.connect().unwrap();
        let msg = client.read_one_message().unwrap().unwrap();
        assert!(msg.starts_with(OPEN_TAG.as_bytes()));
        assert!(msg.ends_with(CLOSE_TAG.as_bytes()));

        server.join().unwrap();
    }

    #[test]
    fn clean_close_yields_none() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
        });

        let mut client = TcpUpstreamClient::new(addr.to_string(), Duration::from_secs(1));
        client.connect().unwrap();
        let msg = client.read_one_message().unwrap();
        assert!(msg.is_none());

        server.join().unwrap();
    }
}
