/*!
Filter/dispatch worker, spec §4.4.

Drains the upstream queue, extracts a record from each envelope, matches it
against the compiled [`FilterStore`], and on a match writes the raw XML to
the output file and to every connected subscriber, plus stdout when the
`stdout` config key enables it (spec §6, default off). The XML record
extractor's path-query interface stands for the external translator (spec
§1); [`MessageTranslator`] is the seam a real implementation would plug into.
*/
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{error, warn};

use crate::extract::{extract_update, XmlSource};
use crate::filter::FilterStore;
use crate::model::Envelope;
use crate::subscriber::Registry;

/// Adapts one raw XML message into the path-query interface [`extract`]
/// consumes. The real translator is out of scope (spec §1); this is the seam
/// a caller wires a concrete implementation into.
pub trait MessageTranslator: Send + Sync {
    fn translate(&self, xml: &[u8]) -> Box<dyn XmlSource>;
}

/// Runs the filter/dispatch loop until `upstream_rx` is disconnected or
/// `shutdown` is set. Returns once both have happened and the queue has
/// drained.
pub fn run(
    upstream_rx: Receiver<Envelope>,
    translator: Arc<dyn MessageTranslator>,
    store: Arc<FilterStore>,
    registry: Arc<Registry>,
    mut output_file: Option<std::fs::File>,
    stdout_enabled: bool,
    shutdown: Arc<AtomicBool>,
) {
    let stdout = std::io::stdout();

    loop {
        let envelope = match upstream_rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(env) => env,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        };

        let source = translator.translate(&envelope.xml);
        let record = extract_update(source.as_ref());

        if !store.matches(&record) {
            continue;
        }

        if stdout_enabled {
            let mut handle = stdout.lock();
            if let Err(e) = handle.write_all(&envelope.xml) {
                error!("stdout write failed: {e}");
            }
        }

        if let Some(file) = output_file.as_mut() {
            if let Err(e) = file.write_all(&envelope.xml) {
                error!("output file write failed: {e}");
            }
        }

        let (delivered, dropped) = registry.fanout(&envelope);
        if dropped > 0 {
            warn!("dropped envelope seq={} for {dropped} slow subscriber(s), delivered to {delivered}", envelope.seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MapXmlSource;
    use crate::model::MatchMode;
    use ipnet::Ipv4Net;
    use std::collections::HashMap;
    use std::str::FromStr;

    struct PassthroughTranslator;

    impl MessageTranslator for PassthroughTranslator {
        fn translate(&self, _xml: &[u8]) -> Box<dyn XmlSource> {
            let mut fields = HashMap::new();
            fields.insert(
                "/BGP_MESSAGE/ASCII_MSG/UPDATE/NLRI/PREFIX/ADDRESS",
                vec!["205.94.224.0/20".to_string()],
            );
            Box::new(MapXmlSource(fields))
        }
    }

    #[test]
    fn matching_envelope_reaches_subscriber() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Envelope::new(1, &b"<BGP_MESSAGE/>"[..])).unwrap();
        drop(tx);

        let store = FilterStore::with_v4_rules(vec![crate::model::PrefixRule4 {
            network: Ipv4Net::from_str("205.94.224.0/20").unwrap(),
            mode: MatchMode::MoreSpecific,
        }]);

        let registry = Arc::new(Registry::new());
        let (sub_tx, sub_rx) = crossbeam_channel::bounded(8);
        registry.insert(crate::subscriber::Subscriber::new(1, sub_tx));

        run(
            rx,
            Arc::new(PassthroughTranslator),
            Arc::new(store),
            registry,
            None,
            false,
            Arc::new(AtomicBool::new(true)),
        );

        let delivered = sub_rx.try_recv().unwrap();
        assert_eq!(delivered.seq, 1);
    }
}
