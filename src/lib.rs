/*!
bgpmon-filter is a streaming filter-and-fanout relay for BGP monitoring
messages: it holds one persistent connection to an upstream BGP monitor
emitting a continuous XML stream of BGP UPDATE messages, matches each one
against a compiled set of IPv4/IPv6 prefixes, host addresses, and AS
numbers, and relays every match to stdout, an append-only output file, and
every connected TCP subscriber.

# Pipeline

```text
upstream reader -> bounded queue -> filter/dispatch worker -> stdout
                                                             -> output file
                                                             -> subscriber fanout
```

The upstream reader and the dispatch worker each run on their own thread,
connected by a bounded channel; subscriber connections are accepted on a
third thread, and each accepted connection gets its own handler thread. See
[`supervisor::run`] for how these are wired together and
[`config::RelayConfig`] for the keys that control them.
*/

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod filter;
pub mod model;
pub mod subscriber;
pub mod supervisor;
pub mod upstream;
pub mod xml;

pub use error::RelayError;
pub use filter::FilterStore;
pub use model::{Envelope, ExtractedUpdate, MatchMode};
