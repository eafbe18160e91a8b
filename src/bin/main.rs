use bgpmon_filter::config::{self, Cli};
use bgpmon_filter::supervisor;
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let config = match config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("bgpmon-filter: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = supervisor::init_logger(&config) {
        eprintln!("bgpmon-filter: {e}");
        std::process::exit(1);
    }

    if let Err(e) = supervisor::run(config) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
