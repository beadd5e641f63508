//! `qapla-uci`: a thin entry point around `qapla::uci::run_uci_loop`.
//!
//! The library never calls `env_logger::init` itself (a library must not
//! configure global logging for its caller); only this binary does, and
//! only the `logging` feature decides whether it's linked in at all.

fn main() {
    #[cfg(feature = "logging")]
    env_logger::init();

    qapla::uci::run_uci_loop();
}
