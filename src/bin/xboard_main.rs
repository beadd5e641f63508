//! `qapla-xboard`: a thin entry point around `qapla::xboard::run_xboard_loop`.

fn main() {
    #[cfg(feature = "logging")]
    env_logger::init();

    qapla::xboard::run_xboard_loop();
}
