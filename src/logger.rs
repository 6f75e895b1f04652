//! Console logging setup
//!
//! The library itself only uses the `log` facade. Binaries, demos and
//! benchmarks call [`init_log`] to get colored console output.

use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

use crate::error::{ConvertError, ConvertResult};

const PATTERN: &str = "[{h({l})} - {f}:{L}] {m}{n}";

/// Install a console logger at `level` and route panics through it
///
/// Fails if a logger is already installed.
pub fn init_log(level: LevelFilter) -> ConvertResult<()> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let appender = Appender::builder().build("stdout", Box::new(stdout));

    let config = Config::builder()
        .appender(appender)
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| ConvertError::Internal(format!("invalid log config: {}", e)))?;
    log4rs::init_config(config)
        .map_err(|e| ConvertError::Internal(format!("logger already set: {}", e)))?;
    update_panic_hook();

    Ok(())
}

fn update_panic_hook() {
    let hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {}", info);
        hook(info);
    }));
}
