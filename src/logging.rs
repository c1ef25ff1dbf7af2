//! Logging setup. The host opts in once at boot; the kernel itself only
//! emits through the `log` facade.

use fern::Dispatch;
use log::LevelFilter;

pub use log::LevelFilter::{Debug, Error, Info, Trace, Warn};

pub fn setup_logging(verbosity: LevelFilter) -> Result<(), log::SetLoggerError> {
    Dispatch::new()
        .level(verbosity)
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message));
        })
        .chain(std::io::stdout())
        .apply()
}
