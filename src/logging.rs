//! Process-wide logging setup: a `fern` dispatcher over the `log` facade, installed
//! once at CLI start.

use log::LevelFilter;

/// Install the global logger. `verbose` raises the level from `info` to `debug`.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
