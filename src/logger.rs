use std::io::Write;

use log::LevelFilter;

/// Initialize `env_logger` at `level`, `RUST_LOG` takes precedence
///
/// Records are printed as `[LEVEL][module] message`. Calling this twice is
/// harmless, only the first call installs the logger.
pub fn init(level: LevelFilter) {
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:5}][{}] {}",
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        })
        .try_init();
}
