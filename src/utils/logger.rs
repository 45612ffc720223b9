//! Logging Infrastructure
//!
//! tracing 初始化：控制台输出，可选按天滚动的文件输出。
//! 过滤规则走 `RUST_LOG`/`LOG_LEVEL`，sqlx 的语句日志默认压到 warn。

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger with optional file output
///
/// `log_level` falls back to `RUST_LOG`, then to `info`. When `log_dir`
/// points at an existing directory, output additionally goes to a
/// daily-rolling `store-server.*` file there.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"))
    // sqlx 在 debug 级别逐条打 SQL，太吵
    .add_directive("sqlx=warn".parse().expect("static directive"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    if let Some(dir) = log_dir {
        let path = Path::new(dir);
        if path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(path, "store-server");
            subscriber.with_writer(file_appender).with_ansi(false).init();
            return;
        }
        eprintln!("LOG_DIR {dir} does not exist; logging to stdout only");
    }

    subscriber.init();
}
