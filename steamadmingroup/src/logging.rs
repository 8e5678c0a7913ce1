use flexi_logger::{style, DeferredNow, Duplicate, FlexiLoggerError, Level, Logger, Record};

fn console_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record<'_>,
) -> Result<(), std::io::Error> {
    let level = record.level();
    let head = format!("{} {:<5} [{}]", now.now().format("%H:%M:%S"), level, record.module_path().unwrap_or("<unnamed>"));
    match level {
        // whole line colored, so failed fetches stand out between map changes.
        Level::Error | Level::Warn => write!(w, "{} {}", style(level, head), style(level, record.args())),
        _ => write!(w, "{} {} {}", style(level, head), style(level, ">"), record.args()),
    }
}

fn file_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record<'_>,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "[{}] {:<5} [{}:{}] {}",
        now.now().format("%Y-%m-%d %H:%M:%S%.3f %:z"),
        record.level(),
        record.file().unwrap_or("<unnamed>"),
        record.line().unwrap_or(0),
        record.args(),
    )
}

/// Logs to `logs/` and stderr. `RUST_LOG` overrides `default_spec`.
pub fn init_logging(default_spec: &str) -> Result<(), FlexiLoggerError> {
    Logger::with_env_or_str(default_spec)
        .log_to_file()
        .directory("logs")
        .format_for_files(file_format)
        .set_palette("196;208;120;141;241".to_string())
        .format_for_stderr(console_format)
        .duplicate_to_stderr(Duplicate::All)
        .start()?;

    // also log panics
    std::panic::set_hook(Box::new(|panic_info| {
        error!(target: "PANIC", "{}", panic_info);
    }));

    Ok(())
}
