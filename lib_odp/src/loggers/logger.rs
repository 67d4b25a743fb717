use std::fs;
use std::path::{Path, PathBuf};

use colored::{ColoredString, Colorize};

/// Builds the global `log` dispatcher.
///
/// Terminal output goes to stderr with colored levels. When `log_dir` is given
/// the same records are appended to `<app_name>_<timestamp>.log` in that
/// directory, after older logs for the app are pruned down to the newest one.
///
/// Returns the path of the log file, if one was opened.
pub fn setup_logging(
    app_name: &str,
    debug: bool,
    log_dir: Option<&Path>,
) -> Result<Option<PathBuf>, fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let terminal = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                colored_level(record.level()),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        // Dependencies are chatty at debug level.
        .level_for("reqwest", log::LevelFilter::Info)
        .level_for("reqwest_retry", log::LevelFilter::Info)
        .level_for("tungstenite", log::LevelFilter::Info)
        .level_for("tokio_tungstenite", log::LevelFilter::Info)
        .level_for("rustls", log::LevelFilter::Info)
        .chain(terminal);

    let mut log_path = None;
    if let Some(dir) = log_dir {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        cleanup_old_logs(dir, app_name)?;

        let file_name = format!("{}_{}.log", app_name, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
        let path = dir.join(file_name);

        let file = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{}[{}][{}] {}",
                    chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                    record.target(),
                    record.level(),
                    message
                ))
            })
            .chain(fern::log_file(&path)?);
        dispatch = dispatch.chain(file);
        log_path = Some(path);
    }

    dispatch.apply()?;
    Ok(log_path)
}

fn colored_level(level: log::Level) -> ColoredString {
    let text = level.to_string();
    match level {
        log::Level::Error => text.bright_red(),
        log::Level::Warn => text.bright_yellow(),
        log::Level::Info => text.bright_green(),
        log::Level::Debug => text.bright_white(),
        log::Level::Trace => text.bright_cyan(),
    }
}

/// Deletes all but the most recent `<app_name>_*.log` file in `log_dir`.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str) -> std::io::Result<()> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        // `odp_` must not match `odp_stream_...`: a timestamp follows the prefix.
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .collect();

    // Timestamped names sort chronologically; newest first.
    entries.sort_by_key(|e| std::cmp::Reverse(e.file_name()));

    for entry in entries.iter().skip(1) {
        if let Err(e) = fs::remove_file(entry.path()) {
            eprintln!("Failed to delete old log file {:?}: {}", entry.path(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_log_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "odp_2024-01-01_00-00-00.log",
            "odp_2024-03-01_00-00-00.log",
            "odp_2024-02-01_00-00-00.log",
            "other_2020-01-01_00-00-00.log",
            "odp_stream_2023-01-01_00-00-00.log",
            "odp_notes.txt",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        cleanup_old_logs(dir.path(), "odp").unwrap();

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "odp_2024-03-01_00-00-00.log".to_string(),
                "odp_notes.txt".to_string(),
                "odp_stream_2023-01-01_00-00-00.log".to_string(),
                "other_2020-01-01_00-00-00.log".to_string(),
            ]
        );
    }
}
