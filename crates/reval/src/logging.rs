use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file name inside the data directory
pub const LOG_FILE: &str = "reval.log";
/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

/// Trim the log to its most recent `keep` bytes once it grows past `max`.
fn rotate_log_if_needed(log_path: &Path, max: u64, keep: u64) -> io::Result<bool> {
    if !log_path.exists() {
        return Ok(false);
    }

    let file_size = fs::metadata(log_path)?.len();
    if file_size <= max {
        return Ok(false);
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(file_size.saturating_sub(keep)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Drop the partial first line
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map_or(0, |i| i + 1);

    let mut file = File::create(log_path)?;
    file.write_all(b"--- Log rotated (older entries removed) ---\n")?;
    file.write_all(&buffer[skip..])?;
    Ok(true)
}

/// Hands out writers onto one shared log file
#[derive(Clone)]
struct LogWriterFactory {
    file: Arc<Mutex<File>>,
}

struct LogWriter {
    file: Arc<Mutex<File>>,
}

impl LogWriter {
    fn lock(&self) -> io::Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

/// Initialize logging to `{data_dir}/reval.log` with size-based rotation.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(data_dir: &Path, level: &str) -> color_eyre::Result<()> {
    fs::create_dir_all(data_dir)?;
    let log_path = data_dir.join(LOG_FILE);

    if let Err(e) = rotate_log_if_needed(&log_path, MAX_LOG_SIZE, KEEP_SIZE) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let writer_factory = LogWriterFactory {
        file: Arc::new(Mutex::new(file)),
    };

    let default_filter = format!("reval={level},reval_core=warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer_factory)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()?;

    tracing::info!(log_path = %log_path.display(), "reval logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_small_log_is_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        fs::write(&path, "one\ntwo\n").unwrap();

        assert!(!rotate_log_if_needed(&path, 100, 10).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_rotation_keeps_whole_recent_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        let content: String = (0..100).map(|i| format!("line {i:03}\n")).collect();
        fs::write(&path, &content).unwrap();

        assert!(rotate_log_if_needed(&path, 200, 30).unwrap());
        let rotated = fs::read_to_string(&path).unwrap();
        let mut lines = rotated.lines();
        assert_eq!(lines.next(), Some("--- Log rotated (older entries removed) ---"));
        let kept: Vec<&str> = lines.collect();
        assert_eq!(kept.last(), Some(&"line 099"));
        assert!(kept.iter().all(|l| l.starts_with("line ")));
    }

    #[test]
    fn test_missing_log_is_not_an_error() {
        let dir = tempdir().unwrap();
        assert!(!rotate_log_if_needed(&dir.path().join(LOG_FILE), 1, 1).unwrap());
    }
}
