use std::{
    fs::{self, File},
    io,
    path::Path,
    sync::{mpsc, LazyLock, Mutex},
    thread,
};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use log::Log;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

pub type LogListener = Box<dyn Fn(String) + Send>;

/// Listener registered by the platform shell (e.g. to show logs in a debug
/// screen). Called from the dispatcher thread, never from the logging call.
static LOG_LISTENER: LazyLock<Mutex<Option<LogListener>>> = LazyLock::new(|| Mutex::new(None));

static LOG_SENDER: LazyLock<Mutex<Option<mpsc::Sender<String>>>> =
    LazyLock::new(|| Mutex::new(None));

struct MainLogger {
    write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>,
}

impl Log for MainLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.write_logger.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.write_logger.log(record);

        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!(
            "{}:{} -- {}",
            record.level(),
            record.target(),
            record.args()
        );
        if let Ok(sender) = LOG_SENDER.lock() {
            if let Some(tx) = sender.as_ref() {
                // the dispatcher only goes away with the process
                let _ = tx.send(message);
            }
        }
    }

    fn flush(&self) {
        self.write_logger.flush();
    }
}

pub fn init(cache_dir: &str) -> Result<()> {
    let path = Path::new(cache_dir).join("logs/main.log");
    let log = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let write_logger = WriteLogger::new(LevelFilter::Info, config, log);
    log::set_boxed_logger(Box::new(MainLogger { write_logger }))?;
    log::set_max_level(LevelFilter::Info);

    init_dispatcher();
    Ok(())
}

fn init_dispatcher() {
    let mut guard = LOG_SENDER.lock().unwrap_or_else(|e| e.into_inner());
    if guard.is_some() {
        return;
    }
    let (tx, rx) = mpsc::channel::<String>();
    *guard = Some(tx);

    thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            let listener = LOG_LISTENER.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(listener) = listener.as_ref() {
                listener(msg);
            }
        }
    });
}

pub fn set_listener(listener: Option<LogListener>) {
    let mut guard = LOG_LISTENER.lock().unwrap_or_else(|e| e.into_inner());
    *guard = listener;
}

pub fn export(cache_dir: &str, target_file_path: &str) -> Result<()> {
    log::logger().flush();
    let mut zip = zip::ZipWriter::new(File::create(target_file_path)?);
    let default_options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let log_folder = Path::new(cache_dir).join("logs/");
    for entry in (fs::read_dir(&log_folder)?).flatten() {
        let path = entry.path();
        if path.is_file() {
            if let Some(name) = path.strip_prefix(cache_dir)?.to_str() {
                zip.start_file(name, default_options)?;
                let mut log_file = File::open(&path)?;
                io::copy(&mut log_file, &mut zip)?;
            }
        }
    }

    zip.finish()?;
    Ok(())
}
