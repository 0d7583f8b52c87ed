use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub struct Logger {
    file: Mutex<File>,
}

impl Logger {
    pub fn new(log_path: &str) -> std::io::Result<Self> {
        // Create logs directory if it doesn't exist
        if let Some(parent) = Path::new(log_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Logger {
            file: Mutex::new(file),
        })
    }

    pub fn log(&self, level: &str, scope: &str, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let log_line = format!("[{timestamp}] [{level}] [{scope}] {message}\n");

        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(log_line.as_bytes());
            let _ = file.flush();
        }
    }

    pub fn debug(&self, scope: &str, message: &str) {
        self.log("DEBUG", scope, message);
    }

    pub fn info(&self, scope: &str, message: &str) {
        self.log("INFO", scope, message);
    }

    pub fn warn(&self, scope: &str, message: &str) {
        self.log("WARN", scope, message);
    }

    pub fn error(&self, scope: &str, message: &str) {
        self.log("ERROR", scope, message);
    }
}

// Global logger instance
lazy_static::lazy_static! {
    pub static ref LOGGER: Logger = Logger::new("logs/pocket_llm.log")
        .expect("Failed to create logger");
}

// Convenience macros
#[macro_export]
macro_rules! log_debug {
    ($scope:expr, $($arg:tt)*) => {
        $crate::logger::LOGGER.debug($scope, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($scope:expr, $($arg:tt)*) => {
        $crate::logger::LOGGER.info($scope, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($scope:expr, $($arg:tt)*) => {
        $crate::logger::LOGGER.warn($scope, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($scope:expr, $($arg:tt)*) => {
        $crate::logger::LOGGER.error($scope, &format!($($arg)*));
    };
}
