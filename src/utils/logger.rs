// Copyright (c) 2025 Huawei Technologies Co.,Ltd. All rights reserved.
//
// Argonc is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use std::{
    fs::{File, OpenOptions},
    io::{stderr, Write},
    os::unix::fs::OpenOptionsExt,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Local;
use log::{set_boxed_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record};
use nix::unistd::{getpid, gettid};

use super::ArgoncErr;

struct Logger {
    handler: Mutex<Box<dyn Write + Send>>,
    level: Level,
}

fn open_log_file(path: &PathBuf) -> Result<File> {
    OpenOptions::new()
        .read(false)
        .append(true)
        .create(true)
        .mode(0o640)
        .open(path)
        .with_context(|| ArgoncErr::OpenFile(path.to_string_lossy().to_string()))
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let fmt_msg = format!(
            "{}: [{}][{}][{}: {}]:{}: {}\n",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.9f"),
            getpid(),
            gettid(),
            record.file().unwrap_or(""),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        );

        let mut handler = self.handler.lock().unwrap();
        if let Err(e) = handler.write_all(fmt_msg.as_bytes()) {
            eprintln!("Failed to log message: {:?}", e);
        }
    }

    fn flush(&self) {}
}

pub fn init(path: &Option<PathBuf>, debug: bool) -> Result<()> {
    let log_level = if debug {
        Level::Debug
    } else {
        match std::env::var("ARGONC_LOG_LEVEL") {
            Ok(level) => match level.to_lowercase().as_str() {
                "error" => Level::Error,
                "warn" => Level::Warn,
                "info" => Level::Info,
                "debug" => Level::Debug,
                "trace" => Level::Trace,
                _ => Level::Info,
            },
            _ => Level::Info,
        }
    };

    let handler: Box<dyn Write + Send> = match path {
        Some(p) => Box::new(open_log_file(p)?),
        None => Box::new(stderr()),
    };
    let logger = Box::new(Logger {
        handler: Mutex::new(handler),
        level: log_level,
    });
    set_boxed_logger(logger)
        .map(|_| set_max_level(LevelFilter::Trace))
        .with_context(|| "Logger has been already set")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs::remove_file, path::Path};

    use super::*;

    #[test]
    fn test_logger_init() {
        assert!(init(&Some(PathBuf::from("/tmp/argonc.log")), false).is_ok());
        remove_file(Path::new("/tmp/argonc.log")).unwrap();
    }
}
