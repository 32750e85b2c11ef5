use std::sync::Mutex;

use log::Level;

/// Destination for rendered log lines, one call per line.
///
/// Sinks are shared between observers running on different threads, so they
/// take `&self` and handle their own synchronization.
pub trait LineSink {
    fn write_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str),
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Forwards every line to the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    pub target: &'static str,
    pub level: Level,
}

impl LogSink {
    pub const fn new(target: &'static str) -> Self {
        Self {
            target,
            level: Level::Info,
        }
    }
}

impl LineSink for LogSink {
    fn write_line(&self, line: &str) {
        log::log!(target: self.target, self.level, "{line}");
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// All collected lines, each terminated by a newline.
    pub fn contents(&self) -> String {
        self.lines()
            .into_iter()
            .map(|line| line + "\n")
            .collect()
    }
}

impl LineSink for MemorySink {
    fn write_line(&self, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_owned());
    }
}
