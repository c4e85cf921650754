//! Rendering of frames and decoded responses as indented title/value tables.

use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub enum LogOutput {
    Log(log::Level),
    LogTarget(log::Level, String),
    StdOut,
    StdErr,
    #[cfg(feature = "log-to-file")]
    File(std::sync::Arc<parking_lot::Mutex<std::fs::File>>),
}

impl From<log::Level> for LogOutput {
    fn from(value: log::Level) -> Self {
        Self::Log(value)
    }
}

impl LogOutput {
    /// Whether anything written to this output would be visible.
    pub fn enabled(&self) -> bool {
        match self {
            LogOutput::Log(level) => log::log_enabled!(*level),
            LogOutput::LogTarget(level, target) => log::log_enabled!(target: target, *level),
            _ => true,
        }
    }

    fn print(&self, msg: &str) {
        match self {
            LogOutput::Log(level) => log::log!(*level, "{}", msg),
            LogOutput::LogTarget(level, target) => {
                log::log!(target: target, *level, "{}", msg)
            }
            LogOutput::StdOut => println!("{}", msg),
            LogOutput::StdErr => eprintln!("{}", msg),
            #[cfg(feature = "log-to-file")]
            LogOutput::File(file) => {
                use std::io::Write;

                let mut file = file.lock();
                writeln!(file, "{}", msg).ok();
            }
        }
    }
}

/// One row of a rendered table. Rows with level 0 are titles.
#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    level: usize,
    title: String,
    value: Option<String>,
}

impl LogItem {
    pub fn new<T: Into<String>, V: Into<String>>(level: usize, title: T, value: Option<V>) -> Self {
        Self {
            level,
            title: title.into(),
            value: value.map(Into::into),
        }
    }
}

impl<T: ToString, V: ToString> From<(usize, T, V)> for LogItem {
    fn from((level, title, value): (usize, T, V)) -> Self {
        Self::new(level, title.to_string(), Some(value.to_string()))
    }
}

impl<T: ToString> From<(usize, T)> for LogItem {
    fn from((level, title): (usize, T)) -> Self {
        Self::new::<_, String>(level, title.to_string(), None)
    }
}

pub struct Logger;

impl Logger {
    pub fn log<T>(output: &LogOutput, loggable: &T)
    where
        T: Loggable + ?Sized,
    {
        if !output.enabled() {
            return;
        }

        Self::render(&loggable.as_log())
            .iter()
            .for_each(|line| output.print(line));
    }

    /// Render `items` into lines, right-aligning the values of each table.
    pub fn render(items: &[LogItem]) -> Vec<String> {
        let title_width = items
            .iter()
            .filter(|i| i.level > 0)
            .map(|i| i.title.len())
            .max()
            .unwrap_or(0);

        items
            .iter()
            .map(|item| {
                let mut line = String::new();
                let indent = item.level * 2;

                match &item.value {
                    Some(value) if item.level > 0 => {
                        let pad = title_width - item.title.len();
                        write!(line, "{:indent$}{}: {:pad$}{}", "", item.title, "", value).ok();
                    }
                    _ => {
                        write!(line, "{:indent$}{}", "", item.title).ok();
                    }
                }

                line
            })
            .collect()
    }
}

pub trait Loggable {
    fn as_log(&self) -> Vec<LogItem>;
}

#[macro_export]
macro_rules ! log_vec {
    [$($msg:tt)*] => {
        $crate::to_log!(vec: $($msg)*)
    }
}

#[macro_export]
macro_rules! to_log {
    ([$($array:tt)*],) => {
        vec![$($array)*]
    };

    ([$($array:tt)*], ($level:literal, $title:expr, $value:expr)) => {
        $crate::to_log!([$($array)* ($level, $title, $value).into(),],)
    };

    ([$($array:tt)*], ($level:literal, $title:expr)) => {
        $crate::to_log!([$($array)* ($level, $title).into(),],)
    };

    ([$($array:tt)*], ($level:literal, $title:expr, $value:expr), $($msg:tt)*) => {
        $crate::to_log!([$($array)* ($level, $title, $value).into(),], $($msg)*)
    };

    ([$($array:tt)*], ($level:literal, $title:expr), $($msg:tt)*) => {
        $crate::to_log!([$($array)* ($level, $title).into(),], $($msg)*)
    };

    (vec: $($msg:tt)*) => {
        $crate::to_log!([], $($msg)*)
    };
}

#[test]
fn render_aligns_values() {
    let items: Vec<LogItem> = log_vec![
        (0, "DIMM information"),
        (1, "Type", "DDR4"),
        (1, "Speed (MHz)", 2400)
    ];

    assert_eq!(
        Logger::render(&items),
        vec![
            "DIMM information".to_string(),
            "  Type:        DDR4".to_string(),
            "  Speed (MHz): 2400".to_string(),
        ]
    );
}
