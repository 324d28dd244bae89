//! Thread-safe log sink.
//!
//! Any thread may log; the formatted event is sent over an MPSC channel and
//! exactly one consumer thread owns the output stream.  That thread is also
//! the only one that renders the progress bar, so ordinary log lines and bar
//! redraws never interleave.  Messages below the configured verbosity are
//! dropped before they are enqueued.

use crate::session::{BuildSession, Verbosity};
use crate::terminal;
use std::io::Write;
use std::sync::{mpsc, Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Build,
    Link,
    Thread,
    Command,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Build => "BUILD",
            Level::Link => "LINK",
            Level::Thread => "THREAD",
            Level::Command => "CMD",
        }
    }

    /// ANSI color for the level label.
    fn color(self) -> &'static str {
        match self {
            Level::Error => "31",
            Level::Warn => "33",
            Level::Info => "36",
            Level::Build => "35",
            Level::Link => "32",
            Level::Thread => "34",
            Level::Command => "37",
        }
    }

    /// Highest verbosity at which this category still prints.  The session
    /// verbosity must be strictly below this for the message to pass.
    fn threshold(self) -> u8 {
        match self {
            Level::Error | Level::Warn => Verbosity::Mute as u8,
            Level::Build | Level::Link | Level::Thread | Level::Command => Verbosity::Quiet as u8,
            Level::Info => Verbosity::Normal as u8,
        }
    }
}

enum Event {
    Line { level: Level, text: String },
    /// Captured tool output, printed without a level prefix.
    Raw(String),
    /// Counters changed; redraw the bar.
    Progress,
    Shutdown,
}

/// Cloneable producer half, handed to every worker thread.
#[derive(Clone)]
pub struct Logger {
    tx: mpsc::Sender<Event>,
    session: Arc<BuildSession>,
}

/// Owner of the consumer thread; lives on the main thread.
pub struct LogSink {
    tx: mpsc::Sender<Event>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Logger {
    pub fn start(session: Arc<BuildSession>, fancy: bool) -> (Logger, LogSink) {
        Logger::start_with(session, fancy, Box::new(std::io::stdout()))
    }

    /// Like `start`, but writing to an arbitrary sink.  Tests use this to
    /// capture output.
    pub fn start_with(
        session: Arc<BuildSession>,
        fancy: bool,
        out: Box<dyn Write + Send>,
    ) -> (Logger, LogSink) {
        let (tx, rx) = mpsc::channel();
        let consumer_session = session.clone();
        let thread = std::thread::spawn(move || {
            let mut console = Console {
                out,
                fancy,
                bar_visible: false,
                session: consumer_session,
            };
            while let Ok(event) = rx.recv() {
                match event {
                    Event::Line { level, text } => console.write_line(level, &text),
                    Event::Raw(text) => console.write_raw(&text),
                    Event::Progress => console.redraw_bar(),
                    Event::Shutdown => break,
                }
            }
            console.erase_bar();
        });
        (
            Logger {
                tx: tx.clone(),
                session,
            },
            LogSink {
                tx,
                thread: Some(thread),
            },
        )
    }

    fn enabled(&self, level: Level) -> bool {
        (self.session.verbosity as u8) < level.threshold()
    }

    fn post(&self, level: Level, text: String) {
        // The send only fails if the consumer has already shut down, and
        // logging must never fail the build.
        let _ = self.tx.send(Event::Line { level, text });
    }

    /// Logs and records the error for the end-of-run summary.
    pub fn error(&self, text: String) {
        self.session.push_error(text.clone());
        if self.enabled(Level::Error) {
            self.post(Level::Error, text);
        }
    }

    /// Logs and records the warning for the end-of-run summary.
    pub fn warn(&self, text: String) {
        self.session.push_warning(text.clone());
        if self.enabled(Level::Warn) {
            self.post(Level::Warn, text);
        }
    }

    /// Logs an error without recording it; used when echoing the error
    /// list at the end of a run.
    pub fn error_no_push(&self, text: String) {
        if self.enabled(Level::Error) {
            self.post(Level::Error, text);
        }
    }

    /// Logs a warning without recording it.
    pub fn warn_no_push(&self, text: String) {
        if self.enabled(Level::Warn) {
            self.post(Level::Warn, text);
        }
    }

    pub fn info(&self, text: String) {
        if self.enabled(Level::Info) {
            self.post(Level::Info, text);
        }
    }

    pub fn build(&self, text: String) {
        if self.enabled(Level::Build) {
            self.post(Level::Build, text);
        }
    }

    pub fn link(&self, text: String) {
        if self.enabled(Level::Link) {
            self.post(Level::Link, text);
        }
    }

    pub fn thread(&self, text: String) {
        if self.enabled(Level::Thread) {
            self.post(Level::Thread, text);
        }
    }

    /// Echoes a full toolchain command line, only when the session asks.
    pub fn command(&self, text: String) {
        if self.session.show_commands && self.enabled(Level::Command) {
            self.post(Level::Command, text);
        }
    }

    /// Posts captured tool output verbatim.  Non-UTF8 bytes have already
    /// been transliterated by the caller.
    pub fn raw(&self, text: String) {
        if !text.is_empty() {
            let _ = self.tx.send(Event::Raw(text));
        }
    }

    /// Nudges the consumer to redraw the progress bar.
    pub fn progress(&self) {
        let _ = self.tx.send(Event::Progress);
    }
}

impl LogSink {
    /// Drains remaining messages and stops the consumer thread.
    pub fn finish(mut self) {
        let _ = self.tx.send(Event::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Consumer-side state; only ever touched by the consumer thread.
struct Console {
    out: Box<dyn Write + Send>,
    fancy: bool,
    bar_visible: bool,
    session: Arc<BuildSession>,
}

impl Console {
    fn write_line(&mut self, level: Level, text: &str) {
        self.erase_bar();
        let line = if self.fancy {
            format!("\x1b[{}m{}\x1b[0m: {}\n", level.color(), level.label(), text)
        } else {
            format!("{}: {}\n", level.label(), text)
        };
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
        self.redraw_bar();
    }

    fn write_raw(&mut self, text: &str) {
        self.erase_bar();
        let _ = self.out.write_all(text.as_bytes());
        if !text.ends_with('\n') {
            let _ = self.out.write_all(b"\n");
        }
        let _ = self.out.flush();
        self.redraw_bar();
    }

    fn erase_bar(&mut self) {
        if self.bar_visible {
            // \r first in case an interrupt printed onto the bar's line.
            let _ = self.out.write_all(b"\r\x1b[J");
            self.bar_visible = false;
        }
    }

    fn redraw_bar(&mut self) {
        if !self.fancy {
            return;
        }
        self.erase_bar();
        let (completed, total) = self.session.counts();
        // Once everything is done the bar stays erased.
        if total == 0 || completed >= total {
            return;
        }
        let width = terminal::width().unwrap_or(80).min(60);
        let bar = render_bar(completed, total, width.saturating_sub(20).max(10));
        let _ = self.out.write_all(bar.as_bytes());
        let _ = self.out.flush();
        self.bar_visible = true;
    }
}

/// Renders `[====>     ] completed/total` at the given inner width.
pub fn render_bar(completed: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        completed * width / total
    };
    let mut bar = String::with_capacity(width + 16);
    bar.push('[');
    for _ in 0..filled {
        bar.push('=');
    }
    if filled < width {
        bar.push('>');
        for _ in filled + 1..width {
            bar.push(' ');
        }
    }
    bar.push(']');
    bar.push_str(&format!(" {}/{}", completed, total));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Write adapter that appends into a shared buffer.
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(verbosity: Verbosity) -> (Logger, LogSink, Arc<Mutex<Vec<u8>>>) {
        let session = Arc::new(BuildSession::new(verbosity, false));
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (logger, sink) =
            Logger::start_with(session, false, Box::new(SharedBuf(buf.clone())));
        (logger, sink, buf)
    }

    #[test]
    fn bar_rendering() {
        assert_eq!(render_bar(0, 4, 4), "[>   ] 0/4");
        assert_eq!(render_bar(2, 4, 4), "[==> ] 2/4");
        assert_eq!(render_bar(4, 4, 4), "[====] 4/4");
        assert_eq!(render_bar(0, 0, 4), "[>   ] 0/0");
    }

    #[test]
    fn per_producer_order_is_preserved() {
        let (logger, sink, buf) = capture(Verbosity::Normal);
        let mut threads = Vec::new();
        for t in 0..4 {
            let logger = logger.clone();
            threads.push(std::thread::spawn(move || {
                for i in 0..50 {
                    logger.build(format!("p{} m{}", t, i));
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        sink.finish();

        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        for t in 0..4 {
            let positions: Vec<usize> = (0..50)
                .map(|i| out.find(&format!("p{} m{}\n", t, i)).unwrap())
                .collect();
            let mut sorted = positions.clone();
            sorted.sort_unstable();
            assert_eq!(positions, sorted, "producer {} messages reordered", t);
        }
        // No interleaving corrupted a message: every line is well formed.
        for line in out.lines() {
            assert!(line.starts_with("BUILD: p"), "corrupt line {:?}", line);
        }
    }

    #[test]
    fn verbosity_gates_before_enqueue() {
        let (logger, sink, buf) = capture(Verbosity::Quiet);
        logger.info("hidden".to_owned());
        logger.build("also hidden".to_owned());
        logger.error("shown".to_owned());
        sink.finish();
        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(!out.contains("hidden"));
        assert!(out.contains("ERROR: shown"));
    }

    #[test]
    fn warn_no_push_does_not_accumulate() {
        let session = Arc::new(BuildSession::new(Verbosity::Normal, false));
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (logger, sink) =
            Logger::start_with(session.clone(), false, Box::new(SharedBuf(buf.clone())));
        logger.warn("kept".to_owned());
        logger.warn_no_push("dropped".to_owned());
        sink.finish();
        assert_eq!(session.warnings(), vec!["kept"]);
        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(out.contains("WARN: kept"));
        assert!(out.contains("WARN: dropped"));
    }

    #[test]
    fn muted_error_still_recorded() {
        let session = Arc::new(BuildSession::new(Verbosity::Mute, false));
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (logger, sink) =
            Logger::start_with(session.clone(), false, Box::new(SharedBuf(buf.clone())));
        logger.error("quiet failure".to_owned());
        sink.finish();
        assert_eq!(session.errors(), vec!["quiet failure"]);
        assert!(buf.lock().unwrap().is_empty());
    }
}
