//! Chrome trace output (`chrome://tracing`, or Perfetto).
//!
//! Each build step becomes a complete event on the worker track that ran it,
//! so the trace shows pool utilization over the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &str) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_complete(
        &mut self,
        name: &str,
        tid: usize,
        span: (Instant, Instant),
    ) -> std::io::Result<()> {
        writeln!(
            self.w,
            "{{ \"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ph\": \"X\", \"ts\": {}, \"dur\": {} }},",
            tid,
            name,
            span.0.duration_since(self.start).as_micros(),
            span.1.duration_since(span.0).as_micros(),
        )
    }

    fn close(&mut self) -> std::io::Result<()> {
        // A final event without a trailing comma keeps the JSON valid.
        let now = Instant::now();
        writeln!(
            self.w,
            "{{ \"pid\": 0, \"tid\": 0, \"name\": \"main\", \"ph\": \"X\", \"ts\": 0, \"dur\": {} }}",
            now.duration_since(self.start).as_micros()
        )?;
        writeln!(self.w, "]")?;
        self.w.flush()
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    *TRACE.lock().unwrap() = Some(trace);
    Ok(())
}

/// Times a named phase (parse, scheduling) on the main track.
pub fn scope<T>(name: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let end = Instant::now();
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        let _ = trace.write_complete(name, 0, (start, end));
    }
    result
}

/// Records one finished build step on its worker's track.  Worker tracks
/// start at 1; track 0 is the control thread.
pub fn task_span(name: &str, tid: usize, span: (Instant, Instant)) {
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        let _ = trace.write_complete(name, tid + 1, span);
    }
}

pub fn close() -> std::io::Result<()> {
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        return trace.close();
    }
    Ok(())
}
