use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debug::json_escape;

/// Per-phase timing records for inline runs, one JSON object per line.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    span_totals: HashMap<String, (f64, u64)>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                span_totals: HashMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, run_id: u64, ms: f64) {
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"run\":{},\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            run_id,
            ms
        );
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            entry.0 += ms;
            entry.1 = entry.1.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn log_counts(&self, name: &str, run_id: u64, counts: &[(&str, u64)]) {
        let body = counts
            .iter()
            .map(|(key, value)| format!("\"{}\":{}", json_escape(key), value))
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(
            "{{\"type\":\"perf.counts\",\"name\":\"{}\",\"run\":{},\"counts\":{{{}}}}}",
            json_escape(name),
            run_id,
            body
        );
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let mut spans: Vec<(&String, &(f64, u64))> = self.span_totals.iter().collect();
        spans.sort_by(|(_, a), (_, b)| {
            b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
        });
        for (rank, (name, (ms, count))) in spans.into_iter().enumerate() {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let _ = writeln!(
                self.writer,
                "{{\"type\":\"perf.hot.span\",\"rank\":{},\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3},\"count\":{},\"avg_ms\":{:.3}}}",
                rank + 1,
                json_escape(name),
                ms,
                count,
                avg
            );
        }
        let _ = self.writer.flush();
    }
}

/// Measures one phase and reports it to an optional logger.
pub(crate) struct PhaseTimer<'a> {
    perf: Option<&'a PerfLogger>,
    run_id: u64,
    started: Instant,
}

impl<'a> PhaseTimer<'a> {
    pub fn start(perf: Option<&'a PerfLogger>, run_id: u64) -> Self {
        Self {
            perf,
            run_id,
            started: Instant::now(),
        }
    }

    /// Logs the time since the last lap under `name` and restarts the clock.
    pub fn lap(&mut self, name: &str) {
        if let Some(perf) = self.perf {
            let ms = self.started.elapsed().as_secs_f64() * 1000.0;
            perf.log_span_ms(name, self.run_id, ms);
        }
        self.started = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn spans_are_summarized_on_drop() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("inliner_perf_{nanos}.log"));
        {
            let perf = PerfLogger::new(&path).expect("create perf log");
            let mut timer = PhaseTimer::start(Some(&perf), 7);
            timer.lap("inline.apply");
            timer.lap("inline.apply");
            perf.log_counts("inline.apply", 7, &[("rules", 3)]);
        }
        let text = std::fs::read_to_string(&path).expect("read perf log");
        let _ = std::fs::remove_file(&path);
        assert_eq!(
            text.lines().filter(|l| l.contains("\"perf.span\"")).count(),
            2
        );
        assert!(text.contains("\"counts\":{\"rules\":3}"), "{text}");
        assert!(
            text.lines()
                .any(|l| l.contains("perf.hot.span") && l.contains("\"count\":2")),
            "hot summary missing: {text}"
        );
    }
}
