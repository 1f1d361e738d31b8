use crate::capture::PairResult;
use crate::error::Result;
use std::io::Write;
use tracing::trace;

/// Writes one result line per completed pair and flushes it immediately
///
/// Line format: `<counter> <sumFirst> <sumSecond> <epochMillis>`
pub struct ResultEmitter<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> ResultEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    pub fn emit(&mut self, result: &PairResult) -> Result<()> {
        let line = format_line(result);
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.lines += 1;
        trace!("Emitted {}", line.trim_end());
        Ok(())
    }

    pub fn lines_emitted(&self) -> u64 {
        self.lines
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_line(result: &PairResult) -> String {
    format!(
        "{} {} {} {}\n",
        result.counter,
        result.sum_first,
        result.sum_second,
        result.epoch_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn result(counter: u64) -> PairResult {
        PairResult {
            counter,
            sum_first: 76105,
            sum_second: 1200,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(format_line(&result(0)), "0 76105 1200 1700000000123\n");
    }

    #[test]
    fn test_emits_in_order() {
        let mut emitter = ResultEmitter::new(Vec::new());
        for counter in 0..3 {
            emitter.emit(&result(counter)).unwrap();
        }
        assert_eq!(emitter.lines_emitted(), 3);

        let text = String::from_utf8(emitter.into_inner()).unwrap();
        let counters: Vec<&str> = text
            .lines()
            .map(|line| line.split(' ').next().unwrap())
            .collect();
        assert_eq!(counters, vec!["0", "1", "2"]);
    }

    struct FlushCounter {
        flushes: usize,
    }

    impl Write for FlushCounter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_flushes_every_line() {
        let mut emitter = ResultEmitter::new(FlushCounter { flushes: 0 });
        emitter.emit(&result(0)).unwrap();
        emitter.emit(&result(1)).unwrap();
        assert_eq!(emitter.get_ref().flushes, 2);
    }
}
