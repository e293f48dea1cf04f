#![forbid(unsafe_code)]

//! Worker-side line loop for engine executables.
//!
//! An engine executable wraps its [`MathEngine`] in [`serve_lines`] over
//! stdin/stdout. The host side of this transport lives in
//! `calcpp-runtime`'s process worker.

use std::io::{self, BufRead, Write};

use crate::engine::{MathEngine, handle_request};
use crate::protocol::{CalcRequest, WorkerMessage};

/// Counters reported when the input stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub served: u64,
    pub malformed: u64,
}

fn write_message<W: Write>(output: &mut W, message: &WorkerMessage) -> io::Result<()> {
    let line = message.to_json_string().map_err(io::Error::other)?;
    output.write_all(line.as_bytes())?;
    output.write_all(b"\n")?;
    output.flush()
}

/// Announce readiness, then answer one request per input line until end of
/// input.
///
/// Blank lines are skipped. Lines that are not UTF-8 or do not decode as a
/// request are logged and skipped; they never stop the loop.
pub fn serve_lines<E, R, W>(engine: &mut E, mut input: R, mut output: W) -> io::Result<ServeStats>
where
    E: MathEngine + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut stats = ServeStats::default();
    write_message(&mut output, &WorkerMessage::Init)?;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            stats.malformed += 1;
            tracing::warn!(target: "calcpp.worker", bytes = buf.len(), "skipping non-UTF-8 request line");
            continue;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let request = match CalcRequest::from_json_str(trimmed) {
            Ok(request) => request,
            Err(err) => {
                stats.malformed += 1;
                tracing::warn!(target: "calcpp.worker", error = %err, "skipping malformed request line");
                continue;
            }
        };
        let response = handle_request(engine, &request);
        write_message(&mut output, &WorkerMessage::Response(response))?;
        stats.served += 1;
    }

    tracing::debug!(
        target: "calcpp.worker",
        served = stats.served,
        malformed = stats.malformed,
        "input closed"
    );
    Ok(stats)
}
