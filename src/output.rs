//! Terminal rendering for recognition results and command dispatch.
//!
//! Results go to stdout (they are the program's output); diagnostics and
//! errors go to stderr.

use crate::command::resolver::CommandCode;
use crate::stream::producer::ProducerReport;

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Print the stability score of an incoming result.
pub fn print_stability(stability: f32) {
    println!("Result stability: {}", stability);
}

/// Print one alternative: confidence, then the transcript in quotes.
pub fn print_alternative(confidence: f32, transcript: &str) {
    println!("{}\t\"{}\"", confidence, transcript);
}

/// Echo a dispatched command: `f >> /dev/ttyUSB0`.
pub fn print_dispatch(code: CommandCode, port_label: &str) {
    println!(
        "{GREEN}{} >> {}{RESET}",
        code.wire_byte() as char,
        port_label
    );
}

/// Summarize a finished producer run (verbose mode).
pub fn print_producer_report(report: &ProducerReport) {
    eprintln!(
        "{DIM}streamed {} chunk(s), {} byte(s); stopped: {:?}{RESET}",
        report.chunks_sent, report.bytes_sent, report.stopped_by
    );
}

/// Non-fatal diagnostic.
pub fn warn(message: &str) {
    eprintln!("{DIM}voxdrive: {message}{RESET}");
}

/// Fatal error, printed before a non-zero exit.
pub fn error(message: &str) {
    eprintln!("{RED}voxdrive: {message}{RESET}");
}
