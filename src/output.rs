use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_run(result: &RunResult) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}{} summary ({}){reset}", result.command, result.input);
        println!("{green}succeeded: {}{reset}", result.succeeded);
        let failed_color = if result.failed > 0 { red } else { green };
        println!("{failed_color}failed: {}{reset}", result.failed);
        println!("total: {} in {} request(s)", result.total, result.requests);

        for failure in &result.failures {
            let status = failure
                .http_status
                .map(|code| code.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{yellow}  {} [{status}] {}{reset}", failure.record, failure.detail);
        }
        println!("report: {}", result.report_path);
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}
