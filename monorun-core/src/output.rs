//! Output sink: a single-writer actor fed by worker tasks.

use std::io::Write;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use owo_colors::OwoColorize;

/// Message sent from a worker to the writer thread.
#[derive(Debug)]
pub enum SinkMessage {
    /// One streamed line from a running script.
    Line {
        package: String,
        line: String,
        stderr: bool,
    },
    /// A completed package's full captured output, flushed as one block.
    Block {
        package: String,
        stdout: String,
        stderr: String,
    },
}

/// Cloneable sending side handed to worker tasks.
#[derive(Clone)]
pub struct SinkHandle {
    tx: Sender<SinkMessage>,
}

impl SinkHandle {
    pub fn send_line(&self, package: &str, line: &str, stderr: bool) {
        let _ = self.tx.send(SinkMessage::Line {
            package: package.to_string(),
            line: line.to_string(),
            stderr,
        });
    }

    pub fn send_block(&self, package: &str, stdout: String, stderr: String) {
        let _ = self.tx.send(SinkMessage::Block {
            package: package.to_string(),
            stdout,
            stderr,
        });
    }
}

/// Serializes all child-process output through one writer thread, so
/// concurrently running packages never interleave partial lines.
pub struct OutputSink {
    tx: Sender<SinkMessage>,
    writer: JoinHandle<()>,
}

impl OutputSink {
    /// Spawns the writer. `prefix` controls whether streamed lines carry a
    /// `name (client):` identifier; block output is always printed raw.
    pub fn spawn(prefix: bool, client: String) -> Self {
        let (tx, rx) = channel::unbounded::<SinkMessage>();

        let writer = std::thread::spawn(move || {
            for message in rx {
                match message {
                    SinkMessage::Line {
                        package,
                        line,
                        stderr,
                    } => {
                        let rendered = render_line(&package, &client, &line, stderr, prefix);
                        if stderr {
                            eprintln!("{rendered}");
                        } else {
                            println!("{rendered}");
                        }
                    }
                    SinkMessage::Block { stdout, stderr, .. } => {
                        if !stdout.is_empty() {
                            print!("{stdout}");
                            let _ = std::io::stdout().flush();
                        }
                        if !stderr.is_empty() {
                            eprint!("{stderr}");
                            let _ = std::io::stderr().flush();
                        }
                    }
                }
            }
        });

        Self { tx, writer }
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle {
            tx: self.tx.clone(),
        }
    }

    /// Closes the channel and waits until every queued message is written.
    /// Callers must drop every `SinkHandle` first or the join will wait on
    /// them.
    pub fn close(self) {
        let Self { tx, writer } = self;
        drop(tx);
        let _ = writer.join();
    }
}

fn render_line(package: &str, client: &str, line: &str, stderr: bool, prefix: bool) -> String {
    if !prefix {
        return line.to_string();
    }
    let tag = format!("{package} ({client}):");
    if stderr {
        format!("{} {}", tag.bright_black().bold(), line.red())
    } else {
        format!("{} {}", tag.bright_black().bold(), line)
    }
}
