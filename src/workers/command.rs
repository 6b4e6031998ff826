//! # COMMAND_INTERFACE: line-oriented operator commands.
//!
//! | command            | effect                                   |
//! |--------------------|------------------------------------------|
//! | `help`             | list commands                            |
//! | `status`/`threads` | print every registered thread and state  |
//! | `quit`/`exit`      | request process shutdown                 |
//!
//! Input lines are read by a detached helper thread, because a blocking read
//! cannot observe the shutdown token. The helper is not registered: it ends
//! at EOF or when the worker has gone and the next line cannot be delivered.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError};
use crate::core::{ShutdownHandle, WorkerContext};
use crate::events::EventKind;
use crate::threads::{ThreadRegistry, Worker};

const INPUT_POLL: Duration = Duration::from_millis(20);

const HELP: &str = "\
commands:
  help            show this list
  status|threads  list registered threads
  quit|exit       shut down
";

/// Parsed operator command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `help`
    Help,
    /// `status` or `threads`
    Status,
    /// `quit` or `exit`
    Quit,
    /// Blank line.
    Empty,
    /// Anything else.
    Unknown(String),
}

impl Command {
    /// Parses one input line (trimmed, case-insensitive).
    pub fn parse(line: &str) -> Self {
        let word = line.trim();
        match word.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "help" | "?" => Command::Help,
            "status" | "threads" => Command::Status,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(word.to_string()),
        }
    }
}

/// Operator command worker.
pub struct CommandInterface {
    registry: Arc<ThreadRegistry>,
    shutdown: ShutdownHandle,
    input: Mutex<Option<Box<dyn BufRead + Send>>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl CommandInterface {
    /// Reads commands from `input` and answers on `output`.
    ///
    /// `shutdown` is the process switch flipped by `quit`.
    pub fn new(
        registry: Arc<ThreadRegistry>,
        shutdown: ShutdownHandle,
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            registry,
            shutdown,
            input: Mutex::new(Some(input)),
            output: Mutex::new(output),
        }
    }

    /// Reads stdin, answers on stdout.
    pub fn stdin(registry: Arc<ThreadRegistry>, shutdown: ShutdownHandle) -> Self {
        Self::new(
            registry,
            shutdown,
            Box::new(BufReader::new(io::stdin())),
            Box::new(io::stdout()),
        )
    }

    /// Executes one line.
    pub fn execute(&self, ctx: &WorkerContext, line: &str) -> Command {
        let cmd = Command::parse(line);
        if cmd == Command::Empty {
            return cmd;
        }
        ctx.publish(
            ctx.event(EventKind::CommandReceived)
                .with_reason(line.trim()),
        );

        let reply = match &cmd {
            Command::Help => HELP.to_string(),
            Command::Status => self.status(),
            Command::Quit => {
                self.shutdown.request("operator command");
                "shutting down\n".to_string()
            }
            Command::Unknown(word) => format!("unknown command '{word}', try 'help'\n"),
            Command::Empty => String::new(),
        };
        self.reply(&reply);
        cmd
    }

    fn status(&self) -> String {
        match self.registry.entries() {
            Ok(entries) => {
                let mut out = String::new();
                for e in entries {
                    out.push_str(&format!("{:<24} {}\n", e.label, e.state));
                }
                out
            }
            Err(e) => format!("registry unavailable: {e}\n"),
        }
    }

    fn reply(&self, text: &str) {
        let mut out = self.output.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "command reply not written");
        }
    }

    fn spawn_reader(&self, label: &str) -> Option<mpsc::UnboundedReceiver<String>> {
        let input = self.input.lock().take()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name(format!("{label}.INPUT"))
            .spawn(move || {
                for line in input.lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        match spawned {
            Ok(_detached) => Some(rx),
            Err(e) => {
                tracing::warn!(error = %e, "command input reader not started");
                None
            }
        }
    }
}

impl Worker for CommandInterface {
    fn run(&self, ctx: &WorkerContext) {
        let mut rx = self.spawn_reader(ctx.label());

        while !ctx.is_shutdown() {
            let next = match rx.as_mut() {
                Some(r) => r.try_recv(),
                None => Err(TryRecvError::Disconnected),
            };
            match next {
                Ok(line) => {
                    self.execute(ctx, &line);
                }
                Err(TryRecvError::Empty) => std::thread::sleep(INPUT_POLL),
                Err(TryRecvError::Disconnected) => {
                    // input closed: stay idle until shutdown
                    rx = None;
                    std::thread::sleep(INPUT_POLL);
                }
            }
        }
    }
}
