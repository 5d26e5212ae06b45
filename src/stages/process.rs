use crate::error::Error;
use crate::event::{Channel, StageContext};

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, warn};

/// How a tool invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    Aborted,
}

/// Owns the child process of a stage while it runs, so that another thread
/// can kill it.
#[derive(Debug, Default)]
pub struct ProcessHandle {
    child: Mutex<Option<Child>>,
}

impl ProcessHandle {
    const EXIT_POLL: Duration = Duration::from_millis(20);

    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Kills the running child and waits for it to exit. Returns whether there
    /// was anything to kill.
    pub fn kill(&self) -> bool {
        let mut slot = self.lock();
        let Some(mut child) = slot.take() else {
            return false;
        };
        debug!("killing process {}", child.id());
        if let Err(e) = child.kill() {
            debug!("kill failed: {}", e);
        }
        if let Err(e) = child.wait() {
            warn!("failed to await killed process: {}", e);
        }
        true
    }

    /// Spawns `command`, feeds every output line to `on_line` in arrival order
    /// and returns once the process has exited or was killed.
    pub fn run(
        &self,
        mut command: Command,
        context: &StageContext,
        mut on_line: impl FnMut(Channel, String),
    ) -> Result<Exit, Error> {
        let tool = tool_name(&command);
        context.log(Channel::Stdout, describe(&command));

        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let (stdout, stderr) = {
            let mut slot = self.lock();
            if context.is_cancelled() {
                return Ok(Exit::Aborted);
            }
            let mut child = command
                .spawn()
                .map_err(|source| Error::Spawn { tool: tool.clone(), source })?;
            debug!("started {} as process {}", tool, child.id());
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            *slot = Some(child);
            (stdout, stderr)
        };

        // The pumps are detached: a grandchild that inherited the pipes can keep
        // them open after the child itself was killed.
        let (sender, receiver) = unbounded();
        if let Some(stdout) = stdout {
            let sender = sender.clone();
            thread::spawn(move || pump_lines(stdout, Channel::Stdout, sender));
        }
        if let Some(stderr) = stderr {
            let sender = sender.clone();
            thread::spawn(move || pump_lines(stderr, Channel::Stderr, sender));
        }
        drop(sender);

        loop {
            match receiver.recv_timeout(Self::EXIT_POLL) {
                Ok((channel, line)) => on_line(channel, line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !self.is_running() {
                debug!("{} was killed, no longer reading its output", tool);
                return Ok(Exit::Aborted);
            }
        }

        self.wait_for_exit()
    }

    fn wait_for_exit(&self) -> Result<Exit, Error> {
        loop {
            {
                let mut slot = self.lock();
                let Some(child) = slot.as_mut() else {
                    return Ok(Exit::Aborted);
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        slot.take();
                        return Ok(Exit::Code(status.code().unwrap_or(-1)));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if let Some(mut child) = slot.take() {
                            let _ = child.kill();
                            let _ = child.wait();
                        }
                        return Err(Error::Io(e));
                    }
                }
            }
            thread::sleep(Self::EXIT_POLL);
        }
    }
}

/// Reads `source` until EOF, sending each non-empty line. Both `\n` and `\r`
/// end a line, since ffmpeg redraws its status line with carriage returns.
pub(crate) fn pump_lines(source: impl Read, channel: Channel, sender: Sender<(Channel, String)>) {
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    loop {
        let buffer = match reader.fill_buf() {
            Ok([]) => break,
            Ok(buffer) => buffer,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        let length = buffer.len();
        for &byte in buffer {
            if byte != b'\n' && byte != b'\r' {
                line.push(byte);
            } else if !line.is_empty() {
                let text = String::from_utf8_lossy(&line).into_owned();
                line.clear();
                if sender.send((channel, text)).is_err() {
                    return;
                }
            }
        }
        reader.consume(length);
    }
    if !line.is_empty() {
        let _ = sender.send((channel, String::from_utf8_lossy(&line).into_owned()));
    }
}

fn tool_name(command: &Command) -> String {
    std::path::Path::new(command.get_program())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.get_program().to_string_lossy().into_owned())
}

/// Renders the command line the way a user would type it.
pub(crate) fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| {
            let part = part.to_string_lossy();
            if part.is_empty() || part.contains(char::is_whitespace) {
                format!("\"{}\"", part)
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
