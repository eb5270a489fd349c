//! Encoder subprocess handling.
//!
//! [`EncoderProcess`] is the seam between the monitor and a running
//! encoder. [`SpawnedProcess`] is the real implementation: the child's
//! stdout and stderr go into one line stream, because HandBrake's progress
//! lines and its warnings share that channel.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{TranscodeError, TranscodeResult};

/// A running encoder as seen by the monitor.
#[async_trait]
pub trait EncoderProcess: Send {
    /// Next line of combined output, or `None` once all output is drained.
    async fn next_line(&mut self) -> TranscodeResult<Option<String>>;

    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> TranscodeResult<i32>;

    /// Kill the process. One request, no escalation.
    async fn kill(&mut self) -> TranscodeResult<()>;
}

/// Line reader that treats `\n`, `\r` and `\r\n` as line ends.
///
/// HandBrakeCLI redraws its status line with bare carriage returns, so a
/// plain `\n` splitter would only see one huge line per run.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    skip_lf: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            skip_lf: false,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Cancel safe: partial lines are kept in `self` between calls.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.inner.fill_buf().await?;

            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            // Second half of a \r\n pair
            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    self.inner.consume(1);
                    continue;
                }
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.buf.extend_from_slice(&available[..end]);
                    self.skip_lf = available[end] == b'\r';
                    self.inner.consume(end + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(available);
                    self.inner.consume(len);
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

/// Encoder child process with merged output.
pub struct SpawnedProcess {
    program: String,
    child: Child,
    output: MergedOutput,
}

impl SpawnedProcess {
    /// Spawn `argv[0]` with the remaining arguments, no shell involved.
    pub fn spawn(argv: &[String]) -> TranscodeResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TranscodeError::internal("empty argument vector"))?;

        debug!("Spawning: {}", argv.join(" "));

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let pending = MergedOutput::attach(&mut command)?;

        let mut child = command
            .spawn()
            .map_err(|e| TranscodeError::spawn_failed(program.clone(), e))?;
        // Drop our copies of the write ends so EOF arrives when the child exits
        drop(command);

        let output = pending.finish(&mut child)?;

        Ok(Self {
            program: program.clone(),
            child,
            output,
        })
    }
}

#[async_trait]
impl EncoderProcess for SpawnedProcess {
    async fn next_line(&mut self) -> TranscodeResult<Option<String>> {
        Ok(self.output.next_line().await?)
    }

    async fn wait(&mut self) -> TranscodeResult<i32> {
        let status = self.child.wait().await?;
        let code = exit_code(status);
        debug!(program = %self.program, exit_code = code, "Encoder exited");
        Ok(code)
    }

    async fn kill(&mut self) -> TranscodeResult<()> {
        warn!(program = %self.program, pid = ?self.child.id(), "Killing encoder");
        self.child.kill().await?;
        Ok(())
    }
}

/// Stdout and stderr sharing one pipe, so lines keep the order the encoder
/// wrote them in.
#[cfg(unix)]
struct MergedOutput {
    reader: LineReader<tokio::net::unix::pipe::Receiver>,
}

#[cfg(unix)]
struct PendingOutput {
    reader: std::io::PipeReader,
}

#[cfg(unix)]
impl MergedOutput {
    fn attach(command: &mut Command) -> TranscodeResult<PendingOutput> {
        let (reader, writer) = std::io::pipe()?;
        command.stdout(writer.try_clone()?).stderr(writer);
        Ok(PendingOutput { reader })
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.reader.next_line().await
    }
}

#[cfg(unix)]
impl PendingOutput {
    fn finish(self, _child: &mut Child) -> TranscodeResult<MergedOutput> {
        let fd = std::os::fd::OwnedFd::from(self.reader);
        let receiver = tokio::net::unix::pipe::Receiver::from_owned_fd(fd)?;
        Ok(MergedOutput {
            reader: LineReader::new(receiver),
        })
    }
}

/// Without unix pipes the two streams are read side by side, taking lines
/// from whichever is ready first.
#[cfg(not(unix))]
struct MergedOutput {
    stdout: Option<LineReader<tokio::process::ChildStdout>>,
    stderr: Option<LineReader<tokio::process::ChildStderr>>,
}

#[cfg(not(unix))]
struct PendingOutput;

#[cfg(not(unix))]
impl MergedOutput {
    fn attach(command: &mut Command) -> TranscodeResult<PendingOutput> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        Ok(PendingOutput)
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let (line, from_stdout) = match (self.stdout.as_mut(), self.stderr.as_mut()) {
                (None, None) => return Ok(None),
                (Some(out), None) => (out.next_line().await?, true),
                (None, Some(err)) => (err.next_line().await?, false),
                (Some(out), Some(err)) => tokio::select! {
                    line = out.next_line() => (line?, true),
                    line = err.next_line() => (line?, false),
                },
            };

            match line {
                Some(line) => return Ok(Some(line)),
                None if from_stdout => self.stdout = None,
                None => self.stderr = None,
            }
        }
    }
}

#[cfg(not(unix))]
impl PendingOutput {
    fn finish(self, child: &mut Child) -> TranscodeResult<MergedOutput> {
        Ok(MergedOutput {
            stdout: child.stdout.take().map(LineReader::new),
            stderr: child.stderr.take().map(LineReader::new),
        })
    }
}

/// Exit code of a finished process; on unix a signal death reports the
/// negated signal number.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted stand-in for a running encoder.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counters shared between a [`ScriptedProcess`] and the test.
    #[derive(Debug, Clone, Default)]
    pub struct Probe {
        kills: Arc<AtomicUsize>,
        lines_read: Arc<AtomicUsize>,
        waits: Arc<AtomicUsize>,
    }

    impl Probe {
        pub fn kills(&self) -> usize {
            self.kills.load(Ordering::SeqCst)
        }

        pub fn lines_read(&self) -> usize {
            self.lines_read.load(Ordering::SeqCst)
        }

        pub fn waits(&self) -> usize {
            self.waits.load(Ordering::SeqCst)
        }
    }

    enum Step {
        Line(String),
        Fail(String),
    }

    /// Emits scripted lines, each after a delay on the tokio clock.
    pub struct ScriptedProcess {
        script: VecDeque<(Duration, Step)>,
        exit_code: i32,
        probe: Probe,
    }

    impl ScriptedProcess {
        pub fn new(exit_code: i32) -> Self {
            Self {
                script: VecDeque::new(),
                exit_code,
                probe: Probe::default(),
            }
        }

        pub fn line_after(mut self, delay: Duration, line: impl Into<String>) -> Self {
            self.script.push_back((delay, Step::Line(line.into())));
            self
        }

        /// Fail the read after `delay`, as a broken pipe would.
        pub fn fail_after(mut self, delay: Duration, message: impl Into<String>) -> Self {
            self.script.push_back((delay, Step::Fail(message.into())));
            self
        }

        pub fn probe(&self) -> Probe {
            self.probe.clone()
        }
    }

    #[async_trait]
    impl EncoderProcess for ScriptedProcess {
        async fn next_line(&mut self) -> TranscodeResult<Option<String>> {
            let Some((delay, step)) = self.script.pop_front() else {
                return Ok(None);
            };
            tokio::time::sleep(delay).await;
            match step {
                Step::Line(line) => {
                    self.probe.lines_read.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(line))
                }
                Step::Fail(message) => Err(std::io::Error::other(message).into()),
            }
        }

        async fn wait(&mut self) -> TranscodeResult<i32> {
            self.probe.waits.fetch_add(1, Ordering::SeqCst);
            Ok(self.exit_code)
        }

        async fn kill(&mut self) -> TranscodeResult<()> {
            self.probe.kills.fetch_add(1, Ordering::SeqCst);
            self.script.clear();
            Ok(())
        }
    }
}
