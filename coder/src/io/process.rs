//! Child processes with a wall-clock timeout and bounded output capture.
//!
//! Each child leads its own process group. On timeout the whole group is
//! killed, so backgrounded grandchildren cannot keep the call alive by holding
//! the output pipes open.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long output readers may keep draining once the process group is dead.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exit code, or `-1` when the process was killed by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_text(&self) -> String {
        with_truncation_notice(&self.stdout, self.stdout_truncated)
    }

    pub fn stderr_text(&self) -> String {
        with_truncation_notice(&self.stderr, self.stderr_truncated)
    }
}

fn with_truncation_notice(bytes: &[u8], truncated: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if truncated > 0 {
        text.push_str(&format!("\n[output truncated {truncated} bytes]"));
    }
    text
}

/// Run `script` through `sh -c` in `cwd`.
pub fn run_shell(
    script: &str,
    cwd: &Path,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).current_dir(cwd);
    run_command_with_timeout(cmd, timeout, output_limit_bytes)
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read on background threads while the child runs. Bytes beyond
/// `output_limit_bytes` per stream are drained and counted but not stored.
///
/// The timeout bounds the whole call: if the child is still running, or if
/// processes it left behind still hold the pipes open when the deadline
/// passes, the process group is killed, `timed_out` is set, and whatever
/// output was collected so far is returned.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    debug!("spawning child process");
    let deadline = Instant::now() + timeout;
    let mut child = cmd.spawn().context("spawn command")?;
    let group = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout = spawn_reader(stdout, output_limit_bytes, done_tx.clone());
    let stderr = spawn_reader(stderr, output_limit_bytes, done_tx);
    let mut pending_readers = 2;

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            kill_group(group);
            if let Err(err) = child.kill() {
                debug!(err = %err, "child already gone");
            }
            child.wait().context("wait command after kill")?
        }
    };

    if !timed_out && !wait_for_readers(&done_rx, &mut pending_readers, deadline) {
        warn!(
            timeout_secs = timeout.as_secs(),
            "leftover processes kept the output open, killing"
        );
        timed_out = true;
        kill_group(group);
    }
    if timed_out && !wait_for_readers(&done_rx, &mut pending_readers, Instant::now() + DRAIN_GRACE)
    {
        warn!(pending_readers, "output still open after kill, returning partial output");
    }

    let (stdout, stdout_truncated) = take_capture(&stdout);
    let (stderr, stderr_truncated) = take_capture(&stderr);

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Send SIGKILL to every process in `group`.
fn kill_group(group: u32) {
    let result = Command::new("kill")
        .args(["-9", "--", &format!("-{group}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => debug!(group, "process group killed"),
        Ok(status) => debug!(group, %status, "process group already gone"),
        Err(err) => warn!(group, err = %err, "failed to run kill"),
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

/// Drain `reader` on its own thread; `done` fires once the stream closes.
///
/// The thread is never joined, so a pipe held open by an unkillable process
/// cannot block the caller.
fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    done: Sender<()>,
) -> Arc<Mutex<Captured>> {
    let capture = Arc::new(Mutex::new(Captured::default()));
    let sink = Arc::clone(&capture);
    thread::spawn(move || {
        if let Err(err) = read_stream_limited(reader, limit, &sink) {
            debug!(err = %err, "output reader stopped");
        }
        let _ = done.send(());
    });
    capture
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, sink: &Mutex<Captured>) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }
}

/// Wait until every pending reader reports done. `false` once `deadline` passes first.
fn wait_for_readers(done: &Receiver<()>, pending: &mut usize, deadline: Instant) -> bool {
    while *pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if done.recv_timeout(remaining).is_err() {
            return false;
        }
        *pending -= 1;
    }
    true
}

fn take_capture(capture: &Mutex<Captured>) -> (Vec<u8>, usize) {
    let mut captured = capture.lock().unwrap_or_else(PoisonError::into_inner);
    (std::mem::take(&mut captured.bytes), captured.truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams_and_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_shell(
            "echo out; echo err 1>&2; exit 3",
            temp.path(),
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert_eq!(output.stdout_text(), "out\n");
        assert_eq!(output.stderr_text(), "err\n");
        assert_eq!(output.exit_code(), 3);
        assert!(!output.timed_out);
    }

    #[test]
    fn output_beyond_limit_is_counted_not_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output =
            run_shell("printf 'abcdefghij'", temp.path(), Duration::from_secs(10), 4).expect("run");
        assert_eq!(output.stdout, b"abcd");
        assert_eq!(output.stdout_truncated, 6);
        assert!(output.stdout_text().contains("[output truncated 6 bytes]"));
    }

    #[test]
    fn slow_command_is_killed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output =
            run_shell("sleep 5", temp.path(), Duration::from_millis(200), 1024).expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn timeout_kills_grandchildren_too() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started = Instant::now();
        let output = run_shell(
            "echo started; sleep 6; echo finished",
            temp.path(),
            Duration::from_millis(500),
            1024,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
        assert_eq!(output.stdout_text(), "started\n");
    }

    #[test]
    fn background_process_holding_pipes_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started = Instant::now();
        let output =
            run_shell("sleep 30 &", temp.path(), Duration::from_secs(1), 1024).expect("run");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[test]
    fn redirected_background_process_does_not_time_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_shell(
            "sleep 3 > /dev/null 2>&1 & echo launched",
            temp.path(),
            Duration::from_secs(2),
            1024,
        )
        .expect("run");
        assert!(!output.timed_out);
        assert_eq!(output.stdout_text(), "launched\n");
    }
}
