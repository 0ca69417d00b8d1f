//! Daemon supervisor: process lifecycle, the polling loop, and the
//! out-of-band status channel
//!
//! One daemon instance per machine, enforced by a PID lockfile. The caller
//! side (`start`/`stop`/`kill`/`restart`/`status`) runs in a short-lived CLI
//! process and talks to the daemon purely through the lockfile, signals and
//! the status pipe.

pub mod pidfile;
pub mod pipe;
pub mod signals;
pub mod state;

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{chdir, fork, setsid, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use fadestick_transport::{discovery, FadeStick, Transport, MAX_STEP_MS};

use crate::cpu::{CpuSampler, ProcStat};
use crate::led::{EffectError, EffectLimits, Effects};
use crate::scale::scale_to_rgb;

use pidfile::PidFile;
use pipe::StatusPipe;
use state::SharedState;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("daemon already running (pid {0})")]
    AlreadyRunning(Pid),

    #[error("pid lockfile contended")]
    LockContended,

    #[error("daemon did not respond in time")]
    StatusTimeout,

    #[error("malformed status frame: {0}")]
    BadFrame(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Errno(#[from] Errno),
}

/// Tunables for the supervisor and its polling loop.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Basename for the lockfile, status pipe and log file
    pub app_name: String,
    /// Directory holding them
    pub runtime_dir: PathBuf,
    /// Polling cadence; also the length of each load-color fade
    pub tick: Duration,
    /// Interpolation steps per fade
    pub morph_steps: u16,
    /// Sleep after a failed device discovery
    pub device_backoff: Duration,
    /// Sleep after an unexpected loop error
    pub error_backoff: Duration,
    /// Shutdown budget: attempts to drive the device dark
    pub shutdown_attempts: u32,
    /// Delay between shutdown attempts
    pub shutdown_poll: Duration,
    /// How long a status request waits for the daemon's reply
    pub status_timeout: Duration,
    /// Grace period between graceful stop and SIGKILL
    pub kill_grace: Duration,
    /// How long restart waits for the old instance to release the lock
    pub restart_wait: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            app_name: "cpufadestick".to_string(),
            runtime_dir: PathBuf::from("/tmp"),
            tick: Duration::from_secs(1),
            morph_steps: 50,
            device_backoff: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
            shutdown_attempts: 60,
            shutdown_poll: Duration::from_secs(1),
            status_timeout: Duration::from_secs(5),
            kill_grace: Duration::from_secs(5),
            restart_wait: Duration::from_secs(10),
        }
    }
}

impl DaemonConfig {
    pub fn pid_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.pid", self.app_name))
    }

    pub fn pipe_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.pipe", self.app_name))
    }

    pub fn log_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.log", self.app_name))
    }
}

/// Supervisor handle. Methods other than the daemonized branch of
/// [`Daemon::start`] run in the calling process and return a one-line,
/// human-readable outcome.
pub struct Daemon {
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    fn pidfile(&self) -> PidFile {
        PidFile::new(self.config.pid_path())
    }

    /// Start the daemon, detaching from the controlling terminal.
    ///
    /// Refuses without side effects when the lock is held by a live process.
    /// In the parent this returns promptly; the detached child acquires the
    /// lock, installs signal handlers, runs the loop and exits on its own.
    pub fn start(&self) -> Result<String, DaemonError> {
        if let Some(pid) = self.pidfile().read_owner() {
            debug!("start refused, pid {pid} holds the lock");
            return Ok("Daemon already running.".to_string());
        }

        info!("Daemon start requested");
        if !self.daemonize()? {
            return Ok("Daemon starting.".to_string());
        }

        // Detached child from here on; it never returns to the CLI path.
        let code = match self.run() {
            Ok(()) => 0,
            Err(e) => {
                error!("Daemon failed: {e}");
                1
            }
        };
        std::process::exit(code);
    }

    /// Ask a running daemon to stop gracefully.
    pub fn stop(&self) -> Result<String, DaemonError> {
        info!("Daemon stop requested");
        let lock = self.pidfile();
        let Some(pid) = lock.read_owner() else {
            if lock.path().exists() {
                lock.break_lock();
                return Ok("Daemon not running or was killed.".to_string());
            }
            return Ok("Daemon already stopped.".to_string());
        };

        debug!("sending SIGINT to pid {pid}");
        match kill(pid, Signal::SIGINT) {
            Ok(()) => Ok("Daemon stopping.".to_string()),
            Err(Errno::ESRCH) => {
                lock.break_lock();
                Ok("Daemon not running or was killed.".to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stop gracefully if possible, then terminate with prejudice and clear
    /// the lock regardless of the outcome.
    pub fn kill(&self) -> Result<String, DaemonError> {
        if let Err(e) = self.stop() {
            debug!("graceful stop before kill failed: {e}");
        }
        thread::sleep(self.config.kill_grace);

        let lock = self.pidfile();
        let Some(pid) = lock.read_owner() else {
            lock.break_lock();
            return Ok("Daemon not running.".to_string());
        };

        info!("Daemon kill requested for pid {pid}");
        let result = kill(pid, Signal::SIGKILL);
        lock.break_lock();
        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok("Daemon was killed.".to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// Query a running daemon over the status pipe.
    ///
    /// The pipe is created here, on the requesting side, and removed again
    /// whatever happens; when the daemon is not running no pipe is created
    /// at all.
    pub fn status(&self) -> Result<String, DaemonError> {
        info!("Daemon status requested");
        let Some(pid) = self.pidfile().read_owner() else {
            return Ok("Daemon not running.".to_string());
        };

        let status_pipe = StatusPipe::create(self.config.pipe_path())?;
        let mut reader = status_pipe.open_reader()?;

        debug!("sending SIGUSR1 to pid {pid}");
        match kill(pid, Signal::SIGUSR1) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                self.pidfile().break_lock();
                return Ok("Daemon not running or was killed.".to_string());
            }
            Err(e) => return Err(e.into()),
        }

        match pipe::read_frame(&mut reader, self.config.status_timeout) {
            Ok(message) => Ok(message),
            Err(DaemonError::StatusTimeout) => Ok("Daemon did not respond in time.".to_string()),
            Err(e) => Err(e),
        }
    }

    /// Stop, wait for the lock to clear, start again.
    pub fn restart(&self) -> Result<String, DaemonError> {
        info!("Daemon restart requested");
        let stop_message = self.stop()?;

        let deadline = Instant::now() + self.config.restart_wait;
        while self.pidfile().read_owner().is_some() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(200));
        }

        let start_message = self.start()?;
        Ok(format!("{stop_message} {start_message}"))
    }

    /// Double-fork detach. Returns false in the original process, true in
    /// the detached child.
    fn daemonize(&self) -> Result<bool, DaemonError> {
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => return Ok(false),
            ForkResult::Child => {}
        }
        setsid()?;
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }
        chdir(self.config.runtime_dir.as_path())?;

        // stdin/stdout go dark; stderr lands in the log file so tracing
        // output survives the detach.
        let null = File::options().read(true).write(true).open("/dev/null")?;
        let log = File::options().create(true).append(true).open(self.config.log_path())?;
        unsafe {
            libc::dup2(null.as_raw_fd(), 0);
            libc::dup2(null.as_raw_fd(), 1);
            libc::dup2(log.as_raw_fd(), 2);
        }
        Ok(true)
    }

    /// Daemon-process body: hold the lock for the lifetime of the loop.
    fn run(&self) -> Result<(), DaemonError> {
        let lock = self.pidfile();
        lock.acquire()?;
        let result = self.serve();
        lock.release();
        info!("Daemon stopped");
        result
    }

    fn serve(&self) -> Result<(), DaemonError> {
        signals::install()?;
        let state = SharedState::new();
        state.set_running(true);
        info!("Daemon started");

        let mut sampler = CpuSampler::new(ProcStat::new()?);
        let mut device: Option<Effects<FadeStick>> = None;
        let tick_ms = self.config.tick.as_millis().min(u128::from(MAX_STEP_MS)) as u16;

        loop {
            // Stop is observed here, so cancellation latency is bounded by
            // one tick plus any in-flight transfer.
            if signals::stop_requested() {
                break;
            }
            if signals::take_status_request() {
                self.reply_status(&state);
            }

            if device.is_none() {
                match discovery::find_first() {
                    Ok(stick) => {
                        info!("FadeStick {} attached", stick.serial());
                        state.set_device_present(true);
                        device = Some(Effects::new(stick, EffectLimits::default()));
                    }
                    Err(e) => {
                        debug!("no device: {e}");
                        state.set_device_present(false);
                        thread::sleep(self.config.device_backoff);
                        continue;
                    }
                }
            }

            let fraction = match sampler.sample() {
                Ok(Some(fraction)) => fraction,
                Ok(None) => {
                    // Baseline sample; nothing to show yet.
                    thread::sleep(self.config.tick);
                    continue;
                }
                Err(e) => {
                    error!("load sample failed: {e}");
                    thread::sleep(self.config.error_backoff);
                    continue;
                }
            };

            let color = scale_to_rgb(fraction);
            state.set_load(fraction, color);
            debug!("CPU {:.2}% -> {color}", fraction * 100.0);

            let Some(effects) = device.as_mut() else {
                continue;
            };
            match effects.morph_to(color, tick_ms, self.config.morph_steps) {
                Ok(()) => thread::sleep(self.config.tick),
                Err(EffectError::Transport(e)) => {
                    warn!("device fault, rediscovering next tick: {e}");
                    state.set_device_present(false);
                    device = None;
                }
                Err(e) => {
                    error!("Daemon tick error: {e}");
                    thread::sleep(self.config.error_backoff);
                }
            }
        }

        info!("Daemon stopping");
        state.set_running(false);
        self.shutdown_device(device.take(), &state);
        Ok(())
    }

    /// Best-effort shutdown: drive the LED dark and poll for confirmation,
    /// within a fixed retry budget, never forever.
    fn shutdown_device(&self, device: Option<Effects<FadeStick>>, state: &SharedState) {
        if let Some(mut effects) = device {
            debug!("shutting down FadeStick");
            for attempt in 0..self.config.shutdown_attempts {
                match effects.turn_off().and_then(|()| effects.is_off()) {
                    Ok(true) => break,
                    // Pattern playback still draining; don't flood the device.
                    Ok(false) => thread::sleep(self.config.shutdown_poll),
                    Err(e) => {
                        warn!("shutdown attempt {attempt} failed: {e}");
                        break;
                    }
                }
            }
        }
        state.set_device_present(false);
    }

    fn reply_status(&self, state: &SharedState) {
        let line = state.status_line();
        info!("{line}");
        if let Err(e) = pipe::write_frame(&self.config.pipe_path(), &line) {
            warn!("could not reply on status pipe: {e}");
        }
    }
}
