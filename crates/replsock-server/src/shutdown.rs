//! Process-wide cleanup on exit and on SIGHUP/SIGINT.
//!
//! The coordinator is installed at most once per process. It owns no
//! connections itself; it drains every registry an endpoint asked it to
//! watch, which unlinks socket files so the next process can bind them.

use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use replsock_common::mutex_lock_or_recover;
use signal_hook::consts::{SIGHUP, SIGINT};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};

use crate::registry::{ConnectionRegistry, DrainReport};

pub const SIGHUP_EXIT_CODE: i32 = 128 + SIGHUP;
pub const SIGINT_EXIT_CODE: i32 = 128 + SIGINT;

static COORDINATOR: OnceLock<ShutdownCoordinator> = OnceLock::new();
static EXIT_HOOK_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Hangup and interrupt are the expected ways to stop a process that
/// embeds a REPL, so they exit successfully.
pub fn normalize_exit_code(code: i32) -> i32 {
    match code {
        SIGHUP_EXIT_CODE | SIGINT_EXIT_CODE => 0,
        other => other,
    }
}

pub struct ShutdownCoordinator {
    registries: Mutex<Vec<Arc<ConnectionRegistry>>>,
    signals: Vec<c_int>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("registries", &mutex_lock_or_recover(&self.registries).len())
            .field("signals", &self.signals)
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Install the exit hook and signal handlers on first call; later
    /// calls return the same coordinator.
    pub fn install() -> &'static ShutdownCoordinator {
        COORDINATOR.get_or_init(|| {
            register_exit_hook();
            let signals = install_signal_handlers();
            ShutdownCoordinator {
                registries: Mutex::new(vec![Arc::clone(ConnectionRegistry::global())]),
                signals,
            }
        })
    }

    /// Drain `registry` along with the others on shutdown.
    pub fn watch(&self, registry: Arc<ConnectionRegistry>) {
        let mut registries = mutex_lock_or_recover(&self.registries);
        if !registries.iter().any(|r| Arc::ptr_eq(r, &registry)) {
            registries.push(registry);
        }
    }

    pub fn is_watching(&self, registry: &Arc<ConnectionRegistry>) -> bool {
        mutex_lock_or_recover(&self.registries)
            .iter()
            .any(|r| Arc::ptr_eq(r, registry))
    }

    /// Signals whose handlers were installed. A signal the host already
    /// handles is left alone.
    pub fn installed_signals(&self) -> &[c_int] {
        &self.signals
    }

    /// Seal and drain every watched registry.
    pub fn drain(&self) -> DrainReport {
        let registries = mutex_lock_or_recover(&self.registries).clone();
        let mut total = DrainReport::default();
        for registry in registries {
            registry.seal();
            let report = registry.drain_all();
            total.closed += report.closed;
            total.removed_files.extend(report.removed_files);
            total.failed_unlinks.extend(report.failed_unlinks);
        }
        if total.closed > 0 || !total.removed_files.is_empty() {
            info!(
                closed = total.closed,
                removed = total.removed_files.len(),
                "drained REPL endpoints"
            );
        }
        total
    }

    /// Drain, then terminate the process with the normalized `code`.
    pub fn exit(&self, code: i32) -> ! {
        self.drain();
        std::process::exit(normalize_exit_code(code))
    }
}

fn register_exit_hook() {
    if EXIT_HOOK_REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }
    // SAFETY: `drain_on_exit` is a plain extern "C" fn that never unwinds.
    let rc = unsafe { libc::atexit(drain_on_exit) };
    if rc != 0 {
        warn!("failed to register REPL exit hook");
    }
}

extern "C" fn drain_on_exit() {
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(coordinator) = COORDINATOR.get() {
            coordinator.drain();
        }
    }));
}

fn has_default_disposition(signal: c_int) -> bool {
    // SAFETY: a null `act` only queries the current action into `current`.
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        libc::sigaction(signal, std::ptr::null(), &mut current) == 0
            && current.sa_sigaction == libc::SIG_DFL
    }
}

fn install_signal_handlers() -> Vec<c_int> {
    let wanted: Vec<c_int> = [SIGHUP, SIGINT]
        .into_iter()
        .filter(|&sig| {
            let default = has_default_disposition(sig);
            if !default {
                debug!(signal = sig, "signal already handled by host, not installing");
            }
            default
        })
        .collect();
    if wanted.is_empty() {
        return wanted;
    }

    let mut signals = match Signals::new(&wanted) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(error = %e, "failed to install REPL signal handlers");
            return Vec::new();
        }
    };

    let spawned = thread::Builder::new()
        .name("replsock-signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!(signal = sig, "received signal, closing REPL endpoints");
                match COORDINATOR.get() {
                    Some(coordinator) => coordinator.exit(128 + sig),
                    None => std::process::exit(normalize_exit_code(128 + sig)),
                }
            }
        });
    match spawned {
        Ok(_) => wanted,
        Err(e) => {
            warn!(error = %e, "failed to spawn REPL signal thread");
            Vec::new()
        }
    }
}
