//! Process-wide run state.
//!
//! Two flags and one signal:
//! - `SHUTDOWN`: Ctrl+C received
//! - `LOOP_ACTIVE`: the build loop is running and can stop between rounds
//! - finish signal: wakes the build loop out of its wait for changes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use crossbeam::channel::{self, Receiver, Sender};
use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// The build loop is running
static LOOP_ACTIVE: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Finish signal for the build loop. Bounded: repeated requests collapse.
static FINISH: LazyLock<(Sender<()>, Receiver<()>)> = LazyLock::new(|| channel::bounded(1));

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Loop or server active: graceful shutdown (stop the loop after the
///   current round, unblock the server)
/// - Nothing to stop yet, or second Ctrl+C: exit immediately
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        let graceful = LOOP_ACTIVE.load(Ordering::SeqCst) || SERVER.get().is_some();
        if !graceful || is_shutdown() {
            std::process::exit(130);
        }
        crate::log!("watch"; "shutting down...");
        request_shutdown();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Flag shutdown, wake the build loop and unblock the server.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    signal_finish();
    if let Some(server) = SERVER.get() {
        server.unblock();
    }
}

/// Check if shutdown has been requested
///
/// Uses Relaxed ordering: worst case a request or round more is processed.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Returns `false` when a signal is already pending.
fn signal_finish() -> bool {
    FINISH.0.try_send(()).is_ok()
}

/// Receiver side of the finish signal, for `build_loop`.
pub fn finish_signal() -> Receiver<()> {
    FINISH.1.clone()
}

// =============================================================================
// LOOP_ACTIVE / SERVER
// =============================================================================

/// Mark whether the build loop is running
pub fn set_loop_active(active: bool) {
    LOOP_ACTIVE.store(active, Ordering::SeqCst);
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

// =============================================================================
// Tests
// =============================================================================
