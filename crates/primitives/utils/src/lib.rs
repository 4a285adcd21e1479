pub mod parsers;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

static CTRL_C: AtomicBool = AtomicBool::new(false);

async fn graceful_shutdown_inner() {
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => signal.recv().await,
            // SIGTERM not supported
            Err(_) => core::future::pending().await,
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm => {},
    };
    CTRL_C.store(true, Ordering::SeqCst);
}

/// Runs `future` to completion unless a shutdown signal arrives first, in which case `None` is returned.
pub async fn wait_or_graceful_shutdown<T>(future: impl Future<Output = T>) -> Option<T> {
    if CTRL_C.load(Ordering::SeqCst) {
        return None;
    }
    tokio::select! {
        _ = graceful_shutdown_inner() => { None },
        res = future => { Some(res) },
    }
}
