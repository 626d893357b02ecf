use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Authentication context owned outside the engine.
pub trait Session: Send + Sync {
    /// Bearer token; empty when logged out.
    fn access_token(&self) -> String;
    fn environment(&self) -> String;

    fn is_logged_in(&self) -> bool {
        !self.access_token().is_empty()
    }
}

/// Tells background loops whether anybody is still watching the workflow.
pub trait SurfaceProbe: Send + Sync {
    fn is_open(&self) -> bool;
}

/// Shared open/closed flag for a front end.
#[derive(Debug, Clone)]
pub struct SurfaceFlag {
    open: Arc<AtomicBool>,
}

impl SurfaceFlag {
    pub fn new(open: bool) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(open)),
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl SurfaceProbe for SurfaceFlag {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
