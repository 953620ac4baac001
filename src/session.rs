//! Session gate
//!
//! The authentication layer decides whether the core is reachable at all; the
//! controller only asks a yes/no question before every intent.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait SessionGate: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Gate for embedders without an authentication layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysActive;

impl SessionGate for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

/// Gate toggled by whoever owns the session (login/logout).
#[derive(Debug, Default)]
pub struct SessionFlag {
    active: AtomicBool,
}

impl SessionFlag {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl SessionGate for SessionFlag {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
