use std::fmt;

use tracing::debug;

/// Holds at most one attached global listener.
///
/// `attach` produces a guard whose `Drop` detaches the listener, so
/// releasing the slot or dropping it detaches deterministically.
pub struct ScopedListener<G> {
    attach: Box<dyn FnMut() -> G>,
    active: Option<G>,
}

impl<G> fmt::Debug for ScopedListener<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedListener")
            .field("attached", &self.active.is_some())
            .finish()
    }
}

impl<G> ScopedListener<G> {
    pub fn new(attach: impl FnMut() -> G + 'static) -> Self {
        Self {
            attach: Box::new(attach),
            active: None,
        }
    }

    /// Returns `true` if a listener was attached by this call.
    pub fn acquire(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some((self.attach)());
        debug!("global click listener attached");
        true
    }

    /// Returns `true` if a listener was detached by this call.
    pub fn release(&mut self) -> bool {
        match self.active.take() {
            Some(guard) => {
                drop(guard);
                debug!("global click listener detached");
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }
}

impl ScopedListener<()> {
    /// A slot whose listener is a no-op, for hosts without a global event source.
    pub fn detached() -> Self {
        Self::new(|| ())
    }
}
