use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight admission for detection cycles.
///
/// At most one [`CyclePermit`] exists at a time. Requests made while a permit
/// is outstanding are refused, never queued. The busy flag is cleared when
/// the permit is dropped, so every exit path of a cycle (including an error
/// or a panic) releases it.
#[derive(Clone, Debug, Default)]
pub struct InferenceGuard {
    busy: Arc<AtomicBool>,
}

impl InferenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<CyclePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the single in-flight detection slot.
#[derive(Debug)]
pub struct CyclePermit {
    busy: Arc<AtomicBool>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
