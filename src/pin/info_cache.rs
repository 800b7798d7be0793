use std::sync::Arc;

use parking_lot::RwLock;

use crate::line::LineInfo;

/// The current [`LineInfo`] of a pin.
///
/// Snapshots are swapped as a whole, a reader holding one keeps a consistent
/// view no matter how many stores happen afterwards.
#[derive(Debug)]
pub struct LineInfoCache {
    current: RwLock<Arc<LineInfo>>,
}

impl LineInfoCache {
    pub fn new(info: LineInfo) -> Self {
        Self {
            current: RwLock::new(Arc::new(info)),
        }
    }

    pub fn load(&self) -> Arc<LineInfo> {
        Arc::clone(&self.current.read())
    }

    pub fn store(&self, info: LineInfo) {
        *self.current.write() = Arc::new(info);
    }

    /// Replace the snapshot with one derived from it. No store can land
    /// between reading the old snapshot and publishing the new one.
    pub fn update(&self, f: impl FnOnce(&LineInfo) -> LineInfo) {
        let mut current = self.current.write();
        *current = Arc::new(f(&current));
    }
}
