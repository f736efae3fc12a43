use std::fmt;
use std::sync::Arc;

use crate::driver::DriverHandle;

/// Index of an occupied slot, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// Wrap a raw index handed back by a caller. Validity is checked on use.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One in-flight query.
pub(crate) struct Slot {
    pub(crate) handle: Arc<dyn DriverHandle>,
    pub(crate) query: String,
}

// Manual Debug implementation because trait objects don't implement Debug
impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("handle", &"<DriverHandle>")
            .field("query", &self.query)
            .finish()
    }
}
