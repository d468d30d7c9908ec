// LUN number rotation

/// Exclusive upper bound of the rotation; assigned numbers stay below it.
pub const LUN_ROTATION: u32 = 100;

/// Counter value before the first allocation.
pub const INITIAL_LUN: u32 = 1;

/// Rotating LUN counter.
///
/// Each allocation advances the counter by one modulo [`LUN_ROTATION`]. LUN 0
/// belongs to the target's controller unit and is skipped, so allocations
/// cycle through 1..=99. Nothing is reclaimed: once the counter wraps it hands
/// out numbers that may still be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LunAllocator {
    current: u32,
}

impl LunAllocator {
    pub fn new() -> Self {
        Self::starting_at(INITIAL_LUN)
    }

    pub fn starting_at(current: u32) -> Self {
        Self { current: current % LUN_ROTATION }
    }

    /// Last number handed out (or the initial value if none yet).
    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn allocate(&mut self) -> u32 {
        self.current = (self.current + 1) % LUN_ROTATION;
        if self.current == 0 {
            self.current = 1;
        }
        self.current
    }
}

impl Default for LunAllocator {
    fn default() -> Self {
        Self::new()
    }
}
