//! Write-buffer size ladder.
//!
//! Writes start at the largest size and drop down the ladder when the
//! filesystem refuses a write, which near the end of a volume usually just
//! means "no room for a block this big". A ladder never grows back within
//! one file; each entry divides the previous one so that smaller writes
//! tile evenly into a block generated at the largest size.

/// Default ladder: 256 KB, 32 KB, 4 KB, 512 bytes.
pub const DEFAULT_BUFFER_SIZES: [usize; 4] = [0x40000, 0x8000, 0x1000, 0x200];

/// Descending list of candidate chunk sizes for one file's write loop.
#[derive(Debug, Clone)]
pub struct BufferLadder<'a> {
    sizes: &'a [usize],
    entry: usize,
}

impl<'a> BufferLadder<'a> {
    /// Start back at the largest size. The caller validated the list.
    pub fn new(sizes: &'a [usize]) -> Self {
        BufferLadder { sizes, entry: 0 }
    }

    /// The largest size; all fill blocks are allocated at this size.
    pub fn largest(&self) -> usize {
        self.sizes[0]
    }

    /// The chunk size currently in use.
    pub fn current(&self) -> usize {
        self.sizes[self.entry]
    }

    pub fn reduced(&self) -> bool {
        self.entry > 0
    }

    /// Drop to the next smaller size. Returns `false` when the ladder is
    /// exhausted and the current file can grow no further.
    pub fn shrink(&mut self) -> bool {
        if self.entry + 1 >= self.sizes.len() {
            return false;
        }
        self.entry += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_down_and_stops() {
        let mut ladder = BufferLadder::new(&DEFAULT_BUFFER_SIZES);
        assert_eq!(ladder.largest(), 0x40000);
        assert_eq!(ladder.current(), 0x40000);
        assert!(!ladder.reduced());
        assert!(ladder.shrink());
        assert_eq!(ladder.current(), 0x8000);
        assert!(ladder.reduced());
        assert!(ladder.shrink());
        assert!(ladder.shrink());
        assert_eq!(ladder.current(), 0x200);
        assert!(!ladder.shrink());
        assert_eq!(ladder.current(), 0x200);
    }

    #[test]
    fn default_entries_divide_evenly() {
        for pair in DEFAULT_BUFFER_SIZES.windows(2) {
            assert_eq!(pair[0] % pair[1], 0);
        }
    }

    #[test]
    fn single_entry_ladder() {
        let sizes = [4096usize];
        let mut ladder = BufferLadder::new(&sizes);
        assert_eq!(ladder.largest(), 4096);
        assert!(!ladder.shrink());
    }
}
