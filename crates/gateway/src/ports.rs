//! Transport endpoint allocation
//!
//! One shared counter hands out strictly increasing UDP port pairs for relay
//! ingest. Ports are never recycled: a stopped relay's pair stays burned,
//! and the counter wraps at the `u16` edge if the space is ever exhausted.

use std::sync::atomic::{AtomicU16, Ordering};

/// Default base port for relay ingest allocation
pub const DEFAULT_PORT_BASE: u16 = 11000;

/// A pair of adjacent UDP ingest ports for one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    /// Port receiving Opus RTP audio
    pub audio: u16,

    /// Port receiving H.264 RTP video
    pub video: u16,
}

/// Monotonic port pair allocator
///
/// Constructed once and shared across sessions. Allocation is a single
/// atomic advance, so concurrent starts never observe overlapping pairs.
pub struct PortAllocator {
    next_port: AtomicU16,
}

impl PortAllocator {
    /// Create an allocator starting at `base`
    pub fn new(base: u16) -> Self {
        Self {
            next_port: AtomicU16::new(base),
        }
    }

    /// Allocate the next adjacent pair
    pub fn allocate_pair(&self) -> PortPair {
        let audio = self.next_port.fetch_add(2, Ordering::SeqCst);
        PortPair {
            audio,
            video: audio.wrapping_add(1),
        }
    }

    /// The next port a future allocation would hand out
    pub fn next_port(&self) -> u16 {
        self.next_port.load(Ordering::SeqCst)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_adjacent_and_increasing() {
        let allocator = PortAllocator::default();

        let first = allocator.allocate_pair();
        assert_eq!(first.audio, 11000);
        assert_eq!(first.video, 11001);

        let second = allocator.allocate_pair();
        assert_eq!(second.audio, 11002);
        assert_eq!(second.video, 11003);
        assert_eq!(allocator.next_port(), 11004);
    }

    #[test]
    fn test_concurrent_allocations_never_overlap() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let allocator = Arc::new(PortAllocator::new(20000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = Arc::clone(&allocator);
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|_| allocator.allocate_pair())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for pair in handle.join().unwrap() {
                assert_eq!(pair.video, pair.audio + 1);
                assert!(seen.insert(pair.audio));
                assert!(seen.insert(pair.video));
            }
        }
        assert_eq!(seen.len(), 8 * 50 * 2);
    }

    #[test]
    fn test_wraps_at_the_u16_edge() {
        let allocator = PortAllocator::new(u16::MAX - 1);

        let pair = allocator.allocate_pair();
        assert_eq!(pair.audio, 65534);
        assert_eq!(pair.video, 65535);

        let next = allocator.allocate_pair();
        assert_eq!(next.audio, 0);
        assert_eq!(next.video, 1);
    }
}
