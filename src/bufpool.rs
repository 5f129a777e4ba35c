use std::sync::{Mutex, OnceLock};

/// Which of [`HeaderParser`](crate::header::HeaderParser)'s two
/// buffer sizes a pooled buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTier {
    Primary,
    Secondary,
}

pub const PRIMARY_BUFFER_SIZE: usize = 4096;
pub const SECONDARY_BUFFER_SIZE: usize = 16384;

/// A process-wide free list of 4 KiB and 16 KiB byte buffers, reused
/// across sessions instead of allocated fresh per connection.
///
/// This has no correctness-visible state: a buffer handed out is
/// always zero-filled-to-length and never observed by more than one
/// session at a time.
pub struct BufferPool {
    primary: Mutex<Vec<Vec<u8>>>,
    secondary: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    /// The single, process-wide pool instance.
    pub fn global() -> &'static BufferPool {
        static POOL: OnceLock<BufferPool> = OnceLock::new();
        POOL.get_or_init(|| BufferPool {
            primary: Mutex::new(Vec::new()),
            secondary: Mutex::new(Vec::new()),
        })
    }

    fn size_of(tier: BufferTier) -> usize {
        match tier {
            BufferTier::Primary => PRIMARY_BUFFER_SIZE,
            BufferTier::Secondary => SECONDARY_BUFFER_SIZE,
        }
    }

    fn free_list(&self, tier: BufferTier) -> &Mutex<Vec<Vec<u8>>> {
        match tier {
            BufferTier::Primary => &self.primary,
            BufferTier::Secondary => &self.secondary,
        }
    }

    /// Takes a buffer of the requested tier, zero-filled to its full
    /// size, reusing one from the free list when available.
    pub fn take(&self, tier: BufferTier) -> Vec<u8> {
        if let Some(mut buf) = self.free_list(tier).lock().unwrap().pop() {
            buf.iter_mut().for_each(|b| *b = 0);
            return buf;
        }
        vec![0u8; Self::size_of(tier)]
    }

    /// Returns a buffer to the free list for reuse by the next session.
    pub fn give_back(&self, tier: BufferTier, buf: Vec<u8>) {
        debug_assert_eq!(buf.len(), Self::size_of(tier));
        self.free_list(tier).lock().unwrap().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_buffers() {
        let pool = BufferPool::global();
        let buf = pool.take(BufferTier::Primary);
        assert_eq!(buf.len(), PRIMARY_BUFFER_SIZE);
        pool.give_back(BufferTier::Primary, buf);
        let buf2 = pool.take(BufferTier::Primary);
        assert_eq!(buf2.len(), PRIMARY_BUFFER_SIZE);
        assert!(buf2.iter().all(|&b| b == 0));
    }
}
