//! Scoped LIFO paged allocator.
//!
//! Rows, key/value encodings, and evaluator scratch space are all
//! allocated from an `Arena` and released in bulk via a `Checkpoint`
//! rather than individually freed — the same "lifo paged memory resource"
//! pattern the write pipeline relies on to reclaim per-statement scratch
//! space cheaply.

/// An opaque position in an `Arena`'s backing buffer. Only valid for the
/// `Arena` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug, Default)]
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    /// Copy `bytes` into the arena, returning the offset they start at.
    pub fn allocate(&mut self, bytes: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf.extend_from_slice(bytes);
        offset
    }

    /// Reserve `len` zeroed bytes, returning the offset they start at.
    pub fn allocate_zeroed(&mut self, len: usize) -> usize {
        let offset = self.buf.len();
        self.buf.resize(offset + len, 0);
        offset
    }

    pub fn get(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    pub fn get_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buf[offset..offset + len]
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Mark the current high-water mark. Everything allocated after this
    /// point can later be released in one shot via `deallocate_after`.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.buf.len())
    }

    /// Release everything allocated since `checkpoint`. Any offset handed
    /// out after the checkpoint was taken is invalidated; the caller is
    /// responsible for not holding on to those offsets past this call,
    /// mirroring the LIFO discipline of the pool it models.
    pub fn deallocate_after(&mut self, checkpoint: Checkpoint) {
        self.buf.truncate(checkpoint.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_releases_only_later_allocations() {
        let mut arena = Arena::new();
        let a = arena.allocate(b"hello");
        let cp = arena.checkpoint();
        arena.allocate(b"world");
        assert_eq!(arena.len(), 10);
        arena.deallocate_after(cp);
        assert_eq!(arena.len(), 5);
        assert_eq!(arena.get(a, 5), b"hello");
    }

    #[test]
    fn nested_checkpoints_are_lifo() {
        let mut arena = Arena::new();
        arena.allocate(b"a");
        let cp1 = arena.checkpoint();
        arena.allocate(b"bb");
        let cp2 = arena.checkpoint();
        arena.allocate(b"ccc");
        arena.deallocate_after(cp2);
        assert_eq!(arena.len(), 3);
        arena.deallocate_after(cp1);
        assert_eq!(arena.len(), 1);
    }
}
