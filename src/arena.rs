//! Fixed budget bump allocator
//!
//! Records are plain-old-data, written to and read from word-aligned byte storage.
//! Nothing is freed individually, whole arena is rewound by [`Arena::reset`].

use std::marker::PhantomData;

/// Storage word, arena base alignment is the alignment of this type
type Word = u64;

/// Offset of record of type `T` in arena
pub struct ArenaRef<T> {
    /// Byte offset
    offset: u32,

    /// Record type
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for ArenaRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaRef<T> {}

impl<T> PartialEq for ArenaRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> Eq for ArenaRef<T> {}

impl<T> std::fmt::Debug for ArenaRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArenaRef({})", self.offset)
    }
}

impl<T> ArenaRef<T> {
    /// Build reference from raw offset
    pub fn from_offset(offset: u32) -> Self {
        Self { offset, _phantom: PhantomData }
    }

    /// Get raw offset
    pub fn offset(self) -> u32 {
        self.offset
    }
}

/// Bump arena
pub struct Arena {
    /// Arena memory
    storage: Vec<Word>,

    /// Count of used bytes
    used: usize,
}

impl Arena {
    /// Create arena with at most `size` bytes of memory
    /// (rounded down to whole words). Size is limited by u32 offsets.
    pub fn new(size: usize) -> Self {
        let size = size.min(u32::MAX as usize);
        let word_count = size / std::mem::size_of::<Word>();

        Self {
            storage: vec![0; word_count],
            used: 0,
        }
    }

    /// Get arena size in bytes
    pub fn capacity(&self) -> usize {
        self.storage.len() * std::mem::size_of::<Word>()
    }

    /// Get count of allocated bytes
    pub fn used(&self) -> usize {
        self.used
    }

    /// Get count of free bytes
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    /// Rewind arena. All references allocated before are invalidated.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Check if record of type `T` fits in the rest of the arena
    pub fn can_alloc<T: bytemuck::Pod>(&self) -> bool {
        self.aligned_range::<T>().is_some()
    }

    /// Calculate byte range next allocation of `T` would take
    fn aligned_range<T: bytemuck::Pod>(&self) -> Option<std::ops::Range<usize>> {
        let align = std::mem::align_of::<T>();

        if align > std::mem::align_of::<Word>() {
            return None;
        }

        let begin = self.used.next_multiple_of(align);
        let end = begin.checked_add(std::mem::size_of::<T>())?;

        if end <= self.capacity() {
            Some(begin..end)
        } else {
            None
        }
    }

    /// Allocate record
    /// # Returns
    /// Record reference, None if arena has no space for it
    pub fn alloc<T: bytemuck::Pod>(&mut self, value: T) -> Option<ArenaRef<T>> {
        let range = self.aligned_range::<T>()?;
        let offset = u32::try_from(range.start).ok()?;

        bytemuck::cast_slice_mut::<Word, u8>(&mut self.storage)[range.clone()]
            .copy_from_slice(bytemuck::bytes_of(&value));
        self.used = range.end;

        Some(ArenaRef::from_offset(offset))
    }

    /// Get record by reference. References outside of allocated part give None.
    pub fn get<T: bytemuck::Pod>(&self, r: ArenaRef<T>) -> Option<&T> {
        let begin = r.offset as usize;
        let end = begin.checked_add(std::mem::size_of::<T>())?;

        if end > self.used {
            return None;
        }

        let bytes = bytemuck::cast_slice::<Word, u8>(&self.storage).get(begin..end)?;

        bytemuck::try_from_bytes(bytes).ok()
    }

    /// Get mutable record by reference
    pub fn get_mut<T: bytemuck::Pod>(&mut self, r: ArenaRef<T>) -> Option<&mut T> {
        let begin = r.offset as usize;
        let end = begin.checked_add(std::mem::size_of::<T>())?;

        if end > self.used {
            return None;
        }

        let bytes = bytemuck::cast_slice_mut::<Word, u8>(&mut self.storage).get_mut(begin..end)?;

        bytemuck::try_from_bytes_mut(bytes).ok()
    }
}
