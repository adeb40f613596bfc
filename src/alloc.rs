// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Allocation plumbing for the counts array.
//!
//! The core only specifies the *contract*: callers may substitute the
//! allocation/deallocation primitives used for the counts array, and the
//! default is a 128-byte (cache-line) aligned, zeroed allocation. Hooking in
//! a custom allocator (e.g. a slab or arena) is left to embedders; this
//! module provides the default and the trait seam.

use core::alloc::Layout;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::AtomicI64;

/// Cache-line alignment the default allocator guarantees for the counts
/// array, matching the padding used for the hot atomic scalars.
pub const COUNTS_ALIGNMENT: usize = 128;

/// Allocates a zeroed, 128-byte aligned block able to hold `num` elements of
/// `size` bytes each. Mirrors the C core's `aligned_calloc`.
///
/// # Panics
/// Panics if `num * size` overflows or the allocator reports exhaustion.
pub fn aligned_calloc(num: usize, size: usize) -> *mut u8 {
    let bytes = num.checked_mul(size).expect("aligned_calloc size overflow");
    let layout = Layout::from_size_align(bytes.max(1), COUNTS_ALIGNMENT)
        .expect("aligned_calloc invalid layout");
    // SAFETY: layout is non-zero sized (max(1) above) and well-formed.
    let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        std::alloc::handle_alloc_error(layout);
    }
    ptr
}

/// Releases a block obtained from [`aligned_calloc`].
///
/// # Safety
/// `ptr` must have been returned by `aligned_calloc(num, size)` with the same
/// `num` and `size`, and must not have already been freed.
pub unsafe fn aligned_free(ptr: *mut u8, num: usize, size: usize) {
    if ptr.is_null() {
        return;
    }
    let bytes = num * size;
    let layout = Layout::from_size_align(bytes.max(1), COUNTS_ALIGNMENT)
        .expect("aligned_free invalid layout");
    std::alloc::dealloc(ptr, layout);
}

/// A heap-allocated, 128-byte aligned, zeroed slice. Used for the counts
/// array so that contended recording across cores doesn't false-share the
/// geometry or the three hot aggregate scalars, which live in the owning
/// [`Histogram`](crate::Histogram) rather than here.
pub struct AlignedBox<T: ?Sized> {
    ptr: *mut AtomicI64,
    len: usize,
    _marker: core::marker::PhantomData<T>,
}

// SAFETY: the contents are atomics; shared access across threads is sound.
unsafe impl<T: ?Sized> Send for AlignedBox<T> {}
unsafe impl<T: ?Sized> Sync for AlignedBox<T> {}

impl AlignedBox<[AtomicI64]> {
    pub(crate) fn zeroed_slice(len: usize) -> Self {
        let ptr = aligned_calloc(len, core::mem::size_of::<AtomicI64>()) as *mut AtomicI64;
        AlignedBox {
            ptr,
            len,
            _marker: core::marker::PhantomData,
        }
    }
}

impl Deref for AlignedBox<[AtomicI64]> {
    type Target = [AtomicI64];
    fn deref(&self) -> &[AtomicI64] {
        // SAFETY: ptr was allocated for `len` elements and zeroed; AtomicI64
        // has the same bit layout as i64, so zeroed memory is a valid value.
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl DerefMut for AlignedBox<[AtomicI64]> {
    fn deref_mut(&mut self) -> &mut [AtomicI64] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for AlignedBox<[AtomicI64]> {
    fn drop(&mut self) {
        unsafe {
            aligned_free(
                self.ptr as *mut u8,
                self.len,
                core::mem::size_of::<AtomicI64>(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_slice_is_actually_zero_and_aligned() {
        let b = AlignedBox::zeroed_slice(37);
        assert_eq!(37, b.len());
        assert_eq!(0, b.as_ptr() as usize % COUNTS_ALIGNMENT);
        for cell in b.iter() {
            assert_eq!(0, cell.load(core::sync::atomic::Ordering::Relaxed));
        }
    }
}
