/*
 * This file is part of zee_alloc.
 *
 * zee_alloc is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * zee_alloc is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * zee_alloc. If not, see <https://www.gnu.org/licenses/>.
 */

//! The coarse-grained backing allocator the [`crate::Allocator`] carves
//! frames out of (§4.5). This is the only seam that talks to the host: a
//! WebAssembly module instance grows its own linear memory, while a hosted
//! test build hands out slices of a fixed arena.

use crate::error::AllocError;
use core::ptr::NonNull;

/// A source of fresh, page-aligned memory that is never returned.
///
/// # Safety
///
/// Implementations must return memory that is valid for reads and writes for
/// the life of the program, aligned to at least `align`, and disjoint from
/// every previously returned region.
pub unsafe trait PageProvider {
	/// Requests at least `bytes_requested` fresh bytes, aligned to `align`.
	///
	/// The caller (an [`crate::Allocator`]) always passes a `bytes_requested`
	/// that is already a multiple of its own `PAGE_SIZE`, and an `align` no
	/// stricter than it; matching that granularity to what the provider can
	/// actually deliver is the caller's responsibility. Returns
	/// [`AllocError`](crate::AllocError) if the host has no more memory to
	/// give.
	fn grow(&mut self, bytes_requested: usize, align: usize) -> Result<NonNull<u8>, AllocError>;
}

/// Grows a WebAssembly module instance's own linear memory (§4.5, §6).
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct Wasm32PageProvider {
	_private: (),
}

#[cfg(target_arch = "wasm32")]
impl Wasm32PageProvider {
	/// The wasm linear memory page size mandated by the spec; not
	/// necessarily the same as the `Allocator::PAGE_SIZE` this provider
	/// backs, though in practice they always match.
	const WASM_PAGE_SIZE: usize = 64 * 1024;

	pub const fn new() -> Self {
		Self { _private: () }
	}
}

#[cfg(target_arch = "wasm32")]
unsafe impl PageProvider for Wasm32PageProvider {
	fn grow(&mut self, bytes_requested: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
		debug_assert_eq!(bytes_requested % Self::WASM_PAGE_SIZE, 0);
		debug_assert!(align <= Self::WASM_PAGE_SIZE);
		let pages = bytes_requested / Self::WASM_PAGE_SIZE;
		let prev_pages = core::arch::wasm32::memory_grow(0, pages);
		if prev_pages == usize::MAX {
			return Err(AllocError);
		}
		let addr = prev_pages * Self::WASM_PAGE_SIZE;
		// wasm32 linear memory always starts page-aligned, and every grant is
		// a whole number of pages, so the result is aligned to `PAGE_SIZE`
		// and therefore to `align`.
		Ok(unsafe { NonNull::new_unchecked(addr as *mut u8) })
	}
}

/// A bump-pointer mock backing allocator over a fixed host-owned arena, used
/// by this crate's own test suite in place of a real page-granularity host
/// (§13). Memory is never reclaimed, matching the real providers' contract.
#[cfg(any(feature = "std", test))]
pub struct ArenaPageProvider {
	arena: alloc_crate::boxed::Box<[core::mem::MaybeUninit<u8>]>,
	next: usize,
	page_size: usize,
}

#[cfg(any(feature = "std", test))]
impl ArenaPageProvider {
	/// Creates a provider backed by a fresh `capacity`-byte arena, with the
	/// given page granularity.
	pub fn new(capacity: usize, page_size: usize) -> Self {
		debug_assert!(crate::math::is_pow2(page_size));
		let arena = alloc_crate::vec![core::mem::MaybeUninit::uninit(); capacity].into_boxed_slice();
		let base = arena.as_ptr() as usize;
		let aligned_next = base.next_multiple_of(page_size) - base;
		Self {
			arena,
			next: aligned_next,
			page_size,
		}
	}

	/// Bytes handed out so far.
	pub fn used(&self) -> usize {
		self.next
	}
}

#[cfg(any(feature = "std", test))]
unsafe impl PageProvider for ArenaPageProvider {
	fn grow(&mut self, bytes_requested: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
		debug_assert_eq!(bytes_requested % self.page_size, 0);
		debug_assert!(align <= self.page_size);
		let base = self.arena.as_ptr() as usize;
		let start = (base + self.next).next_multiple_of(align) - base;
		let end = start.checked_add(bytes_requested).ok_or(AllocError)?;
		if end > self.arena.len() {
			return Err(AllocError);
		}
		self.next = end;
		let ptr = unsafe { (self.arena.as_mut_ptr() as *mut u8).add(start) };
		Ok(unsafe { NonNull::new_unchecked(ptr) })
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn arena_hands_out_disjoint_regions() {
		let mut provider = ArenaPageProvider::new(4 * 64 * 1024, 64 * 1024);
		let a = provider.grow(64 * 1024, 64 * 1024).unwrap();
		let b = provider.grow(64 * 1024, 64 * 1024).unwrap();
		assert_ne!(a.as_ptr(), b.as_ptr());
		assert_eq!(a.as_ptr() as usize % (64 * 1024), 0);
		assert_eq!(b.as_ptr() as usize % (64 * 1024), 0);
	}

	#[test]
	fn arena_exhausts_cleanly() {
		let mut provider = ArenaPageProvider::new(64 * 1024, 64 * 1024);
		assert!(provider.grow(64 * 1024, 64 * 1024).is_ok());
		assert!(provider.grow(64 * 1024, 64 * 1024).is_err());
	}
}
