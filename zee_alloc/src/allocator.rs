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

//! The core allocator (§4.4): a fixed array of [`FreeList`] buckets plus a
//! [`PageProvider`] to grow from when every bucket it could split from is
//! empty.
//!
//! `PAGE_SIZE` is a const generic rather than a runtime field: it fixes the
//! shape of the bucket array, and on the only target this crate ships to in
//! anger (a WebAssembly module) it is always `64 * 1024` anyway.

use crate::{
	backing::PageProvider,
	config::{Config, FreeStrategy, JumboMatchStrategy},
	error::AllocError,
	frame::Frame,
	free_list::FreeList,
	math, size_classes, HEADER_SIZE,
};
use core::ptr::NonNull;

/// Upper bound on the number of buckets any `PAGE_SIZE` this crate supports
/// could need. Comfortably above `bucket_count(usize::MAX)`, so the bucket
/// array can be a plain fixed-size array instead of something the allocator
/// would need to allocate for itself.
const MAX_BUCKETS: usize = 64;

/// A page-granularity-backed heap allocator (§2, §4.4).
///
/// Not `Sync`, not reentrant, and performs no synchronization of its own
/// (§5): callers needing either wrap an `Allocator` themselves, the way
/// [`crate::global::ZeeAlloc`] does for [`core::alloc::GlobalAlloc`].
pub struct Allocator<P: PageProvider, const PAGE_SIZE: usize = { crate::DEFAULT_PAGE_SIZE }> {
	buckets: [FreeList; MAX_BUCKETS],
	bucket_count: usize,
	config: Config,
	provider: P,
}

impl<P: PageProvider, const PAGE_SIZE: usize> Allocator<P, PAGE_SIZE> {
	/// Builds an allocator over `provider`, with every bucket initially
	/// empty.
	pub const fn new(provider: P, config: Config) -> Self {
		debug_assert!(math::is_pow2(PAGE_SIZE));
		let bucket_count = size_classes::bucket_count(PAGE_SIZE);
		debug_assert!(bucket_count <= MAX_BUCKETS, "PAGE_SIZE too large for MAX_BUCKETS");
		const EMPTY: FreeList = FreeList::new();
		Self {
			buckets: [EMPTY; MAX_BUCKETS],
			bucket_count,
			config,
			provider,
		}
	}

	pub fn provider(&self) -> &P {
		&self.provider
	}

	pub fn provider_mut(&mut self) -> &mut P {
		&mut self.provider
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Number of free-list buckets this instance carries: `1` (jumbo) plus
	/// one per power-of-two size class from `PAGE_SIZE` down to
	/// `MIN_FRAME_SIZE`.
	pub fn bucket_count(&self) -> usize {
		self.bucket_count
	}

	/// Returns `size_of::<usize>() * 2`, the strictest alignment any
	/// payload this allocator hands out is guaranteed to have (§1, §4.4).
	#[inline]
	pub const fn max_supported_align() -> usize {
		HEADER_SIZE
	}

	/// Serves an allocation request for `size` bytes aligned to `align`
	/// (§4.4 "Allocate").
	pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
		if !math::is_pow2(align) || align > Self::max_supported_align() {
			return Err(AllocError);
		}
		let frame_size = size_classes::pad_to_frame_size(size, PAGE_SIZE).ok_or(AllocError)?;
		let bucket = size_classes::bucket_of(frame_size, PAGE_SIZE);
		debug_assert!(bucket < self.bucket_count);
		let frame = if bucket == 0 {
			self.jumbo_allocate(frame_size)?
		} else {
			self.find_or_split(bucket)?
		};
		frame.mark_allocated();
		#[cfg(feature = "logging")]
		log::trace!(
			"allocate: requested {size} bytes align {align} -> frame {:#x} ({} bytes, bucket {bucket})",
			frame.addr(),
			frame.frame_size()
		);
		Ok(frame.payload_ptr())
	}

	/// Resizes the allocation at `payload` to `new_size` bytes aligned to
	/// `new_align` (§4.4 "Resize").
	///
	/// Shrinking a non-jumbo frame splits it down in place and is therefore
	/// zero-copy. Every other case — growing, or shrinking a jumbo frame,
	/// which this allocator never splits (§9) — allocates fresh, copies the
	/// overlap, and frees the old frame.
	pub fn resize(
		&mut self,
		payload: NonNull<u8>,
		new_size: usize,
		new_align: usize,
	) -> Result<NonNull<u8>, AllocError> {
		if !math::is_pow2(new_align) || new_align > Self::max_supported_align() {
			return Err(AllocError);
		}
		let frame = unsafe { self.recover_frame(payload) };
		let new_frame_size = size_classes::pad_to_frame_size(new_size, PAGE_SIZE).ok_or(AllocError)?;

		if new_frame_size == frame.frame_size() {
			return Ok(frame.payload_ptr());
		}

		let old_bucket = size_classes::bucket_of(frame.frame_size(), PAGE_SIZE);
		let new_bucket = size_classes::bucket_of(new_frame_size, PAGE_SIZE);
		if new_frame_size < frame.frame_size() && old_bucket != 0 && new_bucket != 0 {
			let shrunk = self.split_down_to(frame, old_bucket, new_bucket);
			#[cfg(feature = "logging")]
			log::trace!("resize: shrunk frame {:#x} in place to bucket {new_bucket}", shrunk.addr());
			return Ok(shrunk.payload_ptr());
		}

		let copy_len = frame.payload_size().min(new_size);
		let src = frame.payload_slice_mut(0, copy_len).as_ptr();
		let new_ptr = self.allocate(new_size, new_align)?;
		unsafe {
			core::ptr::copy_nonoverlapping(src, new_ptr.as_ptr(), copy_len);
		}
		self.free_frame(frame);
		Ok(new_ptr)
	}

	/// Releases the allocation at `payload` back to its bucket (§4.4
	/// "Deallocate"). Aborts the process if `payload` does not recover into
	/// a valid frame under [`Validation::Dev`](crate::Validation)/`External`
	/// (§7).
	pub fn deallocate(&mut self, payload: NonNull<u8>) {
		let frame = unsafe { self.recover_frame(payload) };
		self.free_frame(frame);
	}

	/// Recovers the frame backing `payload`, honouring [`Validation`](crate::Validation)
	/// (§7): `Unsafe` skips the structural check entirely (UB on a bad
	/// pointer); `External` and `Dev` both perform it and abort the process
	/// on failure (§7: "Dev or debug build: assert and abort"; "External...
	/// abort on violation"); `Dev` additionally asserts the frame wasn't
	/// already free (catching an in-process double free that `Unsafe`/
	/// `External` would otherwise corrupt the free list on).
	///
	/// # Safety
	///
	/// `payload` must point into memory this allocator controls.
	unsafe fn recover_frame(&self, payload: NonNull<u8>) -> &'static mut Frame {
		use crate::config::Validation;
		let frame = match self.config.validation {
			Validation::Unsafe => Frame::from_address((payload.as_ptr() as usize).wrapping_sub(HEADER_SIZE)),
			Validation::External | Validation::Dev => match Frame::from_payload(payload, PAGE_SIZE) {
				Ok(frame) => frame,
				Err(e) => {
					#[cfg(feature = "logging")]
					log::warn!("recover_frame: {e}");
					panic!("zee_alloc: {e}");
				}
			},
		};
		if self.config.validation == Validation::Dev {
			debug_assert!(frame.is_allocated(), "double free at {:#x}", frame.addr());
		}
		frame
	}

	fn free_frame(&mut self, frame: &'static mut Frame) {
		debug_assert!(frame.is_allocated());
		#[cfg(feature = "logging")]
		log::trace!("deallocate: frame {:#x} ({} bytes)", frame.addr(), frame.frame_size());
		let bucket = size_classes::bucket_of(frame.frame_size(), PAGE_SIZE);
		if bucket == 0 || self.config.free_strategy == FreeStrategy::Fast {
			self.buckets[bucket].prepend(frame);
		} else {
			self.coalesce_and_insert(frame, bucket);
		}
	}

	/// Jumbo-bucket allocation, honouring the configured
	/// [`JumboMatchStrategy`] (§4.4, §9 — jumbo frames are never split, so a
	/// miss always means growing fresh).
	fn jumbo_allocate(&mut self, frame_size: usize) -> Result<&'static mut Frame, AllocError> {
		let found = match self.config.jumbo_match_strategy {
			JumboMatchStrategy::Exact => self.buckets[0].take_first(|f| f.frame_size() == frame_size),
			JumboMatchStrategy::Closest => self.buckets[0].take_best_fit(frame_size),
			JumboMatchStrategy::First => self.buckets[0].take_first(|f| f.frame_size() >= frame_size),
		};
		if let Some(frame) = found {
			return Ok(frame);
		}
		#[cfg(feature = "logging")]
		log::debug!("jumbo_allocate: no free frame fits {frame_size} bytes, asking backing provider");
		let raw = match self.provider.grow(frame_size, PAGE_SIZE) {
			Ok(raw) => raw,
			Err(e) => {
				#[cfg(feature = "logging")]
				log::warn!("jumbo_allocate: backing provider out of memory for {frame_size} bytes");
				return Err(e);
			}
		};
		Ok(unsafe { Frame::init(raw, frame_size) })
	}

	/// Finds a free frame for `target_bucket`, splitting a larger free
	/// frame down if necessary, and growing a fresh page from the provider
	/// only once every bucket from `target_bucket` up to the page-sized
	/// bucket (`1`) is empty (§4.4 steps 3-5).
	fn find_or_split(&mut self, target_bucket: usize) -> Result<&'static mut Frame, AllocError> {
		let mut b = target_bucket;
		loop {
			if let Some(frame) = self.buckets[b].pop_front() {
				return Ok(self.split_down_to(frame, b, target_bucket));
			}
			if b == 1 {
				break;
			}
			b -= 1;
		}
		#[cfg(feature = "logging")]
		log::debug!("find_or_split: every bucket from {target_bucket} up to 1 was empty, growing a fresh page");
		let raw = match self.provider.grow(PAGE_SIZE, PAGE_SIZE) {
			Ok(raw) => raw,
			Err(e) => {
				#[cfg(feature = "logging")]
				log::warn!("find_or_split: backing provider out of memory for one page");
				return Err(e);
			}
		};
		let frame = unsafe { Frame::init(raw, PAGE_SIZE) };
		Ok(self.split_down_to(frame, 1, target_bucket))
	}

	/// Repeatedly halves `frame`, currently sized for `from_bucket`, down to
	/// `target_bucket`, stashing each freed upper half in its own bucket
	/// (§4.4 step 5, "split down"). `from_bucket` must be `<= target_bucket`.
	fn split_down_to(
		&mut self,
		mut frame: &'static mut Frame,
		from_bucket: usize,
		target_bucket: usize,
	) -> &'static mut Frame {
		debug_assert!(from_bucket <= target_bucket);
		let mut b = from_bucket;
		while b < target_bucket {
			let half_size = size_classes::bucket_size(b + 1, PAGE_SIZE);
			let upper = unsafe { frame.split_upper_half(half_size) };
			self.buckets[b + 1].prepend(upper);
			b += 1;
		}
		frame
	}

	/// Walks `frame` up the buddy chain as far as it will go, merging with
	/// a free buddy at each step, before inserting the (possibly merged)
	/// result into its bucket (§4.4 "Deallocate", `Compact` strategy).
	fn coalesce_and_insert(&mut self, mut frame: &'static mut Frame, mut bucket: usize) {
		while bucket > 1 {
			let buddy_addr = size_classes::buddy_address(frame.addr(), frame.frame_size());
			match self.buckets[bucket].remove(buddy_addr) {
				Some(buddy) => {
					buddy.debug_check(PAGE_SIZE);
					let parent_addr = frame.addr().min(buddy.addr());
					let merged_size = frame.frame_size() * 2;
					frame = unsafe {
						Frame::init(NonNull::new_unchecked(parent_addr as *mut u8), merged_size)
					};
					bucket -= 1;
				}
				None => break,
			}
		}
		self.buckets[bucket].prepend(frame);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backing::ArenaPageProvider;

	const PAGE_SIZE: usize = 4096;

	pub(super) fn new_allocator(config: Config) -> Allocator<ArenaPageProvider, PAGE_SIZE> {
		Allocator::new(ArenaPageProvider::new(64 * PAGE_SIZE, PAGE_SIZE), config)
	}

	#[test]
	fn allocate_then_deallocate_single_byte() {
		crate::test_support::init_logging();
		let mut alloc = new_allocator(Config::default());
		let ptr = alloc.allocate(1, 8).unwrap();
		unsafe {
			*ptr.as_ptr() = 0xAB;
			assert_eq!(*ptr.as_ptr(), 0xAB);
		}
		alloc.deallocate(ptr);
	}

	#[test]
	fn compact_free_fully_coalesces_back_to_one_page() {
		let mut alloc = new_allocator(Config {
			free_strategy: FreeStrategy::Compact,
			..Config::default()
		});
		// Drive a page down to its minimum-size buckets, then free
		// everything and confirm the top bucket (page-sized) recovers a
		// single free frame: full coalescing round-trip (§8 scenario 2).
		let mut ptrs = crate::alloc_crate::vec::Vec::new();
		loop {
			match alloc.allocate(1, 8) {
				Ok(p) => ptrs.push(p),
				Err(_) => break,
			}
			if ptrs.len() > 256 {
				break;
			}
		}
		for p in ptrs {
			alloc.deallocate(p);
		}
		assert!(!alloc.buckets[1].is_empty());
	}

	#[test]
	fn oversized_alignment_is_rejected() {
		let mut alloc = new_allocator(Config::default());
		assert!(alloc.allocate(8, 1024).is_err());
	}

	#[test]
	fn jumbo_allocation_roundtrip() {
		let mut alloc = new_allocator(Config::default());
		let ptr = alloc.allocate(PAGE_SIZE * 3, 8).unwrap();
		alloc.deallocate(ptr);
		assert!(!alloc.buckets[0].is_empty());
	}

	#[test]
	fn shrink_in_place_keeps_same_address() {
		let mut alloc = new_allocator(Config::default());
		let ptr = alloc.allocate(PAGE_SIZE - HEADER_SIZE, 8).unwrap();
		let shrunk = alloc.resize(ptr, 8, 8).unwrap();
		assert_eq!(ptr, shrunk);
	}

	#[test]
	fn grow_copies_payload_to_new_frame() {
		let mut alloc = new_allocator(Config::default());
		let ptr = alloc.allocate(8, 8).unwrap();
		unsafe {
			ptr.as_ptr().write_bytes(0x42, 8);
		}
		let grown = alloc.resize(ptr, PAGE_SIZE, 8).unwrap();
		unsafe {
			assert_eq!(*grown.as_ptr(), 0x42);
		}
	}
}

/// Property tests for §8's quantified invariants: live allocations never
/// alias, and every payload byte written before a `Compact` free survives a
/// shrink-then-grow round trip. Host-only, like the rest of this crate's own
/// test suite (§13).
#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
	use super::test::new_allocator;
	use crate::config::{Config, FreeStrategy};
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn live_allocations_never_alias(sizes in proptest::collection::vec(1usize..3000, 1..40)) {
			crate::test_support::init_logging();
			let mut alloc = new_allocator(Config::default());
			let mut ptrs: crate::alloc_crate::vec::Vec<(usize, usize)> = crate::alloc_crate::vec::Vec::new();
			for size in sizes {
				if let Ok(p) = alloc.allocate(size, 8) {
					ptrs.push((p.as_ptr() as usize, size));
				}
			}
			for i in 0..ptrs.len() {
				for j in (i + 1)..ptrs.len() {
					let (a, a_len) = ptrs[i];
					let (b, b_len) = ptrs[j];
					prop_assert!(a + a_len <= b || b + b_len <= a);
				}
			}
		}

		#[test]
		fn compact_free_round_trips_a_written_payload(size in 1usize..2000) {
			let mut alloc = new_allocator(Config {
				free_strategy: FreeStrategy::Compact,
				..Config::default()
			});
			let p = alloc.allocate(size, 8).unwrap();
			unsafe {
				for i in 0..size {
					*p.as_ptr().add(i) = (i % 251) as u8;
				}
			}
			let shrunk = alloc.resize(p, 1, 8).unwrap();
			let grown = alloc.resize(shrunk, size, 8).unwrap();
			unsafe {
				for i in 0..1 {
					prop_assert_eq!(*grown.as_ptr().add(i), (i % 251) as u8);
				}
			}
		}
	}
}
