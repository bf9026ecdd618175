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

//! A frame is a self-describing, in-band allocation unit (§3, §4.1).
//!
//! Its header carries a free-list link (word 0) and its own size (word 1),
//! followed by the payload. Metadata lives inside the memory it describes
//! rather than in a side table: `free(ptr)` must recover the size with
//! nothing but `ptr` to go on, the same constraint that drives the teacher's
//! `malloc::chunk::Chunk::from_ptr`.

use crate::{error::UnalignedMemory, math, HEADER_SIZE, MIN_FRAME_SIZE};
use core::ptr::NonNull;

/// The sentinel value stored in [`Frame::next`] while the frame is handed
/// out to a user. Any other value means the frame is free: either linked
/// into a free list (the address of the next free frame) or at the tail of
/// one (`0`).
const ALLOCATED: usize = usize::MAX;

/// In-band frame header. The payload immediately follows this struct in
/// memory; there is no payload field here because its length is dynamic.
#[repr(C)]
pub(crate) struct Frame {
	/// Link to the next free frame on this bucket's free list, `0` at the
	/// tail, or [`ALLOCATED`] while the frame is handed out.
	next: usize,
	/// The frame's total length in bytes, header included.
	frame_size: usize,
}

impl Frame {
	/// Carves a fresh frame out of raw backing memory.
	///
	/// # Safety
	///
	/// `raw` must point to at least `frame_size` bytes, aligned to
	/// `2 * size_of::<usize>()`, that the caller exclusively owns.
	pub(crate) unsafe fn init(raw: NonNull<u8>, frame_size: usize) -> &'static mut Frame {
		debug_assert!(raw.as_ptr() as usize % HEADER_SIZE == 0);
		let frame = raw.cast::<Frame>().as_ptr();
		(*frame).next = 0;
		(*frame).frame_size = frame_size;
		&mut *frame
	}

	/// Reinterprets an address known (by construction) to already hold a
	/// valid frame header, such as a buddy computed from
	/// [`crate::size_classes::buddy_address`].
	///
	/// # Safety
	///
	/// `addr` must be the start of a live `Frame` of at least `HEADER_SIZE`
	/// bytes.
	pub(crate) unsafe fn from_address<'a>(addr: usize) -> &'a mut Frame {
		&mut *(addr as *mut Frame)
	}

	/// Recovers the frame that owns `payload`, validating that the result
	/// looks like a real frame header (§4.1, §7).
	///
	/// # Safety
	///
	/// `payload` must point into memory the allocator controls (it need not
	/// currently be a valid frame; that is exactly what this function
	/// checks), and must not be dangling.
	pub(crate) unsafe fn from_payload<'a>(
		payload: NonNull<u8>,
		page_size: usize,
	) -> Result<&'a mut Frame, UnalignedMemory> {
		let payload_addr = payload.as_ptr() as usize;
		let frame_addr = payload_addr.wrapping_sub(HEADER_SIZE);
		if frame_addr % HEADER_SIZE != 0 {
			return Err(UnalignedMemory { address: payload_addr });
		}
		let frame = &mut *(frame_addr as *mut Frame);
		if !frame.is_size_valid(page_size) {
			return Err(UnalignedMemory { address: payload_addr });
		}
		Ok(frame)
	}

	/// `true` if `frame_size` is either a power of two in
	/// `[MIN_FRAME_SIZE, page_size]` or a positive multiple of `page_size`
	/// (the only two legal shapes per §3).
	fn is_size_valid(&self, page_size: usize) -> bool {
		let size = self.frame_size;
		if size == 0 {
			return false;
		}
		if size <= page_size {
			math::is_pow2(size) && size >= MIN_FRAME_SIZE
		} else {
			size % page_size == 0
		}
	}

	/// Debug-only structural check, used after recovering a buddy by
	/// address (where `from_payload`'s alignment check was already implied
	/// by construction, but corruption could still have happened).
	#[inline]
	pub(crate) fn debug_check(&self, page_size: usize) {
		debug_assert!(self.is_size_valid(page_size));
	}

	#[inline]
	pub(crate) fn addr(&self) -> usize {
		self as *const Frame as usize
	}

	#[inline]
	pub(crate) fn frame_size(&self) -> usize {
		self.frame_size
	}

	#[inline]
	pub(crate) fn set_frame_size(&mut self, size: usize) {
		self.frame_size = size;
	}

	#[inline]
	pub(crate) fn payload_size(&self) -> usize {
		self.frame_size - HEADER_SIZE
	}

	#[inline]
	pub(crate) fn payload_ptr(&mut self) -> NonNull<u8> {
		unsafe { NonNull::new_unchecked((self as *mut Frame as *mut u8).add(HEADER_SIZE)) }
	}

	/// Bounds-checked mutable view of `payload[start..end]`.
	pub(crate) fn payload_slice_mut(&mut self, start: usize, end: usize) -> &mut [u8] {
		assert!(end <= self.payload_size());
		assert!(start <= end);
		unsafe { core::slice::from_raw_parts_mut(self.payload_ptr().as_ptr().add(start), end - start) }
	}

	#[inline]
	pub(crate) fn is_allocated(&self) -> bool {
		self.next == ALLOCATED
	}

	#[inline]
	pub(crate) fn mark_allocated(&mut self) {
		self.next = ALLOCATED;
	}

	/// Raw free-list link: `0` at the tail, otherwise the address of the
	/// next free frame. Only meaningful when `!is_allocated()`.
	#[inline]
	pub(crate) fn next_link(&self) -> usize {
		debug_assert!(!self.is_allocated());
		self.next
	}

	#[inline]
	pub(crate) fn set_next_link(&mut self, addr: usize) {
		self.next = addr;
	}

	/// Carves the upper half of this frame's payload off as a new,
	/// unlinked sub-frame of size `half`, and shrinks `self` to `half` in
	/// turn (§4.4 step 5, "split down").
	///
	/// # Safety
	///
	/// `self.frame_size` must currently be `2 * half` and `half` must be a
	/// legal frame size.
	pub(crate) unsafe fn split_upper_half(&mut self, half: usize) -> &'static mut Frame {
		let upper_addr = self.addr() + half;
		self.set_frame_size(half);
		Frame::init(NonNull::new_unchecked(upper_addr as *mut u8), half)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core::mem::MaybeUninit;

	#[repr(align(16))]
	struct AlignedBuf([MaybeUninit<u8>; 128]);

	#[test]
	fn init_then_recover_by_payload() {
		let mut buf = AlignedBuf([MaybeUninit::uninit(); 128]);
		let raw = NonNull::new(buf.0.as_mut_ptr() as *mut u8).unwrap();
		unsafe {
			let frame = Frame::init(raw, 64);
			assert_eq!(frame.frame_size(), 64);
			assert_eq!(frame.payload_size(), 64 - HEADER_SIZE);
			let payload = frame.payload_ptr();
			let recovered = Frame::from_payload(payload, 64 * 1024).unwrap();
			assert_eq!(recovered.addr(), raw.as_ptr() as usize);
		}
	}

	#[test]
	fn corrupt_size_is_rejected() {
		let mut buf = AlignedBuf([MaybeUninit::uninit(); 128]);
		let raw = NonNull::new(buf.0.as_mut_ptr() as *mut u8).unwrap();
		unsafe {
			let frame = Frame::init(raw, 64);
			frame.set_frame_size(17); // not a power of two, not a page multiple
			let payload = frame.payload_ptr();
			assert!(Frame::from_payload(payload, 64 * 1024).is_err());
		}
	}

	#[test]
	fn allocated_sentinel_roundtrip() {
		let mut buf = AlignedBuf([MaybeUninit::uninit(); 128]);
		let raw = NonNull::new(buf.0.as_mut_ptr() as *mut u8).unwrap();
		unsafe {
			let frame = Frame::init(raw, 64);
			assert!(!frame.is_allocated());
			frame.mark_allocated();
			assert!(frame.is_allocated());
		}
	}
}
