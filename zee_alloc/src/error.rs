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

//! Errors surfaced by the allocator core (§7 of the design).

use core::fmt;

/// The backing provider or the core itself could not satisfy a request.
///
/// Returned unchanged from the backing provider, or synthesised when the
/// requested alignment exceeds what the allocator supports (more than two
/// machine words). There is no retry inside the core; the caller decides
/// whether to reclaim memory and try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("out of memory")
	}
}

impl core::error::Error for AllocError {}

/// A pointer handed to [`crate::Allocator::resize`] or
/// [`crate::Allocator::deallocate`] does not recover into a valid frame:
/// either its start is not aligned to two machine words, or its reported
/// `frame_size` is neither a power of two in range nor a multiple of the
/// page size.
///
/// This is a programmer error (double free, foreign pointer, a write past
/// the end of a prior allocation clobbering the next frame's header), not a
/// resource exhaustion condition; see [`crate::Validation`] for the
/// available policies on what happens when one is detected. Under
/// `Validation::Dev`/`External` it is never returned to the caller: the core
/// aborts the process as soon as it is produced (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnalignedMemory {
	/// The address that failed to recover into a Frame.
	pub address: usize,
}

impl fmt::Display for UnalignedMemory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "corrupt or foreign allocator metadata at {:#x}", self.address)
	}
}

impl core::error::Error for UnalignedMemory {}
