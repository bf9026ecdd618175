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

//! A tiny general-purpose heap allocator that sits on top of a coarse,
//! page-granularity backing allocator and turns it into a `malloc`/`free`/
//! `realloc` surface for arbitrary small and medium allocations.
//!
//! The allocator never returns memory to the backing provider and performs
//! no synchronization of its own: it is meant for single-threaded,
//! embedded-style environments such as a WebAssembly module instance. See
//! [`Allocator`] for the core data structure and [`global::ZeeAlloc`] for a
//! ready-to-use [`GlobalAlloc`](core::alloc::GlobalAlloc) wrapper.
//!
//! # Features
//!
//! - `logging`: compiles in `log` call sites tracing split/coalesce/backing
//!   activity. Default-off.
//! - `std`: builds against `std` instead of `core`/`alloc`. Only meant for
//!   running this crate's own test suite on the host.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc as alloc_crate;
#[cfg(feature = "std")]
extern crate std as alloc_crate;

mod allocator;
mod backing;
mod config;
mod error;
mod exclusive;
mod frame;
mod free_list;
pub mod global;
mod math;
mod size_classes;

pub use allocator::Allocator;
pub use backing::PageProvider;
pub use config::{Config, FreeStrategy, JumboMatchStrategy, Validation};
pub use error::{AllocError, UnalignedMemory};

#[cfg(target_arch = "wasm32")]
pub use backing::Wasm32PageProvider;

#[cfg(any(feature = "std", test))]
pub use backing::ArenaPageProvider;

/// The default WebAssembly page size, in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024;

/// The number of bytes of in-band header every [`frame::Frame`] carries
/// before its payload: a word for the free-list link, a word for the frame
/// size.
pub const HEADER_SIZE: usize = 2 * core::mem::size_of::<usize>();

/// The smallest payload a frame can hold: two machine words, matching the
/// maximum alignment the allocator promises (§1, §4.4).
pub const MIN_PAYLOAD: usize = 2 * core::mem::size_of::<usize>();

/// The smallest frame size the allocator will ever hand out or carve:
/// `2 * sizeof(word) + MIN_PAYLOAD`, i.e. 32 bytes on a 64-bit target and 16
/// bytes on 32-bit wasm.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + MIN_PAYLOAD;

#[cfg(test)]
mod test_support;
