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

//! A ready-to-use [`core::alloc::GlobalAlloc`] over [`crate::Allocator`]
//! (§6), for crates that just want to install this as their
//! `#[global_allocator]`.

use crate::{backing::PageProvider, config::Config, exclusive::Exclusive, Allocator, DEFAULT_PAGE_SIZE};
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

/// `Allocator` wrapped for use as a `#[global_allocator]`.
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: zee_alloc::global::ZeeAlloc<zee_alloc::Wasm32PageProvider> =
///     zee_alloc::global::ZeeAlloc::new(zee_alloc::Wasm32PageProvider::new(), zee_alloc::Config::new());
/// ```
pub struct ZeeAlloc<P: PageProvider, const PAGE_SIZE: usize = DEFAULT_PAGE_SIZE> {
	inner: Exclusive<Allocator<P, PAGE_SIZE>>,
}

impl<P: PageProvider, const PAGE_SIZE: usize> ZeeAlloc<P, PAGE_SIZE> {
	pub const fn new(provider: P, config: Config) -> Self {
		Self {
			inner: Exclusive::new(Allocator::new(provider, config)),
		}
	}
}

unsafe impl<P: PageProvider, const PAGE_SIZE: usize> GlobalAlloc for ZeeAlloc<P, PAGE_SIZE> {
	unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
		self.inner
			.with(|alloc| alloc.allocate(layout.size(), layout.align()))
			.map(|p| p.as_ptr())
			.unwrap_or(core::ptr::null_mut())
	}

	unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
		let Some(ptr) = NonNull::new(ptr) else {
			return;
		};
		// `deallocate` itself aborts the process on corrupt/foreign metadata
		// under `Validation::Dev`/`External` (§7); nothing to handle here.
		self.inner.with(|alloc| alloc.deallocate(ptr));
	}

	unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		let Some(ptr) = NonNull::new(ptr) else {
			return core::ptr::null_mut();
		};
		self.inner
			.with(|alloc| alloc.resize(ptr, new_size, layout.align()))
			.map(|p| p.as_ptr())
			.unwrap_or(core::ptr::null_mut())
	}
}
