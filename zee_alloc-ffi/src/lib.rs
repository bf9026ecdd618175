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

//! C ABI shim exposing `malloc`/`realloc`/`free`/`calloc` over a single,
//! process-wide [`zee_alloc::Allocator`] (§4.6).
//!
//! Kept as its own crate, separate from `zee_alloc` itself, so that a caller
//! linking the core allocator as a Rust library (for its own
//! `#[global_allocator]`, say) never pays for symbols it isn't using; only
//! this crate exports the C names, and only the ones its `malloc`/`realloc`/
//! `free`/`calloc` features ask for.

#![no_std]

use core::ffi::c_void;
use core::ptr::NonNull;
use zee_alloc::Config;

#[cfg(target_arch = "wasm32")]
type Provider = zee_alloc::Wasm32PageProvider;
#[cfg(not(target_arch = "wasm32"))]
type Provider = zee_alloc::ArenaPageProvider;

#[cfg(target_arch = "wasm32")]
fn default_provider() -> Provider {
	Provider::new()
}

/// Host builds have no real page-granularity backing store to grow from, so
/// the FFI shim's own test/demo builds use a fixed arena. A real hosted
/// deployment of this shim is not this crate's concern (§1: the target is a
/// WebAssembly module instance).
#[cfg(not(target_arch = "wasm32"))]
fn default_provider() -> Provider {
	Provider::new(256 * 1024 * 1024, zee_alloc::DEFAULT_PAGE_SIZE)
}

/// The single process-wide allocator this shim's symbols all bind to (§4.6).
/// Left empty until the first call, since `default_provider()` needs a heap
/// allocation on every target but `wasm32` and so isn't `const`.
static ALLOCATOR: spin::Mutex<Option<zee_alloc::Allocator<Provider>>> = spin::Mutex::new(None);

mod lazy {
	use super::*;

	pub(super) fn with<R>(f: impl FnOnce(&mut zee_alloc::Allocator<Provider>) -> R) -> R {
		let mut guard = super::ALLOCATOR.lock();
		let alloc = guard.get_or_insert_with(|| zee_alloc::Allocator::new(default_provider(), Config::new()));
		f(alloc)
	}
}

/// `NULL` is a valid `free`/`realloc` argument in C (a no-op, and
/// equivalent to `malloc` respectively); everything else is handed to the
/// core as-is for it to recover a frame from (§4.1, §4.6).
fn nonnull_or_null(ptr: *mut c_void) -> Option<NonNull<u8>> {
	NonNull::new(ptr as *mut u8)
}

#[cfg(feature = "malloc")]
#[no_mangle]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
	lazy::with(|alloc| alloc.allocate(size, 1))
		.map(|p| p.as_ptr() as *mut c_void)
		.unwrap_or(core::ptr::null_mut())
}

#[cfg(feature = "free")]
#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
	let Some(ptr) = nonnull_or_null(ptr) else {
		return;
	};
	// `deallocate` itself aborts the process on corrupt/foreign metadata
	// under `Validation::Dev`/`External` (§4.6, §7); nothing to handle here.
	lazy::with(|alloc| alloc.deallocate(ptr));
}

#[cfg(feature = "realloc")]
#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
	let Some(ptr) = nonnull_or_null(ptr) else {
		return lazy::with(|alloc| alloc.allocate(size, 1))
			.map(|p| p.as_ptr() as *mut c_void)
			.unwrap_or(core::ptr::null_mut());
	};
	lazy::with(|alloc| alloc.resize(ptr, size, 1))
		.map(|p| p.as_ptr() as *mut c_void)
		.unwrap_or(core::ptr::null_mut())
}

#[cfg(feature = "calloc")]
#[no_mangle]
pub unsafe extern "C" fn calloc(count: usize, size: usize) -> *mut c_void {
	let Some(total) = count.checked_mul(size) else {
		return core::ptr::null_mut();
	};
	let ptr = lazy::with(|alloc| alloc.allocate(total, 1));
	match ptr {
		Ok(p) => {
			p.as_ptr().write_bytes(0, total);
			p.as_ptr() as *mut c_void
		}
		Err(_) => core::ptr::null_mut(),
	}
}
