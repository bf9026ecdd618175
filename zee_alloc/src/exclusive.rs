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

//! Interior mutability for [`crate::global::ZeeAlloc`].
//!
//! [`core::alloc::GlobalAlloc`] is implemented on `&self`, but
//! [`crate::Allocator`]'s own methods all take `&mut self` (§5: the core is
//! deliberately not synchronized). On `wasm32` a module instance is
//! single-threaded by construction, so a bare `UnsafeCell` is sufficient and
//! free; everywhere else (including this crate's own host test suite) a spin
//! lock stands in for whatever real mutex the embedder would use.

#[cfg(target_arch = "wasm32")]
mod imp {
	use core::cell::UnsafeCell;

	pub(crate) struct Exclusive<T> {
		inner: UnsafeCell<T>,
	}

	unsafe impl<T> Sync for Exclusive<T> {}

	impl<T> Exclusive<T> {
		pub(crate) const fn new(value: T) -> Self {
			Self {
				inner: UnsafeCell::new(value),
			}
		}

		/// # Safety
		///
		/// The caller must not call this reentrantly: wasm32 has no threads,
		/// but a signal handler or a nested allocation from within `f` could
		/// still alias the `&mut T`.
		#[inline]
		pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
			f(unsafe { &mut *self.inner.get() })
		}
	}
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
	use spin::Mutex;

	pub(crate) struct Exclusive<T> {
		inner: Mutex<T>,
	}

	impl<T> Exclusive<T> {
		pub(crate) const fn new(value: T) -> Self {
			Self {
				inner: Mutex::new(value),
			}
		}

		#[inline]
		pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
			f(&mut self.inner.lock())
		}
	}
}

pub(crate) use imp::Exclusive;
