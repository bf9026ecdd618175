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

//! Runtime policy knobs (§4.4, §12). The page size itself is a const
//! generic on [`crate::Allocator`] rather than a field here, since it picks
//! the shape of the free-list array and is always known at compile time for
//! a given target.

/// What happens on `deallocate` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeStrategy {
	/// Always prepend the freed frame to its bucket's free list. O(1), but
	/// never reunifies adjacent buddies.
	Fast,
	/// Attempt to coalesce with the buddy chain before reinserting
	/// (§4.4). The default: it keeps long-term fragmentation down at the
	/// cost of a bounded amount of extra work per free.
	#[default]
	Compact,
}

/// How the jumbo bucket (index 0) is searched for a fit (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumboMatchStrategy {
	/// Only a frame whose size exactly equals the request is acceptable.
	Exact,
	/// Take the smallest frame that is large enough, scanning the whole
	/// bucket; an exact match short-circuits the scan. The default: avoids
	/// handing out an oversized jumbo frame when a closer one exists.
	#[default]
	Closest,
	/// Take the first frame encountered that is large enough. Cheaper than
	/// `Closest` at the cost of worse jumbo-bucket fragmentation.
	First,
}

/// Scope of runtime metadata checks (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
	/// Assert internal invariants (split-down bounds, free-list
	/// non-duplication, buddy size match) in addition to the boundary
	/// checks below. Intended for development builds.
	#[default]
	Dev,
	/// Check metadata recovered from user pointers only at the
	/// `deallocate`/`resize` boundary; abort on violation. No internal
	/// invariant assertions.
	External,
	/// No validation at all. A corrupt or foreign pointer is undefined
	/// behaviour.
	Unsafe,
}

/// Construction-time policy for an [`crate::Allocator`] (§4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
	pub free_strategy: FreeStrategy,
	pub jumbo_match_strategy: JumboMatchStrategy,
	pub validation: Validation,
}

impl Config {
	/// `Compact`/`Closest`/`Dev`, suitable as a `static`'s initializer
	/// (`derive(Default)`'s `default()` isn't `const`).
	pub const fn new() -> Self {
		Self {
			free_strategy: FreeStrategy::Compact,
			jumbo_match_strategy: JumboMatchStrategy::Closest,
			validation: Validation::Dev,
		}
	}
}
