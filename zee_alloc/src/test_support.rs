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

//! Shared helpers for this crate's own host test suite (§13). Not part of
//! the public API.

/// Initializes `env_logger` once per test process, so `RUST_LOG=trace`
/// shows the `logging`-feature trace points from failing tests without
/// every test having to remember to call this itself.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}
