// FarsiFlix - Persian Streaming Engine
// Copyright (C) 2025 FarsiFlix contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! SQLite persistence for download records
//!
//! # Usage Example
//! ```no_run
//! use farsiflix_core::download::DownloadStore;
//! use farsiflix_core::storage::{Database, SqliteDownloadStore};
//!
//! # async fn example() -> farsiflix_core::error::Result<()> {
//! let db = Database::new("./farsiflix.db").await?;
//! let store = SqliteDownloadStore::new(db);
//! for item in store.query_all().await? {
//!     println!("{} {}", item.id, item.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod download_store;
pub mod migrations;

pub use database::Database;
pub use download_store::SqliteDownloadStore;
