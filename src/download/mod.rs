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

//! Download management
//!
//! Queues movie and episode transfers, persists them through a
//! [`DownloadStore`], and runs them on a bounded pool of resumable
//! [`DownloadWorker`]s.

pub mod manager;
pub mod models;
pub mod progress;
pub mod store;
pub mod worker;

pub use manager::DownloadManager;
pub use models::{ContentType, DownloadItem, DownloadRequest, DownloadStatus};
pub use progress::DownloadProgress;
pub use store::{DownloadStore, MemoryDownloadStore};
pub use worker::{DownloadWorker, ProgressSink, TransferOutcome};
