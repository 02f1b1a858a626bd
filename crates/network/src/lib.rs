//! Asset acquisition for Narrivo
//!
//! The [`DownloadCoordinator`] tracks download jobs and feeds their outcome
//! into the book registry; [`HttpTransfer`] is the reqwest-backed transfer
//! backend.

mod client;
mod coordinator;
mod error;
mod job;
mod progress;
mod transfer;

pub use client::{Client, ClientConfig};
pub use coordinator::{safe_title, DownloadCoordinator, StartOutcome};
pub use error::{NetworkError, NetworkResult};
pub use job::{DownloadJob, DownloadStatus, JobId};
pub use progress::DownloadProgress;
pub use transfer::{
    partial_path, HttpTransfer, TransferBackend, TransferEvent, TransferHandle, TransferRequest,
    TransferSender,
};
