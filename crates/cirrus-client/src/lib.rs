//! cirrus-client: network execution for the cirrus remote array service
//!
//! Turns canonical selections into wire requests, executes them with
//! retry and timeout handling, and fans out batches of requests under a
//! bounded worker pool. The pure computation layers live in
//! `cirrus-select` and `cirrus-types`; everything that can suspend on
//! I/O lives here.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod multi;
pub mod wire;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, RemoteStatus};
pub use executor::{HttpTransport, RequestExecutor, RequestKind, Transport, WireRequest, WireResponse};
pub use multi::{BatchOutcome, BatchRequest, BatchResult, CancelHandle, DatasetInfo, MultiManager};
pub use wire::{decode_selection, encode_selection, WireSelection, MAX_SELECT_QUERY_LEN};
