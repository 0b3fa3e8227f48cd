//! Batch dispatch
//!
//! `MultiManager` fans a batch of read/write requests out to the
//! executor under a bounded worker pool. Results land positionally:
//! `results[i]` always answers `requests[i]`, whatever order the network
//! operations complete in. One item's failure never aborts its siblings;
//! a chunk-split item fails whole rather than returning a torn buffer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use cirrus_select::{ChunkIter, ChunkPlan, CoordMode, Selection, Shape};
use cirrus_select::{AxisSelector, SelectError};
use cirrus_types::{encode_descriptor, pack_buffer, unpack_buffer, Dtype, Value};

use crate::error::{ClientError, ClientResult, RemoteStatus};
use crate::executor::{RequestExecutor, RequestKind, WireRequest};
use crate::wire::encode_selection;

/// Metadata for a registered dataset
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Current dataset shape
    pub shape: Shape,
    /// Chunk shape, absent for contiguous datasets
    pub chunk_shape: Option<Vec<u64>>,
    /// Element type
    pub dtype: Dtype,
}

/// One read or write submitted to a batch
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Registered dataset identifier
    pub target: String,
    /// What to read or where to write
    pub selection: Selection,
    /// Element values for writes, `None` for reads
    ///
    /// The caller pre-broadcasts the source; the value count must equal
    /// the selection's element count.
    pub write: Option<Vec<Value>>,
    /// Token that makes a write safe to retry after ambiguous failures
    pub idempotency_token: Option<String>,
}

impl BatchRequest {
    /// Build a read request
    pub fn read(target: impl Into<String>, selection: Selection) -> Self {
        Self {
            target: target.into(),
            selection,
            write: None,
            idempotency_token: None,
        }
    }

    /// Build a write request
    pub fn write(target: impl Into<String>, selection: Selection, values: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            selection,
            write: Some(values),
            idempotency_token: None,
        }
    }

    /// Attach an idempotency token
    pub fn with_idempotency_token(mut self, token: impl Into<String>) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }
}

/// Successful outcome of one batch item
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Elements read, in the selection's row-major order
    Read(Vec<Value>),
    /// Write acknowledged
    Written,
}

/// Per-item result, positionally aligned with the input batch
pub type BatchResult = ClientResult<BatchOutcome>;

/// Cooperative batch cancellation
///
/// Cancelling stops new items from being dispatched; items already at
/// the network are left to finish or time out on their own.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create an un-cancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Dispatches batches of requests against registered datasets
pub struct MultiManager {
    executor: Arc<RequestExecutor>,
    targets: HashMap<String, DatasetInfo>,
}

impl MultiManager {
    /// Create a manager over an executor
    pub fn new(executor: RequestExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            targets: HashMap::new(),
        }
    }

    /// Register a dataset the manager may address
    pub fn register(&mut self, target: impl Into<String>, info: DatasetInfo) {
        self.targets.insert(target.into(), info);
    }

    /// Run a batch, returning one result per request in input order
    pub async fn run_batch(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        self.run_batch_with_cancel(requests, &CancelHandle::new())
            .await
    }

    /// Run a batch under a cancellation handle
    pub async fn run_batch_with_cancel(
        &self,
        requests: Vec<BatchRequest>,
        cancel: &CancelHandle,
    ) -> Vec<BatchResult> {
        let workers = self.executor.config().max_workers;
        let semaphore = Arc::new(Semaphore::new(workers));
        debug!(items = requests.len(), workers, "dispatching batch");

        let mut handles = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let info = self.targets.get(&request.target).cloned();
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ClientError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                let info = info.ok_or_else(|| ClientError::RemoteRejected {
                    status: RemoteStatus::NotFound,
                    message: format!("target not registered: {}", request.target),
                })?;
                let outcome = run_item(&executor, &info, &request, &cancel).await;
                if let Err(err) = &outcome {
                    warn!(index, target = %request.target, error = %err, "batch item failed");
                }
                outcome
            }));
        }

        // Joining the handles in spawn order keeps results positional
        // regardless of completion order.
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(ClientError::Transient(format!("worker panicked: {e}"))),
            })
            .collect()
    }

    /// Run a batch, failing the whole call on the first item error
    ///
    /// All items still run to completion; the error reported is the
    /// earliest failed position.
    pub async fn run_batch_fail_fast(
        &self,
        requests: Vec<BatchRequest>,
    ) -> ClientResult<Vec<BatchOutcome>> {
        let results = self.run_batch(requests).await;
        results.into_iter().collect()
    }
}

async fn run_item(
    executor: &RequestExecutor,
    info: &DatasetInfo,
    request: &BatchRequest,
    cancel: &CancelHandle,
) -> BatchResult {
    let descriptor = encode_descriptor(&info.dtype)?;
    let count = request.selection.num_elements() as usize;

    if let Some(values) = &request.write {
        if values.len() != count {
            return Err(SelectError::ShapeMismatch {
                src: vec![values.len() as u64],
                dest: request.selection.selected_shape(),
            }
            .into());
        }
    }

    // Splitting a variable-length read across chunks would interleave
    // heap regions from separate responses; send those whole.
    let split = info.chunk_shape.is_some() && !info.dtype.is_variable();
    if !split {
        return run_unsplit(executor, info, request, &descriptor).await;
    }
    let chunk_shape = info.chunk_shape.as_deref();
    let plans: Vec<ChunkPlan> = ChunkIter::new(&info.shape, chunk_shape, &request.selection)?
        .collect::<Result<_, _>>()?;
    if plans.len() <= 1 {
        return run_unsplit(executor, info, request, &descriptor).await;
    }

    match &request.write {
        None => {
            let mut out: Vec<Option<Value>> = vec![None; count];
            for plan in &plans {
                if cancel.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                let sub = globalize(plan, info, request)?;
                let wire = WireRequest {
                    target: request.target.clone(),
                    kind: RequestKind::Read,
                    selection: encode_selection(&sub),
                    descriptor: descriptor.clone(),
                    payload: None,
                    idempotency_token: None,
                };
                let response = executor.execute(&wire).await?;
                let sub_count = plan.local.num_elements() as usize;
                let values = unpack_buffer(&info.dtype, &response.body, sub_count)?;
                scatter(&request.selection, plan, values, &mut out)?;
            }
            let values = out
                .into_iter()
                .collect::<Option<Vec<Value>>>()
                .ok_or_else(|| {
                    ClientError::Transient("chunk responses did not cover selection".to_string())
                })?;
            Ok(BatchOutcome::Read(values))
        }
        Some(values) => {
            for plan in &plans {
                if cancel.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                let sub = globalize(plan, info, request)?;
                let chunk_values = gather(&request.selection, plan, values)?;
                let payload = pack_buffer(&info.dtype, &chunk_values)?;
                let token = request.idempotency_token.as_ref().map(|t| {
                    let coord: Vec<String> =
                        plan.chunk_coord.iter().map(u64::to_string).collect();
                    format!("{t}.{}", coord.join("."))
                });
                let wire = WireRequest {
                    target: request.target.clone(),
                    kind: RequestKind::Write,
                    selection: encode_selection(&sub),
                    descriptor: descriptor.clone(),
                    payload: Some(payload),
                    idempotency_token: token,
                };
                executor.execute(&wire).await?;
            }
            Ok(BatchOutcome::Written)
        }
    }
}

async fn run_unsplit(
    executor: &RequestExecutor,
    info: &DatasetInfo,
    request: &BatchRequest,
    descriptor: &cirrus_types::TypeDescriptor,
) -> BatchResult {
    let count = request.selection.num_elements() as usize;
    match &request.write {
        None => {
            let wire = WireRequest {
                target: request.target.clone(),
                kind: RequestKind::Read,
                selection: encode_selection(&request.selection),
                descriptor: descriptor.clone(),
                payload: None,
                idempotency_token: None,
            };
            let response = executor.execute(&wire).await?;
            let values = unpack_buffer(&info.dtype, &response.body, count)?;
            Ok(BatchOutcome::Read(values))
        }
        Some(values) => {
            let payload = pack_buffer(&info.dtype, values)?;
            let wire = WireRequest {
                target: request.target.clone(),
                kind: RequestKind::Write,
                selection: encode_selection(&request.selection),
                descriptor: descriptor.clone(),
                payload: Some(payload),
                idempotency_token: request.idempotency_token.clone(),
            };
            executor.execute(&wire).await?;
            Ok(BatchOutcome::Written)
        }
    }
}

/// Re-express a chunk-local sub-selection in dataset coordinates
fn globalize(
    plan: &ChunkPlan,
    info: &DatasetInfo,
    request: &BatchRequest,
) -> ClientResult<Selection> {
    let selection = match plan.local.coord_mode() {
        CoordMode::Zipped => {
            let coords: Vec<Vec<u64>> = plan
                .local
                .iter_coords()
                .map(|c| plan.to_global(&c))
                .collect();
            Selection::zipped_points(&coords, &info.shape)?
        }
        CoordMode::Cartesian => {
            let selectors: Vec<AxisSelector> = plan
                .local
                .selectors()
                .iter()
                .zip(&plan.chunk_offset)
                .zip(plan.local.shape())
                .map(|((sel, off), local_extent)| match sel {
                    AxisSelector::All => AxisSelector::Range {
                        start: *off,
                        stop: off + local_extent,
                        step: 1,
                    },
                    AxisSelector::Range { start, stop, step } => AxisSelector::Range {
                        start: start + off,
                        stop: stop + off,
                        step: *step,
                    },
                    AxisSelector::MultiBlock {
                        start,
                        count,
                        stride,
                        block,
                    } => AxisSelector::MultiBlock {
                        start: start + off,
                        count: *count,
                        stride: *stride,
                        block: *block,
                    },
                    AxisSelector::Points(points) => {
                        AxisSelector::Points(points.iter().map(|p| p + off).collect())
                    }
                })
                .collect();
            Selection::new(selectors, &info.shape)?
        }
    };
    Ok(selection.with_fields(request.selection.fields().to_vec()))
}

/// Place one chunk's unpacked values into their batch-level positions
fn scatter(
    selection: &Selection,
    plan: &ChunkPlan,
    values: Vec<Value>,
    out: &mut [Option<Value>],
) -> ClientResult<()> {
    for (value, local) in values.into_iter().zip(plan.local.iter_coords()) {
        let global = plan.to_global(&local);
        let ordinal = selection.ordinal(&global).ok_or_else(|| {
            ClientError::Transient(format!("chunk returned unselected coordinate {global:?}"))
        })?;
        out[ordinal as usize] = Some(value);
    }
    Ok(())
}

/// Collect the source values for one chunk's sub-selection, in the
/// sub-selection's row-major order
fn gather(
    selection: &Selection,
    plan: &ChunkPlan,
    values: &[Value],
) -> ClientResult<Vec<Value>> {
    plan.local
        .iter_coords()
        .map(|local| {
            let global = plan.to_global(&local);
            let ordinal = selection.ordinal(&global).ok_or_else(|| {
                ClientError::Transient(format!("chunk plan outside selection: {global:?}"))
            })?;
            Ok(values[ordinal as usize].clone())
        })
        .collect()
}
