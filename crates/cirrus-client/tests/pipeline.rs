//! End-to-end pipeline coverage: normalize -> plan -> encode -> transport
//! -> unpack, against a mock service that serves deterministic values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use cirrus_client::{
    BatchOutcome, BatchRequest, ClientConfig, ClientResult, DatasetInfo, MultiManager,
    RequestExecutor, RequestKind, Transport, WireRequest, WireResponse, WireSelection,
};
use cirrus_client::decode_selection;
use cirrus_select::{expand, normalize, IndexArg, Shape};
use cirrus_types::{pack_buffer, unpack_buffer, Dtype, Value};

/// Serves 2-D i32 datasets where element (r, c) == r * ncols + c, and
/// records every request it sees.
struct GridTransport {
    shapes: HashMap<String, Shape>,
    log: Mutex<Vec<(RequestKind, WireSelection, Option<Bytes>)>>,
}

#[async_trait]
impl Transport for GridTransport {
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse> {
        self.log.lock().unwrap().push((
            request.kind,
            request.selection.clone(),
            request.payload.clone(),
        ));
        match request.kind {
            RequestKind::Write => Ok(WireResponse { body: Bytes::new() }),
            RequestKind::Read => {
                let shape = &self.shapes[&request.target];
                let ncols = shape.dims()[1];
                let selection = decode_selection(&request.selection, shape).unwrap();
                let values: Vec<Value> = selection
                    .iter_coords()
                    .map(|c| Value::Int((c[0] * ncols + c[1]) as i64))
                    .collect();
                Ok(WireResponse {
                    body: pack_buffer(&Dtype::int(4), &values).unwrap(),
                })
            }
        }
    }
}

fn grid_manager(ncols: u64) -> (MultiManager, Arc<GridTransport>) {
    let mut shapes = HashMap::new();
    shapes.insert("grid".to_string(), Shape::new(vec![6, ncols]));
    let transport = Arc::new(GridTransport {
        shapes,
        log: Mutex::new(Vec::new()),
    });
    let config = ClientConfig::default().with_max_workers(2);
    let executor = RequestExecutor::with_transport(config, transport.clone()).unwrap();
    let mut manager = MultiManager::new(executor);
    manager.register(
        "grid",
        DatasetInfo {
            shape: Shape::new(vec![6, ncols]),
            chunk_shape: Some(vec![4, 4]),
            dtype: Dtype::int(4),
        },
    );
    (manager, transport)
}

#[tokio::test]
async fn chunked_strided_read_returns_selection_order() {
    let (manager, transport) = grid_manager(8);
    let shape = Shape::new(vec![6, 8]);

    // Rows 1 and 3, columns 0, 7, 3 in caller order.
    let selection = normalize(
        &[
            IndexArg::Slice {
                start: Some(1),
                stop: Some(5),
                step: Some(2),
            },
            IndexArg::Points(vec![0, 7, 3]),
        ],
        &shape,
    )
    .unwrap();
    let expected: Vec<Value> = selection
        .iter_coords()
        .map(|c| Value::Int((c[0] * 8 + c[1]) as i64))
        .collect();

    let results = manager
        .run_batch(vec![BatchRequest::read("grid", selection)])
        .await;
    assert_eq!(results[0].as_ref().unwrap(), &BatchOutcome::Read(expected));

    // Columns {0,3} and {7} live in different column chunks.
    let log = transport.log.lock().unwrap();
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn broadcast_write_round_trips_through_chunks() {
    let (manager, transport) = grid_manager(8);
    let shape = Shape::new(vec![6, 8]);

    // Destination rows 1,3 and columns 0,2,4; source is one row of 3.
    let selection = normalize(
        &[
            IndexArg::Slice {
                start: Some(1),
                stop: Some(5),
                step: Some(2),
            },
            IndexArg::Slice {
                start: Some(0),
                stop: Some(6),
                step: Some(2),
            },
        ],
        &shape,
    )
    .unwrap();
    let source = [Value::Int(10), Value::Int(20), Value::Int(30)];
    let values: Vec<Value> = expand(&[1, 3], &selection)
        .unwrap()
        .map(|pair| source[pair.source_index as usize].clone())
        .collect();
    assert_eq!(values.len(), 6);

    let results = manager
        .run_batch(vec![BatchRequest::write("grid", selection, values)])
        .await;
    assert_eq!(results[0].as_ref().unwrap(), &BatchOutcome::Written);

    // Every chunk payload decodes, and together they carry 6 elements
    // drawn only from the source row.
    let log = transport.log.lock().unwrap();
    let mut written = 0usize;
    for (kind, _, payload) in log.iter() {
        assert_eq!(*kind, RequestKind::Write);
        let payload = payload.as_ref().unwrap();
        let count = payload.len() / 4;
        let decoded = unpack_buffer(&Dtype::int(4), payload, count).unwrap();
        for v in &decoded {
            assert!(source.contains(v), "unexpected value {v:?}");
        }
        written += count;
    }
    assert_eq!(written, 6);
}

#[tokio::test]
async fn field_projection_rides_every_sub_request() {
    let (manager, transport) = grid_manager(8);
    let shape = Shape::new(vec![6, 8]);

    let selection = normalize(&[IndexArg::Ellipsis], &shape)
        .unwrap()
        .with_fields(vec!["a".to_string()]);
    let results = manager
        .run_batch(vec![BatchRequest::read("grid", selection)])
        .await;
    assert!(results[0].is_ok());

    // (6,8) over (4,4) chunks touches 4 chunks, and the projection rides
    // on every sub-request.
    let log = transport.log.lock().unwrap();
    assert_eq!(log.len(), 4);
    for (_, selection, _) in log.iter() {
        assert_eq!(selection.fields.as_deref(), Some("a"));
    }
}
