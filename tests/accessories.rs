//! Accessory lifecycle notifications.

use request_batch::accessory::{
    Accessory, AccessoryEvent, AccessoryTarget, FnAccessory, LoggingAccessory, RecordingAccessory,
    TargetKind,
};
use request_batch::batch::{BatchConfig, BatchRegistry, BatchRequest};
use request_batch::request::{ManualRequest, Request, RequestError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn config() -> BatchConfig {
    BatchConfig::new().with_registry(Arc::new(BatchRegistry::new()))
}

#[test]
fn test_will_start_precedes_did_stop_for_each_request() {
    let recorder = RecordingAccessory::new();
    let requests: Vec<Arc<ManualRequest>> = (0..3)
        .map(|i| Arc::new(ManualRequest::new(format!("r{}", i))))
        .collect();
    let members: Vec<Arc<dyn Request>> = requests
        .iter()
        .map(|r| r.clone() as Arc<dyn Request>)
        .collect();
    let batch = BatchRequest::with_config(members, config()).unwrap();
    batch.add_accessory(Arc::new(recorder.clone())).unwrap();
    batch.start().unwrap();

    requests[2].succeed("c");
    requests[0].fail(RequestError::transport("reset"));
    requests[1].succeed("b");

    let records = recorder.records();
    for r in &requests {
        let kind = TargetKind::Request(r.id());
        let start = records
            .iter()
            .position(|x| x.target == kind && x.event == AccessoryEvent::WillStart)
            .unwrap();
        let stop = records
            .iter()
            .position(|x| x.target == kind && x.event == AccessoryEvent::DidStop)
            .unwrap();
        assert!(start < stop);
    }
    assert_eq!(
        recorder.batch_events(),
        vec![AccessoryEvent::WillStart, AccessoryEvent::DidStop]
    );
}

#[test]
fn test_request_level_accessory_sees_only_its_request() {
    let own = RecordingAccessory::new();
    let r1 = Arc::new(ManualRequest::new("r1").with_accessory(Arc::new(own.clone())));
    let r2 = Arc::new(ManualRequest::new("r2"));
    let batch = BatchRequest::with_config(
        vec![r1.clone() as Arc<dyn Request>, r2.clone() as Arc<dyn Request>],
        config(),
    )
    .unwrap();
    batch.start().unwrap();
    r1.succeed("a");
    r2.succeed("b");

    assert_eq!(own.requests_with(AccessoryEvent::WillStart), vec![r1.id()]);
    assert_eq!(own.requests_with(AccessoryEvent::DidStop), vec![r1.id()]);
    assert!(own.batch_events().is_empty());
}

#[test]
fn test_did_stop_not_gated_by_batch_outcome() {
    let recorder = RecordingAccessory::new();
    let requests: Vec<Arc<ManualRequest>> = (0..3)
        .map(|i| Arc::new(ManualRequest::new(format!("r{}", i))))
        .collect();
    let members: Vec<Arc<dyn Request>> = requests
        .iter()
        .map(|r| r.clone() as Arc<dyn Request>)
        .collect();
    let batch = BatchRequest::with_config(members, config()).unwrap();
    batch.add_accessory(Arc::new(recorder.clone())).unwrap();
    batch.start().unwrap();

    requests[0].fail(RequestError::status(500, "E"));
    assert!(batch.is_finished());
    assert_eq!(recorder.requests_with(AccessoryEvent::DidStop).len(), 1);

    requests[1].succeed("late");
    requests[2].fail(RequestError::transport("late"));
    assert_eq!(recorder.requests_with(AccessoryEvent::DidStop).len(), 3);
}

#[test]
fn test_panicking_accessory_does_not_corrupt_batch() {
    struct Exploding;
    impl Accessory for Exploding {
        fn will_start(&self, _target: AccessoryTarget<'_>) {
            panic!("boom on start");
        }
        fn did_stop(&self, _target: AccessoryTarget<'_>) {
            panic!("boom on stop");
        }
    }

    let r1 = Arc::new(ManualRequest::new("r1"));
    let batch =
        BatchRequest::with_config(vec![r1.clone() as Arc<dyn Request>], config()).unwrap();
    batch.add_accessory(Arc::new(Exploding)).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    batch
        .start_with_callbacks(
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            },
            |_, _, _| {},
        )
        .unwrap();
    r1.succeed("a");

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(batch.is_finished());
}

#[test]
fn test_fn_and_logging_accessories() {
    let labels = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = labels.clone();
    let fn_accessory = FnAccessory::new(move |event, target| {
        seen.lock()
            .unwrap()
            .push(format!("{}:{}", event, target.label()));
    });

    let r1 = Arc::new(ManualRequest::new("upload"));
    let batch =
        BatchRequest::with_config(vec![r1.clone() as Arc<dyn Request>], config()).unwrap();
    batch.add_accessory(Arc::new(fn_accessory)).unwrap();
    batch.add_accessory(Arc::new(LoggingAccessory::default())).unwrap();
    batch.start().unwrap();
    r1.succeed("ok");

    assert_eq!(
        *labels.lock().unwrap(),
        vec![
            "will_start:batch",
            "will_start:upload",
            "did_stop:upload",
            "did_stop:batch"
        ]
    );
}
