//! S4: a reduction whose result is immediately broadcast back and
//! consumed is declined by every registered heuristic, so compilation
//! fails fast instead of silently lowering something no scheduler chose.

mod common;

use fusorch::config::Config;
use fusorch::error::Error;
use fusorch::executor::Executor;
use fusorch::mock::MockDevice;
use std::sync::Arc;

#[test]
fn reduction_then_broadcast_is_rejected_by_every_heuristic() {
    let fusion = common::reduction_then_broadcast_fusion();
    let device = Arc::new(MockDevice::new());
    let mut executor = Executor::new(device.clone(), device.clone(), fusorch::mock::MockRuntime, device.clone(), 0);

    let err = executor.compile_fusion(&fusion, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Unschedulable), "expected Unschedulable, got {:?}", err);
}
