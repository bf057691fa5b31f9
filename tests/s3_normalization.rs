//! S3: a fusion with two reduction stages over the same axis — sum and
//! sum-of-squares — schedules as Normalization and produces both results
//! in one launch.

mod common;

use approx::assert_relative_eq;
use fusorch::config::Config;
use fusorch::device::{LaunchParams, TensorRuntime};
use fusorch::executor::Executor;
use fusorch::mock::{runtime, MockDevice, MockRuntime};
use fusorch::types::DataType;
use std::sync::Arc;

#[test]
fn normalization_fusion_computes_sum_and_sum_of_squares() {
    let fusion = common::normalization_fusion();
    let device = Arc::new(MockDevice::new());
    let mut executor = Executor::new(device.clone(), device.clone(), MockRuntime, device.clone(), 0);
    executor.compile_fusion(&fusion, &Config::default()).unwrap();

    let rt = MockRuntime;
    let a = rt.allocate(&[4], DataType::Float32, 0, false).unwrap();
    runtime::write(a.data_ptr(), &[1.0, 2.0, 3.0, 4.0]);

    let outputs = executor.run_fusion(&[a], None, &LaunchParams::default(), 0).unwrap();
    assert_eq!(outputs.len(), 2);
    let sum = outputs[0].to_vec()[0];
    let sumsq = outputs[1].to_vec()[0];
    assert_relative_eq!(sum, 10.0, epsilon = 1e-6);
    assert_relative_eq!(sumsq, 30.0, epsilon = 1e-6);
}
