use crate::errors::PoolError;
use crate::utils::test_util::expect_arrays_close;
use crate::{assert_err, assert_panic};

#[test]
fn test_assert_panic_macro() {
    assert_panic!(panic!("test panic"));
    assert_panic!(panic!("custom test panic msg"), "custom test panic msg");
}

#[test]
fn test_assert_err_macro() {
    let result: Result<(), PoolError> = Err(PoolError::shape_mismatch(&[2, 2], &[3, 2], "消息"));
    assert_err!(result);
    assert_err!(result, PoolError::ShapeMismatch([2, 2], [3, 2], "消息"));
    assert_err!(result, PoolError::ShapeMismatch { expected, .. } if expected == &[2, 2]);

    let result: Result<(), PoolError> = Err(PoolError::Device("上下文已被释放（dispose）".into()));
    assert_err!(result, PoolError::Device(msg) if msg.contains("dispose"));
}

#[test]
fn test_expect_arrays_close() {
    expect_arrays_close(&[1.0, f32::INFINITY, f32::NAN], &[1.000001, f32::INFINITY, f32::NAN], 1e-5);
    assert_panic!(expect_arrays_close(&[1.0], &[1.1], 1e-5));
    assert_panic!(expect_arrays_close(&[1.0, 2.0], &[1.0], 1e-5));
    assert_panic!(expect_arrays_close(&[f32::INFINITY], &[f32::NEG_INFINITY], 1e-5));
}
