use crate::tensor::ops::eq::close_enough;

/// 逐元素比较两个数组，长度不同或任一元素差值超过`epsilon`即panic（同为NaN、同号无穷视为相等）
pub fn expect_arrays_close(actual: &[f32], expected: &[f32], epsilon: f32) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "数组长度不一致：实际为{}，期望为{}",
        actual.len(),
        expected.len()
    );
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            close_enough(a, e, epsilon),
            "第{i}个元素不一致：实际为{a}，期望为{e}（容差{epsilon}）"
        );
    }
}
