use approx::AbsDiffEq;
use std::cmp::PartialEq;

use crate::tensor::Tensor;

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<'a> PartialEq<&'a Tensor> for Tensor {
    fn eq(&self, other: &&'a Tensor) -> bool {
        self.data == other.data
    }
}

/// 两个数在容差`epsilon`内是否相等。
/// 同为NaN、或同号无穷视为相等（GPU与CPU在这两种情况下都应给出相同的特殊值）。
pub(crate) fn close_enough(a: f32, b: f32, epsilon: f32) -> bool {
    if a == b || (a.is_nan() && b.is_nan()) {
        return true;
    }
    (a - b).abs() <= epsilon
}

impl Tensor {
    /// 形状严格一致，且逐元素在绝对容差`epsilon`内相等
    pub fn all_close(&self, other: &Tensor, epsilon: f32) -> bool {
        self.is_same_shape(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(&a, &b)| close_enough(a, b, epsilon))
    }
}

impl AbsDiffEq for Tensor {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        1e-5
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.all_close(other, epsilon)
    }
}
