use serde::{Deserialize, Serialize};

use super::{compute_default_pad, compute_output_shape_3d};
use crate::errors::PoolError;
use crate::tensor::Shape3;

/// 池化参数：正方形窗口边长、步长、四周补零的行/列数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolConfig {
    pub field_size: usize,
    pub stride: usize,
    #[serde(default)]
    pub zero_pad: usize,
}

impl PoolConfig {
    pub fn new(field_size: usize, stride: usize, zero_pad: usize) -> Self {
        PoolConfig {
            field_size,
            stride,
            zero_pad,
        }
    }

    /// 补零数按`compute_default_pad`由输入形状推出
    pub fn with_default_pad(input_shape: Shape3, field_size: usize, stride: usize) -> Self {
        PoolConfig::new(
            field_size,
            stride,
            compute_default_pad(input_shape, field_size, stride),
        )
    }

    /// 校验参数对`input_shape`是否有效，有效则返回池化输出形状（深度不变）
    pub fn output_shape(&self, input_shape: Shape3) -> Result<Shape3, PoolError> {
        compute_output_shape_3d(
            input_shape,
            self.field_size,
            input_shape[2],
            self.stride,
            self.zero_pad,
        )
    }
}
