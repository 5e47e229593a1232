//! # 形状/纹理布局计算模块
//!
//! 纯函数：由输入形状和池化参数推导输出形状，以及三阶张量在二维纹理中的存放布局。
//! 所有结果只依赖形状本身，因此在分配任何GPU资源之前即可算出，用于预先确定缓冲区大小。

mod config;
mod layout;


pub use config::PoolConfig;
pub use layout::{compute_tex_shape_from_3d, TexLayout, TexShape};

use crate::errors::{ComparisonOperator, PoolError};
use crate::tensor::Shape3;

/// 计算池化（或卷积）输出的三阶形状：
/// `out = floor((in + 2*zero_pad - field_size) / stride) + 1`，深度取`out_depth`（池化时即输入深度）。
///
/// 当窗口或步长为0，或补零后的输入仍小于窗口（即窗口一次都放不下）时返回`InvalidConfig`。
pub fn compute_output_shape_3d(
    input_shape: Shape3,
    field_size: usize,
    out_depth: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<Shape3, PoolError> {
    if field_size == 0 {
        return Err(PoolError::invalid_config(
            "窗口大小（field_size）",
            ComparisonOperator::GreaterOrEqual,
            1,
            0,
        ));
    }
    if stride == 0 {
        return Err(PoolError::invalid_config(
            "步长（stride）",
            ComparisonOperator::GreaterOrEqual,
            1,
            0,
        ));
    }
    let out_rows = compute_output_dim("输出行数", input_shape[0], field_size, stride, zero_pad)?;
    let out_cols = compute_output_dim("输出列数", input_shape[1], field_size, stride, zero_pad)?;
    Ok([out_rows, out_cols, out_depth])
}

fn saturating_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `input_dim + 2 * zero_pad`；超出i64范围时返回`InvalidConfig`
fn padded_dim(input_dim: usize, zero_pad: usize) -> Result<i64, PoolError> {
    zero_pad
        .checked_mul(2)
        .and_then(|pad| pad.checked_add(input_dim))
        .and_then(|padded| i64::try_from(padded).ok())
        .ok_or_else(|| {
            PoolError::invalid_config(
                "补零数（zero_pad）",
                ComparisonOperator::LessOrEqual,
                (i64::MAX - saturating_i64(input_dim)) / 2,
                saturating_i64(zero_pad),
            )
        })
}

fn compute_output_dim(
    value_name: &str,
    input_dim: usize,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<usize, PoolError> {
    let span = padded_dim(input_dim, zero_pad)? - saturating_i64(field_size);
    if span < 0 {
        // 窗口比补零后的输入还大，整除前就已经放不下
        return Err(PoolError::invalid_config(
            value_name,
            ComparisonOperator::GreaterOrEqual,
            1,
            span.div_euclid(saturating_i64(stride)) + 1,
        ));
    }
    Ok(span as usize / stride + 1)
}

/// 在未指定补零数时使用的默认补零：`floor((rows*(stride-1) - stride + field_size) / 2)`，不小于0。
/// 步长为1时即为让输出与输入同尺寸的补零（`(field_size-1)/2`）。
pub fn compute_default_pad(input_shape: Shape3, field_size: usize, stride: usize) -> usize {
    let rows = saturating_i64(input_shape[0]);
    let stride = saturating_i64(stride);
    let pad = rows
        .saturating_mul(stride - 1)
        .saturating_sub(stride)
        .saturating_add(saturating_i64(field_size))
        .div_euclid(2);
    pad.max(0) as usize
}
