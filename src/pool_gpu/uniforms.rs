use bytemuck::{Pod, Zeroable};

use super::{ReduceOp, Reduction};
use crate::conv_util::{compute_tex_shape_from_3d, PoolConfig, TexShape};
use crate::errors::{ComparisonOperator, PoolError};
use crate::tensor::Shape3;

/// 池化内核的uniform参数块，与着色器中的`PoolParams`逐字段对应（48字节，16字节对齐）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PoolUniforms {
    pub x_rows: u32,
    pub x_cols: u32,
    pub depth: u32,
    pub field_size: u32,
    pub stride: u32,
    pub zero_pad: u32,
    pub out_rows: u32,
    pub out_cols: u32,
    /// 归约单位元的位模式（WGSL中没有无穷大字面量，故由uniform传入）
    pub identity_bits: u32,
    pub _pad: [u32; 3],
}

fn to_u32(value_name: &str, value: usize) -> Result<u32, PoolError> {
    u32::try_from(value).map_err(|_| {
        PoolError::invalid_config(
            value_name,
            ComparisonOperator::LessOrEqual,
            u32::MAX as i64,
            value as i64,
        )
    })
}

impl PoolUniforms {
    pub fn new(
        input_shape: Shape3,
        config: PoolConfig,
        output_shape: Shape3,
        reduction: &Reduction,
    ) -> Result<Self, PoolError> {
        // 纹理列数是`cols * depth`，着色器里按u32计算，先保证它不溢出
        to_u32("输入纹理列数", input_shape[1] * input_shape[2])?;
        to_u32("输出纹理列数", output_shape[1] * output_shape[2])?;
        Ok(PoolUniforms {
            x_rows: to_u32("输入行数", input_shape[0])?,
            x_cols: to_u32("输入列数", input_shape[1])?,
            depth: to_u32("深度", input_shape[2])?,
            field_size: to_u32("窗口大小", config.field_size)?,
            stride: to_u32("步长", config.stride)?,
            zero_pad: to_u32("补零数", config.zero_pad)?,
            out_rows: to_u32("输出行数", output_shape[0])?,
            out_cols: to_u32("输出列数", output_shape[1])?,
            identity_bits: reduction.identity().to_bits(),
            _pad: [0; 3],
        })
    }

    pub fn input_shape(&self) -> Shape3 {
        [self.x_rows as usize, self.x_cols as usize, self.depth as usize]
    }

    pub fn output_shape(&self) -> Shape3 {
        [
            self.out_rows as usize,
            self.out_cols as usize,
            self.depth as usize,
        ]
    }

    pub fn x_tex_shape(&self) -> TexShape {
        compute_tex_shape_from_3d(self.input_shape())
    }

    pub fn result_tex_shape(&self) -> TexShape {
        compute_tex_shape_from_3d(self.output_shape())
    }

    pub fn identity(&self) -> f32 {
        f32::from_bits(self.identity_bits)
    }
}
