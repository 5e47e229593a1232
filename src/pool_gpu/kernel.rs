//! 池化内核的主机端实现，与`shader.rs`中的WGSL逐行对应，供`SoftwareContext`执行。

use super::{PoolUniforms, ReduceOp, Reduction};
use crate::conv_util::{TexLayout, TexShape};
use crate::errors::PoolError;

/// 校验绑定到内核的输入、输出纹理尺寸是否与uniform描述的形状一致
pub(crate) fn check_pool_bindings(
    params: &PoolUniforms,
    x_tex_shape: TexShape,
    result_tex_shape: TexShape,
) -> Result<(), PoolError> {
    if x_tex_shape != params.x_tex_shape() {
        return Err(PoolError::shape_mismatch(
            &params.x_tex_shape(),
            &x_tex_shape,
            "输入纹理尺寸与池化程序的输入形状不符",
        ));
    }
    if result_tex_shape != params.result_tex_shape() {
        return Err(PoolError::shape_mismatch(
            &params.result_tex_shape(),
            &result_tex_shape,
            "输出纹理尺寸与池化程序的输出形状不符",
        ));
    }
    Ok(())
}

/// 计算输出纹素`texel`的值；`texel`不在输出纹理内时返回None
pub(crate) fn eval_output_texel(
    params: &PoolUniforms,
    reduction: &Reduction,
    x_texels: &[f32],
    texel: TexShape,
) -> Option<f32> {
    let x_layout = TexLayout::new(params.input_shape());
    let [y_r, y_c, d] = TexLayout::new(params.output_shape()).physical_to_logical(texel)?;

    let field = params.field_size as i64;
    let x_r_corner = (y_r * params.stride as usize) as i64 - params.zero_pad as i64;
    let x_c_corner = (y_c * params.stride as usize) as i64 - params.zero_pad as i64;

    let mut acc = params.identity();
    let mut count = 0u32;
    let mut nan_value = None;
    for wr in 0..field {
        let x_r = x_r_corner + wr;
        if x_r < 0 || x_r >= params.x_rows as i64 {
            continue;
        }
        for wc in 0..field {
            let x_c = x_c_corner + wc;
            if x_c < 0 || x_c >= params.x_cols as i64 {
                continue;
            }
            let x_texel = x_layout.logical_to_physical([x_r as usize, x_c as usize, d])?;
            let value = *x_texels.get(x_layout.texel_offset(x_texel))?;
            if value.is_nan() {
                nan_value = Some(value);
            }
            acc = reduction.combine(acc, value);
            count += 1;
        }
    }

    Some(nan_value.unwrap_or_else(|| reduction.finalize(acc, count)))
}
