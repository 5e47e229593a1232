use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::assert_err;
use crate::conv_util::TexLayout;
use crate::errors::PoolError;
use crate::math_cpu;
use crate::pool_gpu::kernel::{check_pool_bindings, eval_output_texel};
use crate::pool_gpu::{get_pool_program_source, Reduction};
use crate::tensor::Tensor;
use crate::utils::test_util::expect_arrays_close;

/// 逐纹素执行内核的主机端实现，得到整张输出纹理
fn run_kernel(
    x: &Tensor,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
    reduction: Reduction,
) -> Result<Tensor, PoolError> {
    let source = get_pool_program_source(x.shape(), field_size, stride, zero_pad, reduction)?;
    let x_texels = TexLayout::new(x.shape()).pack(x)?;
    let result_layout = TexLayout::new(source.output_shape);
    let [rows, cols] = result_layout.tex_shape();
    let mut texels = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let value = eval_output_texel(&source.uniforms, &reduction, &x_texels, [r, c])
                .ok_or_else(|| PoolError::Device(format!("纹素({r}, {c})越界")))?;
            texels.push(value);
        }
    }
    result_layout.unpack(&texels)
}

#[test]
fn test_kernel_matches_cpu() -> Result<(), PoolError> {
    let mut rng = StdRng::seed_from_u64(7);
    let cases = [
        ([6, 6, 1], 2, 2, 0),
        ([5, 7, 3], 3, 1, 1),
        ([8, 4, 2], 3, 2, 2),
        ([3, 3, 4], 1, 1, 0),
    ];
    for (shape, field_size, stride, zero_pad) in cases {
        let x = Tensor::new_normal_with_rng(0.0, 1.0, shape, &mut rng);
        for reduction in [Reduction::MIN, Reduction::MAX, Reduction::AVG] {
            let expected = math_cpu::pool(&x, field_size, stride, zero_pad, reduction)?;
            let actual = run_kernel(&x, field_size, stride, zero_pad, reduction)?;
            assert_eq!(actual.shape(), expected.shape());
            expect_arrays_close(&actual.values(), &expected.values(), 1e-5);
        }
    }
    Ok(())
}

#[test]
fn test_kernel_out_of_range_texel() -> Result<(), PoolError> {
    let source = get_pool_program_source([2, 2, 1], 1, 1, 0, Reduction::MIN)?;
    let x_texels = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(
        eval_output_texel(&source.uniforms, &Reduction::MIN, &x_texels, [1, 1]),
        Some(4.0)
    );
    assert_eq!(
        eval_output_texel(&source.uniforms, &Reduction::MIN, &x_texels, [2, 0]),
        None
    );
    // 输入纹素数据不足时同样返回None
    assert_eq!(
        eval_output_texel(&source.uniforms, &Reduction::MIN, &x_texels[..2], [1, 1]),
        None
    );
    Ok(())
}

#[test]
fn test_check_pool_bindings() -> Result<(), PoolError> {
    let source = get_pool_program_source([4, 4, 2], 2, 2, 0, Reduction::MIN)?;
    check_pool_bindings(&source.uniforms, [4, 8], [2, 4])?;
    assert_err!(
        check_pool_bindings(&source.uniforms, [4, 4], [2, 4]),
        PoolError::ShapeMismatch([4, 8], [4, 4], "输入纹理尺寸与池化程序的输入形状不符")
    );
    assert_err!(
        check_pool_bindings(&source.uniforms, [4, 8], [2, 2]),
        PoolError::ShapeMismatch([2, 4], [2, 2], "输出纹理尺寸与池化程序的输出形状不符")
    );
    Ok(())
}
