//! # GPU池化模块
//!
//! 生成并执行参数化的池化程序：对每个输出元素`(r, c, d)`，在输入纹理上以
//! `(r*stride - zero_pad, c*stride - zero_pad)`为左上角取`field_size x field_size`的窗口（只在通道`d`内），
//! 越界采样按归约单位元处理，归约结果写到输出纹理中`(r, c, d)`对应的纹素。
//!
//! 着色器源码只随归约方式变化，形状与池化参数通过`PoolUniforms`在执行时传入，
//! 因此同一种池化在不同形状下复用同一份编译产物。

pub(crate) mod kernel;
mod reduction;
mod shader;
mod uniforms;

#[cfg(test)]
mod tests;

pub use reduction::{AvgReduce, MaxReduce, MinReduce, ReduceOp, Reduction};
pub use uniforms::PoolUniforms;
#[cfg(feature = "gpu")]
pub(crate) use shader::WORKGROUP_SIZE;

use log::debug;

use crate::conv_util::{PoolConfig, TexLayout, TexShape};
use crate::errors::{ComparisonOperator, PoolError};
use crate::gpgpu::{
    with_matrix_texture, GpgpuContext, KernelKind, ProgramHandle, ProgramSource, TextureHandle,
};
use crate::tensor::{Shape3, Tensor};

/// 绑定到具体`(输入形状, 池化参数, 归约方式)`的程序源码
#[derive(Debug, Clone, PartialEq)]
pub struct PoolProgramSource {
    pub source: ProgramSource,
    pub uniforms: PoolUniforms,
    pub reduction: Reduction,
    pub config: PoolConfig,
    pub input_shape: Shape3,
    pub output_shape: Shape3,
}

/// 已编译的池化程序。由调用方持有，用完须经`delete_pool_program`释放。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolProgram {
    handle: ProgramHandle,
    uniforms: PoolUniforms,
    reduction: Reduction,
}

impl PoolProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn uniforms(&self) -> &PoolUniforms {
        &self.uniforms
    }

    pub fn input_shape(&self) -> Shape3 {
        self.uniforms.input_shape()
    }

    pub fn output_shape(&self) -> Shape3 {
        self.uniforms.output_shape()
    }

    pub fn x_tex_shape(&self) -> TexShape {
        self.uniforms.x_tex_shape()
    }

    pub fn result_tex_shape(&self) -> TexShape {
        self.uniforms.result_tex_shape()
    }
}

/// 生成池化程序源码。参数无效（窗口/步长为0、窗口放不下、输入含0维）时返回`InvalidConfig`。
pub fn get_pool_program_source(
    x_shape: Shape3,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
    reduction: Reduction,
) -> Result<PoolProgramSource, PoolError> {
    for (value_name, dim) in [("输入行数", x_shape[0]), ("输入列数", x_shape[1]), ("深度", x_shape[2])] {
        if dim == 0 {
            return Err(PoolError::invalid_config(
                value_name,
                ComparisonOperator::GreaterOrEqual,
                1,
                0,
            ));
        }
    }
    let config = PoolConfig::new(field_size, stride, zero_pad);
    let output_shape = config.output_shape(x_shape)?;
    let uniforms = PoolUniforms::new(x_shape, config, output_shape, &reduction)?;

    let source = ProgramSource {
        label: format!("{}_pool", reduction.name()),
        wgsl: shader::pool_shader_source(&reduction),
        entry_point: shader::ENTRY_POINT,
        kernel: KernelKind::Pool(reduction),
    };
    Ok(PoolProgramSource {
        source,
        uniforms,
        reduction,
        config,
        input_shape: x_shape,
        output_shape,
    })
}

/// 最小池化程序源码
pub fn get_min_pool_program_source(
    x_shape: Shape3,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<PoolProgramSource, PoolError> {
    get_pool_program_source(x_shape, field_size, stride, zero_pad, Reduction::MIN)
}

/// 经上下文编译池化程序；编译错误原样上抛
pub fn compile_pool_program<C: GpgpuContext + ?Sized>(
    gpgpu: &mut C,
    source: &PoolProgramSource,
) -> Result<PoolProgram, PoolError> {
    let handle = gpgpu.create_program(&source.source)?;
    Ok(PoolProgram {
        handle,
        uniforms: source.uniforms,
        reduction: source.reduction,
    })
}

pub fn delete_pool_program<C: GpgpuContext + ?Sized>(gpgpu: &mut C, program: PoolProgram) {
    gpgpu.delete_program(program.handle);
}

fn check_texture_shape<C: GpgpuContext + ?Sized>(
    gpgpu: &C,
    texture: TextureHandle,
    expected: TexShape,
    message: &str,
) -> Result<(), PoolError> {
    let got = gpgpu.matrix_texture_shape(texture)?;
    if got != expected {
        return Err(PoolError::shape_mismatch(&expected, &got, message));
    }
    Ok(())
}

/// 执行池化：绑定输入、输出纹理并运行一次程序，输出纹理被整体覆盖。
/// 任一纹理尺寸（或`result_tex_shape`）与程序推导出的纹理形状不一致时返回`ShapeMismatch`，不会执行。
pub fn pool<C: GpgpuContext + ?Sized>(
    gpgpu: &mut C,
    program: &PoolProgram,
    x_tex: TextureHandle,
    result_tex: TextureHandle,
    result_tex_shape: TexShape,
) -> Result<(), PoolError> {
    if result_tex_shape != program.result_tex_shape() {
        return Err(PoolError::shape_mismatch(
            &program.result_tex_shape(),
            &result_tex_shape,
            "给定的输出纹理形状与池化输出形状不符",
        ));
    }
    check_texture_shape(gpgpu, x_tex, program.x_tex_shape(), "输入纹理尺寸与输入形状不符")?;
    check_texture_shape(
        gpgpu,
        result_tex,
        program.result_tex_shape(),
        "输出纹理尺寸与池化输出形状不符",
    )?;

    debug!(
        "{}池化：{:?} -> {:?}",
        program.reduction.name(),
        program.input_shape(),
        program.output_shape()
    );
    gpgpu.run(
        program.handle,
        &[x_tex],
        result_tex,
        bytemuck::bytes_of(&program.uniforms),
    )
}

/// 上传 -> 池化 -> 下载的完整流程。过程中创建的纹理与程序无论成败都会被释放。
pub fn upload_pool_download<C: GpgpuContext + ?Sized>(
    gpgpu: &mut C,
    x: &Tensor,
    config: PoolConfig,
    reduction: Reduction,
) -> Result<Tensor, PoolError> {
    let source = get_pool_program_source(
        x.shape(),
        config.field_size,
        config.stride,
        config.zero_pad,
        reduction,
    )?;
    let x_layout = TexLayout::new(source.input_shape);
    let result_layout = TexLayout::new(source.output_shape);
    let x_texels = x_layout.pack(x)?;

    let program = compile_pool_program(gpgpu, &source)?;
    let outcome = with_matrix_texture(gpgpu, x_layout.tex_shape(), |gpgpu, x_tex| {
        with_matrix_texture(gpgpu, result_layout.tex_shape(), |gpgpu, result_tex| {
            let [x_tex_rows, x_tex_cols] = x_layout.tex_shape();
            gpgpu.upload_matrix_to_texture(x_tex, x_tex_rows, x_tex_cols, &x_texels)?;

            let result_tex_shape = result_layout.tex_shape();
            pool(gpgpu, &program, x_tex, result_tex, result_tex_shape)?;

            let texels = gpgpu.download_matrix_from_texture(
                result_tex,
                result_tex_shape[0],
                result_tex_shape[1],
            )?;
            result_layout.unpack(&texels)
        })
    });
    delete_pool_program(gpgpu, program);
    outcome
}

/// `upload_pool_download`的最小池化版本
pub fn upload_min_pool_download<C: GpgpuContext + ?Sized>(
    gpgpu: &mut C,
    x: &Tensor,
    config: PoolConfig,
) -> Result<Tensor, PoolError> {
    upload_pool_download(gpgpu, x, config, Reduction::MIN)
}
