//! # GPU执行上下文模块
//!
//! 池化算子只通过`GpgpuContext`与GPU打交道：编译程序、分配/释放矩阵纹理、上传/下载数据、执行程序。
//! 提供两种实现：
//! - `SoftwareContext`：主机端参考设备，始终可用，逐纹素并行执行内核的主机端实现；
//! - `WgpuContext`：基于wgpu计算管线的真实GPU设备（需开启`gpu`特性）。

mod resources;
mod software;
#[cfg(feature = "gpu")]
mod wgpu_context;
mod wgsl;


pub use resources::ResourceCounts;
pub(crate) use resources::ResourceTable;
pub use software::SoftwareContext;
#[cfg(feature = "gpu")]
pub use wgpu_context::WgpuContext;
pub(crate) use wgsl::{parse_wgsl, validate_module, ShaderCache};

use serde::{Deserialize, Serialize};

use crate::conv_util::TexShape;
use crate::errors::PoolError;
use crate::pool_gpu::Reduction;

/// 程序句柄。由创建它的上下文签发，须由调用方通过`delete_program`显式释放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// 矩阵纹理句柄。须由调用方通过`delete_matrix_texture`显式释放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// 程序对应的内核种类，决定`run`时uniform数据的解释方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Pool(Reduction),
}

/// 交给上下文编译的程序源码（WGSL计算着色器）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: String,
    pub wgsl: String,
    pub entry_point: &'static str,
    pub kernel: KernelKind,
}

/// 上下文的构造选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOptions {
    /// 对应`enable_automatic_debug_validation`：开启后每次操作都做额外的校验
    #[serde(default)]
    pub debug_validation: bool,
}

/// GPU执行上下文。所有操作均为同步阻塞：返回时对应的GPU工作已经完成。
///
/// 纹理为二维`f32`矩阵，数据按行优先排列，长度为`rows * cols`。
pub trait GpgpuContext {
    fn enable_automatic_debug_validation(&mut self, enabled: bool);

    /// 编译程序；源码被拒绝时返回`CompilationError`（确定性错误，不重试）
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, PoolError>;

    fn delete_program(&mut self, program: ProgramHandle);

    fn create_matrix_texture(
        &mut self,
        rows: usize,
        cols: usize,
    ) -> Result<TextureHandle, PoolError>;

    /// 纹理的`[rows, cols]`
    fn matrix_texture_shape(&self, texture: TextureHandle) -> Result<TexShape, PoolError>;

    fn upload_matrix_to_texture(
        &mut self,
        texture: TextureHandle,
        rows: usize,
        cols: usize,
        data: &[f32],
    ) -> Result<(), PoolError>;

    fn download_matrix_from_texture(
        &mut self,
        texture: TextureHandle,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>, PoolError>;

    fn delete_matrix_texture(&mut self, texture: TextureHandle);

    /// 以`inputs`为输入纹理、`uniforms`为参数块执行一次程序，整体覆盖写入`output`。
    /// 失败时`output`的内容不应再被读取。
    fn run(
        &mut self,
        program: ProgramHandle,
        inputs: &[TextureHandle],
        output: TextureHandle,
        uniforms: &[u8],
    ) -> Result<(), PoolError>;

    /// 当前仍未释放的纹理与程序数量
    fn live_resources(&self) -> ResourceCounts;

    /// 结束会话：释放所有仍存活的资源（并对泄漏告警），此后上下文不可再用
    fn dispose(&mut self);
}

/// 在`f`执行期间持有一张`tex_shape`大小的纹理，无论`f`成功与否都会将其释放
pub fn with_matrix_texture<C, T, F>(
    gpgpu: &mut C,
    tex_shape: TexShape,
    f: F,
) -> Result<T, PoolError>
where
    C: GpgpuContext + ?Sized,
    F: FnOnce(&mut C, TextureHandle) -> Result<T, PoolError>,
{
    let texture = gpgpu.create_matrix_texture(tex_shape[0], tex_shape[1])?;
    let outcome = f(gpgpu, texture);
    gpgpu.delete_matrix_texture(texture);
    outcome
}

/// 校验上传/下载时调用方声明的尺寸与纹理实际尺寸、数据长度是否一致
pub(crate) fn check_matrix_io(
    tex_shape: TexShape,
    rows: usize,
    cols: usize,
    data_len: Option<usize>,
) -> Result<(), PoolError> {
    if tex_shape != [rows, cols] {
        return Err(PoolError::shape_mismatch(
            &tex_shape,
            &[rows, cols],
            "声明的矩阵尺寸与纹理尺寸不符",
        ));
    }
    if let Some(len) = data_len {
        if len != rows * cols {
            return Err(PoolError::shape_mismatch(
                &[rows * cols],
                &[len],
                "上传的数据长度与纹理元素数不符",
            ));
        }
    }
    Ok(())
}
