//! # Tex Pool
//!
//! `tex_pool`把三阶张量（行 x 列 x 通道）按二维纹理布局存放到GPU上，
//! 用参数化的计算着色器完成空间池化（min/max/avg，含步长与补零），
//! 并保证结果与CPU参考实现在浮点容差内逐元素一致。
//!
//! 模块划分：
//! - `conv_util`：输出形状与纹理布局（逻辑坐标与纹素坐标的双射）的计算；
//! - `pool_gpu`：池化程序的生成与执行；
//! - `gpgpu`：GPU执行上下文（主机端参考设备与wgpu设备）；
//! - `math_cpu`：池化的CPU参考实现，仅用于核对。

pub mod conv_util;
pub mod errors;
pub mod gpgpu;
pub mod math_cpu;
pub mod pool_gpu;
pub mod tensor;
pub mod utils;

pub use conv_util::{compute_output_shape_3d, compute_tex_shape_from_3d, PoolConfig, TexLayout};
pub use errors::PoolError;
pub use gpgpu::{ContextOptions, GpgpuContext, SoftwareContext};
#[cfg(feature = "gpu")]
pub use gpgpu::WgpuContext;
pub use pool_gpu::{upload_pool_download, Reduction};
pub use tensor::{Shape3, Tensor};
