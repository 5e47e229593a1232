/*
 * @Author       : 老董
 * @Date         : 2026-10-14
 * @Description  : 主机端参考设备：纹理即主机内存，程序由naga解析/校验后，
 *                 按内核种类在rayon线程池上逐纹素执行内核的主机端实现
 */

use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use super::{
    check_matrix_io, parse_wgsl, validate_module, ContextOptions, GpgpuContext, KernelKind,
    ProgramHandle, ProgramSource, ResourceCounts, ResourceTable, ShaderCache, TextureHandle,
};
use crate::conv_util::TexShape;
use crate::errors::{ComparisonOperator, PoolError};
use crate::pool_gpu::{kernel, PoolUniforms, Reduction};

struct HostProgram {
    label: String,
    kernel: KernelKind,
    _module: Arc<naga::Module>,
}

struct HostTexture {
    rows: usize,
    cols: usize,
    texels: Vec<f32>,
    // 自创建起是否被上传或写入过
    initialized: bool,
}

pub struct SoftwareContext {
    options: ContextOptions,
    programs: ResourceTable<HostProgram>,
    textures: ResourceTable<HostTexture>,
    modules: ShaderCache<Arc<naga::Module>>,
    disposed: bool,
}

impl Default for SoftwareContext {
    fn default() -> Self {
        SoftwareContext::new(ContextOptions::default())
    }
}

impl SoftwareContext {
    pub fn new(options: ContextOptions) -> Self {
        SoftwareContext {
            options,
            programs: ResourceTable::new("程序"),
            textures: ResourceTable::new("纹理"),
            modules: ShaderCache::new(),
            disposed: false,
        }
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    /// 已缓存的着色器模块数（按源码去重）
    pub fn cached_module_count(&self) -> usize {
        self.modules.len()
    }

    fn ensure_alive(&self) -> Result<(), PoolError> {
        if self.disposed {
            return Err(PoolError::Device("上下文已被释放（dispose）".to_string()));
        }
        Ok(())
    }

    fn run_pool(
        &mut self,
        label: &str,
        reduction: Reduction,
        inputs: &[TextureHandle],
        output: TextureHandle,
        uniforms: &[u8],
    ) -> Result<(), PoolError> {
        let params: PoolUniforms = bytemuck::try_pod_read_unaligned(uniforms)
            .map_err(|e| PoolError::Device(format!("{label}：uniform数据无法解析为池化参数：{e}")))?;
        let [x_tex] = inputs else {
            return Err(PoolError::Device(format!(
                "{label}：池化程序需要1个输入纹理，实际为{}个",
                inputs.len()
            )));
        };
        if *x_tex == output {
            return Err(PoolError::Device(format!(
                "{label}：输入纹理与输出纹理不能是同一张"
            )));
        }

        let x = self.textures.get(x_tex.0)?;
        let out = self.textures.get(output.0)?;
        kernel::check_pool_bindings(&params, [x.rows, x.cols], [out.rows, out.cols])?;
        if self.options.debug_validation && !x.initialized {
            return Err(PoolError::Device(format!(
                "{label}：读取了尚未写入数据的输入纹理#{}",
                x_tex.0
            )));
        }

        let out_cols = out.cols;
        let x_texels = &x.texels;
        let texels = (0..out.rows * out.cols)
            .into_par_iter()
            .map(|offset| {
                kernel::eval_output_texel(
                    &params,
                    &reduction,
                    x_texels,
                    [offset / out_cols, offset % out_cols],
                )
            })
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| PoolError::Device(format!("{label}：内核寻址越界")))?;

        // 全部算完才整体写入，失败时输出纹理保持原样
        let out = self.textures.get_mut(output.0)?;
        out.texels = texels;
        out.initialized = true;
        Ok(())
    }
}

impl GpgpuContext for SoftwareContext {
    fn enable_automatic_debug_validation(&mut self, enabled: bool) {
        self.options.debug_validation = enabled;
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, PoolError> {
        self.ensure_alive()?;
        let module = self
            .modules
            .get_or_compile(&source.wgsl, || parse_wgsl(source).map(Arc::new))?;
        if self.options.debug_validation {
            validate_module(source, &module)?;
        }
        let id = self.programs.insert(HostProgram {
            label: source.label.clone(),
            kernel: source.kernel,
            _module: module,
        });
        debug!("创建程序#{id}（{}）", source.label);
        Ok(ProgramHandle(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(program.0).is_some() {
            debug!("释放程序#{}", program.0);
        }
    }

    fn create_matrix_texture(
        &mut self,
        rows: usize,
        cols: usize,
    ) -> Result<TextureHandle, PoolError> {
        self.ensure_alive()?;
        if rows == 0 || cols == 0 {
            return Err(PoolError::invalid_config(
                "纹理行数与列数",
                ComparisonOperator::GreaterOrEqual,
                1,
                rows.min(cols) as i64,
            ));
        }
        let id = self.textures.insert(HostTexture {
            rows,
            cols,
            texels: vec![0.0; rows * cols],
            initialized: false,
        });
        debug!("创建纹理#{id}（{rows}x{cols}）");
        Ok(TextureHandle(id))
    }

    fn matrix_texture_shape(&self, texture: TextureHandle) -> Result<TexShape, PoolError> {
        let texture = self.textures.get(texture.0)?;
        Ok([texture.rows, texture.cols])
    }

    fn upload_matrix_to_texture(
        &mut self,
        texture: TextureHandle,
        rows: usize,
        cols: usize,
        data: &[f32],
    ) -> Result<(), PoolError> {
        self.ensure_alive()?;
        let texture = self.textures.get_mut(texture.0)?;
        check_matrix_io([texture.rows, texture.cols], rows, cols, Some(data.len()))?;
        texture.texels.copy_from_slice(data);
        texture.initialized = true;
        Ok(())
    }

    fn download_matrix_from_texture(
        &mut self,
        texture: TextureHandle,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>, PoolError> {
        self.ensure_alive()?;
        let id = texture.0;
        let texture = self.textures.get(id)?;
        check_matrix_io([texture.rows, texture.cols], rows, cols, None)?;
        if self.options.debug_validation && !texture.initialized {
            return Err(PoolError::Device(format!(
                "下载了尚未写入数据的纹理#{id}"
            )));
        }
        Ok(texture.texels.clone())
    }

    fn delete_matrix_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(texture.0).is_some() {
            debug!("释放纹理#{}", texture.0);
        }
    }

    fn run(
        &mut self,
        program: ProgramHandle,
        inputs: &[TextureHandle],
        output: TextureHandle,
        uniforms: &[u8],
    ) -> Result<(), PoolError> {
        self.ensure_alive()?;
        let program = self.programs.get(program.0)?;
        let (label, kernel) = (program.label.clone(), program.kernel);
        debug!("执行程序`{label}`，输出纹理#{}", output.0);
        match kernel {
            KernelKind::Pool(reduction) => {
                self.run_pool(&label, reduction, inputs, output, uniforms)
            }
        }
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.len(),
            programs: self.programs.len(),
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.textures.drain_all();
        self.programs.drain_all();
        self.modules.clear();
        self.disposed = true;
        debug!("软件上下文已释放");
    }
}
