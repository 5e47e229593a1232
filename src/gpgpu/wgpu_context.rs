//! 基于wgpu计算管线的GPU执行上下文。
//!
//! 矩阵纹理为`R32Float`二维纹理（宽=列数，高=行数），程序为计算管线。
//! 所有操作提交后都会`poll(Maintain::Wait)`，因此从调用方看是同步阻塞的。

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, info};
use wgpu::util::DeviceExt;

use super::{
    check_matrix_io, parse_wgsl, validate_module, ContextOptions, GpgpuContext, KernelKind,
    ProgramHandle, ProgramSource, ResourceCounts, ResourceTable, ShaderCache, TextureHandle,
};
use crate::conv_util::TexShape;
use crate::errors::{ComparisonOperator, PoolError};
use crate::pool_gpu::{kernel, PoolUniforms, WORKGROUP_SIZE};

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

struct CachedPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

struct DeviceProgram {
    label: String,
    kernel: KernelKind,
    pipeline: Arc<CachedPipeline>,
}

struct DeviceTexture {
    rows: usize,
    cols: usize,
    texture: wgpu::Texture,
}

pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    options: ContextOptions,
    programs: ResourceTable<DeviceProgram>,
    textures: ResourceTable<DeviceTexture>,
    pipelines: ShaderCache<Arc<CachedPipeline>>,
    disposed: bool,
}

fn extent(rows: usize, cols: usize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: cols as u32,
        height: rows as u32,
        depth_or_array_layers: 1,
    }
}

impl WgpuContext {
    /// 请求一个GPU适配器与设备，优先硬件适配器，其次软件适配器；都没有时返回`PoolError::Device`
    pub fn new(options: ContextOptions) -> Result<Self, PoolError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            // 没有硬件适配器时退回软件实现（llvmpipe/lavapipe/WARP）
            let mut adapter = None;
            for force_fallback_adapter in [false, true] {
                adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: None,
                        force_fallback_adapter,
                    })
                    .await;
                if adapter.is_some() {
                    break;
                }
            }
            let adapter =
                adapter.ok_or_else(|| PoolError::Device("找不到可用的GPU适配器".to_string()))?;
            info!("使用GPU适配器：{:?}", adapter.get_info());

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("tex_pool device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::default(),
                        memory_hints: Default::default(),
                    },
                    None,
                )
                .await
                .map_err(|e| PoolError::Device(format!("创建GPU设备失败：{e}")))?;

            Ok(WgpuContext {
                device,
                queue,
                options,
                programs: ResourceTable::new("程序"),
                textures: ResourceTable::new("纹理"),
                pipelines: ShaderCache::new(),
                disposed: false,
            })
        })
    }

    fn ensure_alive(&self) -> Result<(), PoolError> {
        if self.disposed {
            return Err(PoolError::Device("上下文已被释放（dispose）".to_string()));
        }
        Ok(())
    }

    /// 开启调试校验时，在wgpu校验错误作用域内执行`f`，并把作用域捕获到的错误转为`PoolError`
    fn scoped<T>(
        &self,
        force: bool,
        to_error: impl FnOnce(String) -> PoolError,
        f: impl FnOnce(&Self) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let scoped = force || self.options.debug_validation;
        if scoped {
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        }
        let outcome = f(self);
        if scoped {
            if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
                return Err(to_error(error.to_string()));
            }
        }
        outcome
    }

    fn build_pipeline(&self, source: &ProgramSource) -> Result<CachedPipeline, PoolError> {
        let label = source.label.as_str();
        // 创建着色器总是包在作用域内，编译失败报`CompilationError`而不是走wgpu的默认panic
        self.scoped(true, PoolError::CompilationError, |ctx| {
            let module = ctx
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.wgsl.as_str())),
                });

            let bind_group_layout =
                ctx.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label),
                        entries: &[
                            wgpu::BindGroupLayoutEntry {
                                binding: 0,
                                visibility: wgpu::ShaderStages::COMPUTE,
                                ty: wgpu::BindingType::Texture {
                                    sample_type: wgpu::TextureSampleType::Float {
                                        filterable: false,
                                    },
                                    view_dimension: wgpu::TextureViewDimension::D2,
                                    multisampled: false,
                                },
                                count: None,
                            },
                            wgpu::BindGroupLayoutEntry {
                                binding: 1,
                                visibility: wgpu::ShaderStages::COMPUTE,
                                ty: wgpu::BindingType::StorageTexture {
                                    access: wgpu::StorageTextureAccess::WriteOnly,
                                    format: TEXTURE_FORMAT,
                                    view_dimension: wgpu::TextureViewDimension::D2,
                                },
                                count: None,
                            },
                            wgpu::BindGroupLayoutEntry {
                                binding: 2,
                                visibility: wgpu::ShaderStages::COMPUTE,
                                ty: wgpu::BindingType::Buffer {
                                    ty: wgpu::BufferBindingType::Uniform,
                                    has_dynamic_offset: false,
                                    min_binding_size: None,
                                },
                                count: None,
                            },
                        ],
                    });

            let pipeline_layout =
                ctx.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(label),
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    });

            let pipeline = ctx
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(source.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                });

            Ok(CachedPipeline {
                pipeline,
                bind_group_layout,
            })
        })
    }

    fn run_pool(
        &self,
        program: &DeviceProgram,
        inputs: &[TextureHandle],
        output: TextureHandle,
        uniforms: &[u8],
    ) -> Result<(), PoolError> {
        let label = program.label.as_str();
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

        self.scoped(false, PoolError::Device, |ctx| {
            let uniform_buffer =
                ctx.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(label),
                        contents: uniforms,
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
            let x_view = x.texture.create_view(&wgpu::TextureViewDescriptor::default());
            let out_view = out
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());

            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &program.pipeline.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&x_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&out_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&program.pipeline.pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(
                    (out.cols as u32).div_ceil(WORKGROUP_SIZE),
                    (out.rows as u32).div_ceil(WORKGROUP_SIZE),
                    1,
                );
            }
            ctx.queue.submit(std::iter::once(encoder.finish()));
            ctx.device.poll(wgpu::Maintain::Wait);
            Ok(())
        })
    }
}

impl GpgpuContext for WgpuContext {
    fn enable_automatic_debug_validation(&mut self, enabled: bool) {
        self.options.debug_validation = enabled;
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, PoolError> {
        self.ensure_alive()?;
        // 先过一遍naga，使编译错误在两种上下文里表现一致
        let module = parse_wgsl(source)?;
        if self.options.debug_validation {
            validate_module(source, &module)?;
        }
        let mut pipelines = std::mem::replace(&mut self.pipelines, ShaderCache::new());
        let pipeline = pipelines.get_or_compile(&source.wgsl, || {
            self.build_pipeline(source).map(Arc::new)
        });
        self.pipelines = pipelines;
        let pipeline = pipeline?;

        let id = self.programs.insert(DeviceProgram {
            label: source.label.clone(),
            kernel: source.kernel,
            pipeline,
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
        let max_dim = self.device.limits().max_texture_dimension_2d as usize;
        if rows > max_dim || cols > max_dim {
            return Err(PoolError::invalid_config(
                "纹理行数与列数",
                ComparisonOperator::LessOrEqual,
                max_dim as i64,
                rows.max(cols) as i64,
            ));
        }

        let texture = self.scoped(false, PoolError::Device, |ctx| {
            Ok(ctx.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("matrix texture"),
                size: extent(rows, cols),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            }))
        })?;
        let id = self.textures.insert(DeviceTexture {
            rows,
            cols,
            texture,
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
        let texture = self.textures.get(texture.0)?;
        check_matrix_io([texture.rows, texture.cols], rows, cols, Some(data.len()))?;
        self.scoped(false, PoolError::Device, |ctx| {
            ctx.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(data),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some((cols * std::mem::size_of::<f32>()) as u32),
                    rows_per_image: Some(rows as u32),
                },
                extent(rows, cols),
            );
            Ok(())
        })
    }

    fn download_matrix_from_texture(
        &mut self,
        texture: TextureHandle,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>, PoolError> {
        self.ensure_alive()?;
        let texture = self.textures.get(texture.0)?;
        check_matrix_io([texture.rows, texture.cols], rows, cols, None)?;

        // 纹理拷贝到缓冲区时每行字节数须按256对齐
        let row_bytes = cols * std::mem::size_of::<f32>();
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
        let padded_row_bytes = row_bytes.div_ceil(align) * align;

        let readback = self.scoped(false, PoolError::Device, |ctx| {
            let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("matrix readback"),
                size: (padded_row_bytes * rows) as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("matrix readback"),
                });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &texture.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &readback,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_row_bytes as u32),
                        rows_per_image: Some(rows as u32),
                    },
                },
                extent(rows, cols),
            );
            ctx.queue.submit(std::iter::once(encoder.finish()));
            Ok(readback)
        })?;

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| PoolError::Device(format!("等待纹理回读失败：{e}")))?
            .map_err(|e| PoolError::Device(format!("映射回读缓冲区失败：{e}")))?;

        let mapped = slice.get_mapped_range();
        let mut data = Vec::with_capacity(rows * cols);
        for row in mapped.chunks_exact(padded_row_bytes) {
            data.extend(
                row[..row_bytes]
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }
        drop(mapped);
        readback.unmap();
        Ok(data)
    }

    fn delete_matrix_texture(&mut self, texture: TextureHandle) {
        if let Some(removed) = self.textures.remove(texture.0) {
            removed.texture.destroy();
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
        debug!("执行程序`{}`，输出纹理#{}", program.label, output.0);
        match program.kernel {
            KernelKind::Pool(_) => self.run_pool(program, inputs, output, uniforms),
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
        self.pipelines.clear();
        self.disposed = true;
        debug!("wgpu上下文已释放");
    }
}
