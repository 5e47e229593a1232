use std::collections::HashMap;

use log::debug;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::ProgramSource;
use crate::errors::PoolError;

/// 用naga解析程序源码，并确认入口函数存在
pub(crate) fn parse_wgsl(source: &ProgramSource) -> Result<naga::Module, PoolError> {
    let module = naga::front::wgsl::parse_str(&source.wgsl).map_err(|e| {
        PoolError::CompilationError(format!(
            "{}：{}",
            source.label,
            e.emit_to_string(&source.wgsl)
        ))
    })?;

    if !module
        .entry_points
        .iter()
        .any(|entry| entry.name == source.entry_point)
    {
        return Err(PoolError::CompilationError(format!(
            "{}：缺少入口函数`{}`",
            source.label, source.entry_point
        )));
    }
    debug!("已解析程序`{}`", source.label);
    Ok(module)
}

/// 对解析出的模块做完整的类型/绑定校验
pub(crate) fn validate_module(
    source: &ProgramSource,
    module: &naga::Module,
) -> Result<(), PoolError> {
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(module)
        .map_err(|e| {
            PoolError::CompilationError(format!(
                "{}：{}",
                source.label,
                e.emit_to_string(&source.wgsl)
            ))
        })?;
    Ok(())
}

/// 以源码文本为键缓存编译产物。池化内核的源码只随归约方式变化，
/// 形状与参数走uniform，所以同一归约方式只需编译一次。
#[derive(Debug)]
pub(crate) struct ShaderCache<M> {
    compiled: HashMap<String, M>,
}

impl<M: Clone> ShaderCache<M> {
    pub(crate) fn new() -> Self {
        ShaderCache {
            compiled: HashMap::new(),
        }
    }

    pub(crate) fn get_or_compile<F>(&mut self, wgsl: &str, compile: F) -> Result<M, PoolError>
    where
        F: FnOnce() -> Result<M, PoolError>,
    {
        if let Some(module) = self.compiled.get(wgsl) {
            return Ok(module.clone());
        }
        let module = compile()?;
        self.compiled.insert(wgsl.to_string(), module.clone());
        Ok(module)
    }

    pub(crate) fn len(&self) -> usize {
        self.compiled.len()
    }

    pub(crate) fn clear(&mut self) {
        self.compiled.clear();
    }
}
