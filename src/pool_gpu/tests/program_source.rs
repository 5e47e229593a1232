use crate::assert_err;
use crate::errors::PoolError;
use crate::gpgpu::{parse_wgsl, validate_module, KernelKind};
use crate::pool_gpu::{get_min_pool_program_source, get_pool_program_source, ReduceOp, Reduction};

#[test]
fn test_min_pool_program_source() -> Result<(), PoolError> {
    let source = get_min_pool_program_source([4, 4, 2], 2, 2, 0)?;
    assert_eq!(source.source.label, "min_pool");
    assert_eq!(source.source.entry_point, "main");
    assert_eq!(source.source.kernel, KernelKind::Pool(Reduction::MIN));
    assert_eq!(source.input_shape, [4, 4, 2]);
    assert_eq!(source.output_shape, [2, 2, 2]);
    assert!(source.source.wgsl.contains("min(acc, value)"));
    // 模板占位符应全部被替换
    assert!(!source.source.wgsl.contains('$'));
    Ok(())
}

#[test]
fn test_program_source_compiles_for_every_reduction() -> Result<(), PoolError> {
    for reduction in [Reduction::MIN, Reduction::MAX, Reduction::AVG] {
        let source = get_pool_program_source([5, 3, 3], 3, 1, 1, reduction)?;
        assert_eq!(source.source.label, format!("{}_pool", reduction.name()));
        assert!(source.source.wgsl.contains(reduction.wgsl_combine()));
        let module = parse_wgsl(&source.source)?;
        validate_module(&source.source, &module)?;
    }
    Ok(())
}

#[test]
fn test_program_source_only_depends_on_reduction() -> Result<(), PoolError> {
    let a = get_min_pool_program_source([4, 4, 1], 2, 2, 0)?;
    let b = get_min_pool_program_source([9, 7, 3], 3, 1, 1)?;
    assert_eq!(a.source.wgsl, b.source.wgsl);
    assert_ne!(a.uniforms, b.uniforms);

    let c = get_pool_program_source([4, 4, 1], 2, 2, 0, Reduction::MAX)?;
    assert_ne!(a.source.wgsl, c.source.wgsl);
    Ok(())
}

#[test]
fn test_program_source_invalid_config() {
    assert_err!(
        get_min_pool_program_source([4, 4, 1], 0, 1, 0),
        PoolError::InvalidConfig { .. }
    );
    assert_err!(
        get_min_pool_program_source([4, 4, 1], 2, 0, 0),
        PoolError::InvalidConfig { .. }
    );
    // 窗口比补零后的输入还大
    assert_err!(
        get_min_pool_program_source([2, 2, 1], 5, 1, 1),
        PoolError::InvalidConfig { .. }
    );
    assert_err!(
        get_min_pool_program_source([4, 4, 0], 2, 2, 0),
        PoolError::InvalidConfig { value_name, .. } if value_name == "深度"
    );
    assert_err!(
        get_min_pool_program_source([0, 4, 1], 1, 1, 0),
        PoolError::InvalidConfig { value_name, .. } if value_name == "输入行数"
    );
}

#[test]
fn test_program_source_window_and_nan_expressions() -> Result<(), PoolError> {
    let wgsl = get_min_pool_program_source([7, 7, 1], 3, 2, 1)?.source.wgsl;
    // 窗口左上角 = 输出坐标 * 步长 - 补零
    assert!(wgsl.contains("let x_r_corner = y.x * i32(params.stride) - i32(params.zero_pad);"));
    assert!(wgsl.contains("let x_c_corner = y.y * i32(params.stride) - i32(params.zero_pad);"));
    // 越界采样跳过
    assert!(wgsl.contains("if (x_r < 0 || x_r >= i32(params.x_rows)) {"));
    assert!(wgsl.contains("if (x_c < 0 || x_c >= i32(params.x_cols)) {"));
    // NaN按位模式判断，不依赖`value != value`
    assert!(wgsl.contains("(bitcast<u32>(value) & 0x7fffffffu) > 0x7f800000u"));
    assert!(!wgsl.contains("value != value"));
    assert!(wgsl.contains("var acc: f32 = bitcast<f32>(params.identity_bits);"));
    Ok(())
}

#[test]
fn test_program_module_interface() -> Result<(), PoolError> {
    let source = get_min_pool_program_source([4, 4, 2], 2, 2, 0)?;
    let module = parse_wgsl(&source.source)?;

    let [entry] = module.entry_points.as_slice() else {
        panic!("应恰有一个入口函数");
    };
    assert_eq!(entry.name, "main");
    assert_eq!(entry.stage, naga::ShaderStage::Compute);
    assert_eq!(entry.workgroup_size, [8, 8, 1]);

    // 输入纹理、输出纹理、uniform依次绑定在group 0的0、1、2号
    let mut bindings = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| var.binding.as_ref().map(|b| (b.group, b.binding)))
        .collect::<Vec<_>>();
    bindings.sort_unstable();
    assert_eq!(bindings, vec![(0, 0), (0, 1), (0, 2)]);
    Ok(())
}

#[test]
fn test_program_source_rejects_overflowing_pad() {
    assert_err!(
        get_min_pool_program_source([4, 4, 1], 2, 1, usize::MAX / 2 + 1),
        PoolError::InvalidConfig { .. }
    );
}
