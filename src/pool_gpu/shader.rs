use super::{ReduceOp, Reduction};
use crate::conv_util::TexLayout;

pub(crate) const ENTRY_POINT: &str = "main";
pub(crate) const WORKGROUP_SIZE: u32 = 8;

// 每个调用负责一个输出纹素；越界采样直接跳过，等价于取归约单位元
const POOL_SHADER_TEMPLATE: &str = r#"// $NAME pooling
struct PoolParams {
    x_rows: u32,
    x_cols: u32,
    depth: u32,
    field_size: u32,
    stride: u32,
    zero_pad: u32,
    out_rows: u32,
    out_cols: u32,
    identity_bits: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

@group(0) @binding(0) var x: texture_2d<f32>;
@group(0) @binding(1) var result: texture_storage_2d<r32float, write>;
@group(0) @binding(2) var<uniform> params: PoolParams;
$ADDRESSING
@compute @workgroup_size($WG, $WG, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let tex_row = gid.y;
    let tex_col = gid.x;
    if (tex_row >= params.out_rows || tex_col >= params.out_cols * params.depth) {
        return;
    }

    let y = physical_to_logical(tex_row, tex_col, params.depth);
    let depth = i32(params.depth);
    let field = i32(params.field_size);
    let x_r_corner = y.x * i32(params.stride) - i32(params.zero_pad);
    let x_c_corner = y.y * i32(params.stride) - i32(params.zero_pad);

    var acc: f32 = bitcast<f32>(params.identity_bits);
    var count: u32 = 0u;
    var saw_nan: bool = false;
    var nan_value: f32 = 0.0;
    for (var wr: i32 = 0; wr < field; wr = wr + 1) {
        let x_r = x_r_corner + wr;
        if (x_r < 0 || x_r >= i32(params.x_rows)) {
            continue;
        }
        for (var wc: i32 = 0; wc < field; wc = wc + 1) {
            let x_c = x_c_corner + wc;
            if (x_c < 0 || x_c >= i32(params.x_cols)) {
                continue;
            }
            let value = textureLoad(x, logical_to_physical(x_r, x_c, y.z, depth), 0).r;
            // 按位判断NaN，`value != value`可能被编译器优化掉
            if ((bitcast<u32>(value) & 0x7fffffffu) > 0x7f800000u) {
                saw_nan = true;
                nan_value = value;
            }
            acc = $COMBINE;
            count = count + 1u;
        }
    }

    var out_value: f32 = $FINALIZE;
    if (saw_nan) {
        out_value = nan_value;
    }
    textureStore(result, logical_to_physical(y.x, y.y, y.z, depth), vec4<f32>(out_value, 0.0, 0.0, 0.0));
}
"#;

/// 生成某种归约方式的池化计算着色器。源码与形状、参数无关（它们走uniform）。
pub(crate) fn pool_shader_source(reduction: &Reduction) -> String {
    POOL_SHADER_TEMPLATE
        .replace("$NAME", reduction.name())
        .replace("$ADDRESSING", TexLayout::WGSL_ADDRESSING)
        .replace("$WG", &WORKGROUP_SIZE.to_string())
        .replace("$COMBINE", reduction.wgsl_combine())
        .replace("$FINALIZE", reduction.wgsl_finalize())
}
