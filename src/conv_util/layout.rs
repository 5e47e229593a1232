use crate::errors::PoolError;
use crate::tensor::{Shape3, Tensor};

/// 纹理的物理形状：`[纹理行数, 纹理列数]`
pub type TexShape = [usize; 2];

/// 三阶张量`[rows, cols, depth]`存放到二维纹理时的纹理形状：`[rows, cols * depth]`，
/// 即每一行里各像素的全部通道依次平铺。
pub fn compute_tex_shape_from_3d(shape: Shape3) -> TexShape {
    [shape[0], shape[1] * shape[2]]
}

/// 某个逻辑形状下，`(row, col, channel)`与纹素`(tex_row, tex_col)`之间的双射。
///
/// 上传、着色器寻址、下载三处都只经由这里（以及与之逐字对应的`WGSL_ADDRESSING`）换算坐标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexLayout {
    shape: Shape3,
}

impl TexLayout {
    /// 与`logical_to_physical`/`physical_to_logical`一一对应的WGSL实现，
    /// 由着色器拼接使用；`depth`为张量的通道数。
    pub const WGSL_ADDRESSING: &'static str = r#"
fn logical_to_physical(row: i32, col: i32, channel: i32, depth: i32) -> vec2<i32> {
    // textureLoad/textureStore 的坐标为 (x=纹理列, y=纹理行)
    return vec2<i32>(col * depth + channel, row);
}

fn physical_to_logical(tex_row: u32, tex_col: u32, depth: u32) -> vec3<i32> {
    return vec3<i32>(i32(tex_row), i32(tex_col / depth), i32(tex_col % depth));
}
"#;

    pub fn new(shape: Shape3) -> Self {
        TexLayout { shape }
    }

    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    pub fn tex_shape(&self) -> TexShape {
        compute_tex_shape_from_3d(self.shape)
    }

    /// 纹素总数（与逻辑元素总数相等）
    pub fn texel_count(&self) -> usize {
        let [tex_rows, tex_cols] = self.tex_shape();
        tex_rows * tex_cols
    }

    /// `(row, col, channel)` -> `(tex_row, tex_col)`；越界返回None
    pub fn logical_to_physical(&self, index: Shape3) -> Option<TexShape> {
        let [rows, cols, depth] = self.shape;
        let [row, col, channel] = index;
        if row >= rows || col >= cols || channel >= depth {
            return None;
        }
        Some([row, col * depth + channel])
    }

    /// `(tex_row, tex_col)` -> `(row, col, channel)`；越界返回None
    pub fn physical_to_logical(&self, texel: TexShape) -> Option<Shape3> {
        let [tex_rows, tex_cols] = self.tex_shape();
        let [tex_row, tex_col] = texel;
        if tex_row >= tex_rows || tex_col >= tex_cols {
            return None;
        }
        let depth = self.shape[2];
        Some([tex_row, tex_col / depth, tex_col % depth])
    }

    /// 纹素在行优先纹理数据中的扁平下标
    pub fn texel_offset(&self, texel: TexShape) -> usize {
        texel[0] * self.tex_shape()[1] + texel[1]
    }

    /// 把张量按本布局排成纹理数据（长度为`texel_count`）
    pub fn pack(&self, tensor: &Tensor) -> Result<Vec<f32>, PoolError> {
        if tensor.shape() != self.shape {
            return Err(PoolError::shape_mismatch(
                &self.shape,
                &tensor.shape(),
                "待上传张量的形状与纹理布局不符",
            ));
        }
        let mut texels = vec![0.0; self.texel_count()];
        for ((row, col, channel), &value) in tensor.view().indexed_iter() {
            // 上面已校验形状，此处必然在界内
            if let Some(texel) = self.logical_to_physical([row, col, channel]) {
                texels[self.texel_offset(texel)] = value;
            }
        }
        Ok(texels)
    }

    /// 由纹理数据按本布局还原出张量
    pub fn unpack(&self, texels: &[f32]) -> Result<Tensor, PoolError> {
        if texels.len() != self.texel_count() {
            return Err(PoolError::shape_mismatch(
                &self.tex_shape(),
                &[texels.len()],
                "下载的纹理数据长度与纹理布局不符",
            ));
        }
        let [rows, cols, depth] = self.shape;
        let mut data = Vec::with_capacity(texels.len());
        for row in 0..rows {
            for col in 0..cols {
                for channel in 0..depth {
                    if let Some(texel) = self.logical_to_physical([row, col, channel]) {
                        data.push(texels[self.texel_offset(texel)]);
                    }
                }
            }
        }
        Tensor::try_new(&data, self.shape)
    }
}
