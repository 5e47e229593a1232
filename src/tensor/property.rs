/*
 * @Author       : 老董
 * @Date         : 2026-10-12
 * @Description  : 本类仅包含一些属性方法，不包含任何运算方法，所以不会需要用到mut
 */

use super::{Shape3, Tensor};
use ndarray::ArrayView3;
use std::ops::Index;

impl Tensor {
    /// 形状：`[行数, 列数, 深度]`
    pub fn shape(&self) -> Shape3 {
        let (rows, cols, depth) = self.data.dim();
        [rows, cols, depth]
    }

    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    /// 通道数
    pub fn depth(&self) -> usize {
        self.data.dim().2
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 取`(row, col, channel)`处的元素；越界返回None
    pub fn get(&self, row: usize, col: usize, channel: usize) -> Option<f32> {
        self.data.get((row, col, channel)).copied()
    }

    /// 按`(行, 列, 通道)`行优先顺序展开的全部元素
    pub fn values(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

impl Index<[usize; 3]> for Tensor {
    type Output = f32;

    fn index(&self, index: [usize; 3]) -> &f32 {
        &self.data[(index[0], index[1], index[2])]
    }
}
