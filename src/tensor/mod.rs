use ndarray::Array3;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::errors::PoolError;

pub(crate) mod ops {
    pub mod eq;
}

mod print;
mod property;


/// 张量的逻辑形状：`[行数, 列数, 深度（通道数）]`
pub type Shape3 = [usize; 3];

/// 定义三阶张量的结构体：行、列为空间维度，深度为通道数。
/// 数据按`(行, 列, 通道)`的行优先顺序存放，创建后不可变。
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Array3<f32>,
}

impl Tensor {
    /// 由扁平数据创建一个形状为`[rows, cols, depth]`的张量。
    /// 注：`data`的长度必须和`shape`中所有元素的乘积相等，否则会panic。
    pub fn new(data: &[f32], shape: Shape3) -> Tensor {
        match Tensor::try_new(data, shape) {
            Ok(tensor) => tensor,
            Err(e) => panic!("{}", e),
        }
    }

    /// 同`new`，但长度不符时返回`PoolError::ShapeMismatch`而非panic
    pub fn try_new(data: &[f32], shape: Shape3) -> Result<Tensor, PoolError> {
        let expected_len = shape.iter().product::<usize>();
        if data.len() != expected_len {
            return Err(PoolError::shape_mismatch(
                &[expected_len],
                &[data.len()],
                &format!("形状为{shape:?}的张量需要{expected_len}个元素"),
            ));
        }
        let data = Array3::from_shape_vec((shape[0], shape[1], shape[2]), data.to_vec())
            .map_err(|e| PoolError::shape_mismatch(&shape, &[data.len()], &e.to_string()))?;
        Ok(Tensor { data })
    }

    /// 创建一个全零张量
    pub fn zeros(shape: Shape3) -> Tensor {
        Tensor {
            data: Array3::zeros((shape[0], shape[1], shape[2])),
        }
    }

    /// 创建一个随机张量，其值在[min, max]的闭区间
    pub fn new_random(min: f32, max: f32, shape: Shape3) -> Tensor {
        let mut rng = rand::thread_rng();
        let data = (0..shape.iter().product::<usize>())
            .map(|_| Uniform::from(min..=max).sample(&mut rng))
            .collect::<Vec<_>>();
        Tensor::new(&data, shape)
    }

    /// 创建一个服从正态分布的随机张量，其值在指定的均值和标准差范围内。
    pub fn new_normal(mean: f32, std_dev: f32, shape: Shape3) -> Tensor {
        Tensor::new_normal_with_rng(mean, std_dev, shape, &mut rand::thread_rng())
    }

    /// 同`new_normal`，但使用调用方提供的随机数生成器（便于复现）
    pub fn new_normal_with_rng<R: Rng + ?Sized>(
        mean: f32,
        std_dev: f32,
        shape: Shape3,
        rng: &mut R,
    ) -> Tensor {
        let data_len = shape.iter().product::<usize>();
        let mut data = Vec::with_capacity(data_len);

        // Box-Muller
        while data.len() < data_len {
            let u1: f32 = rng.r#gen();
            let u2: f32 = rng.r#gen();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            let z0 = mean + std_dev * r * theta.cos();
            let z1 = mean + std_dev * r * theta.sin();

            if z0.is_finite() {
                data.push(z0);
            }
            if data.len() < data_len && z1.is_finite() {
                data.push(z1);
            }
        }

        Tensor::new(&data, shape)
    }
}
