/*
 * @Author       : 老董
 * @Date         : 2026-10-13
 * @Description  : 池化的CPU参考实现，只用来核对GPU结果，不在生产路径上使用。
 *                 刻意不复用GPU内核的任何代码（窗口直接裁剪到输入范围内），两边互为校验。
 */

use rayon::prelude::*;

use crate::conv_util::compute_output_shape_3d;
use crate::errors::PoolError;
use crate::pool_gpu::Reduction;
use crate::tensor::Tensor;


pub fn min_pool(
    x: &Tensor,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<Tensor, PoolError> {
    pool(x, field_size, stride, zero_pad, Reduction::MIN)
}

pub fn max_pool(
    x: &Tensor,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<Tensor, PoolError> {
    pool(x, field_size, stride, zero_pad, Reduction::MAX)
}

pub fn avg_pool(
    x: &Tensor,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
) -> Result<Tensor, PoolError> {
    pool(x, field_size, stride, zero_pad, Reduction::AVG)
}

/// 通用池化：窗口先裁剪到`[0, rows) x [0, cols)`再归约，窗口内出现NaN则结果为NaN
pub fn pool(
    x: &Tensor,
    field_size: usize,
    stride: usize,
    zero_pad: usize,
    reduction: Reduction,
) -> Result<Tensor, PoolError> {
    let [x_rows, x_cols, depth] = x.shape();
    let [y_rows, y_cols, _] =
        compute_output_shape_3d(x.shape(), field_size, depth, stride, zero_pad)?;
    let x_view = x.view();

    // 按输出行并行，每行产出`y_cols * depth`个值，顺序即(行, 列, 通道)
    let rows: Vec<Vec<f32>> = (0..y_rows)
        .into_par_iter()
        .map(|y_r| {
            let x_r_corner = (y_r * stride) as i64 - zero_pad as i64;
            let x_r_min = x_r_corner.max(0) as usize;
            let x_r_max = (x_r_corner + field_size as i64).clamp(0, x_rows as i64) as usize;

            let mut row = Vec::with_capacity(y_cols * depth);
            for y_c in 0..y_cols {
                let x_c_corner = (y_c * stride) as i64 - zero_pad as i64;
                let x_c_min = x_c_corner.max(0) as usize;
                let x_c_max = (x_c_corner + field_size as i64).clamp(0, x_cols as i64) as usize;

                for d in 0..depth {
                    let mut min_max_value = match reduction {
                        Reduction::Max(_) => f32::NEG_INFINITY,
                        _ => f32::INFINITY,
                    };
                    let mut sum = 0.0f32;
                    let mut count = 0usize;
                    let mut nan = false;

                    'window: for x_r in x_r_min..x_r_max {
                        for x_c in x_c_min..x_c_max {
                            let pixel = x_view[(x_r, x_c, d)];
                            if pixel.is_nan() {
                                nan = true;
                                break 'window;
                            }
                            match reduction {
                                Reduction::Min(_) if pixel < min_max_value => {
                                    min_max_value = pixel
                                }
                                Reduction::Max(_) if pixel > min_max_value => {
                                    min_max_value = pixel
                                }
                                Reduction::Avg(_) => sum += pixel,
                                _ => {}
                            }
                            count += 1;
                        }
                    }

                    let value = if nan {
                        f32::NAN
                    } else {
                        match reduction {
                            Reduction::Avg(_) if count == 0 => 0.0,
                            Reduction::Avg(_) => sum / count as f32,
                            _ => min_max_value,
                        }
                    };
                    row.push(value);
                }
            }
            row
        })
        .collect();

    let data = rows.into_iter().flatten().collect::<Vec<_>>();
    Tensor::try_new(&data, [y_rows, y_cols, depth])
}
