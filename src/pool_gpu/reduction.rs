use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// 池化的归约策略：窗口、寻址与补零逻辑对各种池化完全相同，只有单位元与合并方式不同。
/// 每个策略同时给出主机端实现与着色器中的WGSL表达式，两者必须逐一对应。
#[enum_dispatch]
pub trait ReduceOp {
    fn name(&self) -> &'static str;

    /// 单位元：参与归约也不会改变结果的值，越界（补零）采样即按它处理
    fn identity(&self) -> f32;

    fn combine(&self, acc: f32, value: f32) -> f32;

    /// `count`为窗口内落在输入范围中的采样数
    fn finalize(&self, acc: f32, count: u32) -> f32;

    /// 以`acc`、`value`为变量的WGSL表达式
    fn wgsl_combine(&self) -> &'static str;

    /// 以`acc`、`count`为变量的WGSL表达式
    fn wgsl_finalize(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinReduce;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaxReduce;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvgReduce;

impl ReduceOp for MinReduce {
    fn name(&self) -> &'static str {
        "min"
    }

    fn identity(&self) -> f32 {
        f32::INFINITY
    }

    fn combine(&self, acc: f32, value: f32) -> f32 {
        acc.min(value)
    }

    fn finalize(&self, acc: f32, _count: u32) -> f32 {
        acc
    }

    fn wgsl_combine(&self) -> &'static str {
        "min(acc, value)"
    }

    fn wgsl_finalize(&self) -> &'static str {
        "acc"
    }
}

impl ReduceOp for MaxReduce {
    fn name(&self) -> &'static str {
        "max"
    }

    fn identity(&self) -> f32 {
        f32::NEG_INFINITY
    }

    fn combine(&self, acc: f32, value: f32) -> f32 {
        acc.max(value)
    }

    fn finalize(&self, acc: f32, _count: u32) -> f32 {
        acc
    }

    fn wgsl_combine(&self) -> &'static str {
        "max(acc, value)"
    }

    fn wgsl_finalize(&self) -> &'static str {
        "acc"
    }
}

/// 平均池化只对落在输入范围内的采样求平均；窗口完全落在补零区时结果为0
impl ReduceOp for AvgReduce {
    fn name(&self) -> &'static str {
        "avg"
    }

    fn identity(&self) -> f32 {
        0.0
    }

    fn combine(&self, acc: f32, value: f32) -> f32 {
        acc + value
    }

    fn finalize(&self, acc: f32, count: u32) -> f32 {
        if count == 0 {
            0.0
        } else {
            acc / count as f32
        }
    }

    fn wgsl_combine(&self) -> &'static str {
        "acc + value"
    }

    fn wgsl_finalize(&self) -> &'static str {
        "select(0.0, acc / f32(count), count > 0u)"
    }
}

#[enum_dispatch(ReduceOp)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reduction {
    Min(MinReduce),
    Max(MaxReduce),
    Avg(AvgReduce),
}

impl Reduction {
    pub const MIN: Reduction = Reduction::Min(MinReduce);
    pub const MAX: Reduction = Reduction::Max(MaxReduce);
    pub const AVG: Reduction = Reduction::Avg(AvgReduce);
}
