use thiserror::Error;
mod ops;
pub use self::ops::*;

/// 池化算子（含纹理布局计算、着色器程序生成与执行上下文）的统一错误类型。
/// 所有错误都源自确定性的配置或资源状态，因此对当次操作而言都是终止性的，不做任何重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // 数字比较用：池化参数（窗口、步长、补零）或由其推导出的输出尺寸不合法
    #[error("池化参数无效：{value_name}须{operator}{threshold}，实际为{actual}")]
    InvalidConfig {
        value_name: String,
        operator: ComparisonOperator,
        threshold: i64,
        actual: i64,
    },
    // 调用方提供的纹理/张量尺寸与布局计算得出的尺寸不一致
    #[error("形状不一致：期望{expected:?}，实际为{got:?}。{message}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },
    #[error("着色器程序编译失败：{0}")]
    CompilationError(String),
    #[error("未知（或已释放）的GPU资源句柄：{0}")]
    UnknownResource(String),
    #[error("GPU执行上下文错误：{0}")]
    Device(String),
}

impl PoolError {
    /// 构造“`value_name`须`operator``threshold`”形式的参数错误
    pub(crate) fn invalid_config(
        value_name: &str,
        operator: ComparisonOperator,
        threshold: i64,
        actual: i64,
    ) -> Self {
        PoolError::InvalidConfig {
            value_name: value_name.to_string(),
            operator,
            threshold,
            actual,
        }
    }

    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize], message: &str) -> Self {
        PoolError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
            message: message.to_string(),
        }
    }
}
