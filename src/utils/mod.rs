//! # 常用接口模块
//!
//! 本模块提供测试中常用的断言工具

#[cfg(test)]
mod tests;

pub mod macro_for_unit_test;
pub mod test_util;
