//! 工具函数模块

pub mod idn;
