//! 运行选项

use serde::{Deserialize, Serialize};

/// 运行模式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 只计划，不修改
    #[default]
    Preview,
    /// 计划并应用
    Push,
}

/// 默认同时处理的 zone 数
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Driver options for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOptions {
    pub mode: RunMode,
    /// 计划前先确保 zone 存在
    pub create_domains: bool,
    /// 单条 correction 失败后继续处理同一 zone 的其余 correction
    pub continue_on_error: bool,
    /// zone 级并发上限
    pub concurrency: usize,
    /// 只处理这些 zone；`None` 表示全部
    pub domains: Option<Vec<String>>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            create_domains: false,
            continue_on_error: true,
            concurrency: DEFAULT_CONCURRENCY,
            domains: None,
        }
    }
}

impl ReconcileOptions {
    #[must_use]
    pub fn push() -> Self {
        Self {
            mode: RunMode::Push,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = Some(domains);
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_create_domains(mut self, create_domains: bool) -> Self {
        self.create_domains = create_domains;
        self
    }
}
