//! 运行报告

use chrono::{DateTime, Utc};
use serde::Serialize;

use dns_converge_provider::ErrorKind;

use super::options::RunMode;
use crate::error::ZoneError;

/// 进程退出码：成功
pub const EXIT_OK: u8 = 0;
/// 进程退出码：至少一个 zone 失败
pub const EXIT_ZONE_FAILED: u8 = 1;
/// 进程退出码：配置或校验错误
pub const EXIT_INVALID: u8 = 2;

/// 单条 correction 的结果
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CorrectionStatus {
    /// preview 模式下只计划
    Planned,
    Applied,
    Failed,
    /// 因前序失败 / 取消未执行，或仅为提示信息
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionOutcome {
    pub message: String,
    pub status: CorrectionStatus,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CorrectionOutcome {
    pub fn new(message: impl Into<String>, status: CorrectionStatus, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status,
            retryable,
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// zone 整体结论
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ZoneStatus {
    /// 全部 correction 成功（或 preview 完成）
    Ok,
    /// 有 correction 失败，或读取/创建 zone 失败
    Failed,
    /// 校验失败，未做任何修改
    Invalid,
}

/// 一个 `(zone, provider)` 组合的报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneReport {
    pub zone: String,
    pub provider: String,
    pub status: ZoneStatus,
    /// differ 给出的结构性变更数
    pub change_count: usize,
    pub corrections: Vec<CorrectionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ZoneReport {
    pub fn new(zone: &str, provider: &str) -> Self {
        let now = Utc::now();
        Self {
            zone: zone.to_string(),
            provider: provider.to_string(),
            status: ZoneStatus::Ok,
            change_count: 0,
            corrections: Vec::new(),
            error: None,
            error_kind: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// 记录 zone 级错误；校验类错误标记为 `Invalid`
    pub fn fail(&mut self, err: &ZoneError) {
        let kind = err.kind();
        self.status = if kind == ErrorKind::Validation {
            ZoneStatus::Invalid
        } else {
            ZoneStatus::Failed
        };
        self.error = Some(err.to_string());
        self.error_kind = Some(kind);
    }

    pub fn finish(&mut self) {
        if self.status == ZoneStatus::Ok && (self.failed() > 0 || self.cancelled() > 0) {
            self.status = ZoneStatus::Failed;
        }
        self.finished_at = Utc::now();
    }

    fn count(&self, status: CorrectionStatus) -> usize {
        self.corrections.iter().filter(|c| c.status == status).count()
    }

    pub fn planned(&self) -> usize {
        self.count(CorrectionStatus::Planned)
    }

    pub fn applied(&self) -> usize {
        self.count(CorrectionStatus::Applied)
    }

    pub fn failed(&self) -> usize {
        self.count(CorrectionStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(CorrectionStatus::Skipped)
    }

    pub fn cancelled(&self) -> usize {
        self.count(CorrectionStatus::Cancelled)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// 一次运行的完整报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub zones: Vec<ZoneReport>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            started_at: now,
            finished_at: now,
            zones: Vec::new(),
        }
    }

    /// 按 `(zone, provider)` 排序后收尾
    pub fn finish(&mut self, mut zones: Vec<ZoneReport>) {
        zones.sort_by(|a, b| (&a.zone, &a.provider).cmp(&(&b.zone, &b.provider)));
        self.zones = zones;
        self.finished_at = Utc::now();
    }

    pub fn change_count(&self) -> usize {
        self.zones.iter().map(|z| z.change_count).sum()
    }

    /// 0 成功；1 有 zone 失败；2 有 zone 校验失败
    pub fn exit_code(&self) -> u8 {
        if self.zones.iter().any(|z| z.status == ZoneStatus::Invalid) {
            EXIT_INVALID
        } else if self.zones.iter().any(|z| z.status == ZoneStatus::Failed) {
            EXIT_ZONE_FAILED
        } else {
            EXIT_OK
        }
    }
}
