//! 共享测试工具和辅助函数

#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use dns_converge_provider::{
    ChangeSet, DnsProvider, DomainConfig, ProviderCredentials, Record, RecordType, create_provider,
};

/// 跳过测试的宏（当环境变量缺失时）
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("跳过测试: 缺少环境变量 {}", $var);
                return;
            }
        )+
    };
}

/// 断言 `Option` 为 `Some`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            unreachable!();
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let opt = $expr;
        assert!(opt.is_some(), "{}", format_args!($($msg)+));
        let Some(val) = opt else {
            unreachable!();
        };
        val
    }};
}

/// 断言 `Result` 为 `Ok`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            unreachable!();
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            unreachable!();
        };
        val
    }};
}

pub const ORIGIN: &str = "example.com";

/// 解析一条测试记录；测试数据必须合法
pub fn rec(label: &str, rtype: RecordType, ttl: u32, rdata: &str) -> Record {
    match Record::parse(label, ORIGIN, ttl, rtype, rdata) {
        Ok(r) => r,
        Err(e) => panic!("bad test record {label} {rtype} {rdata}: {e}"),
    }
}

/// `(unchanged, create, delete, modify)` 计数
pub fn counts(cs: &ChangeSet) -> (usize, usize, usize, usize) {
    (
        cs.unchanged.len(),
        cs.create.len(),
        cs.delete.len(),
        cs.modify.len(),
    )
}

/// 排序后的记录展示形式，用于集合比较
pub fn rendered<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<String> {
    let mut out: Vec<String> = records.map(ToString::to_string).collect();
    out.sort();
    out
}

pub fn zone(records: Vec<Record>) -> DomainConfig {
    DomainConfig::new(ORIGIN).with_records(records)
}

/// 生成唯一的测试记录名称
pub fn generate_test_record_name() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("_test-{}", &uuid.to_string()[..8])
}

/// 测试上下文 - 封装 Provider 和测试域名
pub struct TestContext {
    pub provider: Arc<dyn DnsProvider>,
    pub domain: String,
}

impl TestContext {
    /// 创建 Cloudflare 测试上下文
    pub fn cloudflare() -> Option<Self> {
        let api_token = env::var("CLOUDFLARE_API_TOKEN").ok()?;
        let domain = env::var("TEST_DOMAIN").ok()?;

        let credentials = ProviderCredentials::Cloudflare {
            api_token,
            account_id: env::var("CLOUDFLARE_ACCOUNT_ID").ok(),
            endpoint_url: None,
        };
        let provider = create_provider(credentials).ok()?;

        Some(Self { provider, domain })
    }
}
