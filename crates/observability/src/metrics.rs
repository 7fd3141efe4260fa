//! 中继指标记录模块
//!
//! 所有指标名以 `relay_` 为前缀，通过 `metrics` facade 记录；
//! 未安装 recorder 时这些调用为空操作。

use metrics::{counter, histogram};

/// 记录消息处理结果 (dispatched / discarded / failed)
pub fn record_message(outcome: &'static str) {
    counter!("relay_messages_total", "outcome" => outcome).increment(1);
}

/// 记录被丢弃的消息
///
/// `reason`: `rate_limited` | `malformed_payload`
pub fn record_discarded(reason: &'static str) {
    counter!("relay_messages_discarded_total", "reason" => reason).increment(1);
}

/// 记录 handler 失败
pub fn record_handler_error(handler: &str) {
    counter!(
        "relay_handler_errors_total",
        "handler" => handler.to_string()
    )
    .increment(1);
}

/// 记录一次存储刷新
///
/// `mode`: `per_message` | `interval` | `final`
pub fn record_flush(mode: &'static str, success: bool, commands: usize) {
    let status = if success { "success" } else { "failure" };
    counter!("relay_flushes_total", "mode" => mode, "status" => status).increment(1);
    if success {
        counter!("relay_commands_flushed_total").increment(commands as u64);
    }
}

/// 记录单条消息的分发耗时
pub fn record_dispatch_latency(seconds: f64) {
    histogram!("relay_dispatch_duration_seconds").record(seconds);
}

/// 记录路由成功写入存储的消息数
///
/// 仅在对应的 flush 成功后调用。
pub fn record_routed(route: &str, messages: u64) {
    counter!("relay_routed_total", "route" => route.to_string()).increment(messages);
}

/// 记录投递结果
///
/// `outcome`: `acked` | `requeued` | `exhausted`
pub fn record_delivery(outcome: &'static str) {
    counter!("relay_deliveries_total", "outcome" => outcome).increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
