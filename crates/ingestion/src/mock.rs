//! Mock 消息源
//!
//! 按顺序回放固定的消息，用于测试。

use std::collections::VecDeque;

use bytes::Bytes;
use contracts::{ContractError, Delivery, MessageId, MessageSource};
use tracing::trace;

/// 回放结束后的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnEmpty {
    /// 返回 `None`
    End,
    /// 永远挂起，直到外部关闭
    Hang,
    /// 返回读取错误
    Fail,
}

/// Mock 消息源
#[derive(Debug)]
pub struct MockSource {
    name: String,
    queue: VecDeque<Delivery>,
    on_empty: OnEmpty,
}

impl MockSource {
    /// 回放给定的 deliveries
    pub fn new(name: impl Into<String>, deliveries: impl IntoIterator<Item = Delivery>) -> Self {
        Self {
            name: name.into(),
            queue: deliveries.into_iter().collect(),
            on_empty: OnEmpty::End,
        }
    }

    /// 回放给定的消息体，ID 按顺序分配
    pub fn from_bodies<B>(name: impl Into<String>, bodies: impl IntoIterator<Item = B>) -> Self
    where
        B: Into<Bytes>,
    {
        let deliveries = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Delivery::new(MessageId::from_sequence(i as u64 + 1), body));
        Self::new(name, deliveries)
    }

    /// 回放完毕后挂起而不是结束
    pub fn endless(mut self) -> Self {
        self.on_empty = OnEmpty::Hang;
        self
    }

    /// 回放完毕后返回读取错误
    pub fn fail_at_end(mut self) -> Self {
        self.on_empty = OnEmpty::Fail;
        self
    }

    /// 剩余消息数
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl MessageSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Result<Option<Delivery>, ContractError> {
        if let Some(delivery) = self.queue.pop_front() {
            trace!(message_id = %delivery.id, "mock delivery");
            return Ok(Some(delivery));
        }

        match self.on_empty {
            OnEmpty::End => Ok(None),
            OnEmpty::Hang => std::future::pending().await,
            OnEmpty::Fail => Err(ContractError::Other("mock source failure".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let mut source = MockSource::from_bodies("m", ["{\"n\":1}", "{\"n\":2}"]);
        assert_eq!(source.remaining(), 2);

        let first = source.next().await.unwrap().unwrap();
        assert_eq!(first.id, MessageId::from_sequence(1));
        let second = source.next().await.unwrap().unwrap();
        assert_eq!(second.body, Bytes::from_static(b"{\"n\":2}"));

        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_at_end() {
        let mut source = MockSource::from_bodies("m", Vec::<&'static str>::new()).fail_at_end();
        assert!(source.next().await.is_err());
    }
}
