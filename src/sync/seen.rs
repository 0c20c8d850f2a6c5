//! 1회성 효과 중복 방지 캐시
//!
//! 주문이 `paymentConfirmed`에 도달했을 때의 축하 연출 같은 1회성
//! 효과는 서버 이벤트가 없으므로 클라이언트가 스스로 "이미 봤다"를
//! 기억해야 합니다. 무한히 자라는 전역 집합 대신, 주문/거래 ID를
//! 키로 하는 용량 제한 캐시(FIFO 퇴출, 세션 수명)를 씁니다.

use std::collections::{HashSet, VecDeque};

/// 기본 보관 한도
pub const DEFAULT_SEEN_CAPACITY: usize = 256;

/// 용량 제한 seen-set
#[derive(Debug)]
pub struct SeenSet {
    capacity: usize,
    seen: HashSet<String>,
    insertion_order: VecDeque<String>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashSet::new(),
            insertion_order: VecDeque::new(),
        }
    }

    /// 처음 보는 키면 기록하고 `true`, 이미 본 키면 `false`
    ///
    /// 같은 확정 주문을 반복 폴링해도 효과는 최대 1회만 발동합니다.
    pub fn first_seen(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        if self.insertion_order.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.to_string());
        self.insertion_order.push_back(key.to_string());
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_fires_at_most_once() {
        let mut seen = SeenSet::default();
        assert!(seen.first_seen("order-1"));
        // 같은 주문의 반복 폴링
        assert!(!seen.first_seen("order-1"));
        assert!(!seen.first_seen("order-1"));
        assert!(seen.first_seen("order-2"));
    }

    #[test]
    fn test_capacity_is_bounded_with_fifo_eviction() {
        let mut seen = SeenSet::new(2);
        assert!(seen.first_seen("a"));
        assert!(seen.first_seen("b"));
        assert!(seen.first_seen("c")); // a 퇴출
        assert_eq!(seen.len(), 2);
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
    }
}
