//! 폴링 재조정 루프
//!
//! 서버는 엣지 트리거 이벤트를 내보내지 않으므로 모든 클라이언트
//! 화면은 폴링으로 상태를 따라갑니다. 화면마다 제각기 타이머와
//! 플래그를 만들지 않도록, 취소 가능한 폴링 루프 프리미티브 하나를
//! 모든 화면이 동일하게 사용합니다.
//!
//! 규칙:
//! - 이전 사이클이 끝나기 전에는 새 요청을 시작하지 않는다
//! - 폴링 오류는 로그만 남기고 삼킨다 (다음 성공 폴링이 자연 복구)
//! - 루프가 중단된 뒤 완료된 응답은 버린다 (스테일 반영 금지)
//! - 응답은 항상 "마지막으로 안 진실"로 덮어쓴다

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 진행 중 주문이 있는 동안의 거래 상태 폴링 주기
pub const TRADE_STATUS_INTERVAL: Duration = Duration::from_secs(5);
/// 잔고 표시 폴링 주기 (거래 상태와 독립)
pub const BALANCE_INTERVAL: Duration = Duration::from_secs(10);
/// 입금요청 주문이 떠 있는 동안의 이력 폴링 주기
pub const HISTORY_ACTIVE_INTERVAL: Duration = Duration::from_secs(4);
/// 평상시 이력 폴링 주기
pub const HISTORY_IDLE_INTERVAL: Duration = Duration::from_secs(15);

/// 이력 화면 폴링 주기 선택
///
/// 결제 시한이 걸린 주문이 보이는 동안만 짧은 주기를 씁니다.
pub fn history_interval(payment_requested_active: bool) -> Duration {
    if payment_requested_active {
        HISTORY_ACTIVE_INTERVAL
    } else {
        HISTORY_IDLE_INTERVAL
    }
}

/// 취소 가능한 폴링 루프
///
/// `fetch`가 성공하면 `apply`로 전달하고, 실패는 로그 후 무시합니다.
/// 루프는 `stop()` 또는 핸들 드롭 전까지 백그라운드에서 돕니다.
pub struct PollLoop {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PollLoop {
    /// 폴링 루프 시작
    pub fn spawn<F, Fut, T, E, A>(name: &str, interval: Duration, mut fetch: F, mut apply: A) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
        T: Send + 'static,
        E: Display + Send + 'static,
        A: FnMut(T) + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let alive_flag = alive.clone();
        let name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 밀린 틱을 몰아서 쏘지 않는다: 직전 사이클이 아직 돌고 있던
            // 구간의 틱은 건너뛴다 (중복 동시 요청 방지)
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !alive_flag.load(Ordering::Acquire) {
                    break;
                }

                match fetch().await {
                    Ok(value) => {
                        // 중단된 루프의 응답은 반영하지 않는다
                        if !alive_flag.load(Ordering::Acquire) {
                            break;
                        }
                        apply(value);
                    }
                    Err(e) => {
                        // 일시 오류로 화면을 막지 않는다
                        debug!("폴링 오류 무시 [{}]: {}", name, e);
                    }
                }
            }
        });

        Self { alive, handle }
    }

    /// 루프 중단 (진행 중 요청의 결과는 버려짐)
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.handle.abort();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.handle.is_finished()
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_poll_loop_applies_successes() {
        let applied = Arc::new(AtomicU32::new(0));
        let applied_clone = applied.clone();

        let poll = PollLoop::spawn(
            "test",
            Duration::from_millis(10),
            || async { Ok::<_, String>(1u32) },
            move |v| {
                applied_clone.fetch_add(v, Ordering::SeqCst);
            },
        );

        sleep(Duration::from_millis(100)).await;
        poll.stop();
        assert!(applied.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_poll_loop_swallows_errors_and_continues() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let applied = Arc::new(AtomicU32::new(0));
        let applied_clone = applied.clone();

        let poll = PollLoop::spawn(
            "test",
            Duration::from_millis(10),
            move || {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n % 2 == 0 {
                        Err("일시 오류".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            move |_| {
                applied_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        sleep(Duration::from_millis(100)).await;
        poll.stop();
        // 오류가 섞여도 루프는 계속 돌고 성공만 반영된다
        assert!(calls.load(Ordering::SeqCst) >= 4);
        assert!(applied.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_no_overlapping_fetches() {
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));
        let in_flight_clone = in_flight.clone();
        let max_clone = max_seen.clone();

        let poll = PollLoop::spawn(
            "test",
            Duration::from_millis(5),
            move || {
                let in_flight = in_flight_clone.clone();
                let max_seen = max_clone.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    // 폴링 주기보다 오래 걸리는 요청
                    sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            },
            |_| {},
        );

        sleep(Duration::from_millis(120)).await;
        poll.stop();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stopped_loop_discards_results() {
        let applied = Arc::new(AtomicU32::new(0));
        let applied_clone = applied.clone();

        let poll = PollLoop::spawn(
            "test",
            Duration::from_millis(5),
            || async {
                sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(())
            },
            move |_| {
                applied_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        // 첫 요청이 끝나기 전에 중단
        sleep(Duration::from_millis(15)).await;
        poll.stop();
        sleep(Duration::from_millis(80)).await;
        assert_eq!(applied.load(Ordering::SeqCst), 0);
        assert!(!poll.is_alive());
    }

    #[test]
    fn test_history_interval_selection() {
        assert_eq!(history_interval(true), HISTORY_ACTIVE_INTERVAL);
        assert_eq!(history_interval(false), HISTORY_IDLE_INTERVAL);
    }
}
