//! 에스크로 수탁자 인터페이스
//!
//! 온체인 전송은 외부 시스템이 수행하며, 엔진은 전송을 발행하고
//! `transaction_id`로 상태를 폴링하는 비동기 계약만 사용합니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, TradeError};

/// 상태 확인 폴링 최대 횟수
pub const TRANSFER_POLL_ATTEMPTS: u32 = 20;
/// 상태 확인 폴링 간격
pub const TRANSFER_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// 수탁 전송 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Queued,
    Processing,
    Confirmed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Queued => "QUEUED",
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Confirmed => "CONFIRMED",
            TransferStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(TransferStatus::Queued),
            "PROCESSING" => Some(TransferStatus::Processing),
            "CONFIRMED" => Some(TransferStatus::Confirmed),
            "FAILED" => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    /// 더 이상 상태가 바뀌지 않는지
    pub fn is_final(&self) -> bool {
        matches!(self, TransferStatus::Confirmed | TransferStatus::Failed)
    }
}

/// 전송 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub transaction_id: String,
    pub transaction_hash: Option<String>,
    pub status: TransferStatus,
    pub amount: Decimal,
    pub from_wallet: String,
    pub to_wallet: String,
    /// 실패 시 표시/감사용 메시지
    pub error: Option<String>,
}

/// 에스크로 수탁자 인터페이스
#[async_trait]
pub trait EscrowCustodian: Send + Sync {
    /// 지갑의 현재 가용 에스크로 잔고 (표시 수치가 아닌 실제 잔고)
    async fn available_balance(&self, wallet: &str) -> Result<Decimal>;

    /// 지갑 간 온체인 전송 발행
    async fn transfer(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult>;

    /// 전송 상태 조회 (멱등: 종결된 전송은 항상 같은 결과)
    async fn transfer_status(&self, transaction_id: &str) -> Result<TransferResult>;

    /// 주문 생성 시 판매자 잔고에서 거래 금액 예치
    async fn reserve(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult> {
        self.transfer(amount, from, to).await
    }

    /// 취소 시 에스크로 금액을 판매자에게 반환
    async fn return_funds(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult> {
        self.transfer(amount, from, to).await
    }

    /// 입금 확인 시 토큰 정산 (에스크로 → 구매자/수수료 지갑)
    async fn settle(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult> {
        self.transfer(amount, from, to).await
    }
}

/// 전송이 종결될 때까지 제한된 횟수만 상태를 폴링
///
/// 종결 상태(`CONFIRMED`/`FAILED`)에 도달하면 그 결과를 그대로
/// 돌려주고, 횟수를 넘기면 무한 대기 대신 `TransferPending`으로
/// "처리 중"을 알립니다. 실패 여부 해석은 호출자의 몫입니다.
pub async fn wait_for_transfer(
    custodian: &dyn EscrowCustodian,
    transaction_id: &str,
) -> Result<TransferResult> {
    for attempt in 0..TRANSFER_POLL_ATTEMPTS {
        let result = custodian.transfer_status(transaction_id).await?;
        if result.status.is_final() {
            return Ok(result);
        }
        if attempt + 1 < TRANSFER_POLL_ATTEMPTS {
            tokio::time::sleep(TRANSFER_POLL_INTERVAL).await;
        }
    }
    warn!("전송 상태 확인 제한 초과: {}", transaction_id);
    Err(TradeError::TransferPending {
        transaction_id: transaction_id.to_string(),
    })
}

/// 메모리 기반 수탁자 (로컬 실행/테스트용)
///
/// 전송은 발행 즉시 잔고에 반영되고 `QUEUED`로 기록되며, 다음 상태
/// 조회에서 `CONFIRMED`로 진행합니다. 모든 전송 시도는 성공 여부와
/// 무관하게 원장에 남습니다.
pub struct MemoryCustodian {
    balances: RwLock<HashMap<String, Decimal>>,
    transfers: RwLock<HashMap<String, TransferResult>>,
    ledger: RwLock<Vec<TransferResult>>,
    /// 테스트용: 다음 전송을 강제로 실패시킴
    fail_next: RwLock<Option<String>>,
}

impl MemoryCustodian {
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            transfers: RwLock::new(HashMap::new()),
            ledger: RwLock::new(Vec::new()),
            fail_next: RwLock::new(None),
        }
    }

    /// 지갑 잔고 설정
    pub async fn set_balance(&self, wallet: &str, amount: Decimal) {
        self.balances.write().await.insert(wallet.to_string(), amount);
    }

    /// 다음 전송을 지정한 메시지로 실패 처리 (테스트용)
    pub async fn fail_next_transfer(&self, message: &str) {
        *self.fail_next.write().await = Some(message.to_string());
    }

    /// 전체 전송 원장 (불변 이력)
    pub async fn ledger(&self) -> Vec<TransferResult> {
        self.ledger.read().await.clone()
    }

    async fn execute(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult> {
        let transaction_id = Uuid::new_v4().to_string();

        if let Some(message) = self.fail_next.write().await.take() {
            let failed = TransferResult {
                transaction_id: transaction_id.clone(),
                transaction_hash: None,
                status: TransferStatus::Failed,
                amount,
                from_wallet: from.to_string(),
                to_wallet: to.to_string(),
                error: Some(message),
            };
            self.transfers.write().await.insert(transaction_id, failed.clone());
            self.ledger.write().await.push(failed.clone());
            return Ok(failed);
        }

        {
            let mut balances = self.balances.write().await;
            let from_balance = balances.get(from).copied().unwrap_or(Decimal::ZERO);
            if from_balance < amount {
                let failed = TransferResult {
                    transaction_id: transaction_id.clone(),
                    transaction_hash: None,
                    status: TransferStatus::Failed,
                    amount,
                    from_wallet: from.to_string(),
                    to_wallet: to.to_string(),
                    error: Some(format!("잔고 부족: {} < {}", from_balance, amount)),
                };
                self.transfers.write().await.insert(transaction_id, failed.clone());
                self.ledger.write().await.push(failed.clone());
                return Ok(failed);
            }
            balances.insert(from.to_string(), from_balance - amount);
            let to_balance = balances.get(to).copied().unwrap_or(Decimal::ZERO);
            balances.insert(to.to_string(), to_balance + amount);
        }

        let result = TransferResult {
            transaction_id: transaction_id.clone(),
            transaction_hash: Some(format!("0x{}", Uuid::new_v4().simple())),
            status: TransferStatus::Queued,
            amount,
            from_wallet: from.to_string(),
            to_wallet: to.to_string(),
            error: None,
        };
        info!("전송 발행: {} ({} → {}, {})", transaction_id, from, to, amount);
        self.transfers.write().await.insert(transaction_id, result.clone());
        self.ledger.write().await.push(result.clone());
        Ok(result)
    }
}

impl Default for MemoryCustodian {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscrowCustodian for MemoryCustodian {
    async fn available_balance(&self, wallet: &str) -> Result<Decimal> {
        Ok(self.balances.read().await.get(wallet).copied().unwrap_or(Decimal::ZERO))
    }

    async fn transfer(&self, amount: Decimal, from: &str, to: &str) -> Result<TransferResult> {
        self.execute(amount, from, to).await
    }

    async fn transfer_status(&self, transaction_id: &str) -> Result<TransferResult> {
        let mut transfers = self.transfers.write().await;
        let entry = transfers.get_mut(transaction_id).ok_or_else(|| {
            TradeError::Validation(format!("알 수 없는 전송: {}", transaction_id))
        })?;
        // 대기 중 전송은 조회 시점에 확정으로 진행 (종결 상태는 그대로)
        if !entry.status.is_final() {
            entry.status = TransferStatus::Confirmed;
        }
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_transfer_moves_balance_and_confirms() {
        let custodian = MemoryCustodian::new();
        custodian.set_balance("escrow-S", dec!(100)).await;

        let result = custodian.return_funds(dec!(10), "escrow-S", "seller-S").await.unwrap();
        assert_eq!(result.status, TransferStatus::Queued);
        assert_eq!(custodian.available_balance("escrow-S").await.unwrap(), dec!(90));
        assert_eq!(custodian.available_balance("seller-S").await.unwrap(), dec!(10));

        let status = custodian.transfer_status(&result.transaction_id).await.unwrap();
        assert_eq!(status.status, TransferStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_confirmed_status_is_idempotent() {
        let custodian = MemoryCustodian::new();
        custodian.set_balance("a", dec!(5)).await;
        let result = custodian.settle(dec!(5), "a", "b").await.unwrap();

        let first = custodian.transfer_status(&result.transaction_id).await.unwrap();
        let second = custodian.transfer_status(&result.transaction_id).await.unwrap();
        assert_eq!(first.status, TransferStatus::Confirmed);
        assert_eq!(second.status, first.status);
        assert_eq!(second.transaction_hash, first.transaction_hash);
        assert_eq!(second.amount, first.amount);
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_recorded_as_failed() {
        let custodian = MemoryCustodian::new();
        let result = custodian.settle(dec!(1), "empty", "b").await.unwrap();
        assert_eq!(result.status, TransferStatus::Failed);
        assert!(result.error.is_some());

        // 실패한 전송도 원장에 남는다
        let ledger = custodian.ledger().await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].status, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn test_wait_for_transfer_reports_final_failure() {
        let custodian = MemoryCustodian::new();
        custodian.fail_next_transfer("네트워크 거부").await;
        let result = custodian.settle(dec!(1), "a", "b").await.unwrap();

        let settled = wait_for_transfer(&custodian, &result.transaction_id).await.unwrap();
        assert_eq!(settled.status, TransferStatus::Failed);
        assert!(settled.error.is_some());
    }

    #[tokio::test]
    async fn test_wait_for_transfer_resolves_pending_to_confirmed() {
        let custodian = MemoryCustodian::new();
        custodian.set_balance("a", dec!(5)).await;
        let issued = custodian.settle(dec!(5), "a", "b").await.unwrap();
        assert_eq!(issued.status, TransferStatus::Queued);

        let settled = wait_for_transfer(&custodian, &issued.transaction_id).await.unwrap();
        assert_eq!(settled.status, TransferStatus::Confirmed);
    }
}
