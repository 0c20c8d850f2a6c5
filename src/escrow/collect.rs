//! 수수료 지갑 수납/출금 흐름 (에이전트 운영 도구)
//!
//! 거래 정산과 별개로, 운영자가 플랫폼 지갑 사이에서 자금을 옮기는
//! 단순한 수탁 흐름입니다. 모든 전송 시도는 성공 여부와 무관하게
//! 불변 이력 원장에 남고, 상태 갱신은 몇 번을 불러도 안전합니다.
//! 실패한 전송은 자동 재시도하지 않습니다 (운영자 수동 재시도).

use std::sync::Arc;

use log::info;
use rust_decimal::Decimal;

use crate::db::models::TransferRecord;
use crate::db::repository::TransferLedger;
use crate::error::{Result, TradeError};
use crate::escrow::custodian::EscrowCustodian;

/// 수납/출금 서비스
pub struct CollectService {
    custodian: Arc<dyn EscrowCustodian>,
    ledger: Arc<TransferLedger>,
}

impl CollectService {
    pub fn new(custodian: Arc<dyn EscrowCustodian>, ledger: Arc<TransferLedger>) -> Self {
        Self { custodian, ledger }
    }

    /// collect-balance: 지갑의 현재 잔고
    pub async fn balance(&self, wallet: &str) -> Result<Decimal> {
        self.custodian.available_balance(wallet).await
    }

    /// collect: 지갑에서 수취 지갑으로 출금
    pub async fn collect(&self, wallet: &str, to_wallet: &str, amount: Decimal) -> Result<TransferRecord> {
        if amount <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "출금 금액은 0보다 커야 합니다: {}",
                amount
            )));
        }
        let result = self.custodian.transfer(amount, wallet, to_wallet).await?;
        let record = TransferRecord::from_result(&result, wallet, "collect");
        self.ledger.append(&record).await?;
        info!("출금 발행: {} ({} → {}, {})", record.transaction_id, wallet, to_wallet, amount);
        Ok(record)
    }

    /// record-charge: 지갑으로의 입금(충전) 기록
    pub async fn charge(&self, wallet: &str, from_wallet: &str, amount: Decimal) -> Result<TransferRecord> {
        if amount <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "충전 금액은 0보다 커야 합니다: {}",
                amount
            )));
        }
        let result = self.custodian.transfer(amount, from_wallet, wallet).await?;
        let record = TransferRecord::from_result(&result, wallet, "charge");
        self.ledger.append(&record).await?;
        info!("충전 기록: {} ({} → {}, {})", record.transaction_id, from_wallet, wallet, amount);
        Ok(record)
    }

    /// collect-status: 원장에 기록된 전송 조회
    pub async fn status(&self, transaction_id: &str) -> Result<TransferRecord> {
        self.ledger
            .find(transaction_id)
            .await?
            .ok_or_else(|| TradeError::Validation(format!("알 수 없는 전송: {}", transaction_id)))
    }

    /// refresh-status: 수탁자에서 최신 상태를 받아 원장에 반영 (멱등)
    ///
    /// 종결된 전송은 수탁자 조회 결과가 항상 같으므로 반복 호출해도
    /// 결과가 변하지 않습니다.
    pub async fn refresh_status(&self, transaction_id: &str) -> Result<TransferRecord> {
        // 원장에 없는 전송은 갱신 대상이 아니다
        let _ = self.status(transaction_id).await?;

        let latest = self.custodian.transfer_status(transaction_id).await?;
        self.ledger
            .update_status(
                transaction_id,
                latest.status.as_str(),
                latest.transaction_hash.as_deref(),
                latest.error.as_deref(),
            )
            .await?;
        self.status(transaction_id).await
    }

    /// collect-history: 지갑별 전송 이력 (최신순)
    pub async fn history(&self, wallet: &str, limit: i64) -> Result<Vec<TransferRecord>> {
        self.ledger.history(wallet, limit).await
    }
}
