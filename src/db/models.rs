use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::TradeError;
use crate::trade::model::{
    CancellerRole, OrderStatus, PaymentSnapshot, Provenance, TradeOrder,
};

/// 주문 DB 모델
///
/// 금액(Decimal)은 TEXT로 보관하고 경계에서 변환합니다.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub order_id: String,
    pub trade_id: String,
    pub buyer_wallet_address: String,
    pub seller_wallet_address: String,
    pub status: String,
    pub usdt_amount: String,
    pub krw_amount: i64,
    pub rate: String,
    pub platform_fee_rate: String,
    pub platform_fee_amount: String,
    pub platform_fee_wallet_address: String,
    pub private_sale: bool,
    pub agentcode: Option<String>,
    pub storecode: Option<String>,
    pub payment_method: Option<String>,
    pub payment_bank_name: Option<String>,
    pub payment_account_number: Option<String>,
    pub payment_account_holder: Option<String>,
    pub payment_contact_memo: Option<String>,
    pub is_contact_transfer: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub payment_requested_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub canceller: Option<String>,
    pub cancelled_by_wallet_address: Option<String>,
    pub cancelled_by_nickname: Option<String>,
    pub cancelled_by_ip_address: Option<String>,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, TradeError> {
    Decimal::from_str(value)
        .map_err(|e| TradeError::Internal(format!("{} 해석 실패 ({}): {}", field, value, e)))
}

impl OrderRow {
    /// 도메인 모델로 변환
    pub fn into_order(self) -> Result<TradeOrder, TradeError> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| TradeError::Internal(format!("알 수 없는 주문 상태: {}", self.status)))?;

        let payment = match (&self.payment_bank_name, &self.payment_account_number) {
            (Some(bank_name), Some(account_number)) => Some(PaymentSnapshot {
                payment_method: self.payment_method.clone().unwrap_or_default(),
                payment_bank_name: bank_name.clone(),
                payment_account_number: account_number.clone(),
                payment_account_holder: self.payment_account_holder.clone().unwrap_or_default(),
                payment_contact_memo: self.payment_contact_memo.clone().unwrap_or_default(),
                is_contact_transfer: self.is_contact_transfer.unwrap_or(false),
            }),
            _ => None,
        };

        let cancellation = match &self.canceller {
            Some(role) => Some(Provenance {
                canceller: CancellerRole::parse(role).ok_or_else(|| {
                    TradeError::Internal(format!("알 수 없는 취소 주체: {}", role))
                })?,
                cancelled_by_wallet_address: self
                    .cancelled_by_wallet_address
                    .clone()
                    .unwrap_or_default(),
                cancelled_by_nickname: self.cancelled_by_nickname.clone(),
                cancelled_by_ip_address: self.cancelled_by_ip_address.clone(),
            }),
            None => None,
        };

        Ok(TradeOrder {
            usdt_amount: parse_decimal("usdt_amount", &self.usdt_amount)?,
            rate: parse_decimal("rate", &self.rate)?,
            platform_fee_rate: parse_decimal("platform_fee_rate", &self.platform_fee_rate)?,
            platform_fee_amount: parse_decimal("platform_fee_amount", &self.platform_fee_amount)?,
            order_id: self.order_id,
            trade_id: self.trade_id,
            buyer_wallet_address: self.buyer_wallet_address,
            seller_wallet_address: self.seller_wallet_address,
            status,
            krw_amount: self.krw_amount,
            platform_fee_wallet_address: self.platform_fee_wallet_address,
            private_sale: self.private_sale,
            agentcode: self.agentcode,
            storecode: self.storecode,
            payment,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
            payment_requested_at: self.payment_requested_at,
            payment_confirmed_at: self.payment_confirmed_at,
            cancelled_at: self.cancelled_at,
            cancellation,
        })
    }
}

/// 수탁 전송 이력 DB 모델 (불변 원장)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransferRecord {
    pub transaction_id: String,
    pub transaction_hash: Option<String>,
    /// 이력이 귀속되는 지갑 (수수료 지갑 등)
    pub wallet: String,
    /// 전송 종류: reserve / settlement / fee / refund / collect / charge
    pub kind: String,
    pub status: String,
    pub amount: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    /// 수탁자 전송 결과를 이력 레코드로 변환
    pub fn from_result(
        result: &crate::escrow::custodian::TransferResult,
        wallet: &str,
        kind: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: result.transaction_id.clone(),
            transaction_hash: result.transaction_hash.clone(),
            wallet: wallet.to_string(),
            kind: kind.to_string(),
            status: result.status.as_str().to_string(),
            amount: result.amount.to_string(),
            from_wallet: result.from_wallet.clone(),
            to_wallet: result.to_wallet.clone(),
            error: result.error.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
