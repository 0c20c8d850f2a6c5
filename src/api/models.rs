use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::models::TransferRecord;
use crate::trade::model::TradeOrder;

/// 주문 생성 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTradeRequest {
    pub buyer_wallet_address: String,
    pub seller_wallet_address: String,
    pub usdt_amount: Option<Decimal>,
    pub krw_amount: Option<i64>,
    pub agentcode: Option<String>,
    pub storecode: Option<String>,
}

/// 주문 생성 응답
#[derive(Debug, Serialize)]
pub struct CreateTradeResponse {
    pub result: bool,
    pub created: bool,
    pub order: TradeOrder,
}

/// 판매자 전이 요청 (수락 / 입금요청)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerActionRequest {
    pub order_id: String,
    pub seller_wallet_address: String,
}

/// 입금 확인 요청 (판매자 또는 관리자)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTradeRequest {
    pub order_id: String,
    pub seller_wallet_address: Option<String>,
    pub admin_wallet_address: Option<String>,
}

/// 전이 결과 응답
#[derive(Debug, Serialize)]
pub struct TradeOrderResponse {
    pub result: bool,
    pub order: TradeOrder,
}

/// 구매자 취소 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerCancelRequest {
    pub order_id: String,
    pub buyer_wallet_address: String,
    pub seller_wallet_address: String,
}

/// 구매자 취소 응답
#[derive(Debug, Serialize)]
pub struct BuyerCancelResponse {
    pub result: bool,
}

/// 관리자/에이전트 취소 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCancelRequest {
    pub order_id: String,
    pub admin_wallet_address: String,
    pub cancelled_by_role: String,
    pub cancelled_by_nickname: Option<String>,
}

/// 관리자/에이전트 취소 응답
#[derive(Debug, Serialize)]
pub struct AdminCancelResponse {
    pub result: AdminCancelResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCancelResult {
    pub success: bool,
    pub transaction_hash: Option<String>,
}

/// 거래 상태 조회 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStatusRequest {
    pub buyer_wallet_address: String,
    pub seller_wallet_address: String,
}

/// 거래 상태 조회 응답
#[derive(Debug, Serialize)]
pub struct TradeStatusResponse {
    pub result: TradeStatusResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStatusResult {
    pub is_trading: bool,
    pub status: Option<String>,
    pub order: Option<TradeOrder>,
}

/// 이력/목록 조회 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistoryRequest {
    pub wallet_address: Option<String>,
    pub agentcode: Option<String>,
    pub storecode: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search_term: Option<String>,
    pub statuses: Option<Vec<String>>,
}

/// 이력/목록 조회 응답
#[derive(Debug, Serialize)]
pub struct TradeHistoryResponse {
    pub result: TradeHistoryResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistoryResult {
    pub orders: Vec<TradeOrder>,
    pub total_count: i64,
}

/// 수납/출금 요청 (action별로 필요한 필드만 사용)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    pub wallet_address: String,
    pub amount: Option<Decimal>,
    pub to_wallet_address: Option<String>,
    pub from_wallet_address: Option<String>,
    pub transaction_id: Option<String>,
    pub limit: Option<i64>,
}

/// 수납/출금 응답
#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub result: CollectResult,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CollectResult {
    /// collect-balance
    Balance { amount: Decimal },
    /// collect / record-charge / collect-status / refresh-status
    Transfer(Box<TransferRecord>),
    /// collect-history
    History { transfers: Vec<TransferRecord> },
}

/// API 오류 응답
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
