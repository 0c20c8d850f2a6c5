//! 개인거래 주문의 기본 모델
//!
//! 이 모듈은 거래 주문, 주문 상태, 취소 주체, 결제 스냅샷 등
//! 거래 엔진의 핵심 데이터 모델을 정의합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 상태
///
/// `Ordered`, `Accepted`, `PaymentRequested`는 진행 중 상태,
/// `PaymentConfirmed`, `Cancelled`는 종결 상태입니다.
/// 종결 상태에서는 어떤 전이도 일어나지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
  /// 구매자가 주문 생성
  #[serde(rename = "ordered")]
  Ordered,
  /// 판매자가 주문 수락
  #[serde(rename = "accepted")]
  Accepted,
  /// 판매자가 입금 요청 (결제 창구 정보 고정)
  #[serde(rename = "paymentRequested")]
  PaymentRequested,
  /// 판매자가 입금 확인, 에스크로 정산 완료
  #[serde(rename = "paymentConfirmed")]
  PaymentConfirmed,
  /// 취소됨 (구매자/에이전트/관리자/시스템)
  #[serde(rename = "cancelled")]
  Cancelled,
}

impl OrderStatus {
  /// 종결 상태 여부
  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::PaymentConfirmed | OrderStatus::Cancelled)
  }

  /// DB/API에서 쓰는 상태 문자열
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Ordered => "ordered",
      OrderStatus::Accepted => "accepted",
      OrderStatus::PaymentRequested => "paymentRequested",
      OrderStatus::PaymentConfirmed => "paymentConfirmed",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  /// 상태 문자열 파싱
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "ordered" => Some(OrderStatus::Ordered),
      "accepted" => Some(OrderStatus::Accepted),
      "paymentRequested" => Some(OrderStatus::PaymentRequested),
      "paymentConfirmed" => Some(OrderStatus::PaymentConfirmed),
      "cancelled" => Some(OrderStatus::Cancelled),
      _ => None,
    }
  }
}

/// 취소 주체 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellerRole {
  /// 주문을 생성한 구매자 본인
  Buyer,
  /// 에이전트 (판매 관리 도구)
  Agent,
  /// 플랫폼 관리자
  Admin,
  /// 결제 시한 초과 자동 취소
  System,
}

impl CancellerRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      CancellerRole::Buyer => "buyer",
      CancellerRole::Agent => "agent",
      CancellerRole::Admin => "admin",
      CancellerRole::System => "system",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "buyer" => Some(CancellerRole::Buyer),
      "agent" => Some(CancellerRole::Agent),
      "admin" => Some(CancellerRole::Admin),
      "system" => Some(CancellerRole::System),
      _ => None,
    }
  }
}

/// 전이를 요청한 행위자
#[derive(Debug, Clone)]
pub struct Actor {
  /// 행위자 지갑 주소
  pub wallet_address: String,
  /// 표시용 닉네임
  pub nickname: Option<String>,
  /// 행위자 역할
  pub role: CancellerRole,
}

impl Actor {
  /// 구매자 행위자 생성
  pub fn buyer(wallet_address: &str) -> Self {
    Self {
      wallet_address: wallet_address.to_string(),
      nickname: None,
      role: CancellerRole::Buyer,
    }
  }

  /// 시스템 행위자 (자동 취소 스윕 전용)
  pub fn system() -> Self {
    Self {
      wallet_address: "system".to_string(),
      nickname: Some("auto-cancel".to_string()),
      role: CancellerRole::System,
    }
  }
}

/// 판매자의 결제 창구 정보
///
/// `request_payment` 시점에 주문에 스냅샷으로 고정되며,
/// 이후 판매자가 계좌 정보를 수정해도 주문에는 반영되지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSnapshot {
  pub payment_method: String,
  pub payment_bank_name: String,
  pub payment_account_number: String,
  pub payment_account_holder: String,
  pub payment_contact_memo: String,
  /// 계좌이체 대신 연락 후 직접 전달 방식 여부
  pub is_contact_transfer: bool,
}

/// 취소 이력 (누가, 어떤 권한으로 취소했는지)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
  pub canceller: CancellerRole,
  pub cancelled_by_wallet_address: String,
  pub cancelled_by_nickname: Option<String>,
  pub cancelled_by_ip_address: Option<String>,
}

/// 개인거래 주문
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOrder {
  /// 주문 고유 ID (엔진 발급, 불변)
  pub order_id: String,
  /// 사용자 노출용 짧은 거래 코드 (불변)
  pub trade_id: String,
  /// 구매자 지갑 주소
  pub buyer_wallet_address: String,
  /// 판매자 지갑 주소
  pub seller_wallet_address: String,
  /// 주문 상태
  pub status: OrderStatus,
  /// USDT 수량 (소수점 최대 6자리, 변환 시 2자리 절사)
  pub usdt_amount: Decimal,
  /// KRW 금액 (항상 정수)
  pub krw_amount: i64,
  /// 적용 환율 (1 USDT당 KRW)
  pub rate: Decimal,
  /// 플랫폼 수수료율
  pub platform_fee_rate: Decimal,
  /// 플랫폼 수수료 금액 (USDT)
  pub platform_fee_amount: Decimal,
  /// 수수료 수취 지갑 주소
  pub platform_fee_wallet_address: String,
  /// 에스크로 기반 개인거래 여부 (마켓플레이스 주문과 구분)
  pub private_sale: bool,
  /// 에이전트 코드 (에이전트 경유 주문)
  pub agentcode: Option<String>,
  /// 가맹점 코드
  pub storecode: Option<String>,
  /// 결제 창구 스냅샷 (`paymentRequested` 진입 시 고정)
  #[serde(flatten)]
  pub payment: Option<PaymentSnapshot>,
  pub created_at: DateTime<Utc>,
  pub accepted_at: Option<DateTime<Utc>>,
  pub payment_requested_at: Option<DateTime<Utc>>,
  pub payment_confirmed_at: Option<DateTime<Utc>>,
  pub cancelled_at: Option<DateTime<Utc>>,
  /// 취소 이력 (`cancelled` 상태에서만 존재)
  #[serde(flatten)]
  pub cancellation: Option<Provenance>,
}

impl TradeOrder {
  /// 진행 중(미종결) 주문 여부
  pub fn is_active(&self) -> bool {
    !self.status.is_terminal()
  }
}
