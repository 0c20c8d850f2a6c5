//! 주문 저장소 인터페이스
//!
//! 엔진은 저장소에 조건부 갱신(CAS)만 발행합니다. 현재 상태가 기대한
//! 선행 상태와 다르면 갱신은 0건으로 끝나고 `InvalidState`가 됩니다.
//! 경합에서 진 쪽이 이 에러를 받는 것이 동시성 모델의 핵심입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::trade::model::{OrderStatus, PaymentSnapshot, Provenance, TradeOrder};

/// 상태 전이 시 함께 기록할 필드
#[derive(Debug, Clone)]
pub enum OrderUpdate {
  /// `ordered` → `accepted`
  Accept { at: DateTime<Utc> },
  /// `accepted` → `paymentRequested` (결제 창구 스냅샷 고정)
  RequestPayment {
    at: DateTime<Utc>,
    payment: PaymentSnapshot,
  },
  /// `paymentRequested` → `paymentConfirmed`
  ConfirmPayment { at: DateTime<Utc> },
  /// 임의 진행 상태 → `cancelled` (취소 이력 포함)
  Cancel {
    at: DateTime<Utc>,
    provenance: Provenance,
  },
}

impl OrderUpdate {
  /// 전이 결과 상태
  pub fn target_status(&self) -> OrderStatus {
    match self {
      OrderUpdate::Accept { .. } => OrderStatus::Accepted,
      OrderUpdate::RequestPayment { .. } => OrderStatus::PaymentRequested,
      OrderUpdate::ConfirmPayment { .. } => OrderStatus::PaymentConfirmed,
      OrderUpdate::Cancel { .. } => OrderStatus::Cancelled,
    }
  }
}

/// 목록/이력 조회 필터
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
  /// 구매자 또는 판매자 지갑 주소
  pub wallet_address: Option<String>,
  pub agentcode: Option<String>,
  pub storecode: Option<String>,
  /// 거래 코드/지갑 주소 부분 일치 검색
  pub search_term: Option<String>,
  /// 비어 있으면 전체 상태
  pub statuses: Vec<OrderStatus>,
  pub page: u32,
  pub limit: u32,
}

/// 주문 레코드 보관자 인터페이스
#[async_trait]
pub trait OrderStore: Send + Sync {
  /// 새 주문 저장
  ///
  /// 같은 (구매자, 판매자) 쌍에 진행 중 주문이 이미 있으면 저장하지
  /// 않고 `false`를 반환합니다 (부분 유니크 인덱스가 경합까지 차단).
  async fn insert_new(&self, order: &TradeOrder) -> Result<bool>;

  /// 주문 ID로 조회
  async fn find_by_id(&self, order_id: &str) -> Result<Option<TradeOrder>>;

  /// (구매자, 판매자) 쌍의 진행 중 주문 조회
  async fn find_active_by_pair(&self, buyer: &str, seller: &str) -> Result<Option<TradeOrder>>;

  /// 조건부 상태 전이 (compare-and-swap)
  ///
  /// 현재 상태가 `expected`일 때만 갱신하고 갱신된 주문을 돌려줍니다.
  /// 갱신이 0건이면 `InvalidState`.
  async fn transition(
    &self,
    order_id: &str,
    expected: OrderStatus,
    update: OrderUpdate,
  ) -> Result<TradeOrder>;

  /// 결제 시한을 넘긴 `paymentRequested` 주문 조회 (자동 취소 스윕용)
  async fn find_expired_payment_requests(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeOrder>>;

  /// 이력/목록 조회 (페이지네이션 포함, 총 건수 함께 반환)
  async fn list(&self, filter: &OrderFilter) -> Result<(Vec<TradeOrder>, i64)>;
}
