//! 취소 권한 매트릭스
//!
//! (행위자 역할, 행위자 신원, 주문 상태)에 대한 순수 판정 함수.
//! 판매자에게는 직접 취소 경로가 없습니다 (수락/입금요청/확인만 가능).

use crate::error::{Result, TradeError};
use crate::trade::model::{Actor, CancellerRole, OrderStatus, Provenance, TradeOrder};

/// 행위자가 이 주문을 취소할 수 있는지 판정
///
/// 신원/역할 위반은 `Authorization`, 상태 위반은 `InvalidState`로
/// 구분해 반환합니다.
pub fn can_cancel(order: &TradeOrder, actor: &Actor) -> Result<()> {
  match actor.role {
    CancellerRole::Buyer => {
      // 주문을 생성한 구매자 본인만
      if actor.wallet_address != order.buyer_wallet_address {
        return Err(TradeError::Authorization(format!(
          "구매자 본인만 취소할 수 있습니다: {}",
          actor.wallet_address
        )));
      }
      require_payment_requested(order)
    }
    CancellerRole::Agent | CancellerRole::Admin => {
      // 에스크로 기반 개인거래만 대리 취소 허용
      if !order.private_sale {
        return Err(TradeError::Authorization(
          "개인거래 주문만 대리 취소할 수 있습니다".to_string(),
        ));
      }
      require_payment_requested(order)
    }
    CancellerRole::System => require_payment_requested(order),
  }
}

/// 취소는 `paymentRequested` 상태에서만 가능
fn require_payment_requested(order: &TradeOrder) -> Result<()> {
  if order.status != OrderStatus::PaymentRequested {
    return Err(TradeError::InvalidState {
      current: order.status.as_str().to_string(),
      expected: OrderStatus::PaymentRequested.as_str().to_string(),
    });
  }
  Ok(())
}

/// 취소 이력 레코드 생성
pub fn cancel_effect(actor: &Actor, ip_address: Option<String>) -> Provenance {
  Provenance {
    canceller: actor.role,
    cancelled_by_wallet_address: actor.wallet_address.clone(),
    cancelled_by_nickname: actor.nickname.clone(),
    cancelled_by_ip_address: ip_address,
  }
}
