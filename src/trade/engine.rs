//! 거래 수명주기 엔진
//!
//! 개인거래 주문의 모든 상태 전이를 소유합니다. 전이는 전부 저장소의
//! 조건부 갱신(CAS)으로 수행되어, 서로 다른 클라이언트 세션에서
//! 같은 주문을 동시에 조작해도 한 쪽만 성공하고 나머지는
//! `InvalidState`를 받습니다. 주문 생성의 멱등 동작 자체가
//! 동시성 제어입니다: 같은 구매자의 경합하는 생성 호출은
//! 하나의 주문으로 수렴합니다.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{error, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::chat::ChatBootstrap;
use crate::db::models::TransferRecord;
use crate::db::repository::TransferLedger;
use crate::error::{Result, TradeError};
use crate::escrow::custodian::{
  wait_for_transfer, EscrowCustodian, TransferResult, TransferStatus,
};
use crate::trade::authority::{can_cancel, cancel_effect};
use crate::trade::model::{Actor, OrderStatus, TradeOrder};
use crate::trade::rate::{convert_from_krw, convert_from_usdt, PriceSetting, Quote, RateConverter};
use crate::trade::seller::SellerDirectory;
use crate::trade::store::{OrderFilter, OrderStore, OrderUpdate};

/// 주문 1건의 USDT 상한
pub const MAX_USDT_AMOUNT: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// 입금요청 후 결제 시한 (분)
pub const PAYMENT_WINDOW_MINUTES: i64 = 30;

/// 주문 생성 요청
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
  pub buyer_wallet_address: String,
  pub seller_wallet_address: String,
  /// USDT/KRW 중 하나만 주면 나머지는 환율로 유도
  pub usdt_amount: Option<Decimal>,
  pub krw_amount: Option<i64>,
  pub agentcode: Option<String>,
  pub storecode: Option<String>,
}

/// `get_trade_status` 결과
#[derive(Debug, Clone)]
pub struct TradeStatus {
  pub is_trading: bool,
  pub order: Option<TradeOrder>,
}

/// 거래 수명주기 엔진
pub struct TradeEngine {
  store: Arc<dyn OrderStore>,
  custodian: Arc<dyn EscrowCustodian>,
  sellers: Arc<dyn SellerDirectory>,
  rates: Arc<RateConverter>,
  ledger: Arc<TransferLedger>,
  chat: Arc<ChatBootstrap>,
  /// 플랫폼 수수료율
  fee_rate: Decimal,
  /// 수수료 수취 지갑
  fee_wallet: String,
  /// 예치 중 금액을 보관하는 플랫폼 지갑
  pending_wallet: String,
}

impl TradeEngine {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    store: Arc<dyn OrderStore>,
    custodian: Arc<dyn EscrowCustodian>,
    sellers: Arc<dyn SellerDirectory>,
    rates: Arc<RateConverter>,
    ledger: Arc<TransferLedger>,
    chat: Arc<ChatBootstrap>,
    fee_rate: Decimal,
    fee_wallet: String,
    pending_wallet: String,
  ) -> Self {
    Self {
      store,
      custodian,
      sellers,
      rates,
      ledger,
      chat,
      fee_rate,
      fee_wallet,
      pending_wallet,
    }
  }

  /// 주문 생성
  ///
  /// 같은 (구매자, 판매자) 쌍에 진행 중 주문이 있으면 새로 만들지 않고
  /// 기존 주문을 `created = false`로 돌려줍니다.
  pub async fn create_order(&self, req: CreateOrderRequest) -> Result<(TradeOrder, bool)> {
    if req.buyer_wallet_address.is_empty() || req.seller_wallet_address.is_empty() {
      return Err(TradeError::Validation("지갑 주소는 필수입니다".to_string()));
    }
    if req.buyer_wallet_address == req.seller_wallet_address {
      return Err(TradeError::SelfTrade);
    }
    if req.usdt_amount.is_none() && req.krw_amount.is_none() {
      return Err(TradeError::Validation(
        "usdtAmount 또는 krwAmount 중 하나는 필요합니다".to_string(),
      ));
    }

    // 진행 중 주문이 있으면 멱등 반환
    if let Some(existing) = self
      .store
      .find_active_by_pair(&req.buyer_wallet_address, &req.seller_wallet_address)
      .await?
    {
      info!(
        "진행 중 주문 재사용: {} ({} ↔ {})",
        existing.order_id, req.buyer_wallet_address, req.seller_wallet_address
      );
      return Ok((existing, false));
    }

    // 판매자 설정에서 유효 환율 결정
    let price_setting = match self.sellers.profile(&req.seller_wallet_address).await? {
      Some(profile) => profile.price_setting,
      None => PriceSetting::Market { source: None },
    };
    let rate = self.rates.effective_rate(&price_setting).await?;

    // 금액 유도 (USDT가 있으면 USDT 우선)
    let quote: Quote = match (req.usdt_amount, req.krw_amount) {
      (Some(usdt), _) => convert_from_usdt(usdt, rate)?,
      (None, Some(krw)) => convert_from_krw(krw, rate)?,
      (None, None) => unreachable!(),
    };

    if quote.usdt_amount <= Decimal::ZERO {
      return Err(TradeError::Validation(format!(
        "USDT 수량은 0보다 커야 합니다: {}",
        quote.usdt_amount
      )));
    }
    if quote.usdt_amount > MAX_USDT_AMOUNT {
      return Err(TradeError::Validation(format!(
        "USDT 수량 상한 초과: {} > {}",
        quote.usdt_amount, MAX_USDT_AMOUNT
      )));
    }

    // 판매자 에스크로 실잔고 검증 (화면 표시 수치가 아님)
    let available = self
      .custodian
      .available_balance(&req.seller_wallet_address)
      .await?;
    if quote.usdt_amount > available {
      return Err(TradeError::InsufficientSellerLiquidity {
        requested: quote.usdt_amount.to_string(),
        available: available.to_string(),
      });
    }

    let order = TradeOrder {
      order_id: Uuid::new_v4().to_string(),
      trade_id: new_trade_id(),
      buyer_wallet_address: req.buyer_wallet_address.clone(),
      seller_wallet_address: req.seller_wallet_address.clone(),
      status: OrderStatus::Ordered,
      usdt_amount: quote.usdt_amount,
      krw_amount: quote.krw_amount,
      rate: quote.rate,
      platform_fee_rate: self.fee_rate,
      platform_fee_amount: (quote.usdt_amount * self.fee_rate).trunc_with_scale(6),
      platform_fee_wallet_address: self.fee_wallet.clone(),
      private_sale: true,
      agentcode: req.agentcode,
      storecode: req.storecode,
      payment: None,
      created_at: Utc::now(),
      accepted_at: None,
      payment_requested_at: None,
      payment_confirmed_at: None,
      cancelled_at: None,
      cancellation: None,
    };

    if !self.store.insert_new(&order).await? {
      // 경합하는 생성 호출이 먼저 들어간 경우: 그 주문으로 수렴
      let existing = self
        .store
        .find_active_by_pair(&req.buyer_wallet_address, &req.seller_wallet_address)
        .await?
        .ok_or_else(|| TradeError::Internal("진행 중 주문 조회 실패".to_string()))?;
      return Ok((existing, false));
    }

    // 거래 금액 예치 (판매자 잔고 → 플랫폼 보관 지갑)
    let reserve = self
      .custodian
      .reserve(
        order.usdt_amount,
        &order.seller_wallet_address,
        &self.pending_wallet,
      )
      .await?;
    let reserve = self
      .track_transfer(reserve, &order.seller_wallet_address, "reserve")
      .await?;
    if reserve.status == TransferStatus::Failed {
      // 예치 실패 시 주문을 남겨두지 않는다 (시스템 취소)
      let update = OrderUpdate::Cancel {
        at: Utc::now(),
        provenance: cancel_effect(&Actor::system(), None),
      };
      self
        .store
        .transition(&order.order_id, OrderStatus::Ordered, update)
        .await?;
      return Err(TradeError::InsufficientSellerLiquidity {
        requested: order.usdt_amount.to_string(),
        available: available.to_string(),
      });
    }

    // 채팅 채널 준비 (실패/비활성은 거래를 막지 않음)
    if let Some(channel) = self
      .chat
      .provision(&order.buyer_wallet_address, &order.seller_wallet_address)
      .await
    {
      info!("채팅 채널 준비됨: {}", channel);
    }

    info!(
      "주문 생성: {} ({} USDT / {} KRW, 환율 {})",
      order.order_id, order.usdt_amount, order.krw_amount, order.rate
    );
    Ok((order, true))
  }

  /// 판매자의 주문 수락 (`ordered` → `accepted`)
  pub async fn accept(&self, order_id: &str, seller_wallet: &str) -> Result<TradeOrder> {
    let order = self.require_order(order_id).await?;
    if order.seller_wallet_address != seller_wallet {
      return Err(TradeError::Authorization(
        "판매자 본인만 수락할 수 있습니다".to_string(),
      ));
    }
    let updated = self
      .store
      .transition(order_id, OrderStatus::Ordered, OrderUpdate::Accept { at: Utc::now() })
      .await?;
    info!("주문 수락: {}", order_id);
    Ok(updated)
  }

  /// 판매자의 입금 요청 (`accepted` → `paymentRequested`)
  ///
  /// 이 시점의 판매자 결제 창구 정보가 주문에 스냅샷으로 고정됩니다.
  pub async fn request_payment(&self, order_id: &str, seller_wallet: &str) -> Result<TradeOrder> {
    let order = self.require_order(order_id).await?;
    if order.seller_wallet_address != seller_wallet {
      return Err(TradeError::Authorization(
        "판매자 본인만 입금 요청할 수 있습니다".to_string(),
      ));
    }

    let profile = self
      .sellers
      .profile(seller_wallet)
      .await?
      .ok_or_else(|| TradeError::Validation("판매자 프로필이 없습니다".to_string()))?;
    let payment = profile
      .bank_info
      .ok_or_else(|| TradeError::Validation("판매자 결제 창구 정보가 없습니다".to_string()))?;

    let updated = self
      .store
      .transition(
        order_id,
        OrderStatus::Accepted,
        OrderUpdate::RequestPayment { at: Utc::now(), payment },
      )
      .await?;
    info!("입금 요청: {} (시한 {}분)", order_id, PAYMENT_WINDOW_MINUTES);
    Ok(updated)
  }

  /// 입금 확인 (`paymentRequested` → `paymentConfirmed`)
  ///
  /// CAS 전이에서 이긴 호출만 정산을 발행하므로 정산은 정확히 1회
  /// 일어납니다. 전이 후의 전송 실패는 주문을 되돌리지 않고
  /// 원장에 남아 운영자의 수동 재시도 대상이 됩니다.
  pub async fn confirm_payment(
    &self,
    order_id: &str,
    requester_wallet: &str,
    admin: bool,
  ) -> Result<TradeOrder> {
    let order = self.require_order(order_id).await?;
    if !admin && order.seller_wallet_address != requester_wallet {
      return Err(TradeError::Authorization(
        "판매자 또는 관리자만 입금을 확인할 수 있습니다".to_string(),
      ));
    }
    if order.status != OrderStatus::PaymentRequested {
      return Err(TradeError::InvalidState {
        current: order.status.as_str().to_string(),
        expected: OrderStatus::PaymentRequested.as_str().to_string(),
      });
    }

    // 정산 전 예치 잔고 재검증 (생성 시점 검증만 믿지 않는다)
    let held = self.custodian.available_balance(&self.pending_wallet).await?;
    if held < order.usdt_amount {
      return Err(TradeError::InsufficientSellerLiquidity {
        requested: order.usdt_amount.to_string(),
        available: held.to_string(),
      });
    }

    let updated = self
      .store
      .transition(
        order_id,
        OrderStatus::PaymentRequested,
        OrderUpdate::ConfirmPayment { at: Utc::now() },
      )
      .await?;

    // 정산: 구매자 몫 + 플랫폼 수수료
    let buyer_amount = order.usdt_amount - order.platform_fee_amount;
    let settlement = self
      .custodian
      .settle(buyer_amount, &self.pending_wallet, &order.buyer_wallet_address)
      .await?;
    let settlement = self
      .track_transfer(settlement, &order.seller_wallet_address, "settlement")
      .await?;

    if order.platform_fee_amount > Decimal::ZERO {
      let fee = self
        .custodian
        .settle(order.platform_fee_amount, &self.pending_wallet, &self.fee_wallet)
        .await?;
      let fee = self.track_transfer(fee, &self.fee_wallet, "fee").await?;
      if fee.status == TransferStatus::Failed {
        error!("수수료 정산 실패: {} ({:?})", order_id, fee.error);
      }
    }

    if settlement.status == TransferStatus::Failed {
      error!("정산 전송 실패: {} ({:?})", order_id, settlement.error);
      return Err(TradeError::TransferFailed(
        settlement.error.unwrap_or_else(|| "원인 불명".to_string()),
      ));
    }

    info!("입금 확인 및 정산 발행: {} ({} USDT)", order_id, order.usdt_amount);
    Ok(updated)
  }

  /// 주문 취소
  ///
  /// 권한 매트릭스를 통과하면 `cancelled` CAS 전이를 먼저 수행하고,
  /// 전이에서 이긴 호출만 에스크로 금액을 판매자에게 반환합니다.
  /// 경합하는 입금확인과는 어느 한 쪽만 CAS를 이기므로, 진 쪽은
  /// 에스크로를 건드리지 못하고 `InvalidState`로 끝납니다.
  /// 반환된 전송 결과는 관리자 응답의 transactionHash로 쓰입니다.
  pub async fn cancel(
    &self,
    order_id: &str,
    actor: &Actor,
    ip_address: Option<String>,
  ) -> Result<(TradeOrder, TransferResult)> {
    let order = self.require_order(order_id).await?;
    can_cancel(&order, actor)?;

    let update = OrderUpdate::Cancel {
      at: Utc::now(),
      provenance: cancel_effect(actor, ip_address),
    };
    let updated = self
      .store
      .transition(order_id, OrderStatus::PaymentRequested, update)
      .await?;

    let refund = self
      .custodian
      .return_funds(
        order.usdt_amount,
        &self.pending_wallet,
        &order.seller_wallet_address,
      )
      .await?;
    let refund = self
      .track_transfer(refund, &order.seller_wallet_address, "refund")
      .await?;
    if refund.status == TransferStatus::Failed {
      // 주문은 이미 취소 확정. 실패한 환불은 원장에 남아
      // 운영자 수동 재시도 대상이 된다.
      error!("취소 환불 실패: {} ({:?})", order_id, refund.error);
      return Err(TradeError::TransferFailed(
        refund.error.unwrap_or_else(|| "원인 불명".to_string()),
      ));
    }

    info!(
      "주문 취소: {} (주체: {}, {})",
      order_id,
      actor.role.as_str(),
      actor.wallet_address
    );
    Ok((updated, refund))
  }

  /// 구매자 취소 (주문의 거래 쌍 교차 검증 포함)
  ///
  /// 요청에 실린 (구매자, 판매자) 쌍이 주문의 쌍과 다르면 권한 판정
  /// 이전에 거부합니다.
  pub async fn cancel_by_buyer(
    &self,
    order_id: &str,
    buyer_wallet: &str,
    seller_wallet: &str,
    ip_address: Option<String>,
  ) -> Result<(TradeOrder, TransferResult)> {
    let order = self.require_order(order_id).await?;
    if order.buyer_wallet_address != buyer_wallet
      || order.seller_wallet_address != seller_wallet
    {
      return Err(TradeError::Validation(
        "주문의 거래 쌍이 요청과 일치하지 않습니다".to_string(),
      ));
    }
    self.cancel(order_id, &Actor::buyer(buyer_wallet), ip_address).await
  }

  /// (구매자, 판매자) 쌍의 거래 상태 조회
  pub async fn get_trade_status(&self, buyer: &str, seller: &str) -> Result<TradeStatus> {
    let order = self.store.find_active_by_pair(buyer, seller).await?;
    Ok(TradeStatus {
      is_trading: order.is_some(),
      order,
    })
  }

  /// 이력/목록 조회
  pub async fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<TradeOrder>, i64)> {
    self.store.list(filter).await
  }

  /// 결제 시한을 넘긴 `paymentRequested` 주문 자동 취소 스윕
  ///
  /// 클라이언트 카운트다운은 표시일 뿐이고, 실제 만료는 여기서
  /// 시스템 권한으로 집행됩니다. 취소된 건수를 반환합니다.
  pub async fn sweep_expired(&self) -> Result<usize> {
    let cutoff = Utc::now() - Duration::minutes(PAYMENT_WINDOW_MINUTES);
    let expired = self.store.find_expired_payment_requests(cutoff).await?;
    let mut cancelled = 0;

    for order in expired {
      match self.cancel(&order.order_id, &Actor::system(), None).await {
        Ok(_) => {
          warn!(
            "결제 시한 초과 자동 취소: {} (입금요청 {})",
            order.order_id,
            order
              .payment_requested_at
              .map(|t| t.to_rfc3339())
              .unwrap_or_default()
          );
          cancelled += 1;
        }
        // 스윕 도중 다른 주체가 먼저 종결시킨 주문은 건너뛴다
        Err(TradeError::InvalidState { .. }) => continue,
        Err(e) => {
          error!("자동 취소 실패: {} - {}", order.order_id, e);
        }
      }
    }

    Ok(cancelled)
  }

  /// 전송을 원장에 기록하고 종결 상태까지 추적
  ///
  /// 발행 직후 종결이 아니면 수탁자 상태를 제한 횟수만큼 폴링해
  /// 최종 결과를 원장에 반영합니다. 제한 안에 종결을 확인하지 못하면
  /// `TransferPending` (원장에는 발행 시점 상태가 남습니다).
  async fn track_transfer(
    &self,
    issued: TransferResult,
    wallet: &str,
    kind: &str,
  ) -> Result<TransferResult> {
    self
      .ledger
      .append(&TransferRecord::from_result(&issued, wallet, kind))
      .await?;
    if issued.status.is_final() {
      return Ok(issued);
    }

    let settled = wait_for_transfer(self.custodian.as_ref(), &issued.transaction_id).await?;
    self
      .ledger
      .update_status(
        &issued.transaction_id,
        settled.status.as_str(),
        settled.transaction_hash.as_deref(),
        settled.error.as_deref(),
      )
      .await?;
    Ok(settled)
  }

  async fn require_order(&self, order_id: &str) -> Result<TradeOrder> {
    self
      .store
      .find_by_id(order_id)
      .await?
      .ok_or_else(|| TradeError::Validation(format!("주문을 찾을 수 없습니다: {}", order_id)))
  }
}

/// 사용자 노출용 짧은 거래 코드 생성
fn new_trade_id() -> String {
  let raw = Uuid::new_v4().simple().to_string();
  format!("T{}", &raw[..7].to_uppercase())
}
