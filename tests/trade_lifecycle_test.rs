//! 거래 수명주기 통합 테스트
//!
//! 주문 생성부터 입금 확인/자동 취소까지 전체 흐름을 실제 저장소
//! (메모리 SQLite)와 메모리 수탁자를 붙여 검증합니다.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePool;

use xescrow::chat::ChatBootstrap;
use xescrow::db::init_database;
use xescrow::db::repository::{SqliteOrderStore, TransferLedger};
use xescrow::error::Result;
use xescrow::escrow::collect::CollectService;
use xescrow::escrow::custodian::{EscrowCustodian, MemoryCustodian, TransferStatus};
use xescrow::trade::engine::{CreateOrderRequest, TradeEngine};
use xescrow::trade::model::{Actor, CancellerRole, OrderStatus, PaymentSnapshot};
use xescrow::trade::rate::{PriceSetting, RateConverter, RateSource};
use xescrow::trade::seller::{MemorySellerDirectory, SellerProfile};

const BUYER: &str = "0xBUYER";
const SELLER: &str = "0xSELLER";
const FEE_WALLET: &str = "0xFEE";
const PENDING_WALLET: &str = "0xPENDING";

struct StubRate(Decimal);

#[async_trait]
impl RateSource for StubRate {
    async fn latest_rate(&self, _market: &str) -> Result<Decimal> {
        Ok(self.0)
    }
}

struct TestHarness {
    engine: TradeEngine,
    custodian: Arc<MemoryCustodian>,
    sellers: Arc<MemorySellerDirectory>,
    ledger: Arc<TransferLedger>,
    pool: SqlitePool,
}

fn bank_info(bank_name: &str) -> PaymentSnapshot {
    PaymentSnapshot {
        payment_method: "bank".to_string(),
        payment_bank_name: bank_name.to_string(),
        payment_account_number: "110-222-333444".to_string(),
        payment_account_holder: "김판매".to_string(),
        payment_contact_memo: String::new(),
        is_contact_transfer: false,
    }
}

async fn harness() -> TestHarness {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let store = Arc::new(SqliteOrderStore::new(pool.clone()));
    let ledger = Arc::new(TransferLedger::new(pool.clone()));

    let custodian = Arc::new(MemoryCustodian::new());
    custodian.set_balance(SELLER, dec!(1000)).await;

    let sellers = Arc::new(MemorySellerDirectory::new());
    sellers
        .register(
            SELLER,
            SellerProfile {
                price_setting: PriceSetting::Fixed(dec!(1400)),
                bank_info: Some(bank_info("국민은행")),
            },
        )
        .await;

    let engine = TradeEngine::new(
        store,
        custodian.clone(),
        sellers.clone(),
        Arc::new(RateConverter::new(Arc::new(StubRate(dec!(1400))))),
        ledger.clone(),
        Arc::new(ChatBootstrap::new(Some("chat-app".to_string()))),
        dec!(0.01),
        FEE_WALLET.to_string(),
        PENDING_WALLET.to_string(),
    );

    TestHarness {
        engine,
        custodian,
        sellers,
        ledger,
        pool,
    }
}

fn create_req(usdt: Decimal) -> CreateOrderRequest {
    CreateOrderRequest {
        buyer_wallet_address: BUYER.to_string(),
        seller_wallet_address: SELLER.to_string(),
        usdt_amount: Some(usdt),
        krw_amount: None,
        agentcode: None,
        storecode: None,
    }
}

/// 생성 → 수락 → 입금요청 → 입금확인 전체 시나리오
#[tokio::test]
async fn test_full_lifecycle_to_confirmation() {
    let h = harness().await;

    // 구매자 B가 판매자 S에게 10 USDT 주문 (환율 1400)
    let (order, created) = h.engine.create_order(create_req(dec!(10))).await.unwrap();
    assert!(created);
    assert_eq!(order.status, OrderStatus::Ordered);
    assert_eq!(order.krw_amount, 14_000);

    // 진행 중에는 재생성이 같은 주문으로 수렴
    let (again, created) = h.engine.create_order(create_req(dec!(25))).await.unwrap();
    assert!(!created);
    assert_eq!(again.order_id, order.order_id);

    // 판매자 수락 후 입금 요청
    h.engine.accept(&order.order_id, SELLER).await.unwrap();
    let requested = h.engine.request_payment(&order.order_id, SELLER).await.unwrap();
    assert_eq!(requested.status, OrderStatus::PaymentRequested);
    assert!(requested.payment_requested_at.is_some());
    assert_eq!(
        requested.payment.as_ref().unwrap().payment_bank_name,
        "국민은행"
    );

    // 판매자가 이후 계좌를 바꿔도 주문의 스냅샷은 고정
    h.sellers
        .register(
            SELLER,
            SellerProfile {
                price_setting: PriceSetting::Fixed(dec!(1400)),
                bank_info: Some(bank_info("신한은행")),
            },
        )
        .await;

    // 입금 확인 → 정산
    let confirmed = h
        .engine
        .confirm_payment(&order.order_id, SELLER, false)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::PaymentConfirmed);
    assert!(confirmed.payment_confirmed_at.is_some());
    assert_eq!(
        confirmed.payment.as_ref().unwrap().payment_bank_name,
        "국민은행"
    );

    // 정산은 정확히 1회: 예치 1건 + 구매자 정산 1건 + 수수료 1건
    let transfers = h.custodian.ledger().await;
    assert_eq!(transfers.len(), 3);

    // 구매자는 수수료를 뺀 금액, 수수료 지갑은 수수료를 받는다
    assert_eq!(h.custodian.available_balance(BUYER).await.unwrap(), dec!(9.9));
    assert_eq!(h.custodian.available_balance(FEE_WALLET).await.unwrap(), dec!(0.1));

    // 종결 후에는 같은 쌍의 새 주문이 허용된다
    let (next, created) = h.engine.create_order(create_req(dec!(5))).await.unwrap();
    assert!(created);
    assert_ne!(next.order_id, order.order_id);

    // 확정 주문에 대한 입금확인 재시도는 경합 패배와 같은 에러
    let replay = h.engine.confirm_payment(&order.order_id, SELLER, false).await;
    assert!(replay.is_err());
}

/// 구매자 취소: 본인 + paymentRequested 상태에서만
#[tokio::test]
async fn test_buyer_cancel_rules() {
    let h = harness().await;
    let (order, _) = h.engine.create_order(create_req(dec!(10))).await.unwrap();
    h.engine.accept(&order.order_id, SELLER).await.unwrap();

    // accepted 상태에서는 취소 불가
    let too_early = h
        .engine
        .cancel(&order.order_id, &Actor::buyer(BUYER), None)
        .await;
    assert!(too_early.is_err());

    h.engine.request_payment(&order.order_id, SELLER).await.unwrap();

    // 다른 지갑의 구매자 취소는 거부
    let stranger = h
        .engine
        .cancel(&order.order_id, &Actor::buyer("0xSTRANGER"), None)
        .await;
    assert!(stranger.is_err());

    // 본인 취소는 성공하고 예치 금액이 판매자에게 돌아간다
    let (cancelled, _) = h
        .engine
        .cancel(&order.order_id, &Actor::buyer(BUYER), None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.custodian.available_balance(SELLER).await.unwrap(), dec!(1000));

    // 종결 상태는 단방향: 이후 어떤 전이도 불가
    assert!(h.engine.accept(&order.order_id, SELLER).await.is_err());
    assert!(h
        .engine
        .confirm_payment(&order.order_id, SELLER, false)
        .await
        .is_err());
}

/// 관리자 대리 취소: 어떤 구매자의 주문이든 개인거래라면 가능
#[tokio::test]
async fn test_admin_cancel_with_provenance() {
    let h = harness().await;
    let (order, _) = h.engine.create_order(create_req(dec!(10))).await.unwrap();
    h.engine.accept(&order.order_id, SELLER).await.unwrap();
    h.engine.request_payment(&order.order_id, SELLER).await.unwrap();

    let admin = Actor {
        wallet_address: "0xADMIN".to_string(),
        nickname: Some("운영자".to_string()),
        role: CancellerRole::Admin,
    };
    let (cancelled, refund) = h
        .engine
        .cancel(&order.order_id, &admin, Some("203.0.113.9".to_string()))
        .await
        .unwrap();

    let prov = cancelled.cancellation.unwrap();
    assert_eq!(prov.canceller, CancellerRole::Admin);
    assert_eq!(prov.cancelled_by_wallet_address, "0xADMIN");
    assert_eq!(prov.cancelled_by_nickname.as_deref(), Some("운영자"));
    assert_eq!(prov.cancelled_by_ip_address.as_deref(), Some("203.0.113.9"));
    assert!(refund.transaction_hash.is_some());
}

/// 결제 시한(30분) 초과 주문의 서버측 자동 취소
#[tokio::test]
async fn test_expired_payment_request_is_swept() {
    let h = harness().await;
    let (order, _) = h.engine.create_order(create_req(dec!(10))).await.unwrap();
    h.engine.accept(&order.order_id, SELLER).await.unwrap();
    h.engine.request_payment(&order.order_id, SELLER).await.unwrap();

    // 시한 안에는 스윕 대상이 아니다
    assert_eq!(h.engine.sweep_expired().await.unwrap(), 0);

    // 입금요청 시각을 31분 전으로 되돌린다
    let stale = chrono::Utc::now() - chrono::Duration::minutes(31);
    sqlx::query("UPDATE orders SET payment_requested_at = ? WHERE order_id = ?")
        .bind(stale)
        .bind(&order.order_id)
        .execute(&h.pool)
        .await
        .unwrap();

    assert_eq!(h.engine.sweep_expired().await.unwrap(), 1);

    let status = h.engine.get_trade_status(BUYER, SELLER).await.unwrap();
    assert!(!status.is_trading);

    // 시스템 권한 취소 이력 + 판매자 환불 확인
    let (orders, _) = h
        .engine
        .list_orders(&xescrow::trade::store::OrderFilter {
            wallet_address: Some(BUYER.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let swept = orders.iter().find(|o| o.order_id == order.order_id).unwrap();
    assert_eq!(swept.status, OrderStatus::Cancelled);
    assert_eq!(swept.cancellation.as_ref().unwrap().canceller, CancellerRole::System);
    assert_eq!(h.custodian.available_balance(SELLER).await.unwrap(), dec!(1000));
}

/// 수수료 지갑 수납/출금 흐름과 불변 이력 원장
#[tokio::test]
async fn test_collect_flow_and_ledger() {
    let h = harness().await;
    let collect = CollectService::new(h.custodian.clone(), h.ledger.clone());

    h.custodian.set_balance("0xOPERATOR", dec!(500)).await;

    // 충전 기록 후 출금
    let charge = collect.charge(FEE_WALLET, "0xOPERATOR", dec!(300)).await.unwrap();
    assert_eq!(charge.kind, "charge");
    assert_eq!(collect.balance(FEE_WALLET).await.unwrap(), dec!(300));

    let withdrawal = collect.collect(FEE_WALLET, "0xCOLD", dec!(100)).await.unwrap();
    assert_eq!(withdrawal.kind, "collect");
    assert_eq!(collect.balance(FEE_WALLET).await.unwrap(), dec!(200));

    // 상태 갱신은 멱등: 반복 호출해도 같은 결과
    let refreshed1 = collect.refresh_status(&withdrawal.transaction_id).await.unwrap();
    let refreshed2 = collect.refresh_status(&withdrawal.transaction_id).await.unwrap();
    assert_eq!(refreshed1.status, TransferStatus::Confirmed.as_str());
    assert_eq!(refreshed2.status, refreshed1.status);
    assert_eq!(refreshed2.transaction_hash, refreshed1.transaction_hash);

    // 지갑별 이력은 최신순으로 모두 남는다
    let history = collect.history(FEE_WALLET, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].transaction_id, withdrawal.transaction_id);
    assert_eq!(history[1].transaction_id, charge.transaction_id);
}
