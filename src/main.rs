use std::sync::Arc;

use log::info;
use rust_decimal::Decimal;

use xescrow::escrow::custodian::MemoryCustodian;
use xescrow::server::{start_server, ServerConfig};
use xescrow::trade::model::PaymentSnapshot;
use xescrow::trade::rate::PriceSetting;
use xescrow::trade::seller::{MemorySellerDirectory, SellerProfile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경 변수 로드 및 로거 초기화
    dotenv::dotenv().ok();
    env_logger::init();

    let config = ServerConfig::from_env();

    // 외부 협력자 연결
    // 온체인 수탁자/판매자 디렉터리 연동 전까지는 메모리 구현으로 기동
    let custodian = Arc::new(MemoryCustodian::new());
    let sellers = Arc::new(MemorySellerDirectory::new());
    seed_local_fixtures(&custodian, &sellers).await;

    info!("로컬 수탁자/판매자 디렉터리로 기동합니다");

    start_server(config, custodian, sellers)
        .await
        .map_err(|e| anyhow::anyhow!("서버 실행 실패: {}", e))
}

/// 로컬 실행용 테스트 데이터
async fn seed_local_fixtures(custodian: &MemoryCustodian, sellers: &MemorySellerDirectory) {
    let seller = std::env::var("SEED_SELLER_WALLET").unwrap_or_default();
    if seller.is_empty() {
        return;
    }

    custodian.set_balance(&seller, Decimal::from(10_000)).await;
    sellers
        .register(
            &seller,
            SellerProfile {
                price_setting: PriceSetting::Market { source: None },
                bank_info: Some(PaymentSnapshot {
                    payment_method: "bank".to_string(),
                    payment_bank_name: "국민은행".to_string(),
                    payment_account_number: "000-000-000000".to_string(),
                    payment_account_holder: "홍길동".to_string(),
                    payment_contact_memo: String::new(),
                    is_contact_transfer: false,
                }),
            },
        )
        .await;
    info!("시드 판매자 등록: {}", seller);
}
