use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use log::{error, info};
use rust_decimal::Decimal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::chat::ChatBootstrap;
use crate::db::init_database;
use crate::db::repository::{SqliteOrderStore, TransferLedger};
use crate::escrow::collect::CollectService;
use crate::escrow::custodian::EscrowCustodian;
use crate::trade::engine::TradeEngine;
use crate::trade::rate::{HttpRateSource, RateConverter};
use crate::trade::seller::SellerDirectory;

/// 자동 취소 스윕 주기
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 서버 설정
#[derive(Clone)]
pub struct ServerConfig {
    pub rest_port: u16,
    pub database_url: String,
    /// 체인/네트워크 선택자 (토큰 소수 자릿수에 영향)
    pub network: String,
    /// 채팅 제공자 앱 ID (없으면 채팅 비활성)
    pub chat_app_id: Option<String>,
    /// 시세 소스 API 베이스 URL
    pub rate_source_url: String,
    pub platform_fee_rate: Decimal,
    pub platform_fee_wallet: String,
    /// 예치 금액 보관용 플랫폼 지갑
    pub pending_wallet: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rest_port: 7000,
            database_url: "sqlite::memory:".into(),
            network: "polygon".into(),
            chat_app_id: None,
            rate_source_url: "http://localhost:9000".into(),
            platform_fee_rate: Decimal::new(1, 2), // 1%
            platform_fee_wallet: "0xPLATFORM_FEE".into(),
            pending_wallet: "0xESCROW_PENDING".into(),
        }
    }
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드 (없는 값은 기본값)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            rest_port: std::env::var("REST_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rest_port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(default.database_url),
            network: std::env::var("NETWORK").unwrap_or(default.network),
            chat_app_id: std::env::var("CHAT_APP_ID").ok().filter(|v| !v.is_empty()),
            rate_source_url: std::env::var("RATE_SOURCE_URL").unwrap_or(default.rate_source_url),
            platform_fee_rate: std::env::var("PLATFORM_FEE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.platform_fee_rate),
            platform_fee_wallet: std::env::var("PLATFORM_FEE_WALLET")
                .unwrap_or(default.platform_fee_wallet),
            pending_wallet: std::env::var("PENDING_WALLET").unwrap_or(default.pending_wallet),
        }
    }

    /// 네트워크별 토큰 소수 자릿수 (BSC만 18, 나머지는 6)
    ///
    /// 엔진은 십진 USDT 금액으로만 계산합니다. 온체인 최소 단위로의
    /// 변환은 수탁자 구현이 이 값을 기준으로 수행합니다.
    pub fn token_decimals(&self) -> u32 {
        if self.network.eq_ignore_ascii_case("bsc") {
            18
        } else {
            6
        }
    }
}

/// 서버 상태
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<TradeEngine>,
    pub collect: Arc<CollectService>,
}

/// 서버 시작
///
/// 에스크로 수탁자와 판매자 디렉터리는 외부 협력자이므로 주입받습니다.
pub async fn start_server(
    config: ServerConfig,
    custodian: Arc<dyn EscrowCustodian>,
    sellers: Arc<dyn SellerDirectory>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "xEscrow 서버 시작 중... (네트워크: {}, 토큰 소수점: {})",
        config.network,
        config.token_decimals()
    );

    // 데이터베이스 초기화
    let pool = init_database(&config.database_url).await?;
    let store = Arc::new(SqliteOrderStore::new(pool.clone()));
    let ledger = Arc::new(TransferLedger::new(pool));

    // 시세 변환기
    let rates = Arc::new(RateConverter::new(Arc::new(HttpRateSource::new(
        config.rate_source_url.clone(),
    ))));

    // 채팅 프로비저너 (앱 ID 없으면 비활성, 거래는 계속 가능)
    let chat = Arc::new(ChatBootstrap::new(config.chat_app_id.clone()));

    // 거래 엔진
    let engine = Arc::new(TradeEngine::new(
        store,
        custodian.clone(),
        sellers,
        rates,
        ledger.clone(),
        chat,
        config.platform_fee_rate,
        config.platform_fee_wallet.clone(),
        config.pending_wallet.clone(),
    ));

    // 수납/출금 서비스
    let collect = Arc::new(CollectService::new(custodian, ledger));

    // 결제 시한 자동 취소 스윕 태스크
    let sweep_engine = engine.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match sweep_engine.sweep_expired().await {
                Ok(0) => {}
                Ok(n) => info!("자동 취소 스윕: {}건 취소", n),
                Err(e) => error!("자동 취소 스윕 실패: {}", e),
            }
        }
    });

    // 서버 상태 생성
    let state = ServerState { engine, collect };

    // REST API 라우터 생성
    let api_router: Router = create_api_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // REST API 서버 시작
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.rest_port)).await?;

    info!("서버가 성공적으로 시작되었습니다!");
    info!("REST API: http://localhost:{}", config.rest_port);

    axum::serve(listener, api_router).await?;

    Ok(())
}
