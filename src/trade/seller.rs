//! 판매자 프로필 조회 인터페이스
//!
//! 판매자 목록/설정 화면은 이 엔진 범위 밖이므로, 엔진이 필요로 하는
//! 최소 정보(가격 설정 방식, 결제 창구 정보)만 인터페이스로 둡니다.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::trade::model::PaymentSnapshot;
use crate::trade::rate::PriceSetting;

/// 엔진이 참조하는 판매자 설정
#[derive(Debug, Clone)]
pub struct SellerProfile {
  /// 가격 설정 방식 (고정가 또는 마켓 연동)
  pub price_setting: PriceSetting,
  /// 현재 결제 창구 정보 (입금요청 시점에 주문으로 스냅샷됨)
  pub bank_info: Option<PaymentSnapshot>,
}

/// 판매자 프로필 조회자
#[async_trait]
pub trait SellerDirectory: Send + Sync {
  async fn profile(&self, seller_wallet_address: &str) -> Result<Option<SellerProfile>>;
}

/// 메모리 기반 판매자 디렉터리
///
/// 서버 기동 시 등록하거나 테스트에서 직접 구성합니다.
#[derive(Default)]
pub struct MemorySellerDirectory {
  profiles: RwLock<HashMap<String, SellerProfile>>,
}

impl MemorySellerDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  /// 판매자 프로필 등록 (기존 항목은 교체)
  pub async fn register(&self, seller_wallet_address: &str, profile: SellerProfile) {
    self
      .profiles
      .write()
      .await
      .insert(seller_wallet_address.to_string(), profile);
  }
}

#[async_trait]
impl SellerDirectory for MemorySellerDirectory {
  async fn profile(&self, seller_wallet_address: &str) -> Result<Option<SellerProfile>> {
    Ok(self.profiles.read().await.get(seller_wallet_address).cloned())
  }
}
