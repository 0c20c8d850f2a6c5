//! 환율 변환기
//!
//! 유효 환율을 결정하고 USDT/KRW 금액을 상호 변환합니다.
//! 변환 규칙은 의도적으로 비대칭입니다:
//! USDT 쪽은 소수점 2자리 절사(버림), KRW 쪽은 반올림.
//! 단수 차이를 누가 흡수하는지가 이 규칙으로 정해지므로 변경 금지.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{Result, TradeError};

/// 시세 소스 미지정 시 사용하는 기본 마켓
pub const FALLBACK_MARKET: &str = "USDT-KRW";

/// 시세 캐시 갱신 주기
pub const RATE_CACHE_TTL: Duration = Duration::from_secs(30);

/// 판매자의 가격 설정 방식
#[derive(Debug, Clone)]
pub enum PriceSetting {
  /// 판매자가 고정 환율을 직접 지정
  Fixed(Decimal),
  /// 마켓 시세 연동 (소스 미지정 시 기본 마켓)
  Market { source: Option<String> },
}

/// 변환 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
  pub usdt_amount: Decimal,
  pub krw_amount: i64,
  pub rate: Decimal,
}

/// 요청 USDT 수량으로부터 변환
///
/// `usdt = floor(u × 100) / 100`, `krw = round(usdt × rate)`
pub fn convert_from_usdt(requested_usdt: Decimal, rate: Decimal) -> Result<Quote> {
  if rate <= Decimal::ZERO {
    return Err(TradeError::Validation(format!("유효하지 않은 환율: {}", rate)));
  }
  let usdt = requested_usdt.trunc_with_scale(2);
  let krw = (usdt * rate)
    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    .to_i64()
    .ok_or_else(|| TradeError::Validation("KRW 금액이 표현 범위를 벗어났습니다".to_string()))?;
  Ok(Quote { usdt_amount: usdt, krw_amount: krw, rate })
}

/// 요청 KRW 금액으로부터 변환
///
/// `usdt = floor((k / rate) × 100) / 100`, `krw = k` 그대로 유지
pub fn convert_from_krw(requested_krw: i64, rate: Decimal) -> Result<Quote> {
  if rate <= Decimal::ZERO {
    return Err(TradeError::Validation(format!("유효하지 않은 환율: {}", rate)));
  }
  let usdt = (Decimal::from(requested_krw) / rate).trunc_with_scale(2);
  Ok(Quote { usdt_amount: usdt, krw_amount: requested_krw, rate })
}

/// 시세 소스 인터페이스
#[async_trait]
pub trait RateSource: Send + Sync {
  /// 마켓의 현재 환율 조회 (1 USDT당 KRW)
  async fn latest_rate(&self, market: &str) -> Result<Decimal>;
}

/// 시세 API 응답
#[derive(Debug, Deserialize)]
struct RateResponse {
  rate: Decimal,
}

/// HTTP 시세 소스
pub struct HttpRateSource {
  client: reqwest::Client,
  base_url: String,
}

impl HttpRateSource {
  pub fn new(base_url: String) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url,
    }
  }
}

#[async_trait]
impl RateSource for HttpRateSource {
  async fn latest_rate(&self, market: &str) -> Result<Decimal> {
    let url = format!("{}/rate?market={}", self.base_url, market);
    let resp = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| TradeError::UpstreamUnavailable(format!("시세 조회 실패: {}", e)))?;
    let body: RateResponse = resp
      .json()
      .await
      .map_err(|e| TradeError::UpstreamUnavailable(format!("시세 응답 해석 실패: {}", e)))?;
    Ok(body.rate)
  }
}

/// 캐시된 시세 (타임스탬프 포함)
struct CachedRate {
  market: String,
  rate: Decimal,
  fetched_at: Instant,
}

/// 환율 변환기
///
/// 고정 환율은 그대로 쓰고, 마켓 연동 환율은 TTL 기반 캐시를 거쳐
/// 주기적으로 갱신된 값을 사용합니다.
pub struct RateConverter {
  source: Arc<dyn RateSource>,
  cache: Mutex<Option<CachedRate>>,
  ttl: Duration,
}

impl RateConverter {
  pub fn new(source: Arc<dyn RateSource>) -> Self {
    Self {
      source,
      cache: Mutex::new(None),
      ttl: RATE_CACHE_TTL,
    }
  }

  /// 주문에 적용할 유효 환율 결정
  pub async fn effective_rate(&self, setting: &PriceSetting) -> Result<Decimal> {
    match setting {
      PriceSetting::Fixed(rate) => Ok(*rate),
      PriceSetting::Market { source } => {
        let market = source.as_deref().unwrap_or(FALLBACK_MARKET);
        self.market_rate(market).await
      }
    }
  }

  /// 캐시를 거친 마켓 시세 조회
  async fn market_rate(&self, market: &str) -> Result<Decimal> {
    let mut cache = self.cache.lock().await;
    if let Some(cached) = cache.as_ref() {
      if cached.market == market && cached.fetched_at.elapsed() < self.ttl {
        debug!("시세 캐시 사용: {} = {}", market, cached.rate);
        return Ok(cached.rate);
      }
    }

    match self.source.latest_rate(market).await {
      Ok(rate) => {
        *cache = Some(CachedRate {
          market: market.to_string(),
          rate,
          fetched_at: Instant::now(),
        });
        debug!("시세 갱신: {} = {}", market, rate);
        Ok(rate)
      }
      Err(e) => {
        // 소스 장애 시 만료된 캐시라도 있으면 그 값으로 유지
        if let Some(cached) = cache.as_ref() {
          if cached.market == market {
            warn!("시세 소스 장애, 마지막 시세 유지: {} = {} ({})", market, cached.rate, e);
            return Ok(cached.rate);
          }
        }
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn test_convert_from_usdt_round() {
    // 100 USDT × 1400 = 140,000 KRW
    let quote = convert_from_usdt(dec!(100), dec!(1400)).unwrap();
    assert_eq!(quote.usdt_amount, dec!(100));
    assert_eq!(quote.krw_amount, 140_000);
  }

  #[test]
  fn test_convert_from_usdt_truncates_to_two_places() {
    // 10.999999 USDT → 10.99 USDT (절사, 반올림 아님)
    let quote = convert_from_usdt(dec!(10.999999), dec!(1400)).unwrap();
    assert_eq!(quote.usdt_amount, dec!(10.99));
    assert_eq!(quote.krw_amount, 15_386);
  }

  #[test]
  fn test_convert_from_krw_floors_usdt() {
    // 50000 / 1400 = 35.714285... → 35.71 (2자리 절사)
    let quote = convert_from_krw(50_000, dec!(1400)).unwrap();
    assert_eq!(quote.usdt_amount, dec!(35.71));
    assert_eq!(quote.krw_amount, 50_000);
  }

  #[test]
  fn test_krw_rounds_half_away_from_zero() {
    // 0.5 KRW 단수는 올림 (은행가 반올림 금지)
    let quote = convert_from_usdt(dec!(0.25), dec!(1402)).unwrap();
    // 0.25 × 1402 = 350.5 → 351
    assert_eq!(quote.krw_amount, 351);
  }

  #[test]
  fn test_zero_rate_rejected() {
    assert!(convert_from_usdt(dec!(10), dec!(0)).is_err());
    assert!(convert_from_krw(10_000, dec!(0)).is_err());
  }

  struct FixedSource(Decimal);

  #[async_trait]
  impl RateSource for FixedSource {
    async fn latest_rate(&self, _market: &str) -> Result<Decimal> {
      Ok(self.0)
    }
  }

  #[tokio::test]
  async fn test_effective_rate_fixed_skips_source() {
    let converter = RateConverter::new(Arc::new(FixedSource(dec!(1500))));
    let rate = converter
      .effective_rate(&PriceSetting::Fixed(dec!(1234.5)))
      .await
      .unwrap();
    assert_eq!(rate, dec!(1234.5));
  }

  #[tokio::test]
  async fn test_effective_rate_market_uses_fallback_source() {
    let converter = RateConverter::new(Arc::new(FixedSource(dec!(1400))));
    let rate = converter
      .effective_rate(&PriceSetting::Market { source: None })
      .await
      .unwrap();
    assert_eq!(rate, dec!(1400));
  }
}
