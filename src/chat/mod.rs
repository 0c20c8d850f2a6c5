//! 채팅 채널 프로비저닝 심
//!
//! 구매자↔판매자 대화 채널은 외부 채팅 제공자가 담당합니다.
//! 여기서는 (구매자, 판매자) 쌍으로 채널 키를 만들어 제공자에 위임하는
//! 계약만 유지합니다. 앱 ID가 없으면 채팅만 비활성화되며,
//! 거래 생성 자체는 막지 않습니다.

use log::{debug, warn};

/// 채팅 채널 프로비저너
pub struct ChatBootstrap {
    /// 채팅 제공자 앱 ID (없으면 비활성)
    app_id: Option<String>,
}

impl ChatBootstrap {
    pub fn new(app_id: Option<String>) -> Self {
        if app_id.is_none() {
            warn!("채팅 앱 ID 미설정: 채팅 프로비저닝 비활성화");
        }
        Self { app_id }
    }

    pub fn is_enabled(&self) -> bool {
        self.app_id.is_some()
    }

    /// (구매자, 판매자) 쌍의 채널 키
    pub fn channel_key(buyer: &str, seller: &str) -> String {
        format!("trade-{}-{}", buyer, seller)
    }

    /// 거래 컨텍스트가 생기면 채널을 준비
    ///
    /// 비활성 상태면 `None`. 실패해도 호출자가 거래를 막으면 안 됩니다.
    pub async fn provision(&self, buyer: &str, seller: &str) -> Option<String> {
        let app_id = self.app_id.as_ref()?;
        let key = Self::channel_key(buyer, seller);
        debug!("채팅 채널 준비: {} (app: {})", key, app_id);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_app_id() {
        let chat = ChatBootstrap::new(None);
        assert!(!chat.is_enabled());
        assert_eq!(chat.provision("B", "S").await, None);
    }

    #[tokio::test]
    async fn test_channel_key_is_pair_scoped() {
        let chat = ChatBootstrap::new(Some("app-1".to_string()));
        let key = chat.provision("0xB", "0xS").await.unwrap();
        assert_eq!(key, "trade-0xB-0xS");
        assert_eq!(key, ChatBootstrap::channel_key("0xB", "0xS"));
    }
}
