use async_trait::async_trait;

use super::{Platform, PlatformParser, Resolution};
use crate::Result;

/// WeChat public-account article parser; articles are used as-is
pub struct WechatParser;

impl WechatParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WechatParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformParser for WechatParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("mp.weixin.qq.com/s")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        Ok(Some(Resolution::same_url(Platform::Wechat, url)))
    }

    fn platform_name(&self) -> &'static str {
        "wechat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wechat_article_detected() {
        let parser = WechatParser::new();
        let url = "https://mp.weixin.qq.com/s/AbCdEf123";
        assert!(parser.can_handle(url));
        let res = parser.parse(url).await.unwrap().unwrap();
        assert_eq!(res.platform, Platform::Wechat);
        assert_eq!(res.resolved_url, url);
    }
}
