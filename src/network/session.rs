use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::config::HttpConfig;

/// 请求会话态：UA 与 Cookie
///
/// 由 `SessionMiddleware` 在每次请求前注入，运行期可原地更新。
#[derive(Debug, Default)]
pub struct Session {
    pub ua: Arc<RwLock<String>>,
    pub cookie: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        let session = Self::new();
        session.set_ua(config.user_agent.clone());
        if let Some(cookie) = &config.cookie {
            session.set_cookie(cookie.clone());
        }
        session
    }

    pub fn set_ua(&self, ua: String) {
        *self.ua.write() = ua;
    }

    pub fn get_ua(&self) -> String {
        self.ua.read().clone()
    }

    pub fn set_cookie(&self, cookie: String) {
        *self.cookie.write() = Some(cookie);
    }

    pub fn get_cookie(&self) -> Option<String> {
        self.cookie.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_seeds_ua_and_cookie() {
        let cfg = HttpConfig::builder()
            .user_agent("readstory-test".to_string())
            .cookie("sid=1".to_string())
            .build();
        let session = Session::from_config(&cfg);
        assert_eq!(session.get_ua(), "readstory-test");
        assert_eq!(session.get_cookie().as_deref(), Some("sid=1"));

        session.set_ua("readstory-next".to_string());
        assert_eq!(session.get_ua(), "readstory-next");
    }
}
