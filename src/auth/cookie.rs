//! 认证 Cookie 的写入与清除

use crate::config::CookieConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Builds the token cookies according to [`CookieConfig`]
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    secure: bool,
    same_site: SameSite,
    domain: Option<String>,
}

impl CookiePolicy {
    pub fn from_config(config: &CookieConfig) -> Self {
        let same_site = match config.same_site.to_lowercase().as_str() {
            "lax" => SameSite::Lax,
            "none" => SameSite::None,
            _ => SameSite::Strict,
        };

        Self {
            secure: config.secure,
            same_site,
            domain: config.domain.clone(),
        }
    }

    fn build(&self, name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(time::Duration::seconds(max_age_secs))
            .build();

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }

        cookie
    }

    /// Add both token cookies, max-age matching each token's lifetime
    pub fn set_tokens(
        &self,
        jar: CookieJar,
        access_token: String,
        access_exp_secs: u64,
        refresh_token: String,
        refresh_exp_secs: u64,
    ) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, access_token, access_exp_secs as i64))
            .add(self.build(REFRESH_COOKIE, refresh_token, refresh_exp_secs as i64))
    }

    /// Expire both token cookies
    ///
    /// 清除用的 Cookie 与写入时属性一致，否则 `SameSite=None` 下浏览器会忽略
    pub fn clear_tokens(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, String::new(), 0))
            .add(self.build(REFRESH_COOKIE, String::new(), 0))
    }
}
