//! Logout: end the local session, then work out where to send the browser.

use url::Url;

use crate::config::AdfsConfig;
use crate::oauth::LOGOUT_PATH;
use crate::traits::SessionStore;

/// Parameter carrying the application URL to the provider's logout page.
pub const POST_LOGOUT_REDIRECT_PARAM: &str = "post_logout_redirect_uri";

/// Settings that decide the post-logout destination.
#[derive(Debug, Clone)]
pub struct LogoutSettings {
    /// Explicit provider logout URL; takes priority when set.
    pub logout_url: Option<Url>,
    /// Provider base URL, used to derive `{base}/adfs/oauth2/logout`.
    pub base_url: Option<Url>,
    /// Application URL the provider should return to.
    pub app_url: Url,
}

impl From<&AdfsConfig> for LogoutSettings {
    fn from(config: &AdfsConfig) -> Self {
        Self {
            logout_url: config.logout_url.clone(),
            base_url: config.base_url.clone(),
            app_url: config.app_url.clone(),
        }
    }
}

/// Where to navigate after the local session has ended.
///
/// The explicit override wins, then the provider's logout endpoint derived
/// from the base URL, then the application root `/`.
pub fn logout_destination(settings: &LogoutSettings) -> String {
    let provider = settings.logout_url.clone().or_else(|| {
        settings.base_url.as_ref().and_then(|base| {
            let base = base.as_str().trim_end_matches('/');
            Url::parse(&format!("{base}{LOGOUT_PATH}")).ok()
        })
    });

    match provider {
        Some(mut url) => {
            url.query_pairs_mut()
                .append_pair(POST_LOGOUT_REDIRECT_PARAM, settings.app_url.as_str());
            url.to_string()
        }
        None => "/".to_string(),
    }
}

/// End the session (when there is one) and return the navigation target.
///
/// The session is torn down before the destination is returned. A failure
/// to tear it down is logged and does not block navigation.
pub async fn perform_logout(
    sessions: &dyn SessionStore,
    session_id: Option<&str>,
    settings: &LogoutSettings,
) -> String {
    if let Some(id) = session_id {
        if let Err(e) = sessions.logout(id).await {
            tracing::warn!(error = %e, "session logout failed");
        }
    }
    logout_destination(settings)
}
