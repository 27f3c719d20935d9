//! The page returned at the end of a successful callback.
//!
//! It signs the browser into the identity provider with the custom token,
//! stores the access token and profile shop client-side, and then sends the
//! merchant to the app inside their admin.

use crate::auth::{AccessToken, FederatedToken, FederatedUserId};
use crate::config::{ApiKey, ShopDomain};
use serde::Deserialize;
use std::fmt::Write as _;

const SDK_BASE: &str = "https://www.gstatic.com/firebasejs/8.10.1";

/// Public web-app configuration of the identity provider.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct WebAppConfig {
    /// The browser API key.
    pub api_key: String,
    /// The project id.
    pub project_id: String,
    /// The database URL, when not the project default.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl WebAppConfig {
    /// Creates a config using the project's default database.
    #[must_use]
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            database_url: None,
        }
    }

    /// Returns the database URL the page connects to.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.firebaseio.com", self.project_id))
    }
}

/// Everything the sign-in page interpolates.
#[derive(Debug)]
pub struct SignInPage<'a> {
    /// The tenant's shop.
    pub shop: &'a ShopDomain,
    /// The app's platform API key, used for the final redirect.
    pub app_api_key: &'a ApiKey,
    /// Browser config of the identity provider.
    pub web_app: &'a WebAppConfig,
    /// Namespace the access token is written under.
    pub token_namespace: &'a str,
    /// The tenant's federated user id.
    pub user_id: &'a FederatedUserId,
    /// The custom token to sign in with.
    pub token: &'a FederatedToken,
    /// The platform access token to store.
    pub access_token: &'a AccessToken,
}

impl SignInPage<'_> {
    /// Renders the HTML document.
    #[must_use]
    pub fn render(&self) -> String {
        let token = js_string(self.token.as_ref());
        let api_key = js_string(&self.web_app.api_key);
        let database_url = js_string(&self.web_app.database_url());
        let token_path = js_string(&format!("/{}/{}", self.token_namespace, self.user_id));
        let profile_path = js_string(&format!("/profiles/{}/shop", self.user_id));
        let access_token = js_string(self.access_token.as_ref());
        let shop = js_string(self.shop.as_ref());
        let app_url = js_string(&self.shop.app_url(self.app_api_key));

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script src="{SDK_BASE}/firebase-app.js"></script>
<script src="{SDK_BASE}/firebase-auth.js"></script>
<script src="{SDK_BASE}/firebase-database.js"></script>
</head>
<body>
<script>
  var token = {token};
  var config = {{ apiKey: {api_key}, databaseURL: {database_url} }};
  var tempApp = firebase.initializeApp(config, '_temp_');
  tempApp.auth().signInWithCustomToken(token).then(function () {{
    var db = tempApp.database();
    var profile = db.ref({profile_path});
    var tasks = [db.ref({token_path}).set({access_token})];
    tasks.push(profile.once('value').then(function (snapshot) {{
      if (snapshot.val() !== {shop}) {{
        return profile.set({shop});
      }}
    }}));
    return Promise.all(tasks);
  }}).then(function () {{
    var defaultApp = firebase.initializeApp(config);
    return Promise.all([tempApp.delete(), defaultApp.auth().signInWithCustomToken(token)]);
  }}).then(function () {{
    window.location.href = {app_url};
  }});
</script>
</body>
</html>
"#
        )
    }
}

/// Quotes `value` as a single-quoted JavaScript string literal that is
/// also safe inside an HTML `<script>` element.
#[must_use]
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
