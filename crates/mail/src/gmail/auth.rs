//! Gmail OAuth2 authentication
//!
//! Implements the installed-app authorization code flow for the Gmail API.
//! Tokens are persisted to a token store file and refreshed when they expire.
//! Uses a local HTTP listener to receive the OAuth callback and synchronous
//! HTTP (ureq) for the token endpoint.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::GmailCredentials;

/// Read-only Gmail scope; sufficient for listing threads and downloading attachments
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Seconds before expiry at which a token is treated as expired
const EXPIRY_SKEW_SECS: i64 = 300;

/// OAuth2 configuration and token management for Gmail
///
/// Safe to share between fetch workers: token acquisition is serialized so
/// only one refresh happens at a time and the store file is never written
/// concurrently.
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    scopes: Vec<String>,
    cached: Mutex<Option<StoredToken>>,
}

/// Stored token data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_SKEW_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create a new GmailAuth instance
    ///
    /// # Arguments
    /// * `credentials` - OAuth2 client ID and secret
    /// * `token_path` - Where the access/refresh token is stored between runs
    /// * `scopes` - OAuth scopes to request on first authorization
    pub fn new(credentials: GmailCredentials, token_path: PathBuf, scopes: Vec<String>) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            token_path,
            scopes,
            cached: Mutex::new(None),
        }
    }

    /// Get the default token storage path (~/.config/harvest/gmail-tokens.json)
    pub fn default_token_path() -> Result<PathBuf> {
        config::config_path("gmail-tokens.json").context("Could not determine config directory")
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn get_access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow::anyhow!("Token cache lock poisoned"))?;

        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.access_token.clone());
        }

        let stored = cached.take().or_else(|| self.load_token().ok());

        if let Some(token) = stored {
            if token.is_fresh() {
                let access_token = token.access_token.clone();
                *cached = Some(token);
                return Ok(access_token);
            }

            if let Some(refresh_token) = token.refresh_token {
                match self.refresh_access_token(&refresh_token) {
                    Ok(new_token) => {
                        info!("Refreshed Gmail access token");
                        let stored = self.save_token_response(&new_token)?;
                        let access_token = stored.access_token.clone();
                        *cached = Some(stored);
                        return Ok(access_token);
                    }
                    Err(e) => warn!("Failed to refresh access token: {:#}", e),
                }
            }
        }

        let token = self.authorization_code_auth()?;
        let stored = self.save_token_response(&token)?;
        let access_token = stored.access_token.clone();
        *cached = Some(stored);
        Ok(access_token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
        );

        println!("\n=== Gmail Authentication Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = self.wait_for_callback(listener)?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Authentication successful!\n");
        Ok(token)
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = query_param(&request_line, "code");
        let error = query_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }

        code.context("No authorization code received")
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh responses
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(token)
    }

    /// Save token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<StoredToken> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        config::save_json_file(&self.token_path, &stored)
            .context("Failed to persist Gmail token")?;
        Ok(stored)
    }
}

/// Extract a query parameter from an HTTP request line
fn query_param(request_line: &str, name: &str) -> Option<String> {
    request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split('?').nth(1))
        .and_then(|query| {
            query.split('&').find_map(|param| {
                let mut parts = param.splitn(2, '=');
                if parts.next() == Some(name) {
                    parts.next().map(|v| {
                        urlencoding::decode(v)
                            .map(|s| s.into_owned())
                            .unwrap_or_else(|_| v.to_string())
                    })
                } else {
                    None
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_credentials() -> GmailCredentials {
        GmailCredentials {
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_query_param() {
        let line = "GET /?code=4%2F0Adeu5B&scope=gmail.readonly HTTP/1.1\r\n";
        assert_eq!(query_param(line, "code"), Some("4/0Adeu5B".to_string()));
        assert_eq!(query_param(line, "error"), None);

        let denied = "GET /?error=access_denied HTTP/1.1\r\n";
        assert_eq!(query_param(denied, "error"), Some("access_denied".to_string()));
    }

    #[test]
    fn test_fresh_stored_token_is_used() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let stored = StoredToken {
            access_token: "ya29.fresh".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        };
        config::save_json_file(&token_path, &stored).unwrap();

        let auth = GmailAuth::new(
            test_credentials(),
            token_path,
            vec![GMAIL_READONLY_SCOPE.to_string()],
        );

        assert_eq!(auth.get_access_token().unwrap(), "ya29.fresh");
    }

    #[test]
    fn test_token_without_expiry_is_not_fresh() {
        let token = StoredToken {
            access_token: "ya29.old".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!token.is_fresh());

        let expiring = StoredToken {
            expires_at: Some(chrono::Utc::now().timestamp() + 60),
            ..token
        };
        assert!(!expiring.is_fresh());
    }
}
