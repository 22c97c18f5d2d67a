use harvest_core::{CoreError, RedditApiError};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use reqwest::StatusCode;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens this close to expiry are renewed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Application identifier and secret. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    client_secret: String,
    pub user_agent: String,
}

impl RedditCredentials {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
        }
    }
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Clone)]
struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Application-only OAuth2 (client credentials grant) with a cached token.
pub struct AppOnlyAuth {
    oauth: BasicClient,
    user_agent: String,
    token: RwLock<Option<AccessToken>>,
}

impl fmt::Debug for AppOnlyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppOnlyAuth")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl AppOnlyAuth {
    pub fn new(credentials: &RedditCredentials) -> Result<Self, CoreError> {
        Self::with_token_url(credentials, REDDIT_TOKEN_URL)
    }

    /// Like [`new`](Self::new) against another token endpoint, e.g. a local stub.
    pub fn with_token_url(credentials: &RedditCredentials, token_url: &str) -> Result<Self, CoreError> {
        let invalid = |e: oauth2::url::ParseError| CoreError::Internal {
            message: format!("invalid OAuth endpoint: {}", e),
        };
        let oauth = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(invalid)?,
            Some(TokenUrl::new(token_url.to_string()).map_err(invalid)?),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth,
            user_agent: credentials.user_agent.clone(),
            token: RwLock::new(None),
        })
    }

    pub async fn has_fresh_token(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_some_and(AccessToken::is_fresh)
    }

    /// Cached bearer token, renewed when missing or about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.secret.clone());
        }
        self.refresh().await
    }

    /// Requests a new token from the token endpoint.
    pub async fn refresh(&self) -> Result<String, CoreError> {
        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.secret.clone());
        }

        debug!("Requesting application-only access token");
        let user_agent = self.user_agent.clone();
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(move |request| token_http_client(user_agent, request))
            .await
            .map_err(token_error)?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let secret = response.access_token().secret().clone();
        *slot = Some(AccessToken {
            secret: secret.clone(),
            expires_at: Instant::now() + lifetime,
        });
        info!("Obtained access token valid for {:?}", lifetime);
        Ok(secret)
    }

    /// Drops the cached token after the API rejected it.
    pub async fn invalidate(&self) {
        self.token.write().await.take();
    }

    #[cfg(test)]
    pub(crate) async fn seed_token(&self, secret: &str) {
        *self.token.write().await = Some(AccessToken {
            secret: secret.to_string(),
            expires_at: Instant::now() + DEFAULT_TOKEN_LIFETIME,
        });
    }
}

/// Failures of the token endpoint transport that never reach the OAuth layer.
#[derive(Error, Debug)]
pub enum TokenTransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// A status the OAuth error body cannot express: 401/403, 429 or 5xx.
    #[error("token endpoint answered {status}")]
    Status {
        status: StatusCode,
        retry_after: Option<u64>,
    },
}

type TokenRequestError = RequestTokenError<TokenTransportError, BasicErrorResponse>;

/// Only a refusal of the credentials themselves is an authentication failure;
/// transport and server trouble stay retryable.
fn token_error(e: TokenRequestError) -> CoreError {
    let mapped = match e {
        RequestTokenError::ServerResponse(response) => match response.error() {
            BasicErrorResponseType::InvalidClient
            | BasicErrorResponseType::UnauthorizedClient
            | BasicErrorResponseType::InvalidGrant => {
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: response.error().to_string(),
                })
            }
            other => CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("token endpoint error: {}", other),
            }),
        },
        RequestTokenError::Request(TokenTransportError::Http(e)) if e.is_timeout() => {
            CoreError::RedditApi(RedditApiError::RequestTimeout)
        }
        RequestTokenError::Request(TokenTransportError::Http(e)) => CoreError::Network(e),
        RequestTokenError::Request(TokenTransportError::Status {
            status,
            retry_after,
        }) => match status.as_u16() {
            401 | 403 => CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint answered {}", status),
            }),
            429 => CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                retry_after: retry_after.unwrap_or(60),
            }),
            code => CoreError::RedditApi(RedditApiError::ServerError { status_code: code }),
        },
        RequestTokenError::Parse(e, _) => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("unreadable token response: {}", e),
        }),
        RequestTokenError::Other(message) => {
            CoreError::RedditApi(RedditApiError::InvalidResponse { details: message })
        }
    };
    match &mapped {
        CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. }) => {
            error!("Token request rejected: {}", mapped)
        }
        _ => warn!("Token request failed: {}", mapped),
    }
    mapped
}

/// Token endpoint transport; Reddit rejects requests without a descriptive User-Agent.
async fn token_http_client(
    user_agent: String,
    request: HttpRequest,
) -> Result<HttpResponse, TokenTransportError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(30))
        .build()?;

    let mut builder = client
        .request(request.method, request.url.as_str())
        .body(request.body);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    let response = builder.send().await?;
    let status_code = response.status();
    if matches!(status_code.as_u16(), 401 | 403 | 429) || status_code.is_server_error() {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        return Err(TokenTransportError::Status {
            status: status_code,
            retry_after,
        });
    }
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
