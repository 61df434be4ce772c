//! Request gate
//!
//! The per-request decision path: session check first, then directory
//! authentication and authorization on a fresh connection, then
//! response shaping. Every failure denies with a 401 carrying the
//! reason; nothing here is fatal to the process.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE, WWW_AUTHENTICATE};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bawwab_core::config::BawwabConfig;
use bawwab_core::types::{Credentials, DirectoryIdentity};
use bawwab_core::{Error, Result, SecretResolver};
use bawwab_directory::{authenticate, authorize, connect, DirectoryConnection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics::MetricsRecorder;
use crate::server::AppState;
use crate::session::{resolve_signing_key, SessionCodec};

/// Header carrying the resolved entry DN when extra-header forwarding
/// is enabled in search mode.
pub const EXTRA_ATTR_DN_HEADER: &str = "ldap-extra-attr-dn";
/// Header carrying the entry's common name, same conditions.
pub const EXTRA_ATTR_CN_HEADER: &str = "ldap-extra-attr-cn";

/// The authentication gate. Constructed once at startup and shared
/// read-only across requests; per-request data never touches it.
pub struct Gate {
    config: Arc<BawwabConfig>,
    codec: SessionCodec,
}

impl Gate {
    /// Resolve secret labels and build the gate. The configuration is
    /// immutable afterwards.
    pub fn new(mut config: BawwabConfig, secrets: &SecretResolver) -> Self {
        // Like the session key, a label that resolves to something
        // overrides the inline value.
        if !config.directory.bind_password_label.is_empty() {
            let resolved = secrets.resolve(&config.directory.bind_password_label);
            if !resolved.is_empty() {
                config.directory.bind_password = resolved;
            }
        }

        let key = resolve_signing_key(&config.session, secrets);
        let codec = SessionCodec::new(key, config.session.clone());

        Self {
            config: Arc::new(config),
            codec,
        }
    }

    pub fn config(&self) -> Arc<BawwabConfig> {
        self.config.clone()
    }

    /// Decide one request: forward it through `next` or deny with 401.
    pub async fn handle(
        &self,
        mut request: Request<Body>,
        next: Next,
        metrics: &MetricsRecorder,
    ) -> Response {
        if !self.config.gate.enabled {
            debug!("gate disabled, passing request through");
            metrics.record_request("bypass");
            return next.run(request).await;
        }

        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let credentials = match header.and_then(Credentials::from_basic_header) {
            Some(credentials) => credentials,
            None => {
                debug!("no basic credentials on request");
                metrics.record_request("denied");
                return self.deny(&Error::MissingCredentials, None);
            }
        };

        // A valid proof for the same user skips the directory
        // entirely. A proof for a different user is invalidated and
        // denied; anything else (absent, unauthenticated, tampered)
        // is a miss.
        let cookie_header = request
            .headers()
            .get(COOKIE)
            .and_then(|h| h.to_str().ok());
        if let Some(proof) = cookie_header.and_then(|h| self.codec.load(h)) {
            if proof.authenticated {
                if proof.username == credentials.username_lc {
                    debug!("session hit for {}", credentials.username_lc);
                    metrics.record_session("hit");
                    metrics.record_request("forwarded");
                    self.apply_forward_headers(&mut request, &credentials, None);
                    return next.run(request).await;
                }

                metrics.record_session("mismatch");
                metrics.record_request("denied");
                let error = Error::SessionMismatch {
                    session: proof.username,
                    request: credentials.username_lc.clone(),
                };
                info!("{}", error);
                return self.deny(&error, Some(self.codec.invalidate()));
            }
        }
        metrics.record_session("miss");

        let start = Instant::now();
        let conn = match connect(&self.config.directory).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("directory connection failed: {}", e);
                metrics.record_request("denied");
                return self.deny(&e, None);
            }
        };

        let outcome = self.resolve(conn, &credentials).await;
        metrics.record_directory_auth(start.elapsed().as_secs_f64());

        let identity = match outcome {
            Ok(identity) => identity,
            Err(e) => {
                info!("denied {}: {}", credentials.username_lc, e.reason());
                metrics.record_request("denied");
                return self.deny(&e, None);
            }
        };

        info!(
            "authenticated {} as {}",
            credentials.username_lc, identity.dn
        );
        self.apply_forward_headers(&mut request, &credentials, Some(&identity));
        let session_cookie = self.codec.store(&credentials.username_lc);

        metrics.record_request("forwarded");
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&session_cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }

    /// Authenticate then authorize on one connection, releasing it
    /// exactly once on every path.
    async fn resolve(
        &self,
        mut conn: DirectoryConnection,
        credentials: &Credentials,
    ) -> Result<DirectoryIdentity> {
        let result = async {
            let identity = authenticate(&mut conn, &self.config.directory, credentials).await?;
            authorize(&mut conn, &self.config.access, &identity, credentials).await?;
            Ok(identity)
        }
        .await;

        conn.release().await;
        result
    }

    /// Build the 401 response for a denial.
    fn deny(&self, error: &Error, invalidation: Option<String>) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let reason = error.reason();
        let body = format!(
            "{} {}: {}\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unauthorized"),
            reason.trim_matches(|c: char| c.is_control())
        );

        let mut builder = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "text/plain");

        if self.config.gate.www_authenticate {
            let challenge = if self.config.gate.realm.is_empty() {
                "Basic".to_string()
            } else {
                format!("Basic realm=\"{}\"", self.config.gate.realm)
            };
            builder = builder.header(WWW_AUTHENTICATE, challenge);
        }
        if let Some(cookie) = invalidation {
            builder = builder.header(SET_COOKIE, cookie);
        }

        builder
            .body(Body::from(body))
            .unwrap_or_else(|_| status.into_response())
    }

    /// Mutate the forwarded request per configuration: username
    /// header, optional identity attribute headers (search mode
    /// only), and the Authorization strip.
    ///
    /// Inbound copies of the identity headers are always removed
    /// first; the upstream must only ever see values the gate set.
    fn apply_forward_headers(
        &self,
        request: &mut Request<Body>,
        credentials: &Credentials,
        identity: Option<&DirectoryIdentity>,
    ) {
        let headers = request.headers_mut();

        if let Ok(name) = HeaderName::from_bytes(self.config.forward.username_header.as_bytes()) {
            headers.remove(name);
        }
        headers.remove(HeaderName::from_static(EXTRA_ATTR_DN_HEADER));
        headers.remove(HeaderName::from_static(EXTRA_ATTR_CN_HEADER));

        if self.config.forward.username {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(self.config.forward.username_header.as_bytes()),
                HeaderValue::from_str(&credentials.username_lc),
            ) {
                headers.insert(name, value);
            }
        }

        if self.config.forward.extra_headers && self.config.directory.search_mode() {
            if let Some(identity) = identity {
                if let Ok(value) = HeaderValue::from_str(&identity.dn) {
                    headers.insert(HeaderName::from_static(EXTRA_ATTR_DN_HEADER), value);
                }
                if let Some(cn) = identity.get_attribute("cn") {
                    if let Ok(value) = HeaderValue::from_str(&cn) {
                        headers.insert(HeaderName::from_static(EXTRA_ATTR_CN_HEADER), value);
                    }
                }
            }
        }

        if !self.config.forward.authorization {
            headers.remove(AUTHORIZATION);
        }
    }
}

/// Axum middleware wrapping [`Gate::handle`].
pub async fn gate_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state.gate.handle(request, next, &state.metrics).await
}
