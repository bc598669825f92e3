#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use garrison::auth::{Auth, Claims, KeyRing};
use garrison::handlers::StatusCheck;
use garrison::{App, BoxError, Response};
use http::Method;
use http_body_util::Full;
use jsonwebtoken::EncodingKey;
use serde_json::Value;

pub const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

const PRIVATE_PEM: &str = include_str!("../fixtures/private.pem");
const PUBLIC_PEM: &str = include_str!("../fixtures/public.pem");
const OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/other_private.pem");

/// RS256 verifier trusting `public.pem` under [`KID`], able to sign with the
/// matching private key.
pub fn auth() -> Arc<Auth> {
    let ring = KeyRing::new().with_rsa_pem(KID, PUBLIC_PEM.as_bytes()).unwrap();
    let signing = EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap();
    Arc::new(Auth::new("RS256", ring).unwrap().with_signing_key(KID, signing))
}

pub fn claims(roles: &[&str]) -> Claims {
    Claims::new(
        "service project",
        "123456789",
        roles.iter().map(|r| r.to_string()).collect(),
        Duration::from_secs(3600),
    )
}

pub fn token(roles: &[&str]) -> String {
    auth().generate_token(KID, &claims(roles)).unwrap()
}

/// Signs `claims` with `pem` under `kid`, bypassing the trusted key ring.
pub fn sign_with(pem: &str, kid: &str, claims: &Claims) -> String {
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    Auth::new("RS256", KeyRing::new())
        .unwrap()
        .with_signing_key(kid, key)
        .generate_token(kid, claims)
        .unwrap()
}

pub fn forged_token(roles: &[&str]) -> String {
    sign_with(OTHER_PRIVATE_PEM, KID, &claims(roles))
}

/// A database that is, or is not, ready.
pub struct StubCheck(pub bool);

#[async_trait::async_trait]
impl StatusCheck for StubCheck {
    async fn status_check(&self) -> Result<(), BoxError> {
        if self.0 { Ok(()) } else { Err("connection refused".into()) }
    }
}

pub async fn send(app: &App, method: Method, path: &str, authorization: Option<&str>, body: &str) -> Response {
    let mut req = http::Request::builder().method(method).uri(path);
    if let Some(value) = authorization {
        req = req.header(http::header::AUTHORIZATION, value);
    }
    let req = req.body(Full::new(Bytes::from(body.to_owned()))).unwrap();
    app.dispatch(req, None).await
}

pub async fn get(app: &App, path: &str, token: Option<&str>) -> Response {
    let authorization = token.map(|t| format!("Bearer {t}"));
    send(app, Method::GET, path, authorization.as_deref(), "").await
}

pub fn json(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}
