mod common;

use garrison::middleware::{self, Chain};
use garrison::{App, Decoder, Error, FieldNames, Request, RequestContext, Response, Shutdown, respond};
use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use common::{json, send};

#[derive(Debug, Deserialize, Validate)]
struct NewUser {
    #[validate(required)]
    name: Option<String>,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8))]
    password: String,
}

impl FieldNames for NewUser {}

#[derive(Debug, Deserialize, Validate)]
struct Profile {
    #[serde(rename = "userName")]
    #[validate(length(min = 3))]
    user_name: String,
    #[serde(rename = "homePage", default)]
    #[validate(url)]
    home_page: Option<String>,
    #[serde(default)]
    #[validate(length(max = 3))]
    internal_tag: String,
}

impl FieldNames for Profile {
    const RENAMED: &'static [(&'static str, &'static str)] = &[("user_name", "userName"), ("home_page", "homePage")];
    const HIDDEN: &'static [&'static str] = &["internal_tag"];
}

fn decode_profile(body: &str) -> Result<Profile, Error> {
    Decoder::default().decode_slice(body.as_bytes())
}

fn fields_of(err: Error) -> Vec<(String, String)> {
    let err = err.as_request_error().expect("request error");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    err.fields().iter().map(|f| (f.field.clone(), f.error.clone())).collect()
}

async fn create_user(ctx: RequestContext, req: Request) -> Result<Response, Error> {
    let user: NewUser = Decoder::default().decode(&req)?;
    respond(&ctx, &json!({"name": user.name, "email": user.email}), StatusCode::CREATED)
}

fn app() -> App {
    let global = Chain::new().with(middleware::errors());
    App::new(Shutdown::new(), global).handle(Method::POST, "/users", create_user, Chain::new())
}

async fn post(body: &str) -> Response {
    send(&app(), Method::POST, "/users", None, body).await
}

#[tokio::test]
async fn valid_body_is_decoded() {
    let res = post(r#"{"name":"Ada","email":"ada@example.com","password":"analytical"}"#).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(json(&res), json!({"name": "Ada", "email": "ada@example.com"}));
}

#[tokio::test]
async fn unknown_field_is_rejected() {
    let res = post(r#"{"name":"Ada","email":"ada@example.com","password":"analytical","admin":true}"#).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body = json(&res);
    assert!(body["error"].as_str().unwrap().contains("admin"));
    assert!(body.get("fields").is_none());
}

#[tokio::test]
async fn malformed_json_is_400_without_parser_detail() {
    for body in [r#"{"name": "#, r#"{"name":"Ada","email":5,"password":"analytical"}"#] {
        let res = post(body).await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(json(&res), json!({"error": "malformed request body"}));
    }
}

#[test]
fn field_errors_use_json_names() {
    let err = decode_profile(r#"{"userName":"a","homePage":"nope","internal_tag":"toolong"}"#).unwrap_err();
    assert_eq!(
        fields_of(err),
        [
            ("homePage".to_owned(), "homePage must be a valid URL".to_owned()),
            ("userName".to_owned(), "userName must be at least 3 characters in length".to_owned()),
        ]
    );
}

#[test]
fn missing_plain_field_is_reported_as_required() {
    let err = decode_profile("{}").unwrap_err();
    assert_eq!(err.to_string(), "field validation error");
    assert_eq!(fields_of(err), [("userName".to_owned(), "userName is a required field".to_owned())]);
}

#[tokio::test]
async fn missing_plain_field_reaches_the_client_as_a_field_error() {
    let res = post(r#"{"name":"Ada","password":"analytical"}"#).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json(&res),
        json!({
            "error": "field validation error",
            "fields": [{"field": "email", "error": "email is a required field"}]
        })
    );
}

#[tokio::test]
async fn every_violation_is_reported_in_field_order() {
    let body = r#"{"email":"not-an-email","password":"short"}"#;
    let expected = json!({
        "error": "field validation error",
        "fields": [
            {"field": "email", "error": "email must be a valid email address"},
            {"field": "name", "error": "name is a required field"},
            {"field": "password", "error": "password must be at least 8 characters in length"},
        ]
    });

    let first = post(body).await;
    assert_eq!(first.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(json(&first), expected);

    let second = post(body).await;
    assert_eq!(first.body(), second.body());
}
