use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AccessGrant, Appointment, Bank, Branch, Employee, Feedback, LoginRequest, MutationResponse,
    PasswordChange, PasswordCheck, Prediction, Profile, TemporaryGrant,
};

/// Thin JSON gateway over the backend. Holds the session cookie for the lifetime of the process.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;

        // A manual Cookie header stops reqwest from sending the login session in its store.
        let session_cookie = match (&config.credentials, &config.session_cookie) {
            (Some(_), Some(_)) => {
                warn!("BANKPERF_SESSION ignored because login credentials are configured");
                None
            }
            (_, cookie) => cookie.clone(),
        };

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session_cookie,
        })
    }

    /// Builds the client and, when credentials are configured, opens a session before returning.
    pub async fn connect(config: &Config) -> ApiResult<Self> {
        let client = Self::new(config)?;
        if let Some(credentials) = &config.credentials {
            client.login(&credentials.email, &credentials.password).await?;
        }
        Ok(client)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> ApiResult<Value> {
        debug!(%method, endpoint, "api request");

        let mut request = self
            .http
            .request(method, self.url(endpoint))
            .header(ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie.as_str());
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(endpoint, "backend answered 401; session missing or expired");
            return Err(ApiError::Unauthorized);
        }

        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ApiError::Status { status, message });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn collection<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        plural: &str,
    ) -> ApiResult<Vec<T>> {
        let body = self.request(endpoint, Method::GET, None, &[]).await?;
        let items = extract_collection(body, plural)?;
        let records: Vec<T> = serde_json::from_value(items)?;
        debug!(endpoint, count = records.len(), "collection fetched");
        Ok(records)
    }

    async fn mutate<B: Serialize>(&self, endpoint: &str, body: &B) -> ApiResult<MutationResponse> {
        let payload = serde_json::to_value(body)?;
        let raw = match self.request(endpoint, Method::POST, Some(&payload), &[]).await {
            Ok(raw) => raw,
            Err(ApiError::Status { status, message }) if status.is_client_error() => {
                return Err(ApiError::Rejected(message));
            }
            Err(err) => return Err(err),
        };

        let response: MutationResponse = serde_json::from_value(raw)?;
        if !response.success {
            return Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "Request was rejected".to_string()),
            ));
        }
        Ok(response)
    }

    pub async fn banks(&self) -> ApiResult<Vec<Bank>> {
        self.collection("bank", "banks").await
    }

    pub async fn branches(&self) -> ApiResult<Vec<Branch>> {
        self.collection("branch", "branches").await
    }

    pub async fn employees(&self) -> ApiResult<Vec<Employee>> {
        self.collection("employee", "employees").await
    }

    pub async fn appointments(&self) -> ApiResult<Vec<Appointment>> {
        self.collection("appointment", "appointments").await
    }

    pub async fn feedback(&self) -> ApiResult<Vec<Feedback>> {
        self.collection("feedback", "feedbacks").await
    }

    pub async fn fraud_predictions(&self) -> ApiResult<Vec<Prediction>> {
        self.collection("fraud-predictions", "predictions").await
    }

    pub async fn churn_predictions(&self) -> ApiResult<Vec<Prediction>> {
        self.collection("churn-predictions", "predictions").await
    }

    pub async fn current_user(&self) -> ApiResult<Profile> {
        let body = self.request("user", Method::GET, None, &[]).await?;
        let data = body
            .get("data")
            .map(|data| data.get("user").unwrap_or(data).clone())
            .unwrap_or(body);
        if !data.is_object() {
            return Err(ApiError::Decode("user profile is not an object".to_string()));
        }
        Ok(serde_json::from_value(data)?)
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<()> {
        self.mutate("user/login", &LoginRequest { email, password })
            .await?;
        info!(email, "session opened");
        Ok(())
    }

    pub async fn verify_password(&self, password: &str) -> ApiResult<()> {
        self.mutate("user/verify-password", &PasswordCheck { password })
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> ApiResult<String> {
        let response = self
            .mutate(
                "user/change-password",
                &PasswordChange {
                    current_password,
                    new_password,
                },
            )
            .await?;
        Ok(response
            .message
            .unwrap_or_else(|| "Password updated".to_string()))
    }

    pub async fn grant_access(&self, grant: &AccessGrant) -> ApiResult<String> {
        let response = self.mutate("access-management", grant).await?;
        Ok(response.message.unwrap_or_else(|| "Access granted".to_string()))
    }

    pub async fn grant_temporary_access(&self, grant: &TemporaryGrant) -> ApiResult<String> {
        let response = self.mutate("temporary-access", grant).await?;
        Ok(response
            .message
            .unwrap_or_else(|| "Temporary access granted".to_string()))
    }
}

/// Pulls the record array out of `{ data: { <plural>: [...] } }`, tolerating a bare `data` array
/// or the array sitting under a differently named key.
fn extract_collection(body: Value, plural: &str) -> ApiResult<Value> {
    let data = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    };

    match data {
        Value::Array(_) => Ok(data),
        Value::Null => Ok(Value::Array(Vec::new())),
        Value::Object(mut map) => {
            if let Some(items @ Value::Array(_)) = map.remove(plural) {
                return Ok(items);
            }
            map.into_iter()
                .map(|(_, value)| value)
                .find(Value::is_array)
                .ok_or_else(|| ApiError::Decode(format!("no `{plural}` array in response")))
        }
        other => Err(ApiError::Decode(format!(
            "expected `{plural}` collection, got {other}"
        ))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn extracts_named_plural_collection() {
        let body = json!({ "data": { "appointments": [{ "id": "a-1" }], "total": 1 } });
        let items = extract_collection(body, "appointments").unwrap();
        assert_eq!(items.as_array().unwrap().len(), 1);
    }

    #[test]
    fn extracts_bare_or_renamed_collections() {
        let bare = json!({ "data": [{ "id": 1 }, { "id": 2 }] });
        assert_eq!(extract_collection(bare, "banks").unwrap().as_array().unwrap().len(), 2);

        let renamed = json!({ "data": { "fraudPredictions": [{ "prediction": "Fraud" }] } });
        assert_eq!(
            extract_collection(renamed, "predictions")
                .unwrap()
                .as_array()
                .unwrap()
                .len(),
            1
        );

        let empty = json!({ "data": null });
        assert!(extract_collection(empty, "banks").unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn rejects_collections_without_an_array() {
        let body = json!({ "data": { "count": 3 } });
        assert!(matches!(
            extract_collection(body, "branches"),
            Err(ApiError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn fetches_typed_appointments() {
        let router = Router::new().route(
            "/api/appointment",
            get(|| async {
                Json(json!({
                    "data": { "appointments": [
                        {
                            "_id": "a-1",
                            "status": "Completed",
                            "employeeId": 7,
                            "benchmarkTime": 30
                        },
                        { "_id": "a-2", "status": "Scheduled" }
                    ] }
                }))
            }),
        );
        let client = stub::client_for(router).await;

        let appointments = client.appointments().await.unwrap();
        assert_eq!(appointments.len(), 2);
        assert_eq!(appointments[0].employee_id.as_deref(), Some("7"));
        assert!(appointments[0].is_completed());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_typed_error() {
        let router = Router::new().route(
            "/api/user",
            get(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({ "message": "no session" })),
                )
            }),
        );
        let client = stub::client_for(router).await;

        assert!(matches!(client.current_user().await, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn rejected_mutation_surfaces_backend_message() {
        let router = Router::new().route(
            "/api/access-management",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({ "success": false, "message": "Employee ID not found" })),
                )
            }),
        );
        let client = stub::client_for(router).await;
        let grant = AccessGrant {
            employee_id: "e-404".into(),
            full_name: "Nobody".into(),
            role: "Admin".into(),
            email: "nobody@bank.com".into(),
            password: "Str0ng!pass".into(),
            bank_id: None,
            branch_id: None,
        };

        match client.grant_access(&grant).await {
            Err(ApiError::Rejected(message)) => assert_eq!(message, "Employee ID not found"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_false_with_ok_status_is_still_rejected() {
        let router = Router::new().route(
            "/api/user/verify-password",
            post(|| async { Json(json!({ "success": false, "message": "incorrect password" })) }),
        );
        let client = stub::client_for(router).await;

        match client.verify_password("wrong").await {
            Err(ApiError::Rejected(message)) => assert_eq!(message, "incorrect password"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_cookie_is_replayed_on_later_calls() {
        let router = Router::new()
            .route(
                "/api/user/login",
                post(|| async {
                    (
                        [(header::SET_COOKIE, "session=abc123; Path=/")],
                        Json(json!({ "success": true, "data": {}, "message": "welcome" })),
                    )
                }),
            )
            .route(
                "/api/user",
                get(|headers: HeaderMap| async move {
                    let has_session = headers
                        .get(header::COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .map_or(false, |v| v.contains("session=abc123"));
                    if has_session {
                        (
                            AxumStatus::OK,
                            Json(json!({ "data": { "user": {
                                "_id": "u-1",
                                "fullName": "Ria Sen",
                                "email": "ria@bank.com",
                                "role": "admin"
                            } } })),
                        )
                    } else {
                        (AxumStatus::UNAUTHORIZED, Json(json!({})))
                    }
                }),
            );
        let client = stub::client_for(router).await;

        client.login("ria@bank.com", "Str0ng!pass").await.unwrap();
        let profile = client.current_user().await.unwrap();
        assert_eq!(profile.full_name, "Ria Sen");
        assert_eq!(profile.role, "admin");
    }

    fn session_router() -> Router {
        Router::new()
            .route(
                "/api/user/login",
                post(|| async {
                    (
                        [(header::SET_COOKIE, "session=fresh; Path=/")],
                        Json(json!({ "success": true, "data": {} })),
                    )
                }),
            )
            .route(
                "/api/user",
                get(|headers: HeaderMap| async move {
                    let cookie = headers
                        .get(header::COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if cookie.contains("session=fresh") {
                        (AxumStatus::OK, Json(json!({ "data": { "_id": "u-1" } })))
                    } else {
                        (AxumStatus::UNAUTHORIZED, Json(json!({ "cookie": cookie })))
                    }
                }),
            )
    }

    #[tokio::test]
    async fn login_session_wins_over_configured_cookie() {
        let config = Config {
            api_url: stub::serve(session_router()).await,
            credentials: Some(crate::config::Credentials {
                email: "ops@bank.com".into(),
                password: "Str0ng!pass".into(),
            }),
            session_cookie: Some("session=stale".into()),
            ..Config::default()
        };

        let client = ApiClient::connect(&config).await.unwrap();
        assert_eq!(client.current_user().await.unwrap().id, "u-1");
    }

    #[tokio::test]
    async fn configured_cookie_is_sent_without_credentials() {
        let config = Config {
            api_url: stub::serve(session_router()).await,
            session_cookie: Some("session=fresh".into()),
            ..Config::default()
        };

        let client = ApiClient::connect(&config).await.unwrap();
        assert_eq!(client.current_user().await.unwrap().id, "u-1");
    }
}
