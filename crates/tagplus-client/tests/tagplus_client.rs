//! Integration tests for `TagPlusClient`.
//!
//! Uses `wiremock` to stand up a local HTTP server per test so no real
//! network traffic is made. Token state lives in an in-process store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tagplus_core::{
    BatchJob, BatchJobStatus, BatchJobStore, NewBatchJob, PluginOptions, StoreResult, TokenState,
    TokenStore, IMPORT_JOB_TYPE,
};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tagplus_client::{ClientError, TagPlusClient};

#[derive(Default)]
struct MemoryTokens {
    state: Mutex<Option<TokenState>>,
}

impl MemoryTokens {
    fn with(state: TokenState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Some(state)),
        })
    }

    fn current(&self) -> Option<TokenState> {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokens {
    async fn load_tokens(&self) -> StoreResult<Option<TokenState>> {
        Ok(self.current())
    }

    async fn save_tokens(&self, tokens: &TokenState) -> StoreResult<()> {
        *self.state.lock().unwrap() = Some(tokens.clone());
        Ok(())
    }
}

fn test_client(server: &MockServer, tokens: Arc<MemoryTokens>) -> TagPlusClient {
    let options = PluginOptions {
        api_url: server.uri(),
        api_version: "2.0".to_string(),
        client_id: "cid".to_string(),
        client_secret: "csecret".to_string(),
        scopes: "read:produtos".to_string(),
        authorize_url: "https://developers.tagplus.com.br/authorize".to_string(),
    };
    TagPlusClient::new(options, tokens, 5).expect("failed to build test TagPlusClient")
}

fn valid_tokens(access: &str) -> TokenState {
    TokenState {
        access_token: Some(access.to_string()),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(Utc::now().timestamp_millis() + 3_600_000),
    }
}

// ---------------------------------------------------------------------------
// Token lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verify_without_any_tokens_reports_unauthorized_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(TokenState::default()));
    let auth = client.verify_authorization().await.unwrap();

    assert!(!auth.is_authorized);
    assert_eq!(auth.access_token, None);
}

#[tokio::test]
async fn verify_without_a_store_reports_unauthorized() {
    let server = MockServer::start().await;
    let client = test_client(&server, Arc::new(MemoryTokens::default()));

    let auth = client.verify_authorization().await.unwrap();

    assert!(!auth.is_authorized);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn verify_refreshes_an_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("client_secret=csecret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "expires_in": 86_400,
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MemoryTokens::with(TokenState {
        access_token: Some("stale".to_string()),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(Utc::now().timestamp_millis() - 1_000),
    });
    let client = test_client(&server, Arc::clone(&tokens));

    let call_time = Utc::now().timestamp_millis();
    let auth = client.verify_authorization().await.unwrap();

    assert!(auth.is_authorized);
    assert_eq!(auth.access_token.as_deref(), Some("fresh"));
    let saved = tokens.current().unwrap();
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-2"));
    assert!(saved.expires_at.unwrap() >= call_time + 86_400_000);
}

#[tokio::test]
async fn valid_token_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let auth = client.verify_authorization().await.unwrap();

    assert!(auth.is_authorized);
    assert_eq!(auth.access_token.as_deref(), Some("live"));
}

#[tokio::test]
async fn authorize_persists_an_absolute_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("client_id=cid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "granted",
            "refresh_token": "refresh-9",
            "expires_in": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MemoryTokens::with(TokenState::default());
    let client = test_client(&server, Arc::clone(&tokens));

    let before = Utc::now().timestamp_millis();
    let token = client.authorize("abc123").await.unwrap();

    assert_eq!(token.access_token, "granted");
    assert_eq!(token.expires_in, 3600);
    let saved = tokens.current().unwrap();
    assert_eq!(saved.access_token.as_deref(), Some("granted"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-9"));
    let expires_at = saved.expires_at.unwrap();
    assert!(expires_at >= before + 3_600_000);
    assert!(expires_at <= Utc::now().timestamp_millis() + 3_600_000);
}

#[tokio::test]
async fn rejected_code_surfaces_vendor_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Authorization code expired"
        })))
        .mount(&server)
        .await;

    let tokens = MemoryTokens::with(TokenState::default());
    let client = test_client(&server, Arc::clone(&tokens));
    let err = client.authorize("old").await.unwrap_err();

    assert!(
        matches!(err, ClientError::UnexpectedState(ref message) if message == "Authorization code expired"),
        "expected UnexpectedState with vendor message, got: {err:?}"
    );
    assert_eq!(tokens.current(), Some(TokenState::default()));
}

#[tokio::test]
async fn refresh_without_refresh_token_is_a_no_op() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(TokenState::default()));
    assert!(client.refresh_token().await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Catalog fetches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_products_sends_filters_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/produtos"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "100"))
        .and(query_param("ativo", "1"))
        .and(query_param("sincroniza", "1"))
        .and(query_param("sort", "-data_alteracao"))
        .and(header("x-api-version", "2.0"))
        .and(header("accept", "application/json"))
        .and(header("authorization", "Bearer live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "ativo": 1, "sincroniza": 1, "descricao": "Caneca", "valor_venda_varejo": 25.5 },
            { "id": 2, "ativo": 1, "sincroniza": 1, "descricao": "Prato", "valor_venda_varejo": 40 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let products = client.retrieve_products(2, 100).await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].description, "Caneca");
    assert!((products[1].retail_price - 40.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn product_page_keeps_records_a_typed_decode_would_reject() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/produtos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "descricao": "Caneca", "valor_venda_varejo": 25.5 },
            { "id": 2, "descricao": "Prato", "categoria": [] }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));

    let typed = client.retrieve_products(1, 100).await.unwrap_err();
    assert!(matches!(typed, ClientError::Deserialize { .. }));

    let page = client.retrieve_product_page(1, 100).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[1]["id"], json!(2));
}

#[tokio::test]
async fn retrieve_category_maps_not_found_to_unexpected_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categorias/9"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "not_found",
                "message": "Categoria não encontrada"
            })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let err = client.retrieve_category(9).await.unwrap_err();

    assert!(
        matches!(err, ClientError::UnexpectedState(ref message) if message == "Categoria não encontrada"),
        "expected UnexpectedState, got: {err:?}"
    );
}

#[tokio::test]
async fn server_error_without_body_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categorias"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let err = client.retrieve_categories().await.unwrap_err();

    assert!(
        matches!(err, ClientError::UnexpectedState(ref message) if message.contains("503")),
        "expected UnexpectedState mentioning 503, got: {err:?}"
    );
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/produtos/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let err = client.retrieve_product(5).await.unwrap_err();

    assert!(
        matches!(err, ClientError::Deserialize { .. }),
        "expected Deserialize, got: {err:?}"
    );
}

#[tokio::test]
async fn retrieve_product_images_reads_image_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/produtos/imagens/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 70, "principal": 1, "extensao": "png", "url": "https://cdn.example/70.png" },
            { "id": "71", "principal": 0, "extensao": "jpg", "url": null, "base64": "aGk=" }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let images = client.retrieve_product_images(7).await.unwrap();

    assert_eq!(images.len(), 2);
    assert!(images[0].primary);
    assert_eq!(images[1].id, "71");
    assert_eq!(images[1].base64.as_deref(), Some("aGk="));
}

#[tokio::test]
async fn every_request_pays_for_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "refresh_token": "refresh-2",
            "expires_in": 60
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categorias"))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MemoryTokens::with(TokenState {
        access_token: None,
        refresh_token: Some("refresh-1".to_string()),
        expires_at: None,
    });
    let client = test_client(&server, tokens);

    let categories = client.retrieve_categories().await.unwrap();
    assert!(categories.is_empty());
}

// ---------------------------------------------------------------------------
// Job enqueue
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingJobs {
    created: Mutex<Vec<NewBatchJob>>,
}

#[async_trait]
impl BatchJobStore for RecordingJobs {
    async fn create_job(&self, job: &NewBatchJob) -> StoreResult<BatchJob> {
        self.created.lock().unwrap().push(job.clone());
        Ok(BatchJob {
            id: Uuid::new_v4(),
            job_type: job.job_type.clone(),
            status: BatchJobStatus::Created,
            context: job.context.clone(),
            result: json!({}),
            created_by: job.created_by.clone(),
            dry_run: job.dry_run,
            attempts: 0,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn retrieve_job(&self, _id: Uuid) -> StoreResult<Option<BatchJob>> {
        Ok(None)
    }

    async fn set_job_status(
        &self,
        _id: Uuid,
        _status: BatchJobStatus,
        _error_message: Option<&str>,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn update_job_result(&self, _id: Uuid, _result: &serde_json::Value) -> StoreResult<()> {
        Ok(())
    }

    async fn record_job_attempt(&self, _id: Uuid) -> StoreResult<i32> {
        Ok(1)
    }

    async fn list_unfinished_jobs(&self, _job_type: &str) -> StoreResult<Vec<BatchJob>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn sync_products_enqueues_an_import_job_without_the_secret() {
    let server = MockServer::start().await;
    let client = test_client(&server, MemoryTokens::with(valid_tokens("live")));
    let jobs = RecordingJobs::default();

    let job = client.sync_products(&jobs).await.unwrap();

    assert_eq!(job.job_type, IMPORT_JOB_TYPE);
    assert!(!job.dry_run);
    assert_eq!(job.context["options"]["clientId"], "cid");
    assert_eq!(job.context["options"]["clientSecret"], "[redacted]");
    assert_eq!(jobs.created.lock().unwrap().len(), 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}
