use dotenv::dotenv;
use foodsnap::api_connection::{
    connection::{ApiConnectionError, ContentGenerator},
    endpoints::{GenerateContentRequest, Part, Provider, GEMINI_MODELS},
};
use foodsnap::ingredient_identifier::identify_ingredients_from_image;
use foodsnap::model::{Ingredient, UserPreferences};
use foodsnap::recipe_suggester::suggest_recipes;
use serde_json::json;
use std::env;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_API_KEY_ENV_VAR: &str = "API_KEY";

fn get_test_model() -> String {
    GEMINI_MODELS
        .iter()
        .find(|m| m.supports_images)
        .map(|m| m.model_name.to_string())
        .expect("No image-capable model found in GEMINI_MODELS for testing")
}

fn setup_test_environment() {
    dotenv().ok();
}

fn gemini_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "index": 0
        }]
    })
}

fn mock_provider(key_env: &str, server: &MockServer) -> Provider {
    env::set_var(key_env, "test-key");
    Provider::gemini(key_env, "gemini-test").with_base_url(&server.uri())
}

fn hello_request() -> GenerateContentRequest {
    GenerateContentRequest::json_from_parts(vec![Part::text("Hola")])
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider = Provider::gemini("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_FOODSNAP", &get_test_model());
    let result = provider.generate_text(hello_request()).await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
    if let Err(ApiConnectionError::MissingApiKey(key_name)) = result {
        assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_FOODSNAP");
    }
}

#[tokio::test]
async fn test_generate_content_sends_key_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("[]")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = mock_provider("FOODSNAP_TEST_KEY_OK", &server);
    let text = provider.generate_text(hello_request()).await.unwrap();
    assert_eq!(text, "[]");
}

#[tokio::test]
async fn test_api_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_string(r#"{"error": {"code": 503, "status": "UNAVAILABLE"}}"#),
        )
        .mount(&server)
        .await;

    let provider = mock_provider("FOODSNAP_TEST_KEY_503", &server);
    let result = provider.generate_text(hello_request()).await;
    match result {
        Err(err @ ApiConnectionError::ApiError { .. }) => {
            assert!(err.is_service_unavailable());
            if let ApiConnectionError::ApiError { status, error_body } = err {
                assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
                assert!(error_body.contains("UNAVAILABLE"));
            }
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_response_without_text_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let provider = mock_provider("FOODSNAP_TEST_KEY_EMPTY", &server);
    let result = provider.generate_text(hello_request()).await;
    assert!(matches!(result, Err(ApiConnectionError::EmptyResponse)));
}

#[tokio::test]
async fn test_identification_over_http_recovers_fenced_output() {
    let server = MockServer::start().await;
    let model_text = "```json\n[{\"name\": \"Tomate\", \"quantity\": \"3 unidades\"}, {\"name\": \"Cebolla\"}]\n```";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(model_text)))
        .mount(&server)
        .await;

    let provider = mock_provider("FOODSNAP_TEST_KEY_IDENTIFY", &server);
    let ingredients = identify_ingredients_from_image(&provider, "data:image/jpeg;base64,/9j/4AAQ")
        .await
        .unwrap();
    assert_eq!(ingredients.len(), 2);
    assert_eq!(ingredients[0].name, "Tomate");
    assert_eq!(ingredients[1].quantity, "1 unidad");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["data"], "/9j/4AAQ");
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
}

#[tokio::test]
async fn test_invalid_data_url_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("[]")))
        .expect(0)
        .mount(&server)
        .await;

    let provider = mock_provider("FOODSNAP_TEST_KEY_INVALID", &server);
    let result = identify_ingredients_from_image(&provider, "data:image/png;base64").await;
    assert!(matches!(result, Err(ApiConnectionError::InvalidInput(_))));
}

#[tokio::test]
#[ignore]
async fn test_live_recipe_suggestion() {
    setup_test_environment();
    if env::var(TEST_API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_live_recipe_suggestion: {} not set.",
            TEST_API_KEY_ENV_VAR
        );
        return;
    }

    let provider = Provider::gemini(TEST_API_KEY_ENV_VAR, &get_test_model());
    let ingredients = vec![
        Ingredient {
            id: "1".to_string(),
            name: "Huevos".to_string(),
            quantity: "6 unidades".to_string(),
            state: None,
        },
        Ingredient {
            id: "2".to_string(),
            name: "Patatas".to_string(),
            quantity: "1 kg".to_string(),
            state: None,
        },
    ];
    let result = suggest_recipes(&provider, &ingredients, &UserPreferences::default()).await;
    assert!(result.is_ok(), "API call failed: {:?}", result.err());
    let recipes = result.unwrap();
    assert!(!recipes.is_empty());
    assert!(recipes.iter().all(|r| r.image_url.is_some()));
}
