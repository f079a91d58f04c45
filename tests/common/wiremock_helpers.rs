use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a mock HTTP server that serves HTML content at the specified path.
pub async fn mock_page_server(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code
/// for every request.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

/// Creates a mock forwarding proxy (ScraperAPI-style) that answers every
/// request carrying the given key with the page body verbatim.
///
/// The mock expects exactly `expected_calls` requests; MockServer verifies
/// that on drop.
pub async fn mock_forward_proxy_server(api_key: &str, html: &str, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("api_key", api_key))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(expected_calls)
        .mount(&server)
        .await;

    server
}

/// Creates a mock maps API server answering with the given JSON body.
pub async fn mock_maps_server(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    server
}
