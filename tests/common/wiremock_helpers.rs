use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked resolvers answer on, mirroring `https://dns.google/resolve`.
pub const DOH_PATH: &str = "/resolve";

/// DoH JSON body with one MX answer per host, e.g. `"10 aspmx.l.google.com."`
pub fn mx_response_body(domain: &str, mx_hosts: &[&str]) -> serde_json::Value {
    let answers: Vec<serde_json::Value> = mx_hosts
        .iter()
        .enumerate()
        .map(|(i, host)| {
            serde_json::json!({
                "name": domain,
                "type": 15,  // MX record type
                "TTL": 300,
                "data": format!("{} {}.", (i + 1) * 10, host)
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "Status": 0,
        "TC": false,
        "RD": true,
        "RA": true,
        "AD": false,
        "CD": false,
        "Question": [{
            "name": domain,
            "type": 15
        }]
    });
    if !answers.is_empty() {
        body["Answer"] = serde_json::Value::Array(answers);
    }
    body
}

/// Mount an MX answer for `domain` on an existing mock server.
///
/// `expected_calls` of `Some(n)` makes the server verify, on drop, that the
/// domain was queried exactly `n` times.
pub async fn mount_mx_answer(
    server: &MockServer,
    domain: &str,
    mx_hosts: &[&str],
    expected_calls: Option<u64>,
) {
    let mock = Mock::given(method("GET"))
        .and(path(DOH_PATH))
        .and(query_param("name", domain))
        .and(query_param("type", "MX"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mx_response_body(domain, mx_hosts))
                .insert_header("content-type", "application/dns-json"),
        );

    match expected_calls {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

/// Creates a mock DNS-over-HTTPS server answering MX queries for one domain.
pub async fn mock_doh_server(domain: &str, mx_hosts: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    mount_mx_answer(&server, domain, mx_hosts, None).await;
    server
}

/// Resolver URL for a mock server
pub fn doh_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), DOH_PATH)
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "Status": 0 }))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}
