use super::*;

#[test]
fn test_default_http_client_builds() {
    let _client = default_http_client();
}
