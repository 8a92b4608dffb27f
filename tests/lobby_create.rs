mod support;

#[tokio::test]
async fn test_status_reports_no_matches_initially() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/status"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["matches"], 0);
    assert_eq!(body["players"], 0);
}

#[tokio::test]
async fn test_leaderboard_endpoint_returns_three_boards() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/leaderboard"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert!(body.get("coinLeaderBoard").is_some());
    assert!(body.get("winsLeaderBoard").is_some());
    assert!(body.get("killsLeaderBoard").is_some());
}
