mod common;

use serde_json::json;

use blastgrid_core::net::messages::ServerMessage;
use blastgrid_core::snapshot::MatchState;

use common::{TestServer, ws_connect, ws_read_until, ws_spectate};

#[tokio::test]
async fn health_reports_counts() {
    let server = TestServer::new().await;
    server.create_lobby(9).await;

    let body: serde_json::Value = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"]["active"], 1);
    assert_eq!(body["sessions"]["players"], 0);
    assert_eq!(body["tournaments"], 0);
    assert!(body["connections"]["websocket"].is_number());
}

#[tokio::test]
async fn admin_lobby_lifecycle() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let lobbies = format!("{}/api/admin/lobbies", server.base_url());

    let resp = client
        .post(&lobbies)
        .json(&json!({ "code": "  grandfinal2026 ", "board_size": 12 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["code"], "grandfin");
    assert_eq!(created["board_size"], 13);

    let resp = client
        .post(&lobbies)
        .json(&json!({ "code": "grandfin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert!(err["error"].is_string());

    let listed: serde_json::Value =
        client.get(&lobbies).send().await.unwrap().json().await.unwrap();
    let list = listed["lobbies"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["code"], "grandfin");
    assert_eq!(list[0]["state"], "waiting");
    assert_eq!(list[0]["player_count"], 0);
    assert!(list[0]["created_at"].as_u64().unwrap() > 0);

    let resp = client
        .post(format!("{lobbies}/grandfin/end"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ended: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(ended, json!({ "success": true, "code": "grandfin" }));

    let resp = client
        .post(format!("{lobbies}/grandfin/end"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn admin_api_requires_token_when_configured() {
    let server = TestServer::with_admin_token("s3cret").await;
    let client = reqwest::Client::new();
    let lobbies = format!("{}/api/admin/lobbies", server.base_url());

    let resp = client.get(&lobbies).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(&lobbies)
        .header("Authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(&lobbies)
        .header("Authorization", "Bearer s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Health stays public.
    let resp = client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn controller_join_and_input_errors() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let join_url = format!("{}/api/controller/join", server.base_url());
    let input_url = format!("{}/api/controller/input", server.base_url());

    let resp = client
        .post(&join_url)
        .json(&json!({ "code": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let code = server.create_lobby(9).await;
    let resp = client
        .post(&join_url)
        .json(&json!({ "code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let joined: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(joined["ok"], true);
    let pid = joined["player_id"].as_u64().unwrap();
    assert_eq!(joined["name"], format!("Controller {pid}"));

    let cases = [
        (json!({ "code": "nope", "player_id": pid, "action": "bomb" }), 404),
        (json!({ "code": code, "player_id": pid + 100, "action": "bomb" }), 403),
        (json!({ "code": code, "player_id": pid, "action": "dance" }), 400),
        (json!({ "code": code, "player_id": pid, "action": "move" }), 400),
        (json!({ "code": code, "action": "bomb" }), 400),
        (json!({ "code": code, "player_id": pid, "action": "move", "direction": "UP" }), 200),
        (json!({ "code": code, "player_id": pid, "action": "bomb" }), 200),
    ];
    for (body, status) in cases {
        let resp = client.post(&input_url).json(&body).send().await.unwrap();
        assert_eq!(resp.status(), status, "body: {body}");
    }
}

#[tokio::test]
async fn controller_players_count_but_do_not_keep_sessions() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let code = server.create_lobby(9).await;

    for name in ["Pad A", "Pad B"] {
        let resp = client
            .post(format!("{}/api/controller/join", server.base_url()))
            .json(&json!({ "code": code, "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let mut spectator = ws_connect(&server.ws_url()).await;
    match ws_spectate(&mut spectator, &code).await {
        ServerMessage::Spectating(s) => {
            let names: Vec<&str> = s.snapshot.players.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, vec!["Pad A", "Pad B"]);
            assert_eq!(s.snapshot.state, MatchState::Waiting);
        },
        other => panic!("Expected Spectating, got: {other:?}"),
    }

    let listed: serde_json::Value = client
        .get(format!("{}/api/admin/lobbies", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["lobbies"][0]["player_count"], 2);
    assert_eq!(listed["lobbies"][0]["spectator_count"], 1);

    // The spectator leaving is the last connection.
    drop(spectator);
    for _ in 0..50 {
        let health: serde_json::Value = reqwest::get(format!("{}/health", server.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if health["sessions"]["active"] == 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("session {code} survived its last connection");
}

#[tokio::test]
async fn controller_moves_are_broadcast() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let code = server.create_lobby(9).await;

    let mut pids = Vec::new();
    for _ in 0..2 {
        let joined: serde_json::Value = client
            .post(format!("{}/api/controller/join", server.base_url()))
            .json(&json!({ "code": code }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        pids.push(joined["player_id"].as_u64().unwrap());
    }

    // Start through a websocket player, since the controller API has no start.
    let mut ws = ws_connect(&server.ws_url()).await;
    common::ws_join(&mut ws, &code, Some("Host")).await;
    common::ws_send_client_msg(&mut ws, &blastgrid_core::net::messages::ClientMessage::Start)
        .await;
    ws_read_until(&mut ws, |m| {
        matches!(m, ServerMessage::State(s) if s.snapshot.state == MatchState::Playing)
    })
    .await;

    let resp = client
        .post(format!("{}/api/controller/input", server.base_url()))
        .json(&json!({
            "code": code,
            "player_id": pids[0],
            "action": "move",
            "direction": "RIGHT",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let first = pids[0];
    ws_read_until(&mut ws, |m| {
        matches!(m, ServerMessage::State(s)
            if s.snapshot.player(first).is_some_and(|p| (p.x, p.y) == (2, 1)))
    })
    .await;
}
