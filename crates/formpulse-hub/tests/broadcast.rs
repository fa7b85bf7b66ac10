mod common;

use common::{connect, hub, wait_until, FORM_A, FORM_B};
use formpulse_core::config::DEFAULT_WELCOME_MESSAGE;
use serde_json::json;

#[tokio::test]
async fn update_reaches_its_room_only() {
    let hub = hub(16);
    let mut a = connect(&hub, FORM_A, 16).await;
    let mut b = connect(&hub, FORM_B, 16).await;

    let welcome = a.expect_welcome().await;
    assert_eq!(welcome["formId"], FORM_A);
    assert_eq!(welcome["message"], DEFAULT_WELCOME_MESSAGE);
    b.expect_welcome().await;

    hub.broadcast(FORM_A, "analytics:update", json!({"totalResponses": 5}));

    let update = a.recv_json().await;
    assert_eq!(update["type"], "analytics:update");
    assert_eq!(update["formId"], FORM_A);
    assert_eq!(update["data"]["totalResponses"], 5);
    a.assert_silent().await;
    b.assert_silent().await;
}

#[tokio::test]
async fn every_member_sees_broadcasts_in_order() {
    let hub = hub(64);
    let mut peers = Vec::new();
    for _ in 0..3 {
        peers.push(connect(&hub, FORM_A, 64).await);
    }
    for peer in &mut peers {
        peer.expect_welcome().await;
    }

    for seq in 0..20 {
        hub.broadcast(FORM_A, "response:new", json!({"seq": seq}));
    }

    for peer in &mut peers {
        for seq in 0..20 {
            let frame = peer.recv_json().await;
            assert_eq!(frame["type"], "response:new");
            assert_eq!(frame["data"]["seq"], seq);
        }
        peer.assert_silent().await;
    }
    wait_until(|| hub.stats().dispatched() == 20).await;
}

#[tokio::test]
async fn unnormalized_ids_share_the_canonical_room() {
    let hub = hub(16);
    let mut a = connect(&hub, " /507F1F77BCF86CD799439011/ ", 16).await;
    let welcome = a.expect_welcome().await;
    assert_eq!(welcome["formId"], FORM_A);
    assert_eq!(hub.room_size(FORM_A), 1);
    assert_eq!(hub.room_size("507f1f77 bcf86cd7 99439011"), 1);

    hub.broadcast("/507f1f77bcf86cd799439011", "analytics:update", json!({}));
    assert_eq!(a.recv_json().await["formId"], FORM_A);
}

#[tokio::test]
async fn broadcast_to_empty_room_is_a_noop() {
    let hub = hub(16);
    let mut a = connect(&hub, FORM_A, 16).await;
    a.expect_welcome().await;

    hub.broadcast(FORM_B, "analytics:update", json!({"ignored": true}));
    hub.broadcast(FORM_A, "analytics:update", json!({"n": 1}));

    assert_eq!(a.recv_json().await["data"]["n"], 1);
    a.assert_silent().await;
    assert_eq!(hub.stats().dispatched(), 1);
    assert_eq!(hub.room_count(), 1);
}

#[tokio::test]
async fn malformed_identifiers_are_rejected_before_registration() {
    let hub = hub(16);
    for raw in ["abc", "", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
        assert!(formpulse_hub::RoomKey::normalize(raw).is_err());
    }
    hub.broadcast("abc", "analytics:update", json!({}));
    assert_eq!(hub.total_connections(), 0);
    assert_eq!(hub.room_size("abc"), 0);
}
