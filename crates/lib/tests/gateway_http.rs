//! Integration test: serve the gateway router on a free loopback port with fake LINE and Slack
//! clients and drive it over HTTP.

use async_trait::async_trait;
use linebridge::config::Config;
use linebridge::gateway::{self, GatewayState};
use linebridge::line::{
    self, GroupSummary, LineApi, LineError, MessageContent, Profile, SIGNATURE_HEADER,
};
use linebridge::relay::OutboundMessage;
use linebridge::slack::{SlackError, SlackPublisher};
use std::sync::Arc;
use tokio::sync::Mutex;

const SECRET: &str = "channel-secret";

#[derive(Default)]
struct FakeLine {
    calls: Mutex<Vec<String>>,
    fail_profiles: bool,
}

#[async_trait]
impl LineApi for FakeLine {
    async fn group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Profile, LineError> {
        self.calls.lock().await.push(format!("profile {}/{}", group_id, user_id));
        if self.fail_profiles {
            return Err(LineError::Api("404 Not Found".to_string()));
        }
        Ok(Profile {
            display_name: "Taro".to_string(),
            user_id: user_id.to_string(),
            picture_url: None,
        })
    }

    async fn group_summary(&self, group_id: &str) -> Result<GroupSummary, LineError> {
        self.calls.lock().await.push(format!("summary {}", group_id));
        Ok(GroupSummary {
            group_id: group_id.to_string(),
            group_name: "Climbing".to_string(),
            picture_url: None,
        })
    }

    async fn message_content(
        &self,
        message_id: &str,
        _limit: Option<usize>,
    ) -> Result<MessageContent, LineError> {
        self.calls.lock().await.push(format!("content {}", message_id));
        Ok(MessageContent {
            data: b"%PDF-1.7".to_vec(),
            content_type: Some("application/pdf".to_string()),
            content_length: Some(8),
        })
    }
}

#[derive(Default)]
struct FakeSlack {
    posted: Mutex<Vec<OutboundMessage>>,
    panic_on_publish: bool,
}

#[async_trait]
impl SlackPublisher for FakeSlack {
    async fn publish(&self, channel_id: &str, message: &OutboundMessage) -> Result<(), SlackError> {
        assert_eq!(channel_id, "C0SLACK");
        if self.panic_on_publish {
            panic!("slack publisher blew up");
        }
        self.posted.lock().await.push(message.clone());
        Ok(())
    }
}

fn sign(secret: &str, body: &str) -> String {
    line::sign_body(secret, body.as_bytes()).expect("sign body")
}

fn config() -> Config {
    Config {
        line_channel_secret: SECRET.to_string(),
        slack_channel_id: "C0SLACK".to_string(),
        ..Config::default()
    }
}

async fn spawn_gateway(line: Arc<FakeLine>, slack: Arc<FakeSlack>) -> String {
    let state = GatewayState::new(config(), line, slack);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, gateway::router(state)).await;
    });
    format!("http://{}", addr)
}

async fn post_callback(base: &str, body: &str, signature: Option<String>) -> (u16, String) {
    let mut req = reqwest::Client::new()
        .post(format!("{}/line_callback", base))
        .header("Content-Type", "application/json")
        .body(body.to_string());
    if let Some(sig) = signature {
        req = req.header(SIGNATURE_HEADER, sig);
    }
    let resp = req.send().await.expect("send callback");
    let status = resp.status().as_u16();
    (status, resp.text().await.expect("read body"))
}

const GROUP_BATCH: &str = r#"{"destination":"Ubot","events":[
    {"type":"message","source":{"type":"group","groupId":"C1","userId":"U1"},
     "message":{"type":"text","id":"1","text":"anyone up for Sunday?"}},
    {"type":"message","source":{"type":"group","groupId":"C1","userId":"U1"},
     "message":{"type":"sticker","id":"2","packageId":"446","stickerId":"1988"}},
    {"type":"message","source":{"type":"group","groupId":"C1","userId":"U1"},
     "message":{"type":"file","id":"3","fileName":"topo.pdf","fileSize":8}}
]}"#;

#[tokio::test]
async fn root_says_hello() {
    let base = spawn_gateway(Arc::default(), Arc::default()).await;
    let resp = reqwest::get(format!("{}/", base)).await.expect("GET /");
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello, World!");
}

#[tokio::test]
async fn signed_batch_is_relayed_in_order() {
    let line = Arc::new(FakeLine::default());
    let slack = Arc::new(FakeSlack::default());
    let base = spawn_gateway(line.clone(), slack.clone()).await;

    let sig = sign(SECRET, GROUP_BATCH);
    let (status, body) = post_callback(&base, GROUP_BATCH, Some(sig)).await;
    assert_eq!((status, body.as_str()), (200, "ok"));

    let posted = slack.posted.lock().await;
    assert_eq!(posted.len(), 3);
    assert_eq!(
        posted[0],
        OutboundMessage::Text {
            text: "[Climbing] Taro:\nanyone up for Sunday?".to_string()
        }
    );
    assert_eq!(
        posted[1],
        OutboundMessage::Attachment {
            text: "[Climbing] Taro:".to_string(),
            image_url: "https://stickershop.line-scdn.net/stickershop/v1/sticker/1988/android/sticker.png"
                .to_string()
        }
    );
    assert_eq!(
        posted[2],
        OutboundMessage::File {
            data: b"%PDF-1.7".to_vec(),
            filename: "topo.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            initial_comment: "[Climbing] Taro:".to_string()
        }
    );
}

#[tokio::test]
async fn bad_signature_is_rejected_without_calls() {
    let line = Arc::new(FakeLine::default());
    let slack = Arc::new(FakeSlack::default());
    let base = spawn_gateway(line.clone(), slack.clone()).await;

    let wrong = sign("not-the-secret", GROUP_BATCH);
    assert_eq!(
        post_callback(&base, GROUP_BATCH, Some(wrong)).await,
        (400, "Bad Request".to_string())
    );
    assert_eq!(
        post_callback(&base, GROUP_BATCH, None).await,
        (400, "Bad Request".to_string())
    );
    assert!(line.calls.lock().await.is_empty());
    assert!(slack.posted.lock().await.is_empty());
}

#[tokio::test]
async fn undecodable_body_is_internal_error() {
    let base = spawn_gateway(Arc::default(), Arc::default()).await;
    let body = r#"{"events": "not-a-list"}"#;
    let sig = sign(SECRET, body);
    assert_eq!(
        post_callback(&base, body, Some(sig)).await,
        (500, "Internal Server Error".to_string())
    );
}

#[tokio::test]
async fn batch_without_messages_is_ok_and_silent() {
    let line = Arc::new(FakeLine::default());
    let slack = Arc::new(FakeSlack::default());
    let base = spawn_gateway(line.clone(), slack.clone()).await;

    let body = r#"{"destination":"Ubot","events":[
        {"type":"join","source":{"type":"group","groupId":"C1"}},
        {"type":"memberJoined","source":{"type":"group","groupId":"C1"},"joined":{"members":[]}}
    ]}"#;
    let sig = sign(SECRET, body);
    assert_eq!(post_callback(&base, body, Some(sig)).await, (200, "ok".to_string()));
    assert!(line.calls.lock().await.is_empty());
    assert!(slack.posted.lock().await.is_empty());
}

#[tokio::test]
async fn failed_profile_lookup_still_relays() {
    let line = Arc::new(FakeLine {
        fail_profiles: true,
        ..Default::default()
    });
    let slack = Arc::new(FakeSlack::default());
    let base = spawn_gateway(line, slack.clone()).await;

    let body = r#"{"events":[
        {"type":"message","source":{"type":"group","groupId":"C1","userId":"U1"},
         "message":{"type":"text","id":"1","text":"one"}},
        {"type":"message","source":{"type":"group","groupId":"C1","userId":"U2"},
         "message":{"type":"text","id":"2","text":"two"}}
    ]}"#;
    let sig = sign(SECRET, body);
    assert_eq!(post_callback(&base, body, Some(sig)).await, (200, "ok".to_string()));

    let posted = slack.posted.lock().await;
    assert_eq!(
        *posted,
        vec![
            OutboundMessage::Text {
                text: "[Climbing] :\none".to_string()
            },
            OutboundMessage::Text {
                text: "[Climbing] :\ntwo".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn state_targets_configured_slack_channel() {
    let state = GatewayState::new(
        config(),
        Arc::new(FakeLine::default()),
        Arc::new(FakeSlack::default()),
    );
    assert_eq!(state.dispatcher.channel_id(), "C0SLACK");
}

#[tokio::test]
async fn panicking_handler_returns_500_and_server_keeps_serving() {
    let slack = Arc::new(FakeSlack {
        panic_on_publish: true,
        ..Default::default()
    });
    let base = spawn_gateway(Arc::default(), slack).await;

    let body = r#"{"events":[
        {"type":"message","source":{"type":"group","groupId":"C1","userId":"U1"},
         "message":{"type":"text","id":"1","text":"boom"}}
    ]}"#;
    let (status, _) = post_callback(&base, body, Some(sign(SECRET, body))).await;
    assert_eq!(status, 500);

    let resp = reqwest::get(format!("{}/", base)).await.expect("GET / after panic");
    assert_eq!(resp.status().as_u16(), 200);
}
