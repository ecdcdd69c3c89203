//! Client tests against an in-process scripted AMI server.
//!
//! Each test starts its own listener on 127.0.0.1:0 and records every action
//! block the client sends.

use ami_queue_status::{
    AmiConfig, AmiError, AmiResult, ConnectionState, MemberDirectory, MemberStatus, MonitorMode,
    OutcomeStatus, QueueStatusClient, SpyMode, StaticMemberDirectory,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

fn block(pairs: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (k, v) in pairs {
        out.push_str(&format!("{}: {}\r\n", k, v));
    }
    out.push_str("\r\n");
    out
}

#[derive(Clone, Default)]
struct Script {
    status_blocks: Vec<String>,
    queue_blocks: Vec<String>,
    reject_login: bool,
    originate_reply: Option<String>,
    /// First connection closes when it receives Ping.
    close_on_first_ping: bool,
    /// First connection answers Ping only after this long.
    first_ping_delay: Duration,
    /// First connection sends a partial Status sequence, then closes.
    cut_first_status: bool,
    status_error: bool,
    status_delay: Duration,
}

struct MockPbx {
    port: u16,
    blocks: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockPbx {
    async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let port = listener
            .local_addr()
            .unwrap()
            .port();
        let blocks = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);

        let log = blocks.clone();
        let count = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener
                .accept()
                .await
            {
                let index = count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, script.clone(), log.clone(), index));
            }
        });

        Self {
            port,
            blocks,
            connections,
        }
    }

    fn config(&self) -> AmiConfig {
        AmiConfig {
            port: self.port,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(500),
            originate_timeout: Duration::from_secs(1),
            ..AmiConfig::default()
        }
    }

    fn actions(&self) -> Vec<String> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .map(|b| action_name(b))
            .collect()
    }

    fn count(&self, name: &str) -> usize {
        self.actions()
            .iter()
            .filter(|a| *a == name)
            .count()
    }

    fn last_block(&self, name: &str) -> Option<String> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|b| action_name(b) == name)
            .cloned()
    }

    fn connections(&self) -> usize {
        self.connections
            .load(Ordering::SeqCst)
    }
}

fn action_name(block: &str) -> String {
    block
        .lines()
        .find_map(|l| l.strip_prefix("Action: "))
        .unwrap_or("")
        .to_string()
}

async fn read_action(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut block = String::new();
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .ok()?;
        if n == 0 {
            return None;
        }
        block.push_str(&line);
        if block.ends_with("\r\n\r\n") {
            return Some(block);
        }
    }
}

async fn send(writer: &mut OwnedWriteHalf, text: &str) -> bool {
    writer
        .write_all(text.as_bytes())
        .await
        .is_ok()
}

fn sequence(ack: &str, blocks: &[String], complete: &str) -> String {
    let mut out = block(&[
        ("Response", "Success"),
        ("EventList", "start"),
        ("Message", ack),
    ]);
    for b in blocks {
        out.push_str(b);
    }
    out.push_str(&block(&[
        ("Event", complete),
        ("EventList", "Complete"),
        ("ListItems", &blocks.len().to_string()),
    ]));
    out
}

async fn serve(
    stream: TcpStream,
    script: Arc<Script>,
    log: Arc<Mutex<Vec<String>>>,
    index: usize,
) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    if !send(&mut writer, "Asterisk Call Manager/5.0.1\r\n").await {
        return;
    }
    let first = index == 0;

    while let Some(request) = read_action(&mut reader).await {
        let action = action_name(&request);
        log.lock()
            .unwrap()
            .push(request);

        let reply = match action.as_str() {
            "Login" if script.reject_login => {
                send(
                    &mut writer,
                    &block(&[("Response", "Error"), ("Message", "Authentication failed")]),
                )
                .await;
                return;
            }
            "Login" => block(&[("Response", "Success"), ("Message", "Authentication accepted")]),
            "Ping" if first && script.close_on_first_ping => return,
            "Ping" if first && !script.first_ping_delay.is_zero() => {
                tokio::time::sleep(script.first_ping_delay).await;
                block(&[("Response", "Success"), ("Ping", "Pong")])
            }
            "Ping" => block(&[
                ("Response", "Success"),
                ("Ping", "Pong"),
                ("Timestamp", "1700000000.000000"),
            ]),
            "Status" if script.status_error => {
                block(&[("Response", "Error"), ("Message", "Permission denied")])
            }
            "Status" if first && script.cut_first_status => {
                let mut partial = block(&[
                    ("Response", "Success"),
                    ("Message", "Channel status will follow"),
                ]);
                if let Some(b) = script
                    .status_blocks
                    .first()
                {
                    partial.push_str(b);
                }
                send(&mut writer, &partial).await;
                return;
            }
            "Status" => {
                tokio::time::sleep(script.status_delay).await;
                sequence(
                    "Channel status will follow",
                    &script.status_blocks,
                    "StatusComplete",
                )
            }
            "QueueStatus" => sequence(
                "Queue status will follow",
                &script.queue_blocks,
                "QueueStatusComplete",
            ),
            "Originate" => script
                .originate_reply
                .clone()
                .unwrap_or_else(|| {
                    block(&[
                        ("Response", "Success"),
                        ("Message", "Originate successfully queued"),
                    ])
                }),
            "Logoff" => {
                send(
                    &mut writer,
                    &block(&[("Response", "Goodbye"), ("Message", "Thanks for all the fish.")]),
                )
                .await;
                return;
            }
            _ => block(&[("Response", "Error"), ("Message", "Invalid/unknown command")]),
        };
        if !send(&mut writer, &reply).await {
            return;
        }
    }
}

fn queue_params(queue: &str, waiting: &str) -> String {
    block(&[
        ("Event", "QueueParams"),
        ("Queue", queue),
        ("Max", "0"),
        ("Strategy", "ringall"),
        ("Calls", waiting),
        ("Holdtime", "0"),
        ("TalkTime", "0"),
        ("Completed", "12"),
        ("Abandoned", "1"),
        ("ServiceLevel", "60"),
        ("ServiceLevelPerf", "91.7"),
        ("Weight", "0"),
    ])
}

fn queue_member(queue: &str, interface: &str, name: &str, status: &str) -> String {
    block(&[
        ("Event", "QueueMember"),
        ("Queue", queue),
        ("Name", name),
        ("Location", interface),
        ("StateInterface", interface),
        ("Membership", "static"),
        ("Penalty", "0"),
        ("CallsTaken", "4"),
        ("LastCall", "0"),
        ("InCall", "0"),
        ("Status", status),
        ("Paused", "0"),
        ("PausedReason", ""),
    ])
}

fn status_channel(channel: &str, connected: &str, caller: &str, app: &str, data: &str) -> String {
    block(&[
        ("Event", "Status"),
        ("Privilege", "Call"),
        ("Channel", channel),
        ("ChannelState", "6"),
        ("ChannelStateDesc", "Up"),
        ("CallerIDNum", caller),
        ("CallerIDName", "<unknown>"),
        ("ConnectedLineNum", connected),
        ("ConnectedLineName", "Customer"),
        ("Application", app),
        ("Data", data),
    ])
}

fn idle_system() -> Script {
    Script {
        queue_blocks: vec![
            queue_params("support", "0"),
            queue_member("support", "PJSIP/102", "PJSIP/102", "1"),
        ],
        ..Script::default()
    }
}

fn active_call_system() -> Script {
    Script {
        status_blocks: vec![status_channel(
            "PJSIP/102-00000001",
            "201",
            "102",
            "AppQueue",
            "(Outgoing Line)",
        )],
        queue_blocks: vec![
            queue_params("support", "1"),
            queue_member("support", "PJSIP/102", "PJSIP/102", "2"),
        ],
        ..Script::default()
    }
}

fn monitored_system() -> Script {
    let mut script = active_call_system();
    script
        .status_blocks
        .push(status_channel(
            "PJSIP/104-00000002",
            "<unknown>",
            "104",
            "ChanSpy",
            "PJSIP/102,qw",
        ));
    script
}

#[tokio::test]
async fn idle_member_is_online_without_call() {
    let pbx = MockPbx::start(idle_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    let queues = client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(queues.len(), 1);
    let queue = &queues[0];
    assert_eq!(queue.name, "support");
    assert_eq!(queue.strategy, "ringall");
    assert_eq!(queue.answered, 12);
    assert_eq!(queue.service_level, 91.7);

    let member = &queue.members[0];
    assert_eq!(member.number, "102");
    assert_eq!(member.status, MemberStatus::Online);
    assert!(member
        .connected_party
        .is_none());
    assert!(member
        .monitor_status
        .is_none());
    assert_eq!(client.connection_state().await, ConnectionState::Ready);
}

#[tokio::test]
async fn active_call_shows_connected_party_and_directory_name() {
    let pbx = MockPbx::start(active_call_system()).await;
    let directory = Arc::new(StaticMemberDirectory::new([("PJSIP/102", "Alice Agent")]));
    let client = QueueStatusClient::with_directory(pbx.config(), directory);

    let queues = client
        .fetch_queue_status()
        .await
        .unwrap();
    let member = &queues[0].members[0];
    assert_eq!(member.name, "Alice Agent");
    assert_eq!(member.status, MemberStatus::Busy);
    let party = member
        .connected_party
        .as_ref()
        .unwrap();
    assert_eq!(party.num, "201");
    assert_eq!(party.name, "Customer");
    assert_eq!(queues[0].calls_waiting, 1);
}

#[tokio::test]
async fn spy_leg_reported_on_target_member() {
    let pbx = MockPbx::start(monitored_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    let queues = client
        .fetch_queue_status()
        .await
        .unwrap();
    let member = &queues[0].members[0];
    let monitor = member
        .monitor_status
        .as_ref()
        .unwrap();
    assert_eq!(monitor.observer, "104");
    assert_eq!(monitor.mode, MonitorMode::Whisper);
    assert_eq!(
        member
            .connected_party
            .as_ref()
            .unwrap()
            .num,
        "201"
    );

    let json = serde_json::to_value(&queues).unwrap();
    assert_eq!(json[0]["members"][0]["spyStatus"]["spyer"], "104");
    assert_eq!(json[0]["members"][0]["spyStatus"]["mode"], "Whisper");
}

#[tokio::test]
async fn consecutive_polls_reuse_session_and_agree() {
    let pbx = MockPbx::start(monitored_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    let first = client
        .fetch_queue_status()
        .await
        .unwrap();
    let second = client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(first, second);

    assert_eq!(pbx.count("Login"), 1);
    assert_eq!(pbx.count("Ping"), 1);
    assert_eq!(pbx.connections(), 1);
    assert_eq!(
        pbx.actions(),
        vec!["Login", "Status", "QueueStatus", "Ping", "Status", "QueueStatus"]
    );
    let login = pbx
        .last_block("Login")
        .unwrap();
    assert!(login.contains("Events: off\r\n"));
}

#[tokio::test]
async fn failed_probe_reconnects_exactly_once() {
    let pbx = MockPbx::start(Script {
        close_on_first_ping: true,
        ..idle_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    client
        .fetch_queue_status()
        .await
        .unwrap();
    let queues = client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(queues.len(), 1);

    assert_eq!(pbx.connections(), 2);
    assert_eq!(pbx.count("Login"), 2);
    assert_eq!(pbx.count("Ping"), 1);
}

#[tokio::test]
async fn slow_ping_reply_reconnects_exactly_once() {
    let pbx = MockPbx::start(Script {
        first_ping_delay: Duration::from_millis(800),
        ..idle_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    client
        .fetch_queue_status()
        .await
        .unwrap();
    let queues = client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(queues.len(), 1);
    assert_eq!(client.connection_state().await, ConnectionState::Ready);

    assert_eq!(pbx.connections(), 2);
    assert_eq!(pbx.count("Login"), 2);
    assert_eq!(pbx.count("Ping"), 1);
}

struct StalledDirectory;

#[async_trait]
impl MemberDirectory for StalledDirectory {
    async fn load_members(&self) -> AmiResult<Vec<(String, String)>> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn stalled_directory_does_not_hold_the_session() {
    let pbx = MockPbx::start(idle_system()).await;
    let config = AmiConfig {
        directory_timeout: Duration::from_millis(200),
        ..pbx.config()
    };
    let client = QueueStatusClient::with_directory(config, Arc::new(StalledDirectory));

    let started = std::time::Instant::now();
    let (queues, outcome) = tokio::join!(
        client.fetch_queue_status(),
        client.trigger_monitor("104", "PJSIP/102", SpyMode::Spy)
    );
    assert!(started.elapsed() < Duration::from_secs(3));

    let queues = queues.unwrap();
    assert_eq!(queues[0].members[0].name, "PJSIP/102");
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(pbx.count("Originate"), 1);
}

#[tokio::test]
async fn rejected_login_is_auth_failure() {
    let pbx = MockPbx::start(Script {
        reject_login: true,
        ..idle_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    let err = client
        .fetch_queue_status()
        .await
        .unwrap_err();
    assert!(matches!(err, AmiError::AuthFailed { .. }));
    assert!(client
        .get_queue_status()
        .await
        .is_empty());
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    assert_eq!(pbx.count("Status"), 0);
}

#[tokio::test]
async fn dropped_connection_degrades_then_recovers() {
    let pbx = MockPbx::start(Script {
        cut_first_status: true,
        ..active_call_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    assert!(client
        .get_queue_status()
        .await
        .is_empty());
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);

    let queues = client
        .get_queue_status()
        .await;
    assert_eq!(queues.len(), 1);
    assert_eq!(pbx.connections(), 2);
    // the discarded session is not probed
    assert_eq!(pbx.count("Ping"), 0);
}

#[tokio::test]
async fn status_error_aborts_poll_but_keeps_session() {
    let pbx = MockPbx::start(Script {
        status_error: true,
        ..idle_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    let err = client
        .fetch_queue_status()
        .await
        .unwrap_err();
    assert!(matches!(err, AmiError::ActionRejected { ref response } if response == "Permission denied"));
    assert_eq!(client.connection_state().await, ConnectionState::Ready);
    assert_eq!(pbx.count("QueueStatus"), 0);

    assert!(client
        .get_queue_status()
        .await
        .is_empty());
    assert_eq!(pbx.count("Login"), 1);
    assert_eq!(pbx.count("Ping"), 1);
}

#[tokio::test]
async fn concurrent_polls_do_not_interleave() {
    let pbx = MockPbx::start(Script {
        status_delay: Duration::from_millis(50),
        ..active_call_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    let (a, b) = tokio::join!(client.fetch_queue_status(), client.fetch_queue_status());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(
        pbx.actions(),
        vec!["Login", "Status", "QueueStatus", "Ping", "Status", "QueueStatus"]
    );
}

#[tokio::test]
async fn monitor_success() {
    let pbx = MockPbx::start(idle_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    let outcome = client
        .trigger_monitor("104", "PJSIP/102", SpyMode::Whisper)
        .await;
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.message, "Spy whisper initiated for PJSIP/102");

    let originate = pbx
        .last_block("Originate")
        .unwrap();
    assert_eq!(
        originate,
        "Action: Originate\r\n\
         Channel: PJSIP/104\r\n\
         Application: ChanSpy\r\n\
         Data: PJSIP/102,dq\r\n\
         CallerID: \"Spy: PJSIP/102\" <104>\r\n\
         Variable: VAR1=SpyAction\r\n\
         Async: true\r\n\r\n"
    );
}

#[tokio::test]
async fn monitor_rejection_returns_raw_reply() {
    let pbx = MockPbx::start(Script {
        originate_reply: Some(block(&[("Response", "Error"), ("Message", "Originate failed")])),
        ..idle_system()
    })
    .await;
    let client = QueueStatusClient::new(pbx.config());

    let outcome = client
        .trigger_monitor("104", "PJSIP/102", SpyMode::Spy)
        .await;
    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(outcome.message, "AMI error: Response: Error\r\nMessage: Originate failed");

    // session survives a rejected originate
    client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(pbx.count("Login"), 1);
}

#[tokio::test]
async fn monitor_rejects_newline_injection_without_sending() {
    let pbx = MockPbx::start(idle_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    let outcome = client
        .trigger_monitor("104", "PJSIP/102\r\nAction: Hangup", SpyMode::Spy)
        .await;
    assert!(!outcome.is_success());
    assert_eq!(pbx.count("Originate"), 0);
}

#[tokio::test]
async fn disconnect_sends_logoff() {
    let pbx = MockPbx::start(idle_system()).await;
    let client = QueueStatusClient::new(pbx.config());

    client
        .fetch_queue_status()
        .await
        .unwrap();
    client
        .disconnect()
        .await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    assert_eq!(pbx.count("Logoff"), 1);

    client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(pbx.connections(), 2);
}
