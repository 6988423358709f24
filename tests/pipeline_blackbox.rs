use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::TcpListener;

use vdbench_push::agent::Agent;
use vdbench_push::config::Config;
use vdbench_push::lifecycle::{LifecycleState, ShutdownSignal, Teardown};
use vdbench_push::record::{Schema, Snapshot};

const HEADER: &str = "Run  Interval  IOrate  MB/sec  bytes/io  read%  resp  read_resp\n";
const DEVICE_LINE: &str = "12:00:00.000 12:00:05.000 100.5 50.2 4096 70.0 1.25 0.9 2.1 15.3 22.8 0.7 4.0 12.5 3.1\n";
const DEVICE_LINE_NA: &str = "12:00:00.000 12:00:05.000 100.5 50.2 4096 70.0 1.25 0.9 2.1 15.3 22.8 0.7 4.0 12.5 N/A\n";
const DEVICE_LINE_NEXT: &str = "12:00:05.000 12:00:10.000 200.0 99.9 8192 60.0 1.50 1.1 2.2 16.0 23.0 0.8 5.0 13.0 3.5\n";

#[derive(Debug, Clone)]
struct Request {
    method: Method,
    path: String,
    body: String,
}

#[derive(Clone, Default)]
struct Pushgateway {
    requests: Arc<Mutex<Vec<Request>>>,
    reject_puts: bool,
}

impl Pushgateway {
    fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    fn methods(&self) -> Vec<Method> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

async fn handle(
    State(gw): State<Pushgateway>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    let rejected = gw.reject_puts && method == Method::PUT;
    gw.requests.lock().push(Request {
        method,
        path: uri.path().to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    if rejected {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn spawn_pushgateway(gw: Pushgateway) -> String {
    let app = Router::new().fallback(handle).with_state(gw);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    // No scheme: the client defaults to http.
    addr.to_string()
}

fn config(gateway: String) -> Config {
    Config {
        job: "vdbench".to_string(),
        gateway,
        host: Some("bench-01".to_string()),
        push_timeout: Duration::from_secs(5),
    }
}

/// Run the agent over `input` until end of input; returns the report result
/// and everything echoed to the output.
async fn run_to_end(
    gw: &Pushgateway,
    input: &str,
) -> (anyhow::Result<vdbench_push::agent::RunReport>, String) {
    let base = spawn_pushgateway(gw.clone()).await;
    let agent = Agent::new(&config(base)).expect("agent");

    let (output, mut echoed) = tokio::io::duplex(64 * 1024);
    let result = agent
        .run(
            BufReader::new(Cursor::new(input.as_bytes().to_vec())),
            output,
            std::future::pending::<ShutdownSignal>(),
        )
        .await;

    let mut text = String::new();
    echoed.read_to_string(&mut text).await.expect("read echo");
    (result, text)
}

#[tokio::test]
async fn test_device_stream_pushes_then_deletes() {
    let gw = Pushgateway::default();
    let input = format!("{HEADER}{DEVICE_LINE}{DEVICE_LINE_NA}{DEVICE_LINE_NEXT}");

    let (result, echoed) = run_to_end(&gw, &input).await;
    let report = result.expect("run succeeds");

    assert_eq!(echoed, input, "every line is passed through unchanged");
    assert_eq!(report.state, LifecycleState::Finished);
    assert_eq!(report.teardown, Teardown::Deregistered);
    assert_eq!(report.published.pushed, 2);

    let stats = report.ingested.expect("reader reached end of input");
    assert_eq!(stats.lines, 4);
    assert_eq!(stats.snapshots, 2);

    assert_eq!(gw.methods(), vec![Method::PUT, Method::PUT, Method::DELETE]);
    let requests = gw.requests();
    assert!(requests.iter().all(|r| r.path == "/metrics/job/vdbench"));

    let first = &requests[0].body;
    assert!(first.contains("io_rate{host=\"bench-01\"} 100.5"), "{first}");
    assert!(first.contains("mb_ps{host=\"bench-01\"} 50.2"), "{first}");
    assert!(first.contains("cpu_sys{host=\"bench-01\"} 3.1"), "{first}");

    let second = &requests[1].body;
    assert!(second.contains("io_rate{host=\"bench-01\"} 200"), "{second}");
    assert!(!second.contains("100.5"), "latest snapshot replaces the previous one");
}

#[tokio::test]
async fn test_filesystem_stream_uses_filesystem_names() {
    let gw = Pushgateway::default();
    let values: Vec<String> = (1..=Schema::Filesystem.len()).map(|i| format!("{i}.5")).collect();
    let line = format!("12:00:00.000 12:00:05.000 {}\n", values.join(" "));

    let (result, echoed) = run_to_end(&gw, &line).await;
    result.expect("run succeeds");
    assert_eq!(echoed, line);

    let requests = gw.requests();
    assert_eq!(requests.len(), 2);
    let body = &requests[0].body;
    assert!(body.contains("req_std_ops_rate{host=\"bench-01\"} 1.5"), "{body}");
    assert!(body.contains("delete_resp{host=\"bench-01\"} 25.5"), "{body}");
    assert!(!body.contains("io_rate"), "{body}");
}

#[tokio::test]
async fn test_no_interval_lines_still_deregisters() {
    let gw = Pushgateway::default();
    let input = format!("{HEADER}vdbench: starting\n");

    let (result, echoed) = run_to_end(&gw, &input).await;
    let report = result.expect("run succeeds");

    assert_eq!(echoed, input);
    assert_eq!(report.published.pushed, 0);
    assert_eq!(gw.methods(), vec![Method::DELETE]);
}

#[tokio::test]
async fn test_rejected_push_ends_run_with_error_after_delete() {
    let gw = Pushgateway {
        reject_puts: true,
        ..Default::default()
    };
    let input = format!("{DEVICE_LINE}{DEVICE_LINE_NEXT}");

    let (result, echoed) = run_to_end(&gw, &input).await;
    let err = result.expect_err("push failure is fatal");

    assert!(format!("{err:#}").contains("500"), "{err:#}");
    assert_eq!(echoed, input, "pass-through continues after the publisher stops");
    assert_eq!(gw.methods(), vec![Method::PUT, Method::DELETE]);
}

#[tokio::test]
async fn test_interrupt_deletes_once_while_input_open() {
    let gw = Pushgateway::default();
    let base = spawn_pushgateway(gw.clone()).await;
    let agent = Agent::new(&config(base)).expect("agent");
    let lifecycle = agent.lifecycle();

    let (mut writer, reader) = tokio::io::duplex(4096);
    tokio::io::AsyncWriteExt::write_all(&mut writer, DEVICE_LINE.as_bytes())
        .await
        .expect("write line");

    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel();
    let shutdown = async move { signal_rx.await.unwrap_or(ShutdownSignal::Interrupt) };
    let run = tokio::spawn(agent.run(BufReader::new(reader), tokio::io::sink(), shutdown));

    tokio::time::sleep(Duration::from_millis(200)).await;
    signal_tx.send(ShutdownSignal::Interrupt).expect("agent listening");

    let report = run.await.expect("run task").expect("run succeeds");
    assert_eq!(
        report.state,
        LifecycleState::Interrupted(ShutdownSignal::Interrupt)
    );
    assert_eq!(report.teardown, Teardown::Deregistered);
    assert_eq!(gw.methods(), vec![Method::PUT, Method::DELETE]);

    drop(writer);
    assert!(!lifecycle.finish(), "run already ended");
    assert_eq!(gw.methods().len(), 2);
}

#[test]
fn test_example_interval_lines() {
    let snapshot = Snapshot::from_line(DEVICE_LINE).expect("device line");
    assert_eq!(snapshot.schema(), Schema::Device);
    assert_eq!(snapshot.len(), 13);
    assert_eq!(snapshot.get("io_rate"), Some(100.5));
    assert_eq!(snapshot.get("mb_ps"), Some(50.2));

    assert!(Snapshot::from_line(DEVICE_LINE_NA).is_err());
    assert!(Snapshot::from_line(HEADER).is_err());
}
