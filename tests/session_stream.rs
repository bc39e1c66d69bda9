//! End-to-end session tests.
//!
//! Sessions are driven through their two channel lanes exactly as the
//! websocket glue drives them, with a synthetic video source and scripted
//! detector backends, so every state transition is observable without a
//! network in the loop.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use sightline::detect::{BackendLoader, BackendRegistry, Detection, DetectorBackend, StubBackend};
use sightline::session::{SessionConfig, StreamSession};

fn det(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32, label: &str) -> Detection {
    Detection {
        x1,
        y1,
        x2,
        y2,
        cls_id: 0,
        confidence,
        label: label.to_string(),
    }
}

/// Loader producing scripted backends: one detection on the left named after
/// the model file stem, one fixed detection near the right edge.
struct ScriptedLoader;

impl BackendLoader for ScriptedLoader {
    fn load(
        &self,
        identifier: &str,
        model_path: &Path,
    ) -> anyhow::Result<Box<dyn DetectorBackend>> {
        let stem = model_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("object")
            .to_string();
        Ok(Box::new(StubBackend::new(
            identifier,
            vec![det(10, 10, 20, 20, 0.9, &stem), det(90, 10, 99, 20, 0.8, "edge")],
        )))
    }
}

struct Harness {
    in_tx: mpsc::Sender<String>,
    out_rx: mpsc::Receiver<String>,
    worker: thread::JoinHandle<()>,
    _store: tempfile::TempDir,
}

fn spawn_session(models: &[&str], default_model: &str) -> Harness {
    let store = tempfile::tempdir().expect("temp model store");
    for name in models {
        std::fs::write(store.path().join(name), b"weights").expect("write model");
    }
    let registry = Arc::new(BackendRegistry::with_loader(
        store.path(),
        Box::new(ScriptedLoader),
    ));

    let mut config = SessionConfig::new(default_model);
    config.frame_interval = Duration::ZERO;

    let (in_tx, in_rx) = mpsc::channel(32);
    // shallow outbound lane: the session can only run a couple of frames
    // ahead of the test, so control messages always land mid-stream
    let (out_tx, out_rx) = mpsc::channel(2);
    let session = StreamSession::new(registry, config, in_rx, out_tx);
    let worker = thread::spawn(move || session.run());

    Harness {
        in_tx,
        out_rx,
        worker,
        _store: store,
    }
}

impl Harness {
    fn send(&self, text: &str) {
        self.in_tx
            .blocking_send(text.to_string())
            .expect("session inbound lane open");
    }

    fn recv_text(&mut self) -> Option<String> {
        self.out_rx.blocking_recv()
    }

    fn recv_payload(&mut self) -> Value {
        let text = self.recv_text().expect("expected a frame payload");
        serde_json::from_str(&text).expect("frame payloads are JSON")
    }

    fn finish(self) {
        drop(self.in_tx);
        drop(self.out_rx);
        self.worker.join().expect("session worker");
    }
}

fn result_value(payload: &Value, index: usize) -> &str {
    payload["results"][index]["value"]
        .as_str()
        .expect("region value is a string")
}

#[test]
fn structured_start_streams_and_aggregates() {
    let mut harness = spawn_session(&["seven.onnx"], "seven.onnx");
    harness.send(
        r#"{"type":"start","source":"stub://bench?frames=3&width=100&height=100","regions":[{"id":1,"x":0,"y":0,"w":50,"h":100}],"model":"seven.onnx"}"#,
    );

    for _ in 0..3 {
        let payload = harness.recv_payload();
        assert!(!payload["image"].as_str().unwrap().is_empty());
        assert_eq!(payload["results"][0]["id"], Value::from(1));
        // the left detection's center (15, 15) is inside the 0..50% region,
        // the right one's (94.5, 15) is not
        assert_eq!(result_value(&payload, 0), "seven");
    }
    assert!(harness.recv_text().is_none(), "stream ends after 3 frames");
    harness.finish();
}

#[test]
fn bare_descriptor_start_is_accepted() {
    let mut harness = spawn_session(&["seven.onnx"], "seven.onnx");
    harness.send("stub://bench?frames=1&width=100&height=100");

    let payload = harness.recv_payload();
    assert!(payload["results"].as_array().unwrap().is_empty());
    assert!(harness.recv_text().is_none());
    harness.finish();
}

#[test]
fn invalid_device_index_is_fatal_before_streaming() {
    let mut harness = spawn_session(&["seven.onnx"], "seven.onnx");
    harness.send("device:-1");

    assert_eq!(
        harness.recv_text().as_deref(),
        Some("ERROR: invalid device index: -1")
    );
    assert!(harness.recv_text().is_none(), "channel closes after the error");
    harness.finish();
}

#[test]
fn unresolvable_start_model_is_fatal() {
    let mut harness = spawn_session(&[], "missing.onnx");
    harness.send("stub://bench?frames=5");

    let message = harness.recv_text().expect("error marker");
    assert_eq!(message, "ERROR: model not found: missing.onnx");
    assert!(harness.recv_text().is_none());
    harness.finish();
}

#[test]
fn unopenable_source_is_fatal() {
    let mut harness = spawn_session(&["seven.onnx"], "seven.onnx");
    harness.send("./no-such-clip.mp4");

    let message = harness.recv_text().expect("error marker");
    assert!(
        message.starts_with("ERROR: source unavailable:"),
        "unexpected marker: {message}"
    );
    assert!(harness.recv_text().is_none());
    harness.finish();
}

#[test]
fn midstream_model_switch_applies_when_it_resolves() {
    let mut harness = spawn_session(&["alpha.onnx", "beta.onnx"], "alpha.onnx");
    harness.send(
        r#"{"type":"start","source":"stub://bench?frames=200&width=100&height=100","regions":[{"id":"all","x":0,"y":0,"w":100,"h":100}]}"#,
    );

    assert_eq!(result_value(&harness.recv_payload(), 0), "alphaedge");
    harness.send(r#"{"type":"model","model":"beta.onnx"}"#);

    let mut switched = false;
    while let Some(text) = harness.recv_text() {
        let payload: Value = serde_json::from_str(&text).unwrap();
        if result_value(&payload, 0) == "betaedge" {
            switched = true;
            break;
        }
        assert_eq!(result_value(&payload, 0), "alphaedge");
    }
    assert!(switched, "model switch never took effect");
    harness.finish();
}

#[test]
fn unresolvable_midstream_model_is_ignored() {
    let mut harness = spawn_session(&["alpha.onnx"], "alpha.onnx");
    harness.send(
        r#"{"type":"start","source":"stub://bench?frames=8&width=100&height=100","regions":[{"id":"all","x":0,"y":0,"w":100,"h":100}]}"#,
    );

    assert_eq!(result_value(&harness.recv_payload(), 0), "alphaedge");
    harness.send(r#"{"type":"model","model":"../escape.onnx"}"#);

    let mut frames = 1;
    while let Some(text) = harness.recv_text() {
        let payload: Value = serde_json::from_str(&text).unwrap();
        // the prior selection stays in force for the rest of the stream
        assert_eq!(result_value(&payload, 0), "alphaedge");
        frames += 1;
    }
    assert_eq!(frames, 8, "session streams to its natural end");
    harness.finish();
}

#[test]
fn regions_message_replaces_the_set_wholesale() {
    let mut harness = spawn_session(&["alpha.onnx"], "alpha.onnx");
    harness.send(
        r#"{"type":"start","source":"stub://bench?frames=200&width=100&height=100","regions":[{"id":1,"x":0,"y":0,"w":100,"h":100}]}"#,
    );

    assert_eq!(harness.recv_payload()["results"][0]["id"], Value::from(1));
    harness.send(r#"{"type":"regions","regions":[{"id":2,"x":0,"y":0,"w":50,"h":100}]}"#);

    let mut replaced = false;
    while let Some(text) = harness.recv_text() {
        let payload: Value = serde_json::from_str(&text).unwrap();
        let results = payload["results"].as_array().unwrap();
        if results[0]["id"] == Value::from(2) {
            assert_eq!(results.len(), 1, "old regions are gone, not merged");
            assert_eq!(result_value(&payload, 0), "alpha");
            replaced = true;
            break;
        }
    }
    assert!(replaced, "region replacement never took effect");
    harness.finish();
}

#[test]
fn malformed_control_messages_are_dropped_silently() {
    let mut harness = spawn_session(&["alpha.onnx"], "alpha.onnx");
    harness.send(
        r#"{"type":"start","source":"stub://bench?frames=6&width=100&height=100","regions":[{"id":1,"x":0,"y":0,"w":100,"h":100}]}"#,
    );

    assert_eq!(result_value(&harness.recv_payload(), 0), "alphaedge");
    harness.send("{ this is not json");
    harness.send(r#"{"type":"zoom","level":3}"#);

    let mut frames = 1;
    while let Some(text) = harness.recv_text() {
        let payload: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(result_value(&payload, 0), "alphaedge");
        frames += 1;
    }
    assert_eq!(frames, 6);
    harness.finish();
}

#[test]
fn peer_disconnect_before_start_closes_quietly() {
    let harness = spawn_session(&["alpha.onnx"], "alpha.onnx");
    let Harness {
        in_tx,
        out_rx,
        worker,
        _store,
    } = harness;
    drop(in_tx);
    drop(out_rx);
    worker.join().expect("session worker");
}

#[test]
fn peer_disconnect_midstream_stops_the_session() {
    let mut harness = spawn_session(&["alpha.onnx"], "alpha.onnx");
    harness.send("stub://bench?width=100&height=100"); // unbounded source

    let _ = harness.recv_payload();
    harness.finish();
}
