// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::{sync::Arc, time::Duration};

use alloy_primitives::TxHash;
use futures::future::BoxFuture;
use sdb_common::{
    logging::ensure_test_logging, Binding, Breakpoint, ContractArtifact, DecodedValue, Trace, TraceStep,
};
use sdb_engine::{
    selectors::{
        Breakpoints, Contexts, CurrentIndex, CurrentLocation, Finished, Location, Sources, Status,
    },
    Action, Dispatcher, Effects, JsonTraceProvider, Session, SessionConfig, SessionError,
    SessionStatus, TraceProvider,
};
use serde_json::json;
use tracing::info;

const TX: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

const TOKEN_SOURCE: &str = "contract Token {\n  function f() public {\n    uint x = 1;\n    x = 2;\n  }\n}\n";
const LIB_SOURCE: &str = "contract Lib {\n  function g() public {}\n}\n";

fn tx() -> TxHash {
    TX.parse().unwrap()
}

fn artifact(name: &str, path: &str, source: &str, deployed: &str) -> ContractArtifact {
    ContractArtifact {
        contract_name: name.into(),
        binary: Some("0x6080".into()),
        source_map: Some("0:10:0".into()),
        deployed_binary: Some(deployed.into()),
        deployed_source_map: Some("0:10:0".into()),
        source_path: path.into(),
        source: source.into(),
        ast: json!({
            "nodeType": "SourceUnit",
            "src": format!("0:{}:0", source.len()),
            "nodes": [ { "nodeType": "ContractDefinition", "name": name, "id": 1, "src": "0:10:0" } ]
        }),
        compiler: None,
    }
}

/// Token has both bytecodes, Lib only its creation code: 3 contexts, 2 sources.
fn artifacts() -> Vec<ContractArtifact> {
    vec![
        artifact("Token", "Token.sol", TOKEN_SOURCE, "0x6001"),
        artifact("Lib", "Lib.sol", LIB_SOURCE, "0x"),
    ]
}

fn x_at(slot: u64) -> Binding {
    Binding { definition: json!({ "name": "x", "id": 7 }), reference: json!({ "stack": slot }) }
}

fn step(source_id: usize, start: usize, depth: usize) -> TraceStep {
    TraceStep {
        context: 1,
        source_id: Some(source_id),
        start,
        length: 4,
        depth,
        node: None,
        scope: Default::default(),
    }
}

/// Lines 2 and 3 of Token, a call into Lib, then line 4 of Token.
fn provider() -> JsonTraceProvider {
    let mut first = step(0, 41, 0);
    first.scope.insert("x".into(), x_at(0));
    let mut second = step(0, 57, 0);
    second.scope.insert("x".into(), x_at(1));
    let trace = vec![first, second, step(1, 17, 1), step(0, 68, 0)];

    JsonTraceProvider::default()
        .with_trace(tx(), trace.into())
        .with_value(json!({ "stack": 0 }), json!("1"))
        .with_value(json!({ "stack": 1 }), json!("2"))
}

fn location(source_id: usize, source_path: &str, line: usize) -> Location {
    Location { source_id, source_path: source_path.into(), line }
}

/// Effects that never react.
struct Silent;

impl Effects for Silent {
    fn handle<'a>(&'a self, _action: Action, _dispatcher: &'a Dispatcher) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// Effects that make unrelated state changes around a step.
struct Noisy;

impl Effects for Noisy {
    fn handle<'a>(&'a self, action: Action, dispatcher: &'a Dispatcher) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if matches!(action, Action::StepNext) {
                dispatcher.dispatch(Action::AddBreakpoint { breakpoint: Breakpoint::node(1) });
                dispatcher.dispatch(Action::SteppingStarted);
                dispatcher.dispatch(Action::AddBreakpoint { breakpoint: Breakpoint::node(2) });
                tokio::time::sleep(Duration::from_millis(20)).await;
                dispatcher.dispatch(Action::SteppingFinished);
            }
        })
    }
}

/// A long trace on one line. Every 64th step has `x` in scope, and decoding it
/// takes a while, which keeps the effect task busy after a step settles.
struct SlowDecoder {
    trace: Trace,
}

impl SlowDecoder {
    fn new(len: usize) -> Self {
        let trace = (0..len)
            .map(|index| {
                let mut entry = step(0, 41, 0);
                if index % 64 == 0 {
                    entry.scope.insert("x".into(), x_at(index as u64));
                }
                entry
            })
            .collect();
        Self { trace }
    }
}

impl TraceProvider for SlowDecoder {
    fn fetch_trace(&self, _tx_hash: TxHash) -> BoxFuture<'_, eyre::Result<Trace>> {
        let trace = self.trace.clone();
        Box::pin(async move { Ok(trace) })
    }

    fn decode<'a>(&'a self, _binding: &'a Binding) -> BoxFuture<'a, eyre::Result<DecodedValue>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!("slow"))
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_session_end_to_end() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::new(artifacts(), None, tx(), Arc::new(provider())).unwrap();
    session.ready().await.unwrap();

    assert_eq!(session.view(Contexts).len(), 3);
    let sources = session.view(Sources);
    let paths: Vec<&str> = sources.iter().map(|source| source.source_path.as_str()).collect();
    assert_eq!(paths, vec!["Token.sol", "Lib.sol"]);

    assert_eq!(session.view(CurrentLocation), Some(location(0, "Token.sol", 2)));
    assert_eq!(session.variables().await.unwrap().get("x"), Some(&json!("1")));

    assert!(session.step_into().await.unwrap());
    assert_eq!(session.view(CurrentLocation), Some(location(0, "Token.sol", 3)));
    assert_eq!(session.variable("x").await.unwrap(), json!("2"));
    assert!(matches!(
        session.variable("y").await,
        Err(SessionError::UnknownVariable(name)) if name == "y"
    ));

    // the call into Lib is deeper than the current frame
    assert!(session.step_over().await.unwrap());
    assert_eq!(session.view(CurrentIndex), 3);
    assert!(session.view(Finished));

    assert!(session.reset().await.unwrap());
    assert_eq!(session.view(CurrentIndex), 0);
    assert!(!session.view(Finished));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_continue_until_breakpoint() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::new(artifacts(), None, tx(), Arc::new(provider())).unwrap();
    session.ready().await.unwrap();

    let requested = Breakpoint::line(1, 0);
    let adjusted = session.adjust_breakpoint(&requested);
    assert!(adjusted.is_none(), "Lib.sol has no debuggable node: {adjusted:?}");

    session.add_breakpoint(Breakpoint::line(1, 1));
    session.add_breakpoint(Breakpoint::line(1, 1));
    assert_eq!(session.view(Breakpoints).len(), 1);

    assert!(session.continue_until_breakpoint(None).await.unwrap());
    assert_eq!(session.view(CurrentLocation), Some(location(1, "Lib.sol", 1)));

    // explicit list overrides the recorded one; nothing matches, run to the end
    assert!(session.continue_until_breakpoint(Some(vec![Breakpoint::node(99)])).await.unwrap());
    assert_eq!(session.view(CurrentIndex), 3);

    session.remove_all_breakpoints();
    assert!(session.view(Breakpoints).is_empty());

    assert!(session.dispatch(Action::AddBreakpoint { breakpoint: Breakpoint::node(5) }).await);
    assert_eq!(session.view(Breakpoints), vec![Breakpoint::node(5)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_advance_and_interrupt() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::new(artifacts(), None, tx(), Arc::new(provider())).unwrap();
    session.ready().await.unwrap();

    assert!(session.advance(None).await.unwrap());
    assert_eq!(session.view(CurrentIndex), 1);
    assert!(session.advance(Some(10)).await.unwrap());
    assert_eq!(session.view(CurrentIndex), 3);

    // nothing is running; the interrupt still settles and keeps the position
    assert!(session.interrupt().await.unwrap());
    assert_eq!(session.view(CurrentIndex), 3);
    assert!(!session.state().interrupt_requested);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_interrupt_stops_running_continue() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::new(artifacts(), None, tx(), Arc::new(SlowDecoder::new(1000))).unwrap();
    session.ready().await.unwrap();

    // both requests queue up behind the decode of the first step
    let (continued, first, second) = tokio::join!(
        session.continue_until_breakpoint(None),
        session.interrupt(),
        session.interrupt()
    );
    assert!(continued.unwrap() && first.unwrap() && second.unwrap());

    let interrupted = session.view(CurrentIndex);
    assert!(interrupted > 0 && interrupted < 999, "stopped at {interrupted}");
    assert!(!session.view(Finished));
    assert!(!session.state().interrupt_requested);

    // the consumed interrupts must not settle the next step early
    assert!(session.advance(None).await.unwrap());
    assert_eq!(session.view(CurrentIndex), interrupted + 1);
    assert!(!session.state().stepping);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_failed_decode_drains_counter() {
    ensure_test_logging(None);
    info!("Running test");

    let mut first = step(0, 41, 0);
    first.scope.insert("x".into(), x_at(0));
    first.scope.insert(
        "y".into(),
        Binding { definition: json!({ "name": "y", "id": 8 }), reference: json!({ "stack": 9 }) },
    );
    let provider = JsonTraceProvider::default()
        .with_trace(tx(), vec![first, step(0, 57, 0)].into())
        .with_value(json!({ "stack": 0 }), json!("1"));

    let session = Session::new(artifacts(), None, tx(), Arc::new(provider)).unwrap();
    session.ready().await.unwrap();

    let decoded = session.variables().await.unwrap();
    assert_eq!(decoded.get("x"), Some(&json!("1")));
    assert!(!decoded.contains_key("y"));
    assert!(session.state().decoding_keys <= 0);

    match session.variable("y").await {
        Err(SessionError::Decode { name, reason }) => {
            assert_eq!(name, "y");
            assert!(reason.contains("No recorded value"), "{reason}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_ready_rejects_with_embedded_fault() {
    ensure_test_logging(None);
    info!("Running test");

    let session =
        Session::new(artifacts(), None, tx(), Arc::new(JsonTraceProvider::default())).unwrap();

    let error = session.ready().await.unwrap_err();
    let status = session.view(Status);
    let fault = status.fault().cloned().unwrap();
    assert!(matches!(&error, SessionError::Start(embedded) if *embedded == fault));
    assert!(fault.message.contains("No trace recorded"));

    // a failed session stays failed
    assert!(matches!(session.ready().await, Err(SessionError::Start(_))));
    assert!(!matches!(session.view(Status), SessionStatus::Active));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_decode_ready_resolves_immediately_when_idle() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::with_effects(
        artifacts(),
        None,
        tx(),
        Arc::new(provider()),
        SessionConfig::default().with_decode_timeout(Duration::from_secs(1)),
        Arc::new(Silent),
    )
    .unwrap();

    session.decode_ready().await.unwrap();
    assert!(session.variables().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_timeouts_are_reported() {
    ensure_test_logging(None);
    info!("Running test");

    let config = SessionConfig::default()
        .with_ready_timeout(Duration::from_millis(50))
        .with_step_timeout(Duration::from_millis(50));
    let session =
        Session::with_effects(artifacts(), None, tx(), Arc::new(provider()), config, Arc::new(Silent))
            .unwrap();

    assert!(matches!(
        session.ready().await,
        Err(SessionError::Timeout { operation: "session start", .. })
    ));
    assert!(matches!(
        session.step_next().await,
        Err(SessionError::Timeout { operation: "stepping", .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_stepping_waits_for_start_then_stop() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::with_effects(
        artifacts(),
        None,
        tx(),
        Arc::new(provider()),
        SessionConfig::default().with_step_timeout(Duration::from_secs(5)),
        Arc::new(Noisy),
    )
    .unwrap();

    // an unrelated change before the step starts must not settle it
    assert!(session.step_next().await.unwrap());
    assert_eq!(session.view(Breakpoints).len(), 2);
    assert!(!session.state().stepping);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_construction_failures() {
    ensure_test_logging(None);
    info!("Running test");

    let stale = Session::new(
        artifacts(),
        Some(vec!["Lib.sol".into(), "Gone.sol".into()]),
        tx(),
        Arc::new(provider()),
    );
    assert!(matches!(
        stale,
        Err(SessionError::StaleFileOrdering { missing }) if missing == vec!["Gone.sol".to_string()]
    ));

    let mut broken = artifacts();
    broken[1].ast = json!({ "nodeType": "SourceUnit", "nodes": [] });
    assert!(matches!(
        Session::new(broken, None, tx(), Arc::new(provider())),
        Err(SessionError::MalformedArtifact { contract, .. }) if contract == "Lib"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_requested_file_order_sets_source_ids() {
    ensure_test_logging(None);
    info!("Running test");

    let session = Session::new(
        artifacts(),
        Some(vec!["Lib.sol".into(), "Token.sol".into()]),
        tx(),
        Arc::new(provider()),
    )
    .unwrap();

    let sources = session.view(Sources);
    assert_eq!(sources[0].source_path, "Lib.sol");
    assert_eq!(sources[1].source_path, "Token.sol");
}

#[test]
fn test_session_requires_runtime() {
    ensure_test_logging(None);
    info!("Running test");

    assert!(matches!(
        Session::new(artifacts(), None, tx(), Arc::new(provider())),
        Err(SessionError::NoRuntime)
    ));
}
