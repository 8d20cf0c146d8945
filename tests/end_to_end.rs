//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! End-to-end tests over in-memory transports.
//!
//! These tests wire two full connections together and verify:
//! - Request/response flow and typed argument handling
//! - Overload resolution by method signature
//! - The error taxonomy as observed by the caller
//! - Duplex calls (a method calling back into its caller)
//! - Fire-and-forget delivery
//! - Concurrent correlation and disconnect behavior

use duplexrpc::connection::Connection;
use duplexrpc::rpc::{
    decode_return, encode_arg, method_signature, BrokerConfig, DelegateRegistry, DispatchError,
    RequestContext, ServiceMethods,
};
use duplexrpc::transport::MemoryTransport;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn calculator_methods() -> ServiceMethods {
    ServiceMethods::new()
        .method2(
            &method_signature("Add", &["Int32", "Int32"]),
            |a: i32, b: i32| Ok::<_, std::convert::Infallible>(a + b),
        )
        .method2(
            &method_signature("Divide", &["Int32", "Int32"]),
            |a: i32, b: i32| {
                if b == 0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(a / b)
                }
            },
        )
        .method1("Polymorphic_String", |s: String| {
            Ok::<_, std::convert::Infallible>(format!("string: {s}"))
        })
        .method1("Polymorphic_Int32", |n: i32| {
            Ok::<_, std::convert::Infallible>(format!("int: {n}"))
        })
        .method0("Ping", || Ok::<_, std::convert::Infallible>(()))
}

/// Connects two peers; the far side serves `methods` under `interface`.
fn connect_pair(interface: &str, methods: ServiceMethods) -> (Arc<Connection>, Arc<Connection>) {
    let server_registry = Arc::new(DelegateRegistry::new());
    server_registry.register(interface, methods);

    let (near, far) = MemoryTransport::pair_default();
    let server = Connection::establish(far, server_registry, BrokerConfig::default());
    let client = Connection::establish(
        near,
        Arc::new(DelegateRegistry::new()),
        BrokerConfig::default(),
    );
    (client, server)
}

#[tokio::test]
async fn add_round_trips_typed_arguments() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let result = client
        .caller()
        .call(
            "Calc",
            "Add_Int32_Int32",
            vec![encode_arg(&1).unwrap(), encode_arg(&2).unwrap()],
        )
        .await
        .unwrap();

    let sum: i32 = decode_return(result).unwrap();
    assert_eq!(sum, 3);
}

#[tokio::test]
async fn overloads_resolve_by_parameter_types() {
    let (client, _server) = connect_pair("Calc", calculator_methods());
    let caller = client.caller();

    let result = caller
        .call(
            "Calc",
            "Polymorphic_String",
            vec![encode_arg(&"abc").unwrap()],
        )
        .await
        .unwrap();
    let echoed: String = decode_return(result).unwrap();
    assert_eq!(echoed, "string: abc");

    let result = caller
        .call("Calc", "Polymorphic_Int32", vec![encode_arg(&7).unwrap()])
        .await
        .unwrap();
    let echoed: String = decode_return(result).unwrap();
    assert_eq!(echoed, "int: 7");
}

#[tokio::test]
async fn void_methods_complete_with_no_value() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let result = client.caller().call("Calc", "Ping", Vec::new()).await.unwrap();
    assert_eq!(result, None);
    decode_return::<()>(result).unwrap();
}

#[tokio::test]
async fn unregistered_interface_surfaces_as_contract_mismatch() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let error = client
        .caller()
        .call("NoSuchInterface", "Ping", Vec::new())
        .await
        .unwrap_err();
    assert!(error.is_contract_mismatch());
    assert!(error.to_string().contains("not registered"));
}

#[tokio::test]
async fn unknown_signature_surfaces_as_contract_mismatch() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let error = client
        .caller()
        .call(
            "Calc",
            "Subtract_Int32_Int32",
            vec![encode_arg(&5).unwrap(), encode_arg(&3).unwrap()],
        )
        .await
        .unwrap_err();
    assert!(error.is_contract_mismatch());
}

#[tokio::test]
async fn ambiguous_signature_surfaces_as_contract_mismatch() {
    let methods = ServiceMethods::new()
        .method1("Echo_String", |s: String| {
            Ok::<_, std::convert::Infallible>(s.clone())
        })
        .method1("Echo_String", |s: String| {
            Ok::<_, std::convert::Infallible>(s)
        });
    let (client, _server) = connect_pair("Echoes", methods);

    let error = client
        .caller()
        .call("Echoes", "Echo_String", vec![encode_arg(&"hi").unwrap()])
        .await
        .unwrap_err();
    assert!(error.is_contract_mismatch());
}

#[tokio::test]
async fn mistyped_arguments_surface_as_contract_mismatch() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let error = client
        .caller()
        .call(
            "Calc",
            "Add_Int32_Int32",
            vec![encode_arg(&"one").unwrap(), encode_arg(&2).unwrap()],
        )
        .await
        .unwrap_err();
    assert!(error.is_contract_mismatch());
}

#[tokio::test]
async fn application_errors_surface_as_remote_faults() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let error = client
        .caller()
        .call(
            "Calc",
            "Divide_Int32_Int32",
            vec![encode_arg(&1).unwrap(), encode_arg(&0).unwrap()],
        )
        .await
        .unwrap_err();
    assert!(error.is_remote_fault());
    assert!(error.to_string().contains("division by zero"));
}

#[tokio::test]
async fn notify_runs_the_method_without_a_reply() {
    let hits = Arc::new(AtomicUsize::new(0));
    let methods = ServiceMethods::new().method0("Record", {
        let hits = Arc::clone(&hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(())
        }
    });
    let (client, _server) = connect_pair("Audit", methods);

    client
        .caller()
        .notify("Audit", "Record", Vec::new())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while hits.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn notify_discards_remote_faults_silently() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    // The remote method faults, but with no pending query nothing comes back.
    client
        .caller()
        .notify(
            "Calc",
            "Divide_Int32_Int32",
            vec![encode_arg(&1).unwrap(), encode_arg(&0).unwrap()],
        )
        .await
        .unwrap();

    // The connection stays healthy for subsequent calls.
    let result = client
        .caller()
        .call(
            "Calc",
            "Add_Int32_Int32",
            vec![encode_arg(&2).unwrap(), encode_arg(&2).unwrap()],
        )
        .await
        .unwrap();
    let sum: i32 = decode_return(result).unwrap();
    assert_eq!(sum, 4);
}

#[tokio::test]
async fn concurrent_calls_correlate_to_their_own_replies() {
    let (client, _server) = connect_pair("Calc", calculator_methods());

    let mut tasks = Vec::new();
    for n in 0..32i32 {
        let caller = client.caller();
        tasks.push(tokio::spawn(async move {
            let result = caller
                .call(
                    "Calc",
                    "Add_Int32_Int32",
                    vec![encode_arg(&n).unwrap(), encode_arg(&n).unwrap()],
                )
                .await
                .unwrap();
            let sum: i32 = decode_return(result).unwrap();
            (n, sum)
        }));
    }

    for task in tasks {
        let (n, sum) = task.await.unwrap();
        assert_eq!(sum, n + n);
    }
}

#[tokio::test]
async fn slow_methods_do_not_block_other_calls() {
    let methods = calculator_methods().raw(
        "Stall",
        Arc::new(|_ctx: RequestContext, _args: Vec<String>| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(None)
            })
        }),
    );
    let (client, _server) = connect_pair("Calc", methods);

    let slow_caller = client.caller();
    let slow = tokio::spawn(async move { slow_caller.call("Calc", "Stall", Vec::new()).await });

    let started = tokio::time::Instant::now();
    let result = client
        .caller()
        .call(
            "Calc",
            "Add_Int32_Int32",
            vec![encode_arg(&1).unwrap(), encode_arg(&2).unwrap()],
        )
        .await
        .unwrap();
    let sum: i32 = decode_return(result).unwrap();
    assert_eq!(sum, 3);
    assert!(started.elapsed() < Duration::from_millis(400));

    slow.await.unwrap().unwrap();
}

#[tokio::test]
async fn unanswered_calls_time_out_independently() {
    let methods = ServiceMethods::new().raw(
        "Stall",
        Arc::new(|_ctx: RequestContext, _args: Vec<String>| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            })
        }),
    );

    let server_registry = Arc::new(DelegateRegistry::new());
    server_registry.register("Calc", methods);
    let (near, far) = MemoryTransport::pair_default();
    let _server = Connection::establish(far, server_registry, BrokerConfig::default());
    let client = Connection::establish(
        near,
        Arc::new(DelegateRegistry::new()),
        BrokerConfig {
            call_timeout: Duration::from_millis(100),
        },
    );

    let error = client
        .caller()
        .call("Calc", "Stall", Vec::new())
        .await
        .unwrap_err();
    assert!(error.is_timeout());
    assert_eq!(client.broker().pending_count(), 0);
}

#[tokio::test]
async fn duplex_methods_call_back_into_their_caller() {
    // The client registers a service of its own; the server's method
    // calls back over the originating connection while handling the request.
    let server_methods = ServiceMethods::new().raw(
        "WhoAsked",
        Arc::new(|ctx: RequestContext, _args: Vec<String>| {
            Box::pin(async move {
                let name = ctx
                    .caller()
                    .call("ClientInfo", "Name", Vec::new())
                    .await
                    .map_err(|e| DispatchError::Application(Box::new(e)))?;
                let name: String = decode_return(name)
                    .map_err(|e| DispatchError::Application(Box::new(e)))?;
                Ok(Some(
                    serde_json::to_string(&format!("asked by {name}")).unwrap(),
                ))
            })
        }),
    );
    let server_registry = Arc::new(DelegateRegistry::new());
    server_registry.register("Oracle", server_methods);

    let client_registry = Arc::new(DelegateRegistry::new());
    client_registry.register(
        "ClientInfo",
        ServiceMethods::new().method0("Name", || {
            Ok::<_, std::convert::Infallible>("alice".to_string())
        }),
    );

    let (near, far) = MemoryTransport::pair_default();
    let _server = Connection::establish(far, server_registry, BrokerConfig::default());
    let client = Connection::establish(near, client_registry, BrokerConfig::default());

    let result = client
        .caller()
        .call("Oracle", "WhoAsked", Vec::new())
        .await
        .unwrap();
    let answer: String = decode_return(result).unwrap();
    assert_eq!(answer, "asked by alice");
}

#[tokio::test]
async fn peer_death_fails_in_flight_calls_with_channel_fault() {
    let methods = ServiceMethods::new().raw(
        "Stall",
        Arc::new(|_ctx: RequestContext, _args: Vec<String>| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            })
        }),
    );
    let (client, server) = connect_pair("Calc", methods);

    let caller = client.caller();
    let in_flight = tokio::spawn(async move { caller.call("Calc", "Stall", Vec::new()).await });

    // Give the request time to land remotely, then kill the peer.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.dispose();

    let error = in_flight.await.unwrap().unwrap_err();
    assert!(error.is_channel_fault());
}

#[tokio::test]
async fn callers_outlive_their_connection() {
    let (client, server) = connect_pair("Calc", calculator_methods());
    let caller = client.caller();

    server.dispose();
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.is_connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let error = caller
        .call("Calc", "Ping", Vec::new())
        .await
        .unwrap_err();
    assert!(error.is_channel_fault());
}
