//! Integration tests for wasmgate-core.
//!
//! These tests verify the complete invocation pipeline:
//! - WASI stdout capture into the invocation output
//! - Environment map injection
//! - Host bridge registration and guest log collection
//! - Failure handling (traps, exits, unresolved imports, limits)
//! - Isolation between concurrent invocations

use std::sync::Arc;

use wasmgate_common::{EngineConfig, ExecutionConfig, GatewayError};
use wasmgate_core::{SandboxFactory, WasmEngine};
use wasmgate_host::LogBridge;

/// Guest that writes "hello, wasm" to stdout via WASI fd_write.
const HELLO_WAT: &str = r#"
    (module
        (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "hello, wasm")

        (func (export "_start")
            ;; iovec { ptr = 16, len = 11 } at offset 0
            (i32.store (i32.const 0) (i32.const 16))
            (i32.store (i32.const 4) (i32.const 11))
            (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
        )
    )
"#;

/// Guest that dumps its whole environment block (NUL-separated `k=v`
/// entries) to stdout.
const ENV_ECHO_WAT: &str = r#"
    (module
        (import "wasi_snapshot_preview1" "environ_sizes_get"
            (func $environ_sizes_get (param i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "environ_get"
            (func $environ_get (param i32 i32) (result i32)))
        (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)

        (func (export "_start")
            ;; entry count -> 0, buffer size -> 4
            (drop (call $environ_sizes_get (i32.const 0) (i32.const 4)))
            ;; pointer vector at 64, data buffer at 1024
            (drop (call $environ_get (i32.const 64) (i32.const 1024)))
            ;; write the whole environment buffer to stdout
            (i32.store (i32.const 8) (i32.const 1024))
            (i32.store (i32.const 12) (i32.load (i32.const 4)))
            (drop (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 16)))
        )
    )
"#;

fn test_engine() -> WasmEngine {
    let config = EngineConfig {
        pooling_allocator: false,
        epoch_interruption: false,
        ..Default::default()
    };
    WasmEngine::new(&config).unwrap()
}

fn test_factory() -> SandboxFactory {
    SandboxFactory::new(test_engine(), ExecutionConfig::default(), Arc::new(LogBridge))
}

fn request_env(query: &str) -> Vec<(String, String)> {
    vec![
        ("http_path".to_string(), "/echo".to_string()),
        ("http_method".to_string(), "GET".to_string()),
        ("http_host".to_string(), "localhost:8080".to_string()),
        ("http_query".to_string(), query.to_string()),
        ("remote_addr".to_string(), "127.0.0.1:52000".to_string()),
    ]
}

// ============================================================================
// Test: Output Capture
// ============================================================================

#[tokio::test]
async fn test_stdout_captured_verbatim() {
    let factory = test_factory();
    let wasm = wat::parse_str(HELLO_WAT).unwrap();

    let output = factory.invoke("hello", &wasm, &[]).await.unwrap();

    assert_eq!(output.stdout, "hello, wasm");
}

#[tokio::test]
async fn test_empty_module_produces_empty_output() {
    let factory = test_factory();
    let wasm = wat::parse_str(r#"(module (func (export "_start")))"#).unwrap();

    let output = factory.invoke("noop", &wasm, &request_env("")).await.unwrap();

    assert!(output.stdout.is_empty());
}

// ============================================================================
// Test: Environment Injection
// ============================================================================

#[tokio::test]
async fn test_environment_injected() {
    let factory = test_factory();
    let wasm = wat::parse_str(ENV_ECHO_WAT).unwrap();

    let output = factory
        .invoke("echo", &wasm, &request_env("x=1"))
        .await
        .unwrap();

    assert!(output.stdout.contains("http_path=/echo\0"));
    assert!(output.stdout.contains("http_method=GET\0"));
    assert!(output.stdout.contains("http_host=localhost:8080\0"));
    assert!(output.stdout.contains("http_query=x=1\0"));
    assert!(output.stdout.contains("remote_addr=127.0.0.1:52000\0"));
}

#[tokio::test]
async fn test_environment_preserves_order() {
    let factory = test_factory();
    let wasm = wat::parse_str(ENV_ECHO_WAT).unwrap();

    let output = factory
        .invoke("echo", &wasm, &request_env("a=b"))
        .await
        .unwrap();

    let path_pos = output.stdout.find("http_path=").unwrap();
    let query_pos = output.stdout.find("http_query=").unwrap();
    let remote_pos = output.stdout.find("remote_addr=").unwrap();
    assert!(path_pos < query_pos);
    assert!(query_pos < remote_pos);
}

// ============================================================================
// Test: Host Bridge
// ============================================================================

#[tokio::test]
async fn test_host_log_functions() {
    let wat = r#"
        (module
            (import "env" "log_i32" (func $log_i32 (param i32)))
            (import "env" "log_string" (func $log_string (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "hello from guest")

            (func (export "_start")
                (call $log_i32 (i32.const 42))
                (call $log_string (i32.const 0) (i32.const 16))
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let output = factory.invoke("logger", &wasm, &[]).await.unwrap();

    assert_eq!(output.guest_logs.len(), 2);
    assert_eq!(output.guest_logs[0].message, "42");
    assert_eq!(output.guest_logs[1].message, "hello from guest");
}

#[tokio::test]
async fn test_log_string_out_of_bounds_is_fail_soft() {
    let wat = r#"
        (module
            (import "env" "log_string" (func $log_string (param i32 i32)))
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "ok")

            (func (export "_start")
                ;; offset far past the end of linear memory
                (call $log_string (i32.const 100000000) (i32.const 16))
                ;; negative length
                (call $log_string (i32.const 0) (i32.const -1))
                ;; the module keeps running and its output stays intact
                (i32.store (i32.const 0) (i32.const 16))
                (i32.store (i32.const 4) (i32.const 2))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let output = factory.invoke("oob", &wasm, &[]).await.unwrap();

    // Both bad calls were dropped; execution continued to completion.
    assert!(output.guest_logs.is_empty());
    assert_eq!(output.stdout, "ok");
}

// ============================================================================
// Test: Failure Handling
// ============================================================================

#[tokio::test]
async fn test_trap_discards_partial_output() {
    let wat = r#"
        (module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "partial")

            (func (export "_start")
                (i32.store (i32.const 0) (i32.const 16))
                (i32.store (i32.const 4) (i32.const 7))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
                unreachable
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let result = factory.invoke("trapper", &wasm, &[]).await;

    // Output written before the trap never reaches the caller.
    assert!(matches!(
        result.unwrap_err(),
        GatewayError::ExecutionFailed { .. }
    ));
}

#[tokio::test]
async fn test_nonzero_exit_is_execution_failure() {
    let wat = r#"
        (module
            (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
            (memory (export "memory") 1)
            (func (export "_start")
                (call $proc_exit (i32.const 7))
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let err = factory.invoke("exiter", &wasm, &[]).await.unwrap_err();

    match err {
        GatewayError::ExecutionFailed { code, .. } => assert_eq!(code.as_deref(), Some("7")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_exit_keeps_output() {
    let wat = r#"
        (module
            (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "done")

            (func (export "_start")
                (i32.store (i32.const 0) (i32.const 16))
                (i32.store (i32.const 4) (i32.const 4))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
                (call $proc_exit (i32.const 0))
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let output = factory.invoke("cleanexit", &wasm, &[]).await.unwrap();
    assert_eq!(output.stdout, "done");
}

#[tokio::test]
async fn test_unresolved_import_is_invalid_module() {
    let wat = r#"
        (module
            (import "env" "missing_host_fn" (func $missing (param i32)))
            (func (export "_start")
                (call $missing (i32.const 1))
            )
        )
    "#;

    let factory = test_factory();
    let wasm = wat::parse_str(wat).unwrap();

    let result = factory.invoke("unresolved", &wasm, &[]).await;

    assert!(matches!(
        result.unwrap_err(),
        GatewayError::InvalidModule { .. }
    ));
}

// ============================================================================
// Test: Resource Limits
// ============================================================================

#[tokio::test]
async fn test_fuel_exhaustion() {
    let wat = r#"
        (module
            (func (export "_start")
                (loop $forever
                    (br $forever)
                )
            )
        )
    "#;

    let exec_config = ExecutionConfig {
        max_fuel: 1000,
        fuel_metering: true,
        ..Default::default()
    };
    let factory = SandboxFactory::new(test_engine(), exec_config, Arc::new(LogBridge));
    let wasm = wat::parse_str(wat).unwrap();

    let result = factory.invoke("spinner", &wasm, &[]).await;

    assert!(matches!(result.unwrap_err(), GatewayError::FuelExhausted));
}

#[tokio::test]
async fn test_epoch_deadline() {
    let wat = r#"
        (module
            (func (export "_start")
                (loop $forever
                    (br $forever)
                )
            )
        )
    "#;

    let engine_config = EngineConfig {
        pooling_allocator: false,
        epoch_interruption: true,
        ..Default::default()
    };
    let engine = WasmEngine::new(&engine_config).unwrap();
    let exec_config = ExecutionConfig {
        // Enough fuel that the deadline fires first
        max_fuel: u64::MAX,
        timeout_ms: 20,
        ..Default::default()
    };
    let factory = SandboxFactory::new(engine.clone(), exec_config, Arc::new(LogBridge));

    // Stand-in for the server's background epoch ticker.
    let ticker_engine = engine.clone();
    let ticker = std::thread::spawn(move || {
        for _ in 0..2000 {
            std::thread::sleep(std::time::Duration::from_millis(1));
            ticker_engine.increment_epoch();
        }
    });

    let wasm = wat::parse_str(wat).unwrap();
    let result = factory.invoke("spinner", &wasm, &[]).await;

    assert!(matches!(
        result.unwrap_err(),
        GatewayError::ExecutionTimeout { .. }
    ));

    drop(ticker);
}

// ============================================================================
// Test: Isolation
// ============================================================================

#[tokio::test]
async fn test_concurrent_invocations_are_isolated() {
    let factory = Arc::new(test_factory());
    let wasm = Arc::new(wat::parse_str(ENV_ECHO_WAT).unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let factory = factory.clone();
        let wasm = wasm.clone();
        handles.push(tokio::spawn(async move {
            let query = format!("q={i}");
            let output = factory
                .invoke("echo", &wasm, &request_env(&query))
                .await
                .unwrap();
            (i, output.stdout)
        }));
    }

    for handle in handles {
        let (i, stdout) = handle.await.unwrap();
        assert!(stdout.contains(&format!("http_query=q={i}\0")));
        for other in 0..8 {
            if other != i {
                assert!(!stdout.contains(&format!("http_query=q={other}\0")));
            }
        }
    }
}

#[tokio::test]
async fn test_repeated_invocations_share_nothing() {
    let factory = test_factory();
    let wasm = wat::parse_str(HELLO_WAT).unwrap();

    // Same module, same factory: each run starts from a blank sandbox, so
    // the output never accumulates across invocations.
    for _ in 0..3 {
        let output = factory.invoke("hello", &wasm, &[]).await.unwrap();
        assert_eq!(output.stdout, "hello, wasm");
    }
}
