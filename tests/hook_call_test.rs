//! Hook invocation tests against real WAT-built guest modules.
//!
//! Covers header/body mutation through the ABI imports, guest and host
//! allocation paths, lifecycle sequencing, context-id allocation, log capture
//! and the abort path.

use proxy_wasm_harness::host_functions::{LOG_DEBUG, LOG_ERROR, LOG_INFO};
use proxy_wasm_harness::runner::{Hook, HookCall, ProxyWasmRunner, RequestInput, RunnerError};

fn runner_with(wat: &str) -> ProxyWasmRunner {
    let mut runner = ProxyWasmRunner::new().expect("failed to create runner");
    let bytes = wat::parse_str(wat).expect("failed to parse WAT");
    runner.load(&bytes).expect("failed to load module");
    runner
}

fn headers_call(pairs: &[(&str, &str)]) -> HookCall {
    HookCall {
        hook: Hook::RequestHeaders,
        request: RequestInput {
            headers: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_guest_header_mutation_is_observable() {
    let wat = r#"
        (module
            (import "env" "proxy_replace_header_map_value"
                (func $replace (param i32 i32 i32 i32 i32) (result i32)))
            (import "env" "proxy_log" (func $log (param i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "x-a")
            (data (i32.const 32) "2")
            (data (i32.const 64) "replaced x-a")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $replace
                    (i32.const 0)   ;; request headers
                    (i32.const 16) (i32.const 3)
                    (i32.const 32) (i32.const 1)))
                (drop (call $log (i32.const 2) (i32.const 64) (i32.const 12)))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let result = runner
        .call_hook(&headers_call(&[("x-a", "1")]))
        .expect("hook call failed");

    assert_eq!(result.return_code, Some(0));
    assert_eq!(
        result.input.request.headers.get("x-a").map(String::as_str),
        Some("1")
    );
    assert_eq!(
        result.output.request.headers.get("x-a").map(String::as_str),
        Some("2")
    );
    assert!(result
        .logs
        .iter()
        .any(|l| l.level == LOG_INFO && l.message == "replaced x-a"));
}

#[test]
fn test_stream_context_ids_increase_and_reset_on_load() {
    // The guest returns its own context id as the hook return code.
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (local.get 0)
            )
        )
    "#;
    let bytes = wat::parse_str(wat).expect("failed to parse WAT");

    let mut runner = ProxyWasmRunner::new().expect("failed to create runner");
    runner.load(&bytes).expect("load");

    let call = headers_call(&[]);
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(2));
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(3));
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(4));

    // Reloading wipes the counter along with all other state.
    runner.load(&bytes).expect("reload");
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(2));
}

#[test]
fn test_lifecycle_runs_exactly_once_per_load() {
    // The guest counts proxy_on_vm_start invocations and reports the count.
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (global $vm_starts (mut i32) (i32.const 0))

            (func (export "proxy_on_vm_start") (param i32 i32) (result i32)
                (global.set $vm_starts (i32.add (global.get $vm_starts) (i32.const 1)))
                (i32.const 1)
            )
            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (global.get $vm_starts)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    assert!(!runner.is_initialized());

    let call = headers_call(&[]);
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(1));
    assert!(runner.is_initialized());
    // Still one vm_start after further hook calls.
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(1));
}

#[test]
fn test_header_pairs_blob_through_guest_allocator() {
    // The guest asks for the serialized header map (allocated through its own
    // malloc) and returns the pair count read from the blob's length prefix.
    let wat = r#"
        (module
            (import "env" "proxy_get_header_map_pairs"
                (func $pairs (param i32 i32 i32) (result i32)))
            (memory (export "memory") 2)
            (global $heap (mut i32) (i32.const 4096))

            (func (export "malloc") (param i32) (result i32)
                (local $ptr i32)
                (local.set $ptr (global.get $heap))
                (global.set $heap (i32.add (global.get $heap) (local.get 0)))
                (local.get $ptr)
            )
            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $pairs (i32.const 0) (i32.const 0) (i32.const 8)))
                (i32.load (i32.load (i32.const 0)))
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let result = runner
        .call_hook(&headers_call(&[("x-a", "1"), ("x-b", "2")]))
        .expect("hook call failed");
    assert_eq!(result.return_code, Some(2));
}

#[test]
fn test_property_lookup_through_host_arena() {
    // No guest allocator here: the host arena grows guest memory to return the
    // property value. The guest reports the value's length.
    let wat = r#"
        (module
            (import "env" "proxy_get_property"
                (func $prop (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "request.method")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $prop (i32.const 0) (i32.const 14) (i32.const 100) (i32.const 104)))
                (i32.load (i32.const 104))
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let mut call = headers_call(&[]);
    call.request.method = "POST".to_string();
    // "POST" has four bytes.
    assert_eq!(runner.call_hook(&call).unwrap().return_code, Some(4));
}

#[test]
fn test_guest_body_splice() {
    let wat = r#"
        (module
            (import "env" "proxy_set_buffer_bytes"
                (func $setbuf (param i32 i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "mutated")

            (func (export "proxy_on_request_body") (param i32 i32 i32) (result i32)
                (drop (call $setbuf
                    (i32.const 0)       ;; request body
                    (i32.const 0) (i32.const 65535)
                    (i32.const 0) (i32.const 7)))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let call = HookCall {
        hook: Hook::RequestBody,
        request: RequestInput {
            body: "original payload".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let result = runner.call_hook(&call).expect("hook call failed");
    assert_eq!(result.input.request.body, "original payload");
    assert_eq!(result.output.request.body, "mutated");
}

#[test]
fn test_guest_replaces_whole_header_map() {
    let wat = r#"
        (module
            (import "env" "proxy_set_header_map_pairs"
                (func $setpairs (param i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "X-New\00yes\00")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $setpairs (i32.const 0) (i32.const 0) (i32.const 10)))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let result = runner
        .call_hook(&headers_call(&[("x-old", "gone")]))
        .expect("hook call failed");

    assert_eq!(result.output.request.headers.len(), 1);
    assert_eq!(
        result.output.request.headers.get("x-new").map(String::as_str),
        Some("yes")
    );
}

#[test]
fn test_abort_fails_the_hook_with_attribution() {
    let wat = r#"
        (module
            (import "env" "proxy_log" (func $log (param i32 i32 i32) (result i32)))
            (import "env" "abort" (func $abort (param i32 i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "boom\00")
            (data (i32.const 16) "filter.ts\00")
            (data (i32.const 32) "before abort")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $log (i32.const 2) (i32.const 32) (i32.const 12)))
                (call $abort (i32.const 0) (i32.const 16) (i32.const 7) (i32.const 3))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let err = runner.call_hook(&headers_call(&[])).unwrap_err();
    match err {
        RunnerError::GuestFailure { hook, message } => {
            assert_eq!(hook, "proxy_on_request_headers");
            assert!(message.contains("boom"), "message: {message}");
            assert!(message.contains("filter.ts:7:3"), "message: {message}");
            assert!(message.contains("proxy_log"), "message: {message}");
        }
        other => panic!("expected GuestFailure, got {other:?}"),
    }
}

#[test]
fn test_absent_hook_export_returns_no_code() {
    let wat = r#"(module (memory (export "memory") 1))"#;
    let mut runner = runner_with(wat);
    let result = runner.call_hook(&headers_call(&[("x-a", "1")])).unwrap();
    assert_eq!(result.return_code, None);
    // Inputs still snapshot normally.
    assert_eq!(
        result.input.request.headers.get("x-a").map(String::as_str),
        Some("1")
    );
}

#[test]
fn test_module_without_memory_export_fails_to_load() {
    let wat = r#"
        (module
            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (i32.const 0)))
    "#;
    let bytes = wat::parse_str(wat).expect("failed to parse WAT");
    let mut runner = ProxyWasmRunner::new().expect("failed to create runner");
    let err = runner.load(&bytes).unwrap_err();
    assert!(matches!(err, RunnerError::NoMemoryExport));
    assert!(!runner.is_loaded());
}

#[test]
fn test_log_level_floor_filters_results() {
    let wat = r#"
        (module
            (import "env" "proxy_log" (func $log (param i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "noisy detail")
            (data (i32.const 16) "something broke")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $log (i32.const 1) (i32.const 0) (i32.const 12)))
                (drop (call $log (i32.const 4) (i32.const 16) (i32.const 15)))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let mut call = headers_call(&[]);
    call.log_level = Some(3);
    let result = runner.call_hook(&call).expect("hook call failed");

    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].level, LOG_ERROR);
    assert_eq!(result.logs[0].message, "something broke");
}

#[test]
fn test_fd_write_becomes_debug_log() {
    let wat = r#"
        (module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "printf output")
            (data (i32.const 16) "\00\00\00\00\0d\00\00\00")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $fd_write (i32.const 1) (i32.const 16) (i32.const 1) (i32.const 32)))
                (i32.const 0)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let result = runner.call_hook(&headers_call(&[])).expect("hook call failed");
    assert!(result
        .logs
        .iter()
        .any(|l| l.level == LOG_DEBUG && l.message == "fd_write(fd=1): printf output"));
}

#[test]
fn test_send_local_response_is_recorded_not_short_circuited() {
    let wat = r#"
        (module
            (import "env" "proxy_send_local_response"
                (func $local (param i32 i32 i32 i32 i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "denied")

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $local
                    (i32.const 403)
                    (i32.const 0) (i32.const 6)
                    (i32.const 0) (i32.const 0)
                    (i32.const 0) (i32.const 0)
                    (i32.const 0)))
                (i32.const 1)
            )
        )
    "#;

    let mut runner = runner_with(wat);
    let result = runner.call_hook(&headers_call(&[])).expect("hook call failed");
    // The hook still completed and returned its own code.
    assert_eq!(result.return_code, Some(1));
    assert!(result
        .logs
        .iter()
        .any(|l| l.message.contains("local response requested: status=403")));
}

#[test]
fn test_plugin_configuration_is_nul_terminated_in_buffer() {
    // The guest reports the vm-config buffer length via proxy_get_buffer_status.
    let wat = r#"
        (module
            (import "env" "proxy_get_buffer_status"
                (func $status (param i32 i32 i32) (result i32)))
            (memory (export "memory") 1)

            (func (export "proxy_on_request_headers") (param i32 i32 i32) (result i32)
                (drop (call $status (i32.const 6) (i32.const 0) (i32.const 8)))
                (i32.load (i32.const 0))
            )
        )
    "#;

    let bytes = wat::parse_str(wat).expect("failed to parse WAT");
    let mut runner = ProxyWasmRunner::new().expect("failed to create runner");
    runner.set_configuration(Some("vm-config-here".to_string()), None);
    runner.load(&bytes).expect("load");

    // 14 configuration bytes plus the NUL terminator.
    let result = runner.call_hook(&headers_call(&[])).unwrap();
    assert_eq!(result.return_code, Some(15));
}
