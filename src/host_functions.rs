//! The guest-visible ABI surface.
//!
//! Every `proxy_*` import the guest links against is registered here, plus the
//! minimal POSIX-like shim (`fd_write`, `proc_exit`) its runtime setup expects.
//! The imports are thin marshaling wrappers: they read arguments out of guest
//! memory via [`MemoryManager`], call a typed method on [`HostState`] (grouped
//! by concern: logging, properties, headers, buffers, lifecycle control), and
//! write results back through the ptr/len out-parameter pattern.
//!
//! Each import records itself as the "last host call" before doing anything
//! else, so a guest `abort` can name the host function it was in the middle of.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use wasmtime::{Caller, Linker};

use crate::headers::{self, HeaderMap};
use crate::memory::MemoryManager;
use crate::properties::{value_text, PropertyResolver};

/// The root context: created once per loaded module, carries configuration.
pub const ROOT_CONTEXT_ID: u32 = 1;

/// proxy-wasm log levels.
pub const LOG_TRACE: u32 = 0;
pub const LOG_DEBUG: u32 = 1;
pub const LOG_INFO: u32 = 2;
pub const LOG_WARN: u32 = 3;
pub const LOG_ERROR: u32 = 4;
pub const LOG_CRITICAL: u32 = 5;

/// proxy-wasm status codes returned to the guest.
const STATUS_OK: i32 = 0;
const STATUS_BAD_ARGUMENT: i32 = 2;

pub fn log_level_name(level: u32) -> &'static str {
    match level {
        LOG_TRACE => "trace",
        LOG_DEBUG => "debug",
        LOG_INFO => "info",
        LOG_WARN => "warn",
        LOG_ERROR => "error",
        LOG_CRITICAL => "critical",
        _ => "unknown",
    }
}

/// One guest-observable log line, returned to the caller with each hook result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: u32,
    pub message: String,
}

/// Per-call mutable state shared with the guest through the ABI imports.
///
/// Lives as the wasmtime store data; the runner pushes fresh traffic state into
/// it before every hook invocation and reads the mutated state back afterwards.
pub struct HostState {
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub request_body: Vec<u8>,
    pub response_body: Vec<u8>,
    pub vm_config: Vec<u8>,
    pub plugin_config: Vec<u8>,
    pub log_level: u32,
    pub logs: Vec<LogEntry>,
    pub current_context_id: u32,
    pub last_host_call: &'static str,
    pub resolver: PropertyResolver,
    /// Bound after instantiation, once the guest's exported memory is known.
    pub memory: Option<MemoryManager>,
}

impl HostState {
    pub fn new() -> Self {
        Self {
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            request_body: Vec::new(),
            response_body: Vec::new(),
            vm_config: Vec::new(),
            plugin_config: Vec::new(),
            log_level: LOG_TRACE,
            logs: Vec::new(),
            current_context_id: ROOT_CONTEXT_ID,
            last_host_call: "none",
            resolver: PropertyResolver::default(),
            memory: None,
        }
    }

    /// Append an entry to the guest-observable log list unconditionally.
    /// Host diagnostics (aborts, lifecycle failures, local responses) use this
    /// directly; guest `proxy_log` goes through the level check first.
    pub fn record(&mut self, level: u32, message: impl Into<String>) {
        self.logs.push(LogEntry {
            level,
            message: message.into(),
        });
    }

    fn headers(&self, map_type: i32) -> Option<&HeaderMap> {
        // Trailer map types share the request/response buckets in this host.
        match map_type {
            0 | 2 => Some(&self.request_headers),
            1 | 3 => Some(&self.response_headers),
            _ => None,
        }
    }

    fn headers_mut(&mut self, map_type: i32) -> Option<&mut HeaderMap> {
        match map_type {
            0 | 2 => Some(&mut self.request_headers),
            1 | 3 => Some(&mut self.response_headers),
            _ => None,
        }
    }

    fn buffer(&self, buffer_type: i32) -> Option<&Vec<u8>> {
        match buffer_type {
            0 => Some(&self.request_body),
            1 => Some(&self.response_body),
            6 => Some(&self.vm_config),
            7 => Some(&self.plugin_config),
            _ => None,
        }
    }

    fn buffer_mut(&mut self, buffer_type: i32) -> Option<&mut Vec<u8>> {
        match buffer_type {
            0 => Some(&mut self.request_body),
            1 => Some(&mut self.response_body),
            6 => Some(&mut self.vm_config),
            7 => Some(&mut self.plugin_config),
            _ => None,
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

// Logging.
impl HostState {
    /// Record a guest log line if it clears the current level floor.
    pub fn guest_log(&mut self, level: u32, message: String) {
        debug!("guest log [{}]: {}", log_level_name(level), message);
        if level >= self.log_level {
            self.record(level, message);
        }
    }
}

// Properties.
impl HostState {
    /// Resolve a property path; non-string values are stringified as JSON text
    /// and a miss is an empty string (never signalled to the guest).
    pub fn resolve_property(&self, path: &str) -> String {
        match self.resolver.resolve(path) {
            Some(value) => value_text(&value),
            None => String::new(),
        }
    }
}

// Header maps.
impl HostState {
    /// Case-insensitive single-value lookup.
    pub fn header_value(&self, map_type: i32, key: &str) -> Option<String> {
        self.headers(map_type)?.get(&key.to_lowercase()).cloned()
    }

    /// Append with comma-join if the key exists, else set.
    pub fn add_header(&mut self, map_type: i32, key: &str, value: &str) -> bool {
        let Some(map) = self.headers_mut(map_type) else {
            return false;
        };
        let key = key.to_lowercase();
        match map.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                map.insert(key, value.to_string());
            }
        }
        true
    }

    pub fn replace_header(&mut self, map_type: i32, key: &str, value: &str) -> bool {
        match self.headers_mut(map_type) {
            Some(map) => {
                map.insert(key.to_lowercase(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn remove_header(&mut self, map_type: i32, key: &str) -> bool {
        match self.headers_mut(map_type) {
            Some(map) => {
                map.remove(&key.to_lowercase());
                true
            }
            None => false,
        }
    }

    /// Replace the whole map with a guest-provided one, re-normalized.
    pub fn replace_all_headers(&mut self, map_type: i32, replacement: HeaderMap) -> bool {
        match self.headers_mut(map_type) {
            Some(map) => {
                *map = headers::normalize(&replacement);
                true
            }
            None => false,
        }
    }
}

// Buffers.
impl HostState {
    /// Slice `[start, start+length)` out of the selected buffer, clamped to its
    /// actual size.
    pub fn buffer_slice(&self, buffer_type: i32, start: u32, length: u32) -> Option<Vec<u8>> {
        let buf = self.buffer(buffer_type)?;
        let start = (start as usize).min(buf.len());
        let end = (start + length as usize).min(buf.len());
        Some(buf[start..end].to_vec())
    }

    pub fn buffer_len(&self, buffer_type: i32) -> Option<u32> {
        self.buffer(buffer_type).map(|b| b.len() as u32)
    }

    /// Splice a guest-provided byte range into the selected buffer, replacing
    /// `[start, start+length)`.
    pub fn splice_buffer(&mut self, buffer_type: i32, start: u32, length: u32, data: &[u8]) -> bool {
        let Some(buf) = self.buffer_mut(buffer_type) else {
            return false;
        };
        let start = (start as usize).min(buf.len());
        let end = (start + length as usize).min(buf.len());
        buf.splice(start..end, data.iter().copied());
        true
    }
}

fn bound_memory(caller: &Caller<'_, HostState>) -> Result<MemoryManager> {
    caller
        .data()
        .memory
        .ok_or_else(|| anyhow::anyhow!("guest memory is not bound"))
}

/// Register every `env` import of the emulated ABI on the linker.
pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker.func_wrap(
        "env",
        "proxy_log",
        |mut caller: Caller<'_, HostState>, level: i32, msg_ptr: i32, msg_len: i32| -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_log";
            let mm = bound_memory(&caller)?;
            let message = mm.read_string(&caller, msg_ptr as u32, msg_len as u32)?;
            caller.data_mut().guest_log(level as u32, message);
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_log_level",
        |mut caller: Caller<'_, HostState>, out_level_ptr: i32| -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_log_level";
            let mm = bound_memory(&caller)?;
            let level = caller.data().log_level;
            mm.write_u32(&mut caller, out_level_ptr as u32, level)?;
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_set_log_level",
        |mut caller: Caller<'_, HostState>, level: i32| -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_set_log_level";
            caller.data_mut().log_level = level as u32;
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_property",
        |mut caller: Caller<'_, HostState>,
         path_ptr: i32,
         path_len: i32,
         out_ptr_ptr: i32,
         out_len_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_property";
            let mut mm = bound_memory(&caller)?;
            let path = mm.read_string(&caller, path_ptr as u32, path_len as u32)?;
            let value = caller.data().resolve_property(&path);
            mm.write_string_result(&mut caller, &value, out_ptr_ptr as u32, out_len_ptr as u32)?;
            caller.data_mut().memory = Some(mm);
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_set_property",
        |mut caller: Caller<'_, HostState>,
         path_ptr: i32,
         path_len: i32,
         value_ptr: i32,
         value_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_set_property";
            let mm = bound_memory(&caller)?;
            let path = mm.read_string(&caller, path_ptr as u32, path_len as u32)?;
            let value = mm.read_string(&caller, value_ptr as u32, value_len as u32)?;
            // The property namespace is host-injected and read-mostly here:
            // accept the write, surface it in the logs, mutate nothing.
            debug!("proxy_set_property({path}) ignored");
            caller.data_mut().record(
                LOG_DEBUG,
                format!("proxy_set_property({path}={value}) accepted but not stored"),
            );
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_header_map_value",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         key_ptr: i32,
         key_len: i32,
         out_ptr_ptr: i32,
         out_len_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_header_map_value";
            let mut mm = bound_memory(&caller)?;
            let key = mm.read_string(&caller, key_ptr as u32, key_len as u32)?;
            let value = caller
                .data()
                .header_value(map_type, &key)
                .unwrap_or_default();
            mm.write_string_result(&mut caller, &value, out_ptr_ptr as u32, out_len_ptr as u32)?;
            caller.data_mut().memory = Some(mm);
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_header_map_pairs",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         out_ptr_ptr: i32,
         out_len_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_header_map_pairs";
            let mut mm = bound_memory(&caller)?;
            let Some(map) = caller.data().headers(map_type).cloned() else {
                return Ok(STATUS_BAD_ARGUMENT);
            };
            let blob = headers::encode_pairs(&map);
            mm.write_bytes_result(&mut caller, &blob, out_ptr_ptr as u32, out_len_ptr as u32)?;
            caller.data_mut().memory = Some(mm);
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_header_map_size",
        |mut caller: Caller<'_, HostState>, map_type: i32, out_size_ptr: i32| -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_header_map_size";
            let mm = bound_memory(&caller)?;
            let Some(count) = caller.data().headers(map_type).map(|m| m.len() as u32) else {
                return Ok(STATUS_BAD_ARGUMENT);
            };
            mm.write_u32(&mut caller, out_size_ptr as u32, count)?;
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_add_header_map_value",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         key_ptr: i32,
         key_len: i32,
         value_ptr: i32,
         value_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_add_header_map_value";
            let mm = bound_memory(&caller)?;
            let key = mm.read_string(&caller, key_ptr as u32, key_len as u32)?;
            let value = mm.read_string(&caller, value_ptr as u32, value_len as u32)?;
            if caller.data_mut().add_header(map_type, &key, &value) {
                Ok(STATUS_OK)
            } else {
                Ok(STATUS_BAD_ARGUMENT)
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_replace_header_map_value",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         key_ptr: i32,
         key_len: i32,
         value_ptr: i32,
         value_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_replace_header_map_value";
            let mm = bound_memory(&caller)?;
            let key = mm.read_string(&caller, key_ptr as u32, key_len as u32)?;
            let value = mm.read_string(&caller, value_ptr as u32, value_len as u32)?;
            if caller.data_mut().replace_header(map_type, &key, &value) {
                Ok(STATUS_OK)
            } else {
                Ok(STATUS_BAD_ARGUMENT)
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_remove_header_map_value",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         key_ptr: i32,
         key_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_remove_header_map_value";
            let mm = bound_memory(&caller)?;
            let key = mm.read_string(&caller, key_ptr as u32, key_len as u32)?;
            if caller.data_mut().remove_header(map_type, &key) {
                Ok(STATUS_OK)
            } else {
                Ok(STATUS_BAD_ARGUMENT)
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_set_header_map_pairs",
        |mut caller: Caller<'_, HostState>,
         map_type: i32,
         data_ptr: i32,
         data_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_set_header_map_pairs";
            let mm = bound_memory(&caller)?;
            let blob = mm.read_bytes(&caller, data_ptr as u32, data_len as u32)?;
            let replacement = headers::decode_pairs(&blob);
            if caller.data_mut().replace_all_headers(map_type, replacement) {
                Ok(STATUS_OK)
            } else {
                Ok(STATUS_BAD_ARGUMENT)
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_buffer_bytes",
        |mut caller: Caller<'_, HostState>,
         buffer_type: i32,
         start: i32,
         length: i32,
         out_ptr_ptr: i32,
         out_len_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_buffer_bytes";
            let mut mm = bound_memory(&caller)?;
            let Some(slice) = caller
                .data()
                .buffer_slice(buffer_type, start as u32, length as u32)
            else {
                return Ok(STATUS_BAD_ARGUMENT);
            };
            mm.write_bytes_result(&mut caller, &slice, out_ptr_ptr as u32, out_len_ptr as u32)?;
            caller.data_mut().memory = Some(mm);
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_get_buffer_status",
        |mut caller: Caller<'_, HostState>,
         buffer_type: i32,
         out_len_ptr: i32,
         out_flags_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_get_buffer_status";
            let mm = bound_memory(&caller)?;
            let Some(len) = caller.data().buffer_len(buffer_type) else {
                return Ok(STATUS_BAD_ARGUMENT);
            };
            mm.write_u32(&mut caller, out_len_ptr as u32, len)?;
            // Buffers are always complete in this host: end-of-stream is fixed.
            mm.write_u32(&mut caller, out_flags_ptr as u32, 1)?;
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_set_buffer_bytes",
        |mut caller: Caller<'_, HostState>,
         buffer_type: i32,
         start: i32,
         length: i32,
         data_ptr: i32,
         data_len: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_set_buffer_bytes";
            let mm = bound_memory(&caller)?;
            let data = mm.read_bytes(&caller, data_ptr as u32, data_len as u32)?;
            if caller
                .data_mut()
                .splice_buffer(buffer_type, start as u32, length as u32, &data)
            {
                Ok(STATUS_OK)
            } else {
                Ok(STATUS_BAD_ARGUMENT)
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_set_effective_context",
        |mut caller: Caller<'_, HostState>, context_id: i32| -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_set_effective_context";
            caller.data_mut().current_context_id = context_id as u32;
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "proxy_send_local_response",
        |mut caller: Caller<'_, HostState>,
         status_code: i32,
         details_ptr: i32,
         details_len: i32,
         body_ptr: i32,
         body_len: i32,
         _headers_ptr: i32,
         _headers_len: i32,
         _grpc_status: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "proxy_send_local_response";
            let mm = bound_memory(&caller)?;
            let details = mm.read_string(&caller, details_ptr as u32, details_len as u32)?;
            let body = mm.read_bytes(&caller, body_ptr as u32, body_len as u32)?;
            // Recorded for the caller to inspect; the hook pipeline keeps going.
            caller.data_mut().record(
                LOG_INFO,
                format!(
                    "local response requested: status={status_code} details=\"{details}\" body={} bytes",
                    body.len()
                ),
            );
            Ok(STATUS_OK)
        },
    )?;

    linker.func_wrap(
        "env",
        "abort",
        |mut caller: Caller<'_, HostState>,
         msg_ptr: i32,
         file_ptr: i32,
         line: i32,
         col: i32|
         -> Result<()> {
            // Deliberately not updating last_host_call: the abort diagnostic
            // attributes the failure to the import the guest called before it.
            let mm = bound_memory(&caller)?;
            let message = mm
                .read_optional_string(&caller, msg_ptr as u32)
                .unwrap_or_else(|| "<no message>".to_string());
            let filename = mm
                .read_optional_string(&caller, file_ptr as u32)
                .unwrap_or_else(|| "<unknown>".to_string());
            let last = caller.data().last_host_call;
            let diagnostic = format!(
                "guest abort: {message} at {filename}:{line}:{col} (last host call: {last})"
            );
            error!("{diagnostic}");
            caller.data_mut().record(LOG_ERROR, diagnostic.clone());
            Err(anyhow::anyhow!(diagnostic))
        },
    )?;

    linker.func_wrap(
        "env",
        "trace",
        |mut caller: Caller<'_, HostState>,
         msg_ptr: i32,
         _n: i32,
         _a0: f64,
         _a1: f64,
         _a2: f64,
         _a3: f64,
         _a4: f64|
         -> Result<()> {
            caller.data_mut().last_host_call = "trace";
            let mm = bound_memory(&caller)?;
            let message = mm
                .read_optional_string(&caller, msg_ptr as u32)
                .unwrap_or_default();
            caller.data_mut().record(LOG_TRACE, format!("trace: {message}"));
            Ok(())
        },
    )?;

    Ok(())
}

/// Register the minimal POSIX-like shim the guest's runtime setup expects.
/// `fd_write` becomes a debug-level log capture; `proc_exit` is intercepted and
/// never terminates the host.
pub fn register_wasi_shim(linker: &mut Linker<HostState>) -> Result<()> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_write",
        |mut caller: Caller<'_, HostState>,
         fd: i32,
         iovs_ptr: i32,
         iovs_len: i32,
         nwritten_ptr: i32|
         -> Result<i32> {
            caller.data_mut().last_host_call = "fd_write";
            let mm = bound_memory(&caller)?;
            let (text, _total) = mm.capture_fd_write(
                &mut caller,
                iovs_ptr as u32,
                iovs_len as u32,
                nwritten_ptr as u32,
            )?;
            if !text.is_empty() {
                caller.data_mut().record(
                    LOG_DEBUG,
                    format!("fd_write(fd={fd}): {}", text.trim_end_matches('\n')),
                );
            }
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "proc_exit",
        |mut caller: Caller<'_, HostState>, code: i32| {
            caller.data_mut().last_host_call = "proc_exit";
            warn!("guest called proc_exit({code}), ignoring");
            caller
                .data_mut()
                .record(LOG_DEBUG, format!("proc_exit({code}) intercepted"));
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_headers() -> HostState {
        let mut state = HostState::new();
        state.request_headers = HeaderMap::from([
            ("host".to_string(), "example.com".to_string()),
            ("x-a".to_string(), "1".to_string()),
        ]);
        state.response_headers =
            HeaderMap::from([("content-type".to_string(), "text/html".to_string())]);
        state
    }

    #[test]
    fn test_map_type_selection() {
        let state = state_with_headers();
        assert!(state.headers(0).unwrap().contains_key("host"));
        assert!(state.headers(1).unwrap().contains_key("content-type"));
        // Trailer types fold into the same buckets.
        assert!(state.headers(2).unwrap().contains_key("host"));
        assert!(state.headers(3).unwrap().contains_key("content-type"));
        assert!(state.headers(9).is_none());
    }

    #[test]
    fn test_header_value_is_case_insensitive() {
        let state = state_with_headers();
        assert_eq!(state.header_value(0, "HOST").as_deref(), Some("example.com"));
        assert_eq!(state.header_value(0, "missing"), None);
    }

    #[test]
    fn test_add_header_comma_joins_existing() {
        let mut state = state_with_headers();
        assert!(state.add_header(0, "X-A", "2"));
        assert_eq!(state.header_value(0, "x-a").as_deref(), Some("1, 2"));
        assert!(state.add_header(0, "x-new", "v"));
        assert_eq!(state.header_value(0, "x-new").as_deref(), Some("v"));
        assert!(!state.add_header(5, "x", "y"));
    }

    #[test]
    fn test_replace_and_remove_header() {
        let mut state = state_with_headers();
        assert!(state.replace_header(0, "X-A", "9"));
        assert_eq!(state.header_value(0, "x-a").as_deref(), Some("9"));
        assert!(state.remove_header(0, "X-A"));
        assert_eq!(state.header_value(0, "x-a"), None);
    }

    #[test]
    fn test_replace_all_headers_normalizes() {
        let mut state = state_with_headers();
        let replacement = HeaderMap::from([("X-New".to_string(), "yes".to_string())]);
        assert!(state.replace_all_headers(0, replacement));
        assert_eq!(state.request_headers.len(), 1);
        assert_eq!(state.header_value(0, "x-new").as_deref(), Some("yes"));
    }

    #[test]
    fn test_buffer_selection_and_slicing() {
        let mut state = HostState::new();
        state.request_body = b"hello world".to_vec();
        state.vm_config = b"vm\0".to_vec();

        assert_eq!(state.buffer_slice(0, 0, 5).unwrap(), b"hello");
        assert_eq!(state.buffer_slice(0, 6, 100).unwrap(), b"world");
        assert_eq!(state.buffer_slice(0, 100, 5).unwrap(), b"");
        assert_eq!(state.buffer_len(6), Some(3));
        assert_eq!(state.buffer_len(4), None);
    }

    #[test]
    fn test_splice_buffer_replaces_range() {
        let mut state = HostState::new();
        state.response_body = b"hello world".to_vec();
        assert!(state.splice_buffer(1, 6, 5, b"guest"));
        assert_eq!(state.response_body, b"hello guest");

        // Length past the end clamps: whole tail replaced.
        assert!(state.splice_buffer(1, 0, 1000, b"new"));
        assert_eq!(state.response_body, b"new");
        assert!(!state.splice_buffer(3, 0, 0, b""));
    }

    #[test]
    fn test_guest_log_respects_level_floor() {
        let mut state = HostState::new();
        state.log_level = LOG_WARN;
        state.guest_log(LOG_DEBUG, "dropped".to_string());
        state.guest_log(LOG_ERROR, "kept".to_string());
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].message, "kept");
        assert_eq!(state.logs[0].level, LOG_ERROR);
    }

    #[test]
    fn test_resolve_property_miss_is_empty_string() {
        let state = HostState::new();
        assert_eq!(state.resolve_property("unset.path"), "");
    }
}
