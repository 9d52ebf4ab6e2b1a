//! Guest module lifecycle and hook orchestration.
//!
//! One [`ProxyWasmRunner`] owns one loaded guest module, its wasmtime instance
//! and the [`HostState`] bound to it. The lifecycle is:
//!
//! ```text
//! unloaded --load()--> loaded(uninitialized) --first hook--> loaded(initialized)
//! ```
//!
//! `load()` wipes all state and rebinds memory; initialization (`vm_start`,
//! `plugin_start`, `configure`, root `context_create`) runs lazily on the first
//! hook and exactly once per loaded module, each call best-effort. Every hook
//! invocation allocates a fresh stream context id before entering the guest.
//!
//! `call_full_flow` runs the request-side hooks, performs a real outbound fetch
//! with the guest-mutated request, then runs the response-side hooks against
//! the real response. A failed fetch is converted into synthesized error
//! results for the response side and a status-0 final response; it never
//! escapes as an error.
//!
//! Invocations are synchronous and one-at-a-time; callers that share a runner
//! across concurrent sessions must serialize access themselves.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use wasmtime::{Config, Engine, Instance, Linker, Module, Store, Val, ValType};

use crate::headers::{self, HeaderMap};
use crate::host_functions::{
    self, HostState, LogEntry, LOG_ERROR, ROOT_CONTEXT_ID,
};
use crate::memory::MemoryManager;

/// Upper bound on the outbound fetch in `call_full_flow`.
const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Stream context ids start here; id 1 is the root context.
const FIRST_STREAM_CONTEXT_ID: u32 = 2;

/// Guest allocator exports, probed in order.
const GUEST_ALLOCATOR_EXPORTS: &[&str] = &["proxy_on_memory_allocate", "malloc"];

/// Custom error type for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no module loaded")]
    NotLoaded,

    #[error("invalid wasm module: {0}")]
    InvalidModule(String),

    #[error("failed to instantiate module: {0}")]
    Instantiation(String),

    #[error("module has no exported memory")]
    NoMemoryExport,

    #[error("invalid target url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("guest failed during {hook}: {message}")]
    GuestFailure { hook: &'static str, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The four HTTP filtering hooks this host drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hook {
    #[serde(rename = "onRequestHeaders")]
    RequestHeaders,
    #[serde(rename = "onRequestBody")]
    RequestBody,
    #[serde(rename = "onResponseHeaders")]
    ResponseHeaders,
    #[serde(rename = "onResponseBody")]
    ResponseBody,
}

impl Hook {
    pub fn export_name(self) -> &'static str {
        match self {
            Hook::RequestHeaders => "proxy_on_request_headers",
            Hook::RequestBody => "proxy_on_request_body",
            Hook::ResponseHeaders => "proxy_on_response_headers",
            Hook::ResponseBody => "proxy_on_response_body",
        }
    }
}

impl Default for Hook {
    fn default() -> Self {
        Hook::RequestHeaders
    }
}

/// Request side of a hook call payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestInput {
    pub headers: HeaderMap,
    pub body: String,
    pub method: String,
    pub path: String,
    pub scheme: String,
}

/// Response side of a hook call payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseInput {
    pub headers: HeaderMap,
    pub body: String,
    pub status: u16,
    pub status_text: String,
}

impl Default for ResponseInput {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            body: String::new(),
            status: 200,
            status_text: "OK".to_string(),
        }
    }
}

/// Input to one hook invocation, as handed over by the embedding layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookCall {
    pub hook: Hook,
    pub request: RequestInput,
    pub response: ResponseInput,
    pub properties: Value,
    pub log_level: Option<u32>,
}

/// Headers and body of one traffic side at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointState {
    pub headers: HeaderMap,
    pub body: String,
}

/// Pre- or post-hook snapshot of both traffic sides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficState {
    pub request: EndpointState,
    pub response: EndpointState,
}

/// Output of one hook invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResult {
    /// The guest export's return value; `None` if the export was absent or an
    /// error occurred before invocation.
    pub return_code: Option<i32>,
    pub logs: Vec<LogEntry>,
    pub input: TrafficState,
    pub output: TrafficState,
    pub properties: Value,
}

/// The four hook results of one full flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullFlowHookResults {
    pub on_request_headers: HookResult,
    pub on_request_body: HookResult,
    pub on_response_headers: HookResult,
    pub on_response_body: HookResult,
}

/// The final (possibly guest-mutated) response of a full flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_base64: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullFlowResult {
    pub hook_results: FullFlowHookResults,
    pub final_response: FinalResponse,
}

/// A hook call with normalized inputs and raw body bytes, threaded through the
/// phases of a full flow.
#[derive(Debug, Clone)]
struct PreparedCall {
    request_headers: HeaderMap,
    request_body: Vec<u8>,
    method: String,
    path: String,
    scheme: String,
    response_headers: HeaderMap,
    response_body: Vec<u8>,
    status: u16,
    status_text: String,
    properties: Value,
    log_floor: u32,
}

impl PreparedCall {
    fn new(call: &HookCall) -> Self {
        let mut method = call.request.method.trim().to_uppercase();
        if method.is_empty() {
            method = "GET".to_string();
        }
        let path = if call.request.path.is_empty() {
            "/".to_string()
        } else {
            call.request.path.clone()
        };
        let scheme = if call.request.scheme.is_empty() {
            "http".to_string()
        } else {
            call.request.scheme.clone()
        };
        Self {
            request_headers: headers::normalize(&call.request.headers),
            request_body: call.request.body.clone().into_bytes(),
            method,
            path,
            scheme,
            response_headers: headers::normalize(&call.response.headers),
            response_body: call.response.body.clone().into_bytes(),
            status: call.response.status,
            status_text: call.response.status_text.clone(),
            properties: call.properties.clone(),
            log_floor: call.log_level.unwrap_or(0),
        }
    }
}

struct LoadedGuest {
    store: Store<HostState>,
    instance: Instance,
    initialized: bool,
    next_stream_context_id: u32,
}

struct FetchedResponse {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Drives one guest filter module through the proxy-wasm lifecycle.
pub struct ProxyWasmRunner {
    engine: Engine,
    http_client: reqwest::Client,
    vm_config: Option<String>,
    plugin_config: Option<String>,
    loaded: Option<LoadedGuest>,
}

impl ProxyWasmRunner {
    pub fn new() -> Result<Self, RunnerError> {
        let mut config = Config::new();
        config.wasm_simd(true);
        config.max_wasm_stack(1024 * 1024); // 1MB stack

        let engine = Engine::new(&config)?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(FETCH_TIMEOUT_MS))
            .build()
            .map_err(anyhow::Error::from)?;

        Ok(Self {
            engine,
            http_client,
            vm_config: None,
            plugin_config: None,
            loaded: None,
        })
    }

    /// Set the VM/plugin configuration strings exposed to the guest during
    /// initialization. Read when the loaded module initializes on its first
    /// hook call.
    pub fn set_configuration(&mut self, vm_config: Option<String>, plugin_config: Option<String>) {
        self.vm_config = vm_config;
        self.plugin_config = plugin_config;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.loaded.as_ref().is_some_and(|l| l.initialized)
    }

    /// Compile and instantiate a guest module, replacing any previous one.
    ///
    /// All runner state is reset: host state, memory binding, context-id
    /// counter, the initialized flag. The guest's `_start` is attempted if
    /// exported; a failure there is logged and ignored, since many modules do
    /// not need it.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), RunnerError> {
        self.loaded = None;

        let module = Module::new(&self.engine, bytes)
            .map_err(|e| RunnerError::InvalidModule(format!("{e:#}")))?;

        let mut store = Store::new(&self.engine, HostState::new());
        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        host_functions::register(&mut linker)?;
        host_functions::register_wasi_shim(&mut linker)?;
        // Anything outside the emulated surface traps only if actually called.
        linker.define_unknown_imports_as_traps(&module)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| RunnerError::Instantiation(format!("{e:#}")))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or(RunnerError::NoMemoryExport)?;
        let guest_alloc = GUEST_ALLOCATOR_EXPORTS
            .iter()
            .find_map(|name| instance.get_func(&mut store, name));
        store.data_mut().memory = Some(MemoryManager::bind(memory, guest_alloc));

        if let Some(start) = instance.get_func(&mut store, "_start") {
            if let Err(e) = start.call(&mut store, &[], &mut []) {
                warn!("guest _start failed, continuing: {e:#}");
            }
        }

        info!("loaded proxy-wasm module ({} bytes)", bytes.len());
        self.loaded = Some(LoadedGuest {
            store,
            instance,
            initialized: false,
            next_stream_context_id: FIRST_STREAM_CONTEXT_ID,
        });
        Ok(())
    }

    /// Run a single hook against the loaded module.
    pub fn call_hook(&mut self, call: &HookCall) -> Result<HookResult, RunnerError> {
        let prepared = PreparedCall::new(call);
        self.run_hook(call.hook, &prepared)
    }

    /// Run the four-hook flow with a real outbound fetch between the request
    /// and response sides.
    pub async fn call_full_flow(
        &mut self,
        call: &HookCall,
        target_url: &str,
    ) -> Result<FullFlowResult, RunnerError> {
        let target = Url::parse(target_url).map_err(|e| RunnerError::InvalidTarget {
            url: target_url.to_string(),
            reason: e.to_string(),
        })?;
        if self.loaded.is_none() {
            return Err(RunnerError::NotLoaded);
        }

        let mut prepared = PreparedCall::new(call);

        // Phase 1: request-side hooks, threading guest mutations forward.
        let on_request_headers = self.run_hook(Hook::RequestHeaders, &prepared)?;
        if let Some((headers, body)) = self.post_call_request() {
            prepared.request_headers = headers;
            prepared.request_body = body;
        }
        let on_request_body = self.run_hook(Hook::RequestBody, &prepared)?;
        if let Some((headers, body)) = self.post_call_request() {
            prepared.request_headers = headers;
            prepared.request_body = body;
        }

        // Phase 2: the real fetch, with the request as the guest left it.
        let fetched = match self.fetch(&target, &prepared).await {
            Ok(fetched) => fetched,
            Err(fetch_err) => {
                let message = format!(
                    "outbound fetch to {target} failed: {fetch_err}; last request state: {} {} ({} headers, {} body bytes)",
                    prepared.method,
                    prepared.path,
                    prepared.request_headers.len(),
                    prepared.request_body.len(),
                );
                error!("{message}");
                let synthesized = synthesized_error_result(&prepared, &message);
                return Ok(FullFlowResult {
                    hook_results: FullFlowHookResults {
                        on_request_headers,
                        on_request_body,
                        on_response_headers: synthesized.clone(),
                        on_response_body: synthesized,
                    },
                    final_response: FinalResponse {
                        status: 0,
                        status_text: String::new(),
                        headers: HeaderMap::new(),
                        body: format!("fetch failed: {fetch_err}"),
                        content_type: "text/plain".to_string(),
                        is_base64: false,
                    },
                });
            }
        };

        debug!(
            "fetched {} {} -> {} ({} bytes)",
            prepared.method,
            target,
            fetched.status,
            fetched.body.len()
        );

        // Phase 3: response-side hooks against the real response.
        prepared.response_headers = fetched.headers;
        prepared.response_body = fetched.body;
        prepared.status = fetched.status;
        prepared.status_text = fetched.status_text.clone();

        let on_response_headers = self.run_hook(Hook::ResponseHeaders, &prepared)?;
        if let Some((headers, body)) = self.post_call_response() {
            prepared.response_headers = headers;
            prepared.response_body = body;
        }
        let on_response_body = self.run_hook(Hook::ResponseBody, &prepared)?;
        let (final_headers, final_body) = self
            .post_call_response()
            .unwrap_or((prepared.response_headers.clone(), prepared.response_body.clone()));

        let content_type = final_headers
            .get("content-type")
            .cloned()
            .unwrap_or_default();
        let (body, is_base64) = encode_body(&final_body, &content_type);

        Ok(FullFlowResult {
            hook_results: FullFlowHookResults {
                on_request_headers,
                on_request_body,
                on_response_headers,
                on_response_body,
            },
            final_response: FinalResponse {
                status: fetched.status,
                status_text: fetched.status_text,
                headers: final_headers,
                body,
                content_type,
                is_base64,
            },
        })
    }

    fn run_hook(&mut self, hook: Hook, call: &PreparedCall) -> Result<HookResult, RunnerError> {
        let vm_config = self.vm_config.clone();
        let plugin_config = self.plugin_config.clone();
        let loaded = self.loaded.as_mut().ok_or(RunnerError::NotLoaded)?;

        {
            let state = loaded.store.data_mut();
            state.request_headers = call.request_headers.clone();
            state.response_headers = call.response_headers.clone();
            state.request_body = call.request_body.clone();
            state.response_body = call.response_body.clone();
            state.logs.clear();
            state.log_level = call.log_floor;
            state.current_context_id = ROOT_CONTEXT_ID;
            state.last_host_call = "none";
            state.resolver.set_properties(call.properties.clone());
            state.resolver.set_request_metadata(
                call.request_headers.clone(),
                &call.method,
                &call.path,
                &call.scheme,
            );
            state.resolver.set_response_metadata(
                call.response_headers.clone(),
                call.status,
                &call.status_text,
            );
        }

        ensure_initialized(loaded, &vm_config, &plugin_config);

        let input = snapshot(loaded.store.data());

        // Every invocation gets a brand-new stream context, even within one
        // logical request/response cycle.
        let context_id = loaded.next_stream_context_id;
        loaded.next_stream_context_id += 1;
        if let Err(e) = invoke_export(
            &mut loaded.store,
            &loaded.instance,
            "proxy_on_context_create",
            [context_id as i32, ROOT_CONTEXT_ID as i32, 0],
        ) {
            warn!("proxy_on_context_create({context_id}) failed: {e:#}");
            loaded
                .store
                .data_mut()
                .record(LOG_ERROR, format!("proxy_on_context_create failed: {e:#}"));
        }
        loaded.store.data_mut().current_context_id = context_id;

        let arg = {
            let state = loaded.store.data();
            match hook {
                Hook::RequestHeaders => state.request_headers.len() as i32,
                Hook::RequestBody => state.request_body.len() as i32,
                Hook::ResponseHeaders => state.response_headers.len() as i32,
                Hook::ResponseBody => state.response_body.len() as i32,
            }
        };

        let return_code = match invoke_export(
            &mut loaded.store,
            &loaded.instance,
            hook.export_name(),
            [context_id as i32, arg, 1],
        ) {
            Ok(code) => code,
            Err(e) => {
                let message = format!("{e:#}");
                let last = loaded.store.data().last_host_call;
                error!(
                    "{} trapped (last host call: {last}): {message}",
                    hook.export_name()
                );
                loaded.store.data_mut().record(
                    LOG_ERROR,
                    format!(
                        "{} trapped: {message} (last host call: {last})",
                        hook.export_name()
                    ),
                );
                return Err(RunnerError::GuestFailure {
                    hook: hook.export_name(),
                    message,
                });
            }
        };

        let state = loaded.store.data();
        let output = snapshot(state);
        let logs = state
            .logs
            .iter()
            .filter(|entry| entry.level >= call.log_floor)
            .cloned()
            .collect();

        Ok(HookResult {
            return_code,
            logs,
            input,
            output,
            properties: call.properties.clone(),
        })
    }

    async fn fetch(
        &self,
        target: &Url,
        prepared: &PreparedCall,
    ) -> Result<FetchedResponse, reqwest::Error> {
        let method = Method::from_bytes(prepared.method.as_bytes()).unwrap_or(Method::GET);

        let mut header_map = reqwest::header::HeaderMap::new();
        for (name, value) in &prepared.request_headers {
            // The transport owns these; Host survives as x-forwarded-host.
            if name == "content-length" {
                continue;
            }
            let forward_name = if name == "host" { "x-forwarded-host" } else { name.as_str() };
            match (
                HeaderName::from_bytes(forward_name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(header_name), Ok(header_value)) => {
                    header_map.insert(header_name, header_value);
                }
                _ => warn!("skipping unforwardable header '{name}'"),
            }
        }

        let mut request = self
            .http_client
            .request(method, target.clone())
            .headers(header_map);
        if !prepared.request_body.is_empty() {
            request = request.body(prepared.request_body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            let name = name.as_str().to_lowercase();
            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.get_mut(&name) {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(&text);
                }
                None => {
                    headers.insert(name, text);
                }
            }
        }

        let body = response.bytes().await?.to_vec();
        Ok(FetchedResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body,
        })
    }

    fn post_call_request(&self) -> Option<(HeaderMap, Vec<u8>)> {
        self.loaded.as_ref().map(|loaded| {
            let state = loaded.store.data();
            (state.request_headers.clone(), state.request_body.clone())
        })
    }

    fn post_call_response(&self) -> Option<(HeaderMap, Vec<u8>)> {
        self.loaded.as_ref().map(|loaded| {
            let state = loaded.store.data();
            (state.response_headers.clone(), state.response_body.clone())
        })
    }
}

/// One-time lifecycle sequence, each call best-effort: a guest missing an
/// optional export must not block the others.
fn ensure_initialized(
    loaded: &mut LoadedGuest,
    vm_config: &Option<String>,
    plugin_config: &Option<String>,
) {
    if loaded.initialized {
        return;
    }

    let vm = match vm_config {
        Some(config) => config.clone(),
        None => {
            // Default VM config carries the derived root id, if any.
            let root_id = loaded
                .store
                .data()
                .resolver
                .root_id()
                .unwrap_or_default();
            serde_json::json!({ "root_id": root_id }).to_string()
        }
    };
    let plugin = plugin_config.clone().unwrap_or_default();
    let vm_len = vm.len() as i32;
    let plugin_len = plugin.len() as i32;

    {
        let state = loaded.store.data_mut();
        state.vm_config = nul_terminated(vm.as_bytes());
        state.plugin_config = nul_terminated(plugin.as_bytes());
    }

    let lifecycle: [(&str, [i32; 3]); 4] = [
        ("proxy_on_vm_start", [ROOT_CONTEXT_ID as i32, vm_len, 1]),
        ("proxy_on_plugin_start", [ROOT_CONTEXT_ID as i32, plugin_len, 1]),
        ("proxy_on_configure", [ROOT_CONTEXT_ID as i32, plugin_len, 1]),
        ("proxy_on_context_create", [ROOT_CONTEXT_ID as i32, 0, 0]),
    ];
    for (name, args) in lifecycle {
        match invoke_export(&mut loaded.store, &loaded.instance, name, args) {
            Ok(Some(code)) => debug!("{name} returned {code}"),
            Ok(None) => debug!("{name} not exported, skipping"),
            Err(e) => {
                warn!("{name} failed during initialization: {e:#}");
                loaded
                    .store
                    .data_mut()
                    .record(LOG_ERROR, format!("{name} failed: {e:#}"));
            }
        }
    }

    loaded.initialized = true;
}

/// Call a guest export by name with up to three i32 arguments, adapting to the
/// export's actual arity (older ABI revisions take two arguments where newer
/// ones take three). `Ok(None)` means the export is absent.
fn invoke_export(
    store: &mut Store<HostState>,
    instance: &Instance,
    name: &str,
    args: [i32; 3],
) -> Result<Option<i32>, anyhow::Error> {
    let Some(func) = instance.get_func(&mut *store, name) else {
        return Ok(None);
    };

    let ty = func.ty(&mut *store);
    let param_count = ty.params().len();
    if param_count > 3 || ty.params().any(|p| !matches!(p, ValType::I32)) {
        anyhow::bail!("export {name} has an unsupported signature");
    }
    if ty.results().len() > 1 || ty.results().any(|r| !matches!(r, ValType::I32)) {
        anyhow::bail!("export {name} has an unsupported result type");
    }

    let params: Vec<Val> = args[..param_count].iter().map(|&v| Val::I32(v)).collect();
    let mut results = vec![Val::I32(0); ty.results().len()];
    func.call(&mut *store, &params, &mut results)?;

    Ok(Some(results.first().and_then(Val::i32).unwrap_or(0)))
}

fn snapshot(state: &HostState) -> TrafficState {
    TrafficState {
        request: EndpointState {
            headers: state.request_headers.clone(),
            body: String::from_utf8_lossy(&state.request_body).into_owned(),
        },
        response: EndpointState {
            headers: state.response_headers.clone(),
            body: String::from_utf8_lossy(&state.response_body).into_owned(),
        },
    }
}

fn synthesized_error_result(prepared: &PreparedCall, message: &str) -> HookResult {
    let state = TrafficState {
        request: EndpointState {
            headers: prepared.request_headers.clone(),
            body: String::from_utf8_lossy(&prepared.request_body).into_owned(),
        },
        response: EndpointState {
            headers: prepared.response_headers.clone(),
            body: String::from_utf8_lossy(&prepared.response_body).into_owned(),
        },
    };
    HookResult {
        return_code: None,
        logs: vec![LogEntry {
            level: LOG_ERROR,
            message: message.to_string(),
        }],
        input: state.clone(),
        output: state,
        properties: prepared.properties.clone(),
    }
}

fn nul_terminated(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

fn encode_body(body: &[u8], content_type: &str) -> (String, bool) {
    if body.is_empty() {
        return (String::new(), false);
    }
    if is_text_content_type(content_type) {
        (String::from_utf8_lossy(body).into_owned(), false)
    } else {
        (BASE64.encode(body), true)
    }
}

fn is_text_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.is_empty()
        || ct.starts_with("text/")
        || ct.contains("json")
        || ct.contains("xml")
        || ct.contains("javascript")
        || ct.contains("x-www-form-urlencoded")
}
