//! Property-namespace resolution.
//!
//! Guests query a hierarchical key space (segments separated by NUL, `.` or `/`)
//! for ambient request/response metadata and caller-supplied properties.
//! Resolution priority:
//! 1. exact match against the explicit property tree
//! 2. synthesized standard request/response properties
//! 3. the derived root id, for the handful of root-identity paths
//! 4. segment-wise traversal of the tree (NUL split), with `.`/`/` flat-key retries
//! 5. a final `.`-split traversal
//!
//! "Not found" is a normal result, never an error; guests probe optional data.

use serde_json::Value;

use crate::headers::HeaderMap;

/// Property names probed, in order, to derive the plugin's root id from the
/// caller-supplied property tree.
const ROOT_ID_CANDIDATES: &[&str] = &[
    "root_id",
    "rootId",
    "root_context",
    "rootContext",
    "plugin_root_id",
    "pluginRootId",
];

/// Paths that resolve to the derived root id.
const ROOT_ID_PATHS: &[&str] = &[
    "root_id",
    "plugin_name",
    "plugin_root_id",
    "root_context",
    "root_context_id",
];

/// Holds the current request/response metadata and the caller-supplied property
/// tree for one hook invocation.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    properties: Value,
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    method: String,
    path: String,
    scheme: String,
    status: u16,
    status_text: String,
}

impl PropertyResolver {
    pub fn set_properties(&mut self, properties: Value) {
        self.properties = properties;
    }

    pub fn set_request_metadata(
        &mut self,
        headers: HeaderMap,
        method: &str,
        path: &str,
        scheme: &str,
    ) {
        self.request_headers = headers;
        self.method = method.to_string();
        self.path = path.to_string();
        self.scheme = scheme.to_string();
    }

    pub fn set_response_metadata(&mut self, headers: HeaderMap, status: u16, status_text: &str) {
        self.response_headers = headers;
        self.status = status;
        self.status_text = status_text.to_string();
    }

    /// Probe the property tree for a root id.
    pub fn root_id(&self) -> Option<String> {
        ROOT_ID_CANDIDATES
            .iter()
            .find_map(|name| self.properties.get(name))
            .map(value_text)
    }

    /// Resolve a raw property path as handed over by the guest (may contain NUL
    /// segment separators). `None` means "property not found".
    pub fn resolve(&self, raw: &str) -> Option<Value> {
        if let Some(value) = self.properties.get(raw) {
            return Some(value.clone());
        }

        let dotted = raw.replace('\0', ".");
        if let Some(value) = self.synthesized(&dotted) {
            return Some(value);
        }

        if ROOT_ID_PATHS.contains(&dotted.as_str()) {
            if let Some(id) = self.root_id() {
                return Some(Value::String(id));
            }
        }

        let segments: Vec<&str> = raw.split('\0').filter(|s| !s.is_empty()).collect();
        if let Some(value) = traverse(&self.properties, &segments) {
            return Some(value.clone());
        }
        if segments.len() > 1 {
            if let Some(value) = self.properties.get(segments.join(".")) {
                return Some(value.clone());
            }
            if let Some(value) = self.properties.get(segments.join("/")) {
                return Some(value.clone());
            }
        }

        if dotted.contains('.') {
            let dot_segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
            if let Some(value) = traverse(&self.properties, &dot_segments) {
                return Some(value.clone());
            }
        }

        None
    }

    fn synthesized(&self, dotted: &str) -> Option<Value> {
        match dotted {
            "request.method" => Some(Value::String(self.method.clone())),
            "request.path" => Some(Value::String(self.path.clone())),
            "request.url" => {
                let host = self
                    .request_headers
                    .get("host")
                    .map(String::as_str)
                    .unwrap_or_default();
                Some(Value::String(format!("{}://{}{}", self.scheme, host, self.path)))
            }
            "request.host" => self.request_headers.get("host").cloned().map(Value::String),
            "request.scheme" | "request.protocol" => Some(Value::String(self.scheme.clone())),
            "request.content_type" => self
                .request_headers
                .get("content-type")
                .cloned()
                .map(Value::String),
            "response.code" | "response.status" | "response.status_code" => {
                Some(Value::from(self.status))
            }
            "response.code_details" => Some(Value::String(self.status_text.clone())),
            "response.content_type" => self
                .response_headers
                .get("content-type")
                .cloned()
                .map(Value::String),
            _ => None,
        }
    }
}

/// Render a property value the way guests expect it: strings verbatim,
/// everything else as JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn traverse<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    if segments.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
