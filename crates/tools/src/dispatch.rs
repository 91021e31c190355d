//! Tool call pipeline: auth, validation, breaker and transport.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use auth::{AuthGate, Credentials};
use fault::{BreakerConfig, CircuitBreaker, Error, ErrorCode, Result};
use mcp::{CallToolResult, Tool, ToolProvider};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use transport::ConnectionManager;

use crate::handler::{ToolHandler, pretty};
use crate::registry::ToolRegistry;

const API_KEY_ARG: &str = "apiKey";
const CLIENT_ID_ARG: &str = "clientId";

/// Routes tool calls to the remote application.
pub struct Dispatcher {
    registry: ToolRegistry,
    connections: ConnectionManager,
    auth: Option<AuthGate>,
    breaker_config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, connections: ConnectionManager) -> Self {
        Self {
            registry,
            connections,
            auth: None,
            breaker_config: BreakerConfig::default(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Require credentials on every call.
    pub fn with_auth(mut self, gate: AuthGate) -> Self {
        self.auth = Some(gate);
        self
    }

    pub fn with_breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Run one tool call and return the text shown to the agent.
    ///
    /// `apiKey` and `clientId` are consumed here and never reach the remote.
    pub async fn dispatch(&self, name: &str, mut arguments: Map<String, Value>) -> Result<String> {
        let tool = self.registry.get(name).cloned().ok_or_else(|| {
            Error::validation(format!("Unknown tool: {name}"), Some("name"), Some(json!(name)))
        })?;

        let credentials = take_credentials(&mut arguments);
        self.authorize(tool.as_ref(), &credentials)?;

        let call = tool.prepare(arguments)?;
        debug!(tool = name, method = %call.method, "dispatching");

        let breaker = self.breaker(&call.method);
        let result = breaker
            .call(|| {
                self.connections.with_connection(|conn| {
                    let method = call.method.clone();
                    let params = call.params.clone();
                    async move { conn.send(&method, params).await }
                })
            })
            .await?;

        Ok(tool.render(&call, &result))
    }

    /// Close the persistent connection, if any.
    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
    }

    fn authorize(&self, tool: &dyn ToolHandler, credentials: &Credentials) -> Result<()> {
        match &self.auth {
            Some(gate) => gate.authorize(credentials).map(|_| ()),
            None if tool.requires_auth() => {
                warn!(tool = tool.name(), "refusing call: authentication is not configured");
                Err(Error::authentication(
                    "Authentication is not configured",
                    ErrorCode::InvalidApiKey,
                ))
            }
            None => Ok(()),
        }
    }

    /// Breaker for one remote method, created on first use.
    fn breaker(&self, method: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            breakers
                .entry(method.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(method, self.breaker_config))),
        )
    }

    fn tool_schema(&self, tool: &dyn ToolHandler) -> Value {
        let mut schema = tool.input_schema();
        if self.auth.is_none() {
            return schema;
        }
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert(
                API_KEY_ARG.to_string(),
                json!({"type": "string", "description": "Shared secret for this server"}),
            );
            properties.insert(
                CLIENT_ID_ARG.to_string(),
                json!({"type": "string", "description": "Caller identity used for quotas"}),
            );
        }
        match schema.get_mut("required").and_then(Value::as_array_mut) {
            Some(required) => required.push(json!(API_KEY_ARG)),
            None => {
                if let Some(object) = schema.as_object_mut() {
                    object.insert("required".to_string(), json!([API_KEY_ARG]));
                }
            }
        }
        schema
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("lifecycle", &self.connections.lifecycle())
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

/// Remove credentials from the top level and from a nested `data` object.
/// Top-level values win.
fn take_credentials(arguments: &mut Map<String, Value>) -> Credentials {
    let mut api_key = take_string(arguments, API_KEY_ARG);
    let mut client_id = take_string(arguments, CLIENT_ID_ARG);

    if let Some(data) = arguments.get_mut("data").and_then(Value::as_object_mut) {
        let nested_key = take_string(data, API_KEY_ARG);
        let nested_client = take_string(data, CLIENT_ID_ARG);
        api_key = api_key.or(nested_key);
        client_id = client_id.or(nested_client);
    }

    Credentials { api_key, client_id }
}

fn take_string(arguments: &mut Map<String, Value>, key: &str) -> Option<String> {
    match arguments.remove(key)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

impl ToolProvider for Dispatcher {
    fn list_tools(&self) -> Vec<Tool> {
        self.registry
            .iter()
            .map(|tool| Tool {
                name: tool.name().to_string(),
                description: Some(tool.description().to_string()),
                input_schema: self.tool_schema(tool.as_ref()),
            })
            .collect()
    }

    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = CallToolResult> + Send {
        let name = name.to_string();
        async move {
            match self.dispatch(&name, arguments).await {
                Ok(text) => CallToolResult::text(text),
                Err(e) => {
                    warn!(tool = %name, code = ?e.code(), error = %e, "tool call failed");
                    let envelope = serde_json::to_value(e.to_response())
                        .unwrap_or_else(|_| json!({"error": {"message": e.message()}}));
                    CallToolResult::error(pretty(&envelope))
                }
            }
        }
    }
}
