//! Tool handlers: argument validation and the command sent to the remote.

use fault::{Error, Result};
use serde_json::{Map, Value};

use crate::params::{ParamSpec, object_schema, validate};

/// One command for the remote application.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub method: String,
    pub params: Value,
}

/// A tool callable by the agent.
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn params(&self) -> &[ParamSpec];

    fn input_schema(&self) -> Value {
        object_schema(self.params())
    }

    /// Tools that must never run without an auth gate in front of them.
    fn requires_auth(&self) -> bool {
        false
    }

    /// Validate `arguments` and build the remote command.
    fn prepare(&self, arguments: Map<String, Value>) -> Result<RemoteCall>;

    /// Text shown to the agent for a successful `result`.
    fn render(&self, _call: &RemoteCall, result: &Value) -> String {
        pretty(result)
    }
}

/// Pretty-printed JSON.
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// What a [`RemoteTool`] sends as the command params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// The validated arguments object.
    Arguments,
    /// One field of the validated arguments.
    Field(&'static str),
}

/// A tool that validates its arguments and forwards them as one command.
#[derive(Debug, Clone)]
pub struct RemoteTool {
    name: &'static str,
    description: &'static str,
    method: &'static str,
    params: Vec<ParamSpec>,
    forward: Forward,
    renderer: fn(&Value) -> String,
}

impl RemoteTool {
    /// Tool whose remote method has the same name.
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            method: name,
            params: Vec::new(),
            forward: Forward::Arguments,
            renderer: pretty,
        }
    }

    pub fn method(mut self, method: &'static str) -> Self {
        self.method = method;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn forward(mut self, forward: Forward) -> Self {
        self.forward = forward;
        self
    }

    pub fn renderer(mut self, renderer: fn(&Value) -> String) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn remote_method(&self) -> &str {
        self.method
    }
}

impl ToolHandler for RemoteTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn prepare(&self, arguments: Map<String, Value>) -> Result<RemoteCall> {
        let mut validated = validate(&self.params, arguments)?;
        let params = match self.forward {
            Forward::Arguments => Value::Object(validated),
            Forward::Field(field) => validated
                .remove(field)
                .ok_or_else(|| Error::missing_parameter(field))?,
        };
        Ok(RemoteCall {
            method: self.method.to_string(),
            params,
        })
    }

    fn render(&self, _call: &RemoteCall, result: &Value) -> String {
        (self.renderer)(result)
    }
}
