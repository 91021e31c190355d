//! Code execution restricted to vetted templates or screened custom code.

use chrono::{SecondsFormat, Utc};
use fault::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::info;
use uuid::Uuid;

use crate::handler::{RemoteCall, ToolHandler, pretty};
use crate::params::{ParamSpec, ParamType, validate};

/// Longest custom snippet accepted, in characters.
pub const MAX_CODE_LEN: usize = 5000;

const DANGEROUS_PATTERNS: &[&str] = &[
    r"System\.IO",
    r"System\.Diagnostics",
    r"System\.Net",
    r"System\.Reflection",
    r"System\.Runtime",
    r"Process\.",
    r"File\.",
    r"Directory\.",
    r"Assembly\.",
    r"AppDomain",
    r"SecurityManager",
    r"Process\.Start",
    r"WebClient",
    r"HttpClient",
    r"Socket",
    r"Registry",
    r"Environment\.Exit",
    r"Marshal\.",
    r"DllImport",
    r"unsafe\s+",
    r"fixed\s*\(",
];

const ENCODED_ESCAPES: &[&str] = &["\\u", "\\x", "\\0"];

const CUSTOM: &str = "custom";

/// Pre-approved snippets, keyed by template name.
const TEMPLATES: &[(&str, &str)] = &[
    (
        "duplicate_elements",
        r#"
var elementIds = parameters[0] as List<ElementId>;
var translation = parameters[1] as XYZ;

using (Transaction t = new Transaction(doc, "Duplicate Elements"))
{
    t.Start();
    var copiedIds = ElementTransformUtils.CopyElements(doc, elementIds, translation);
    t.Commit();
    return copiedIds.Select(id => id.IntegerValue).ToList();
}
"#,
    ),
    (
        "get_element_parameters",
        r#"
var elementId = (int)parameters[0];
var element = doc.GetElement(new ElementId(elementId));
if (element == null) return null;

var paramData = new Dictionary<string, object>();
foreach (Parameter param in element.Parameters)
{
    if (param.HasValue && param.Definition != null)
    {
        paramData[param.Definition.Name] = param.AsValueString();
    }
}
return paramData;
"#,
    ),
    (
        "create_floor_plan",
        r#"
var levelId = (int)parameters[0];
var viewName = parameters[1] as string;

var level = doc.GetElement(new ElementId(levelId)) as Level;
if (level == null) return "Level not found";

using (Transaction t = new Transaction(doc, "Create Floor Plan"))
{
    t.Start();
    var viewPlan = ViewPlan.Create(doc, doc.GetDefaultElementTypeId(ElementTypeGroup.ViewTypeFloorPlan), level.Id);
    viewPlan.Name = viewName;
    t.Commit();
    return viewPlan.Id.IntegerValue;
}
"#,
    ),
];

/// Screens custom code against the deny-list.
#[derive(Debug)]
pub struct CodeScreen {
    patterns: Vec<Regex>,
}

impl CodeScreen {
    pub fn new() -> Result<Self> {
        let patterns = DANGEROUS_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::internal("invalid code screening pattern", e))?;
        Ok(Self { patterns })
    }

    /// Reject code that matches a dangerous pattern, hides characters
    /// behind escapes or is too long.
    pub fn check(&self, code: &str) -> Result<()> {
        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(code)) {
            let source = pattern.as_str().trim_start_matches("(?i)");
            return Err(rejected(format!("Code contains prohibited pattern: {source}")));
        }
        if ENCODED_ESCAPES.iter().any(|escape| code.contains(escape)) {
            return Err(rejected("Code contains encoded characters"));
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(rejected(format!(
                "Code exceeds maximum length of {MAX_CODE_LEN} characters"
            )));
        }
        Ok(())
    }
}

fn rejected(reason: impl std::fmt::Display) -> Error {
    Error::validation(format!("Code validation failed: {reason}"), Some("data.code"), None)
}

/// `send_code_to_revit_secure`.
#[derive(Debug)]
pub struct SecureCodeTool {
    screen: CodeScreen,
    params: Vec<ParamSpec>,
}

impl SecureCodeTool {
    pub fn new() -> Result<Self> {
        let mut templates: Vec<&'static str> = TEMPLATES.iter().map(|(name, _)| *name).collect();
        templates.push(CUSTOM);

        let data = ParamType::Object(vec![
            ParamSpec::new("template", ParamType::Enum(templates))
                .required()
                .describe("Choose a pre-approved template or 'custom' for validated custom code"),
            ParamSpec::new("code", ParamType::String).describe(
                "Custom C# code (only used when template='custom'). Must pass security validation.",
            ),
            ParamSpec::new("parameters", ParamType::array(ParamType::Any))
                .default(json!([]))
                .describe("Parameters to pass to the code"),
        ]);

        Ok(Self {
            screen: CodeScreen::new()?,
            params: vec![ParamSpec::new("data", data).required()],
        })
    }

    fn code_for(&self, template: &str, custom: Option<&str>) -> Result<String> {
        if template == CUSTOM {
            let code = custom.ok_or_else(|| {
                Error::validation(
                    "Custom code is required when template='custom'",
                    Some("data.code"),
                    None,
                )
            })?;
            self.screen.check(code)?;
            return Ok(code.to_string());
        }
        TEMPLATES
            .iter()
            .find(|(name, _)| *name == template)
            .map(|(_, code)| code.to_string())
            .ok_or_else(|| {
                Error::validation(
                    format!("Unknown template '{template}'"),
                    Some("data.template"),
                    Some(json!(template)),
                )
            })
    }
}

impl ToolHandler for SecureCodeTool {
    fn name(&self) -> &str {
        "send_code_to_revit_secure"
    }

    fn description(&self) -> &str {
        "Execute pre-approved code templates or validated custom code in Revit. \
         This is a secure version that validates all code before execution."
    }

    fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn requires_auth(&self) -> bool {
        true
    }

    fn prepare(&self, arguments: Map<String, Value>) -> Result<RemoteCall> {
        let validated = validate(&self.params, arguments)?;
        let data = validated.get("data").unwrap_or(&Value::Null);
        let template = data["template"].as_str().unwrap_or_default();
        let code = self.code_for(template, data["code"].as_str())?;

        let execution_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        info!(%execution_id, %timestamp, template, "code execution requested");

        Ok(RemoteCall {
            method: "send_code_to_revit_secure".to_string(),
            params: json!({
                "code": code,
                "parameters": data["parameters"],
                "executionId": execution_id,
                "timestamp": timestamp,
            }),
        })
    }

    fn render(&self, call: &RemoteCall, result: &Value) -> String {
        let execution_id = call.params["executionId"].as_str().unwrap_or_default();
        format!(
            "Code execution successful!\nExecution ID: {execution_id}\nResult: {}",
            pretty(result)
        )
    }
}
