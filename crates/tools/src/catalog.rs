//! Built-in CAD tools.

use std::fmt::Write as _;
use std::sync::Arc;

use fault::Result;
use serde_json::{Value, json};

use crate::handler::{Forward, RemoteTool, ToolHandler, pretty};
use crate::params::{ParamSpec, ParamType};
use crate::secure_code::SecureCodeTool;

/// Every built-in tool, in listing order.
pub fn builtin() -> Result<Vec<Arc<dyn ToolHandler>>> {
    Ok(vec![
        Arc::new(get_current_view_info()),
        Arc::new(get_current_view_elements()),
        Arc::new(get_selected_elements()),
        Arc::new(get_available_family_types()),
        Arc::new(delete_element()),
        Arc::new(operate_element()),
        Arc::new(color_elements()),
        Arc::new(create_point_based_element()),
        Arc::new(create_line_based_element()),
        Arc::new(create_surface_based_element()),
        Arc::new(ai_element_filter()),
        Arc::new(duplicate_floor_elements()),
        Arc::new(elevator_automation()),
        Arc::new(send_code_to_revit()),
        Arc::new(SecureCodeTool::new()?),
    ])
}

fn string_list() -> ParamType {
    ParamType::array(ParamType::String)
}

fn get_current_view_info() -> RemoteTool {
    RemoteTool::new(
        "get_current_view_info",
        "Get details of the active view in Revit, such as its type, name and scale.",
    )
}

fn get_current_view_elements() -> RemoteTool {
    RemoteTool::new(
        "get_current_view_elements",
        "Get elements from the current active view in Revit. You can filter by model categories \
         (like Walls, Floors) or annotation categories (like Dimensions, Text). Use includeHidden \
         to show/hide invisible elements and limit to control the number of returned elements.",
    )
    .param(
        ParamSpec::new("modelCategoryList", string_list())
            .default(json!([]))
            .describe("List of Revit model category names (e.g., 'OST_Walls', 'OST_Doors', 'OST_Floors')"),
    )
    .param(
        ParamSpec::new("annotationCategoryList", string_list())
            .default(json!([]))
            .describe("List of Revit annotation category names (e.g., 'OST_Dimensions', 'OST_TextNotes')"),
    )
    .param(
        ParamSpec::new("includeHidden", ParamType::Boolean)
            .default(json!(false))
            .describe("Whether to include hidden elements in the results"),
    )
    .param(
        ParamSpec::new("limit", ParamType::Integer)
            .default(json!(100))
            .describe("Maximum number of elements to return"),
    )
    .renderer(render_view_elements)
}

fn render_view_elements(result: &Value) -> String {
    match result.get("elements") {
        Some(elements) => format!(
            "Elements in current view: {}\n{}",
            elements.as_array().map_or(0, Vec::len),
            pretty(elements)
        ),
        None => pretty(result),
    }
}

fn get_selected_elements() -> RemoteTool {
    RemoteTool::new(
        "get_selected_elements",
        "Get elements currently selected in Revit. You can limit the number of returned elements.",
    )
    .param(
        ParamSpec::new("limit", ParamType::Integer)
            .default(json!(100))
            .describe("Maximum number of elements to return"),
    )
}

fn get_available_family_types() -> RemoteTool {
    RemoteTool::new(
        "get_available_family_types",
        "Get available family types in the current Revit project. You can filter by category \
         and family name, and limit the number of returned types.",
    )
    .param(
        ParamSpec::new("categoryList", string_list())
            .default(json!([]))
            .describe("List of Revit category names to filter by (e.g., 'OST_Walls', 'OST_Doors')"),
    )
    .param(
        ParamSpec::new("familyNameFilter", ParamType::String)
            .default(json!(""))
            .describe("Filter family types by family name (partial match)"),
    )
    .param(
        ParamSpec::new("limit", ParamType::Integer)
            .default(json!(100))
            .describe("Maximum number of family types to return"),
    )
}

fn delete_element() -> RemoteTool {
    RemoteTool::new(
        "delete_element",
        "Delete a specific element from the Revit model by its element ID.",
    )
    .param(
        ParamSpec::new("elementId", ParamType::String)
            .required()
            .describe("The ID of the element to delete"),
    )
}

fn operate_element() -> RemoteTool {
    let data = ParamType::Object(vec![
        ParamSpec::new("elementIds", ParamType::array(ParamType::Integer))
            .required()
            .describe("Array of Revit element IDs to perform the specified action on"),
        ParamSpec::new(
            "action",
            ParamType::Enum(vec![
                "Select",
                "SelectionBox",
                "SetColor",
                "SetTransparency",
                "Delete",
                "Hide",
                "TempHide",
                "Isolate",
                "Unhide",
                "ResetIsolate",
                "Highlight",
            ]),
        )
        .required()
        .describe("The operation to perform on the elements"),
        ParamSpec::new("transparencyValue", ParamType::Number)
            .default(json!(50))
            .describe("Transparency value (0-100) for SetTransparency action"),
        ParamSpec::new("colorValue", ParamType::array(ParamType::Integer))
            .default(json!([255, 0, 0]))
            .describe("RGB color values for SetColor action. Default is red [255,0,0]."),
    ]);

    RemoteTool::new(
        "operate_element",
        "Operate on Revit elements by performing actions such as select, selectionBox, setColor, \
         setTransparency, delete, hide, etc.",
    )
    .param(
        ParamSpec::new("data", data)
            .required()
            .describe("Parameters for operating on Revit elements with specific actions"),
    )
}

fn color_elements() -> RemoteTool {
    let rgb = ParamType::Object(vec![
        ParamSpec::new("r", ParamType::Integer).required(),
        ParamSpec::new("g", ParamType::Integer).required(),
        ParamSpec::new("b", ParamType::Integer).required(),
    ]);

    RemoteTool::new(
        "color_elements",
        "Color elements in the current view based on a category and parameter value. Each unique \
         parameter value gets assigned a distinct color.",
    )
    .method("color_splash")
    .param(
        ParamSpec::new("categoryName", ParamType::String)
            .required()
            .describe("The name of the Revit category to color (e.g., 'Walls', 'Doors', 'Rooms')"),
    )
    .param(
        ParamSpec::new("parameterName", ParamType::String)
            .required()
            .describe("The name of the parameter to use for grouping and coloring elements"),
    )
    .param(
        ParamSpec::new("useGradient", ParamType::Boolean)
            .default(json!(false))
            .describe("Whether to use a gradient color scheme instead of random colors"),
    )
    .param(
        ParamSpec::new("customColors", ParamType::array(rgb))
            .describe("Optional array of custom RGB colors to use for specific parameter values"),
    )
    .renderer(render_color_splash)
}

fn render_color_splash(result: &Value) -> String {
    if result["success"] != json!(true) {
        let reason = result["message"].as_str().unwrap_or("unknown reason");
        return format!("Color operation failed: {reason}");
    }

    let mut text = format!(
        "Successfully colored {} elements across {} groups.\n\nParameter Value Groups:\n",
        result["totalElements"], result["coloredGroups"]
    );
    for group in result["results"].as_array().into_iter().flatten() {
        let color = &group["color"];
        let _ = writeln!(
            text,
            "- {}: {} elements colored with RGB({}, {}, {})",
            group["parameterValue"], group["count"], color["r"], color["g"], color["b"]
        );
    }
    text
}

fn create_point_based_element() -> RemoteTool {
    RemoteTool::new(
        "create_point_based_element",
        "Create a point-based element in Revit such as doors, windows, or furniture. Requires a \
         family type ID, position coordinates, and optionally a host element ID for hosted \
         elements like doors and windows. All units are in millimeters (mm).",
    )
    .method("create_point_type_element")
    .param(
        ParamSpec::new("familyTypeId", ParamType::String)
            .required()
            .describe("The ID of the family type to create"),
    )
    .param(
        ParamSpec::new("position", ParamType::point())
            .required()
            .describe("The position coordinates where the element will be placed"),
    )
    .param(
        ParamSpec::new("hostId", ParamType::String)
            .describe("The ID of the host element (required for hosted elements like doors and windows)"),
    )
    .param(
        ParamSpec::new("rotation", ParamType::Number)
            .default(json!(0))
            .describe("Rotation angle in degrees (0-360)"),
    )
}

fn create_line_based_element() -> RemoteTool {
    RemoteTool::new(
        "create_line_based_element",
        "Create a line-based element in Revit such as walls, beams, or pipes. Requires a family \
         type ID, start and end points. All units are in millimeters (mm).",
    )
    .method("create_line_type_element")
    .param(
        ParamSpec::new("familyTypeId", ParamType::String)
            .required()
            .describe("The ID of the family type to create"),
    )
    .param(
        ParamSpec::new("startPoint", ParamType::point())
            .required()
            .describe("The start point coordinates of the line-based element"),
    )
    .param(
        ParamSpec::new("endPoint", ParamType::point())
            .required()
            .describe("The end point coordinates of the line-based element"),
    )
    .param(
        ParamSpec::new("structuralUsage", ParamType::Boolean)
            .default(json!(false))
            .describe("Whether the element is structural (for beams, columns, etc.)"),
    )
    .param(
        ParamSpec::new("width", ParamType::Number)
            .default(json!(0))
            .describe("Width/thickness of the element (e.g., wall thickness)"),
    )
    .param(
        ParamSpec::new("height", ParamType::Number)
            .default(json!(0))
            .describe("Height of the element (e.g., wall height)"),
    )
}

fn create_surface_based_element() -> RemoteTool {
    let boundary_point = ParamType::Object(vec![
        ParamSpec::new("x", ParamType::Number).required(),
        ParamSpec::new("y", ParamType::Number).required(),
        ParamSpec::new("z", ParamType::Number).default(json!(0)),
    ]);

    RemoteTool::new(
        "create_surface_based_element",
        "Create a surface-based element in Revit such as floors, ceilings, or roofs. Requires a \
         family type ID, boundary points, and a level ID. All units are in millimeters (mm).",
    )
    .method("create_surface_type_element")
    .param(
        ParamSpec::new("familyTypeId", ParamType::String)
            .required()
            .describe("The ID of the family type to create"),
    )
    .param(
        ParamSpec::new("boundaryPoints", ParamType::array_min(boundary_point, 3))
            .required()
            .describe("The boundary points defining the perimeter of the surface (minimum 3 points)"),
    )
    .param(
        ParamSpec::new("levelId", ParamType::String)
            .required()
            .describe("The ID of the level for the element"),
    )
    .param(
        ParamSpec::new("structural", ParamType::Boolean)
            .default(json!(false))
            .describe("Whether the element is structural (for structural floors)"),
    )
    .param(
        ParamSpec::new("slope", ParamType::Number)
            .default(json!(0))
            .describe("Slope angle in degrees (for sloped floors or roofs)"),
    )
    .param(
        ParamSpec::new("height", ParamType::Number)
            .default(json!(0))
            .describe("Height offset from the level"),
    )
}

fn bounding_box() -> ParamType {
    ParamType::Object(vec![
        ParamSpec::new("p0", ParamType::point()).required(),
        ParamSpec::new("p1", ParamType::point()).required(),
    ])
}

fn ai_element_filter() -> RemoteTool {
    let data = ParamType::Object(vec![
        ParamSpec::new("filterCategory", ParamType::String)
            .describe("Built-in category used for filtering (e.g., OST_Walls, OST_Floors, OST_GenericModel)"),
        ParamSpec::new("filterElementType", ParamType::String)
            .describe("Element type name used for filtering (e.g., 'Wall', 'Autodesk.Revit.DB.Wall')"),
        ParamSpec::new("filterFamilySymbolId", ParamType::Integer)
            .describe("ElementId of a FamilySymbol to filter by; -1 for no FamilySymbol filter"),
        ParamSpec::new("includeTypes", ParamType::Boolean)
            .default(json!(false))
            .describe("Whether to include element types in the results"),
        ParamSpec::new("includeInstances", ParamType::Boolean)
            .default(json!(true))
            .describe("Whether to include element instances in the results"),
        ParamSpec::new("filterVisibleInCurrentView", ParamType::Boolean)
            .describe("Only return instances visible in the current view"),
        ParamSpec::new("boundingBoxMin", bounding_box())
            .describe("Minimum corner (mm) of the spatial filter box"),
        ParamSpec::new("boundingBoxMax", bounding_box())
            .describe("Maximum corner (mm) of the spatial filter box"),
        ParamSpec::new("maxElements", ParamType::Integer)
            .describe("Maximum number of elements to return. Default is 50."),
    ]);

    RemoteTool::new(
        "ai_element_filter",
        "An intelligent Revit element querying tool designed for AI assistants to retrieve \
         detailed element information. Request elements matching criteria such as category, \
         type, visibility or spatial location, then analyse the returned data to answer \
         questions about the model.",
    )
    .param(
        ParamSpec::new("data", data)
            .required()
            .describe("Filter settings. All spatial coordinates are in millimeters."),
    )
}

fn duplicate_floor_elements() -> RemoteTool {
    let plan_point = ParamType::Object(vec![
        ParamSpec::new("x", ParamType::Number).required(),
        ParamSpec::new("y", ParamType::Number).required(),
    ]);
    let element_filter = ParamType::Object(vec![
        ParamSpec::new("categories", string_list())
            .describe("Categories to include (e.g., ['OST_Walls', 'OST_Doors']); all when omitted"),
        ParamSpec::new("excludeCategories", string_list())
            .describe("Categories to exclude from duplication"),
        ParamSpec::new(
            "boundingBox",
            ParamType::Object(vec![
                ParamSpec::new("min", plan_point.clone()).required(),
                ParamSpec::new("max", plan_point).required(),
            ]),
        )
        .describe("Plan-view box limiting duplication to an area"),
    ]);
    let options = ParamType::Object(vec![
        ParamSpec::new("updateHostedElements", ParamType::Boolean)
            .default(json!(true))
            .describe("Update hosted elements (doors, windows) to reference the new level"),
        ParamSpec::new("copyNonHostedOnly", ParamType::Boolean)
            .default(json!(false))
            .describe("Only copy elements that are not hosted (furniture, equipment)"),
        ParamSpec::new("includeAnnotations", ParamType::Boolean)
            .default(json!(false))
            .describe("Include annotations and dimensions in the duplication"),
        ParamSpec::new("groupBeforeCopy", ParamType::Boolean)
            .default(json!(false))
            .describe("Create a group before copying for easier management"),
    ]);
    let data = ParamType::Object(vec![
        ParamSpec::new("sourceLevelId", ParamType::Integer)
            .required()
            .describe("The ElementId of the source level to copy elements from"),
        ParamSpec::new("targetLevelIds", ParamType::array(ParamType::Integer))
            .required()
            .describe("ElementIds of the target levels to copy elements to"),
        ParamSpec::new("elementFilter", element_filter)
            .default(json!({}))
            .describe("Filters controlling which elements are duplicated"),
        ParamSpec::new("options", options)
            .default(json!({
                "updateHostedElements": true,
                "copyNonHostedOnly": false,
                "includeAnnotations": false,
                "groupBeforeCopy": false
            }))
            .describe("Additional options for the duplication process"),
    ]);

    RemoteTool::new(
        "duplicate_floor_elements",
        "Duplicate all elements from one floor to one or more other floors, keeping their \
         relative positions. Copies walls, doors, furniture, MEP elements and other components.",
    )
    .param(ParamSpec::new("data", data).required())
    .forward(Forward::Field("data"))
    .renderer(render_duplication)
}

fn render_duplication(result: &Value) -> String {
    let outcome = if result["success"] == json!(true) {
        "successful"
    } else {
        "failed"
    };
    let mut text = format!(
        "Floor duplication {outcome}!\nTotal elements duplicated: {}\n",
        result["duplicatedCount"].as_u64().unwrap_or(0)
    );
    for level in result["duplicatedElements"].as_array().into_iter().flatten() {
        let count = level["elementIds"].as_array().map_or(0, Vec::len);
        let _ = write!(text, "\nLevel {}: {count} elements", level["targetLevelId"]);
        if let Some(group) = level.get("groupId").filter(|g| !g.is_null()) {
            let _ = write!(text, " (group {group})");
        }
    }
    let errors: Vec<&str> = result["errors"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    if !errors.is_empty() {
        let _ = write!(text, "\n\nErrors:\n- {}", errors.join("\n- "));
    }
    text
}

fn plan_point() -> ParamType {
    ParamType::Object(vec![
        ParamSpec::new("x", ParamType::Number).required(),
        ParamSpec::new("y", ParamType::Number).required(),
    ])
}

fn plan_box() -> ParamType {
    ParamType::Object(vec![
        ParamSpec::new("min", plan_point()).required(),
        ParamSpec::new("max", plan_point()).required(),
    ])
}

fn elevator_automation() -> RemoteTool {
    let ids = || ParamType::array(ParamType::Integer);
    let shaft = ParamType::Object(vec![
        ParamSpec::new("location", plan_point())
            .required()
            .describe("Shaft center in mm"),
        ParamSpec::new(
            "dimensions",
            ParamType::Object(vec![
                ParamSpec::new("width", ParamType::Number).required().describe("Shaft width in mm"),
                ParamSpec::new("depth", ParamType::Number).required().describe("Shaft depth in mm"),
            ]),
        )
        .required(),
        ParamSpec::new("baseLevelId", ParamType::Integer)
            .required()
            .describe("ElementId of the base level"),
        ParamSpec::new("topLevelId", ParamType::Integer)
            .required()
            .describe("ElementId of the top level"),
        ParamSpec::new("wallThickness", ParamType::Number)
            .default(json!(200))
            .describe("Shaft wall thickness in mm"),
        ParamSpec::new("createPit", ParamType::Boolean)
            .default(json!(true))
            .describe("Create elevator pit"),
        ParamSpec::new("pitDepth", ParamType::Number)
            .default(json!(1500))
            .describe("Pit depth in mm below base level"),
    ]);
    let doors = ParamType::Object(vec![
        ParamSpec::new("shaftId", ParamType::Integer)
            .describe("ElementId of existing shaft to add doors to"),
        ParamSpec::new("doorTypeId", ParamType::Integer)
            .required()
            .describe("ElementId of door type to use"),
        ParamSpec::new("levelIds", ids())
            .required()
            .describe("ElementIds of levels where doors should be placed"),
        ParamSpec::new("openingSide", ParamType::Enum(vec!["front", "rear", "left", "right"]))
            .default(json!("front")),
        ParamSpec::new("offset", ParamType::Number)
            .default(json!(0))
            .describe("Offset from shaft center in mm"),
    ]);
    let duplication = ParamType::Object(vec![
        ParamSpec::new("sourceElementIds", ids())
            .required()
            .describe("ElementIds to duplicate"),
        ParamSpec::new("fromLevelId", ParamType::Integer)
            .required()
            .describe("Source level ElementId"),
        ParamSpec::new("toLevelIds", ids())
            .required()
            .describe("Target level ElementIds"),
        ParamSpec::new("includeOpenings", ParamType::Boolean)
            .default(json!(true))
            .describe("Include shaft openings in floors"),
        ParamSpec::new("adjustHosted", ParamType::Boolean)
            .default(json!(true))
            .describe("Adjust hosted elements to new levels"),
    ]);
    let machine_room = ParamType::Object(vec![
        ParamSpec::new("shaftLocation", plan_point()).required(),
        ParamSpec::new(
            "roomDimensions",
            ParamType::Object(vec![
                ParamSpec::new("width", ParamType::Number)
                    .required()
                    .describe("Machine room width in mm"),
                ParamSpec::new("depth", ParamType::Number)
                    .required()
                    .describe("Machine room depth in mm"),
                ParamSpec::new("height", ParamType::Number)
                    .default(json!(2500))
                    .describe("Machine room height in mm"),
            ]),
        )
        .required(),
        ParamSpec::new("topLevelId", ParamType::Integer)
            .required()
            .describe("ElementId of top level"),
        ParamSpec::new("includeEquipment", ParamType::Boolean)
            .default(json!(true))
            .describe("Place typical equipment"),
    ]);
    let analysis = ParamType::Object(vec![
        ParamSpec::new("boundingBox", plan_box()).describe("Area to search for elevators"),
        ParamSpec::new("searchRadius", ParamType::Number)
            .default(json!(5000))
            .describe("Search radius from center in mm"),
    ]);
    let opening = ParamType::Object(vec![
        ParamSpec::new("shaftBounds", plan_box()).required(),
        ParamSpec::new("levelIds", ids())
            .required()
            .describe("Level ElementIds where openings are needed"),
        ParamSpec::new("margin", ParamType::Number)
            .default(json!(50))
            .describe("Additional margin around shaft in mm"),
    ]);

    let data = ParamType::Object(vec![
        ParamSpec::new(
            "action",
            ParamType::Enum(vec![
                "create_shaft",
                "place_doors",
                "duplicate_to_floors",
                "create_machine_room",
                "analyze_existing",
                "create_opening",
            ]),
        )
        .required()
        .describe("The elevator automation action to perform"),
        ParamSpec::new("shaftParameters", shaft)
            .describe("Parameters for creating elevator shaft (required for 'create_shaft' action)"),
        ParamSpec::new("doorParameters", doors)
            .describe("Parameters for placing elevator doors (required for 'place_doors' action)"),
        ParamSpec::new("duplicationParameters", duplication)
            .describe("Parameters for duplicating elevator elements to other floors"),
        ParamSpec::new("machineRoomParameters", machine_room)
            .describe("Parameters for creating machine room above shaft"),
        ParamSpec::new("analysisParameters", analysis)
            .describe("Parameters for analyzing existing elevators in the model"),
        ParamSpec::new("openingParameters", opening)
            .describe("Parameters for creating floor openings for elevator shaft"),
    ]);

    RemoteTool::new(
        "elevator_automation",
        "Comprehensive elevator design automation tool for creating elevator shafts, doors, \
         equipment, and associated elements across multiple floors. Handles complete elevator \
         system creation including shaft walls, doors, equipment placement, and opening creation.",
    )
    .param(ParamSpec::new("data", data).required())
    .forward(Forward::Field("data"))
    .renderer(render_elevator)
}

fn count(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

/// The summary line depends on which action ran, recognised by the keys
/// of its result.
fn render_elevator(result: &Value) -> String {
    let mut text = String::from("Elevator automation completed successfully!\n\n");
    if let Some(walls) = result.get("shaftWallIds") {
        let _ = writeln!(text, "Created shaft with {} walls", count(walls));
        if let Some(pit) = result.get("pitId").filter(|p| !p.is_null()) {
            let _ = writeln!(text, "Pit created with ID: {pit}");
        }
    } else if let Some(doors) = result.get("placedDoorIds") {
        let _ = writeln!(text, "Placed {} doors", count(doors));
        let failed: Vec<String> = result["failedLevels"]
            .as_array()
            .into_iter()
            .flatten()
            .map(ToString::to_string)
            .collect();
        if !failed.is_empty() {
            let _ = writeln!(text, "Failed to place doors at levels: {}", failed.join(", "));
        }
    } else if let Some(by_level) = result.get("byLevel").and_then(Value::as_object) {
        let _ = writeln!(
            text,
            "Duplicated {} elements",
            result["duplicatedCount"].as_u64().unwrap_or(0)
        );
        for (level, ids) in by_level {
            let _ = writeln!(text, "- Level {level}: {} elements", count(ids));
        }
    } else if let Some(elevators) = result.get("elevators").and_then(Value::as_array) {
        let _ = writeln!(
            text,
            "Found {} elevators:",
            result["elevatorCount"].as_u64().unwrap_or(elevators.len() as u64)
        );
        for elevator in elevators {
            let _ = writeln!(
                text,
                "- ID: {}, Type: {}, Serves {} levels",
                elevator["id"],
                elevator["type"].as_str().unwrap_or("unknown"),
                count(&elevator["levels"])
            );
            let size = &elevator["dimensions"];
            let _ = writeln!(text, "  Dimensions: {}mm x {}mm", size["width"], size["depth"]);
        }
    } else if let Some(room) = result.get("roomId") {
        let _ = writeln!(text, "Created machine room ID: {room}");
        let _ = writeln!(text, "Walls created: {}", count(&result["wallIds"]));
        if let Some(equipment) = result.get("equipmentIds").filter(|e| !e.is_null()) {
            let _ = writeln!(text, "Equipment placed: {} items", count(equipment));
        }
    } else if let Some(openings) = result.get("openingIds") {
        let _ = writeln!(text, "Created {} openings", count(openings));
        let _ = writeln!(text, "Modified {} floors", count(&result["modifiedFloors"]));
    }
    let _ = write!(text, "\nDetailed response:\n{}", pretty(result));
    text
}

fn send_code_to_revit() -> RemoteTool {
    RemoteTool::new("send_code_to_revit", "Send code to Revit for execution")
        .method("sendCodeToRevit")
        .param(
            ParamSpec::new("code", ParamType::String)
                .required()
                .describe("The code to send to Revit"),
        )
        .param(
            ParamSpec::new("parameters", ParamType::array(ParamType::Any))
                .describe("Execution parameters (array of objects)"),
        )
        .renderer(render_code_result)
}

fn render_code_result(result: &Value) -> String {
    let shown = match result.get("result") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => pretty(other),
        None => pretty(result),
    };
    format!("Code executed successfully!\nResult: {shown}")
}
