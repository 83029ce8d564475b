//! Per-type input extraction from the raw request text.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

use super::intent::{contains_any, mentions_platformer};
use crate::core::TaskType;
use crate::state::ProjectState;

pub const DEFAULT_SCENE_PATH: &str = "res://Main.tscn";
pub const DEFAULT_ROOT_TYPE: &str = "Node2D";
pub const DEFAULT_TILE_SIZE: u64 = 16;
pub const DEFAULT_ANIMATIONS: &[&str] = &["idle", "walk"];

/// Godot node types recognized by name, in canonical spelling.
const NODE_TYPES: &[&str] = &[
    "Node2D",
    "Node3D",
    "Node",
    "Control",
    "CharacterBody2D",
    "RigidBody2D",
    "StaticBody2D",
    "Area2D",
    "CollisionShape2D",
    "Sprite2D",
    "AnimatedSprite2D",
    "AnimationPlayer",
    "Camera2D",
    "TileMap",
    "TileMapLayer",
    "Timer",
    "Label",
    "Button",
    "AudioStreamPlayer",
    "Marker2D",
    "CanvasLayer",
];

const ANIMATIONS: &[&str] = &[
    "idle", "walk", "run", "jump", "fall", "attack", "hurt", "death", "crouch", "climb", "dash",
    "shoot",
];

const TILE_PRESETS: &[&str] = &[
    "grass", "forest", "cave", "dungeon", "snow", "desert", "lava", "water", "stone", "castle",
];

static SCENE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)((?:res://)?[\w/.-]+\.tscn)\b").unwrap());

static SCRIPT_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)((?:res://)?[\w/.-]+\.gd)\b").unwrap());

static SCENE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:scene|level)\s+(?:named|called)\s+[\x22']?([A-Za-z_]\w*)").unwrap()
});

static ROOT_NAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\broot(?:\s+(?:node|type))?\s+(?:of\s+|is\s+|as\s+)?(\w+)").unwrap()
});

static TYPED_SCENE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\w+)\s+scene\b").unwrap());

static NODE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:named|called)\s+[\x22']?([A-Za-z_]\w*)").unwrap());

static PARENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:under|beneath|inside|into|to|on)\s+(?:the\s+)?[\x22']?([A-Za-z_][\w/]*)")
        .unwrap()
});

static ADD_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\badd\s+(?:(?:an?|the)\s+)?(\w+)").unwrap());

static SCRIPT_SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\w+)\s+(?:script|controller)\b").unwrap());

static TILE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(8|16|24|32|48|64|128)\s*(?:x\s*\d+\s*)?(?:px|pixels?)?\s*tiles?\b|\btile\s*size\s*(?:of\s*)?(\d+)")
        .unwrap()
});

/// Canonical spelling of a node type mentioned by name.
pub fn canonical_node_type(word: &str) -> Option<&'static str> {
    NODE_TYPES
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case(word))
}

fn res_path(path: &str) -> String {
    if path.starts_with("res://") {
        path.to_string()
    } else {
        format!("res://{}", path.trim_start_matches('/'))
    }
}

fn scene_path(request: &str, state: &ProjectState) -> String {
    if let Some(caps) = SCENE_FILE_RE.captures(request) {
        return res_path(&caps[1]);
    }
    state
        .active_scene()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_SCENE_PATH.to_string())
}

fn new_scene_path(request: &str) -> String {
    if let Some(caps) = SCENE_FILE_RE.captures(request) {
        return res_path(&caps[1]);
    }
    match SCENE_NAME_RE.captures(request) {
        Some(caps) => format!("res://{}.tscn", &caps[1]),
        None => DEFAULT_SCENE_PATH.to_string(),
    }
}

/// "root node X" wins over "an X scene".
fn root_type(request: &str) -> &'static str {
    [&*ROOT_NAMED_RE, &*TYPED_SCENE_RE]
        .into_iter()
        .flat_map(|re| re.captures_iter(request))
        .find_map(|caps| canonical_node_type(&caps[1]))
        .unwrap_or(DEFAULT_ROOT_TYPE)
}

/// First recognized node type in word order.
fn mentioned_node_type(request: &str) -> Option<&'static str> {
    request
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .find_map(canonical_node_type)
}

fn node_type(request: &str) -> String {
    if let Some(t) = mentioned_node_type(request) {
        return t.to_string();
    }
    ADD_OBJECT_RE
        .captures(request)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| DEFAULT_ROOT_TYPE.to_string())
}

fn parent_path(request: &str) -> String {
    match PARENT_RE.captures(request) {
        Some(caps) => {
            let target = &caps[1];
            match target.to_lowercase().as_str() {
                "scene" | "root" | "main" => ".".to_string(),
                _ => target.to_string(),
            }
        }
        None => ".".to_string(),
    }
}

fn script_path(request: &str) -> String {
    if let Some(caps) = SCRIPT_FILE_RE.captures(request) {
        return res_path(&caps[1]);
    }
    let subject = SCRIPT_SUBJECT_RE
        .captures_iter(request)
        .map(|caps| caps[1].to_lowercase())
        .find(|w| !matches!(w.as_str(), "a" | "an" | "the" | "new" | "gdscript" | "this" | "my"));
    format!("res://scripts/{}.gd", subject.as_deref().unwrap_or("main"))
}

fn animations(normalized: &str) -> Vec<Value> {
    let mut found: Vec<&str> = ANIMATIONS
        .iter()
        .copied()
        .filter(|a| contains_any(normalized, &[*a]))
        .collect();
    if found.is_empty() {
        found = DEFAULT_ANIMATIONS.to_vec();
    }
    found.into_iter().map(Value::from).collect()
}

fn tile_size(normalized: &str) -> u64 {
    TILE_SIZE_RE
        .captures(normalized)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_TILE_SIZE)
}

fn tile_preset(normalized: &str) -> &'static str {
    TILE_PRESETS
        .iter()
        .copied()
        .find(|p| contains_any(normalized, &[*p]))
        .unwrap_or(if mentions_platformer(normalized) {
            "platform"
        } else {
            "terrain"
        })
}

/// Build the input payload for a task of `task_type`.
///
/// `request` is the raw text (case preserved for node and file names);
/// `normalized` is its normalized form.
pub fn extract_inputs(
    task_type: TaskType,
    request: &str,
    normalized: &str,
    state: &ProjectState,
) -> Map<String, Value> {
    let value = match task_type {
        TaskType::CreateScene => json!({
            "scenePath": new_scene_path(request),
            "rootType": root_type(request),
        }),
        TaskType::AddNode => {
            let node_type = node_type(request);
            let node_name = NODE_NAME_RE
                .captures(request)
                .map(|caps| caps[1].to_string())
                .unwrap_or_else(|| node_type.clone());
            json!({
                "nodeType": node_type,
                "nodeName": node_name,
                "parentPath": parent_path(request),
                "scenePath": scene_path(request, state),
            })
        }
        TaskType::CreateScript => json!({
            "scriptPath": script_path(request),
            "prompt": request,
        }),
        TaskType::AttachScript => json!({
            "scriptPath": script_path(request),
            "nodePath": parent_path(request),
            "scenePath": scene_path(request, state),
        }),
        TaskType::GenerateCharacter => json!({
            "prompt": request,
            "animations": animations(normalized),
        }),
        TaskType::GenerateTileset => json!({
            "prompt": request,
            "tileSize": tile_size(normalized),
            "preset": tile_preset(normalized),
        }),
        TaskType::IntegrateAsset => json!({
            "prompt": request,
            "scenePath": scene_path(request, state),
        }),
        TaskType::ValidateProject | TaskType::Custom => json!({ "prompt": request }),
    };

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
