//! Keyword detection of the task types a request asks for.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::core::TaskType;

/// Keywords per task type. Plain identifiers match whole words; anything
/// with a space or punctuation matches as a substring.
const KEYWORDS: &[(TaskType, &[&str])] = &[
    (TaskType::CreateScene, &["scene", "level", "world", "new scene"]),
    (
        TaskType::CreateScript,
        &[
            "script",
            "gdscript",
            "code",
            "logic",
            "behavior",
            "behaviour",
            "movement",
            "controller",
        ],
    ),
    (TaskType::AttachScript, &["attach", "attach script"]),
    (
        TaskType::GenerateCharacter,
        &[
            "character",
            "sprite",
            "hero",
            "enemy",
            "npc",
            "animation",
            "animations",
        ],
    ),
    (
        TaskType::GenerateTileset,
        &["tileset", "tile set", "tiles", "tilemap", "terrain"],
    ),
    (
        TaskType::AddNode,
        &[
            "node",
            "camera2d",
            "camera",
            "area2d",
            "collisionshape2d",
            "sprite2d",
            "animatedsprite2d",
            "characterbody2d",
            "rigidbody2d",
            "staticbody2d",
            "timer",
            "label",
            "button",
        ],
    ),
    (
        TaskType::IntegrateAsset,
        &["integrate", "import", "assemble", "wire up", "hook up"],
    ),
    (
        TaskType::ValidateProject,
        &["validate", "verify", "playtest", "run the game", "test the game"],
    ),
];

static CHARACTER_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(generate|create|make|design|draw|animate)\b.{0,40}\b(characters?|sprites?|heroe?s?|enemy|enemies|npcs?|animations?|spritesheets?)\b",
    )
    .unwrap()
});

static SCENE_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(create|make|build|new|add)\s+(?:(?:an?|the)\s+)?(?:[a-z0-9_]+\s+)?(scene|level)s?\b")
        .unwrap()
});

static CREATION_VERB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(create|make|build|generate|design|start)\b").unwrap());

static GAME_NOUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(game|project|rpg|metroidvania|roguelike|shooter)\b").unwrap()
});

/// Matches "platformer" and its common misspellings.
static PLATFORMER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpla?t+(?:f|ph)o?r?m+(?:e|a)?r?s?\b").unwrap());

/// Lowercase, trim, and collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn words(text: &str) -> HashSet<&str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_plain(keyword: &str) -> bool {
    keyword.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whole-word test for identifiers, substring test otherwise.
pub fn contains_keyword(text: &str, words: &HashSet<&str>, keyword: &str) -> bool {
    if is_plain(keyword) {
        words.contains(keyword)
    } else {
        text.contains(keyword)
    }
}

/// Whether `text` (already normalized) contains any of `keywords`.
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let words = words(text);
    keywords.iter().any(|k| contains_keyword(text, &words, k))
}

pub fn mentions_platformer(normalized: &str) -> bool {
    PLATFORMER_RE.is_match(normalized)
}

/// Creation verb plus a whole-game noun (or a platformer mention).
pub fn is_game_bundle(normalized: &str) -> bool {
    CREATION_VERB_RE.is_match(normalized)
        && (GAME_NOUN_RE.is_match(normalized) || mentions_platformer(normalized))
}

fn has_scene_intent(normalized: &str) -> bool {
    normalized.contains("new scene") || SCENE_INTENT_RE.is_match(normalized)
}

/// Detect the task types a normalized request asks for, in plan order.
///
/// Never returns an empty list: a request matching nothing becomes `Custom`.
pub fn detect_task_types(normalized: &str) -> Vec<TaskType> {
    let words = words(normalized);

    let mut detected: Vec<TaskType> = KEYWORDS
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| contains_keyword(normalized, &words, k))
        })
        .map(|(task_type, _)| *task_type)
        .collect();

    // "sprite" alone is usually a node or an existing asset, not new art.
    if !CHARACTER_INTENT_RE.is_match(normalized) {
        detected.retain(|t| *t != TaskType::GenerateCharacter);
    }

    // Writing a script for a scene does not mean building the scene.
    let script_only = detected.iter().any(TaskType::is_script)
        && detected
            .iter()
            .all(|t| t.is_script() || *t == TaskType::CreateScene);
    if script_only && !has_scene_intent(normalized) {
        detected.retain(|t| *t != TaskType::CreateScene);
    }

    let mut types = Vec::new();
    if is_game_bundle(normalized) {
        types.push(TaskType::CreateScene);
        types.push(TaskType::GenerateCharacter);
        if mentions_platformer(normalized) {
            types.push(TaskType::GenerateTileset);
        }
        types.push(TaskType::IntegrateAsset);
    }
    types.extend(detected);

    let mut seen = HashSet::new();
    types.retain(|t| seen.insert(*t));

    if types.is_empty() {
        types.push(TaskType::Custom);
    }
    types
}
