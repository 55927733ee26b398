//! Толерантный JSON-парсер для `manifest.json` модов и `modpack.json`
//!
//! Авторы модов часто оставляют висячие запятые и блочные комментарии.
//! Перед разбором текст чинится:
//! 1. срезается BOM;
//! 2. удаляются комментарии `/* ... */`;
//! 3. удаляются запятые перед `}` / `]`.

use crate::error::{SyncError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

lazy_static! {
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").expect("valid regex");
    static ref TRAILING_COMMA: Regex = Regex::new(r",(\s*[}\]])").expect("valid regex");
}

/// Имя файла манифеста внутри папки мода
pub const MANIFEST_FILE: &str = "manifest.json";

/// Чинит типичные ошибки авторов, не трогая остальной текст
pub fn repair(raw: &str) -> String {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let text = BLOCK_COMMENT.replace_all(text, "");
    TRAILING_COMMA.replace_all(&text, "$1").into_owned()
}

/// Разбирает JSON после починки
pub fn parse(raw: &str) -> Result<Value> {
    let repaired = repair(raw);
    serde_json::from_str(&repaired).map_err(|e| SyncError::Parse(e.to_string()))
}

/// Разбирает манифест мода и приводит `Dependencies[*].UniqueId` к `UniqueID`
pub fn parse_manifest(raw: &str) -> Result<Value> {
    let mut value = parse(raw)?;
    normalize_dependency_keys(&mut value);
    Ok(value)
}

/// Читает и разбирает JSON-файл с диска
pub fn read_file(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    parse(&raw).map_err(|e| match e {
        SyncError::Parse(msg) => SyncError::Parse(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Читает манифест мода с диска
pub fn read_manifest(path: &Path) -> Result<Value> {
    let mut value = read_file(path)?;
    normalize_dependency_keys(&mut value);
    Ok(value)
}

fn normalize_dependency_keys(value: &mut Value) {
    let Some(deps) = value.get_mut("Dependencies").and_then(Value::as_array_mut) else {
        return;
    };

    for dep in deps.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(id) = dep.remove("UniqueId") {
            dep.insert("UniqueID".to_string(), id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trailing_commas_repaired() {
        let raw = r#"{"Name":"X","Dependencies":[{"UniqueId":"Y",},],}"#;
        let value = parse_manifest(raw).unwrap();
        assert_eq!(
            value,
            json!({"Name": "X", "Dependencies": [{"UniqueID": "Y"}]})
        );
    }

    #[test]
    fn test_block_comments_stripped() {
        let raw = r#"{
            /* legacy field,
               kept for old SMAPI */
            "Name": "Farm Expansion", /* inline */
            "Version": "3.3.1",
        }"#;
        let value = parse(raw).unwrap();
        assert_eq!(value["Name"], "Farm Expansion");
        assert_eq!(value["Version"], "3.3.1");
    }

    #[test]
    fn test_whitespace_before_closer() {
        let raw = "{\n  \"UpdateKeys\": [\n    \"Nexus:1\",\n  ]\n,\n}";
        let value = parse(raw).unwrap();
        assert_eq!(value["UpdateKeys"], json!(["Nexus:1"]));
    }

    #[test]
    fn test_bom_is_ignored() {
        let value = parse("\u{feff}{\"Name\": \"A\"}").unwrap();
        assert_eq!(value["Name"], "A");
    }

    #[test]
    fn test_still_invalid_is_parse_error() {
        let err = parse(r#"{"Name": "X" "Author": "Y"}"#).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_uppercase_key_kept() {
        let raw = r#"{"Dependencies": [{"UniqueID": "A", "IsRequired": false}]}"#;
        let value = parse_manifest(raw).unwrap();
        assert_eq!(value["Dependencies"][0]["UniqueID"], "A");
        assert_eq!(value["Dependencies"][0]["IsRequired"], false);
    }
}
