//! 写入请求的结构校验
//!
//! 启动时从 JSON Schema 文档编译出校验器，之后每个请求复用。
//! 支持的关键字：type、required、properties、additionalProperties，
//! 以及属性级的 minimum / maximum / exclusiveMinimum / exclusiveMaximum /
//! minLength / maxLength / pattern / enum / const。
//! 文档中出现其他关键字或未知类型名时加载失败，不会静默放宽校验。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{NiftyError, Result};
use crate::models::{PriceField, PriceSubmission, SUBMISSION_DATE_FORMAT};

/// DD/MM/YYYY：年份必须是四位无符号数字
const SUBMISSION_DATE_PATTERN: &str = r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$";

const KNOWN_TYPES: [&str; 7] = ["object", "array", "string", "boolean", "null", "number", "integer"];

// 只影响文档说明、不参与校验的关键字
const ANNOTATION_KEYWORDS: [&str; 6] = ["$schema", "$id", "$comment", "title", "description", "examples"];

const ROOT_KEYWORDS: [&str; 4] = ["type", "required", "properties", "additionalProperties"];

const PROPERTY_KEYWORDS: [&str; 11] = [
    "type",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "enum",
    "const",
    "default",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    One(String),
    Many(Vec<String>),
}

impl TypeSpec {
    fn names(&self) -> Vec<&str> {
        match self {
            TypeSpec::One(name) => vec![name.as_str()],
            TypeSpec::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyDocument {
    #[serde(rename = "type")]
    type_spec: Option<TypeSpec>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    #[serde(rename = "enum")]
    enum_values: Option<Vec<Value>>,
    #[serde(rename = "const")]
    const_value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDocument {
    #[serde(rename = "type")]
    type_spec: Option<TypeSpec>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyDocument>,
    additional_properties: Option<bool>,
}

#[derive(Debug)]
struct PropertyRule {
    types: Vec<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    enum_values: Option<Vec<Value>>,
    const_value: Option<Value>,
}

/// 编译后的结构校验器
#[derive(Debug)]
pub struct SchemaValidator {
    root_types: Vec<String>,
    required: Vec<String>,
    properties: BTreeMap<String, PropertyRule>,
    allow_additional: bool,
    date_format: Regex,
}

impl SchemaValidator {
    /// 从 JSON 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取 schema 文件 {} 失败", path.display()))?;
        Self::from_json(&content).with_context(|| format!("解析 schema 文件 {} 失败", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw: Value = serde_json::from_str(content)?;
        check_keywords(&raw)?;
        let document: SchemaDocument = serde_json::from_value(raw)?;

        let mut properties = BTreeMap::new();
        for (name, prop) in document.properties {
            let pattern = match &prop.pattern {
                Some(p) => Some(
                    Regex::new(p).with_context(|| format!("属性 {} 的 pattern 无效", name))?,
                ),
                None => None,
            };
            let types = compile_types(prop.type_spec.as_ref())
                .with_context(|| format!("属性 {} 的 type 无效", name))?;
            properties.insert(
                name,
                PropertyRule {
                    types,
                    minimum: prop.minimum,
                    maximum: prop.maximum,
                    exclusive_minimum: prop.exclusive_minimum,
                    exclusive_maximum: prop.exclusive_maximum,
                    min_length: prop.min_length,
                    max_length: prop.max_length,
                    pattern,
                    enum_values: prop.enum_values,
                    const_value: prop.const_value,
                },
            );
        }

        Ok(Self {
            root_types: compile_types(document.type_spec.as_ref())?,
            required: document.required,
            properties,
            allow_additional: document.additional_properties.unwrap_or(true),
            date_format: Regex::new(SUBMISSION_DATE_PATTERN)?,
        })
    }

    /// 结构校验，返回第一个违规
    pub fn validate_schema(&self, candidate: &Value) -> Result<()> {
        if !self.root_types.is_empty() && !matches_any_type(candidate, &self.root_types) {
            return Err(NiftyError::SchemaViolation(format!(
                "{} is not of type {}",
                candidate,
                describe_types(&self.root_types)
            )));
        }

        let object = match candidate.as_object() {
            Some(object) => object,
            // 非对象文档没有字段可以继续检查
            None => return Ok(()),
        };

        for name in &self.required {
            if !object.contains_key(name) {
                return Err(NiftyError::SchemaViolation(format!(
                    "'{}' is a required property",
                    name
                )));
            }
        }

        for (name, rule) in &self.properties {
            if let Some(value) = object.get(name) {
                check_property(name, value, rule)?;
            }
        }

        if !self.allow_additional {
            if let Some(extra) = object.keys().find(|k| !self.properties.contains_key(*k)) {
                return Err(NiftyError::SchemaViolation(format!(
                    "Additional properties are not allowed ('{}' was unexpected)",
                    extra
                )));
            }
        }

        Ok(())
    }

    /// 结构校验 + 日期格式校验，一次完成并转换为强类型请求
    pub fn validate_submission(&self, candidate: &Value) -> Result<PriceSubmission> {
        self.validate_schema(candidate)?;
        let object = candidate.as_object().ok_or_else(|| {
            NiftyError::SchemaViolation(format!("{} is not of type 'object'", candidate))
        })?;

        let date = self.parse_submission_date(object)?;

        let symbol = match object.get("symbol").and_then(Value::as_str) {
            Some(symbol) => symbol.to_string(),
            None => {
                return Err(NiftyError::SchemaViolation(
                    "'symbol' is a required property".to_string(),
                ))
            }
        };

        Ok(PriceSubmission {
            symbol,
            date,
            open: read_price(object, PriceField::Open)?,
            high: read_price(object, PriceField::High)?,
            low: read_price(object, PriceField::Low)?,
            close: read_price(object, PriceField::Close)?,
        })
    }

    // chrono 的 %Y 接受符号和任意位数，先用正则限定形状
    fn parse_submission_date(&self, object: &Map<String, Value>) -> Result<NaiveDate> {
        object
            .get("date")
            .and_then(Value::as_str)
            .filter(|raw| self.date_format.is_match(raw))
            .and_then(|raw| NaiveDate::parse_from_str(raw, SUBMISSION_DATE_FORMAT).ok())
            .ok_or(NiftyError::InvalidDateFormat)
    }
}

fn check_keywords(raw: &Value) -> anyhow::Result<()> {
    let root = raw
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("schema 文档必须是 JSON 对象"))?;
    for key in root.keys() {
        if !ROOT_KEYWORDS.contains(&key.as_str()) && !ANNOTATION_KEYWORDS.contains(&key.as_str()) {
            anyhow::bail!("不支持的 schema 关键字 '{}'", key);
        }
    }

    if let Some(properties) = root.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            let prop = prop
                .as_object()
                .ok_or_else(|| anyhow::anyhow!("属性 {} 的定义必须是 JSON 对象", name))?;
            for key in prop.keys() {
                if !PROPERTY_KEYWORDS.contains(&key.as_str())
                    && !ANNOTATION_KEYWORDS.contains(&key.as_str())
                {
                    anyhow::bail!("属性 {} 使用了不支持的 schema 关键字 '{}'", name, key);
                }
            }
        }
    }
    Ok(())
}

fn compile_types(spec: Option<&TypeSpec>) -> anyhow::Result<Vec<String>> {
    let names = spec.map(TypeSpec::names).unwrap_or_default();
    if let Some(unknown) = names.iter().find(|n| !KNOWN_TYPES.contains(*n)) {
        anyhow::bail!("未知的类型名 '{}'", unknown);
    }
    Ok(names.into_iter().map(String::from).collect())
}

fn read_price(object: &Map<String, Value>, field: PriceField) -> Result<Option<f64>> {
    match object.get(field.name()) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            NiftyError::SchemaViolation(format!("{} is not of type 'number'", value))
        }),
    }
}

fn check_property(name: &str, value: &Value, rule: &PropertyRule) -> Result<()> {
    if !rule.types.is_empty() && !matches_any_type(value, &rule.types) {
        return Err(NiftyError::SchemaViolation(format!(
            "{} is not of type {} (property '{}')",
            value,
            describe_types(&rule.types),
            name
        )));
    }

    if let Some(allowed) = &rule.enum_values {
        if !allowed.contains(value) {
            return Err(violation(
                name,
                format!("{} is not one of {}", value, Value::Array(allowed.clone())),
            ));
        }
    }
    if let Some(expected) = &rule.const_value {
        if value != expected {
            return Err(violation(name, format!("{} was expected", expected)));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = rule.minimum {
            if number < min {
                return Err(violation(name, format!("{} is less than the minimum of {}", value, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if number > max {
                return Err(violation(name, format!("{} is greater than the maximum of {}", value, max)));
            }
        }
        if let Some(min) = rule.exclusive_minimum {
            if number <= min {
                return Err(violation(
                    name,
                    format!("{} is less than or equal to the minimum of {}", value, min),
                ));
            }
        }
        if let Some(max) = rule.exclusive_maximum {
            if number >= max {
                return Err(violation(
                    name,
                    format!("{} is greater than or equal to the maximum of {}", value, max),
                ));
            }
        }
    }

    if let Some(text) = value.as_str() {
        let length = text.chars().count();
        if let Some(min) = rule.min_length {
            if length < min {
                return Err(violation(name, format!("{} is too short", value)));
            }
        }
        if let Some(max) = rule.max_length {
            if length > max {
                return Err(violation(name, format!("{} is too long", value)));
            }
        }
        if let Some(pattern) = &rule.pattern {
            if !pattern.is_match(text) {
                return Err(violation(
                    name,
                    format!("{} does not match '{}'", value, pattern.as_str()),
                ));
            }
        }
    }

    Ok(())
}

fn violation(name: &str, detail: String) -> NiftyError {
    NiftyError::SchemaViolation(format!("{} (property '{}')", detail, name))
}

fn matches_any_type(value: &Value, types: &[String]) -> bool {
    types.iter().any(|t| matches_type(value, t))
}

fn matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().map_or(false, |n| n.fract() == 0.0)
        }
        // 加载时已拒绝未知类型
        _ => false,
    }
}

fn describe_types(types: &[String]) -> String {
    types
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ")
}
