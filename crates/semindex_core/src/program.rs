//! Field programs.
//!
//! A field program defines both the schema of an index core and how entities
//! are turned into documents. One definition per `;`:
//!
//! ```text
//! # comment
//! title   = dc:title :: text ;
//! author  = dc:creator | foaf:maker :: string ;
//! year    = dc:date :: int [stored="true", indexed="false"] ;
//! ```
//!
//! Each definition reads the values of its paths (entity property names) in
//! order and converts them to the field type. Two programs with the same
//! normalized definitions have the same fingerprint, so formatting and
//! comment edits never trigger a reindex.

use crate::error::{IndexError, IndexResult};
use crate::types::{Document, Entity, FieldValue};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Reserved field holding the document id.
pub const ID_FIELD: &str = "id";
/// Reserved field holding the plain text content.
pub const CONTENT_FIELD: &str = "content";

/// MIME types whose content is indexed into [`CONTENT_FIELD`].
pub const SUPPORTED_MIME_TYPES: &[&str] = &["text/html", "text/plain", "text/xml"];

/// Field options a definition may set.
const FIELD_OPTIONS: &[&str] = &["stored", "indexed", "multiValued", "omitNorms"];

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Untokenized string.
    String,
    /// Tokenized text.
    Text,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Boolean.
    Bool,
}

impl FieldType {
    /// Returns the program keyword of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Bool => "bool",
        }
    }

    /// Returns true if values of this type are tokenized for search.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text)
    }

    /// Converts a raw property value.
    pub fn convert(&self, raw: &str) -> Result<FieldValue, String> {
        match self {
            FieldType::String | FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Int => raw
                .trim()
                .parse::<i32>()
                .map(|v| FieldValue::Integer(i64::from(v)))
                .map_err(|e| format!("{raw:?} is not an int: {e}")),
            FieldType::Long => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|e| format!("{raw:?} is not a long: {e}")),
            FieldType::Float | FieldType::Double => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| format!("{raw:?} is not a number: {e}")),
            FieldType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FieldValue::Boolean(true)),
                "false" | "0" => Ok(FieldValue::Boolean(false)),
                _ => Err(format!("{raw:?} is not a bool")),
            },
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "int" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "bool" | "boolean" => Ok(FieldType::Bool),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema entry of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Value type.
    pub field_type: FieldType,
    /// Field options (`stored`, `indexed`, `multiValued`, `omitNorms`).
    pub properties: BTreeMap<String, String>,
}

impl FieldSpec {
    fn new(name: &str, field_type: FieldType, multi_valued: bool) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("stored".to_string(), "true".to_string());
        properties.insert("indexed".to_string(), "true".to_string());
        properties.insert("multiValued".to_string(), multi_valued.to_string());
        Self {
            name: name.to_string(),
            field_type,
            properties,
        }
    }

    /// Returns true if the field is searchable.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.properties.get("indexed").map(String::as_str) != Some("false")
    }

    /// Returns true if the field values are kept in the document.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.properties.get("stored").map(String::as_str) != Some("false")
    }
}

/// Schema of a search core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreSchema {
    /// Field entries, reserved fields first.
    pub fields: Vec<FieldSpec>,
}

impl CoreSchema {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns all field names in schema order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldDefinition {
    name: String,
    paths: Vec<String>,
    field_type: FieldType,
    options: BTreeMap<String, String>,
}

/// A parsed field program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProgram {
    definitions: Vec<FieldDefinition>,
}

impl FieldProgram {
    /// Parses program text.
    pub fn parse(text: &str) -> IndexResult<Self> {
        let stripped: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");

        let mut statements: Vec<&str> = stripped.split(';').collect();
        // Text after the last ';' must be blank.
        let trailing = statements.pop().unwrap_or_default();

        let mut definitions = Vec::new();
        let mut seen = HashSet::new();
        for (index, statement) in statements.iter().enumerate() {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            let definition = parse_definition(statement)
                .map_err(|message| program_error(index + 1, message))?;
            if definition.name == ID_FIELD || definition.name == CONTENT_FIELD {
                return Err(program_error(
                    index + 1,
                    format!("field name {} is reserved", definition.name),
                ));
            }
            if !seen.insert(definition.name.clone()) {
                return Err(program_error(
                    index + 1,
                    format!("duplicate field {}", definition.name),
                ));
            }
            definitions.push(definition);
        }

        if !trailing.trim().is_empty() {
            return Err(program_error(
                statements.len() + 1,
                "definition is not terminated by ';'",
            ));
        }
        if definitions.is_empty() {
            return Err(program_error(1, "program defines no fields"));
        }

        Ok(Self { definitions })
    }

    /// Returns the number of field definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if the program defines no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Renders the definitions in canonical form.
    #[must_use]
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        for def in &self.definitions {
            let _ = write!(out, "{} = {} :: {}", def.name, def.paths.join(" | "), def.field_type);
            if !def.options.is_empty() {
                let options: Vec<String> = def
                    .options
                    .iter()
                    .map(|(k, v)| format!("{k}=\"{v}\""))
                    .collect();
                let _ = write!(out, " [{}]", options.join(", "));
            }
            out.push_str(" ;\n");
        }
        out
    }

    /// Returns the SHA-256 hex digest of the normalized program.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.normalized().as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut hex, b| {
            let _ = write!(hex, "{b:02x}");
            hex
        })
    }

    /// Builds the core schema: reserved fields, then one entry per definition.
    #[must_use]
    pub fn schema(&self) -> CoreSchema {
        let mut fields = vec![
            FieldSpec::new(ID_FIELD, FieldType::String, false),
            FieldSpec::new(CONTENT_FIELD, FieldType::Text, false),
        ];
        for def in &self.definitions {
            let mut spec = FieldSpec::new(&def.name, def.field_type, true);
            spec.properties
                .extend(def.options.iter().map(|(k, v)| (k.clone(), v.clone())));
            fields.push(spec);
        }
        CoreSchema { fields }
    }

    /// Turns an entity into a document.
    ///
    /// Fails on the first value that does not convert to its field type.
    pub fn extract(&self, entity: &Entity, index_content: bool) -> IndexResult<Document> {
        let mut doc = Document::new(entity.id.clone());
        for def in &self.definitions {
            for path in &def.paths {
                let Some(values) = entity.properties.get(path) else {
                    continue;
                };
                for raw in values {
                    let value =
                        def.field_type
                            .convert(raw)
                            .map_err(|message| IndexError::Extraction {
                                id: entity.id.clone(),
                                field: def.name.clone(),
                                message,
                            })?;
                    doc.add_field(def.name.clone(), value);
                }
            }
        }

        if index_content && SUPPORTED_MIME_TYPES.contains(&entity.mime_type.as_str()) {
            if let Some(content) = &entity.content {
                doc.add_field(CONTENT_FIELD, FieldValue::Text(content.clone()));
            }
        }
        Ok(doc)
    }
}

fn program_error(definition: usize, message: impl Into<String>) -> IndexError {
    IndexError::Program {
        definition,
        message: message.into(),
    }
}

fn parse_definition(statement: &str) -> Result<FieldDefinition, String> {
    let (name, rest) = statement
        .split_once('=')
        .ok_or_else(|| format!("expected '<field> = <path> :: <type>' in {statement:?}"))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(format!("invalid field name {name:?}"));
    }

    let (paths, typed) = rest
        .split_once("::")
        .ok_or_else(|| format!("field {name} has no '::' type"))?;
    let paths: Vec<String> = paths.split('|').map(|p| p.trim().to_string()).collect();
    if paths
        .iter()
        .any(|p| p.is_empty() || p.chars().any(char::is_whitespace))
    {
        return Err(format!("field {name} has an invalid path"));
    }

    let typed = typed.trim();
    let (type_name, options) = match typed.split_once('[') {
        Some((type_name, options)) => {
            let options = options
                .trim_end()
                .strip_suffix(']')
                .ok_or_else(|| format!("field {name} has unterminated options"))?;
            (type_name.trim(), parse_options(name, options)?)
        }
        None => (typed, BTreeMap::new()),
    };
    let field_type = type_name.parse::<FieldType>()?;

    Ok(FieldDefinition {
        name: name.to_string(),
        paths,
        field_type,
        options,
    })
}

fn parse_options(field: &str, options: &str) -> Result<BTreeMap<String, String>, String> {
    let mut parsed = BTreeMap::new();
    for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| format!("field {field}: option {option:?} has no value"))?;
        let key = key.trim();
        if !FIELD_OPTIONS.contains(&key) {
            return Err(format!("field {field}: unsupported option {key}"));
        }
        let value = value.trim().trim_matches('"');
        if value != "true" && value != "false" {
            return Err(format!("field {field}: option {key} must be true or false"));
        }
        parsed.insert(key.to_string(), value.to_string());
    }
    Ok(parsed)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
