//! Configuration document loading.
//!
//! The document format is a boundary concern: everything quirky about the
//! wire encoding stays in this file. In particular, tables carrying the
//! sequence sentinel key are decoded into ordered sequences here; the engine
//! itself only ever sees the tagged [`Value`] variants.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use unitkit::{ConfigurationUnit, Intent, Value, ValueMap};

/// Sentinel key marking "treat this table as an ordered sequence", for wire
/// formats that cannot express sequences directly. The remaining keys must
/// be non-negative integers giving the element order.
pub const SEQUENCE_SENTINEL: &str = "treatAsSequence";

/// Document schema versions this build understands.
const SUPPORTED_SCHEMAS: &[&str] = &["1.0"];

/// A loaded configuration document.
pub struct Document {
    /// The units, in authored order.
    pub units: Vec<ConfigurationUnit>,
    /// Configuration root: the directory the document was loaded from, used
    /// to expand the `${ConfigRoot}` placeholder.
    pub base_path: Option<PathBuf>,
    /// Where the document came from.
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    schema: Option<String>,
    #[serde(default, rename = "unit")]
    units: Vec<RawUnit>,
}

#[derive(Deserialize)]
struct RawUnit {
    resource: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    settings: toml::Table,
    #[serde(default)]
    directives: toml::Table,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl Document {
    /// Load a document from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let raw: RawDocument = toml::from_str(&text)
            .with_context(|| format!("invalid configuration document {}", path.display()))?;

        if let Some(schema) = &raw.schema
            && !SUPPORTED_SCHEMAS.contains(&schema.as_str())
        {
            bail!("unsupported document schema '{schema}'");
        }

        let base_path = fs::canonicalize(path)
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));

        let units = raw
            .units
            .into_iter()
            .map(RawUnit::into_unit)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            units,
            base_path,
            path: path.to_path_buf(),
        })
    }
}

impl RawUnit {
    fn into_unit(self) -> Result<ConfigurationUnit> {
        let intent = match self.intent.as_deref() {
            None => Intent::default(),
            Some(text) => parse_intent(text)
                .with_context(|| format!("unit '{}': invalid intent", self.resource))?,
        };

        Ok(ConfigurationUnit {
            resource: self.resource,
            instance_id: self.id.unwrap_or_default(),
            intent,
            settings: table_to_map(&self.settings)?,
            directives: table_to_map(&self.directives)?,
            depends_on: self.depends_on,
        })
    }
}

fn parse_intent(text: &str) -> Result<Intent> {
    match text.to_lowercase().as_str() {
        "inform" => Ok(Intent::Inform),
        "assert" => Ok(Intent::Assert),
        "apply" => Ok(Intent::Apply),
        other => bail!("'{other}' is not one of inform, assert, apply"),
    }
}

fn table_to_map(table: &toml::Table) -> Result<ValueMap> {
    table
        .iter()
        .map(|(k, v)| Ok((k.clone(), value_from_toml(v)?)))
        .collect::<Result<Vec<_>>>()
        .map(ValueMap::from_iter)
}

fn value_from_toml(value: &toml::Value) -> Result<Value> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(Value::Integer(*i)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::Array(items) => items
            .iter()
            .map(value_from_toml)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        toml::Value::Table(table) => {
            if is_sequence_sentinel(table) {
                decode_sentinel_sequence(table)
            } else {
                table_to_map(table).map(Value::Map)
            }
        }
        other => bail!("unsupported setting value: {other}"),
    }
}

fn is_sequence_sentinel(table: &toml::Table) -> bool {
    table
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case(SEQUENCE_SENTINEL) && v.as_bool() == Some(true))
}

/// Decode a sentinel-keyed table into a sequence: every non-sentinel key is
/// an element index.
fn decode_sentinel_sequence(table: &toml::Table) -> Result<Value> {
    let mut indexed = Vec::new();
    for (key, value) in table {
        if key.eq_ignore_ascii_case(SEQUENCE_SENTINEL) {
            continue;
        }
        let index: usize = key
            .parse()
            .with_context(|| format!("sequence element key '{key}' is not an index"))?;
        indexed.push((index, value_from_toml(value)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(Value::Sequence(indexed.into_iter().map(|(_, v)| v).collect()))
}

/// Encode a sequence into the sentinel-keyed map form. The inverse of
/// [`decode_sentinel_sequence`], kept here so the encoding never leaks past
/// this adapter.
pub fn encode_sentinel_sequence(items: &[Value]) -> ValueMap {
    let mut map = ValueMap::new();
    map.insert(SEQUENCE_SENTINEL, true);
    for (index, item) in items.iter().enumerate() {
        map.insert(index.to_string(), item.clone());
    }
    map
}
