use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::types::ScalarType;

/// Scalar type catalog: declared type names that classify as scalars.
/// Names not in this catalog must name a class known to the source.
pub static SCALAR_CATALOG: LazyLock<HashMap<&'static str, ScalarType>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    // Text
    m.insert("string", ScalarType::String);
    m.insert("text", ScalarType::Text);
    m.insert("char", ScalarType::Char);
    // Numbers
    m.insert("short", ScalarType::Short);
    m.insert("integer", ScalarType::Integer);
    m.insert("int", ScalarType::Integer);
    m.insert("long", ScalarType::Long);
    m.insert("decimal", ScalarType::Decimal);
    m.insert("money", ScalarType::Decimal);
    m.insert("float", ScalarType::Float);
    m.insert("double", ScalarType::Double);
    // Other
    m.insert("boolean", ScalarType::Boolean);
    m.insert("bool", ScalarType::Boolean);
    m.insert("date", ScalarType::Date);
    m.insert("time", ScalarType::Time);
    m.insert("datetime", ScalarType::DateTime);
    m.insert("timestamp", ScalarType::DateTime);
    m.insert("uuid", ScalarType::Uuid);
    // Large objects
    m.insert("binary", ScalarType::Binary);
    m.insert("bytes", ScalarType::Binary);
    m
});

/// Wrapper names accepted for collection types (`list<T>`, `set<T>`).
pub static COLLECTION_WRAPPERS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    let mut s = HashSet::new();
    s.insert("list");
    s.insert("set");
    s.insert("vec");
    s
});

/// Look up a scalar type name (case-insensitive).
pub fn scalar_type(name: &str) -> Option<ScalarType> {
    SCALAR_CATALOG
        .get(name.to_ascii_lowercase().as_str())
        .copied()
}

/// Engine version reported in exported snapshots.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Version of the exported snapshot layout.
pub const SNAPSHOT_VERSION: &str = "1.0";
