//! Accessors for the `name value...` child-node convention.
//!
//! Scalar settings are written as child nodes whose first argument is the
//! value, e.g. `port 443` inside a `site { ... }` block.

use kdl::{KdlNode, KdlValue};

/// Child nodes of `node`, or an empty slice.
pub fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|doc| doc.nodes()).unwrap_or(&[])
}

/// First child node named `name`.
pub fn child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    children(node).iter().find(|c| c.name().value() == name)
}

/// Positional (unnamed) arguments of a node.
pub fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// First positional argument as a string.
pub fn get_first_arg_string(node: &KdlNode) -> Option<String> {
    args(node).next().and_then(|v| v.as_string()).map(str::to_string)
}

/// All positional string arguments of a node.
pub fn arg_strings(node: &KdlNode) -> Vec<String> {
    args(node)
        .filter_map(|v| v.as_string())
        .map(str::to_string)
        .collect()
}

/// `name "value"` child as a string.
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    child(node, name).and_then(get_first_arg_string)
}

/// `name 42` child as an integer.
pub fn get_int_entry(node: &KdlNode, name: &str) -> Option<i128> {
    child(node, name)
        .and_then(|c| args(c).next())
        .and_then(|v| v.as_integer())
}

/// `name #true` child as a boolean.
pub fn get_bool_entry(node: &KdlNode, name: &str) -> Option<bool> {
    child(node, name)
        .and_then(|c| args(c).next())
        .and_then(|v| v.as_bool())
}

/// `name "a" "b"` child as a list; repeated children are concatenated.
pub fn get_string_list(node: &KdlNode, name: &str) -> Vec<String> {
    children(node)
        .iter()
        .filter(|c| c.name().value() == name)
        .flat_map(arg_strings)
        .collect()
}

/// Integer entry narrowed to `T`, with a readable error on overflow.
pub fn get_bounded_int<T: TryFrom<i128>>(
    node: &KdlNode,
    name: &str,
) -> anyhow::Result<Option<T>> {
    match get_int_entry(node, name) {
        None => Ok(None),
        Some(v) => T::try_from(v)
            .map(Some)
            .map_err(|_| anyhow::anyhow!("'{}' value {} is out of range", name, v)),
    }
}
