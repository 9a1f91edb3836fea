//! Field and type naming rules.

/// Field name used when sanitization leaves nothing.
pub const EMPTY_NAME: &str = "_empty";

/// Preferred name of the field exposing a branch node's own value.
pub const VALUE_FIELD: &str = "_value";

/// Names the projector must never hand to a generated object type.
pub(crate) const RESERVED_TYPE_NAMES: &[&str] = &[
    "Query",
    "TopicResult",
    "String",
    "Float",
    "Int",
    "Boolean",
    "ID",
    "JSON",
];

/// Turns a raw path segment into a valid field name.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, a leading digit gets
/// a `_` prefix and an empty result becomes [`EMPTY_NAME`].
///
/// ```
/// use topicgraph::schema::sanitize;
///
/// assert_eq!(sanitize("living-room"), "living_room");
/// assert_eq!(sanitize("1st"), "_1st");
/// assert_eq!(sanitize(""), "_empty");
/// ```
#[must_use]
pub fn sanitize(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out.is_empty() {
        out.push_str(EMPTY_NAME);
    }
    out
}

/// Prefixes `base` with underscores until `taken` rejects it no more.
pub(crate) fn free_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut name = base.to_string();
    while taken(&name) {
        name.insert(0, '_');
    }
    name
}
