//! Shared primitives for the element resolution and readiness crates.
//!
//! Everything here is plain data: the selector value model, the
//! per-element-kind capability descriptors consulted during selector
//! normalization, the engine configuration, and the opaque node handle.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use uuid::Uuid;

/// Opaque reference to a located node in the remote document.
///
/// Handles are minted by the driver backend and owned by the element
/// that located them; a handle says nothing about whether the node is
/// still attached.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine configuration, passed explicitly into the locator and wait
/// engine constructors. There is no process-wide state.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Budget for one outermost wait. Zero means "probe exactly once,
    /// no polling".
    pub default_timeout: Duration,

    /// Sleep between readiness probes inside a wait.
    pub poll_interval: Duration,

    /// When set, "not found yet" is polled on instead of raised
    /// immediately.
    pub relaxed_locate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            relaxed_locate: true,
        }
    }
}

impl EngineConfig {
    /// Override the wait budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable relaxed locating.
    pub fn with_relaxed_locate(mut self, relaxed: bool) -> Self {
        self.relaxed_locate = relaxed;
        self
    }
}

/// One selector value.
///
/// The original engine distinguished these duck-typed at runtime; here
/// they are a sum type matched exhaustively by the selector engine.
#[derive(Clone, Debug)]
pub enum SelectorValue {
    /// Exact string comparison (token comparison for `class`).
    Literal(String),

    /// Regular expression, search semantics. Never expressible in a
    /// structural query; forces the scan-and-filter path.
    Pattern(Regex),

    /// Attribute presence (`true`) or absence (`false`).
    Presence(bool),

    /// Position in the candidate list; negative counts from the end.
    /// Only legal under the `index` key.
    Index(i64),

    /// Multi-valued attribute. Entries may carry a leading `!` for
    /// class-token negation.
    Many(Vec<SelectorValue>),
}

impl SelectorValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            SelectorValue::Literal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            SelectorValue::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_presence(&self) -> Option<bool> {
        match self {
            SelectorValue::Presence(b) => Some(*b),
            _ => None,
        }
    }

    /// True when this value, or any entry of a list value, is a
    /// regular expression.
    pub fn has_pattern(&self) -> bool {
        match self {
            SelectorValue::Pattern(_) => true,
            SelectorValue::Many(entries) => entries.iter().any(SelectorValue::has_pattern),
            _ => false,
        }
    }
}

impl PartialEq for SelectorValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SelectorValue::Literal(a), SelectorValue::Literal(b)) => a == b,
            (SelectorValue::Pattern(a), SelectorValue::Pattern(b)) => a.as_str() == b.as_str(),
            (SelectorValue::Presence(a), SelectorValue::Presence(b)) => a == b,
            (SelectorValue::Index(a), SelectorValue::Index(b)) => a == b,
            (SelectorValue::Many(a), SelectorValue::Many(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SelectorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorValue::Literal(s) => write!(f, "{s:?}"),
            SelectorValue::Pattern(re) => write!(f, "/{}/", re.as_str()),
            SelectorValue::Presence(b) => write!(f, "{b}"),
            SelectorValue::Index(i) => write!(f, "{i}"),
            SelectorValue::Many(entries) => {
                f.write_str("[")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{entry}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for SelectorValue {
    fn from(value: &str) -> Self {
        SelectorValue::Literal(value.to_string())
    }
}

impl From<String> for SelectorValue {
    fn from(value: String) -> Self {
        SelectorValue::Literal(value)
    }
}

impl From<bool> for SelectorValue {
    fn from(value: bool) -> Self {
        SelectorValue::Presence(value)
    }
}

impl From<i64> for SelectorValue {
    fn from(value: i64) -> Self {
        SelectorValue::Index(value)
    }
}

impl From<Regex> for SelectorValue {
    fn from(value: Regex) -> Self {
        SelectorValue::Pattern(value)
    }
}

impl From<Vec<SelectorValue>> for SelectorValue {
    fn from(value: Vec<SelectorValue>) -> Self {
        SelectorValue::Many(value)
    }
}

impl From<Vec<&str>> for SelectorValue {
    fn from(value: Vec<&str>) -> Self {
        SelectorValue::Many(value.into_iter().map(SelectorValue::from).collect())
    }
}

/// Caller-supplied attribute map describing which element(s) to find.
///
/// Insertion order is irrelevant; entries are kept sorted so rendered
/// queries and diagnostics are deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selector {
    entries: BTreeMap<String, SelectorValue>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SelectorValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SelectorValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SelectorValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<SelectorValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SelectorValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into this selector; existing keys win.
    pub fn merge(mut self, other: Selector) -> Self {
        for (key, value) in other.entries {
            self.entries.entry(key).or_insert(value);
        }
        self
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Input `type` values accepted by the button family.
pub const BUTTON_INPUT_TYPES: &[&str] = &["button", "reset", "submit", "image"];

/// Input `type` values excluded from the text-field family.
pub const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "button",
    "checkbox",
    "color",
    "date",
    "datetime-local",
    "file",
    "hidden",
    "image",
    "month",
    "radio",
    "range",
    "reset",
    "submit",
    "time",
    "week",
];

/// Element kinds the engine distinguishes.
///
/// The original generated per-tag classes at load time from a table;
/// here each kind is a statically-checked capability descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElementKind {
    Generic,
    Button,
    Link,
    TextField,
    TextArea,
    CheckBox,
    Radio,
    SelectList,
    SelectOption,
    Label,
    FileField,
    Frame,
}

/// Static capability descriptor for one element kind.
#[derive(Debug)]
pub struct KindSpec {
    /// Human-readable name used in diagnostics.
    pub name: &'static str,

    /// Tag names this kind may resolve to; empty means any tag.
    pub tags: &'static [&'static str],

    /// Non-structural selector keys this kind accepts.
    pub valid_attributes: &'static [&'static str],

    /// The `label` key resolves through an external `<label>` control
    /// rather than a `label` attribute on the node itself.
    pub label_from_control: bool,

    /// Enabled/disabled is meaningful for this kind.
    pub interactive: bool,

    /// The kind has a read-only concept (writable precondition).
    pub writable: bool,
}

const GENERIC_SPEC: KindSpec = KindSpec {
    name: "element",
    tags: &[],
    valid_attributes: &["id", "title", "role", "lang", "dir", "name"],
    label_from_control: false,
    interactive: false,
    writable: false,
};

const BUTTON_SPEC: KindSpec = KindSpec {
    name: "button",
    tags: &["button", "input"],
    valid_attributes: &["id", "title", "role", "name", "value", "type"],
    label_from_control: true,
    interactive: true,
    writable: false,
};

const LINK_SPEC: KindSpec = KindSpec {
    name: "link",
    tags: &["a"],
    valid_attributes: &[
        "id",
        "title",
        "role",
        "name",
        "href",
        "target",
        "rel",
        "link_text",
        "partial_link_text",
    ],
    label_from_control: false,
    interactive: false,
    writable: false,
};

const TEXT_FIELD_SPEC: KindSpec = KindSpec {
    name: "text_field",
    tags: &["input"],
    valid_attributes: &[
        "id",
        "title",
        "role",
        "name",
        "value",
        "type",
        "placeholder",
        "maxlength",
        "size",
    ],
    label_from_control: true,
    interactive: true,
    writable: true,
};

const TEXT_AREA_SPEC: KindSpec = KindSpec {
    name: "textarea",
    tags: &["textarea"],
    valid_attributes: &["id", "title", "role", "name", "placeholder", "rows", "cols"],
    label_from_control: true,
    interactive: true,
    writable: true,
};

const CHECK_BOX_SPEC: KindSpec = KindSpec {
    name: "checkbox",
    tags: &["input"],
    valid_attributes: &["id", "title", "role", "name", "value", "type", "checked"],
    label_from_control: true,
    interactive: true,
    writable: false,
};

const RADIO_SPEC: KindSpec = KindSpec {
    name: "radio",
    tags: &["input"],
    valid_attributes: &["id", "title", "role", "name", "value", "type", "checked"],
    label_from_control: true,
    interactive: true,
    writable: false,
};

const SELECT_LIST_SPEC: KindSpec = KindSpec {
    name: "select",
    tags: &["select"],
    valid_attributes: &["id", "title", "role", "name", "multiple", "size"],
    label_from_control: true,
    interactive: true,
    writable: false,
};

const SELECT_OPTION_SPEC: KindSpec = KindSpec {
    name: "option",
    tags: &["option"],
    valid_attributes: &["id", "title", "role", "value", "selected", "label"],
    label_from_control: false,
    interactive: true,
    writable: false,
};

const LABEL_SPEC: KindSpec = KindSpec {
    name: "label",
    tags: &["label"],
    valid_attributes: &["id", "title", "role", "for"],
    label_from_control: false,
    interactive: false,
    writable: false,
};

const FILE_FIELD_SPEC: KindSpec = KindSpec {
    name: "file_field",
    tags: &["input"],
    valid_attributes: &["id", "title", "role", "name", "type", "accept"],
    label_from_control: true,
    interactive: true,
    writable: false,
};

const FRAME_SPEC: KindSpec = KindSpec {
    name: "frame",
    tags: &["iframe", "frame"],
    valid_attributes: &["id", "title", "role", "name", "src"],
    label_from_control: false,
    interactive: false,
    writable: false,
};

impl ElementKind {
    /// The static capability descriptor for this kind.
    pub fn spec(&self) -> &'static KindSpec {
        match self {
            ElementKind::Generic => &GENERIC_SPEC,
            ElementKind::Button => &BUTTON_SPEC,
            ElementKind::Link => &LINK_SPEC,
            ElementKind::TextField => &TEXT_FIELD_SPEC,
            ElementKind::TextArea => &TEXT_AREA_SPEC,
            ElementKind::CheckBox => &CHECK_BOX_SPEC,
            ElementKind::Radio => &RADIO_SPEC,
            ElementKind::SelectList => &SELECT_LIST_SPEC,
            ElementKind::SelectOption => &SELECT_OPTION_SPEC,
            ElementKind::Label => &LABEL_SPEC,
            ElementKind::FileField => &FILE_FIELD_SPEC,
            ElementKind::Frame => &FRAME_SPEC,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Single tag this kind maps to, when unambiguous.
    pub fn sole_tag(&self) -> Option<&'static str> {
        match self.spec().tags {
            [tag] => Some(tag),
            _ => None,
        }
    }
}
