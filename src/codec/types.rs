use serde::{Deserialize, Serialize};

/// A typed value as stored by the cluster.
///
/// Serialized untagged so documents look like plain JSON objects on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    IntegerList(Vec<i64>),
    TextList(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldValue::IntegerList(_) | FieldValue::TextList(_))
    }

    /// Exact term match; multi-valued fields match when any value does.
    pub fn matches_term(&self, term: &str) -> bool {
        match self {
            FieldValue::Text(s) => s == term,
            FieldValue::Integer(v) => term.parse::<i64>().is_ok_and(|t| t == *v),
            FieldValue::TextList(values) => values.iter().any(|s| s == term),
            FieldValue::IntegerList(values) => term
                .parse::<i64>()
                .is_ok_and(|t| values.iter().any(|v| *v == t)),
        }
    }
}

/// A value exactly as the worker produced it, before typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawValue {
    Single(String),
    Repeated(Vec<String>),
}

/// Worker-local input: named raw values plus the name of the identifier field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id_field: String,
    fields: Vec<(String, RawValue)>,
}

impl Record {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), RawValue::Single(value.into())));
        self
    }

    pub fn with_repeated<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.push((name.into(), RawValue::Repeated(values)));
        self
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// The identifier value, if present as a single non-blank value.
    pub fn id(&self) -> Option<&str> {
        match self.get(&self.id_field)? {
            RawValue::Single(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// The codec's output. Immutable once built; the identifier field is always first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id_field: String,
    id: String,
    fields: Vec<Field>,
}

impl Document {
    pub fn builder(id_field: impl Into<String>, id: impl Into<String>) -> DocumentBuilder {
        let id_field = id_field.into();
        let id = id.into();
        DocumentBuilder {
            fields: vec![Field {
                name: id_field.clone(),
                value: FieldValue::Text(id.clone()),
            }],
            id_field,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct DocumentBuilder {
    id_field: String,
    id: String,
    fields: Vec<Field>,
}

impl DocumentBuilder {
    /// Adds a field. A later value for the same name replaces the earlier one;
    /// the identifier field cannot be replaced.
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        let name = name.into();
        if name == self.id_field {
            return self;
        }
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => existing.value = value,
            None => self.fields.push(Field { name, value }),
        }
        self
    }

    pub fn build(self) -> Document {
        Document {
            id_field: self.id_field,
            id: self.id,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    TextList,
    IntegerList,
}

impl FieldType {
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldType::TextList | FieldType::IntegerList)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

// Longer suffixes first so `_ss` is not mistaken for `_s`.
const DYNAMIC_SUFFIXES: [(&str, FieldType); 7] = [
    ("_ss", FieldType::TextList),
    ("_is", FieldType::IntegerList),
    ("_ls", FieldType::IntegerList),
    ("_s", FieldType::Text),
    ("_t", FieldType::Text),
    ("_i", FieldType::Integer),
    ("_l", FieldType::Integer),
];

/// Type implied by a dynamic-field suffix such as `field3_i`.
pub fn dynamic_field_type(name: &str) -> Option<FieldType> {
    DYNAMIC_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
        .map(|(_, field_type)| *field_type)
}

/// Field typing rules applied by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    id_field: String,
    fields: Vec<FieldSpec>,
    dynamic_fields: bool,
}

impl Schema {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            fields: Vec::new(),
            dynamic_fields: true,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required,
        });
        self
    }

    pub fn without_dynamic_fields(mut self) -> Self {
        self.dynamic_fields = false;
        self
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn field_specs(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name.as_str())
    }

    /// Declared type first, then the dynamic suffix rule.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        if let Some(spec) = self.fields.iter().find(|spec| spec.name == name) {
            return Some(spec.field_type);
        }
        if self.dynamic_fields {
            return dynamic_field_type(name);
        }
        None
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new("id")
    }
}
