use super::types::{Document, FieldType, FieldValue, RawValue, Record, Schema};
use crate::error::MalformedRecordError;

/// Encodes records into documents according to a [`Schema`].
///
/// Encoding is pure: the same record always yields the same document or the
/// same error, and nothing outside the returned value is touched.
#[derive(Debug, Clone, Default)]
pub struct DocumentCodec {
    schema: Schema,
}

impl DocumentCodec {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The identifier is read from the field the record names as its own
    /// identifier, which need not match the schema's default.
    pub fn encode(&self, record: &Record) -> Result<Document, MalformedRecordError> {
        let id_field = record.id_field();
        let id = match record.get(id_field) {
            Some(RawValue::Single(value)) if !value.trim().is_empty() => value.trim(),
            Some(RawValue::Repeated(_)) => {
                return Err(MalformedRecordError::new(
                    "",
                    format!("identifier field '{}' must be single-valued", id_field),
                ));
            }
            _ => {
                return Err(MalformedRecordError::new(
                    "",
                    format!("missing identifier field '{}'", id_field),
                ));
            }
        };

        for required in self.schema.required_fields() {
            if required != id_field
                && required != self.schema.id_field()
                && record.get(required).is_none()
            {
                return Err(MalformedRecordError::new(
                    id,
                    format!("missing required field '{}'", required),
                ));
            }
        }

        let mut builder = Document::builder(id_field, id);
        for (name, raw) in record.fields() {
            if name == id_field {
                continue;
            }
            let value = match self.schema.field_type(name) {
                Some(field_type) => convert(id, name, raw, field_type)?,
                None => passthrough(raw),
            };
            builder = builder.field(name, value);
        }

        Ok(builder.build())
    }
}

fn passthrough(raw: &RawValue) -> FieldValue {
    match raw {
        RawValue::Single(value) => FieldValue::Text(value.clone()),
        RawValue::Repeated(values) => FieldValue::TextList(values.clone()),
    }
}

fn convert(
    id: &str,
    name: &str,
    raw: &RawValue,
    field_type: FieldType,
) -> Result<FieldValue, MalformedRecordError> {
    let values: Vec<&str> = match raw {
        RawValue::Single(value) => vec![value.as_str()],
        RawValue::Repeated(values) => values.iter().map(String::as_str).collect(),
    };

    if !field_type.is_multi_valued() && values.len() != 1 {
        return Err(MalformedRecordError::new(
            id,
            format!("field '{}' is single-valued but got {} values", name, values.len()),
        ));
    }

    match field_type {
        FieldType::Text => Ok(FieldValue::Text(values[0].to_string())),
        FieldType::TextList => Ok(FieldValue::TextList(
            values.iter().map(|v| v.to_string()).collect(),
        )),
        FieldType::Integer => parse_integer(id, name, values[0]).map(FieldValue::Integer),
        FieldType::IntegerList => values
            .iter()
            .map(|v| parse_integer(id, name, v))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::IntegerList),
    }
}

fn parse_integer(id: &str, name: &str, value: &str) -> Result<i64, MalformedRecordError> {
    value.trim().parse::<i64>().map_err(|_| {
        MalformedRecordError::new(
            id,
            format!("field '{}' expects an integer, got '{}'", name, value),
        )
    })
}
