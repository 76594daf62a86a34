//! Type mapping derived from model metadata

use crate::model::{FieldKind, FieldMeta, ModelMeta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

const TERM_VECTOR: &str = "with_positions_offsets";

/// Analysed sub-field added to keyword-mapped string columns.
pub const ANALYZED_SUBFIELD: &str = "tk";

/// Properties of one document type, in the shape `put_mapping` sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub properties: BTreeMap<String, Value>,
}

impl Mapping {
    pub fn to_value(&self) -> Value {
        json!({ "properties": self.properties })
    }
}

pub fn model_to_mapping(model: &ModelMeta) -> Mapping {
    let options = &model.index_options;
    let mut mapping = Mapping::default();

    for field in &model.fields {
        if options.ignore.contains(&field.name) {
            continue;
        }
        let overrides = options.fields.get(&field.name);
        match field_mapping(field, &field.kind, overrides) {
            Some(property) => {
                mapping.properties.insert(field.column().to_string(), property);
            }
            None => warn!(
                "no mapping for field '{}' of kind {}, skipping",
                field.name, field.kind
            ),
        }
    }

    for (name, extra) in &options.extra_fields {
        let mut extra = extra.clone();
        let kind = extra
            .remove("type")
            .and_then(|t| t.as_str().map(str::to_string))
            .unwrap_or_else(|| "string".to_string());
        if kind != "string" {
            warn!("extra field '{}' has unsupported type '{}', skipping", name, kind);
            continue;
        }
        mapping
            .properties
            .insert(name.clone(), analyzed_string(Some(&extra)));
    }

    mapping
}

fn field_mapping(
    field: &FieldMeta,
    kind: &FieldKind,
    overrides: Option<&Map<String, Value>>,
) -> Option<Value> {
    use FieldKind::*;

    let property = match kind {
        AutoField | ForeignKey => json!({"type": "keyword", "store": true}),
        IntegerField | SmallIntegerField | PositiveIntegerField | PositiveSmallIntegerField
        | PositionField | OneToOneField => json!({"type": "integer", "store": true}),
        BigIntegerField => json!({"type": "long", "store": true}),
        FloatField | DecimalField => json!({"type": "double", "store": true}),
        BooleanField | NullBooleanField => json!({"type": "boolean", "store": true}),
        DateField | DateTimeField | StampedDateTimeField(_) | TimeField => {
            json!({"type": "date", "store": true})
        }
        CharField | SlugField | EmailField | TagField | UrlField | ImageField | FileField
        | FilePathField | IpAddressField | CommaSeparatedIntegerField | XmlField => json!({
            "type": "keyword",
            "store": true,
            "fields": {
                ANALYZED_SUBFIELD: {"type": "text", "store": true, "term_vector": TERM_VECTOR}
            }
        }),
        TextField => {
            let mut data = overrides.cloned().unwrap_or_default();
            if field.unique && !data.contains_key("index") {
                data.insert("index".to_string(), json!("not_analyzed"));
            }
            analyzed_string(Some(&data))
        }
        ListField(sub) => return field_mapping(field, sub, overrides),
        Other(_) => return None,
    };
    Some(property)
}

/// Analysed text with term vectors, adjusted by `options`. The legacy
/// `index = "not_analyzed"` switch yields a keyword with no term vector.
fn analyzed_string(options: Option<&Map<String, Value>>) -> Value {
    let mut data = Map::new();
    data.insert("type".to_string(), json!("text"));
    data.insert("store".to_string(), json!(true));
    data.insert("term_vector".to_string(), json!(TERM_VECTOR));

    for (key, value) in options.into_iter().flatten() {
        if key == "index" {
            match value.as_str() {
                Some("not_analyzed") => {
                    data.insert("type".to_string(), json!("keyword"));
                    data.remove("term_vector");
                }
                Some("analyzed") => {}
                Some("no") => {
                    data.insert("index".to_string(), json!(false));
                }
                _ => {
                    data.insert(key.clone(), value.clone());
                }
            }
        } else {
            data.insert(key.clone(), value.clone());
        }
    }
    Value::Object(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> ModelMeta {
        ModelMeta::new("person")
            .with_field("name", FieldKind::CharField)
            .with_field("bio", FieldKind::TextField)
            .with_field("age", FieldKind::IntegerField)
            .with_field("score", FieldKind::DecimalField)
            .with_field("born", FieldKind::DateField)
            .with_field("tags", FieldKind::parse("ListField:CharField"))
            .with_field("blob", FieldKind::parse("PickledObjectField"))
    }

    #[test]
    fn test_field_kinds() {
        let m = model_to_mapping(&person());
        assert_eq!(m.properties["id"], json!({"type": "keyword", "store": true}));
        assert_eq!(m.properties["age"]["type"], "integer");
        assert_eq!(m.properties["score"]["type"], "double");
        assert_eq!(m.properties["born"]["type"], "date");
        assert_eq!(m.properties["name"]["type"], "keyword");
        assert_eq!(
            m.properties["name"]["fields"]["tk"]["term_vector"],
            "with_positions_offsets"
        );
        assert_eq!(m.properties["tags"], m.properties["name"]);
        assert_eq!(
            m.properties["bio"],
            json!({"type": "text", "store": true, "term_vector": "with_positions_offsets"})
        );
        assert!(!m.properties.contains_key("blob"));
    }

    #[test]
    fn test_unique_text_is_keyword() {
        let mut model = ModelMeta::new("page").with_field("slug_text", FieldKind::TextField);
        model.fields[1].unique = true;
        let m = model_to_mapping(&model);
        assert_eq!(m.properties["slug_text"], json!({"type": "keyword", "store": true}));
    }

    #[test]
    fn test_index_options() {
        let mut model = person();
        model.index_options.ignore.push("age".to_string());
        let mut body = Map::new();
        body.insert("index".to_string(), json!("not_analyzed"));
        model.index_options.fields.insert("bio".to_string(), body);
        let mut extra = Map::new();
        extra.insert("analyzer".to_string(), json!("snowball"));
        model
            .index_options
            .extra_fields
            .insert("fulltext".to_string(), extra);

        let m = model_to_mapping(&model);
        assert!(!m.properties.contains_key("age"));
        assert_eq!(m.properties["bio"]["type"], "keyword");
        assert!(m.properties["bio"].get("term_vector").is_none());
        assert_eq!(m.properties["fulltext"]["analyzer"], "snowball");
        assert_eq!(m.properties["fulltext"]["type"], "text");
    }

    #[test]
    fn test_to_value_shape() {
        let m = model_to_mapping(&ModelMeta::new("tag"));
        assert_eq!(
            m.to_value(),
            json!({"properties": {"id": {"type": "keyword", "store": true}}})
        );
    }
}
