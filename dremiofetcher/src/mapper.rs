use crate::models::{Column, DataType, RawField, RawNode, ResourceKind};

/// Resolves the kind of a catalog item from whichever type fields the
/// answering endpoint filled in.
///
/// `type` wins over `entityType` when both are present. Returns `None` for
/// vocabularies outside the closed taxonomy.
pub fn normalize_kind(node: &RawNode) -> Option<ResourceKind> {
    let raw_type = node
        .node_type
        .as_deref()
        .or(node.entity_type.as_deref())?
        .trim()
        .to_ascii_uppercase();

    match raw_type.as_str() {
        "CONTAINER" => Some(container_kind(node.container_type.as_deref())),
        "DATASET" => Some(ResourceKind::Dataset),
        "SPACE" => Some(ResourceKind::Space),
        "HOME" => Some(ResourceKind::Home),
        "SOURCE" => Some(ResourceKind::Source),
        "FOLDER" => Some(ResourceKind::Folder),
        _ => None,
    }
}

fn container_kind(container_type: Option<&str>) -> ResourceKind {
    match container_type
        .map(|t| t.trim().to_ascii_uppercase())
        .as_deref()
    {
        Some("SPACE") => ResourceKind::Space,
        Some("HOME") => ResourceKind::Home,
        Some("SOURCE") => ResourceKind::Source,
        _ => ResourceKind::Folder,
    }
}

/// Maps a native catalog type name onto the target type enum. Never fails:
/// unknown names become `VARCHAR`.
pub fn map_data_type(native: &str) -> DataType {
    let upper = native.trim().to_ascii_uppercase();
    let base = upper
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or("");

    match base {
        "INTEGER" | "INT" => DataType::Int,
        "BIGINT" => DataType::Bigint,
        "FLOAT" => DataType::Float,
        "DOUBLE" => DataType::Double,
        "VARCHAR" => DataType::Varchar,
        "CHAR" => DataType::Char,
        "TEXT" => DataType::Text,
        "STRING" => DataType::String,
        "BOOLEAN" => DataType::Boolean,
        "DATE" => DataType::Date,
        "TIME" => DataType::Time,
        "TIMESTAMP" => DataType::Timestamp,
        "DECIMAL" => DataType::Decimal,
        "NUMERIC" => DataType::Numeric,
        _ => DataType::Varchar,
    }
}

/// Flattens dataset fields into ordered columns, numbering from 1.
pub fn extract_columns(fields: &[RawField]) -> Vec<Column> {
    fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let ordinal = idx as u32 + 1;
            Column {
                name: field
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("column_{ordinal}")),
                data_type: map_data_type(field.field_type.name.as_deref().unwrap_or("VARCHAR")),
                description: field.description.clone().unwrap_or_default(),
                ordinal_position: ordinal,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawFieldType;

    fn listing(node_type: &str, container_type: Option<&str>) -> RawNode {
        RawNode {
            node_type: Some(node_type.to_string()),
            container_type: container_type.map(str::to_string),
            ..Default::default()
        }
    }

    fn lookup(entity_type: &str) -> RawNode {
        RawNode {
            entity_type: Some(entity_type.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn root_listing_shapes() {
        let cases = [
            ("CONTAINER", Some("SPACE"), ResourceKind::Space),
            ("CONTAINER", Some("HOME"), ResourceKind::Home),
            ("CONTAINER", Some("SOURCE"), ResourceKind::Source),
            ("CONTAINER", Some("FOLDER"), ResourceKind::Folder),
            ("CONTAINER", Some("FUNCTION"), ResourceKind::Folder),
            ("CONTAINER", None, ResourceKind::Folder),
            ("DATASET", None, ResourceKind::Dataset),
            ("DATASET", Some("SPACE"), ResourceKind::Dataset),
        ];
        for (node_type, container_type, expected) in cases {
            assert_eq!(
                normalize_kind(&listing(node_type, container_type)),
                Some(expected),
                "{node_type}+{container_type:?}"
            );
        }
    }

    #[test]
    fn path_lookup_shapes() {
        let cases = [
            ("space", ResourceKind::Space),
            ("home", ResourceKind::Home),
            ("source", ResourceKind::Source),
            ("folder", ResourceKind::Folder),
            ("dataset", ResourceKind::Dataset),
            ("SPACE", ResourceKind::Space),
            ("Dataset", ResourceKind::Dataset),
        ];
        for (entity_type, expected) in cases {
            assert_eq!(normalize_kind(&lookup(entity_type)), Some(expected));
        }
    }

    #[test]
    fn type_field_takes_precedence_over_entity_type() {
        let mut node = listing("CONTAINER", Some("SOURCE"));
        node.entity_type = Some("folder".into());
        assert_eq!(normalize_kind(&node), Some(ResourceKind::Source));
    }

    #[test]
    fn unknown_vocabulary_is_rejected() {
        assert_eq!(normalize_kind(&RawNode::default()), None);
        assert_eq!(normalize_kind(&lookup("function")), None);
        assert_eq!(normalize_kind(&listing("UNKNOWN", None)), None);
    }

    #[test]
    fn data_type_mapping_is_total() {
        assert_eq!(map_data_type("INTEGER"), DataType::Int);
        assert_eq!(map_data_type("bigint"), DataType::Bigint);
        assert_eq!(map_data_type("DECIMAL(10,2)"), DataType::Decimal);
        assert_eq!(map_data_type("varchar(255)"), DataType::Varchar);
        assert_eq!(map_data_type("TIMESTAMP WITH TIME ZONE"), DataType::Timestamp);
        for unknown in ["", "   ", "STRUCT", "LIST<INT>", "VARBINARY", "ü"] {
            assert_eq!(map_data_type(unknown), DataType::Varchar, "{unknown:?}");
        }
    }

    #[test]
    fn columns_are_numbered_and_defaulted() {
        let fields = vec![
            RawField {
                name: Some("order_id".into()),
                field_type: RawFieldType {
                    name: Some("BIGINT".into()),
                },
                description: Some("primary key".into()),
            },
            RawField {
                name: None,
                field_type: RawFieldType { name: None },
                description: None,
            },
        ];

        let columns = extract_columns(&fields);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "order_id");
        assert_eq!(columns[0].data_type, DataType::Bigint);
        assert_eq!(columns[0].ordinal_position, 1);
        assert_eq!(columns[1].name, "column_2");
        assert_eq!(columns[1].data_type, DataType::Varchar);
        assert_eq!(columns[1].description, "");
    }
}
