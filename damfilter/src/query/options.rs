use std::collections::HashMap;

use itertools::Itertools;
use serde_json::Value;

use crate::common::{compare_values, display_text, is_blank, FieldPath, FieldTarget};

use super::ValueOption;

/// Flattens arrays one level and drops blank values.
pub fn option_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
    values
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter(|value| !is_blank(value))
        .cloned()
        .collect()
}

/// Maps each document's id to the label read through `label_target`.
pub fn label_index(
    documents: &[Value],
    id_key: &str,
    label_target: &FieldTarget,
) -> HashMap<String, String> {
    let id_path = FieldPath::field(id_key);
    documents
        .iter()
        .filter_map(|document| {
            let id = id_path.resolve(document).into_iter().next()?;
            let label = option_values(label_target.values(document)).into_iter().next()?;
            Some((display_text(id), display_text(&label)))
        })
        .collect()
}

/// Deduplicates `values` into options sorted by label, then value.
///
/// Values without an entry in `labels` are labelled with their own text.
pub fn build_options(values: Vec<Value>, labels: &HashMap<String, String>) -> Vec<ValueOption> {
    values
        .into_iter()
        .filter(|value| !is_blank(value))
        .unique_by(|value| value.to_string())
        .map(|value| {
            let text = display_text(&value);
            let label = labels.get(&text).cloned().unwrap_or(text);
            ValueOption { label, value }
        })
        .sorted_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| compare_values(&a.value, &b.value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_are_unique_and_sorted_by_label() {
        let options = build_options(
            vec![json!("sculpture"), json!("Painting"), json!("sculpture"), json!(""), Value::Null],
            &HashMap::new(),
        );
        let labels: Vec<_> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Painting", "sculpture"]);
    }

    #[test]
    fn labels_come_from_referenced_documents() {
        let target = FieldTarget::ObjectList {
            list: "metadata".into(),
            discriminator: "key".into(),
            name: "title".into(),
            leaf: FieldPath::field("value"),
        };
        let documents = vec![
            json!({"_id": "entities/2", "metadata": [{"key": "title", "value": "Antwerp"}]}),
            json!({"_id": "entities/1", "metadata": [{"key": "title", "value": "Ghent"}]}),
            json!({"_id": "entities/3", "metadata": []}),
        ];
        let labels = label_index(&documents, "_id", &target);
        assert_eq!(labels.len(), 2);

        let options = build_options(
            vec![json!("entities/1"), json!("entities/2"), json!("entities/3")],
            &labels,
        );
        assert_eq!(
            options,
            vec![
                ValueOption { label: "Antwerp".into(), value: json!("entities/2") },
                ValueOption { label: "entities/3".into(), value: json!("entities/3") },
                ValueOption { label: "Ghent".into(), value: json!("entities/1") },
            ]
        );
    }

    #[test]
    fn option_values_flatten_arrays() {
        let values = [json!(["a", "", "b"]), json!("c"), Value::Null];
        assert_eq!(option_values(values.iter()), vec![json!("a"), json!("b"), json!("c")]);
    }
}
