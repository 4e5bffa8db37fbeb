//! Query Normalizer (C10, §4.10).
//!
//! For every `datetime` attribute, rewrites query literal values through
//! the datetime helper so backend comparisons see one consistent zone
//! representation regardless of how the caller spelled the timestamp.

use serde_json::Value;

use crate::constants::TYPE_DATETIME;
use crate::datetime;
use crate::query::Query;
use crate::schema::types::Collection;

pub fn normalize(collection: &Collection, queries: &[Query]) -> Vec<Query> {
    queries
        .iter()
        .map(|query| {
            let Some(attribute) = collection.find_attribute(query.get_attribute()) else {
                return query.clone();
            };
            if attribute.attr_type != TYPE_DATETIME {
                return query.clone();
            }
            let values: Vec<Value> = query
                .get_values()
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => Value::String(datetime::encode(s)),
                    None => v.clone(),
                })
                .collect();
            let mut normalized = query.clone();
            normalized.set_values(values);
            normalized
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Attribute;
    use serde_json::json;

    #[test]
    fn rewrites_only_datetime_attribute_queries() {
        let mut collection = Collection::new("events", "events");
        collection.attributes.push(Attribute::new("startsAt", TYPE_DATETIME, 0));
        collection.attributes.push(Attribute::new("title", crate::constants::TYPE_STRING, 64));

        let queries = vec![
            Query::equal("startsAt", json!("2024-01-02T03:04:05Z")),
            Query::equal("title", json!("2024-01-02T03:04:05Z")),
        ];
        let normalized = normalize(&collection, &queries);
        assert!(normalized[0]
            .get_values()
            .first()
            .and_then(Value::as_str)
            .unwrap()
            .starts_with("2024-01-02T03:04:05"));
        assert_eq!(normalized[1].get_values(), queries[1].get_values());
    }
}
