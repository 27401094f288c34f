use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::IndexingError;
use crate::model::{
    Filter, Id, IndexDocument, IndexField, IndexFieldMap, IndexFieldType, Language, SearchQuery,
    TITLE_PROPERTY,
};
use crate::store::traits::SearchIndex;

/// Process-local search index with typed filtering over the field mapping
#[derive(Debug, Default)]
pub struct MemoryIndex {
    mapping: RwLock<IndexFieldMap>,
    documents: RwLock<BTreeMap<(Id, Language), IndexDocument>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }
}

fn title_field() -> IndexField {
    IndexField {
        field_type: IndexFieldType::Text,
        sortable: true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn in_range(number: Option<f64>, from: Option<f64>, to: Option<f64>) -> bool {
    let Some(n) = number else {
        return false;
    };
    from.map_or(true, |f| n >= f) && to.map_or(true, |t| n <= t)
}

fn matches_value(field_type: IndexFieldType, stored: &Value, wanted: &Value) -> bool {
    match field_type {
        IndexFieldType::Text => match (stored.as_str(), wanted.as_str()) {
            (Some(s), Some(w)) => s.to_lowercase().contains(&w.to_lowercase()),
            _ => false,
        },
        IndexFieldType::Double | IndexFieldType::Date => {
            match (as_number(stored), as_number(wanted)) {
                (Some(s), Some(w)) => s == w,
                _ => false,
            }
        }
        IndexFieldType::Keyword | IndexFieldType::DateRange | IndexFieldType::GeoPoint => {
            stored == wanted
        }
    }
}

fn matches_filter(field_type: IndexFieldType, values: &[Value], filter: &Filter) -> bool {
    match filter {
        Filter::Range { from, to } => values.iter().any(|v| match field_type {
            // Date ranges match when they overlap the requested range
            IndexFieldType::DateRange => {
                let start = v.get("from").and_then(as_number);
                let end = v.get("to").and_then(as_number);
                from.map_or(true, |f| end.map_or(true, |e| e >= f))
                    && to.map_or(true, |t| start.map_or(true, |s| s <= t))
            }
            _ => in_range(as_number(v), *from, *to),
        }),
        Filter::Any(wanted) => values
            .iter()
            .any(|v| wanted.iter().any(|w| matches_value(field_type, v, w))),
        Filter::Match(wanted) => values.iter().any(|v| matches_value(field_type, v, wanted)),
    }
}

fn field_values(document: &IndexDocument, field: &str) -> Vec<Value> {
    if field == TITLE_PROPERTY {
        return vec![Value::String(document.title.clone())];
    }
    document
        .metadata
        .get(field)
        .map(|values| values.iter().map(|v| v.value.clone()).collect())
        .unwrap_or_default()
}

fn compare_sort_keys(field_type: IndexFieldType, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match field_type {
            IndexFieldType::Double | IndexFieldType::Date => {
                match (as_number(a), as_number(b)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                }
            }
            _ => {
                let x = a.as_str().map(str::to_lowercase).unwrap_or_else(|| a.to_string());
                let y = b.as_str().map(str::to_lowercase).unwrap_or_else(|| b.to_string());
                x.cmp(&y)
            }
        },
    }
}

#[async_trait::async_trait]
impl SearchIndex for MemoryIndex {
    async fn put_mapping(&self, mapping: IndexFieldMap) -> Result<(), IndexingError> {
        *self.mapping.write() = mapping;
        Ok(())
    }

    async fn get_mapping(&self) -> Result<IndexFieldMap, IndexingError> {
        Ok(self.mapping.read().clone())
    }

    async fn index_document(&self, document: IndexDocument) -> Result<(), IndexingError> {
        let key = (document.shared_id.clone(), document.language.clone());
        self.documents.write().insert(key, document);
        Ok(())
    }

    async fn delete_document(&self, shared_id: &str, language: &str) -> Result<(), IndexingError> {
        let key = (shared_id.to_string(), language.to_string());
        self.documents.write().remove(&key);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexDocument>, IndexingError> {
        let mapping = self.mapping.read().clone();
        let field_of = |name: &str| -> Result<IndexField, IndexingError> {
            if name == TITLE_PROPERTY {
                return Ok(title_field());
            }
            mapping
                .get(name)
                .cloned()
                .ok_or_else(|| IndexingError::UnknownField(name.to_string()))
        };

        let mut filters = Vec::with_capacity(query.filters.len());
        for (name, filter) in &query.filters {
            let field = field_of(name)?;
            let range_capable = matches!(
                field.field_type,
                IndexFieldType::Double | IndexFieldType::Date | IndexFieldType::DateRange
            );
            if matches!(filter, Filter::Range { .. }) && !range_capable {
                return Err(IndexingError::FilterMismatch {
                    field: name.clone(),
                    field_type: field.field_type,
                });
            }
            filters.push((name.as_str(), field.field_type, filter));
        }

        let sort = match &query.sort {
            Some(name) => {
                let field = field_of(name)?;
                if !field.sortable {
                    return Err(IndexingError::NotSortable(name.clone()));
                }
                Some((name.as_str(), field.field_type))
            }
            None => None,
        };

        let mut results: Vec<IndexDocument> = self
            .documents
            .read()
            .values()
            .filter(|doc| query.language.as_ref().map_or(true, |l| &doc.language == l))
            .filter(|doc| query.template.as_ref().map_or(true, |t| &doc.template == t))
            .filter(|doc| query.ids.is_empty() || query.ids.contains(&doc.shared_id))
            .filter(|doc| {
                filters.iter().all(|(name, field_type, filter)| {
                    matches_filter(*field_type, &field_values(doc, name), filter)
                })
            })
            .cloned()
            .collect();

        if let Some((name, field_type)) = sort {
            results.sort_by(|a, b| {
                let left = field_values(a, name);
                let right = field_values(b, name);
                compare_sort_keys(field_type, left.first(), right.first())
            });
        }

        Ok(results)
    }

    async fn clear(&self) -> Result<(), IndexingError> {
        self.documents.write().clear();
        Ok(())
    }
}
