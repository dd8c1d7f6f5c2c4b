//! JSON encoding of an exported record tree.
//!
//! Each node is an object keyed by lowercased column names. A node whose
//! cells drove a traversal additionally carries [`SUB_ROW_KEY`]: an object
//! mapping child table name to an array of child nodes.

use serde_json::{Map, Value};

use crate::core::{Record, SqlValue};

/// Key under which a node's child rows are nested.
pub const SUB_ROW_KEY: &str = "subRow";

/// Encode a record tree as a JSON tree.
pub fn to_json(record: &Record) -> Value {
    let mut node = Map::new();
    let mut sub = Map::new();

    for cell in &record.cells {
        node.insert(cell.name.clone(), value_to_json(&cell.value));

        for (child_table, rows) in &cell.sub_rows {
            let children: Vec<Value> = rows.iter().map(to_json).collect();
            match sub.get_mut(child_table) {
                Some(Value::Array(existing)) => existing.extend(children),
                _ => {
                    sub.insert(child_table.clone(), Value::Array(children));
                }
            }
        }
    }

    if !sub.is_empty() {
        node.insert(SUB_ROW_KEY.to_string(), Value::Object(sub));
    }
    Value::Object(node)
}

fn value_to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null(_) => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::I16(v) => Value::from(*v),
        SqlValue::I32(v) => Value::from(*v),
        SqlValue::I64(v) => Value::from(*v),
        SqlValue::F32(v) => Value::from(*v),
        SqlValue::F64(v) => Value::from(*v),
        SqlValue::Decimal(d) => {
            // Exactly representable decimals stay numbers, the rest degrade
            // to their canonical string.
            let text = d.normalize().to_string();
            match text.parse::<serde_json::Number>() {
                Ok(n) => Value::Number(n),
                Err(_) => Value::String(text),
            }
        }
        other => Value::String(other.canonical_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Cell, SqlNullType};

    fn record_with_cells(table: &str, pk: i64, cells: Vec<Cell>) -> Record {
        let mut r = Record::new(table, SqlValue::I64(pk));
        r.cells = cells;
        r
    }

    #[test]
    fn test_scalar_cells_become_primitives() {
        let record = record_with_cells(
            "blogpost",
            2,
            vec![
                Cell::new("id", SqlValue::I64(2), None),
                Cell::new("title", SqlValue::Text("hello".into()), None),
                Cell::new("draft", SqlValue::Bool(false), None),
                Cell::new("rating", SqlValue::Null(SqlNullType::I64), None),
            ],
        );

        let json = to_json(&record);
        assert_eq!(json["id"], 2);
        assert_eq!(json["title"], "hello");
        assert_eq!(json["draft"], false);
        assert!(json["rating"].is_null());
        assert!(json.get(SUB_ROW_KEY).is_none());
    }

    #[test]
    fn test_sub_rows_nest_under_sub_row_key() {
        let author = record_with_cells(
            "author",
            1,
            vec![Cell::new("id", SqlValue::I64(1), None)],
        );
        let mut author_cell = Cell::new("author_id", SqlValue::I64(1), None);
        author_cell.sub_rows.insert("author".into(), vec![author]);

        let record = record_with_cells(
            "blogpost",
            2,
            vec![Cell::new("id", SqlValue::I64(2), None), author_cell],
        );

        let json = to_json(&record);
        assert_eq!(json[SUB_ROW_KEY]["author"][0]["id"], 1);
    }

    #[test]
    fn test_decimal_renders_as_number_when_possible() {
        let record = record_with_cells(
            "t",
            1,
            vec![Cell::new("price", SqlValue::Decimal("12.50".parse().unwrap()), None)],
        );
        assert_eq!(to_json(&record)["price"], 12.5);
    }
}
