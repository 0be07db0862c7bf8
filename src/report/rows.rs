use super::*;

pub(super) type ReportRow = Map<String, Value>;

/// Runs one report query and collects its rows as column-ordered JSON
/// objects.
pub(super) fn query_report_rows(
    connection: &Connection,
    definition: &ReportDefinition,
) -> Result<Vec<ReportRow>, StoreError> {
    let mut statement = connection.prepare(&definition.query)?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement.query([])?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            object.insert(column.clone(), json_value(row.get_ref(index)?));
        }
        collected.push(object);
    }

    Ok(collected)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::from(value),
        ValueRef::Real(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
        }
    }
}
