use super::*;

/// Normalizes every contract column of `record`, stopping at the first
/// column that fails. Keys outside the contract are ignored and missing
/// columns read as null.
pub(super) fn normalize_record(
    contract: &TableContract,
    record: &RawRecord,
) -> Result<NormalizedRow, NormalizationError> {
    let values = contract
        .columns()
        .iter()
        .map(|spec| coerce(record.get(&spec.name).unwrap_or(&Value::Null), spec))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NormalizedRow::new(values))
}

/// Upsert statement passing every column through, key included. Whether an
/// existing row is overwritten is decided by the store-side conflict hook.
pub(super) fn build_upsert_sql(contract: &TableContract) -> String {
    let columns = contract
        .columns()
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect::<Vec<_>>();
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>();
    let assignments = columns
        .iter()
        .map(|column| format!("{column}=excluded.{column}"))
        .collect::<Vec<_>>();
    let key = quote_identifier(contract.conflict_key());

    format!(
        "INSERT INTO {table}({columns}) VALUES({placeholders})
         ON CONFLICT({key}) DO UPDATE SET {assignments}
         WHERE {hook}({table_literal}, excluded.{key})",
        table = quote_identifier(contract.table()),
        columns = columns.join(", "),
        placeholders = placeholders.join(", "),
        assignments = assignments.join(", "),
        hook = CONFLICT_HOOK,
        table_literal = quote_literal(contract.table()),
    )
}

/// Writes one batch in a single transaction. Returns the number of rows the
/// store actually inserted or overwrote.
pub(super) fn upsert_batch(
    connection: &mut Connection,
    upsert_sql: &str,
    batch: &[NormalizedRow],
) -> Result<usize, StoreError> {
    let tx = connection.transaction()?;
    let mut changed = 0;

    {
        let mut statement = tx.prepare(upsert_sql)?;
        for row in batch {
            changed += statement.execute(params_from_iter(row.values()))?;
        }
    }

    tx.commit()?;
    Ok(changed)
}
