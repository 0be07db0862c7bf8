use super::*;

/// Dataset files eligible for `table`: names containing the table name and
/// ending in the dataset extension, in name order.
pub(super) fn discover_dataset_files(
    dataset_dir: &Path,
    table: &str,
) -> Result<Vec<PathBuf>, IngestionError> {
    let entries = match fs::read_dir(dataset_dir) {
        Ok(entries) => entries,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(IngestionError::Io {
                path: dataset_dir.to_path_buf(),
                source,
            });
        }
    };

    let suffix = format!(".{DATASET_EXTENSION}");
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| IngestionError::Io {
                path: dataset_dir.to_path_buf(),
                source,
            })?
            .path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.contains(table) && name.ends_with(&suffix) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

pub(super) fn read_records(path: &Path) -> Result<Vec<RawRecord>, IngestionError> {
    let raw = fs::read(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_slice(&raw).map_err(|source| IngestionError::InvalidDataset {
            path: path.to_path_buf(),
            source,
        })?;

    let Value::Array(items) = value else {
        return Err(IngestionError::NotARecordArray {
            path: path.to_path_buf(),
        });
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            _ => Err(IngestionError::NotARecordArray {
                path: path.to_path_buf(),
            }),
        })
        .collect()
}

/// Moves a consumed dataset into `processed_dir` so later runs skip it.
/// Existing history is never overwritten.
pub(super) fn relocate_processed(
    path: &Path,
    processed_dir: &Path,
) -> Result<PathBuf, IngestionError> {
    let io_error = |source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(processed_dir).map_err(io_error)?;

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("dataset");
    let target = crate::util::unique_path(processed_dir, stem, DATASET_EXTENSION);
    fs::rename(path, &target).map_err(io_error)?;

    Ok(target)
}
