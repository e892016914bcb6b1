//! The CSV dataset format: line-oriented, `#`-commented, control lines of the
//! shape `tag,index,nlines,kind` introducing either inline (`local`) data
//! rows or references to external (`csv`) files.
//!
//! A single loader, parameterised by [`Strictness`] and using 1-based
//! `from_line` semantics, replaces what could otherwise be two overlapping
//! loaders — one strict, one silently lossy.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{Dataset, Strictness};
use crate::bridge::DataType;
use crate::error::{DatasetErrorKind, HarnessError};
use crate::numeric::Element;

/// Loads a dataset described by the CSV index file at `index_path`.
pub fn load_csv(
    index_path: &Path,
    data_type: DataType,
    strictness: Strictness,
) -> Result<Dataset, HarnessError> {
    let file = File::open(index_path)?;
    let lines = read_lines(file)?;
    let base_dir = index_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut inputs: BTreeMap<usize, Vec<Vec<Element>>> = BTreeMap::new();
    let mut outputs: BTreeMap<usize, Vec<Vec<Element>>> = BTreeMap::new();

    let mut cursor = 0usize;
    while cursor < lines.len() {
        let (text, line_no) = &lines[cursor];
        cursor += 1;
        if is_blank_or_comment(text) {
            continue;
        }

        let fields: Vec<&str> = text.split(',').collect();
        if fields.len() != 4 {
            return parse_failure(index_path, *line_no, "control line must have 4 fields");
        }
        let tag = fields[0].trim();
        let index: usize = fields[1]
            .trim()
            .parse()
            .map_err(|_| bad_control_line(index_path, *line_no, "index"))?;
        let nlines: usize = fields[2]
            .trim()
            .parse()
            .map_err(|_| bad_control_line(index_path, *line_no, "nlines"))?;
        let kind = fields[3].trim();

        let group = match tag {
            "input" => &mut inputs,
            "output" => &mut outputs,
            other => {
                return parse_failure(
                    index_path,
                    *line_no,
                    format!("unrecognized tag `{other}`, expected `input` or `output`"),
                )
            }
        };

        let samples = match kind {
            "local" => {
                let (rows, consumed) =
                    take_non_comment_rows(&lines, cursor, nlines, index_path, data_type, strictness)?;
                cursor += consumed;
                rows
            }
            "csv" => {
                let mut rows = Vec::new();
                for _ in 0..nlines {
                    if cursor >= lines.len() {
                        return parse_failure(index_path, *line_no, "unexpected end of file while reading csv references");
                    }
                    let (ref_text, ref_line_no) = &lines[cursor];
                    cursor += 1;
                    let ref_fields: Vec<&str> = ref_text.split(',').collect();
                    if ref_fields.len() != 3 {
                        return parse_failure(
                            index_path,
                            *ref_line_no,
                            "csv reference line must be `filename,from_line,num_lines`",
                        );
                    }
                    let filename = ref_fields[0].trim();
                    let from_line: usize = ref_fields[1]
                        .trim()
                        .parse()
                        .map_err(|_| bad_control_line(index_path, *ref_line_no, "from_line"))?;
                    let num_lines: usize = ref_fields[2]
                        .trim()
                        .parse()
                        .map_err(|_| bad_control_line(index_path, *ref_line_no, "num_lines"))?;

                    let referenced = resolve_referenced_path(&base_dir, filename);
                    let referenced_rows = read_referenced_rows(&referenced, from_line, num_lines)?;
                    for (row_text, row_line_no) in referenced_rows {
                        match parse_row(&row_text, data_type) {
                            Ok(row) => rows.push(row),
                            Err(reason) if strictness == Strictness::Strict => {
                                return parse_failure(&referenced, row_line_no, reason)
                            }
                            Err(reason) => {
                                log::warn!(
                                    "skipping malformed row {row_line_no} in {}: {reason}",
                                    referenced.display()
                                );
                            }
                        }
                    }
                }
                rows
            }
            other => {
                return parse_failure(
                    index_path,
                    *line_no,
                    format!("unrecognized kind `{other}`, expected `local` or `csv`"),
                )
            }
        };

        check_uniform_width(index_path, tag, index, &samples)?;
        group.insert(index, samples);
    }

    Ok(Dataset {
        inputs: into_dense(inputs),
        outputs: into_dense(outputs),
    })
}

fn read_lines(file: File) -> Result<Vec<(String, usize)>, HarnessError> {
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for (zero_based, line) in reader.lines().enumerate() {
        lines.push((line?, zero_based + 1));
    }
    Ok(lines)
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn take_non_comment_rows(
    lines: &[(String, usize)],
    start: usize,
    nlines: usize,
    source: &Path,
    data_type: DataType,
    strictness: Strictness,
) -> Result<(Vec<Vec<Element>>, usize), HarnessError> {
    let mut rows = Vec::new();
    let mut taken = 0usize;
    let mut cursor = start;
    while taken < nlines {
        if cursor >= lines.len() {
            return Err(DatasetErrorKind::ParseFailure {
                file: source.to_path_buf(),
                line: lines.last().map(|(_, n)| *n).unwrap_or(0),
                reason: "unexpected end of file while reading local data rows".to_string(),
            }
            .into());
        }
        let (text, line_no) = &lines[cursor];
        cursor += 1;
        if is_blank_or_comment(text) {
            continue;
        }
        taken += 1;
        match parse_row(text, data_type) {
            Ok(row) => rows.push(row),
            Err(reason) if strictness == Strictness::Strict => {
                return Err(DatasetErrorKind::ParseFailure {
                    file: source.to_path_buf(),
                    line: *line_no,
                    reason,
                }
                .into())
            }
            Err(reason) => {
                log::warn!("skipping malformed row {line_no} in {}: {reason}", source.display());
            }
        }
    }
    Ok((rows, cursor - start))
}

fn resolve_referenced_path(base_dir: &Path, filename: &str) -> PathBuf {
    let candidate = Path::new(filename);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

fn read_referenced_rows(
    path: &Path,
    from_line: usize,
    num_lines: usize,
) -> Result<Vec<(String, usize)>, HarnessError> {
    let file = File::open(path)?;
    let all = read_lines(file)?;
    let skip = from_line.saturating_sub(1);
    Ok(all.into_iter().skip(skip).take(num_lines).collect())
}

fn parse_row(text: &str, data_type: DataType) -> Result<Vec<Element>, String> {
    text.split(',')
        .map(|field| parse_scalar(field.trim(), data_type))
        .collect()
}

fn parse_scalar(field: &str, data_type: DataType) -> Result<Element, String> {
    match data_type {
        DataType::Int32 => field
            .parse::<i32>()
            .map(Element::Int32)
            .map_err(|e| format!("`{field}` is not a valid i32: {e}")),
        DataType::Int64 => field
            .parse::<i64>()
            .map(Element::Int64)
            .map_err(|e| format!("`{field}` is not a valid i64: {e}")),
        DataType::Float32 => field
            .parse::<f32>()
            .map(Element::Float32)
            .map_err(|e| format!("`{field}` is not a valid f32: {e}")),
        DataType::Float64 => field
            .parse::<f64>()
            .map(Element::Float64)
            .map_err(|e| format!("`{field}` is not a valid f64: {e}")),
    }
}

fn check_uniform_width(
    source: &Path,
    tag: &str,
    index: usize,
    samples: &[Vec<Element>],
) -> Result<(), HarnessError> {
    let Some(expected) = samples.first().map(Vec::len) else {
        return Ok(());
    };
    for (offset, sample) in samples.iter().enumerate() {
        if sample.len() != expected {
            return Err(DatasetErrorKind::InconsistentRowWidth {
                file: source.to_path_buf(),
                tag: tag.to_string(),
                index,
                line: offset + 1,
                found: sample.len(),
                expected,
            }
            .into());
        }
    }
    Ok(())
}

fn into_dense(mut groups: BTreeMap<usize, Vec<Vec<Element>>>) -> Vec<Vec<Vec<Element>>> {
    let mut dense = Vec::with_capacity(groups.len());
    while let Some((_, samples)) = groups.pop_first() {
        dense.push(samples);
    }
    dense
}

fn bad_control_line(path: &Path, line: usize, field: &str) -> HarnessError {
    DatasetErrorKind::ParseFailure {
        file: path.to_path_buf(),
        line,
        reason: format!("could not parse `{field}` field"),
    }
    .into()
}

fn parse_failure<T>(path: &Path, line: usize, reason: impl Into<String>) -> Result<T, HarnessError> {
    Err(DatasetErrorKind::ParseFailure {
        file: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("he-bench-test-{name}-{}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_local_rows() {
        let path = write_temp(
            "local",
            "# comment\ninput,0,2,local\n1,2,3\n4,5,6\noutput,0,1,local\n5,7,9\n",
        );
        let dataset = load_csv(&path, DataType::Int64, Strictness::Strict).unwrap();
        assert_eq!(dataset.inputs.len(), 1);
        assert_eq!(dataset.inputs[0].len(), 2);
        assert_eq!(
            dataset.inputs[0][0],
            vec![Element::Int64(1), Element::Int64(2), Element::Int64(3)]
        );
        assert_eq!(dataset.outputs[0][0], vec![Element::Int64(5), Element::Int64(7), Element::Int64(9)]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn inconsistent_row_width_fails() {
        let path = write_temp("ragged", "input,0,2,local\n1,2,3\n4,5\n");
        let err = load_csv(&path, DataType::Int64, Strictness::Strict).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::DatasetError(DatasetErrorKind::InconsistentRowWidth { .. })
        ));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loose_strictness_skips_malformed_rows() {
        let path = write_temp("loose", "input,0,2,local\n1,2,3\nnot,a,number\n");
        let dataset = load_csv(&path, DataType::Int64, Strictness::Loose).unwrap();
        assert_eq!(dataset.inputs[0].len(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn csv_reference_skips_from_line_minus_one() {
        let referenced = write_temp("ref", "0,0,0\n1,1,1\n2,2,2\n3,3,3\n");
        let index = write_temp(
            "index",
            &format!(
                "input,0,1,csv\n{},2,2\n",
                referenced.file_name().unwrap().to_string_lossy()
            ),
        );
        // Reindex the reference relative to the index file's directory.
        let sibling = index.parent().unwrap().join(referenced.file_name().unwrap());
        std::fs::rename(&referenced, &sibling).unwrap();

        let dataset = load_csv(&index, DataType::Int64, Strictness::Strict).unwrap();
        // from_line=2 (1-based) skips 1 line, so rows "1,1,1" and "2,2,2" are read.
        assert_eq!(dataset.inputs[0].len(), 2);
        assert_eq!(dataset.inputs[0][0], vec![Element::Int64(1), Element::Int64(1), Element::Int64(1)]);
        assert_eq!(dataset.inputs[0][1], vec![Element::Int64(2), Element::Int64(2), Element::Int64(2)]);

        std::fs::remove_file(&index).ok();
        std::fs::remove_file(&sibling).ok();
    }
}
