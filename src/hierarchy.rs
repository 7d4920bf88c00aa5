// 🌳 Hierarchy Catalog - DRE dimension table
//
// Maps (cost center, account, hierarchy node) to the rollup label, level and
// display order used by the report. Loaded once per session, never mutated.

use crate::error::{DreError, DreResult};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Principal group flag selecting the rows that belong to the DRE report.
pub const PRINCIPAL_GROUP_DRG: &str = "DRG";

// ============================================================================
// HIERARCHY NODE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    #[serde(rename = "cd_centro_custo_dre")]
    pub cost_center_code: String,

    #[serde(rename = "cd_conta_contabil_dre")]
    pub account_code: String,

    /// Surrogate key of the (account, rollup path) pair
    #[serde(rename = "sk_hierarquia_dre")]
    pub hierarchy_key: String,

    /// Rollup depth, 1 is the coarsest level
    #[serde(rename = "id_nivel_dre", deserialize_with = "lenient_integer")]
    pub level_id: i64,

    #[serde(rename = "ds_grupo_nivel_dre")]
    pub group_label: String,

    #[serde(rename = "sg_grupo_principal_dre")]
    pub principal_group_flag: String,

    #[serde(rename = "id_ordem_prm", deserialize_with = "lenient_integer")]
    pub display_order: i64,
}

impl HierarchyNode {
    pub fn is_principal_group(&self) -> bool {
        self.principal_group_flag == PRINCIPAL_GROUP_DRG
    }

    pub fn matches(&self, account_code: &str, hierarchy_key: &str) -> bool {
        self.account_code == account_code && self.hierarchy_key == hierarchy_key
    }
}

/// Accept integer columns exported as "3", " 3 " or "3.0".
fn lenient_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_integer(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid integer '{}'", raw)))
}

pub(crate) fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Some(value as i64),
        _ => None,
    }
}

// ============================================================================
// HIERARCHY CATALOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct HierarchyCatalog {
    nodes: Vec<HierarchyNode>,
    fingerprint: String,
}

impl HierarchyCatalog {
    pub fn from_nodes(nodes: Vec<HierarchyNode>) -> Self {
        let fingerprint = compute_fingerprint(&nodes);
        warn_duplicate_join_keys(&nodes);
        HierarchyCatalog { nodes, fingerprint }
    }

    /// Load the hierarchy dataset.
    ///
    /// CSV files are always accepted. Parquet files, or a directory of
    /// Parquet part files, need the `columnar` feature.
    pub fn load(path: &Path) -> DreResult<Self> {
        let nodes = if is_parquet_source(path) {
            load_parquet(path)?
        } else {
            load_csv(path)?
        };

        info!(
            path = %path.display(),
            rows = nodes.len(),
            "Loaded hierarchy catalog"
        );

        Ok(Self::from_nodes(nodes))
    }

    /// Load the dataset, falling back to `previous` when the read fails.
    pub fn load_or_keep(path: &Path, previous: Option<&HierarchyCatalog>) -> DreResult<Self> {
        match Self::load(path) {
            Ok(catalog) => Ok(catalog),
            Err(err) => match previous {
                Some(catalog) => {
                    warn!(error = %err, "Hierarchy reload failed, keeping in-memory catalog");
                    Ok(catalog.clone())
                }
                None => Err(err),
            },
        }
    }

    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// SHA-256 digest of the catalog content, used as its version.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn distinct_cost_centers(&self) -> Vec<&str> {
        sorted_unique(self.nodes.iter().map(|n| n.cost_center_code.as_str()))
    }

    pub fn distinct_accounts(&self) -> Vec<&str> {
        sorted_unique(self.nodes.iter().map(|n| n.account_code.as_str()))
    }

    pub fn hierarchy_keys_for(&self, cost_center: &str, account: &str) -> Vec<&str> {
        sorted_unique(
            self.nodes
                .iter()
                .filter(|n| n.cost_center_code == cost_center && n.account_code == account)
                .map(|n| n.hierarchy_key.as_str()),
        )
    }

    /// Group label of the first row matching the join key
    pub fn label_for(&self, account: &str, hierarchy_key: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.matches(account, hierarchy_key))
            .map(|n| n.group_label.as_str())
    }

    pub fn contains_key(&self, account: &str, hierarchy_key: &str) -> bool {
        self.nodes.iter().any(|n| n.matches(account, hierarchy_key))
    }
}

/// Codes made only of digits compare numerically, everything else as text.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut unique: Vec<&str> = values.collect::<BTreeSet<_>>().into_iter().collect();
    unique.sort_by(|a, b| compare_codes(a, b));
    unique
}

fn compute_fingerprint(nodes: &[HierarchyNode]) -> String {
    let mut hasher = Sha256::new();
    for node in nodes {
        hasher.update(format!(
            "{}\x1f{}\x1f{}\x1f{}\x1f{}\x1f{}\x1f{}\x1e",
            node.cost_center_code,
            node.account_code,
            node.hierarchy_key,
            node.level_id,
            node.group_label,
            node.principal_group_flag,
            node.display_order
        ));
    }
    format!("{:x}", hasher.finalize())
}

fn warn_duplicate_join_keys(nodes: &[HierarchyNode]) {
    let mut seen = HashSet::new();
    let duplicates = nodes
        .iter()
        .filter(|n| !seen.insert((n.account_code.as_str(), n.hierarchy_key.as_str())))
        .count();

    if duplicates > 0 {
        warn!(
            duplicates,
            "Hierarchy catalog repeats (account, hierarchy key) pairs; each row joins independently"
        );
    }
}

// ============================================================================
// LOADERS
// ============================================================================

fn is_parquet_source(path: &Path) -> bool {
    path.is_dir()
        || path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("parquet"))
            .unwrap_or(false)
}

/// Pick `;` or `,` from the header line.
fn sniff_delimiter(header: &str) -> u8 {
    if header.matches(';').count() >= header.matches(',').count() && header.contains(';') {
        b';'
    } else {
        b','
    }
}

fn load_csv(path: &Path) -> DreResult<Vec<HierarchyNode>> {
    let source = path.display().to_string();

    let file = File::open(path).map_err(|e| DreError::data_unavailable(&source, e))?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .map_err(|e| DreError::data_unavailable(&source, e))?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&header))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DreError::data_unavailable(&source, e))?;

    let mut nodes = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        let node: HierarchyNode = result.map_err(|e| {
            DreError::data_unavailable(&source, format!("row {}: {}", index + 1, e))
        })?;
        nodes.push(node);
    }

    Ok(nodes)
}

#[cfg(feature = "columnar")]
fn load_parquet(path: &Path) -> DreResult<Vec<HierarchyNode>> {
    columnar::load(path)
}

#[cfg(not(feature = "columnar"))]
fn load_parquet(path: &Path) -> DreResult<Vec<HierarchyNode>> {
    Err(DreError::data_unavailable(
        path.display().to_string(),
        "parquet input requires the `columnar` feature",
    ))
}

#[cfg(feature = "columnar")]
mod columnar {
    use super::{parse_integer, HierarchyNode};
    use crate::error::{DreError, DreResult};
    use arrow::array::{Array, ArrayRef, StringArray};
    use arrow::compute::cast;
    use arrow::datatypes::DataType;
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};

    const COLUMNS: [&str; 7] = [
        "cd_centro_custo_dre",
        "cd_conta_contabil_dre",
        "sk_hierarquia_dre",
        "id_nivel_dre",
        "ds_grupo_nivel_dre",
        "sg_grupo_principal_dre",
        "id_ordem_prm",
    ];

    pub(super) fn load(path: &Path) -> DreResult<Vec<HierarchyNode>> {
        let source = path.display().to_string();
        let mut nodes = Vec::new();

        for file_path in part_files(path).map_err(|e| DreError::data_unavailable(&source, e))? {
            let file = File::open(&file_path).map_err(|e| DreError::data_unavailable(&source, e))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .and_then(|builder| builder.build())
                .map_err(|e| DreError::data_unavailable(&source, e))?;

            for batch in reader {
                let batch = batch.map_err(|e| DreError::data_unavailable(&source, e))?;
                decode_batch(&batch, &mut nodes).map_err(|e| DreError::data_unavailable(&source, e))?;
            }
        }

        Ok(nodes)
    }

    /// Spark writes a directory of `part-*.parquet` files.
    fn part_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
        if !path.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("parquet"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray, String> {
        let index = batch
            .schema()
            .index_of(name)
            .map_err(|_| format!("column '{}' missing from parquet schema", name))?;
        let column: ArrayRef = cast(batch.column(index), &DataType::Utf8).map_err(|e| e.to_string())?;
        column
            .as_any()
            .downcast_ref::<StringArray>()
            .cloned()
            .ok_or_else(|| format!("column '{}' is not text-convertible", name))
    }

    fn decode_batch(batch: &RecordBatch, nodes: &mut Vec<HierarchyNode>) -> Result<(), String> {
        let columns = COLUMNS
            .iter()
            .map(|name| string_column(batch, name))
            .collect::<Result<Vec<_>, _>>()?;

        let text = |col: usize, row: usize| -> String {
            let array = &columns[col];
            if array.is_null(row) {
                String::new()
            } else {
                array.value(row).to_string()
            }
        };

        for row in 0..batch.num_rows() {
            // Numbered across batches and part files, like the CSV loader
            let line = nodes.len() + 1;
            let level = parse_integer(&text(3, row))
                .ok_or_else(|| format!("row {}: invalid integer '{}' in {}", line, text(3, row), COLUMNS[3]))?;
            let order = parse_integer(&text(6, row))
                .ok_or_else(|| format!("row {}: invalid integer '{}' in {}", line, text(6, row), COLUMNS[6]))?;

            nodes.push(HierarchyNode {
                cost_center_code: text(0, row),
                account_code: text(1, row),
                hierarchy_key: text(2, row),
                level_id: level,
                group_label: text(4, row),
                principal_group_flag: text(5, row),
                display_order: order,
            });
        }

        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use crate::hierarchy::HierarchyCatalog;
        use super::COLUMNS;
        use crate::error::DreError;
        use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;
        use std::fs::File;
        use std::path::Path;
        use std::sync::Arc;

        // (cost center, account, key, level, label, flag, order)
        type Row<'a> = (&'a str, &'a str, &'a str, Option<f64>, &'a str, &'a str, i64);

        fn write_part(path: &Path, rows: &[Row]) {
            let schema = Arc::new(Schema::new(vec![
                Field::new(COLUMNS[0], DataType::Utf8, false),
                Field::new(COLUMNS[1], DataType::Utf8, false),
                Field::new(COLUMNS[2], DataType::Utf8, false),
                Field::new(COLUMNS[3], DataType::Float64, true),
                Field::new(COLUMNS[4], DataType::Utf8, false),
                Field::new(COLUMNS[5], DataType::Utf8, false),
                Field::new(COLUMNS[6], DataType::Int64, false),
            ]));
            let columns: Vec<ArrayRef> = vec![
                Arc::new(StringArray::from(rows.iter().map(|r| r.0).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
                Arc::new(Float64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.4).collect::<Vec<_>>())),
                Arc::new(StringArray::from(rows.iter().map(|r| r.5).collect::<Vec<_>>())),
                Arc::new(Int64Array::from(rows.iter().map(|r| r.6).collect::<Vec<_>>())),
            ];
            let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

            let mut writer = ArrowWriter::try_new(File::create(path).unwrap(), schema, None).unwrap();
            writer.write(&batch).unwrap();
            writer.close().unwrap();
        }

        #[test]
        fn test_load_single_parquet_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("hierarquia.parquet");
            write_part(
                &path,
                &[
                    ("CC1", "A1", "H1", Some(1.0), "Receita", "DRG", 1),
                    ("CC1", "A2", "H2", Some(2.0), "Custos", "DRG", 2),
                ],
            );

            let catalog = HierarchyCatalog::load(&path).unwrap();

            assert_eq!(catalog.len(), 2);
            assert_eq!(catalog.nodes()[0].level_id, 1);
            assert_eq!(catalog.nodes()[1].level_id, 2);
            assert_eq!(catalog.nodes()[1].display_order, 2);
            assert_eq!(catalog.label_for("A2", "H2"), Some("Custos"));
        }

        #[test]
        fn test_load_part_file_directory_in_name_order() {
            let dir = tempfile::tempdir().unwrap();
            write_part(
                &dir.path().join("part-00001.parquet"),
                &[("CC2", "A2", "H2", Some(1.0), "Custos", "DRG", 2)],
            );
            write_part(
                &dir.path().join("part-00000.parquet"),
                &[("CC1", "A1", "H1", Some(1.0), "Receita", "DRG", 1)],
            );
            std::fs::write(dir.path().join("_SUCCESS"), "").unwrap();

            let catalog = HierarchyCatalog::load(dir.path()).unwrap();

            let keys: Vec<&str> = catalog.nodes().iter().map(|n| n.hierarchy_key.as_str()).collect();
            assert_eq!(keys, vec!["H1", "H2"]);
        }

        #[test]
        fn test_row_without_level_is_data_unavailable() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("hierarquia.parquet");
            write_part(
                &path,
                &[
                    ("CC1", "A1", "H1", Some(1.0), "Receita", "DRG", 1),
                    ("CC1", "A2", "H2", None, "Custos", "DRG", 2),
                ],
            );

            let err = HierarchyCatalog::load(&path).unwrap_err();

            assert!(matches!(err, DreError::DataUnavailable { .. }));
            assert!(err.to_string().contains("row 2"));
        }

        #[test]
        fn test_fractional_level_is_data_unavailable() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("hierarquia.parquet");
            write_part(&path, &[("CC1", "A1", "H1", Some(1.5), "Receita", "DRG", 1)]);

            assert!(HierarchyCatalog::load(&path).is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn node(
        cost_center: &str,
        account: &str,
        key: &str,
        level: i64,
        label: &str,
        flag: &str,
        order: i64,
    ) -> HierarchyNode {
        HierarchyNode {
            cost_center_code: cost_center.to_string(),
            account_code: account.to_string(),
            hierarchy_key: key.to_string(),
            level_id: level,
            group_label: label.to_string(),
            principal_group_flag: flag.to_string(),
            display_order: order,
        }
    }

    fn sample_catalog() -> HierarchyCatalog {
        HierarchyCatalog::from_nodes(vec![
            node("CC2", "A1", "H1", 1, "Receita", "DRG", 1),
            node("CC1", "A1", "H2", 2, "Receita Bruta", "DRG", 2),
            node("CC1", "A1", "H10", 2, "Receita Líquida", "DRG", 3),
            node("CC1", "A2", "H3", 1, "Custos", "DRG", 4),
            node("10", "A2", "H3", 1, "Custos", "DRG", 4),
            node("9", "A3", "H4", 1, "Outros", "OUT", 5),
        ])
    }

    #[test]
    fn test_distinct_cost_centers_sorted_numeric_aware() {
        let catalog = sample_catalog();
        assert_eq!(catalog.distinct_cost_centers(), vec!["9", "10", "CC1", "CC2"]);
    }

    #[test]
    fn test_distinct_accounts() {
        let catalog = sample_catalog();
        assert_eq!(catalog.distinct_accounts(), vec!["A1", "A2", "A3"]);
    }

    #[test]
    fn test_hierarchy_keys_for_filters_by_both_codes() {
        let catalog = sample_catalog();
        assert_eq!(catalog.hierarchy_keys_for("CC1", "A1"), vec!["H10", "H2"]);
        assert_eq!(catalog.hierarchy_keys_for("CC2", "A1"), vec!["H1"]);
        assert!(catalog.hierarchy_keys_for("CC2", "A3").is_empty());
    }

    #[test]
    fn test_label_for_first_match() {
        let catalog = sample_catalog();
        assert_eq!(catalog.label_for("A2", "H3"), Some("Custos"));
        assert_eq!(catalog.label_for("A2", "H99"), None);
        assert!(catalog.contains_key("A1", "H10"));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = sample_catalog();
        let b = sample_catalog();
        let c = HierarchyCatalog::from_nodes(vec![node("CC1", "A1", "H1", 1, "Receita", "DRG", 1)]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_parse_integer_lenient() {
        assert_eq!(parse_integer("3"), Some(3));
        assert_eq!(parse_integer(" 3.0 "), Some(3));
        assert_eq!(parse_integer("3.5"), None);
        assert_eq!(parse_integer("x"), None);
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n"), b';');
        assert_eq!(sniff_delimiter("a,b,c\n"), b',');
        assert_eq!(sniff_delimiter("single\n"), b',');
    }

    #[test]
    fn test_load_csv_semicolon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarquia.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "cd_centro_custo_dre;cd_conta_contabil_dre;sk_hierarquia_dre;id_nivel_dre;ds_grupo_nivel_dre;sg_grupo_principal_dre;id_ordem_prm"
        )
        .unwrap();
        writeln!(file, "CC1;A1;H1;1;Receita, Bruta;DRG;1").unwrap();
        writeln!(file, "CC1;A2;H2;2.0;Custos;DRG;2").unwrap();
        drop(file);

        let catalog = HierarchyCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.nodes()[0].group_label, "Receita, Bruta");
        assert_eq!(catalog.nodes()[1].level_id, 2);
    }

    #[test]
    fn test_load_missing_file_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = HierarchyCatalog::load(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(DreError::DataUnavailable { .. })));
    }

    #[test]
    fn test_load_corrupt_row_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarquia.csv");
        std::fs::write(
            &path,
            "cd_centro_custo_dre;cd_conta_contabil_dre;sk_hierarquia_dre;id_nivel_dre;ds_grupo_nivel_dre;sg_grupo_principal_dre;id_ordem_prm\nCC1;A1;H1;um;Receita;DRG;1\n",
        )
        .unwrap();

        let err = HierarchyCatalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_load_or_keep_falls_back_to_previous() {
        let dir = tempfile::tempdir().unwrap();
        let previous = sample_catalog();

        let kept = HierarchyCatalog::load_or_keep(&dir.path().join("missing.csv"), Some(&previous)).unwrap();
        assert_eq!(kept.fingerprint(), previous.fingerprint());

        let failed = HierarchyCatalog::load_or_keep(&dir.path().join("missing.csv"), None);
        assert!(failed.is_err());
    }
}
