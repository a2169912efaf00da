//! Per-patient electrode dataset
//!
//! The JSON is columnar: every per-electrode property is an array of the
//! same length, and each named label-set listed in `SeizDisplay` is one more
//! column keyed by that name. Connection annotation sets are further
//! top-level columns indexed by connection.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Label-set name that reads the `intPopulation` column instead of an extra column
pub const POPULATION_LABEL_SET: &str = "intPopulation";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to decode dataset JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Column '{column}' has {found} entries, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Label-set column '{0}' is listed in SeizDisplay but missing")]
    MissingColumn(String),
    #[error("Column '{column}' is malformed: {reason}")]
    MalformedColumn { column: String, reason: String },
    #[error("Electrode id '{0}' appears more than once")]
    DuplicateId(String),
}

/// A categorical cell: MATLAB exports these as numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryValue::Int(v) => write!(f, "{}", v),
            CategoryValue::Float(v) => write!(f, "{}", v),
            CategoryValue::Text(s) => f.write_str(s),
        }
    }
}

/// Text of a cell, `None` for null
pub fn cell_text(cell: &Option<CategoryValue>) -> Option<String> {
    cell.as_ref().map(|v| v.to_string())
}

/// Raw dataset as served by the data endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectrodeDataset {
    #[serde(rename = "elecID")]
    pub elec_id: Vec<String>,
    #[serde(rename = "coorX")]
    pub coor_x: Vec<f64>,
    #[serde(rename = "coorY")]
    pub coor_y: Vec<f64>,
    #[serde(rename = "coorZ")]
    pub coor_z: Vec<f64>,
    #[serde(rename = "elecType")]
    pub elec_type: Vec<String>,
    #[serde(rename = "intPopulation")]
    pub int_population: Vec<Option<CategoryValue>>,
    #[serde(rename = "SeizDisplay")]
    pub seiz_display: Vec<String>,
    #[serde(rename = "fmapG1", default)]
    pub fmap_g1: Vec<i64>,
    #[serde(rename = "fmapG2", default)]
    pub fmap_g2: Vec<i64>,
    #[serde(rename = "subjID", default)]
    pub subj_id: String,
    #[serde(rename = "totalSeizType", default)]
    pub total_seiz_type: Option<f64>,
    /// Label-set and connection annotation columns
    #[serde(flatten)]
    pub columns: HashMap<String, serde_json::Value>,
}

impl ElectrodeDataset {
    /// Parse and validate a dataset
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        let dataset: ElectrodeDataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Number of electrodes, taken from the X coordinate column
    pub fn len(&self) -> usize {
        self.coor_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coor_x.is_empty()
    }

    /// Check column lengths, connection pairs and id uniqueness
    pub fn validate(&self) -> Result<(), DatasetError> {
        let expected = self.len();
        let lengths = [
            ("coorY", self.coor_y.len()),
            ("coorZ", self.coor_z.len()),
            ("elecID", self.elec_id.len()),
            ("elecType", self.elec_type.len()),
            ("intPopulation", self.int_population.len()),
        ];
        for (column, found) in lengths {
            check_length(column, expected, found)?;
        }

        // Connection endpoints are read pairwise
        check_length("fmapG2", self.fmap_g1.len(), self.fmap_g2.len())?;

        for name in &self.seiz_display {
            let values = self.label_set(name)?;
            check_length(name, expected, values.len())?;
        }

        let mut seen = HashSet::new();
        if let Some(id) = self.elec_id.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(DatasetError::DuplicateId(id.clone()));
        }

        Ok(())
    }

    /// Names of the label-sets, in dataset order
    pub fn label_set_names(&self) -> &[String] {
        &self.seiz_display
    }

    /// The label-set selected when a dataset is first shown
    pub fn default_label_set(&self) -> Option<&str> {
        self.seiz_display.first().map(String::as_str)
    }

    /// Per-electrode text of a label-set column
    pub fn label_set(&self, name: &str) -> Result<Vec<Option<String>>, DatasetError> {
        if name == POPULATION_LABEL_SET {
            return Ok(self.int_population.iter().map(cell_text).collect());
        }
        let value = self
            .columns
            .get(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        parse_text_column(name, value)
    }

    /// Per-connection captions of an annotation set, `None` if absent
    pub fn caption_set(&self, name: &str) -> Option<Vec<Option<String>>> {
        let value = self.columns.get(name)?;
        parse_text_column(name, value).ok()
    }

    /// Columns that look like connection annotation sets
    ///
    /// Anything left over after the known fields and the label-sets whose
    /// cells are all text, numbers or null.
    pub fn caption_set_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .columns
            .iter()
            .filter(|(name, _)| !self.seiz_display.contains(name))
            .filter(|(name, value)| value.is_array() && parse_text_column(name, value).is_ok())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

fn check_length(column: &str, expected: usize, found: usize) -> Result<(), DatasetError> {
    if expected != found {
        return Err(DatasetError::ColumnLength {
            column: column.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn parse_text_column(
    name: &str,
    value: &serde_json::Value,
) -> Result<Vec<Option<String>>, DatasetError> {
    let cells: Vec<Option<CategoryValue>> =
        serde_json::from_value(value.clone()).map_err(|e| DatasetError::MalformedColumn {
            column: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(cells.iter().map(cell_text).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Four electrodes, two label-sets, two connections, one annotation set
    pub(crate) const SAMPLE: &str = r#"{
        "subjID": "NY123",
        "totalSeizType": 2,
        "elecID": ["G01", "G02", "D1", "S4"],
        "coorX": [10.0, -20.5, 0.0, 127.5],
        "coorY": [0.0, 5.0, -5.0, -127.5],
        "coorZ": [1.2, 2.6, -3.4, 0.0],
        "elecType": ["G", "EG", "D", "MG"],
        "intPopulation": [0, 2, "3", null],
        "SeizDisplay": ["SeizType1", "SeizType2"],
        "SeizType1": ["Onset", "early spread", "", null],
        "SeizType2": ["late spread", "Onset", "rapid spread", "onset"],
        "fmapG1": [1, 3],
        "fmapG2": [2, 4],
        "motor": ["hand", null, null, null],
        "language": ["", "naming", null, null]
    }"#;

    #[test]
    fn test_parse_sample() {
        let ds = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.subj_id, "NY123");
        assert_eq!(ds.total_seiz_type, Some(2.0));
        assert_eq!(ds.default_label_set(), Some("SeizType1"));
        assert_eq!(
            ds.label_set("SeizType1").unwrap(),
            vec![
                Some("Onset".to_string()),
                Some("early spread".to_string()),
                Some(String::new()),
                None
            ]
        );
    }

    #[test]
    fn test_population_as_label_set() {
        let ds = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let pop = ds.label_set(POPULATION_LABEL_SET).unwrap();
        assert_eq!(
            pop,
            vec![
                Some("0".to_string()),
                Some("2".to_string()),
                Some("3".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_caption_sets() {
        let ds = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        assert_eq!(ds.caption_set_names(), vec!["language", "motor"]);
        let motor = ds.caption_set("motor").unwrap();
        assert_eq!(motor[0].as_deref(), Some("hand"));
        assert!(ds.caption_set("sensory").is_none());
    }

    #[test]
    fn test_mismatched_column_is_rejected() {
        let json = SAMPLE.replace(r#""coorZ": [1.2, 2.6, -3.4, 0.0]"#, r#""coorZ": [1.2, 2.6]"#);
        match ElectrodeDataset::from_json_str(&json) {
            Err(DatasetError::ColumnLength {
                column,
                expected,
                found,
            }) => {
                assert_eq!(column, "coorZ");
                assert_eq!(expected, 4);
                assert_eq!(found, 2);
            }
            other => panic!("expected length error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_label_set_column() {
        let json = SAMPLE.replace(
            r#""SeizDisplay": ["SeizType1", "SeizType2"]"#,
            r#""SeizDisplay": ["SeizType1", "SeizType3"]"#,
        );
        let err = ElectrodeDataset::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(name) if name == "SeizType3"));
    }

    #[test]
    fn test_unpaired_connection_endpoints_rejected() {
        let json = SAMPLE.replace(r#""fmapG2": [2, 4]"#, r#""fmapG2": [2]"#);
        match ElectrodeDataset::from_json_str(&json) {
            Err(DatasetError::ColumnLength {
                column,
                expected,
                found,
            }) => {
                assert_eq!(column, "fmapG2");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected length error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_electrode_id_rejected() {
        let json = SAMPLE.replace(
            r#""elecID": ["G01", "G02", "D1", "S4"]"#,
            r#""elecID": ["G01", "G02", "D1", "G02"]"#,
        );
        let err = ElectrodeDataset::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(id) if id == "G02"));
    }

    #[test]
    fn test_missing_coordinate_column() {
        let json = SAMPLE.replace(r#""coorY": [0.0, 5.0, -5.0, -127.5],"#, "");
        let err = ElectrodeDataset::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DatasetError::Decode(_)));
    }
}
