//! Electrode and connection entities
//!
//! Turns the columnar dataset into one record per electrode and one per
//! functional-mapping connection.

use tracing::debug;

use crate::dataset::{cell_text, DatasetError, ElectrodeDataset};
use crate::interval::{map_interval, round_half_up};

/// Physical extent of the volume along each axis, in scanner coordinates
pub const SCANNER_RANGE: (f64, f64) = (-127.5, 127.5);

/// Slice index range of the volume along each axis
pub const SLICE_RANGE: (f64, f64) = (0.0, 255.0);

/// Electrode types drawn as small grid/strip contacts
pub const SMALL_KINDS: [&str; 2] = ["EG", "MG"];

#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeEntity {
    pub id: String,
    /// Coordinates with the bounding-box offset applied
    pub position: [f64; 3],
    pub slice_index: [u32; 3],
    pub kind: String,
    pub population_label: Option<String>,
    /// Value from the default label-set
    pub seizure_label: Option<String>,
    pub visible: bool,
}

impl ElectrodeEntity {
    pub fn is_small(&self) -> bool {
        SMALL_KINDS.contains(&self.kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEntity {
    /// 0-based index of the start electrode
    pub start: usize,
    /// 0-based index of the end electrode
    pub end: usize,
    pub label: Option<String>,
}

/// Slice index of a raw (un-offset) scanner coordinate.
///
/// Coordinates outside the scanner extent land on the first or last slice.
pub fn slice_index(coordinate: f64) -> u32 {
    let (first, last) = SLICE_RANGE;
    round_half_up(map_interval(coordinate, SCANNER_RANGE, SLICE_RANGE)).clamp(first, last) as u32
}

/// Build one entity per electrode in the dataset.
///
/// `offset` is added to every coordinate; slice indices are derived from the
/// coordinate before the offset.
pub fn build_electrodes(
    dataset: &ElectrodeDataset,
    offset: [f64; 3],
) -> Result<Vec<ElectrodeEntity>, DatasetError> {
    dataset.validate()?;

    let seizure_labels = match dataset.default_label_set() {
        Some(name) => dataset.label_set(name)?,
        None => vec![None; dataset.len()],
    };

    let electrodes: Vec<ElectrodeEntity> = (0..dataset.len())
        .map(|index| {
            let raw = [
                dataset.coor_x[index],
                dataset.coor_y[index],
                dataset.coor_z[index],
            ];
            let position = [raw[0] + offset[0], raw[1] + offset[1], raw[2] + offset[2]];
            let slice_index = [
                slice_index(position[0] - offset[0]),
                slice_index(position[1] - offset[1]),
                slice_index(position[2] - offset[2]),
            ];

            ElectrodeEntity {
                id: dataset.elec_id[index].clone(),
                position,
                slice_index,
                kind: dataset.elec_type[index].clone(),
                population_label: cell_text(&dataset.int_population[index]),
                seizure_label: seizure_labels[index].clone(),
                visible: true,
            }
        })
        .collect();

    debug!("Built {} electrode entities", electrodes.len());
    Ok(electrodes)
}

/// Build connections from the 1-based `fmapG1`/`fmapG2` index pairs.
///
/// Pairs with an endpoint outside the electrode set are skipped.
pub fn build_connections(
    dataset: &ElectrodeDataset,
    electrodes: &[ElectrodeEntity],
) -> Vec<ConnectionEntity> {
    let to_index = |one_based: i64| -> Option<usize> {
        let index = usize::try_from(one_based).ok()?.checked_sub(1)?;
        (index < electrodes.len()).then_some(index)
    };

    let connections: Vec<ConnectionEntity> = dataset
        .fmap_g1
        .iter()
        .zip(dataset.fmap_g2.iter())
        .filter_map(|(&start, &end)| match (to_index(start), to_index(end)) {
            (Some(start), Some(end)) => Some(ConnectionEntity {
                start,
                end,
                label: None,
            }),
            _ => {
                debug!("Dropping connection {} -> {}: endpoint out of range", start, end);
                None
            }
        })
        .collect();

    debug!(
        "Built {} connections from {} pairs",
        connections.len(),
        dataset.fmap_g1.len()
    );
    connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::SAMPLE;

    fn sample() -> ElectrodeDataset {
        ElectrodeDataset::from_json_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_offset_applies_to_position_only() {
        let ds = sample();
        let electrodes = build_electrodes(&ds, [10.0, 0.0, 0.0]).unwrap();
        assert_eq!(electrodes.len(), 4);

        let first = &electrodes[0];
        assert_eq!(first.position[0], ds.coor_x[0] + 10.0);
        let expected = map_interval(ds.coor_x[0], SCANNER_RANGE, SLICE_RANGE).round() as u32;
        assert_eq!(first.slice_index[0], expected);
        assert_eq!(first.slice_index[0], 138);
    }

    #[test]
    fn test_slice_index_extremes() {
        let ds = sample();
        let electrodes = build_electrodes(&ds, [0.0, 0.0, 0.0]).unwrap();
        // S4 sits on the far X face and near Y face
        assert_eq!(electrodes[3].slice_index, [255, 0, 128]);
        assert_eq!(slice_index(0.0), 128);
    }

    #[test]
    fn test_slice_index_clamped_outside_scanner() {
        assert_eq!(slice_index(127.9), 255);
        assert_eq!(slice_index(200.0), 255);
        assert_eq!(slice_index(-128.0), 0);
        assert_eq!(slice_index(-400.0), 0);
    }

    #[test]
    fn test_labels_and_kinds() {
        let electrodes = build_electrodes(&sample(), [0.0; 3]).unwrap();
        assert_eq!(electrodes[0].seizure_label.as_deref(), Some("Onset"));
        assert_eq!(electrodes[3].seizure_label, None);
        assert_eq!(electrodes[2].population_label.as_deref(), Some("3"));
        assert!(!electrodes[0].is_small());
        assert!(electrodes[1].is_small());
        assert!(electrodes[3].is_small());
        assert!(electrodes.iter().all(|e| e.visible));
    }

    #[test]
    fn test_out_of_range_connection_dropped() {
        let mut ds = sample();
        ds.fmap_g1 = vec![1, 5];
        ds.fmap_g2 = vec![2, 99];
        let electrodes = build_electrodes(&ds, [0.0; 3]).unwrap();
        let connections = build_connections(&ds, &electrodes);
        assert_eq!(
            connections,
            vec![ConnectionEntity {
                start: 0,
                end: 1,
                label: None
            }]
        );
    }

    #[test]
    fn test_zero_index_connection_dropped() {
        let mut ds = sample();
        ds.fmap_g1 = vec![0, 4];
        ds.fmap_g2 = vec![1, 3];
        let electrodes = build_electrodes(&ds, [0.0; 3]).unwrap();
        let connections = build_connections(&ds, &electrodes);
        assert_eq!(connections.len(), 1);
        assert_eq!((connections[0].start, connections[0].end), (3, 2));
    }
}
