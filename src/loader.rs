//! Load orchestration
//!
//! Electrodes may only be attached once the renderer reports its volume and
//! mesh assets ready. [`Bootstrap`] enforces that ordering and wires a
//! dataset into a [`SceneSync`].

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::dataset::{DatasetError, ElectrodeDataset, POPULATION_LABEL_SET};
use crate::ports::{ControlPanel, MenuOptions, SceneView};
use crate::scene::{SceneData, SceneSync, FUNCTIONAL_MAPPING, NO_CONNECTION_SET, NO_ELECTRODE};
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Scene assets are not loaded yet")]
    AssetsNotReady,
    #[error("Electrodes are already attached")]
    AlreadyAttached,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    AwaitingAssets,
    AssetsReady,
    Attached,
}

pub struct Bootstrap {
    phase: LoadPhase,
    offset: [f64; 3],
    connection_sets: Vec<String>,
}

impl Bootstrap {
    pub fn new(config: &Config) -> Self {
        Self {
            phase: LoadPhase::AwaitingAssets,
            offset: config.bounding_box_offset,
            connection_sets: config.connection_sets.clone(),
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// One-shot signal from the renderer that volume and meshes are loaded
    pub fn assets_ready(&mut self) {
        if self.phase == LoadPhase::AwaitingAssets {
            info!("Scene assets ready");
            self.phase = LoadPhase::AssetsReady;
        } else {
            debug!("Repeated assets-ready signal ignored");
        }
    }

    /// Build the scene for `dataset` and hand it the ports
    pub fn attach<P: ControlPanel, V: SceneView>(
        &mut self,
        dataset: &ElectrodeDataset,
        mut panel: P,
        view: V,
    ) -> Result<SceneSync<P, V>, LoadError> {
        match self.phase {
            LoadPhase::AwaitingAssets => return Err(LoadError::AssetsNotReady),
            LoadPhase::Attached => return Err(LoadError::AlreadyAttached),
            LoadPhase::AssetsReady => {}
        }

        let data = SceneData::from_dataset(dataset, self.offset, &self.connection_sets)?;
        info!(
            "Attaching subject '{}': {} electrodes, {} connections",
            data.subject_id,
            data.electrodes.len(),
            data.connections.len()
        );

        panel.show_subject(&data.subject_id, &data.total_seizure_types);
        panel.populate_menus(&menu_options(&data));

        self.phase = LoadPhase::Attached;
        Ok(SceneSync::new(data, panel, view))
    }
}

/// Menu entries for a loaded scene, sentinels included.
///
/// The population label-set is always offered, after the dataset's own.
pub fn menu_options(data: &SceneData) -> MenuOptions {
    MenuOptions {
        electrodes: std::iter::once(NO_ELECTRODE.to_string())
            .chain(data.electrodes.iter().map(|e| e.id.clone()))
            .collect(),
        label_sets: data
            .label_set_names
            .iter()
            .cloned()
            .chain(
                (!data.label_set_names.iter().any(|n| n == POPULATION_LABEL_SET))
                    .then(|| POPULATION_LABEL_SET.to_string()),
            )
            .chain(std::iter::once(FUNCTIONAL_MAPPING.to_string()))
            .collect(),
        connection_sets: std::iter::once(NO_CONNECTION_SET.to_string())
            .chain(data.caption_set_names.iter().cloned())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::SAMPLE;
    use crate::scene::tests::{RecordingPanel, RecordingView};
    use crate::scene::SelectOutcome;

    const TWO_ELECTRODES: &str = r#"{
        "subjID": "UMB01",
        "totalSeizType": 1,
        "elecID": ["A1", "A2"],
        "coorX": [1.0, 2.0],
        "coorY": [3.0, 4.0],
        "coorZ": [5.0, 6.0],
        "elecType": ["D", "D"],
        "intPopulation": [1, 1],
        "SeizDisplay": ["SeizType1"],
        "SeizType1": ["onset", "late spread"],
        "fmapG1": [1],
        "fmapG2": [2]
    }"#;

    #[test]
    fn test_attach_requires_assets() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let mut boot = Bootstrap::new(&Config::default());
        let result = boot.attach(&dataset, RecordingPanel::default(), RecordingView::default());
        assert!(matches!(result, Err(LoadError::AssetsNotReady)));
        assert_eq!(boot.phase(), LoadPhase::AwaitingAssets);
    }

    #[test]
    fn test_attach_once() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let mut boot = Bootstrap::new(&Config::default());
        boot.assets_ready();
        boot.assets_ready();
        assert_eq!(boot.phase(), LoadPhase::AssetsReady);
        assert!(boot
            .attach(&dataset, RecordingPanel::default(), RecordingView::default())
            .is_ok());
        assert_eq!(boot.phase(), LoadPhase::Attached);
        let again = boot.attach(&dataset, RecordingPanel::default(), RecordingView::default());
        assert!(matches!(again, Err(LoadError::AlreadyAttached)));
    }

    #[test]
    fn test_attach_populates_panel() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let mut boot = Bootstrap::new(&Config::default());
        boot.assets_ready();
        let sync = boot
            .attach(&dataset, RecordingPanel::default(), RecordingView::default())
            .unwrap();
        let panel = sync.panel();
        assert_eq!(panel.subject, Some(("NY123".to_string(), "2".to_string())));
        assert_eq!(panel.options.electrodes, vec!["None", "G01", "G02", "D1", "S4"]);
        assert_eq!(
            panel.options.label_sets,
            vec!["SeizType1", "SeizType2", "intPopulation", "funMapping"]
        );
        assert_eq!(
            panel.options.connection_sets,
            vec!["none", "language", "motor"]
        );
    }

    #[test]
    fn test_population_listed_once() {
        let json = SAMPLE.replace(
            r#""SeizDisplay": ["SeizType1", "SeizType2"]"#,
            r#""SeizDisplay": ["intPopulation", "SeizType1"]"#,
        );
        let dataset = ElectrodeDataset::from_json_str(&json).unwrap();
        let data = SceneData::from_dataset(&dataset, [0.0; 3], &[]).unwrap();
        assert_eq!(
            menu_options(&data).label_sets,
            vec!["intPopulation", "SeizType1", "funMapping"]
        );
    }

    #[test]
    fn test_population_menu_entry_recolors() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let mut boot = Bootstrap::new(&Config::default());
        boot.assets_ready();
        let mut sync = boot
            .attach(&dataset, RecordingPanel::default(), RecordingView::default())
            .unwrap();
        assert!(sync
            .panel()
            .options
            .label_sets
            .contains(&POPULATION_LABEL_SET.to_string()));

        sync.change_label_set(POPULATION_LABEL_SET);
        let colors: Vec<_> = sync.primitives().electrodes.iter().map(|p| p.color).collect();
        assert_eq!(
            colors,
            vec![[1.0, 1.0, 1.0], [0.0, 0.0, 0.9], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]
        );
    }

    #[test]
    fn test_two_electrode_scene() {
        let dataset = ElectrodeDataset::from_json_str(TWO_ELECTRODES).unwrap();
        let mut boot = Bootstrap::new(&Config::default());
        boot.assets_ready();
        let mut sync = boot
            .attach(&dataset, RecordingPanel::default(), RecordingView::default())
            .unwrap();

        let primitives = sync.primitives();
        assert_eq!(primitives.electrodes.len(), 2);
        assert_eq!(primitives.electrode_highlights.len(), 2);
        assert_eq!(primitives.connections.len(), 1);
        assert_eq!(primitives.connection_highlights.len(), 1);
        assert!(primitives.electrodes.iter().all(|p| p.visible));
        assert!(primitives.electrode_highlights.iter().all(|p| !p.visible));
        assert!(!primitives.connections[0].visible);
        assert!(!primitives.connection_highlights[0].visible);

        assert_eq!(sync.select_from_menu("A1"), SelectOutcome::Selected(0));
        let highlights = &sync.primitives().electrode_highlights;
        assert!(highlights[0].visible);
        assert!(!highlights[1].visible);
    }

    #[test]
    fn test_bounding_box_offset_from_config() {
        let dataset = ElectrodeDataset::from_json_str(TWO_ELECTRODES).unwrap();
        let config = Config {
            bounding_box_offset: [10.0, 0.0, 0.0],
            ..Config::default()
        };
        let mut boot = Bootstrap::new(&config);
        boot.assets_ready();
        let sync = boot
            .attach(&dataset, RecordingPanel::default(), RecordingView::default())
            .unwrap();
        assert_eq!(sync.electrodes()[0].position, [11.0, 3.0, 5.0]);
        assert_eq!(sync.electrodes()[0].slice_index[0], 129);
    }
}
