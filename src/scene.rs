//! Scene synchronizer
//!
//! Owns the electrode/connection entities and their primitives for one
//! loaded dataset and keeps them consistent with the control panel and the
//! volume view. Every UI event lands on one of the public methods here; each
//! runs to completion before the next event is handled.
//!
//! Rules enforced:
//! - at most one electrode highlight and one connection highlight is visible
//! - picking an electrode syncs the electrode menu and jumps the slices
//! - the connection filter decides connection visibility and captions
//! - selecting the functional mapping label-set reveals every connection

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::color::resolve_color;
use crate::dataset::{DatasetError, ElectrodeDataset, POPULATION_LABEL_SET};
use crate::entity::{build_connections, build_electrodes, ConnectionEntity, ElectrodeEntity};
use crate::interval::round_half_up;
use crate::ports::{ControlPanel, CursorStyle, ElectrodeInfo, SceneView};
use crate::primitive::{Hit, PrimitiveSet};

/// Electrode menu entry meaning "no electrode"
pub const NO_ELECTRODE: &str = "None";
/// Label-set menu entry that shows every connection
pub const FUNCTIONAL_MAPPING: &str = "funMapping";
/// Connection-set menu entry that hides every connection
pub const NO_CONNECTION_SET: &str = "none";
pub const NO_CONNECTION_CAPTION: &str = "No Functional Mapping Selected";

/// Result of an electrode selection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected(usize),
    Cleared,
    NotFound,
}

type Column = Vec<Option<String>>;

/// Everything derived from a dataset before it is wired to the ports
#[derive(Debug, Clone)]
pub struct SceneData {
    pub subject_id: String,
    pub total_seizure_types: String,
    pub electrodes: Vec<ElectrodeEntity>,
    pub connections: Vec<ConnectionEntity>,
    pub primitives: PrimitiveSet,
    /// Label-set names in menu order
    pub label_set_names: Vec<String>,
    pub label_sets: BTreeMap<String, Column>,
    /// Connection annotation set names in menu order
    pub caption_set_names: Vec<String>,
    pub caption_sets: BTreeMap<String, Column>,
}

impl SceneData {
    /// Build entities and primitives.
    ///
    /// `connection_sets` restricts the annotation sets offered; an empty
    /// slice offers every annotation column found in the dataset.
    pub fn from_dataset(
        dataset: &ElectrodeDataset,
        offset: [f64; 3],
        connection_sets: &[String],
    ) -> Result<Self, DatasetError> {
        let electrodes = build_electrodes(dataset, offset)?;
        let connections = build_connections(dataset, &electrodes);
        let primitives = PrimitiveSet::build(&electrodes, &connections);

        let mut label_sets = BTreeMap::new();
        for name in dataset
            .label_set_names()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(POPULATION_LABEL_SET))
        {
            label_sets.insert(name.to_string(), dataset.label_set(name)?);
        }

        let caption_set_names: Vec<String> = if connection_sets.is_empty() {
            dataset.caption_set_names()
        } else {
            connection_sets
                .iter()
                .filter(|name| {
                    let present = dataset.caption_set(name).is_some();
                    if !present {
                        warn!("Connection set '{}' not in dataset, skipping", name);
                    }
                    present
                })
                .cloned()
                .collect()
        };
        let caption_sets = caption_set_names
            .iter()
            .filter_map(|name| Some((name.clone(), dataset.caption_set(name)?)))
            .collect();

        Ok(Self {
            subject_id: dataset.subj_id.clone(),
            total_seizure_types: dataset
                .total_seiz_type
                .map(|n| n.to_string())
                .unwrap_or_default(),
            electrodes,
            connections,
            primitives,
            label_set_names: dataset.label_set_names().to_vec(),
            label_sets,
            caption_set_names,
            caption_sets,
        })
    }
}

pub struct SceneSync<P, V> {
    data: SceneData,
    active_label_set: String,
    active_connection_set: String,
    selected: Option<usize>,
    panel: P,
    view: V,
}

impl<P: ControlPanel, V: SceneView> SceneSync<P, V> {
    pub fn new(data: SceneData, panel: P, view: V) -> Self {
        let active_label_set = data.label_set_names.first().cloned().unwrap_or_default();
        Self {
            data,
            active_label_set,
            active_connection_set: NO_CONNECTION_SET.to_string(),
            selected: None,
            panel,
            view,
        }
    }

    pub fn electrodes(&self) -> &[ElectrodeEntity] {
        &self.data.electrodes
    }

    pub fn connections(&self) -> &[ConnectionEntity] {
        &self.data.connections
    }

    pub fn primitives(&self) -> &PrimitiveSet {
        &self.data.primitives
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn active_label_set(&self) -> &str {
        &self.active_label_set
    }

    pub fn active_connection_set(&self) -> &str {
        &self.active_connection_set
    }

    /// Electrode menu change
    pub fn select_from_menu(&mut self, id: &str) -> SelectOutcome {
        if id == NO_ELECTRODE {
            self.clear_selection();
            return SelectOutcome::Cleared;
        }

        let Some(index) = self.data.electrodes.iter().position(|e| e.id == id) else {
            warn!("Could not find electrode with ID of {}", id);
            return SelectOutcome::NotFound;
        };

        self.select(index);
        self.jump_to_slices(index);
        SelectOutcome::Selected(index)
    }

    /// Click in the 3D view
    pub fn click(&mut self, hit: Hit) {
        match hit {
            Hit::Electrode(index) if index < self.data.electrodes.len() => {
                self.select(index);
                let id = self.data.electrodes[index].id.clone();
                self.panel.set_selected_electrode(&id);
                self.jump_to_slices(index);
            }
            Hit::Connection(index) if index < self.data.connections.len() => {
                let caption = self.data.primitives.connections[index]
                    .caption
                    .clone()
                    .unwrap_or_default();
                self.panel.show_connection_caption(&caption);
                self.highlight_connection(Some(index));
            }
            Hit::None => {
                self.clear_selection();
                self.panel.set_selected_electrode(NO_ELECTRODE);
            }
            other => debug!("Click on {:?} ignored", other),
        }
    }

    /// Pointer moved over the 3D view
    pub fn hover(&mut self, hit: Hit) {
        match hit {
            h if h.is_primitive() => self.panel.set_cursor(CursorStyle::Crosshair),
            Hit::None => self.panel.set_cursor(CursorStyle::Default),
            // Non-primitive hits are forced visible and keep the current
            // cursor; kept until the intended behaviour is settled.
            Hit::Other(object) => {
                debug!("Hover over {:?} forces it visible", object);
                self.view.force_visible(object);
            }
            _ => {}
        }
    }

    /// Label-set menu change: recolor electrodes against the chosen set
    pub fn change_label_set(&mut self, name: &str) {
        info!("Label-set changed to '{}'", name);
        self.active_label_set = name.to_string();

        if name == FUNCTIONAL_MAPPING {
            for connection in &mut self.data.primitives.connections {
                connection.visible = true;
            }
            return;
        }

        let Some(values) = self.data.label_sets.get(name) else {
            warn!("Unknown label-set '{}', colors unchanged", name);
            return;
        };
        for (sphere, value) in self.data.primitives.electrodes.iter_mut().zip(values) {
            sphere.color = resolve_color(value.as_deref());
        }
    }

    /// Connection-set menu change: show only annotated connections
    pub fn change_connection_set(&mut self, name: &str) {
        info!("Connection set changed to '{}'", name);
        self.active_connection_set = name.to_string();

        let captions: &[Option<String>] = if name == NO_CONNECTION_SET {
            &[]
        } else {
            match self.data.caption_sets.get(name) {
                Some(captions) => captions,
                None => {
                    warn!("Unknown connection set '{}', hiding all connections", name);
                    &[]
                }
            }
        };

        for (index, (entity, primitive)) in self
            .data
            .connections
            .iter_mut()
            .zip(self.data.primitives.connections.iter_mut())
            .enumerate()
        {
            let caption = captions
                .get(index)
                .cloned()
                .flatten()
                .filter(|c| !c.is_empty());
            primitive.visible = caption.is_some();
            primitive.caption = caption.clone();
            entity.label = caption;
        }

        self.panel.show_connection_caption(NO_CONNECTION_CAPTION);
        self.highlight_connection(None);
    }

    /// Reveal every electrode caption at once
    pub fn show_all_captions(&mut self) {
        self.view.reset_framing();
        for sphere in &mut self.data.primitives.electrodes {
            sphere.caption_visible = true;
        }
    }

    /// Info panel content for an electrode under the active label-set
    pub fn electrode_info(&self, index: usize) -> ElectrodeInfo {
        let electrode = &self.data.electrodes[index];
        let [x, y, z] = electrode.position.map(|c| round_half_up(c) as i64);

        let (population, seizure) = if self.active_label_set == POPULATION_LABEL_SET {
            (electrode.population_label.clone().unwrap_or_default(), String::new())
        } else {
            let seizure = self
                .data
                .label_sets
                .get(&self.active_label_set)
                .and_then(|values| values.get(index).cloned().flatten())
                .unwrap_or_default();
            (String::new(), seizure)
        };

        ElectrodeInfo {
            id: electrode.id.clone(),
            kind: electrode.kind.clone(),
            coordinates: [x, y, z],
            population,
            seizure,
        }
    }

    fn select(&mut self, index: usize) {
        debug!("Selecting electrode {}", self.data.electrodes[index].id);
        self.selected = Some(index);
        self.highlight_electrode(Some(index));
        let info = self.electrode_info(index);
        self.panel.show_electrode_info(Some(&info));
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.highlight_electrode(None);
        self.panel.show_electrode_info(None);
    }

    fn highlight_electrode(&mut self, index: Option<usize>) {
        for (i, highlight) in self.data.primitives.electrode_highlights.iter_mut().enumerate() {
            highlight.visible = Some(i) == index;
        }
    }

    fn highlight_connection(&mut self, index: Option<usize>) {
        for (i, highlight) in self
            .data
            .primitives
            .connection_highlights
            .iter_mut()
            .enumerate()
        {
            highlight.visible = Some(i) == index;
        }
    }

    fn jump_to_slices(&mut self, index: usize) {
        let indices = self.data.electrodes[index].slice_index;
        debug!("Jumping slices to {:?}", indices);
        self.view.set_slice_indices(indices);
        self.view.request_redraw();
    }
}
