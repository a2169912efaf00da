//! Seams between the scene synchronizer and whatever draws it
//!
//! [`ControlPanel`] is the form side (menus, labels, cursor) and [`SceneView`]
//! the renderer side (volume slices, framing). [`PanelState`] and
//! [`ViewState`] are plain-data implementations the GUI and the snapshot
//! renderer read back every frame.

use std::path::PathBuf;

use crate::config::{Config, MeshConfig};
use crate::primitive::SceneObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Crosshair,
}

/// What the info panel shows for the selected electrode
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElectrodeInfo {
    pub id: String,
    pub kind: String,
    /// Rounded, offset coordinates
    pub coordinates: [i64; 3],
    pub population: String,
    pub seizure: String,
}

impl ElectrodeInfo {
    pub fn coordinates_text(&self) -> String {
        let [x, y, z] = self.coordinates;
        format!("({}, {}, {})", x, y, z)
    }
}

/// Option lists of the three selector menus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuOptions {
    pub electrodes: Vec<String>,
    pub label_sets: Vec<String>,
    pub connection_sets: Vec<String>,
}

pub trait ControlPanel {
    fn populate_menus(&mut self, options: &MenuOptions);
    fn show_subject(&mut self, subject_id: &str, total_seizure_types: &str);
    /// `None` clears the panel
    fn show_electrode_info(&mut self, info: Option<&ElectrodeInfo>);
    /// Move the electrode menu to `id` without firing its change handler
    fn set_selected_electrode(&mut self, id: &str);
    fn show_connection_caption(&mut self, caption: &str);
    fn set_cursor(&mut self, cursor: CursorStyle);
}

pub trait SceneView {
    fn set_slice_indices(&mut self, indices: [u32; 3]);
    fn volume_visible(&self) -> bool;
    fn set_volume_visible(&mut self, visible: bool);

    /// Make the slice viewers pick up changed indices.
    ///
    /// Renderers without a repaint call notice index changes only when the
    /// volume visibility changes, so the default flips it off and back on.
    fn request_redraw(&mut self) {
        let visible = self.volume_visible();
        self.set_volume_visible(!visible);
        self.set_volume_visible(visible);
    }

    /// Reset the camera framing to the scene bounding box
    fn reset_framing(&mut self);
    fn force_visible(&mut self, object: SceneObject);
}

/// Menu and label state mirrored by the GUI side panel
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub options: MenuOptions,
    pub subject_id: String,
    pub total_seizure_types: String,
    pub info: Option<ElectrodeInfo>,
    pub selected_electrode: String,
    pub selected_label_set: String,
    pub selected_connection_set: String,
    pub connection_caption: String,
    pub cursor: CursorStyle,
}

impl ControlPanel for PanelState {
    fn populate_menus(&mut self, options: &MenuOptions) {
        self.options = options.clone();
        self.selected_electrode = options.electrodes.first().cloned().unwrap_or_default();
        self.selected_label_set = options.label_sets.first().cloned().unwrap_or_default();
        self.selected_connection_set = options
            .connection_sets
            .first()
            .cloned()
            .unwrap_or_default();
    }

    fn show_subject(&mut self, subject_id: &str, total_seizure_types: &str) {
        self.subject_id = subject_id.to_string();
        self.total_seizure_types = total_seizure_types.to_string();
    }

    fn show_electrode_info(&mut self, info: Option<&ElectrodeInfo>) {
        self.info = info.cloned();
    }

    fn set_selected_electrode(&mut self, id: &str) {
        self.selected_electrode = id.to_string();
    }

    fn show_connection_caption(&mut self, caption: &str) {
        self.connection_caption = caption.to_string();
    }

    fn set_cursor(&mut self, cursor: CursorStyle) {
        self.cursor = cursor;
    }
}

/// Volume display properties bound to the slider panel
#[derive(Debug, Clone)]
pub struct VolumeState {
    pub file: PathBuf,
    pub labelmap_file: PathBuf,
    pub dimensions: [u32; 3],
    pub min: f32,
    pub max: f32,
    pub opacity: f32,
    pub lower_threshold: f32,
    pub upper_threshold: f32,
    pub window_low: f32,
    pub window_high: f32,
    pub index: [u32; 3],
    /// Slice planes shown in the 3D view
    pub visible: bool,
}

/// Cortical surface properties bound to the hemisphere panels
#[derive(Debug, Clone)]
pub struct MeshState {
    pub file: PathBuf,
    pub visible: bool,
    pub opacity: f32,
    pub color: [f32; 3],
}

impl From<&MeshConfig> for MeshState {
    fn from(config: &MeshConfig) -> Self {
        Self {
            file: config.file.clone(),
            visible: true,
            opacity: config.opacity,
            color: config.color,
        }
    }
}

/// Renderer-side state: volume, hemispheres and pending view requests
#[derive(Debug, Clone)]
pub struct ViewState {
    pub volume: VolumeState,
    pub left_hemisphere: MeshState,
    pub right_hemisphere: MeshState,
    pub redraw_requested: bool,
    pub framing_reset_requested: bool,
}

impl ViewState {
    pub fn from_config(config: &Config) -> Self {
        let v = &config.volume;
        Self {
            volume: VolumeState {
                file: v.file.clone(),
                labelmap_file: v.labelmap_file.clone(),
                dimensions: v.dimensions,
                min: v.min,
                max: v.max,
                opacity: v.opacity,
                lower_threshold: v.lower_threshold,
                upper_threshold: v.upper_threshold,
                window_low: v.window_low,
                window_high: v.window_high,
                index: v.dimensions.map(|d| d / 2),
                // The 3D view starts without slice planes
                visible: false,
            },
            left_hemisphere: MeshState::from(&config.hemispheres.left),
            right_hemisphere: MeshState::from(&config.hemispheres.right),
            redraw_requested: false,
            framing_reset_requested: false,
        }
    }

    /// Consume a pending redraw request
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    pub fn take_framing_reset(&mut self) -> bool {
        std::mem::take(&mut self.framing_reset_requested)
    }
}

impl SceneView for ViewState {
    fn set_slice_indices(&mut self, indices: [u32; 3]) {
        let max = self.volume.dimensions.map(|d| d.saturating_sub(1));
        self.volume.index = [
            indices[0].min(max[0]),
            indices[1].min(max[1]),
            indices[2].min(max[2]),
        ];
    }

    fn volume_visible(&self) -> bool {
        self.volume.visible
    }

    fn set_volume_visible(&mut self, visible: bool) {
        self.volume.visible = visible;
    }

    fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    fn reset_framing(&mut self) {
        self.framing_reset_requested = true;
    }

    fn force_visible(&mut self, object: SceneObject) {
        match object {
            SceneObject::Volume => self.volume.visible = true,
        }
    }
}
