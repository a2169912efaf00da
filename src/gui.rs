//! Native GUI viewer using egui
//!
//! Left panel holds the selector menus, the electrode info panel and the
//! volume/hemisphere property controls. The central panel is a projected 3D
//! view of the electrode primitives with mouse orbit controls; hover and
//! click are hit-tested and forwarded to the scene synchronizer.

use eframe::egui;
use egui_plot::{Line, MarkerShape, PlotPoint, PlotPoints, Points, Text};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::color::Rgb;
use crate::config::Config;
use crate::dataset::ElectrodeDataset;
use crate::entity::{SCANNER_RANGE, SLICE_RANGE};
use crate::interval::map_interval;
use crate::loader::{Bootstrap, LoadError, LoadPhase};
use crate::ports::{CursorStyle, MeshState, PanelState, ViewState};
use crate::primitive::{on_polyline, Hit, Primitive, SceneObject, Shape};
use crate::scene::SceneSync;
use crate::source::{fetch_dataset, DatasetSource, SourceError};

type Scene = SceneSync<PanelState, ViewState>;

/// Run the native GUI viewer
pub fn run_viewer(config: Config, source: DatasetSource) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("Electrode Viewer"),
        ..Default::default()
    };

    // The fetch is the only suspension point; everything after it runs on
    // the UI thread.
    let (tx, rx) = mpsc::channel();
    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let fetch_source = source.clone();
    tokio::runtime::Handle::current().spawn(async move {
        let result = fetch_dataset(&fetch_source, timeout).await;
        if tx.send(result).is_err() {
            warn!("Viewer closed before the dataset arrived");
        }
    });

    eframe::run_native(
        "Electrode Viewer",
        options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, config, source, rx)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

const DATA_NOT_FOUND: &str = "Data not found!";
const LOAD_FAILED: &str = "Failed to load dataset";

/// Heading of the failure screen; only a missing dataset is "not found"
fn failure_heading(error: &LoadError) -> &'static str {
    match error {
        LoadError::Source(SourceError::NotFound(_)) => DATA_NOT_FOUND,
        _ => LOAD_FAILED,
    }
}

enum LoadState {
    Pending(Receiver<Result<ElectrodeDataset, SourceError>>),
    /// Dataset arrived before the scene assets
    Fetched(ElectrodeDataset),
    Failed { heading: &'static str, message: String },
    Ready(Box<Scene>),
}

/// Orbit camera, orthographic projection
#[derive(Debug, Clone, Copy)]
struct Camera {
    angle_x: f32, // Pitch (up/down)
    angle_y: f32, // Yaw (left/right)
    distance: f32,
    target: [f32; 2], // Pan offset
}

impl Camera {
    fn looking_from(position: [f32; 3]) -> Self {
        let [x, y, z] = position;
        let len = (x * x + y * y + z * z).sqrt().max(f32::EPSILON);
        Self {
            angle_x: (y / len).asin().clamp(-1.5, 1.5),
            angle_y: x.atan2(z),
            distance: 1.0,
            target: [0.0, 0.0],
        }
    }

    fn project(&self, p: [f64; 3]) -> [f64; 2] {
        let (x, y, z) = (p[0] as f32, p[1] as f32, p[2] as f32);
        let (sin_x, cos_x) = self.angle_x.sin_cos();
        let (sin_y, cos_y) = self.angle_y.sin_cos();

        // Rotate around Y axis (yaw)
        let x1 = x * cos_y + z * sin_y;
        let z1 = -x * sin_y + z * cos_y;

        // Rotate around X axis (pitch)
        let y1 = y * cos_x - z1 * sin_x;

        [
            (x1 + self.target[0]) as f64,
            (y1 + self.target[1]) as f64,
        ]
    }
}

struct ViewerApp {
    config: Config,
    source: DatasetSource,
    bootstrap: Bootstrap,
    load: LoadState,
    camera: Camera,
    reset_view: bool,
    show_grid: bool,
}

impl ViewerApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: Config,
        source: DatasetSource,
        rx: Receiver<Result<ElectrodeDataset, SourceError>>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        Self {
            bootstrap: Bootstrap::new(&config),
            camera: Camera::looking_from(config.camera_position),
            config,
            source,
            load: LoadState::Pending(rx),
            reset_view: false,
            show_grid: true,
        }
    }

    /// Advance the load state machine; electrodes attach only after assets
    fn poll_load(&mut self, ctx: &egui::Context) {
        if let LoadState::Pending(rx) = &self.load {
            match rx.try_recv() {
                Ok(Ok(dataset)) => self.load = LoadState::Fetched(dataset),
                Ok(Err(e)) => {
                    let e = LoadError::from(e);
                    error!("Failed to load dataset: {}", e);
                    self.load = LoadState::Failed {
                        heading: failure_heading(&e),
                        message: e.to_string(),
                    };
                }
                Err(TryRecvError::Empty) => {
                    ctx.request_repaint_after(Duration::from_millis(100));
                }
                Err(TryRecvError::Disconnected) => {
                    self.load = LoadState::Failed {
                        heading: LOAD_FAILED,
                        message: "Dataset loader stopped unexpectedly".into(),
                    };
                }
            }
        }

        if self.bootstrap.phase() != LoadPhase::AssetsReady {
            return;
        }
        if let LoadState::Fetched(dataset) = &self.load {
            let panel = PanelState::default();
            let view = ViewState::from_config(&self.config);
            self.load = match self.bootstrap.attach(dataset, panel, view) {
                Ok(scene) => {
                    info!("Electrodes attached");
                    LoadState::Ready(Box::new(scene))
                }
                Err(e) => {
                    error!("Failed to attach electrodes: {}", e);
                    LoadState::Failed {
                        heading: failure_heading(&e),
                        message: e.to_string(),
                    }
                }
            };
        }
    }

    fn center_view(&mut self) {
        self.camera = Camera::looking_from(self.config.camera_position);
        self.reset_view = true;
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Volume and meshes need no loading here, so assets are ready just
        // before the first frame is drawn.
        self.bootstrap.assets_ready();
        self.poll_load(ctx);

        let scene = match &mut self.load {
            LoadState::Ready(scene) => scene,
            LoadState::Pending(_) | LoadState::Fetched(_) => {
                let source = self.source.describe();
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(format!("Loading electrodes from {}", source));
                    });
                });
                return;
            }
            LoadState::Failed { heading, message } => {
                let (heading, message) = (*heading, message.clone());
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading(heading);
                    ui.colored_label(egui::Color32::LIGHT_RED, message);
                    ui.label("Check the subject id and the data endpoint, then relaunch.");
                });
                return;
            }
        };

        if scene.view_mut().take_framing_reset() {
            self.camera = Camera::looking_from(self.config.camera_position);
            self.reset_view = true;
        }

        egui::SidePanel::left("controls_panel")
            .min_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    selection_panel(ui, scene);
                    ui.separator();
                    property_panels(ui, scene.view_mut());
                });
            });

        egui::TopBottomPanel::bottom("slices_panel").show(ctx, |ui| {
            slice_strips(ui, scene);
        });

        egui::TopBottomPanel::bottom("camera_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.show_grid, "Grid");
                ui.separator();
                ui.label("Rotate:");
                ui.add(egui::DragValue::new(&mut self.camera.angle_x).speed(0.02).prefix("X:"));
                ui.add(egui::DragValue::new(&mut self.camera.angle_y).speed(0.02).prefix("Y:"));
                ui.separator();
                if ui.button("Center").clicked() {
                    self.center_view();
                }
            });
        });

        let scene = match &mut self.load {
            LoadState::Ready(scene) => scene,
            _ => return,
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "{} electrodes | {} connections | ",
                    scene.electrodes().len(),
                    scene.connections().len()
                ));
                ui.label("Click: select | Right-drag: rotate | Drag: pan | Scroll: zoom");
            });

            ctx.input(|i| {
                if i.key_down(egui::Key::ArrowLeft) { self.camera.angle_y -= 0.03; }
                if i.key_down(egui::Key::ArrowRight) { self.camera.angle_y += 0.03; }
                if i.key_down(egui::Key::ArrowUp) { self.camera.angle_x -= 0.03; }
                if i.key_down(egui::Key::ArrowDown) { self.camera.angle_x += 0.03; }
                if i.pointer.secondary_down() {
                    let delta = i.pointer.delta();
                    self.camera.angle_y += delta.x * 0.005;
                    self.camera.angle_x += delta.y * 0.005;
                }
            });
            self.camera.angle_x = self.camera.angle_x.clamp(-1.5, 1.5);

            let view_range = 100.0 * self.camera.distance as f64;
            let mut plot = egui_plot::Plot::new("electrode_plot")
                .data_aspect(1.0)
                .allow_drag(true)
                .allow_zoom(true)
                .allow_scroll(true)
                .show_axes(true)
                .show_grid(self.show_grid)
                .include_x(-view_range)
                .include_x(view_range)
                .include_y(-view_range)
                .include_y(view_range);
            if std::mem::take(&mut self.reset_view) {
                plot = plot.reset();
            }

            let camera = self.camera;
            let offset = self.config.bounding_box_offset;
            let response = plot.show(ui, |plot_ui| {
                let origin = plot_ui.screen_from_plot(PlotPoint::new(0.0, 0.0));
                let unit = plot_ui.screen_from_plot(PlotPoint::new(1.0, 0.0));
                let pixels_per_unit = (unit.x - origin.x).abs().max(f32::EPSILON);

                // Hidden slices keep a dim outline so the volume stays pickable
                let volume = &scene.view().volume;
                let gray = if volume.visible { 90 } else { 45 };
                for axis in 0..3 {
                    let corners = slice_corners(axis, volume.index[axis], offset);
                    let points: Vec<[f64; 2]> = corners.iter().map(|&p| camera.project(p)).collect();
                    plot_ui.line(
                        Line::new(PlotPoints::from(points))
                            .color(egui::Color32::from_gray(gray))
                            .width(1.0),
                    );
                }

                for primitive in scene.primitives().iter().filter(|p| p.visible) {
                    draw_primitive(plot_ui, &camera, primitive, pixels_per_unit);
                }

                let hit = match plot_ui.pointer_coordinate() {
                    Some(pointer) => {
                        let s = plot_ui.screen_from_plot(pointer);
                        let to_screen = |p: [f64; 3]| {
                            let q = camera.project(p);
                            let s = plot_ui.screen_from_plot(PlotPoint::new(q[0], q[1]));
                            [s.x, s.y]
                        };
                        let pointer = [s.x, s.y];
                        match scene.primitives().pick(&to_screen, pixels_per_unit, pointer) {
                            Hit::None => pick_volume(&to_screen, scene.view().volume.index, offset, pointer),
                            hit => hit,
                        }
                    }
                    None => Hit::None,
                };

                // Hover tag for the electrode under the pointer
                if let (Hit::Electrode(index), Some(pointer)) = (hit, plot_ui.pointer_coordinate()) {
                    if let Some(caption) = &scene.primitives().electrodes[index].caption {
                        plot_ui.text(
                            Text::new(pointer, caption.as_str())
                                .color(egui::Color32::WHITE)
                                .anchor(egui::Align2::LEFT_BOTTOM),
                        );
                    }
                }
                hit
            });

            let hit = response.inner;
            if response.response.hovered() {
                scene.hover(hit);
                if scene.panel().cursor == CursorStyle::Crosshair {
                    ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
                }
            }
            if response.response.clicked() {
                scene.click(hit);
            }
        });

        if scene.view_mut().take_redraw() {
            ctx.request_repaint();
        }
    }
}

/// Menus, info panel and the show-all-tags button
fn selection_panel(ui: &mut egui::Ui, scene: &mut Scene) {
    let panel = scene.panel().clone();

    ui.heading("Patient");
    egui::Grid::new("subject_grid").num_columns(2).show(ui, |ui| {
        ui.label("Subject:");
        ui.label(&panel.subject_id);
        ui.end_row();
        ui.label("Seizure types:");
        ui.label(&panel.total_seizure_types);
        ui.end_row();
    });
    ui.separator();

    let mut electrode = panel.selected_electrode.clone();
    let mut label_set = panel.selected_label_set.clone();
    let mut connection_set = panel.selected_connection_set.clone();

    egui::Grid::new("menu_grid").num_columns(2).show(ui, |ui| {
        ui.label("Electrode:");
        combo(ui, "electrode_menu", &mut electrode, &panel.options.electrodes);
        ui.end_row();
        ui.label("Display:");
        combo(ui, "seizure_display_menu", &mut label_set, &panel.options.label_sets);
        ui.end_row();
        ui.label("Functional map:");
        combo(ui, "fmap_menu", &mut connection_set, &panel.options.connection_sets);
        ui.end_row();
    });

    if electrode != panel.selected_electrode {
        scene.panel_mut().selected_electrode = electrode.clone();
        scene.select_from_menu(&electrode);
    }
    if label_set != panel.selected_label_set {
        scene.panel_mut().selected_label_set = label_set.clone();
        scene.change_label_set(&label_set);
    }
    if connection_set != panel.selected_connection_set {
        scene.panel_mut().selected_connection_set = connection_set.clone();
        scene.change_connection_set(&connection_set);
    }

    ui.separator();
    let info = scene.panel().info.clone().unwrap_or_default();
    egui::Grid::new("info_grid").num_columns(2).show(ui, |ui| {
        ui.label("ID:");
        ui.label(&info.id);
        ui.end_row();
        ui.label("Type:");
        ui.label(&info.kind);
        ui.end_row();
        ui.label("Coordinates:");
        if scene.panel().info.is_some() {
            ui.label(info.coordinates_text());
        } else {
            ui.label("");
        }
        ui.end_row();
        ui.label("Int. population:");
        ui.label(&info.population);
        ui.end_row();
        ui.label("Seizure type:");
        ui.label(&info.seizure);
        ui.end_row();
    });

    ui.separator();
    ui.label(format!("Functional mapping: {}", scene.panel().connection_caption));
    if ui.button("Show all tags").clicked() {
        scene.show_all_captions();
    }
}

fn combo(ui: &mut egui::Ui, id: &str, selected: &mut String, options: &[String]) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected.as_str())
        .width(150.0)
        .show_ui(ui, |ui| {
            for option in options {
                ui.selectable_value(selected, option.clone(), option);
            }
        });
}

/// Volume and hemisphere properties, bound straight to the view state
fn property_panels(ui: &mut egui::Ui, view: &mut ViewState) {
    let volume = &mut view.volume;
    let (min, max) = (volume.min, volume.max);
    let [dx, dy, dz] = volume.dimensions.map(|d| d.saturating_sub(1));

    egui::CollapsingHeader::new("Volume")
        .default_open(true)
        .show(ui, |ui| {
            ui.small(volume.file.display().to_string());
            ui.add(egui::Slider::new(&mut volume.opacity, 0.0..=1.0).text("opacity"));
            ui.add(egui::Slider::new(&mut volume.lower_threshold, min..=max).text("lowerThreshold"));
            ui.add(egui::Slider::new(&mut volume.upper_threshold, min..=max).text("upperThreshold"));
            ui.add(egui::Slider::new(&mut volume.window_low, min..=max).text("windowLow"));
            ui.add(egui::Slider::new(&mut volume.window_high, min..=max).text("windowHigh"));
            ui.add(egui::Slider::new(&mut volume.index[0], 0..=dx).text("indexX"));
            ui.add(egui::Slider::new(&mut volume.index[1], 0..=dy).text("indexY"));
            ui.add(egui::Slider::new(&mut volume.index[2], 0..=dz).text("indexZ"));
        });

    mesh_panel(ui, "Left Hemisphere", &mut view.left_hemisphere);
    mesh_panel(ui, "Right Hemisphere", &mut view.right_hemisphere);

    egui::CollapsingHeader::new("Slices")
        .default_open(true)
        .show(ui, |ui| {
            ui.checkbox(&mut view.volume.visible, "visible");
        });
}

fn mesh_panel(ui: &mut egui::Ui, title: &str, mesh: &mut MeshState) {
    egui::CollapsingHeader::new(title)
        .default_open(true)
        .show(ui, |ui| {
            ui.small(mesh.file.display().to_string());
            ui.checkbox(&mut mesh.visible, "visible");
            ui.add(egui::Slider::new(&mut mesh.opacity, 0.0..=1.0).text("opacity"));
            ui.horizontal(|ui| {
                ui.label("color");
                ui.color_edit_button_rgb(&mut mesh.color);
            });
        });
}

/// One strip per axis: current slice and the electrodes lying on it
fn slice_strips(ui: &mut egui::Ui, scene: &Scene) {
    let index = scene.view().volume.index;
    ui.columns(3, |columns| {
        for (axis, (column, name)) in columns.iter_mut().zip(["X", "Y", "Z"]).enumerate() {
            column.strong(format!("Slice {} = {}", name, index[axis]));
            let on_slice: Vec<&str> = scene
                .electrodes()
                .iter()
                .filter(|e| e.slice_index[axis] == index[axis])
                .map(|e| e.id.as_str())
                .collect();
            if on_slice.is_empty() {
                column.small("no electrodes on this slice");
            } else {
                column.small(on_slice.join(", "));
            }
        }
    });
}

fn color32(color: Rgb, opacity: f32) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(
        (color[0] * 255.0) as u8,
        (color[1] * 255.0) as u8,
        (color[2] * 255.0) as u8,
        (opacity.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

fn draw_primitive(
    plot_ui: &mut egui_plot::PlotUi,
    camera: &Camera,
    primitive: &Primitive,
    pixels_per_unit: f32,
) {
    let color = color32(primitive.color, primitive.opacity);
    let size = (primitive.radius as f32 * pixels_per_unit).max(1.5);

    match primitive.shape {
        Shape::Sphere { center } => {
            let p = camera.project(center);
            plot_ui.points(
                Points::new(vec![p])
                    .shape(MarkerShape::Circle)
                    .filled(true)
                    .radius(size)
                    .color(color),
            );
            if primitive.caption_visible {
                if let Some(caption) = &primitive.caption {
                    plot_ui.text(
                        Text::new(PlotPoint::new(p[0], p[1]), caption.as_str())
                            .color(egui::Color32::WHITE)
                            .anchor(egui::Align2::LEFT_BOTTOM),
                    );
                }
            }
        }
        Shape::Cylinder { start, end } => {
            let a = camera.project(start);
            let b = camera.project(end);
            plot_ui.line(
                Line::new(PlotPoints::from(vec![a, b]))
                    .color(color)
                    .width(size * 2.0),
            );
        }
    }
}

/// Outline of one slice plane, in the same space as the electrodes
fn slice_corners(axis: usize, index: u32, offset: [f64; 3]) -> [[f64; 3]; 5] {
    let plane = map_interval(index as f64, SLICE_RANGE, SCANNER_RANGE);
    let (lo, hi) = SCANNER_RANGE;
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);

    [(lo, lo), (hi, lo), (hi, hi), (lo, hi), (lo, lo)].map(|(cu, cv)| {
        let mut p = [0.0; 3];
        p[axis] = plane + offset[axis];
        p[u] = cu + offset[u];
        p[v] = cv + offset[v];
        p
    })
}

/// Hit-test the slice outlines of the volume
fn pick_volume<F>(project: F, index: [u32; 3], offset: [f64; 3], pointer: [f32; 2]) -> Hit
where
    F: Fn([f64; 3]) -> [f32; 2],
{
    let hit = (0..3).any(|axis| on_polyline(&project, &slice_corners(axis, index[axis], offset), pointer));
    if hit {
        Hit::Other(SceneObject::Volume)
    } else {
        Hit::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_looks_down_y() {
        let camera = Camera::looking_from([0.0, 200.0, 0.0]);
        assert_eq!(camera.angle_x, 1.5);
        // X stays horizontal from above
        let p = camera.project([10.0, 0.0, 0.0]);
        assert!((p[0] - 10.0).abs() < 1e-4);
        assert!(p[1].abs() < 1e-4);
    }

    #[test]
    fn test_front_camera_is_identity() {
        let camera = Camera::looking_from([0.0, 0.0, 100.0]);
        let p = camera.project([3.0, -4.0, 7.0]);
        assert!((p[0] - 3.0).abs() < 1e-5);
        assert!((p[1] + 4.0).abs() < 1e-5);
    }

    fn top_down(p: [f64; 3]) -> [f32; 2] {
        [p[0] as f32, p[1] as f32]
    }

    #[test]
    fn test_slice_outline_is_pickable() {
        let index = [128, 128, 128];
        // Edge of the axial outline
        assert_eq!(
            pick_volume(top_down, index, [0.0; 3], [127.5, 40.0]),
            Hit::Other(SceneObject::Volume)
        );
        // Sagittal plane at slice 128 projects onto x = 0.5
        assert_eq!(
            pick_volume(top_down, index, [0.0; 3], [1.0, -60.0]),
            Hit::Other(SceneObject::Volume)
        );
        assert_eq!(pick_volume(top_down, index, [0.0; 3], [50.0, 50.0]), Hit::None);
        // Offset moves the outlines with the electrodes
        assert_eq!(pick_volume(top_down, index, [20.0, 0.0, 0.0], [1.0, -60.0]), Hit::None);
    }

    #[test]
    fn test_failure_heading() {
        let missing = LoadError::from(SourceError::NotFound("NY1.json".into()));
        assert_eq!(failure_heading(&missing), "Data not found!");

        let status = LoadError::from(SourceError::Status {
            url: "u".into(),
            status: 500,
        });
        assert_eq!(failure_heading(&status), "Failed to load dataset");
        assert_eq!(failure_heading(&LoadError::AssetsNotReady), "Failed to load dataset");
    }

    #[test]
    fn test_color32_opacity() {
        let c = color32([0.0, 0.0, 1.0], 0.5);
        assert_eq!(c, egui::Color32::from_rgba_unmultiplied(0, 0, 255, 127));
    }
}
