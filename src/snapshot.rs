//! Snapshot Renderer
//!
//! Builds the electrode scene headlessly, applies the menu choices given on
//! the command line, then opens a small three-d window, renders the visible
//! primitives once, captures pixels and saves them as a PNG.

use anyhow::Context as _;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use three_d::*;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dataset::ElectrodeDataset;
use crate::loader::{Bootstrap, LoadError};
use crate::ports::{PanelState, ViewState};
use crate::primitive::{Primitive, PrimitiveSet, Shape};
use crate::scene::{SceneSync, SelectOutcome};

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub output: PathBuf,
    pub size: u32,
    pub label_set: Option<String>,
    pub connection_set: Option<String>,
    pub select: Option<String>,
}

/// `snapshots/<subject>_<timestamp>.png`
pub fn default_output(subject: &str) -> PathBuf {
    let subject = if subject.is_empty() { "electrodes" } else { subject };
    PathBuf::from("snapshots").join(format!(
        "{}_{}.png",
        subject,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Attach the dataset and replay the requested menu changes
pub fn prepare_scene(
    config: &Config,
    dataset: &ElectrodeDataset,
    options: &SnapshotOptions,
) -> Result<SceneSync<PanelState, ViewState>, LoadError> {
    let mut bootstrap = Bootstrap::new(config);
    bootstrap.assets_ready();
    let mut scene = bootstrap.attach(dataset, PanelState::default(), ViewState::from_config(config))?;

    if let Some(name) = &options.label_set {
        scene.panel_mut().selected_label_set = name.clone();
        scene.change_label_set(name);
    }
    if let Some(name) = &options.connection_set {
        scene.panel_mut().selected_connection_set = name.clone();
        scene.change_connection_set(name);
    }
    if let Some(id) = &options.select {
        scene.panel_mut().selected_electrode = id.clone();
        if scene.select_from_menu(id) == SelectOutcome::NotFound {
            warn!("Electrode '{}' not in dataset, nothing selected", id);
        }
    }
    Ok(scene)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupShape {
    Sphere,
    Cylinder,
}

/// Instances sharing one mesh and one material
struct InstanceGroup {
    shape: GroupShape,
    transparent: bool,
    instances: Instances,
}

fn instance_groups(primitives: &PrimitiveSet) -> Vec<InstanceGroup> {
    let mut groups: Vec<InstanceGroup> = Vec::new();

    for primitive in primitives.iter().filter(|p| p.visible) {
        let (shape, transform) = match primitive.shape {
            Shape::Sphere { center } => (
                GroupShape::Sphere,
                Mat4::from_translation(to_vec3(center)) * Mat4::from_scale(primitive.radius as f32),
            ),
            Shape::Cylinder { start, end } => (
                GroupShape::Cylinder,
                cylinder_transform(to_vec3(start), to_vec3(end), primitive.radius as f32),
            ),
        };
        let transparent = primitive.opacity < 1.0;

        let index = match groups
            .iter()
            .position(|g| g.shape == shape && g.transparent == transparent)
        {
            Some(index) => index,
            None => {
                let mut instances = Instances::default();
                instances.transformations = Vec::new();
                instances.colors = Some(Vec::new());
                groups.push(InstanceGroup {
                    shape,
                    transparent,
                    instances,
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.instances.transformations.push(transform);
        if let Some(ref mut colors) = group.instances.colors {
            colors.push(srgba(primitive));
        }
    }

    // Opaque geometry first so blended highlights land on top
    groups.sort_by_key(|g| g.transparent);
    groups
}

fn to_vec3(p: [f64; 3]) -> Vec3 {
    vec3(p[0] as f32, p[1] as f32, p[2] as f32)
}

fn srgba(primitive: &Primitive) -> Srgba {
    Srgba::new(
        (primitive.color[0] * 255.0) as u8,
        (primitive.color[1] * 255.0) as u8,
        (primitive.color[2] * 255.0) as u8,
        (primitive.opacity.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Unit cylinder (x axis, 0..1, radius 1) stretched between two points
fn cylinder_transform(start: Vec3, end: Vec3, radius: f32) -> Mat4 {
    let dir = end - start;
    let length = dir.magnitude();
    if length < 0.001 {
        return Mat4::from_translation(start) * Mat4::from_scale(0.0);
    }

    let x = vec3(1.0, 0.0, 0.0);
    let d = dir / length;
    let rotation = if d.dot(x) > 0.999 {
        Mat4::identity()
    } else if d.dot(x) < -0.999 {
        Mat4::from_angle_y(degrees(180.0))
    } else {
        let axis = x.cross(d).normalize();
        Mat4::from_axis_angle(axis, radians(x.dot(d).acos()))
    };

    Mat4::from_translation(start) * rotation * Mat4::from_nonuniform_scale(length, radius, radius)
}

/// Render the scene once and save it to `options.output`
pub fn render(
    config: &Config,
    dataset: &ElectrodeDataset,
    options: &SnapshotOptions,
) -> anyhow::Result<()> {
    let scene = prepare_scene(config, dataset, options)?;
    prepare_output(&options.output)?;

    let centers: Vec<Vec3> = scene
        .electrodes()
        .iter()
        .map(|e| to_vec3(e.position))
        .collect();
    let groups = instance_groups(scene.primitives());
    let size = options.size;
    println!(
        "Rendering {} electrodes ({}x{})...",
        centers.len(),
        size,
        size
    );

    let window = Window::new(WindowSettings {
        title: "Electrode Viewer - Snapshot".to_string(),
        max_size: Some((size, size)),
        min_size: (size, size),
        ..Default::default()
    })?;

    let context = window.gl();

    let mut camera = Camera::new_perspective(
        Viewport {
            x: 0,
            y: 0,
            width: size,
            height: size,
        },
        vec3(0.0, 200.0, 0.0),
        vec3(0.0, 0.0, 0.0),
        vec3(0.0, 0.0, 1.0),
        degrees(45.0),
        0.1,
        10000.0,
    );
    let c = config.camera_position;
    auto_fit_camera(&centers, vec3(c[0], c[1], c[2]), &mut camera);

    let sphere = CpuMesh::sphere(16);
    let cylinder = CpuMesh::cylinder(12);
    let renderables: Vec<Gm<InstancedMesh, ColorMaterial>> = groups
        .iter()
        .map(|group| {
            let mesh = match group.shape {
                GroupShape::Sphere => &sphere,
                GroupShape::Cylinder => &cylinder,
            };
            let material = if group.transparent {
                ColorMaterial {
                    render_states: RenderStates {
                        write_mask: WriteMask::COLOR,
                        blend: Blend::TRANSPARENCY,
                        ..Default::default()
                    },
                    is_transparent: true,
                    ..Default::default()
                }
            } else {
                ColorMaterial::default()
            };
            Gm::new(InstancedMesh::new(&context, &group.instances, mesh), material)
        })
        .collect();

    let output = options.output.clone();
    let outcome: Rc<RefCell<Option<anyhow::Result<()>>>> = Rc::new(RefCell::new(None));
    let loop_outcome = Rc::clone(&outcome);

    window.render_loop(move |frame_input| {
        if loop_outcome.borrow().is_some() {
            return FrameOutput {
                exit: true,
                ..Default::default()
            };
        }
        camera.set_viewport(frame_input.viewport);

        frame_input
            .screen()
            .clear(ClearState::color_and_depth(0.0, 0.0, 0.0, 1.0, 1.0));

        for obj in &renderables {
            obj.render(&camera, &[]);
        }

        let vp = frame_input.viewport;
        let pixels: Vec<[u8; 4]> = frame_input.screen().read_color();
        let result = save_png(&output, vp.width, vp.height, pixels);
        if let Err(e) = &result {
            error!("Snapshot failed: {:#}", e);
            // The native event loop ends the process instead of returning
            std::process::exit(1);
        }

        *loop_outcome.borrow_mut() = Some(result);
        FrameOutput::default()
    });

    let result = outcome.borrow_mut().take();
    result.unwrap_or_else(|| Err(anyhow::anyhow!("Window closed before a frame was captured")))
}

/// Create the output directory and make sure the file can be written
fn prepare_output(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
    }
    std::fs::File::create(path)
        .with_context(|| format!("opening snapshot file {}", path.display()))?;
    Ok(())
}

fn save_png(path: &Path, width: u32, height: u32, pixels: Vec<[u8; 4]>) -> anyhow::Result<()> {
    let flat: Vec<u8> = pixels.into_iter().flatten().collect();

    let img = image::RgbaImage::from_raw(width, height, flat).ok_or_else(|| {
        anyhow::anyhow!("Captured frame does not match {}x{}", width, height)
    })?;
    img.save(path)
        .with_context(|| format!("saving snapshot {}", path.display()))?;

    info!("Saved {}", path.display());
    println!("Saved {}", path.display());
    Ok(())
}

/// Fit the camera to all electrodes, looking along the configured direction
fn auto_fit_camera(points: &[Vec3], direction: Vec3, camera: &mut Camera) {
    if points.is_empty() {
        return;
    }

    let mut min = vec3(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    let mut max = vec3(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min = vec3(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = vec3(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
    }

    let center = (min + max) * 0.5;
    let diag = (max - min).magnitude().max(1.0);

    let direction = if direction.magnitude() > f32::EPSILON {
        direction.normalize()
    } else {
        vec3(0.0, 1.0, 0.0)
    };
    // Looking straight down Y needs another up vector
    let up = if direction.dot(vec3(0.0, 1.0, 0.0)).abs() > 0.99 {
        vec3(0.0, 0.0, 1.0)
    } else {
        vec3(0.0, 1.0, 0.0)
    };

    camera.set_view(center + direction * diag * 1.2, center, up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::SAMPLE;

    fn options() -> SnapshotOptions {
        SnapshotOptions {
            output: PathBuf::from("out.png"),
            size: 64,
            label_set: None,
            connection_set: None,
            select: None,
        }
    }

    fn assert_close(a: Vec4, b: Vec3) {
        assert!((a.x - b.x).abs() < 1e-4, "{:?} vs {:?}", a, b);
        assert!((a.y - b.y).abs() < 1e-4, "{:?} vs {:?}", a, b);
        assert!((a.z - b.z).abs() < 1e-4, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_cylinder_spans_endpoints() {
        let start = vec3(1.0, 2.0, 3.0);
        let end = vec3(-4.0, 6.0, 3.5);
        let t = cylinder_transform(start, end, 0.3);
        assert_close(t * vec4(0.0, 0.0, 0.0, 1.0), start);
        assert_close(t * vec4(1.0, 0.0, 0.0, 1.0), end);

        // Antiparallel to the mesh axis
        let t = cylinder_transform(start, start - vec3(2.0, 0.0, 0.0), 0.3);
        assert_close(t * vec4(1.0, 0.0, 0.0, 1.0), start - vec3(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_prepare_applies_options() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let opts = SnapshotOptions {
            label_set: Some("SeizType2".to_string()),
            connection_set: Some("motor".to_string()),
            select: Some("D1".to_string()),
            ..options()
        };
        let scene = prepare_scene(&Config::default(), &dataset, &opts).unwrap();

        assert_eq!(scene.active_label_set(), "SeizType2");
        assert_eq!(scene.active_connection_set(), "motor");
        assert_eq!(scene.selected(), Some(2));
        assert_eq!(scene.panel().selected_electrode, "D1");
        assert!(scene.primitives().connections[0].visible);
        assert!(!scene.primitives().connections[1].visible);
    }

    #[test]
    fn test_unknown_selection_is_not_fatal() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let opts = SnapshotOptions {
            select: Some("Z99".to_string()),
            ..options()
        };
        let scene = prepare_scene(&Config::default(), &dataset, &opts).unwrap();
        assert_eq!(scene.selected(), None);
    }

    #[test]
    fn test_instance_groups_only_visible() {
        let dataset = ElectrodeDataset::from_json_str(SAMPLE).unwrap();
        let opts = SnapshotOptions {
            select: Some("G01".to_string()),
            ..options()
        };
        let scene = prepare_scene(&Config::default(), &dataset, &opts).unwrap();
        let groups = instance_groups(scene.primitives());

        // Four display spheres, then the one translucent highlight
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].shape, GroupShape::Sphere);
        assert!(!groups[0].transparent);
        assert_eq!(groups[0].instances.transformations.len(), 4);
        assert!(groups[1].transparent);
        assert_eq!(groups[1].instances.transformations.len(), 1);
    }

    #[test]
    fn test_save_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        save_png(&path, 2, 2, vec![[255, 0, 0, 255]; 4]).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_save_png_reports_failures() {
        let dir = tempfile::tempdir().unwrap();

        let short = save_png(&dir.path().join("short.png"), 4, 4, vec![[0, 0, 0, 255]; 3]);
        assert!(short.is_err());

        let missing_dir = dir.path().join("absent").join("scene.png");
        assert!(save_png(&missing_dir, 1, 1, vec![[0, 0, 0, 255]]).is_err());
    }

    #[test]
    fn test_prepare_output_rejects_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("shots").join("scene.png");
        prepare_output(&nested).unwrap();
        assert!(nested.exists());

        // A regular file cannot be used as a directory
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(prepare_output(&blocker.join("scene.png")).is_err());
    }

    #[test]
    fn test_default_output_name() {
        let path = default_output("NY394");
        assert!(path.starts_with("snapshots"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("NY394_"));
        assert!(name.ends_with(".png"));
        assert!(default_output("")
            .to_string_lossy()
            .contains("electrodes_"));
    }
}
