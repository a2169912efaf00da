//! Renderer-facing primitives
//!
//! Every electrode owns a display sphere and a highlight sphere, every
//! connection a display cylinder and a highlight cylinder. The four arrays of
//! [`PrimitiveSet`] are index-aligned with the entity arrays they came from.

use crate::color::{resolve_color, Rgb, BLUE, MAGENTA, WHITE};
use crate::entity::{ConnectionEntity, ElectrodeEntity};

pub const ELECTRODE_RADIUS: f64 = 1.0;
pub const SMALL_ELECTRODE_RADIUS: f64 = 1.0 / 3.0;
pub const HIGHLIGHT_RADIUS: f64 = 1.3;
pub const SMALL_HIGHLIGHT_RADIUS: f64 = 1.3 / 5.0;
pub const CONNECTION_RADIUS: f64 = 0.3;
pub const CONNECTION_HIGHLIGHT_RADIUS: f64 = 0.4;
pub const HIGHLIGHT_OPACITY: f32 = 0.5;

/// Minimum pick tolerance in screen pixels, so tiny contacts stay clickable
const MIN_PICK_PIXELS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveRole {
    ElectrodeDisplay,
    ElectrodeHighlight,
    ConnectionDisplay,
    ConnectionHighlight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { center: [f64; 3] },
    Cylinder { start: [f64; 3], end: [f64; 3] },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub role: PrimitiveRole,
    /// Index of the owning entity
    pub owner: usize,
    pub shape: Shape,
    pub color: Rgb,
    pub radius: f64,
    pub opacity: f32,
    pub visible: bool,
    pub caption: Option<String>,
    pub caption_visible: bool,
}

/// Pickable scene objects that are not electrode or connection primitives.
///
/// Hemisphere meshes are never pickable, so only the volume appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObject {
    Volume,
}

/// Result of hit-testing a screen position against the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Electrode(usize),
    ElectrodeHighlight(usize),
    Connection(usize),
    ConnectionHighlight(usize),
    Other(SceneObject),
    None,
}

impl Hit {
    /// Whether the hit landed on a sphere or cylinder
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Hit::Electrode(_)
                | Hit::ElectrodeHighlight(_)
                | Hit::Connection(_)
                | Hit::ConnectionHighlight(_)
        )
    }
}

pub fn electrode_display(index: usize, electrode: &ElectrodeEntity) -> Primitive {
    let (color, radius) = if electrode.is_small() {
        (MAGENTA, SMALL_ELECTRODE_RADIUS)
    } else {
        (
            resolve_color(electrode.seizure_label.as_deref()),
            ELECTRODE_RADIUS,
        )
    };

    Primitive {
        role: PrimitiveRole::ElectrodeDisplay,
        owner: index,
        shape: Shape::Sphere {
            center: electrode.position,
        },
        color,
        radius,
        opacity: 1.0,
        visible: electrode.visible,
        caption: Some(electrode.id.clone()),
        caption_visible: false,
    }
}

pub fn electrode_highlight(index: usize, electrode: &ElectrodeEntity) -> Primitive {
    let radius = if electrode.is_small() {
        SMALL_HIGHLIGHT_RADIUS
    } else {
        HIGHLIGHT_RADIUS
    };

    Primitive {
        role: PrimitiveRole::ElectrodeHighlight,
        owner: index,
        shape: Shape::Sphere {
            center: electrode.position,
        },
        color: BLUE,
        radius,
        opacity: HIGHLIGHT_OPACITY,
        visible: false,
        caption: Some(electrode.id.clone()),
        caption_visible: false,
    }
}

pub fn connection_display(
    index: usize,
    connection: &ConnectionEntity,
    electrodes: &[ElectrodeEntity],
) -> Primitive {
    Primitive {
        role: PrimitiveRole::ConnectionDisplay,
        owner: index,
        shape: Shape::Cylinder {
            start: electrodes[connection.start].position,
            end: electrodes[connection.end].position,
        },
        color: WHITE,
        radius: CONNECTION_RADIUS,
        opacity: 1.0,
        visible: false,
        caption: connection.label.clone(),
        caption_visible: false,
    }
}

/// Highlight twin of a connection cylinder, on the same endpoints
pub fn connection_highlight(display: &Primitive) -> Primitive {
    Primitive {
        role: PrimitiveRole::ConnectionHighlight,
        owner: display.owner,
        shape: display.shape,
        color: BLUE,
        radius: CONNECTION_HIGHLIGHT_RADIUS,
        opacity: HIGHLIGHT_OPACITY,
        visible: false,
        caption: None,
        caption_visible: false,
    }
}

/// All primitives for one loaded dataset
#[derive(Debug, Clone, Default)]
pub struct PrimitiveSet {
    pub electrodes: Vec<Primitive>,
    pub electrode_highlights: Vec<Primitive>,
    pub connections: Vec<Primitive>,
    pub connection_highlights: Vec<Primitive>,
}

impl PrimitiveSet {
    pub fn build(electrodes: &[ElectrodeEntity], connections: &[ConnectionEntity]) -> Self {
        let connection_displays: Vec<Primitive> = connections
            .iter()
            .enumerate()
            .map(|(i, c)| connection_display(i, c, electrodes))
            .collect();

        Self {
            electrodes: electrodes
                .iter()
                .enumerate()
                .map(|(i, e)| electrode_display(i, e))
                .collect(),
            electrode_highlights: electrodes
                .iter()
                .enumerate()
                .map(|(i, e)| electrode_highlight(i, e))
                .collect(),
            connection_highlights: connection_displays.iter().map(connection_highlight).collect(),
            connections: connection_displays,
        }
    }

    /// Every primitive, display ones first
    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.electrodes
            .iter()
            .chain(self.connections.iter())
            .chain(self.electrode_highlights.iter())
            .chain(self.connection_highlights.iter())
    }

    /// Hit-test a screen position.
    ///
    /// `project` maps world coordinates to screen pixels and `pixels_per_unit`
    /// scales world radii to pixels. Only visible primitives are hit; the one
    /// whose surface is closest to the pointer wins, display before highlight
    /// on ties.
    pub fn pick<F>(&self, project: F, pixels_per_unit: f32, pointer: [f32; 2]) -> Hit
    where
        F: Fn([f64; 3]) -> [f32; 2],
    {
        let mut best: Option<(f32, Hit)> = None;

        for primitive in self.iter().filter(|p| p.visible) {
            let radius = (primitive.radius as f32 * pixels_per_unit).max(MIN_PICK_PIXELS);
            let dist = match primitive.shape {
                Shape::Sphere { center } => distance(project(center), pointer),
                Shape::Cylinder { start, end } => {
                    distance_to_segment(pointer, project(start), project(end))
                }
            };
            if dist > radius {
                continue;
            }

            let gap = dist - radius;
            if best.map_or(true, |(best_gap, _)| gap < best_gap) {
                best = Some((gap, hit_for(primitive)));
            }
        }

        best.map_or(Hit::None, |(_, hit)| hit)
    }
}

/// Whether `pointer` lies within pick tolerance of a projected polyline
pub fn on_polyline<F>(project: F, points: &[[f64; 3]], pointer: [f32; 2]) -> bool
where
    F: Fn([f64; 3]) -> [f32; 2],
{
    points
        .windows(2)
        .any(|w| distance_to_segment(pointer, project(w[0]), project(w[1])) <= MIN_PICK_PIXELS)
}

fn hit_for(primitive: &Primitive) -> Hit {
    match primitive.role {
        PrimitiveRole::ElectrodeDisplay => Hit::Electrode(primitive.owner),
        PrimitiveRole::ElectrodeHighlight => Hit::ElectrodeHighlight(primitive.owner),
        PrimitiveRole::ConnectionDisplay => Hit::Connection(primitive.owner),
        PrimitiveRole::ConnectionHighlight => Hit::ConnectionHighlight(primitive.owner),
    }
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn distance_to_segment(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let len_sq = ab[0] * ab[0] + ab[1] * ab[1];
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p[0] - a[0]) * ab[0] + (p[1] - a[1]) * ab[1]) / len_sq).clamp(0.0, 1.0);
    distance(p, [a[0] + t * ab[0], a[1] + t * ab[1]])
}
