//! Emission record allocation to cells (spec §4.5).
//!
//! Grounded on spec §4.5 and the `geo` intersection/area API (pack
//! enrichment via `openmander-core`'s polygon-overlap pattern); the teacher
//! has no emissions concept at all.

use crate::geometry::{self, Footprint};
use crate::mechanism::{EmittedPollutant, Mechanism, PlumeOutcome};
use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};

/// The geometry an emission record is defined over, in the grid projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Line(Vec<(f64, f64)>),
    Polygon(Footprint),
}

/// Optional stack parameters for a point source with a plume-rise model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StackParameters {
    pub height: f64,
    pub diameter: f64,
    pub temperature: f64,
    pub exit_velocity: f64,
}

/// One emission source: a geometry plus steady source rates for five
/// pollutants (μg/s) and optional stack parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub geometry: Geometry,
    pub voc: f64,
    pub nox: f64,
    pub nh3: f64,
    pub sox: f64,
    pub pm25: f64,
    pub stack: Option<StackParameters>,
}

impl EmissionRecord {
    fn pollutant_rate(&self, pollutant: EmittedPollutant) -> f64 {
        match pollutant {
            EmittedPollutant::Voc => self.voc,
            EmittedPollutant::NOx => self.nox,
            EmittedPollutant::Nh3 => self.nh3,
            EmittedPollutant::SOx => self.sox,
            EmittedPollutant::Pm25 => self.pm25,
        }
    }
}

/// Evaluates the plume-rise layer for a stack source: a simplified model
/// that compares the stack height against each layer's top height and
/// returns the first layer whose top exceeds it, or `AboveTopBoundary` if
/// no layer does (spec §8 scenario 6).
fn plume_layer(mesh: &Mesh, stack: &StackParameters) -> PlumeOutcome {
    let mut layer_tops: Vec<(u32, f64)> = mesh
        .iter_order()
        .map(|c| (c.layer, c.layer_height + c.dz))
        .collect();
    layer_tops.sort_by(|a, b| a.0.cmp(&b.0));
    layer_tops.dedup_by_key(|(layer, _)| *layer);

    for (layer, top) in layer_tops {
        if stack.height <= top {
            return PlumeOutcome::Injected { layer };
        }
    }
    PlumeOutcome::AboveTopBoundary
}

/// Weight factor for a geometry against one cell's footprint (spec §4.5):
/// area ratio for polygons, length ratio for lines, and the
/// inside/edge/corner point rule.
fn weight_factor(geometry: &Geometry, cell_footprint: &Footprint) -> f64 {
    match geometry {
        Geometry::Polygon(source) => {
            let source_area = geometry::area(source);
            if source_area <= 0.0 {
                return 0.0;
            }
            geometry::intersection_area(source, cell_footprint) / source_area
        }
        Geometry::Line(points) => {
            let total_len = polyline_length(points);
            if total_len <= 0.0 {
                return 0.0;
            }
            let rect = geometry::bounding_rect(cell_footprint);
            let mut clipped_len = 0.0;
            for window in points.windows(2) {
                clipped_len += clip_segment_to_rect(window[0], window[1], rect);
            }
            clipped_len / total_len
        }
        Geometry::Point { x, y } => point_weight(*x, *y, cell_footprint),
    }
}

fn polyline_length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| segment_length(w[0], w[1]))
        .sum()
}

fn segment_length(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Liang-Barsky clip of a segment against an axis-aligned rectangle,
/// returning the length of the portion inside the rectangle (0 if none).
fn clip_segment_to_rect(a: (f64, f64), b: (f64, f64), rect: geo::Rect<f64>) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let edges = [
        (-dx, a.0 - rect.min().x),
        (dx, rect.max().x - a.0),
        (-dy, a.1 - rect.min().y),
        (dy, rect.max().y - a.1),
    ];

    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return 0.0; // parallel and outside
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return 0.0;
            }
            if r > t0 {
                t0 = r;
            }
        } else {
            if r < t0 {
                return 0.0;
            }
            if r < t1 {
                t1 = r;
            }
        }
    }

    if t0 > t1 {
        return 0.0;
    }
    let clipped_a = (a.0 + t0 * dx, a.1 + t0 * dy);
    let clipped_b = (a.0 + t1 * dx, a.1 + t1 * dy);
    segment_length(clipped_a, clipped_b)
}

fn point_weight(x: f64, y: f64, footprint: &Footprint) -> f64 {
    let rect = geometry::bounding_rect(footprint);
    let on_west = (x - rect.min().x).abs() < 1e-9;
    let on_east = (x - rect.max().x).abs() < 1e-9;
    let on_south = (y - rect.min().y).abs() < 1e-9;
    let on_north = (y - rect.max().y).abs() < 1e-9;

    let on_vertical_edge = on_west || on_east;
    let on_horizontal_edge = on_south || on_north;

    let strictly_inside = x > rect.min().x
        && x < rect.max().x
        && y > rect.min().y
        && y < rect.max().y;

    if strictly_inside {
        1.0
    } else if on_vertical_edge && on_horizontal_edge {
        0.25 // corner, shared evenly with the three face/corner neighbors
    } else if on_vertical_edge || on_horizontal_edge {
        0.5 // edge, shared with the one neighbor across it
    } else {
        0.0
    }
}

/// Allocates one emission record's pollutant rates across every cell whose
/// bounding box intersects the record's geometry, adding into `EmisFlux`.
/// Records whose geometry does not intersect any cell are silently dropped
/// (spec §7); stack records whose plume falls above the top layer return
/// `PlumeOutcome::AboveTopBoundary` without touching any cell.
pub fn allocate_emission(mesh: &mut Mesh, mechanism: &Mechanism, record: &EmissionRecord) -> PlumeOutcome {
    let target_layer = if let Some(stack) = &record.stack {
        if stack.height > 0.0 {
            match plume_layer(mesh, stack) {
                PlumeOutcome::Injected { layer } => Some(layer),
                PlumeOutcome::AboveTopBoundary => return PlumeOutcome::AboveTopBoundary,
            }
        } else {
            Some(0)
        }
    } else {
        Some(0)
    };

    let pollutants = [
        EmittedPollutant::Voc,
        EmittedPollutant::NOx,
        EmittedPollutant::Nh3,
        EmittedPollutant::SOx,
        EmittedPollutant::Pm25,
    ];

    let cell_ids: Vec<_> = mesh
        .iter_order()
        .filter(|c| target_layer.map(|l| c.layer == l).unwrap_or(true))
        .map(|c| c.id)
        .collect();

    for cell_id in cell_ids {
        let (footprint, volume) = {
            let cell = mesh.get(cell_id).expect("id from iter_order is live");
            (cell.footprint.clone(), cell.volume())
        };
        let weight = weight_factor(&record.geometry, &footprint);
        if weight <= 0.0 {
            continue;
        }

        let cell = mesh.get_mut(cell_id).expect("still live");
        for pollutant in pollutants {
            let rate = record.pollutant_rate(pollutant);
            if rate == 0.0 {
                continue;
            }
            let (species, factor) = mechanism.emission_species(pollutant);
            let allocated_rate = rate * weight * factor;
            cell.emis_flux[species.index()] += allocated_rate / volume;
        }
    }

    match target_layer {
        Some(layer) => PlumeOutcome::Injected { layer },
        None => PlumeOutcome::Injected { layer: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{blank_cell, CellId};
    use crate::geometry::rect_footprint;

    #[test]
    fn point_strictly_inside_gets_full_weight() {
        let fp = rect_footprint(0.0, 0.0, 10.0, 10.0);
        let w = point_weight(5.0, 5.0, &fp);
        assert_eq!(w, 1.0);
    }

    #[test]
    fn point_on_edge_gets_half_weight() {
        let fp = rect_footprint(0.0, 0.0, 10.0, 10.0);
        let w = point_weight(0.0, 5.0, &fp);
        assert_eq!(w, 0.5);
    }

    #[test]
    fn point_on_corner_gets_quarter_weight() {
        let fp = rect_footprint(0.0, 0.0, 10.0, 10.0);
        let w = point_weight(0.0, 0.0, &fp);
        assert_eq!(w, 0.25);
    }

    #[test]
    fn point_source_allocates_to_single_cell() {
        let mut mesh = Mesh::new();
        let cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 100.0, 0);
        let id = mesh.insert(cell).unwrap();
        let mechanism = Mechanism::standard();
        let record = EmissionRecord {
            geometry: Geometry::Point { x: 5.0, y: 5.0 },
            voc: 0.0,
            nox: 0.0,
            nh3: 0.0,
            sox: 0.0,
            pm25: 1.0,
            stack: None,
        };
        allocate_emission(&mut mesh, &mechanism, &record);
        let cell = mesh.get(id).unwrap();
        assert!(cell.emis_flux[crate::species::Species::Pm25Primary.index()] > 0.0);
    }

    #[test]
    fn stack_plume_above_top_layer_is_dropped_without_touching_any_cell() {
        // Scenario 6 (spec §8): a domain whose top layer tops out at 600 m
        // cannot absorb a plume that rises to 800 m.
        let mut mesh = Mesh::new();
        let cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 600.0, 0);
        let id = mesh.insert(cell).unwrap();
        let mechanism = Mechanism::standard();
        let record = EmissionRecord {
            geometry: Geometry::Point { x: 5.0, y: 5.0 },
            voc: 0.0,
            nox: 0.0,
            nh3: 0.0,
            sox: 0.0,
            pm25: 1.0,
            stack: Some(StackParameters {
                height: 800.0,
                diameter: 1.0,
                temperature: 400.0,
                exit_velocity: 5.0,
            }),
        };

        let outcome = allocate_emission(&mut mesh, &mechanism, &record);
        assert_eq!(outcome, PlumeOutcome::AboveTopBoundary);
        let cell = mesh.get(id).unwrap();
        assert_eq!(cell.emis_flux[crate::species::Species::Pm25Primary.index()], 0.0);
    }
}
