//! Mesh snapshot save/load (spec §3 "Persistence", §6 "Mesh snapshot
//! format").
//!
//! Grounded directly on the teacher's `simulation/persistence.rs`:
//! `serde_json` to/from a path, one concrete on-disk format rather than an
//! abstract codec.

use crate::cell::Cell;
use crate::error::{InMapError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Data-version tag this build of the core requires; bumped whenever the
/// on-disk cell schema changes incompatibly.
pub const SNAPSHOT_DATA_VERSION: &str = "inmap-core-1";

/// The list of live interior cells plus a data-version tag (spec §3
/// "Persistence saves the list of live interior cells ... and a
/// data-version tag").
#[derive(Debug, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub data_version: String,
    pub cells: Vec<Cell>,
}

impl MeshSnapshot {
    pub fn from_mesh(mesh: &crate::mesh::Mesh) -> Self {
        MeshSnapshot {
            data_version: SNAPSHOT_DATA_VERSION.to_string(),
            cells: mesh.iter_order().cloned().collect(),
        }
    }
}

/// Serializes `mesh` to `path` as JSON.
pub fn save(mesh: &crate::mesh::Mesh, path: &Path) -> Result<()> {
    let snapshot = MeshSnapshot::from_mesh(mesh);
    let json = serde_json::to_string(&snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

/// Loads a mesh snapshot from `path`, reconstructing neighbor topology by
/// re-inserting every cell through `Mesh::insert` in its saved order (spec
/// §3 "load reconstructs the index, neighbor links, and boundary cells").
pub fn load(path: &Path) -> Result<crate::mesh::Mesh> {
    let json = fs::read_to_string(path)?;
    let snapshot: MeshSnapshot = serde_json::from_str(&json)?;

    if snapshot.data_version != SNAPSHOT_DATA_VERSION {
        return Err(InMapError::DataVersionMismatch {
            expected: SNAPSHOT_DATA_VERSION.to_string(),
            found: snapshot.data_version,
        });
    }

    let mut mesh = crate::mesh::Mesh::new();
    for cell in snapshot.cells {
        let mut cell = cell;
        cell.west.clear();
        cell.east.clear();
        cell.south.clear();
        cell.north.clear();
        cell.above.clear();
        cell.below.clear();
        cell.ground_level.clear();
        mesh.insert(cell)?;
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{blank_cell, CellId};
    use crate::geometry::rect_footprint;
    use crate::species::Species;
    use tempfile::NamedTempFile;

    #[test]
    fn save_then_load_preserves_concentrations() {
        let mut mesh = crate::mesh::Mesh::new();
        let mut cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 100.0, 0);
        cell.cf[Species::Pm25Primary.index()] = 4.2;
        mesh.insert(cell).unwrap();

        let file = NamedTempFile::new().unwrap();
        save(&mesh, file.path()).unwrap();
        let loaded = load(file.path()).unwrap();

        assert_eq!(loaded.cell_count(), 1);
        let loaded_cell = loaded.iter_order().next().unwrap();
        assert_eq!(loaded_cell.cf[Species::Pm25Primary.index()], 4.2);
    }

    #[test]
    fn version_mismatch_on_load_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        let snapshot = MeshSnapshot {
            data_version: "stale-version".to_string(),
            cells: vec![],
        };
        fs::write(file.path(), serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert!(load(file.path()).is_err());
    }
}
