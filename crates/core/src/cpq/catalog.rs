//! Static price catalog: labor baselines, material specs and city cost indices.
//!
//! A built-in catalog ships with the engine; a TOML file may override or extend any entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CITY_KEY: &str = "default";
const FALLBACK_UNIT: &str = "each";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaborBaseline {
    pub unit: String,
    pub labor_hours_per_unit: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub cost_per_unit: f64,
    #[serde(default = "default_wastage_factor")]
    pub wastage_factor: f64,
    #[serde(default)]
    pub description: String,
}

fn default_wastage_factor() -> f64 {
    1.0
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    tasks: BTreeMap<String, LaborBaseline>,
    materials: BTreeMap<String, MaterialSpec>,
    city_index: BTreeMap<String, f64>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        let tasks = [
            ("demolition_tiles", "m2", 0.8, "Remove existing tiles and adhesive, protect drains"),
            ("plumbing_shower", "each", 6.0, "Re-route supply and waste for shower"),
            ("toilet_replace", "each", 2.5, "Remove and fit close-coupled WC"),
            ("vanity_install", "each", 3.0, "Fit vanity unit, basin and trap"),
            ("painting_walls", "m2", 0.25, "Two coats over prepared plaster"),
            ("tiling_floor", "m2", 1.5, "Lay ceramic floor tiles and grout"),
        ]
        .into_iter()
        .map(|(task, unit, hours, notes)| {
            (
                task.to_string(),
                LaborBaseline {
                    unit: unit.to_string(),
                    labor_hours_per_unit: hours,
                    notes: notes.to_string(),
                },
            )
        })
        .collect();

        let materials = [
            ("demolition_tiles", 3.0, 1.0, "Debris bags, skip share and floor protection"),
            ("plumbing_shower", 180.0, 1.05, "Thermostatic mixer, valves and PEX fittings"),
            ("toilet_replace", 220.0, 1.0, "Standard close-coupled WC with seat"),
            ("vanity_install", 350.0, 1.0, "60cm vanity unit with ceramic basin"),
            ("painting_walls", 4.5, 1.1, "Moisture-resistant bathroom paint"),
            ("tiling_floor", 25.0, 1.1, "Ceramic floor tile 30x30 with adhesive and grout"),
        ]
        .into_iter()
        .map(|(task, cost_per_unit, wastage_factor, description)| {
            (
                task.to_string(),
                MaterialSpec { cost_per_unit, wastage_factor, description: description.to_string() },
            )
        })
        .collect();

        let city_index = [("paris", 1.20), ("marseille", 0.95), ("lyon", 1.05), (DEFAULT_CITY_KEY, 1.0)]
            .into_iter()
            .map(|(city, index)| (city.to_string(), index))
            .collect();

        Self { tasks, materials, city_index }
    }

    /// Built-in catalog with the entries of `raw` layered on top.
    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let patch = toml::from_str::<CatalogPatch>(raw)?;
        let mut catalog = Self::builtin();
        catalog.tasks.extend(patch.tasks);
        catalog.materials.extend(patch.materials);
        catalog
            .city_index
            .extend(patch.city_index.into_iter().map(|(city, index)| (normalize_city(&city), index)));
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn labor_baseline(&self, task: &str) -> Option<&LaborBaseline> {
        self.tasks.get(task)
    }

    pub fn material_spec(&self, task: &str) -> Option<&MaterialSpec> {
        self.materials.get(task)
    }

    pub fn unit_for(&self, task: &str) -> &str {
        self.labor_baseline(task).map(|baseline| baseline.unit.as_str()).unwrap_or(FALLBACK_UNIT)
    }

    /// Unit cost x quantity x wastage; zero for tasks without a material spec.
    pub fn material_cost(&self, task: &str, quantity: f64) -> f64 {
        self.material_spec(task)
            .map(|spec| spec.cost_per_unit * quantity * spec.wastage_factor)
            .unwrap_or(0.0)
    }

    pub fn city_index(&self, city: Option<&str>) -> f64 {
        let default = self.city_index.get(DEFAULT_CITY_KEY).copied().unwrap_or(1.0);
        city.and_then(|city| self.city_index.get(&normalize_city(city)).copied()).unwrap_or(default)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        for (task, baseline) in &self.tasks {
            if !baseline.labor_hours_per_unit.is_finite() || baseline.labor_hours_per_unit < 0.0 {
                return Err(CatalogError::Validation(format!(
                    "tasks.{task}.labor_hours_per_unit must be a non-negative number"
                )));
            }
            if baseline.unit.trim().is_empty() {
                return Err(CatalogError::Validation(format!("tasks.{task}.unit cannot be empty")));
            }
        }

        for (task, spec) in &self.materials {
            if !spec.cost_per_unit.is_finite() || spec.cost_per_unit < 0.0 {
                return Err(CatalogError::Validation(format!(
                    "materials.{task}.cost_per_unit must be a non-negative number"
                )));
            }
            if !spec.wastage_factor.is_finite() || spec.wastage_factor < 1.0 {
                return Err(CatalogError::Validation(format!(
                    "materials.{task}.wastage_factor must be at least 1.0"
                )));
            }
        }

        for (city, index) in &self.city_index {
            if !index.is_finite() || *index <= 0.0 {
                return Err(CatalogError::Validation(format!(
                    "city_index.{city} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    #[serde(default)]
    tasks: BTreeMap<String, LaborBaseline>,
    #[serde(default)]
    materials: BTreeMap<String, MaterialSpec>,
    #[serde(default)]
    city_index: BTreeMap<String, f64>,
}
