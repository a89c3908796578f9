//! Structural capacity calculator with Malaysian code compliance checks.
//!
//! Section width and height are in millimetres, spans and foundation plan
//! dimensions in metres, loads in kN (per metre for members). The formulas
//! are simplified design-office checks, not a substitute for a full design.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEAD_LOAD_FACTOR: f64 = 1.4;
const LIVE_LOAD_FACTOR: f64 = 1.6;
const WIND_LOAD_FACTOR: f64 = 1.2;
/// Columns more slender than this lose 40% of their axial capacity.
const CRITICAL_SLENDERNESS: f64 = 50.0;
/// Reported for members whose capacity does not depend on the applied load.
const NOMINAL_SAFETY_FACTOR: f64 = 1.5;

pub const FIRE_STANDARD: &str = "MS 1183:2015";
pub const BUILDING_BYLAWS: &str = "UBBL 1984";
pub const CONCRETE_STANDARD: &str = "MS 1553:2018";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("Unsupported material: {0}. Supported materials: concrete, steel, timber")]
    UnsupportedMaterial(String),

    #[error("Unsupported structure type: {0}. Supported types: beam, column, slab, foundation")]
    UnsupportedStructure(String),

    #[error("Missing or invalid dimensions for {structure}: {missing}")]
    InvalidDimensions {
        structure: StructureType,
        missing: String,
    },

    #[error("Loads must be provided")]
    MissingLoads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureType {
    Beam,
    Column,
    Slab,
    Foundation,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beam => "beam",
            Self::Column => "column",
            Self::Slab => "slab",
            Self::Foundation => "foundation",
        }
    }

    fn required_dimensions(&self) -> &'static [&'static str] {
        match self {
            Self::Foundation => &["width", "length"],
            _ => &["width", "height", "length"],
        }
    }

    /// Minimum concrete cover in mm, for members that have one.
    fn minimum_cover(&self) -> Option<f64> {
        match self {
            Self::Beam => Some(25.0),
            Self::Column => Some(40.0),
            Self::Slab => Some(20.0),
            Self::Foundation => None,
        }
    }

    /// Span-to-deflection limit, for members checked in bending.
    fn deflection_limit(&self) -> Option<u32> {
        match self {
            Self::Beam => Some(360),
            Self::Slab => Some(480),
            _ => None,
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StructureType {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beam" => Ok(Self::Beam),
            "column" => Ok(Self::Column),
            "slab" => Ok(Self::Slab),
            "foundation" => Ok(Self::Foundation),
            _ => Err(DesignError::UnsupportedStructure(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Concrete,
    Steel,
    Timber,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concrete => "concrete",
            Self::Steel => "steel",
            Self::Timber => "timber",
        }
    }

    /// Characteristic strength in MPa: compressive for concrete, yield for
    /// steel, bending for timber.
    fn strength(&self) -> f64 {
        match self {
            Self::Concrete => 25.0,
            Self::Steel => 460.0,
            Self::Timber => 24.0,
        }
    }

    /// Modulus of elasticity in Pa.
    fn modulus(&self) -> f64 {
        match self {
            Self::Concrete => 28e9,
            Self::Steel => 200e9,
            Self::Timber => 11e9,
        }
    }

    /// Allowable bearing pressure in kPa.
    fn bearing_pressure(&self) -> f64 {
        match self {
            Self::Concrete => 200.0,
            Self::Steel => 300.0,
            Self::Timber => 100.0,
        }
    }

    fn moment_capacity(&self, width: f64, height: f64) -> f64 {
        match self {
            Self::Concrete => 0.138 * 25.0 * width * height * height / 1e6,
            Self::Steel => 0.95 * 460.0 * 0.9 * width * height / 1e6,
            Self::Timber => 0.9 * 24.0 * width * height * height / 6.0 / 1e6,
        }
    }

    fn shear_capacity(&self, width: f64, height: f64) -> f64 {
        match self {
            Self::Concrete => 0.79 * 2f64.cbrt() * width * height * 0.8 / 1e3,
            Self::Steel => 0.6 * 275.0 * width * height / 1e3,
            Self::Timber => 0.9 * 3.5 * width * height * 0.8 / 1e3,
        }
    }

    /// Midspan deflection of a simply supported member under a UDL.
    fn deflection(&self, width: f64, height: f64, length: f64, load: f64) -> f64 {
        let second_moment = width * height.powi(3) / 12.0;
        5.0 * load * length.powi(4) / (384.0 * self.modulus() * second_moment)
    }

    fn axial_capacity(&self, area: f64) -> f64 {
        self.strength() * area / 1000.0
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concrete" => Ok(Self::Concrete),
            "steel" => Ok(Self::Steel),
            "timber" => Ok(Self::Timber),
            _ => Err(DesignError::UnsupportedMaterial(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    /// Concrete cover in mm.
    pub cover: Option<f64>,
}

impl Dimensions {
    fn get(&self, name: &str) -> Option<f64> {
        match name {
            "width" => self.width,
            "height" => self.height,
            "length" => self.length,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Loads {
    #[serde(alias = "deadLoad")]
    pub dead_load: Option<f64>,
    #[serde(alias = "liveLoad")]
    pub live_load: Option<f64>,
    #[serde(alias = "windLoad")]
    pub wind_load: Option<f64>,
}

impl Loads {
    fn is_empty(&self) -> bool {
        self.dead_load.is_none() && self.live_load.is_none() && self.wind_load.is_none()
    }

    fn dead(&self) -> f64 {
        self.dead_load.unwrap_or(0.0)
    }

    fn live(&self) -> f64 {
        self.live_load.unwrap_or(0.0)
    }
}

/// Design calculation input as received over HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignRequest {
    #[serde(alias = "structureType")]
    pub structure_type: String,
    pub material: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub loads: Loads,
}

/// Validated design input.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignInput {
    pub structure_type: StructureType,
    pub material: MaterialKind,
    pub dimensions: Dimensions,
    pub loads: Loads,
}

impl DesignRequest {
    pub fn validate(&self) -> Result<DesignInput, DesignError> {
        let material: MaterialKind = self.material.parse()?;
        let structure_type: StructureType = self.structure_type.parse()?;

        let missing: Vec<&str> = structure_type
            .required_dimensions()
            .iter()
            .copied()
            .filter(|name| !matches!(self.dimensions.get(name), Some(v) if v > 0.0))
            .collect();
        if !missing.is_empty() {
            return Err(DesignError::InvalidDimensions {
                structure: structure_type,
                missing: missing.join(", "),
            });
        }

        if self.loads.is_empty() {
            return Err(DesignError::MissingLoads);
        }

        Ok(DesignInput {
            structure_type,
            material,
            dimensions: self.dimensions.clone(),
            loads: self.loads.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Capacity {
    Beam {
        moment_capacity: String,
        shear_capacity: String,
        deflection: String,
        safety_factor: f64,
        applied_load: String,
    },
    Column {
        axial_capacity: String,
        buckling_capacity: String,
        slenderness_ratio: String,
        safety_factor: String,
        applied_load: String,
    },
    Slab {
        moment_capacity: String,
        deflection: String,
        safety_factor: f64,
        applied_load: String,
    },
    Foundation {
        bearing_capacity: String,
        safety_factor: String,
        area: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub standards: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignResult {
    pub structure_type: StructureType,
    pub material: MaterialKind,
    pub capacity: Capacity,
    pub compliance: ComplianceReport,
}

/// Validate `request` and compute capacity and compliance.
pub fn calculate(request: &DesignRequest) -> Result<DesignResult, DesignError> {
    let input = request.validate()?;
    Ok(evaluate(&input))
}

pub fn evaluate(input: &DesignInput) -> DesignResult {
    let (capacity, deflection) = match input.structure_type {
        StructureType::Beam => beam(input),
        StructureType::Column => (column(input), None),
        StructureType::Slab => slab(input),
        StructureType::Foundation => (foundation(input), None),
    };

    DesignResult {
        structure_type: input.structure_type,
        material: input.material,
        capacity,
        compliance: check_compliance(input, deflection),
    }
}

fn beam(input: &DesignInput) -> (Capacity, Option<f64>) {
    let (width, height, length) = section(&input.dimensions);
    let loads = &input.loads;
    let total = loads.dead() * DEAD_LOAD_FACTOR
        + loads.live() * LIVE_LOAD_FACTOR
        + loads.wind_load.unwrap_or(0.0) * WIND_LOAD_FACTOR;

    let deflection = input.material.deflection(width, height, length, total);
    let capacity = Capacity::Beam {
        moment_capacity: format!("{:.0} kNm", input.material.moment_capacity(width, height)),
        shear_capacity: format!("{:.0} kN", input.material.shear_capacity(width, height)),
        deflection: describe_deflection(deflection, length),
        safety_factor: NOMINAL_SAFETY_FACTOR,
        applied_load: format!("{:.2} kN/m", total),
    };
    (capacity, Some(deflection))
}

fn column(input: &DesignInput) -> Capacity {
    let (width, height, length) = section(&input.dimensions);
    let axial_load = input.loads.dead() + input.loads.live();
    let axial_capacity = input.material.axial_capacity(width * height);

    let slenderness = length / width.min(height);
    let buckling_capacity = if slenderness > CRITICAL_SLENDERNESS {
        0.6 * axial_capacity
    } else {
        axial_capacity
    };

    Capacity::Column {
        axial_capacity: format!("{:.0} kN", axial_capacity),
        buckling_capacity: format!("{:.0} kN", buckling_capacity),
        slenderness_ratio: format!("{:.1}", slenderness),
        safety_factor: ratio(axial_capacity, axial_load),
        applied_load: format!("{:.2} kN", axial_load),
    }
}

fn slab(input: &DesignInput) -> (Capacity, Option<f64>) {
    let (width, height, length) = section(&input.dimensions);
    let total = input.loads.dead() * DEAD_LOAD_FACTOR + input.loads.live() * LIVE_LOAD_FACTOR;

    let deflection = input.material.deflection(width, height, length, total);
    let capacity = Capacity::Slab {
        moment_capacity: format!("{:.0} kNm/m", input.material.moment_capacity(width, height)),
        deflection: describe_deflection(deflection, length),
        safety_factor: NOMINAL_SAFETY_FACTOR,
        applied_load: format!("{:.2} kN/m", total),
    };
    (capacity, Some(deflection))
}

fn foundation(input: &DesignInput) -> Capacity {
    let width = input.dimensions.width.unwrap_or_default();
    let length = input.dimensions.length.unwrap_or_default();
    let area = width * length;
    let bearing_capacity = input.material.bearing_pressure() * area;
    let total = input.loads.dead() + input.loads.live();

    Capacity::Foundation {
        bearing_capacity: format!("{:.0} kN", bearing_capacity),
        safety_factor: ratio(bearing_capacity, total),
        area: format!("{} m²", area),
    }
}

fn section(dimensions: &Dimensions) -> (f64, f64, f64) {
    (
        dimensions.width.unwrap_or_default(),
        dimensions.height.unwrap_or_default(),
        dimensions.length.unwrap_or_default(),
    )
}

fn describe_deflection(deflection: f64, length: f64) -> String {
    if deflection > 0.0 {
        format!("{:.3} m (L/{:.0})", deflection, length / deflection)
    } else {
        format!("{:.3} m (no load)", deflection)
    }
}

fn ratio(capacity: f64, load: f64) -> String {
    if load > 0.0 {
        format!("{:.2}", capacity / load)
    } else {
        "n/a".to_string()
    }
}

fn check_compliance(input: &DesignInput, deflection: Option<f64>) -> ComplianceReport {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let structure = input.structure_type;

    if input.material == MaterialKind::Concrete {
        if let Some(min_cover) = structure.minimum_cover() {
            match input.dimensions.cover {
                Some(cover) if cover < min_cover => {
                    issues.push(format!(
                        "Concrete cover ({}mm) less than minimum required ({}mm)",
                        cover, min_cover
                    ));
                    recommendations
                        .push(format!("Increase concrete cover to at least {}mm", min_cover));
                }
                Some(_) => {}
                None => {
                    issues.push(format!("Concrete cover not specified for {}", structure));
                    recommendations
                        .push(format!("Provide concrete cover of at least {}mm", min_cover));
                }
            }
        }
    }

    if let (Some(limit), Some(deflection)) = (structure.deflection_limit(), deflection) {
        let length = input.dimensions.length.unwrap_or_default();
        if deflection > length / f64::from(limit) {
            issues.push(format!(
                "Deflection ({:.4}m) exceeds L/{} limit",
                deflection, limit
            ));
            recommendations
                .push("Consider increasing section depth or using higher grade material".to_string());
        }
    }

    if input.loads.dead_load.is_none() || input.loads.live_load.is_none() {
        issues.push("Dead load and live load must be specified".to_string());
    }

    ComplianceReport {
        compliant: issues.is_empty(),
        issues,
        recommendations,
        standards: vec![FIRE_STANDARD, BUILDING_BYLAWS, CONCRETE_STANDARD],
    }
}

/// A referenced design standard and its key requirements.
#[derive(Debug, Clone, Serialize)]
pub struct Standard {
    pub code: &'static str,
    pub title: &'static str,
    pub requirements: serde_json::Value,
}

pub fn standards() -> Vec<Standard> {
    vec![
        Standard {
            code: FIRE_STANDARD,
            title: "Fire precautions in the design and construction of buildings",
            requirements: json!({
                "structural": {
                    "fire_resistance": {
                        "residential": "2 hours",
                        "commercial": "3 hours",
                        "industrial": "4 hours"
                    },
                    "compartmentation": "Required for buildings over 18m height"
                }
            }),
        },
        Standard {
            code: BUILDING_BYLAWS,
            title: "Uniform Building By-Laws",
            requirements: json!({
                "structural": {
                    "load_factors": {
                        "dead_load": DEAD_LOAD_FACTOR,
                        "live_load": LIVE_LOAD_FACTOR,
                        "wind_load": WIND_LOAD_FACTOR
                    },
                    "deflection_limits": {
                        "beams": "L/360",
                        "slabs": "L/480"
                    }
                }
            }),
        },
        Standard {
            code: CONCRETE_STANDARD,
            title: "Structural use of concrete",
            requirements: json!({
                "materials": {
                    "concrete_grade": "Minimum Grade 25 for structural elements",
                    "reinforcement": "Comply with MS 146"
                },
                "design": {
                    "minimum_cover": {
                        "beams": 25,
                        "columns": 40,
                        "slabs": 20
                    }
                }
            }),
        },
    ]
}

pub fn standard(code: &str) -> Option<Standard> {
    standards()
        .into_iter()
        .find(|s| s.code.eq_ignore_ascii_case(code.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(structure: &str, material: &str, dimensions: Dimensions, loads: Loads) -> DesignRequest {
        DesignRequest {
            structure_type: structure.into(),
            material: material.into(),
            dimensions,
            loads,
        }
    }

    fn loads(dead: f64, live: f64) -> Loads {
        Loads {
            dead_load: Some(dead),
            live_load: Some(live),
            wind_load: None,
        }
    }

    fn dims(width: f64, height: f64, length: f64, cover: Option<f64>) -> Dimensions {
        Dimensions {
            width: Some(width),
            height: Some(height),
            length: Some(length),
            cover,
        }
    }

    #[test]
    fn concrete_beam_capacity() {
        let result = calculate(&request(
            "beam",
            "concrete",
            dims(300.0, 600.0, 6.0, Some(30.0)),
            loads(10.0, 5.0),
        ))
        .unwrap();

        match &result.capacity {
            Capacity::Beam {
                moment_capacity,
                shear_capacity,
                safety_factor,
                applied_load,
                deflection,
            } => {
                assert_eq!(moment_capacity, "373 kNm");
                assert_eq!(shear_capacity, "143 kN");
                assert_eq!(*safety_factor, 1.5);
                assert_eq!(applied_load, "22.00 kN/m");
                assert!(deflection.starts_with("0.000 m (L/"));
            }
            other => panic!("unexpected capacity: {other:?}"),
        }
        assert!(result.compliance.compliant);
        assert_eq!(result.compliance.standards.len(), 3);
    }

    #[test]
    fn wind_load_is_factored_for_beams() {
        let mut beam_loads = loads(10.0, 5.0);
        beam_loads.wind_load = Some(2.0);
        let result = calculate(&request(
            "beam",
            "steel",
            dims(200.0, 400.0, 5.0, None),
            beam_loads,
        ))
        .unwrap();

        match result.capacity {
            Capacity::Beam {
                moment_capacity,
                shear_capacity,
                applied_load,
                ..
            } => {
                assert_eq!(moment_capacity, "31 kNm");
                assert_eq!(shear_capacity, "13200 kN");
                assert_eq!(applied_load, "24.40 kN/m");
            }
            other => panic!("unexpected capacity: {other:?}"),
        }
        // Steel has no cover requirement.
        assert!(result.compliance.compliant);
    }

    #[test]
    fn concrete_column_without_cover() {
        let result = calculate(&request(
            "column",
            "concrete",
            dims(400.0, 400.0, 3.5, None),
            loads(800.0, 400.0),
        ))
        .unwrap();

        assert_eq!(
            result.capacity,
            Capacity::Column {
                axial_capacity: "4000 kN".into(),
                buckling_capacity: "4000 kN".into(),
                slenderness_ratio: "0.0".into(),
                safety_factor: "3.33".into(),
                applied_load: "1200.00 kN".into(),
            }
        );
        assert!(!result.compliance.compliant);
        assert_eq!(
            result.compliance.issues,
            vec!["Concrete cover not specified for column"]
        );
        assert_eq!(
            result.compliance.recommendations,
            vec!["Provide concrete cover of at least 40mm"]
        );
    }

    #[test]
    fn slender_columns_lose_buckling_capacity() {
        let result = calculate(&request(
            "column",
            "timber",
            dims(1.0, 2.0, 60.0, None),
            loads(1.0, 1.0),
        ))
        .unwrap();

        match result.capacity {
            Capacity::Column {
                axial_capacity,
                buckling_capacity,
                slenderness_ratio,
                ..
            } => {
                assert_eq!(axial_capacity, "0 kN");
                assert_eq!(slenderness_ratio, "60.0");
                assert_eq!(buckling_capacity, "0 kN");
            }
            other => panic!("unexpected capacity: {other:?}"),
        }
    }

    #[test]
    fn thin_cover_is_flagged() {
        let result = calculate(&request(
            "slab",
            "concrete",
            dims(1000.0, 200.0, 4.0, Some(15.0)),
            loads(5.0, 3.0),
        ))
        .unwrap();

        assert_eq!(
            result.compliance.issues,
            vec!["Concrete cover (15mm) less than minimum required (20mm)"]
        );
        assert_eq!(
            result.compliance.recommendations,
            vec!["Increase concrete cover to at least 20mm"]
        );
        match result.capacity {
            Capacity::Slab {
                moment_capacity,
                applied_load,
                ..
            } => {
                assert_eq!(moment_capacity, "138 kNm/m");
                assert_eq!(applied_load, "11.80 kN/m");
            }
            other => panic!("unexpected capacity: {other:?}"),
        }
    }

    #[test]
    fn excessive_deflection_is_flagged() {
        let result = calculate(&request(
            "beam",
            "timber",
            dims(1.0, 1.0, 10.0, None),
            loads(1e9, 0.0),
        ))
        .unwrap();

        assert!(!result.compliance.compliant);
        assert!(result.compliance.issues[0].ends_with("exceeds L/360 limit"));
        assert_eq!(
            result.compliance.recommendations,
            vec!["Consider increasing section depth or using higher grade material"]
        );
    }

    #[test]
    fn foundation_bearing_capacity() {
        let result = calculate(&request(
            "foundation",
            "concrete",
            Dimensions {
                width: Some(2.0),
                length: Some(2.0),
                ..Default::default()
            },
            loads(300.0, 100.0),
        ))
        .unwrap();

        assert_eq!(
            result.capacity,
            Capacity::Foundation {
                bearing_capacity: "800 kN".into(),
                safety_factor: "2.00".into(),
                area: "4 m²".into(),
            }
        );
        assert!(result.compliance.compliant);
    }

    #[test]
    fn missing_live_load_is_a_compliance_issue() {
        let result = calculate(&request(
            "foundation",
            "steel",
            Dimensions {
                width: Some(1.5),
                length: Some(1.5),
                ..Default::default()
            },
            Loads {
                dead_load: Some(100.0),
                ..Default::default()
            },
        ))
        .unwrap();

        assert_eq!(
            result.compliance.issues,
            vec!["Dead load and live load must be specified"]
        );
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let err = calculate(&request("beam", "glass", Dimensions::default(), loads(1.0, 1.0)))
            .unwrap_err();
        assert_eq!(err, DesignError::UnsupportedMaterial("glass".into()));

        let err = calculate(&request("arch", "steel", Dimensions::default(), loads(1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, DesignError::UnsupportedStructure(_)));

        let err = calculate(&request(
            "beam",
            "steel",
            Dimensions {
                width: Some(200.0),
                height: Some(0.0),
                ..Default::default()
            },
            loads(1.0, 1.0),
        ))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing or invalid dimensions for beam: height, length"
        );

        let err = calculate(&request(
            "slab",
            "concrete",
            dims(1000.0, 200.0, 4.0, Some(25.0)),
            Loads::default(),
        ))
        .unwrap_err();
        assert_eq!(err, DesignError::MissingLoads);
    }

    #[test]
    fn request_accepts_camel_case_loads() {
        let req: DesignRequest = serde_json::from_str(
            r#"{"structureType": "Beam", "material": "STEEL",
                "dimensions": {"width": 200, "height": 400, "length": 5},
                "loads": {"deadLoad": 10, "liveLoad": 5}}"#,
        )
        .unwrap();
        let input = req.validate().unwrap();
        assert_eq!(input.structure_type, StructureType::Beam);
        assert_eq!(input.material, MaterialKind::Steel);
        assert_eq!(input.loads.live_load, Some(5.0));
    }

    #[test]
    fn standards_catalogue() {
        let all = standards();
        let codes: Vec<_> = all.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec!["MS 1183:2015", "UBBL 1984", "MS 1553:2018"]);

        let bylaws = standard("ubbl 1984").unwrap();
        assert_eq!(
            bylaws.requirements["structural"]["deflection_limits"]["beams"],
            "L/360"
        );
        assert!(standard("BS 8110").is_none());
    }
}
