//! Rule-based bid estimator.
//!
//! Prices a job from its floor area using a per-type base rate (RM/m²),
//! adjusted for location, complexity and schedule pressure.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days an estimate stays valid.
const VALIDITY_DAYS: i64 = 30;

const TERMS: [&str; 4] = [
    "30% advance payment",
    "Progress payments based on milestones",
    "Final payment upon completion",
    "Warranty period: 12 months",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("Project type, area, and location are required")]
    MissingFields,

    #[error("Area must be greater than zero")]
    InvalidArea,

    #[error("Estimate exceeds the supported numeric range")]
    OutOfRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialLine {
    pub quantity: Decimal,
    #[serde(alias = "unitPrice")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EstimateRequest {
    #[serde(alias = "projectType")]
    pub project_type: Option<String>,
    pub area: Option<Decimal>,
    pub location: Option<String>,
    pub complexity: Option<String>,
    /// Planned duration in months.
    pub timeline: Option<u32>,
    pub materials: Vec<MaterialLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDetails {
    #[serde(rename = "type")]
    pub project_type: String,
    pub area: Decimal,
    pub location: String,
    pub complexity: String,
    pub timeline: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub base_cost: Decimal,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
    pub profit_margin: Decimal,
    pub timeline_adjustment: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidEstimate {
    pub project_details: ProjectDetails,
    pub cost_breakdown: CostBreakdown,
    pub total_cost: Decimal,
    pub price_per_sqm: Decimal,
    pub valid_until: DateTime<Utc>,
    pub terms: Vec<&'static str>,
}

/// Base rate per square metre. Unknown types price as residential.
fn base_rate(project_type: &str) -> Decimal {
    match project_type.to_ascii_lowercase().as_str() {
        "commercial" => Decimal::from(1200),
        "industrial" => Decimal::from(1000),
        "infrastructure" => Decimal::from(1500),
        _ => Decimal::from(800),
    }
}

fn location_multiplier(location: &str) -> Decimal {
    match location {
        "kuala-lumpur" => Decimal::new(13, 1),
        "selangor" => Decimal::new(12, 1),
        "penang" => Decimal::new(115, 2),
        "johor" => Decimal::new(11, 1),
        _ => Decimal::ONE,
    }
}

fn complexity_multiplier(complexity: &str) -> Decimal {
    match complexity {
        "simple" => Decimal::new(8, 1),
        "complex" => Decimal::new(13, 1),
        "very_complex" => Decimal::new(16, 1),
        _ => Decimal::ONE,
    }
}

/// Rushed jobs cost more, long ones get a small discount.
fn timeline_factor(months: Option<u32>) -> Decimal {
    match months {
        Some(m) if m < 6 => Decimal::new(11, 1),
        Some(m) if m > 12 => Decimal::new(95, 2),
        _ => Decimal::ONE,
    }
}

/// Nearest whole ringgit, halves rounded up (-8190.5 becomes -8190).
fn whole(value: Decimal) -> Decimal {
    let strategy = if value.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    value.round_dp_with_strategy(0, strategy)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, EstimateError> {
    a.checked_mul(b).ok_or(EstimateError::OutOfRange)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, EstimateError> {
    a.checked_add(b).ok_or(EstimateError::OutOfRange)
}

pub fn estimate(request: EstimateRequest, now: DateTime<Utc>) -> Result<BidEstimate, EstimateError> {
    let project_type = request
        .project_type
        .filter(|t| !t.trim().is_empty())
        .ok_or(EstimateError::MissingFields)?;
    let location = request
        .location
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .ok_or(EstimateError::MissingFields)?;
    let area = request.area.ok_or(EstimateError::MissingFields)?;
    if area <= Decimal::ZERO {
        return Err(EstimateError::InvalidArea);
    }
    let complexity = request.complexity.unwrap_or_else(|| "medium".to_string());

    let base_cost = mul(
        mul(
            mul(area, base_rate(&project_type))?,
            location_multiplier(&location),
        )?,
        complexity_multiplier(&complexity),
    )?;
    let material_cost = request
        .materials
        .iter()
        .try_fold(Decimal::ZERO, |sum, m| add(sum, mul(m.quantity, m.unit_price)?))?;
    let labor_cost = mul(base_cost, Decimal::new(40, 2))?;
    let overhead_cost = mul(base_cost, Decimal::new(15, 2))?;
    let profit_margin = mul(base_cost, Decimal::new(20, 2))?;

    let total = [material_cost, labor_cost, overhead_cost, profit_margin]
        .into_iter()
        .try_fold(base_cost, add)?;
    let final_cost = mul(total, timeline_factor(request.timeline))?;
    let adjustment = final_cost
        .checked_sub(total)
        .ok_or(EstimateError::OutOfRange)?;
    let per_sqm = final_cost
        .checked_div(area)
        .ok_or(EstimateError::OutOfRange)?;

    Ok(BidEstimate {
        project_details: ProjectDetails {
            project_type,
            area,
            location,
            complexity,
            timeline: request.timeline,
        },
        cost_breakdown: CostBreakdown {
            base_cost: whole(base_cost),
            material_cost: whole(material_cost),
            labor_cost: whole(labor_cost),
            overhead_cost: whole(overhead_cost),
            profit_margin: whole(profit_margin),
            timeline_adjustment: whole(adjustment),
        },
        total_cost: whole(final_cost),
        price_per_sqm: whole(per_sqm),
        valid_until: now + Duration::days(VALIDITY_DAYS),
        terms: TERMS.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> EstimateRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn residential_in_kuala_lumpur() {
        let now = Utc::now();
        let bid = estimate(
            request(
                r#"{"projectType": "residential", "area": 100, "location": "Kuala-Lumpur",
                    "timeline": 8, "materials": [{"quantity": 10, "unitPrice": 50}]}"#,
            ),
            now,
        )
        .unwrap();

        assert_eq!(bid.cost_breakdown.base_cost, Decimal::from(104_000));
        assert_eq!(bid.cost_breakdown.material_cost, Decimal::from(500));
        assert_eq!(bid.cost_breakdown.labor_cost, Decimal::from(41_600));
        assert_eq!(bid.cost_breakdown.overhead_cost, Decimal::from(15_600));
        assert_eq!(bid.cost_breakdown.profit_margin, Decimal::from(20_800));
        assert_eq!(bid.cost_breakdown.timeline_adjustment, Decimal::ZERO);
        assert_eq!(bid.total_cost, Decimal::from(182_500));
        assert_eq!(bid.price_per_sqm, Decimal::from(1825));
        assert_eq!(bid.project_details.location, "kuala-lumpur");
        assert_eq!(bid.project_details.complexity, "medium");
        assert_eq!(bid.valid_until, now + Duration::days(30));
        assert_eq!(bid.terms.len(), 4);
    }

    #[test]
    fn short_timeline_adds_a_premium() {
        let bid = estimate(
            request(
                r#"{"project_type": "residential", "area": 100, "location": "kuala-lumpur",
                    "timeline": 4, "materials": [{"quantity": 10, "unit_price": 50}]}"#,
            ),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(bid.total_cost, Decimal::from(200_750));
        assert_eq!(bid.cost_breakdown.timeline_adjustment, Decimal::from(18_250));
        assert_eq!(bid.price_per_sqm, Decimal::from(2008));
    }

    #[test]
    fn long_complex_commercial_job() {
        let bid = estimate(
            request(
                r#"{"projectType": "commercial", "area": 50, "location": "selangor",
                    "complexity": "complex", "timeline": 18}"#,
            ),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(bid.cost_breakdown.base_cost, Decimal::from(93_600));
        assert_eq!(bid.cost_breakdown.timeline_adjustment, Decimal::from(-8190));
        assert_eq!(bid.total_cost, Decimal::from(155_610));
        assert_eq!(bid.price_per_sqm, Decimal::from(3112));
    }

    #[test]
    fn unknown_type_and_location_use_defaults() {
        let bid = estimate(
            request(r#"{"projectType": "spaceport", "area": 10, "location": "Sabah"}"#),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(bid.cost_breakdown.base_cost, Decimal::from(8000));
        assert_eq!(bid.project_details.project_type, "spaceport");
    }

    #[test]
    fn halves_round_up_like_the_quote_sheet() {
        assert_eq!(whole(Decimal::new(-81905, 1)), Decimal::from(-8190));
        assert_eq!(whole(Decimal::new(81905, 1)), Decimal::from(8191));
        assert_eq!(whole(Decimal::new(-26, 1)), Decimal::from(-3));
        assert_eq!(whole(Decimal::new(24, 1)), Decimal::from(2));
    }

    #[test]
    fn huge_inputs_are_rejected_instead_of_overflowing() {
        let err = estimate(
            request(
                r#"{"projectType": "infrastructure", "area": 50000000000000000000000000000,
                    "location": "kuala-lumpur"}"#,
            ),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, EstimateError::OutOfRange);

        let err = estimate(
            request(
                r#"{"projectType": "residential", "area": 10, "location": "penang",
                    "materials": [
                        {"quantity": 70000000000000000000000000000, "unitPrice": 1},
                        {"quantity": 70000000000000000000000000000, "unitPrice": 1}
                    ]}"#,
            ),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, EstimateError::OutOfRange);
    }

    #[test]
    fn required_fields() {
        let err = estimate(request(r#"{"area": 100, "location": "johor"}"#), Utc::now())
            .unwrap_err();
        assert_eq!(err, EstimateError::MissingFields);
        assert_eq!(err.to_string(), "Project type, area, and location are required");

        let err = estimate(
            request(r#"{"projectType": "industrial", "area": 100, "location": "  "}"#),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, EstimateError::MissingFields);

        let err = estimate(
            request(r#"{"projectType": "industrial", "area": 0, "location": "johor"}"#),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, EstimateError::InvalidArea);
    }
}
