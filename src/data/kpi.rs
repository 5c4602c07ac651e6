//! Derived figures and generated sentences, formatted for a French report.

use super::emissions::PosteEmission;
use super::indicators::{IndicatorValue, VOL_EAU_DISTRIBUEE, VOL_EAU_EPUREE};
use super::tree::{ACTIVITY_AEP, ACTIVITY_EU};
use std::collections::HashMap;

/// tCO₂e of one Paris – New York return flight.
pub const CO2_PER_FLIGHT: f64 = 1.0;

/// Yearly tCO₂e footprint of one French resident.
pub const CO2_PER_PERSON_YEAR: f64 = 10.0;

/// Shown when a ratio cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Format with `decimals` digits, a space as thousands separator and a
/// decimal comma: `12345.678` → `12 345,68`.
pub fn format_decimal(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*c);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(frac);
    }
    out
}

/// Format rounded to the unit: `12345.6` → `12 346`.
pub fn format_number(value: f64) -> String {
    format_decimal(value, 0)
}

/// Number of Paris – New York flights emitting `total_tco2e`.
pub fn flight_equivalent(total_tco2e: f64) -> f64 {
    total_tco2e / CO2_PER_FLIGHT
}

/// Number of French yearly footprints equal to `total_tco2e`.
pub fn person_equivalent(total_tco2e: f64) -> f64 {
    total_tco2e / CO2_PER_PERSON_YEAR
}

/// Volume indicator an activity is normalised by.
pub fn volume_indicator_code(activity: &str) -> Option<&'static str> {
    match activity {
        ACTIVITY_EU => Some(VOL_EAU_EPUREE),
        ACTIVITY_AEP => Some(VOL_EAU_DISTRIBUEE),
        _ => None,
    }
}

/// kgCO₂e per m³; `None` when the volume is missing or not positive.
pub fn kg_per_m3(total_tco2e: f64, volume_m3: Option<f64>) -> Option<f64> {
    volume_m3
        .filter(|v| *v > 0.0)
        .map(|v| total_tco2e * 1000.0 / v)
}

/// `1,23 kgCO₂e/m³`, or `N/A`.
pub fn format_kg_per_m3(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{} kgCO₂e/m³", format_decimal(v, 2)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Total and treated volume of one activity.
#[derive(Debug, Clone, Copy)]
pub struct ActivityVolume<'a> {
    /// Emissions of the activity, tCO₂e
    pub total_tco2e: f64,
    /// Volume indicator of the activity
    pub volume: &'a IndicatorValue,
}

/// Sentence comparing wastewater and drinking-water volumes and emissions.
/// Empty when neither activity has a volume.
pub fn activity_volume_comparison_text(
    eu: Option<ActivityVolume<'_>>,
    aep: Option<ActivityVolume<'_>>,
) -> String {
    let mut sentences = Vec::new();
    if let Some(eu) = eu {
        sentences.push(format!(
            "L'activité Assainissement a traité {} {} pour un total de {} tCO₂e.",
            format_number(eu.volume.value),
            eu.volume.unit,
            format_decimal(eu.total_tco2e, 1)
        ));
    }
    if let Some(aep) = aep {
        sentences.push(format!(
            "L'activité Eau Potable a distribué {} {} pour un total de {} tCO₂e.",
            format_number(aep.volume.value),
            aep.volume.unit,
            format_decimal(aep.total_tco2e, 1)
        ));
    }

    if let (Some(eu), Some(aep)) = (eu, aep) {
        let (major, minor, ratio) = if eu.total_tco2e > aep.total_tco2e {
            ("Assainissement", "Eau Potable", ratio(eu.total_tco2e, aep.total_tco2e))
        } else {
            ("Eau Potable", "Assainissement", ratio(aep.total_tco2e, eu.total_tco2e))
        };
        sentences.push(format!(
            "L'activité {} représente {}x les émissions de l'activité {}.",
            major,
            format_decimal(ratio, 1),
            minor
        ));
    }

    sentences.join(" ")
}

fn ratio(a: f64, b: f64) -> f64 {
    if b > 0.0 {
        a / b
    } else {
        0.0
    }
}

fn label<'a>(labels: &'a HashMap<String, String>, code: &'a str) -> &'a str {
    labels.get(code).map(String::as_str).unwrap_or(code)
}

/// One numbered line per post: `1. Travaux : 1 234,5 tCO₂e`.
pub fn top_postes_list_text(postes: &[PosteEmission], labels: &HashMap<String, String>) -> String {
    postes
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "{}. {} : {} tCO₂e",
                i + 1,
                label(labels, &p.code),
                format_decimal(p.tco2e, 1)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Note listing posts left out of the totals; empty when none are.
pub fn excluded_postes_note(excluded: &[String], labels: &HashMap<String, String>) -> String {
    if excluded.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = excluded.iter().map(|c| label(labels, c)).collect();
    format!(
        "Note : Les postes suivants ont été exclus des totaux de ce rapport : {}. \
         Cette exclusion a été effectuée pour une meilleure représentativité des émissions.",
        names.join(", ")
    )
}
