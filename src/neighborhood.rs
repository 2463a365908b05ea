//! Cells near a center under a distance metric.
//!
//! Infection spread, limited movement and the reproduction-number estimate
//! all use [`neighborhood`], so "nearby" means the same thing everywhere.

use crate::error::GridError;
use crate::model::GridPos;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Metric {
    Manhattan,
    Euclidean,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Manhattan => "manhattan",
            Metric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = GridError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_ascii_lowercase().as_str() {
            "manhattan" => Ok(Metric::Manhattan),
            "euclidean" => Ok(Metric::Euclidean),
            _ => Err(GridError::InvalidMetric(tag.to_string())),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = GridError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<Metric> for &'static str {
    fn from(metric: Metric) -> Self {
        metric.as_str()
    }
}

/// In-bounds cells within `radius` of `center`, center excluded.
///
/// Manhattan yields the diamond `|dr| + |dc| <= radius`. Euclidean yields
/// every cell with `0 < round(sqrt(dr² + dc²)) <= radius`, so the boundary
/// admits cells whose true distance rounds down to the radius.
///
/// Offsets are clipped to the grid first, so any radius is cheap.
pub fn neighborhood(center: GridPos, radius: usize, metric: Metric, size: usize) -> Vec<GridPos> {
    if center.row() >= size || center.col() >= size {
        return Vec::new();
    }
    let r = radius.min(2 * size) as isize;
    let (row, col) = (center.row() as isize, center.col() as isize);
    let last = size as isize - 1;
    let side = (2 * r + 1).min(size as isize) as usize;
    let mut cells = Vec::with_capacity(side * side);

    for dr in (-r).max(-row)..=r.min(last - row) {
        let span = match metric {
            Metric::Manhattan => r - dr.abs(),
            Metric::Euclidean => r,
        };
        for dc in (-span).max(-col)..=span.min(last - col) {
            if dr == 0 && dc == 0 {
                continue;
            }
            if metric == Metric::Euclidean {
                let dist = ((dr * dr + dc * dc) as f64).sqrt().round();
                if dist <= 0.0 || dist > radius as f64 {
                    continue;
                }
            }
            if let Some(pos) = offset(center, dr, dc, size) {
                cells.push(pos);
            }
        }
    }

    cells
}

fn offset(center: GridPos, dr: isize, dc: isize, size: usize) -> Option<GridPos> {
    let row = center.row().checked_add_signed(dr)?;
    let col = center.col().checked_add_signed(dc)?;
    (row < size && col < size).then(|| GridPos::new(row, col))
}
