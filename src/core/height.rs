use crate::core::DepthEstimator;
use crate::utils::error::{ProtocolError, Result};
use std::f64::consts::PI;

pub const DEFAULT_WELL_DIAMETER: f64 = 5.5;
pub const DEFAULT_BOTTOM_OFFSET: f64 = 0.3;

/// 以圓柱近似孔位，回傳液面距孔底的高度再加上 `bottom_offset`。
///
/// 錐形孔底忽略不計。負的圓柱高度會被截為 0，因此結果至少是 `bottom_offset`。
pub fn estimate_depth(remaining_volume: f64, well_diameter: f64, bottom_offset: f64) -> f64 {
    let radius = well_diameter / 2.0;
    let cylinder_height = remaining_volume / (PI * radius * radius);
    cylinder_height.max(0.0) + bottom_offset
}

/// 固定幾何的圓柱估算器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderEstimator {
    pub well_diameter: f64,
    pub bottom_offset: f64,
}

impl CylinderEstimator {
    pub fn new(well_diameter: f64, bottom_offset: f64) -> Self {
        Self {
            well_diameter,
            bottom_offset,
        }
    }
}

impl Default for CylinderEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_WELL_DIAMETER, DEFAULT_BOTTOM_OFFSET)
    }
}

impl DepthEstimator for CylinderEstimator {
    fn depth_for(&self, remaining_volume: f64) -> Result<f64> {
        if remaining_volume < 0.0 || remaining_volume.is_nan() {
            return Err(ProtocolError::NegativeVolume {
                volume: remaining_volume,
            });
        }
        Ok(estimate_depth(
            remaining_volume,
            self.well_diameter,
            self.bottom_offset,
        ))
    }

    fn bottom_offset(&self) -> f64 {
        self.bottom_offset
    }
}
