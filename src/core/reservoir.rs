use crate::core::DepthEstimator;
use crate::utils::error::{ProtocolError, Result};

/// 浮點誤差容忍值，避免最後一次抽取因 1e-15 的差距被判定為不足
const VOLUME_TOLERANCE: f64 = 1e-9;

/// 儲液孔的剩餘體積估計，沒有感測器回饋
#[derive(Debug, Clone, PartialEq)]
pub struct ReservoirState {
    pub well_id: String,
    remaining_volume: f64,
}

impl ReservoirState {
    pub fn new(well_id: impl Into<String>, initial_volume: f64) -> Result<Self> {
        let well_id = well_id.into();
        if initial_volume < 0.0 || initial_volume.is_nan() {
            return Err(ProtocolError::NegativeVolume {
                volume: initial_volume,
            });
        }
        Ok(Self {
            well_id,
            remaining_volume: initial_volume,
        })
    }

    pub fn remaining_volume(&self) -> f64 {
        self.remaining_volume
    }

    /// 先扣除本次抽取量，再以抽取後的體積計算深度。
    /// 順序不可對調，否則最後幾次會吸到空氣。
    pub fn withdraw<E: DepthEstimator>(&mut self, amount: f64, estimator: &E) -> Result<f64> {
        let after = self.volume_after(amount)?;
        let depth = estimator.depth_for(after)?;
        self.remaining_volume = after;
        tracing::debug!(
            "🧪 {}: withdraw {:.2}, {:.2} left, depth {:.3}mm",
            self.well_id,
            amount,
            after,
            depth
        );
        Ok(depth)
    }

    /// 計算連續 `count` 次等量抽取的深度，不修改狀態
    pub fn plan<E: DepthEstimator>(
        &self,
        amount: f64,
        count: usize,
        estimator: &E,
    ) -> Result<Vec<f64>> {
        let mut shadow = self.clone();
        (0..count)
            .map(|_| shadow.withdraw(amount, estimator))
            .collect()
    }

    fn volume_after(&self, amount: f64) -> Result<f64> {
        if amount < 0.0 || amount.is_nan() {
            return Err(ProtocolError::NegativeVolume { volume: amount });
        }
        let after = self.remaining_volume - amount;
        if after < -VOLUME_TOLERANCE {
            return Err(ProtocolError::InsufficientVolume {
                reservoir_id: self.well_id.clone(),
                requested: amount,
                remaining: self.remaining_volume,
            });
        }
        Ok(after.max(0.0))
    }
}
