//! Recognised configuration options (§6): granularity, the slicer's tick
//! period, and whether to trust configured node counts over live readings.

use crate::error::GangError;
use crate::granularity::Granularity;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub granularity: Granularity,
    pub time_slice_seconds: u64,
    pub fast_schedule: bool,
}

impl Config {
    pub fn new(granularity_str: &str, time_slice_seconds: u64, fast_schedule: bool) -> Result<Self, GangError> {
        let granularity = Granularity::from_config_str(granularity_str)
            .ok_or_else(|| GangError::InvalidConfig(format!("unrecognised granularity '{granularity_str}'")))?;
        if time_slice_seconds == 0 {
            return Err(GangError::InvalidConfig("time_slice_seconds must be positive".to_string()));
        }
        Ok(Config { granularity, time_slice_seconds, fast_schedule })
    }
}
