//! Konfigurasi run
//!
//! Default = run referensi: buffer 5 slot, 2 producer x 10 item, satu
//! consumer yang mengambil 20 item.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::SetupError;
use crate::sync::{ExitPolicy, FaultPlan};

/// Jeda idle acak antar iterasi worker, inklusif
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleRange {
    pub min: Duration,
    pub max: Duration,
}

impl IdleRange {
    pub const ZERO: IdleRange = IdleRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }
}

impl FromStr for IdleRange {
    type Err = String;

    /// Format `MIN..MAX` dalam milidetik, atau satu angka untuk jeda tetap
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid milliseconds '{}': {}", v, e))
        };

        match s.split_once("..") {
            Some((lo, hi)) => Ok(Self::from_millis(parse(lo)?, parse(hi)?)),
            None => {
                let ms = parse(s)?;
                Ok(Self::from_millis(ms, ms))
            }
        }
    }
}

impl fmt::Display for IdleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}ms", self.min.as_millis(), self.max.as_millis())
    }
}

/// Backend semaphore set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Mutex + Condvar in-process
    #[default]
    Local,
    /// System V semaphore set (Linux)
    Sysv,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub capacity: usize,
    pub producers: usize,
    pub items_per_producer: usize,
    pub producer_idle: IdleRange,
    pub consumer_idle: IdleRange,
    /// `None` = seed dari jam saat run dimulai
    pub seed: Option<u64>,
    pub backend: Backend,
    pub exit_policy: ExitPolicy,
    pub fault: Option<FaultPlan>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            producers: 2,
            items_per_producer: 10,
            producer_idle: IdleRange::from_millis(100, 600),
            consumer_idle: IdleRange::from_millis(200, 800),
            seed: None,
            backend: Backend::Local,
            exit_policy: ExitPolicy::Abandon,
            fault: None,
        }
    }
}

impl RunConfig {
    /// Total item yang harus diambil consumer
    pub fn total_items(&self) -> usize {
        self.producers * self.items_per_producer
    }

    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.capacity == 0 {
            return Err(SetupError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.producers == 0 {
            return Err(SetupError::InvalidConfig("at least one producer is required".into()));
        }
        if self.items_per_producer == 0 {
            return Err(SetupError::InvalidConfig("items per producer must be at least 1".into()));
        }
        if self.producers.checked_mul(self.items_per_producer).is_none() {
            return Err(SetupError::InvalidConfig("total item count overflows".into()));
        }
        for (role, idle) in [("producer", self.producer_idle), ("consumer", self.consumer_idle)] {
            if idle.min > idle.max {
                return Err(SetupError::InvalidConfig(format!(
                    "{} idle range is inverted ({})",
                    role, idle
                )));
            }
        }
        if let Some(plan) = &self.fault {
            if plan.on_call == 0 {
                return Err(SetupError::InvalidConfig("fault call index is 1-based".into()));
            }
        }
        Ok(())
    }
}
