/// One accepted per-tick measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSample {
    pub wpm: u32,
    pub raw_wpm: u32,
    pub errors: u32,
    pub burst: u32,
}

/// Parallel wpm/raw/errors/burst series, one entry per active tick.
///
/// Once frozen (at the start of finalization) pushes are dropped so the
/// consistency score is computed over a stable series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySeries {
    pub wpm: Vec<u32>,
    pub raw_wpm: Vec<u32>,
    pub errors: Vec<u32>,
    pub burst: Vec<u32>,
    frozen: bool,
}

impl HistorySeries {
    pub fn push_speed(&mut self, wpm: u32, raw_wpm: u32, errors: u32) -> bool {
        if self.frozen {
            return false;
        }
        self.wpm.push(wpm);
        self.raw_wpm.push(raw_wpm);
        self.errors.push(errors);
        true
    }

    pub fn push_burst(&mut self, burst: u32) {
        if !self.frozen {
            self.burst.push(burst);
        }
    }

    /// Highest wpm among the last `n` samples.
    pub fn recent_peak(&self, n: usize) -> u32 {
        let from = self.wpm.len().saturating_sub(n);
        self.wpm[from..].iter().copied().max().unwrap_or(0)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn len(&self) -> usize {
        self.wpm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wpm.is_empty()
    }

    pub fn last(&self) -> Option<TickSample> {
        let i = self.wpm.len().checked_sub(1)?;
        Some(TickSample {
            wpm: self.wpm[i],
            raw_wpm: self.raw_wpm[i],
            errors: self.errors[i],
            burst: self.burst.get(i).copied().unwrap_or(0),
        })
    }
}
