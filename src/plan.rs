use std::fmt;

/// Transfer direction of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sweep over every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSpec {
    /// Position in the run, starting at 0.
    pub index: usize,
    pub direction: Direction,
    /// Written pattern, or verified pattern for a read. `None` reads without verifying.
    pub pattern: Option<u8>,
}

/// Ordered list of passes for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    passes: Vec<PassSpec>,
}

impl RunPlan {
    /// A single unverified read pass.
    pub fn read_only() -> Self {
        Self {
            passes: vec![PassSpec { index: 0, direction: Direction::Read, pattern: None }],
        }
    }

    /// `write(p), read(p)` for every pattern, in the given order.
    pub fn write_read(patterns: &[u8]) -> Self {
        let passes = patterns
            .iter()
            .flat_map(|&p| [(Direction::Write, p), (Direction::Read, p)])
            .enumerate()
            .map(|(index, (direction, p))| PassSpec { index, direction, pattern: Some(p) })
            .collect();
        Self { passes }
    }

    pub fn passes(&self) -> &[PassSpec] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.passes.iter().filter(|p| p.direction == direction).count()
    }
}
