//! Priority chunk planner
//!
//! Orders every chunk of a bordered region so the square around spawn comes
//! first. The ordering is a pure function of its inputs: resuming a job after
//! a restart recomputes the plan and continues at the persisted index.

/// Chunk edge length in blocks
pub const DEFAULT_UNIT_SIZE: u32 = 16;

/// One chunk offset from the region origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkUnit {
    pub x: i32,
    pub z: i32,
}

impl WorkUnit {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Check whether the unit lies inside the square of the given radius
    pub fn within(&self, radius: i32) -> bool {
        self.x.abs() <= radius && self.z.abs() <= radius
    }
}

/// Radius in chunks covering a square of `size` blocks, plus one ring of margin
pub fn unit_radius(size: u32, unit_size: u32) -> i32 {
    (size / 2 / unit_size.max(1)) as i32 + 1
}

/// Ordered work sequence: priority prefix, then the remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PregenPlan {
    units: Vec<WorkUnit>,
    priority_len: usize,
}

impl PregenPlan {
    /// Plan with the standard 16-block chunk
    pub fn new(border_size: u32, priority_diameter: u32) -> Self {
        Self::with_unit_size(border_size, priority_diameter, DEFAULT_UNIT_SIZE)
    }

    pub fn with_unit_size(border_size: u32, priority_diameter: u32, unit_size: u32) -> Self {
        let radius = unit_radius(border_size, unit_size);
        let priority_radius = unit_radius(priority_diameter, unit_size);

        let side = (radius * 2 + 1) as usize;
        let mut priority = Vec::new();
        let mut remainder = Vec::with_capacity(side * side);

        // Row-major: x outer, z inner, both ascending
        for x in -radius..=radius {
            for z in -radius..=radius {
                let unit = WorkUnit::new(x, z);
                if unit.within(priority_radius) {
                    priority.push(unit);
                } else {
                    remainder.push(unit);
                }
            }
        }

        let priority_len = priority.len();
        priority.append(&mut remainder);

        Self {
            units: priority,
            priority_len,
        }
    }

    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    pub fn priority_units(&self) -> &[WorkUnit] {
        &self.units[..self.priority_len]
    }

    pub fn remainder_units(&self) -> &[WorkUnit] {
        &self.units[self.priority_len..]
    }

    pub fn total(&self) -> usize {
        self.units.len()
    }

    pub fn priority_len(&self) -> usize {
        self.priority_len
    }
}

/// Split the region into (priority units, remainder units)
pub fn plan(border_size: u32, priority_diameter: u32) -> (Vec<WorkUnit>, Vec<WorkUnit>) {
    let plan = PregenPlan::new(border_size, priority_diameter);
    (
        plan.priority_units().to_vec(),
        plan.remainder_units().to_vec(),
    )
}
