/// Outcome of a single per-exchange update (spec §4.4 "Outputs").
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub new_level: u32,
    pub level_up: bool,
    pub bonuses: Bonuses,
    pub reward_rank: Option<i64>,
    pub rejected_too_frequent: bool,
    pub emotional_score: f32,
    pub authenticity_score: f32,
}

/// Cumulative bonus deltas applied by this exchange (spec §4.4 step 4/7).
#[derive(Debug, Clone, Default)]
pub struct Bonuses {
    pub emotional: f32,
    pub memories: i64,
    pub growth: i64,
    pub trust: f32,
    pub direct_level: f32,
    pub consistency: f32,
}

impl Bonuses {
    fn combine(mut self, other: Bonuses) -> Self {
        self.emotional += other.emotional;
        self.memories += other.memories;
        self.growth += other.growth;
        self.trust += other.trust;
        self.direct_level += other.direct_level;
        self.consistency += other.consistency;
        self
    }
}

impl std::ops::Add for Bonuses {
    type Output = Bonuses;
    fn add(self, rhs: Bonuses) -> Bonuses {
        self.combine(rhs)
    }
}
