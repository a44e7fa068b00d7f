/// Threshold table for levels 1..10: `(conversations, minutes, emotional_moments, memories_shared)`.
///
/// spec.md's table gives exact anchors only at L=1, L=2, and L=10
/// (conversations = 2L, minutes 5→10→…→80, moments/memories = L) and
/// describes the rest as "+2 each"/"+5-10 each"/"+1 each" — the minutes
/// column is linearly interpolated between the L=2 and L=10 anchors
/// (see DESIGN.md's Open Question decisions).
const LEVEL_THRESHOLDS: [(u32, u32, u32, u32); 10] = [
    (2, 5, 1, 1),
    (4, 10, 2, 2),
    (6, 19, 3, 3),
    (8, 28, 4, 4),
    (10, 36, 5, 5),
    (12, 45, 6, 6),
    (14, 54, 7, 7),
    (16, 62, 8, 8),
    (18, 71, 9, 9),
    (20, 80, 10, 10),
];

pub struct Counters {
    pub conversations: i64,
    pub time_minutes: f64,
    pub emotional_moments: i64,
    pub memories_shared: i64,
}

/// Promotes to the highest level whose thresholds are all met, never
/// decreasing below `current_level` (spec §4.4 step 8).
pub fn recompute_level(current_level: u32, counters: &Counters) -> u32 {
    let mut level = current_level;
    for (idx, (conv, minutes, moments, memories)) in LEVEL_THRESHOLDS.iter().enumerate() {
        let candidate = (idx + 1) as u32;
        if candidate <= level {
            continue;
        }
        let meets = counters.conversations >= *conv as i64
            && counters.time_minutes >= *minutes as f64
            && counters.emotional_moments >= *moments as i64
            && counters.memories_shared >= *memories as i64;
        if meets {
            level = candidate;
        } else {
            break;
        }
    }
    level.max(current_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_to_highest_level_all_thresholds_met() {
        let counters = Counters {
            conversations: 5,
            time_minutes: 11.0,
            emotional_moments: 3,
            memories_shared: 3,
        };
        assert_eq!(recompute_level(0, &counters), 2);
    }

    #[test]
    fn never_decreases_below_current_level() {
        let counters = Counters {
            conversations: 0,
            time_minutes: 0.0,
            emotional_moments: 0,
            memories_shared: 0,
        };
        assert_eq!(recompute_level(5, &counters), 5);
    }

    #[test]
    fn stops_at_first_unmet_threshold() {
        let counters = Counters {
            conversations: 20,
            time_minutes: 80.0,
            emotional_moments: 3,
            memories_shared: 10,
        };
        // emotional_moments caps the climb at level 3 even though conversations/minutes/memories qualify far higher.
        assert_eq!(recompute_level(0, &counters), 3);
    }
}
