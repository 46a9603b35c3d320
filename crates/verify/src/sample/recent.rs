use spotcheck_storage::ObjectInfo;

/// Keeps the `K` most recently created objects seen so far, in fixed memory.
///
/// Each arrival walks the slots from the left: it fills the first empty
/// slot, or trades places with the first occupant it is newer than and
/// carries that occupant onwards. Whatever is carried past the last slot is
/// dropped, so the slots always hold the newest `K` arrivals. Slot order
/// carries no meaning.
#[derive(Debug)]
pub struct MostRecent {
    slots: Vec<Option<ObjectInfo>>,
}

impl MostRecent {
    pub fn new(k: usize) -> Self {
        Self { slots: vec![None; k] }
    }

    pub fn push(&mut self, mut object: ObjectInfo) {
        for slot in &mut self.slots {
            match slot {
                None => {
                    *slot = Some(object);
                    return;
                },
                Some(current) if object.created > current.created => std::mem::swap(current, &mut object),
                Some(_) => (),
            }
        }
    }

    /// The selected objects, or `None` if fewer than `K` ever arrived.
    pub fn into_full(self) -> Option<Vec<ObjectInfo>> {
        self.slots.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use time::UtcDateTime;

    fn object(key: usize, timestamp: i64) -> ObjectInfo {
        ObjectInfo::new(format!("backup-{key}"), 1, UtcDateTime::from_unix_timestamp(timestamp).unwrap())
    }

    fn sorted_timestamps(objects: &[ObjectInfo]) -> Vec<i64> {
        let mut timestamps: Vec<_> = objects.iter().map(|o| o.created.unix_timestamp()).collect();
        timestamps.sort_unstable();
        timestamps
    }

    #[rstest]
    #[case(1, 1)]
    #[case(1, 50)]
    #[case(3, 3)]
    #[case(5, 40)]
    #[case(10, 200)]
    fn test_matches_brute_force(#[case] k: usize, #[case] population: usize) {
        let mut rng = StdRng::seed_from_u64(population as u64);
        for _ in 0..10 {
            // Plenty of duplicate timestamps on purpose.
            let objects: Vec<_> = (0..population).map(|i| object(i, rng.gen_range(0..population as i64))).collect();
            let mut top = MostRecent::new(k);
            for o in objects.iter().cloned() {
                top.push(o);
            }
            let selected = top.into_full().unwrap();

            let mut expected = objects.clone();
            expected.sort_by(|a, b| b.created.cmp(&a.created));
            expected.truncate(k);
            assert_eq!(sorted_timestamps(&selected), sorted_timestamps(&expected));
        }
    }

    #[test]
    fn test_keeps_newest_regardless_of_order() {
        let mut objects: Vec<_> = (0..20).map(|i| object(i as usize, i)).collect();
        objects.shuffle(&mut StdRng::seed_from_u64(1));
        let mut top = MostRecent::new(3);
        objects.into_iter().for_each(|o| top.push(o));
        assert_eq!(sorted_timestamps(&top.into_full().unwrap()), vec![17, 18, 19]);
    }

    #[test]
    fn test_not_enough_objects() {
        let mut top = MostRecent::new(3);
        top.push(object(0, 0));
        top.push(object(1, 1));
        assert!(top.into_full().is_none());
    }

    #[test]
    fn test_zero_slots_select_nothing() {
        let mut top = MostRecent::new(0);
        top.push(object(0, 0));
        assert_eq!(top.into_full().unwrap(), vec![]);
    }
}
