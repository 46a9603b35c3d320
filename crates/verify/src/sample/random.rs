use crate::consts::is_banned;
use crate::error::{ErrorKind, Result, StorageResultExt};
use rand::Rng;
use spotcheck_storage::{ListQuery, ObjectStore};
use std::collections::HashSet;

/// Pick `k` distinct indices from `0..population`, in no particular order.
///
/// Returns an empty list when `k` is zero, and also when `k` exceeds
/// `population` (callers treat that as "not enough to sample"). When `k`
/// equals `population` the whole range is returned as-is.
pub fn sample_indices<R: Rng + ?Sized>(rng: &mut R, k: usize, population: usize) -> Vec<usize> {
    if k == 0 || k > population {
        return Vec::new();
    }
    if k == population {
        return (0..population).collect();
    }
    let mut seen = HashSet::with_capacity(k);
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let index = rng.gen_range(0..population);
        if seen.insert(index) {
            picked.push(index);
        }
    }
    picked
}

/// Pick `count` random keys under `prefix`, skipping banned keys.
///
/// # Errors
/// [`ErrorKind::NotFound`] if the bucket is missing or holds fewer than
/// `count` eligible keys under `prefix`.
pub(crate) async fn random_keys(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    count: usize,
) -> Result<Vec<String>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let keys: Vec<String> = store
        .list(bucket, ListQuery::prefix(prefix))
        .await
        .or_storage(|| format!("listing `{bucket}/{prefix}`"))?
        .into_iter()
        .filter_map(|entry| entry.into_object())
        .map(|object| object.key)
        .filter(|key| !is_banned(key))
        .collect();
    pick(keys, count).ok_or_else(|| {
        exn::Exn::from(ErrorKind::NotFound(format!(
            "not enough files to sample in `{bucket}/{prefix}`: wanted {count}"
        )))
    })
}

fn pick(mut keys: Vec<String>, count: usize) -> Option<Vec<String>> {
    let mut indices = sample_indices(&mut rand::thread_rng(), count, keys.len());
    if indices.is_empty() {
        return None;
    }
    // Descending, so each swap_remove only disturbs indices already taken.
    indices.sort_unstable_by(|a, b| b.cmp(a));
    Some(indices.into_iter().map(|index| keys.swap_remove(index)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;
    use spotcheck_storage::backend::MockBackend;
    use time::UtcDateTime;

    #[rstest]
    #[case(0, 10)]
    #[case(0, 0)]
    #[case(11, 10)]
    #[case(1, 0)]
    fn test_sample_edge_cases_are_empty(#[case] k: usize, #[case] population: usize) {
        assert!(sample_indices(&mut StdRng::seed_from_u64(7), k, population).is_empty());
    }

    #[test]
    fn test_sample_whole_population() {
        assert_eq!(sample_indices(&mut StdRng::seed_from_u64(7), 5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[rstest]
    #[case(1, 1_000)]
    #[case(3, 4)]
    #[case(50, 100)]
    #[case(99, 100)]
    fn test_sample_is_distinct_and_in_range(#[case] k: usize, #[case] population: usize) {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let picked = sample_indices(&mut rng, k, population);
            assert_eq!(picked.len(), k);
            assert!(picked.iter().all(|&i| i < population));
            assert_eq!(picked.iter().collect::<HashSet<_>>().len(), k);
        }
    }

    fn store() -> MockBackend {
        let created = UtcDateTime::now();
        MockBackend::default()
            .with_page_size(3)
            .with_object("photos", "2020-01/a.jpg", b"a", created)
            .with_object("photos", "2020-01/a.AAE", b"x", created)
            .with_object("photos", "2020-01/b.jpg", b"b", created)
            .with_object("photos", "2020-02/c.jpg", b"c", created)
            .with_object("photos", "2020-02/c.aae", b"x", created)
    }

    #[tokio::test]
    async fn test_random_keys_skip_banned() {
        let store = store();
        let mut keys = random_keys(&store, "photos", "2020-01", 2).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["2020-01/a.jpg", "2020-01/b.jpg"]);

        let keys = random_keys(&store, "photos", "2020-", 3).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| !k.to_lowercase().ends_with("aae")));
    }

    #[tokio::test]
    async fn test_random_keys_not_enough() {
        let store = store();
        // Three objects under the prefix, but only one is eligible.
        let err = random_keys(&store, "photos", "2020-02", 2).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(m) if m.contains("not enough")));
        let err = random_keys(&store, "photos", "2019-", 1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_random_keys_zero_is_empty() {
        let store = MockBackend::default();
        assert!(random_keys(&store, "anything", "", 0).await.unwrap().is_empty());
    }
}
