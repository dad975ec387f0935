mod common {
    use std::io::Write;

    pub fn init() {
        let _ = env_logger::builder()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .is_test(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use radix_dict::Dict;

    use crate::common;

    fn key(i: usize) -> String {
        // Mixed-length keys with heavy prefix sharing.
        match i % 3 {
            0 => format!("user/{:04}", i),
            1 => format!("user/{:04}/profile", i),
            _ => format!("group/{:x}", i),
        }
    }

    // Every version produced along a chain of inserts stays valid and
    // observable after the chain has moved on.
    #[test]
    fn insert_chain_preserves_every_version() {
        common::init();
        let mut versions = vec![Dict::new()];
        for i in 0..300 {
            let next = versions.last().unwrap().assoc(key(i), i);
            versions.push(next);
        }

        for (n, version) in versions.iter().enumerate() {
            assert_eq!(version.len(), n);
            for i in 0..300 {
                let want = if i < n { Some(i) } else { None };
                assert_eq!(version.get(key(i)).copied(), want);
            }
        }
    }

    #[test]
    fn removal_chain_preserves_every_version() {
        common::init();
        let mut full = Dict::new();
        for i in 0..200 {
            full = full.assoc(key(i), i);
        }

        let mut versions = vec![full.clone()];
        for i in 0..200 {
            let next = versions.last().unwrap().without(key(i));
            versions.push(next);
        }

        assert!(versions.last().unwrap().is_empty());
        for (n, version) in versions.iter().enumerate() {
            assert_eq!(version.len(), 200 - n);
            for i in 0..200 {
                let want = if i >= n { Some(i) } else { None };
                assert_eq!(version.get(key(i)).copied(), want);
            }
        }
        // The starting point never changed.
        assert_eq!(full.len(), 200);
    }

    // Divergent histories from a shared ancestor never interfere.
    #[test]
    fn forked_versions_are_independent() {
        common::init();
        let mut base = Dict::new();
        for i in 0..100 {
            base = base.assoc(key(i), i);
        }

        let mut rng = StdRng::seed_from_u64(42);
        let mut left = base.clone();
        let mut right = base.clone();
        for i in 100..200 {
            if rng.random_bool(0.5) {
                left = left.assoc(key(i), i);
            } else {
                right = right.assoc(key(i), i);
            }
        }
        let left_only: Vec<usize> =
            (100..200).filter(|&i| left.contains_key(key(i))).collect();
        for &i in &left_only {
            assert!(!right.contains_key(key(i)), "{} leaked across versions", key(i));
        }
        assert_eq!(
            left.len() + right.len() - base.len(),
            base.len() + 100,
            "every forked insert must land in exactly one branch"
        );
        for i in 0..100 {
            assert_eq!(left.get(key(i)), Some(&i));
            assert_eq!(right.get(key(i)), Some(&i));
            assert_eq!(base.get(key(i)), Some(&i));
        }
    }
}
