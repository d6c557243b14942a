//! Interleaving cards so both directions of a word are not shown back to back.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

/// Reorder `items` round-robin over the buckets formed by `key`, visiting the
/// buckets in a random order each round.
///
/// Two adjacent items share a key only once a single bucket is left. Items
/// keep their relative order within a bucket.
pub fn smart_shuffle<T, K, R>(items: Vec<T>, key: impl Fn(&T) -> K, rng: &mut R) -> Vec<T>
where
    K: PartialEq + Copy,
    R: Rng + ?Sized,
{
    let mut buckets: Vec<(K, VecDeque<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match buckets.iter_mut().find(|(bk, _)| *bk == k) {
            Some((_, bucket)) => bucket.push_back(item),
            None => buckets.push((k, VecDeque::from([item]))),
        }
    }

    let mut out = Vec::new();
    let mut last: Option<K> = None;
    loop {
        let mut round: Vec<usize> = (0..buckets.len())
            .filter(|&i| !buckets[i].1.is_empty())
            .collect();
        if round.is_empty() {
            break;
        }
        round.shuffle(rng);
        // The previous round may have ended on the bucket this one starts with.
        if round.len() > 1 && Some(buckets[round[0]].0) == last {
            let swap_with = rng.gen_range(1..round.len());
            round.swap(0, swap_with);
        }
        for i in round {
            if let Some(item) = buckets[i].1.pop_front() {
                last = Some(buckets[i].0);
                out.push(item);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn adjacent_repeats(keys: &[u32]) -> usize {
        keys.windows(2).filter(|w| w[0] == w[1]).count()
    }

    #[test]
    fn keeps_every_item() {
        let mut rng = StdRng::seed_from_u64(7);
        let items: Vec<(u32, char)> = vec![(1, 'a'), (1, 'b'), (2, 'c'), (3, 'd'), (2, 'e')];
        let mut out = smart_shuffle(items.clone(), |i| i.0, &mut rng);
        assert_eq!(out.len(), items.len());
        out.sort();
        let mut expected = items;
        expected.sort();
        assert_eq!(out, expected);
    }

    #[test]
    fn same_word_never_adjacent_while_others_remain() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            // Two directions for each of four words.
            let items: Vec<u32> = (1..=4).flat_map(|w| [w, w]).collect();
            let out = smart_shuffle(items, |w| *w, &mut rng);
            assert_eq!(adjacent_repeats(&out), 0, "seed {seed}: {out:?}");
        }
    }

    #[test]
    fn single_bucket_tail_may_repeat() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = smart_shuffle(vec![1, 1, 1, 2], |w| *w, &mut rng);
        assert_eq!(out.len(), 4);
        // Word 2 is used up after the first round; the rest is word 1.
        assert_eq!(out.iter().filter(|w| **w == 2).count(), 1);
        assert!(out[2..].iter().all(|w| *w == 1));
    }

    #[test]
    fn order_within_bucket_is_kept() {
        let mut rng = StdRng::seed_from_u64(3);
        let items = vec![(1, 0), (2, 0), (1, 1), (2, 1), (1, 2)];
        let out = smart_shuffle(items, |i| i.0, &mut rng);
        let ones: Vec<_> = out.iter().filter(|i| i.0 == 1).map(|i| i.1).collect();
        assert_eq!(ones, vec![0, 1, 2]);
    }

    #[test]
    fn empty_input() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(smart_shuffle(Vec::<u32>::new(), |w| *w, &mut rng).is_empty());
    }
}
