use super::*;

use proptest::prelude::*;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};

/// Keeps only the low three bits of the key, so every table fills its probe
/// windows quickly and the builder is pushed through promotion and fallback.
#[derive(Default)]
struct LowEntropy(u64);

impl Hasher for LowEntropy {
    fn finish(&self) -> u64 {
        self.0 & 0b111
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(31).wrapping_add(b as u64);
        }
    }
}

type LowEntropyState = BuildHasherDefault<LowEntropy>;

/// Insertion-ordered reference model.
#[derive(Default)]
struct Model {
    order: Vec<u16>,
    entries: HashMap<u16, (usize, u32)>,
}

impl Model {
    fn insert(&mut self, key: u16, value: u32) {
        let next = self.order.len();
        let entry = self.entries.entry(key).or_insert((next, value));
        entry.1 = value;
        if entry.0 == next {
            self.order.push(key);
        }
    }

    fn index_of(&self, key: u16) -> Option<usize> {
        self.entries.get(&key).map(|&(i, _)| i)
    }

    fn value_of(&self, key: u16) -> Option<&u32> {
        self.entries.get(&key).map(|(_, v)| v)
    }
}

fn validate_map<S: std::hash::BuildHasher>(map: &IndexedMap<u16, u32, S>, model: &Model) {
    assert_eq!(map.len(), model.order.len(), "map length must match model");
    for (i, &key) in model.order.iter().enumerate() {
        assert_eq!(map.get_index_of(&key), Some(i), "ordinal of {key}");
        assert_eq!(map.key_at(i), Some(&key), "key at ordinal {i}");
        assert_eq!(map.get(&key), model.value_of(key), "value of {key}");
    }
    assert_eq!(map.key_at(model.order.len()), None);
}

#[derive(Clone, Debug, proptest_derive::Arbitrary)]
enum Op {
    Insert(u16, u32),
    Get(u16),
    Contains(u16),
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=max_len)
}

fn narrow_ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    // Small key space so that inserts frequently hit existing keys.
    let key = 0u16..64;
    let op = prop_oneof![
        60 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        20 => key.clone().prop_map(Op::Get),
        20 => key.prop_map(Op::Contains),
    ];
    prop::collection::vec(op, 0..=500)
}

fn run_ops<S>(ops: Vec<Op>, hash_builder: S) -> std::result::Result<(), TestCaseError>
where
    S: std::hash::BuildHasher,
{
    let mut b: IndexBuilder<u16, u32, S> = IndexBuilder::with_hasher(hash_builder);
    let mut m = Model::default();

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                b = b.with_entry(key, value);
                m.insert(key, value);
            }
            Op::Get(key) => {
                prop_assert_eq!(b.get_index_of(&key), m.index_of(key));
            }
            Op::Contains(key) => {
                prop_assert_eq!(b.contains(&key), m.index_of(key).is_some());
            }
        }
        prop_assert_eq!(b.len(), m.order.len());
    }

    let map = b.build();
    validate_map(&map, &m);
    Ok(())
}

#[derive(Clone, Debug)]
struct DedupCase {
    universe_len: usize,
    /// Per sub-set builder, membership of every universe ordinal.
    sets: Vec<Vec<bool>>,
}

fn dedup_case_strategy() -> impl Strategy<Value = DedupCase> {
    (1usize..300, 1usize..10, 1usize..4).prop_flat_map(|(universe_len, builders, templates)| {
        let template = prop::collection::vec(prop::bool::weighted(0.3), universe_len);
        (
            prop::collection::vec(template, templates),
            prop::collection::vec((0..templates, prop::option::of(0..universe_len)), builders),
        )
            .prop_map(move |(templates, picks)| DedupCase {
                universe_len,
                sets: picks
                    .into_iter()
                    .map(|(t, extra)| {
                        let mut set = templates[t].clone();
                        if let Some(ordinal) = extra {
                            set[ordinal] = true;
                        }
                        set
                    })
                    .collect(),
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_builder_equivalence(ops in ops_strategy(3000)) {
        run_ops(ops, DefaultHashBuilder::default())?;
    }

    #[test]
    fn prop_builder_equivalence_narrow(ops in narrow_ops_strategy()) {
        run_ops(ops, DefaultHashBuilder::default())?;
    }

    #[test]
    fn prop_builder_equivalence_low_entropy(ops in ops_strategy(600)) {
        run_ops(ops, LowEntropyState::default())?;
    }

    #[test]
    fn prop_universe_round_trip(
        elements in prop::collection::vec(any::<u32>(), 0..2000),
        probes in prop::collection::vec(any::<u32>(), 0..200),
    ) {
        let u = Universe::of(elements.iter().copied());
        let mut seen = HashSet::new();
        let distinct: Vec<u32> = elements.iter().copied().filter(|e| seen.insert(*e)).collect();

        prop_assert_eq!(u.len(), distinct.len());
        for (i, e) in distinct.iter().enumerate() {
            prop_assert_eq!(u.element_to_index(e), Some(i));
            prop_assert_eq!(u.index_to_element(i), Some(e));
        }
        for p in probes {
            prop_assert_eq!(u.contains(&p), seen.contains(&p));
            if !seen.contains(&p) {
                prop_assert_eq!(u.element_to_index(&p), None);
            }
        }
    }

    #[test]
    fn prop_subset_is_intersection(
        members in prop::collection::vec(0u16..600, 0..400),
        candidates in prop::collection::vec(0u16..600, 0..400),
    ) {
        let u = Universe::of(members.iter().copied());
        let s = SubsetBuilder::new(&u).of(&candidates);

        let universe_set: HashSet<u16> = members.iter().copied().collect();
        let expected: HashSet<u16> = candidates
            .iter()
            .copied()
            .filter(|c| universe_set.contains(c))
            .collect();

        prop_assert_eq!(s.len(), expected.len());
        let got: HashSet<u16> = s.iter().copied().collect();
        prop_assert_eq!(&got, &expected);
        for c in 0u16..600 {
            prop_assert_eq!(s.contains(&c), expected.contains(&c));
        }

        // Members come out in ordinal order.
        let ordinals: Vec<usize> = s.iter().filter_map(|e| u.element_to_index(e)).collect();
        prop_assert!(ordinals.windows(2).all(|w| w[0] < w[1]));

        // Stored words span exactly the lowest and highest member.
        if !s.is_empty() && s.len() < u.len() {
            let first = ordinals[0] / 64;
            let last = ordinals[ordinals.len() - 1] / 64;
            prop_assert_eq!(s.word_offset(), first);
            prop_assert_eq!(s.word_len(), last - first + 1);
        }
    }

    #[test]
    fn prop_dedup_shares_identical_subsets(case in dedup_case_strategy()) {
        let u = Universe::of(0..case.universe_len as u32);
        let mut b = DedupSubsetBuilder::new(u.clone());
        let ids: Vec<SubsetBuilderId> = case
            .sets
            .iter()
            .map(|_| b.create_subset_builder())
            .collect::<Result<_>>()
            .unwrap();

        for ordinal in 0..case.universe_len {
            let element = ordinal as u32;
            if !case.sets.iter().any(|set| set[ordinal]) {
                continue;
            }
            b.next(&element).unwrap();
            for (id, set) in ids.iter().zip(&case.sets) {
                if set[ordinal] {
                    b.add(*id, &element).unwrap();
                }
            }
        }
        let token = b.build().unwrap();

        let subsets: Vec<CompactSubset<u32>> = ids
            .iter()
            .map(|&id| b.build_subset(id, &token).unwrap())
            .collect();

        for (subset, set) in subsets.iter().zip(&case.sets) {
            let expected = SubsetBuilder::new(&u).of(
                set.iter().enumerate().filter(|&(_, &m)| m).map(|(i, _)| i as u32),
            );
            prop_assert_eq!(subset, &expected);
        }
        for (i, a) in subsets.iter().enumerate() {
            for (j, other) in subsets.iter().enumerate() {
                let same = case.sets[i] == case.sets[j];
                if !a.is_empty() {
                    prop_assert_eq!(CompactSubset::ptr_eq(a, other), same);
                }
            }
        }

        let distinct: HashSet<&Vec<bool>> = case
            .sets
            .iter()
            .filter(|set| set.iter().any(|&m| m))
            .collect();
        prop_assert_eq!(b.node_count(), distinct.len());
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    value.hash(&mut h);
    h.finish()
}

fn random_keys(rng: &mut StdRng, n: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(n);
    while keys.len() < n {
        let len = rng.gen_range(4..24);
        let key: String = (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect();
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    keys
}

#[test]
fn random_string_universe_matches_reference_set() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let keys = random_keys(&mut rng, 4_100);
    let u: Universe<String> = keys.iter().cloned().collect();
    let reference: HashSet<String> = keys.iter().cloned().collect();

    assert_eq!(u.len(), reference.len());
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(u.element_to_index(k.as_str()), Some(i));
    }
    assert!(u.iter().all(|k| reference.contains(k)));
    assert!(!u.contains("definitely not a generated key"));

    let mut shuffled = keys.clone();
    for i in (1..shuffled.len()).rev() {
        shuffled.swap(i, rng.gen_range(0..=i));
    }
    let v: Universe<String> = shuffled.into_iter().collect();
    assert_eq!(u, v);
    assert_eq!(hash_of(&u), hash_of(&v));
}

#[test]
fn low_entropy_keys_degrade_and_stay_correct() {
    let mut b: IndexBuilder<u16, u32, LowEntropyState> = IndexBuilder::with_hasher(LowEntropyState::default());
    let mut m = Model::default();
    for key in 0..2_000u16 {
        b = b.with_entry(key, key as u32 * 3);
        m.insert(key, key as u32 * 3);
    }
    assert_eq!(b.capacity(), None);
    let map = b.build();
    validate_map(&map, &m);
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_universe_order_small_set() {
    let elements = ["a", "b", "c", "aa", "ab", "ba"];
    let reference = Universe::of(elements);
    let wanted = ["ab", "c", "zz"];
    let reference_subset = SubsetBuilder::new(&reference).of(wanted);

    for_each_permutation(&elements, |perm| {
        let u = Universe::of(perm.iter().copied());
        for (i, e) in perm.iter().enumerate() {
            assert_eq!(u.element_to_index(e), Some(i));
            assert_eq!(u.index_to_element(i), Some(e));
        }
        assert_eq!(u, reference);
        assert_eq!(hash_of(&u), hash_of(&reference));

        let s = SubsetBuilder::new(&u).of(wanted);
        assert_eq!(s, reference_subset);
        assert_eq!(hash_of(&s), hash_of(&reference_subset));
    });
}

#[test]
fn exhaustive_dedup_add_order_small_set() {
    // Offers within a round may arrive in any order; the outcome must not
    // depend on it.
    let u = Universe::of(["a", "b", "c", "d", "e"]);
    let rounds: [(&str, &[usize]); 4] = [("a", &[0, 1, 2, 3]), ("b", &[0, 1]), ("c", &[2, 3]), ("e", &[1, 3])];

    let mut reference: Option<Vec<CompactSubset<&str>>> = None;
    for_each_permutation(&[0usize, 1, 2, 3], |order| {
        let mut b = DedupSubsetBuilder::new(u.clone());
        let ids: Vec<_> = (0..4).map(|_| b.create_subset_builder().unwrap()).collect();
        for (element, offerers) in rounds {
            b.next(&element).unwrap();
            for &i in &order {
                if offerers.contains(&i) {
                    b.add(ids[i], &element).unwrap();
                }
            }
        }
        let token = b.build().unwrap();
        let subsets: Vec<_> = ids.iter().map(|&id| b.build_subset(id, &token).unwrap()).collect();
        assert_eq!(b.node_count(), 4);
        match &reference {
            Some(r) => assert_eq!(&subsets, r),
            None => reference = Some(subsets),
        }
    });
}

#[test]
fn map_group_matches_reference_map() {
    let mut rng = StdRng::seed_from_u64(42);
    let keys = random_keys(&mut rng, 500);
    let u: Universe<String> = keys.iter().cloned().collect();
    let builder: MapGroupBuilder<String, u64> = MapGroupBuilder::new(u);

    let mut group = builder.group();
    let mut reference = HashMap::new();
    for _ in 0..2_000 {
        let key = &keys[rng.gen_range(0..keys.len())];
        let value: u64 = rng.gen();
        assert_eq!(group.put(key.as_str(), value), Ok(reference.insert(key.clone(), value)));
    }
    assert_eq!(group.len(), reference.len());

    let map = group.build();
    assert_eq!(map.len(), reference.len());
    for (k, v) in &reference {
        assert_eq!(map.get(k.as_str()), Some(v));
    }
    let ordinals: Vec<usize> = map.keys().filter_map(|k| builder.universe().element_to_index(k.as_str())).collect();
    assert!(ordinals.windows(2).all(|w| w[0] < w[1]));
}
