use flywheel_solv::SolvableId;

/// A fixed-width bitmap over solvable ids.
///
/// The width is the solvable count of the pool the set was created for;
/// inserting an id beyond the width is a programming error and panics. All
/// set algebra is in-place, cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSet {
    bits: Vec<u64>,
    nbits: u32,
}

impl PackageSet {
    /// An empty set able to hold ids below `nbits`.
    pub fn with_capacity(nbits: u32) -> PackageSet {
        PackageSet {
            bits: vec![0; nbits.div_ceil(64) as usize],
            nbits,
        }
    }

    /// The id width of the set.
    pub fn capacity(&self) -> u32 {
        self.nbits
    }

    /// Adds an id.
    pub fn insert(&mut self, id: SolvableId) {
        assert!(id.0 < self.nbits, "solvable id beyond set capacity");
        self.bits[(id.0 / 64) as usize] |= 1 << (id.0 % 64);
    }

    /// Removes an id.
    pub fn remove(&mut self, id: SolvableId) {
        if id.0 < self.nbits {
            self.bits[(id.0 / 64) as usize] &= !(1 << (id.0 % 64));
        }
    }

    /// Membership test. Ids beyond the width are never members.
    pub fn contains(&self, id: SolvableId) -> bool {
        id.0 < self.nbits && self.bits[(id.0 / 64) as usize] & (1 << (id.0 % 64)) != 0
    }

    /// Number of members.
    pub fn cardinality(&self) -> u32 {
        self.bits.iter().map(|block| block.count_ones()).sum()
    }

    /// True when no id is a member.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|block| *block == 0)
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &PackageSet) {
        for (block, other_block) in self.bits.iter_mut().zip(&other.bits) {
            *block |= other_block;
        }
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &PackageSet) {
        for (i, block) in self.bits.iter_mut().enumerate() {
            *block &= other.bits.get(i).copied().unwrap_or(0);
        }
    }

    /// In-place difference (`self − other`).
    pub fn subtract(&mut self, other: &PackageSet) {
        for (i, block) in self.bits.iter_mut().enumerate() {
            *block &= !other.bits.get(i).copied().unwrap_or(0);
        }
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = SolvableId> + '_ {
        (0..self.nbits)
            .map(SolvableId)
            .filter(move |id| self.contains(*id))
    }
}

impl FromIterator<SolvableId> for PackageSet {
    /// Builds a set just wide enough for the highest id.
    fn from_iter<T: IntoIterator<Item = SolvableId>>(iter: T) -> PackageSet {
        let ids: Vec<SolvableId> = iter.into_iter().collect();
        let nbits = ids.iter().map(|id| id.0 + 1).max().unwrap_or(0);
        let mut set = PackageSet::with_capacity(nbits);
        for id in ids {
            set.insert(id);
        }
        set
    }
}
