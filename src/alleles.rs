//! Allele index assignment for single-nucleotide sites.
//!
//! Each site gets its own [`AlleleTable`]. The reference base is fixed at
//! index 0; every other base receives the next free index the first time it
//! is observed.

/// Canonical symbols, one slot each. Anything outside `ACGT` lands in `N`.
const SYMBOLS: [u8; 5] = *b"ACGTN";
const UNKNOWN_SLOT: usize = 4;

fn slot(base: u8) -> usize {
    match base.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => UNKNOWN_SLOT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlleleTable {
    reference: u8,
    indices: [Option<u8>; 5],
    assigned: u8,
}

impl AlleleTable {
    pub fn new(reference: u8) -> Self {
        let reference = reference.to_ascii_uppercase();
        let mut indices = [None; 5];
        indices[slot(reference)] = Some(0);

        Self {
            reference,
            indices,
            assigned: 1,
        }
    }

    /// Returns the index of `base`, assigning the next free one on first sight.
    pub fn index_of(&mut self, base: u8) -> u8 {
        let slot = slot(base);
        match self.indices[slot] {
            Some(index) => index,
            None => {
                let index = self.assigned;
                self.indices[slot] = Some(index);
                self.assigned += 1;
                index
            }
        }
    }

    /// Number of indices handed out so far, the reference included.
    pub fn len(&self) -> usize {
        usize::from(self.assigned)
    }

    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Index held by the unknown slot, unless that slot is the reference.
    fn unknown_alternate(&self) -> Option<u8> {
        self.indices[UNKNOWN_SLOT].filter(|&index| index > 0)
    }

    /// Alleles in output order: the reference followed by every observed
    /// `A`/`C`/`G`/`T` alternate in the order it was first seen.
    pub fn alleles(&self) -> Vec<String> {
        let mut alternates: Vec<(u8, u8)> = self
            .indices
            .iter()
            .enumerate()
            .filter(|&(slot, _)| slot != UNKNOWN_SLOT)
            .filter_map(|(slot, index)| index.filter(|&i| i > 0).map(|i| (i, SYMBOLS[slot])))
            .collect();
        alternates.sort_unstable_by_key(|&(index, _)| index);

        std::iter::once(self.reference)
            .chain(alternates.into_iter().map(|(_, symbol)| symbol))
            .map(|base| char::from(base).to_string())
            .collect()
    }

    /// Position of the allele carrying table index `index` within
    /// [`alleles`](Self::alleles), or `None` for an unknown base that is not
    /// the reference.
    pub fn emitted_position(&self, index: u8) -> Option<usize> {
        if index == 0 {
            return Some(0);
        }

        match self.unknown_alternate() {
            Some(unknown) if unknown == index => None,
            Some(unknown) if unknown < index => Some(usize::from(index - 1)),
            _ => Some(usize::from(index)),
        }
    }
}
