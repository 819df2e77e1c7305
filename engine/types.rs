use ndarray::ArrayView1;

/// Genotype code marking a sample whose call is missing.
pub const MISSING_GENOTYPE: u8 = 3;

/// Value written into an output row for any statistic that was not computed
/// or is undefined for the pair.
pub const RESULT_MISSING: f64 = -9.0;

/// Read-only access to one SNP's genotype calls, one code per sample.
///
/// Codes are `0`, `1`, `2` (copies of the alternative allele) or
/// [`MISSING_GENOTYPE`]. The row is owned by whatever genotype store the caller
/// uses; the engine only indexes into it.
pub trait GenotypeRow {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> u8;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the genotype as a grid index, or `None` when the call is missing.
    fn category(&self, index: usize) -> Option<usize> {
        match self.get(index) {
            g @ 0..=2 => Some(g as usize),
            _ => None,
        }
    }
}

impl GenotypeRow for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn get(&self, index: usize) -> u8 {
        self[index]
    }
}

impl GenotypeRow for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> u8 {
        self[index]
    }
}

impl GenotypeRow for ArrayView1<'_, u8> {
    fn len(&self) -> usize {
        ArrayView1::len(self)
    }

    fn get(&self, index: usize) -> u8 {
        self[index]
    }
}

/// Which of the two loci in a pair a single-locus quantity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus {
    First,
    Second,
}
