use super::{Patch, SlipBasis};
use crate::base::{Config, InversionError};
use rayon::prelude::*;

/// Holds the location of a discretized segment within the list of patches
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GridBlock {
    /// Index of the first sub-patch of the segment
    pub offset: usize,

    /// Number of sub-patches along strike
    pub nl: usize,

    /// Number of sub-patches along dip
    pub nw: usize,
}

/// Holds the discretized fault and the slip basis associated with each patch
///
/// The unknowns (columns of the system matrix) are ordered patch-major:
/// the unknown for basis direction `b` of patch `p` is `p * n_direction + b`.
/// Bases are stored once and referenced by index from each patch.
#[derive(Clone, Debug)]
pub struct FaultModel {
    patches: Vec<Patch>,
    bases: Vec<SlipBasis>,
    basis_of: Vec<usize>,
    blocks: Vec<GridBlock>,
}

impl FaultModel {
    /// Discretizes the segments and associates one slip basis with every patch
    ///
    /// # Input
    ///
    /// * `segments` -- the parent patches
    /// * `counts` -- `(nl, nw)` for each segment
    /// * `basis` -- the slip basis shared by all patches
    pub fn new(segments: &[Patch], counts: &[(usize, usize)], basis: SlipBasis) -> Result<Self, InversionError> {
        if segments.len() != counts.len() {
            return Err(InversionError::DimensionMismatch(format!(
                "{} segments but {} discretization counts",
                segments.len(),
                counts.len()
            )));
        }
        if segments.is_empty() {
            return Err(InversionError::Geometry("at least one fault segment is required"));
        }
        let children: Vec<Vec<Patch>> = segments
            .par_iter()
            .zip(counts.par_iter())
            .map(|(segment, (nl, nw))| segment.discretize(*nl, *nw))
            .collect::<Result<_, _>>()?;
        let mut patches = Vec::new();
        let mut blocks = Vec::with_capacity(segments.len());
        for (list, (nl, nw)) in children.into_iter().zip(counts) {
            blocks.push(GridBlock {
                offset: patches.len(),
                nl: *nl,
                nw: *nw,
            });
            patches.extend(list);
        }
        let basis_of = vec![0; patches.len()];
        Ok(FaultModel {
            patches,
            bases: vec![basis],
            basis_of,
            blocks,
        })
    }

    /// Builds the model described by the configuration
    pub fn from_config(config: &Config) -> Result<Self, InversionError> {
        let mut segments = Vec::with_capacity(config.segments.len());
        let mut counts = Vec::with_capacity(config.segments.len());
        for s in &config.segments {
            segments.push(Patch::new(s.position, s.length, s.width, s.strike, s.dip)?);
            counts.push((s.n_along_strike, s.n_along_dip));
        }
        let basis = SlipBasis::new(&config.slip_basis)?;
        FaultModel::new(&segments, &counts, basis)
    }

    /// Wraps already discretized patches (each patch is its own 1 × 1 block; no adjacency)
    pub fn from_patches(patches: Vec<Patch>, basis: SlipBasis) -> Self {
        let blocks = (0..patches.len())
            .map(|offset| GridBlock { offset, nl: 1, nw: 1 })
            .collect();
        let basis_of = vec![0; patches.len()];
        FaultModel {
            patches,
            bases: vec![basis],
            basis_of,
            blocks,
        }
    }

    /// Associates a different slip basis with a patch
    ///
    /// The new basis must have the same number of directions as the existing ones.
    pub fn assign_basis(&mut self, patch: usize, basis: SlipBasis) -> Result<(), InversionError> {
        if patch >= self.patches.len() {
            return Err(InversionError::InvalidInput("patch index is out of range"));
        }
        if basis.len() != self.n_direction() {
            return Err(InversionError::DimensionMismatch(format!(
                "basis with {} directions but the model uses {}",
                basis.len(),
                self.n_direction()
            )));
        }
        let index = match self.bases.iter().position(|b| *b == basis) {
            Some(i) => i,
            None => {
                self.bases.push(basis);
                self.bases.len() - 1
            }
        };
        self.basis_of[patch] = index;
        Ok(())
    }

    /// Returns the number of patches
    pub fn n_patch(&self) -> usize {
        self.patches.len()
    }

    /// Returns the number of slip directions per patch
    pub fn n_direction(&self) -> usize {
        self.bases[0].len()
    }

    /// Returns the number of unknowns (patches × directions)
    pub fn n_unknown(&self) -> usize {
        self.n_patch() * self.n_direction()
    }

    /// Returns all patches
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Returns the segment grids
    pub fn blocks(&self) -> &[GridBlock] {
        &self.blocks
    }

    /// Returns the slip basis associated with a patch
    pub fn basis(&self, patch: usize) -> &SlipBasis {
        &self.bases[self.basis_of[patch]]
    }

    /// Returns the `(patch, direction)` pair of an unknown
    pub fn unknown_to_pair(&self, unknown: usize) -> (usize, usize) {
        let nd = self.n_direction();
        (unknown / nd, unknown % nd)
    }

    /// Returns the patch and the slip direction (patch frame) of an unknown
    pub fn source(&self, unknown: usize) -> (&Patch, &[f64; 3]) {
        let (p, b) = self.unknown_to_pair(unknown);
        (&self.patches[p], self.basis(p).direction(b))
    }

    /// Returns the pairs `(a, b)` with `a < b` of patches sharing an edge within a segment
    pub fn adjacent_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for block in &self.blocks {
            for j in 0..block.nw {
                for i in 0..block.nl {
                    let k = block.offset + j * block.nl + i;
                    if i + 1 < block.nl {
                        pairs.push((k, k + 1));
                    }
                    if j + 1 < block.nw {
                        pairs.push((k, k + block.nl));
                    }
                }
            }
        }
        pairs
    }

    /// Returns the patches sharing an edge with patch `p`
    pub fn neighbors(&self, p: usize) -> Vec<usize> {
        let mut list = Vec::new();
        for block in &self.blocks {
            if p < block.offset || p >= block.offset + block.nl * block.nw {
                continue;
            }
            let local = p - block.offset;
            let (i, j) = (local % block.nl, local / block.nl);
            if i > 0 {
                list.push(p - 1);
            }
            if i + 1 < block.nl {
                list.push(p + 1);
            }
            if j > 0 {
                list.push(p - block.nl);
            }
            if j + 1 < block.nw {
                list.push(p + block.nl);
            }
        }
        list
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
