// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    collections::{
        dense::DenseMatrix,
        sparse::SparseMatrix,
    },
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
};
use ::std::ops::Range;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Index of a place inside one net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Place(pub usize);

/// Index of a transition inside one net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition(pub usize);

/// Contiguous run of places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaceRange {
    pub start: usize,
    pub len: usize,
}

/// Contiguous run of transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionRange {
    pub start: usize,
    pub len: usize,
}

/// Position of a sub-model inside a composed net.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub places: PlaceRange,
    pub transitions: TransitionRange,
}

/// Pre/Post incidence, enabling weights, firing rates and marking of one continuous Petri net.
#[derive(Clone, Debug, PartialEq)]
pub struct IncidenceModel {
    /// Consumption weights (places x transitions).
    pub pre: SparseMatrix,
    /// Production weights (places x transitions).
    pub post: SparseMatrix,
    /// Enabling weights (transitions x places). The flow of transition `t` is `lambda[t] * sum_p pi[t, p] * m[p]`.
    pub pi: SparseMatrix,
    /// Firing rates (1/s).
    pub lambda: Vec<Real>,
    /// Marking.
    pub marking: Vec<Real>,
}

/// Incremental builder of one net. Places and transitions are allocated in ranges; arcs are checked on `build`.
#[derive(Debug, Default)]
pub struct NetBuilder {
    marking: Vec<Real>,
    lambda: Vec<Real>,
    pre: Vec<(usize, usize, Real)>,
    post: Vec<(usize, usize, Real)>,
    pi: Vec<(usize, usize, Real)>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PlaceRange {
    /// Returns the `i`-th place of the range.
    pub fn at(&self, i: usize) -> Place {
        debug_assert!(i < self.len, "place {} outside range of {}", i, self.len);
        Place(self.start + i)
    }

    pub fn iter(&self) -> impl Iterator<Item = Place> {
        (self.start..self.start + self.len).map(Place)
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

impl TransitionRange {
    /// Returns the `i`-th transition of the range.
    pub fn at(&self, i: usize) -> Transition {
        debug_assert!(i < self.len, "transition {} outside range of {}", i, self.len);
        Transition(self.start + i)
    }

    pub fn iter(&self) -> impl Iterator<Item = Transition> {
        (self.start..self.start + self.len).map(Transition)
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

impl Block {
    /// Translates a place local to this block into the composed net.
    pub fn place(&self, local: Place) -> usize {
        debug_assert!(local.0 < self.places.len);
        self.places.start + local.0
    }

    /// Translates a transition local to this block into the composed net.
    pub fn transition(&self, local: Transition) -> usize {
        debug_assert!(local.0 < self.transitions.len);
        self.transitions.start + local.0
    }
}

impl IncidenceModel {
    /// Creates a net with no arcs.
    pub fn new(places: usize, transitions: usize) -> Self {
        Self {
            pre: SparseMatrix::new(places, transitions),
            post: SparseMatrix::new(places, transitions),
            pi: SparseMatrix::new(transitions, places),
            lambda: vec![0.0; transitions],
            marking: vec![0.0; places],
        }
    }

    pub fn places(&self) -> usize {
        self.marking.len()
    }

    pub fn transitions(&self) -> usize {
        self.lambda.len()
    }

    /// Checks that every matrix and vector agrees on the number of places and transitions, and that rates and
    /// weights are non-negative.
    pub fn check_dimensions(&self, label: &str) -> Result<(), Fail> {
        let p: usize = self.places();
        let t: usize = self.transitions();
        let shapes: [(&str, usize, usize, usize, usize); 3] = [
            ("pre", self.pre.rows(), self.pre.cols(), p, t),
            ("post", self.post.rows(), self.post.cols(), p, t),
            ("pi", self.pi.rows(), self.pi.cols(), t, p),
        ];
        for (name, rows, cols, expected_rows, expected_cols) in shapes {
            if rows != expected_rows || cols != expected_cols {
                let cause: String = format!(
                    "{}: {} is {}x{}, expected {}x{}",
                    label, name, rows, cols, expected_rows, expected_cols
                );
                error!("check_dimensions(): {}", cause);
                return Err(Fail::new(FailKind::InvalidConfig, &cause));
            }
        }
        let negative_weight: bool = [&self.pre, &self.post, &self.pi]
            .iter()
            .any(|m: &&SparseMatrix| m.iter().any(|(_, _, v)| v < 0.0));
        if negative_weight || self.lambda.iter().any(|rate: &Real| *rate < 0.0 || !rate.is_finite()) {
            let cause: String = format!("{}: negative weight or rate", label);
            error!("check_dimensions(): {}", cause);
            return Err(Fail::new(FailKind::InvalidConfig, &cause));
        }
        Ok(())
    }

    /// Block-diagonal union of several nets. Returns the composed net and the block of each part.
    pub fn compose(parts: &[&IncidenceModel]) -> Result<(Self, Vec<Block>), Fail> {
        let places: usize = parts.iter().map(|part: &&IncidenceModel| part.places()).sum();
        let transitions: usize = parts.iter().map(|part: &&IncidenceModel| part.transitions()).sum();
        let mut composed: IncidenceModel = Self::new(places, transitions);
        let mut blocks: Vec<Block> = Vec::with_capacity(parts.len());

        let mut place_offset: usize = 0;
        let mut transition_offset: usize = 0;
        for part in parts {
            composed.pre.embed(&part.pre, place_offset, transition_offset)?;
            composed.post.embed(&part.post, place_offset, transition_offset)?;
            composed.pi.embed(&part.pi, transition_offset, place_offset)?;
            composed.lambda[transition_offset..transition_offset + part.transitions()].copy_from_slice(&part.lambda);
            composed.marking[place_offset..place_offset + part.places()].copy_from_slice(&part.marking);
            blocks.push(Block {
                places: PlaceRange {
                    start: place_offset,
                    len: part.places(),
                },
                transitions: TransitionRange {
                    start: transition_offset,
                    len: part.transitions(),
                },
            });
            place_offset += part.places();
            transition_offset += part.transitions();
        }
        Ok((composed, blocks))
    }

    /// Incidence matrix `C = Post - Pre`.
    pub fn incidence(&self) -> Result<SparseMatrix, Fail> {
        self.post.sub(&self.pre)
    }

    /// Continuous-time generator `A = C * diag(lambda * control) * Pi`.
    pub fn generator(&self, control: &[Real]) -> Result<DenseMatrix, Fail> {
        if control.len() != self.transitions() {
            let cause: String = format!(
                "control vector has {} entries for {} transitions",
                control.len(),
                self.transitions()
            );
            error!("generator(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        let columns: Vec<Vec<(usize, Real)>> = self.incidence()?.columns();
        let enabling: Vec<Vec<(usize, Real)>> = self.pi.row_lists();
        let mut a: DenseMatrix = DenseMatrix::zeros(self.places(), self.places());
        for t in 0..self.transitions() {
            let rate: Real = self.lambda[t] * control[t];
            if rate == 0.0 {
                continue;
            }
            for &(p, c) in &columns[t] {
                for &(q, w) in &enabling[t] {
                    a[(p, q)] += c * rate * w;
                }
            }
        }
        Ok(a)
    }
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `count` places with the same initial marking.
    pub fn add_places(&mut self, count: usize, initial: Real) -> PlaceRange {
        let start: usize = self.marking.len();
        self.marking.extend(::std::iter::repeat(initial).take(count));
        PlaceRange { start, len: count }
    }

    /// Allocates `count` transitions with the same firing rate.
    pub fn add_transitions(&mut self, count: usize, rate: Real) -> TransitionRange {
        let start: usize = self.lambda.len();
        self.lambda.extend(::std::iter::repeat(rate).take(count));
        TransitionRange { start, len: count }
    }

    pub fn set_marking(&mut self, place: Place, value: Real) -> &mut Self {
        self.marking[place.0] = value;
        self
    }

    pub fn set_rate(&mut self, transition: Transition, rate: Real) -> &mut Self {
        self.lambda[transition.0] = rate;
        self
    }

    /// Arc consumed by `transition` from `place`.
    pub fn pre(&mut self, place: Place, transition: Transition, weight: Real) -> &mut Self {
        self.pre.push((place.0, transition.0, weight));
        self
    }

    /// Arc produced by `transition` into `place`.
    pub fn post(&mut self, place: Place, transition: Transition, weight: Real) -> &mut Self {
        self.post.push((place.0, transition.0, weight));
        self
    }

    /// Enabling weight with which `transition` reads `place`.
    pub fn pi(&mut self, transition: Transition, place: Place, weight: Real) -> &mut Self {
        self.pi.push((transition.0, place.0, weight));
        self
    }

    pub fn places(&self) -> usize {
        self.marking.len()
    }

    pub fn transitions(&self) -> usize {
        self.lambda.len()
    }

    /// Assembles the net, rejecting arcs to places or transitions that were never allocated.
    pub fn build(self, label: &str) -> Result<IncidenceModel, Fail> {
        let p: usize = self.marking.len();
        let t: usize = self.lambda.len();
        let model: IncidenceModel = IncidenceModel {
            pre: SparseMatrix::from_triplets(p, t, self.pre)?,
            post: SparseMatrix::from_triplets(p, t, self.post)?,
            pi: SparseMatrix::from_triplets(t, p, self.pi)?,
            lambda: self.lambda,
            marking: self.marking,
        };
        model.check_dimensions(label)?;
        trace!("build(): {} has {} places and {} transitions", label, p, t);
        Ok(model)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
