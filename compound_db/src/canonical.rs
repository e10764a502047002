//! Canonical, non-isomeric SMILES.
//!
//! Atoms are ranked from graph invariants, the ranks are refined against
//! neighbor ranks until stable, and remaining ties are broken one class at a
//! time. The writer then walks each component depth first from its lowest
//! ranked atom, visiting neighbors in rank order. The order in which atoms are
//! written is returned alongside the string: entry `i` is the input index of
//! the `i`-th written atom.

use crate::smiles::{Atom, BondOrder, Molecule, SmilesError};

#[derive(Debug, Clone, PartialEq)]
pub struct Canonical {
    pub smiles: String,
    pub atom_order: Vec<usize>,
}

/// Turns a structure string into its canonical form.
pub trait Canonicalizer: Send + Sync {
    fn canonicalize(&self, structure: &str) -> Result<Canonical, SmilesError>;
}

/// Larger structures are rejected before ranking.
pub const MAX_ATOMS: usize = 1000;

#[derive(Debug, Default, Clone, Copy)]
pub struct SmilesCanonicalizer;

impl Canonicalizer for SmilesCanonicalizer {

    fn canonicalize(&self, structure: &str) -> Result<Canonical, SmilesError> {

        let mut mol = Molecule::from_smiles(structure)?;
        if mol.num_atoms() > MAX_ATOMS {
            return Err(SmilesError::TooLarge { atoms: mol.num_atoms(), max: MAX_ATOMS });
        }
        mol.strip_stereo();
        mol.simplify_brackets();

        let ranks = canonical_ranks(&mol);
        return Ok(write_smiles(&mol, &ranks));
    }
}

fn dense_ranks<K: Ord>(keys: &[K]) -> Vec<usize> {

    let mut sorted: Vec<&K> = keys.iter().collect();
    sorted.sort();
    sorted.dedup();

    keys.iter()
        .map(|k| match sorted.binary_search(&k) {
            Ok(i) | Err(i) => i,
        })
        .collect()
}

fn num_classes(ranks: &[usize]) -> usize {
    ranks.iter().max().map_or(0, |m| m + 1)
}

fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {

    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..mol.num_atoms())
            .map(|atom| {
                let mut neighbors: Vec<(usize, u8)> = mol
                    .neighbors(atom)
                    .iter()
                    .map(|&(n, b)| (ranks[n], mol.bonds[b].order.code()))
                    .collect();
                neighbors.sort();
                (ranks[atom], neighbors)
            })
            .collect();

        let next = dense_ranks(&keys);
        if num_classes(&next) == num_classes(&ranks) {
            return next;
        }
        ranks = next;
    }
}

/// One distinct rank per atom, invariant under renumbering of the input up to
/// symmetry.
pub fn canonical_ranks(mol: &Molecule) -> Vec<usize> {

    let n = mol.num_atoms();

    let invariants: Vec<(usize, u8, bool, bool, i8, u8, u16)> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, a)| (
            mol.degree(i),
            a.atomic_number,
            a.aromatic,
            a.bracket,
            a.charge,
            a.hydrogens,
            a.class.unwrap_or(0),
        ))
        .collect();

    let mut ranks = refine(mol, dense_ranks(&invariants));

    while num_classes(&ranks) < n {

        let mut counts = vec![0usize; n];
        for r in ranks.iter() {
            counts[*r] += 1;
        }

        let tied = match counts.iter().position(|&c| c > 1) {
            Some(r) => r,
            None => break,
        };
        let chosen = match ranks.iter().position(|&r| r == tied) {
            Some(atom) => atom,
            None => break,
        };

        let split: Vec<usize> = ranks
            .iter()
            .enumerate()
            .map(|(atom, &r)| match (atom == chosen, r == tied) {
                (true, _) => 2 * r,
                (false, true) => 2 * r + 1,
                (false, false) => 2 * r,
            })
            .collect();

        ranks = refine(mol, dense_ranks(&split));
    }

    return ranks;
}

#[derive(Debug, Default)]
struct RingDigits {
    in_use: Vec<bool>,
}

impl RingDigits {

    fn allocate(&mut self) -> usize {

        let free = (1..self.in_use.len()).find(|&d| !self.in_use[d]);
        let digit = match free {
            Some(d) => d,
            None => {
                let d = self.in_use.len().max(1);
                self.in_use.resize(d + 1, false);
                d
            }
        };
        self.in_use[digit] = true;
        return digit;
    }

    fn release(&mut self, digit: usize) {
        self.in_use[digit] = false;
    }
}

fn push_digit(out: &mut String, digit: usize) {

    match digit {
        0..=9 => out.push_str(&digit.to_string()),
        _ => out.push_str(&format!("%{:02}", digit)),
    }
}

fn push_atom(out: &mut String, atom: &Atom) {

    let symbol = match atom.aromatic {
        true => atom.symbol().to_ascii_lowercase(),
        false => atom.symbol().to_string(),
    };

    if !atom.bracket {
        out.push_str(&symbol);
        return;
    }

    out.push('[');
    if let Some(isotope) = atom.isotope {
        out.push_str(&isotope.to_string());
    }
    out.push_str(&symbol);
    if let Some(chirality) = &atom.chirality {
        out.push_str(chirality);
    }
    match atom.hydrogens {
        0 => {}
        1 => out.push('H'),
        h => out.push_str(&format!("H{}", h)),
    }
    match atom.charge {
        0 => {}
        1 => out.push('+'),
        -1 => out.push('-'),
        c if c > 0 => out.push_str(&format!("+{}", c)),
        c => out.push_str(&format!("-{}", -(c as i16))),
    }
    if let Some(class) = atom.class {
        out.push_str(&format!(":{}", class));
    }
    out.push(']');
}

struct Writer<'a> {
    mol: &'a Molecule,
    ranks: &'a [usize],
    visited: Vec<bool>,
    used_bond: Vec<bool>,
    children: Vec<Vec<(usize, usize)>>,
    ring_bonds: Vec<Vec<usize>>,
    order: Vec<usize>,
    position: Vec<usize>,
}

enum Step {
    Atom(usize),
    Text(&'static str),
}

struct Emit {
    out: String,
    digits: RingDigits,
    open: Vec<Option<usize>>,
}

impl<'a> Writer<'a> {

    fn new(mol: &'a Molecule, ranks: &'a [usize]) -> Self {

        let n = mol.num_atoms();
        return Self {
            mol,
            ranks,
            visited: vec![false; n],
            used_bond: vec![false; mol.bonds.len()],
            children: vec![Vec::new(); n],
            ring_bonds: vec![Vec::new(); n],
            order: Vec::with_capacity(n),
            position: vec![0; n],
        };
    }

    fn enter(&mut self, atom: usize) -> (usize, Vec<(usize, usize)>, usize) {

        self.visited[atom] = true;
        self.position[atom] = self.order.len();
        self.order.push(atom);

        let mut neighbors = self.mol.neighbors(atom).to_vec();
        neighbors.sort_by_key(|&(n, _)| self.ranks[n]);
        return (atom, neighbors, 0);
    }

    /// Depth first walk from `root`, splitting bonds into tree edges and ring
    /// closures.
    fn build(&mut self, root: usize) {

        let mut stack = vec![self.enter(root)];

        while let Some((atom, neighbors, cursor)) = stack.last_mut() {
            let atom = *atom;
            let (next, bond) = match neighbors.get(*cursor).copied() {
                Some(edge) => {
                    *cursor += 1;
                    edge
                }
                None => {
                    stack.pop();
                    continue;
                }
            };

            if self.used_bond[bond] {
                continue;
            }
            self.used_bond[bond] = true;

            if self.visited[next] {
                self.ring_bonds[atom].push(bond);
                self.ring_bonds[next].push(bond);
            } else {
                self.children[atom].push((next, bond));
                let frame = self.enter(next);
                stack.push(frame);
            }
        }
    }

    fn bond_symbol(&self, bond: usize) -> &'static str {

        let bond = &self.mol.bonds[bond];
        let both_aromatic = self.mol.atoms[bond.begin].aromatic && self.mol.atoms[bond.end].aromatic;

        match (bond.order, both_aromatic) {
            (BondOrder::Single, true) => "-",
            (BondOrder::Single, false) => "",
            (BondOrder::Aromatic, true) => "",
            (BondOrder::Aromatic, false) => ":",
            (BondOrder::Double, _) => "=",
            (BondOrder::Triple, _) => "#",
            (BondOrder::Quadruple, _) => "$",
        }
    }

    /// The atom itself and its ring bond digits.
    fn emit_atom(&self, atom: usize, state: &mut Emit) {

        push_atom(&mut state.out, &self.mol.atoms[atom]);

        let mut closing: Vec<usize> = Vec::new();
        let mut opening: Vec<usize> = Vec::new();
        for &bond in self.ring_bonds[atom].iter() {
            let partner = self.mol.bonds[bond].other(atom);
            match self.position[partner] < self.position[atom] {
                true => closing.push(bond),
                false => opening.push(bond),
            }
        }
        let partner_position = |bond: &usize| self.position[self.mol.bonds[*bond].other(atom)];
        closing.sort_by_key(partner_position);
        opening.sort_by_key(partner_position);

        let opened: Vec<usize> = opening.iter().map(|_| state.digits.allocate()).collect();

        for bond in closing.iter() {
            if let Some(digit) = state.open[*bond] {
                push_digit(&mut state.out, digit);
            }
        }
        for (bond, digit) in opening.iter().zip(opened) {
            state.out.push_str(self.bond_symbol(*bond));
            push_digit(&mut state.out, digit);
            state.open[*bond] = Some(digit);
        }
        for bond in closing.iter() {
            if let Some(digit) = state.open[*bond].take() {
                state.digits.release(digit);
            }
        }
    }

    /// Writes the tree under `root`, every child but the last in parentheses.
    fn emit(&self, root: usize, state: &mut Emit) {

        let mut steps = vec![Step::Atom(root)];

        while let Some(step) = steps.pop() {
            let atom = match step {
                Step::Atom(atom) => atom,
                Step::Text(text) => {
                    state.out.push_str(text);
                    continue;
                }
            };

            self.emit_atom(atom, state);

            let children = &self.children[atom];
            for (i, &(child, bond)) in children.iter().enumerate().rev() {
                let last = i + 1 == children.len();
                if !last {
                    steps.push(Step::Text(")"));
                }
                steps.push(Step::Atom(child));
                steps.push(Step::Text(self.bond_symbol(bond)));
                if !last {
                    steps.push(Step::Text("("));
                }
            }
        }
    }
}

/// Writes `mol` using `ranks` to choose roots and neighbor order.
pub fn write_smiles(mol: &Molecule, ranks: &[usize]) -> Canonical {

    let mut writer = Writer::new(mol, ranks);

    let mut by_rank: Vec<usize> = (0..mol.num_atoms()).collect();
    by_rank.sort_by_key(|&atom| ranks[atom]);

    let mut roots: Vec<usize> = Vec::new();
    for atom in by_rank {
        if !writer.visited[atom] {
            roots.push(atom);
            writer.build(atom);
        }
    }

    let mut state = Emit {
        out: String::new(),
        digits: RingDigits::default(),
        open: vec![None; mol.bonds.len()],
    };

    for (i, root) in roots.iter().enumerate() {
        if i > 0 {
            state.out.push('.');
        }
        writer.emit(*root, &mut state);
    }

    return Canonical {
        smiles: state.out,
        atom_order: writer.order,
    };
}
