//! SMILES parsing into a small molecular graph.
//!
//! Covers the OpenSMILES organic subset, aromatic atoms, bracket atoms (isotope,
//! chirality, hydrogen count, charge, class), the bond symbols `- = # $ : / \`,
//! branches, ring closures (`0-9` and `%nn`) and `.` disconnections. Chirality and
//! bond directions are parsed so that they can be dropped again for non-isomeric
//! output, they carry no geometry here.

use std::collections::BTreeMap;
use thiserror::Error;

pub const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Aromatic symbols allowed inside brackets, two letter forms first.
const AROMATIC_BRACKET: [(&str, u8); 9] = [
    ("se", 34), ("as", 33), ("te", 52),
    ("b", 5), ("c", 6), ("n", 7), ("o", 8), ("p", 15), ("s", 16),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unknown element {0:?}")]
    UnknownElement(String),
    #[error("unclosed bracket atom starting at position {0}")]
    UnclosedBracket(usize),
    #[error("unbalanced branch at position {0}")]
    UnbalancedBranch(usize),
    #[error("unclosed ring bond {0}")]
    UnclosedRing(u16),
    #[error("conflicting bond symbols on ring bond {0}")]
    RingBondConflict(u16),
    #[error("bond symbol without a following atom at position {0}")]
    DanglingBond(usize),
    #[error("atoms {0} and {1} are bonded twice")]
    DuplicateBond(usize, usize),
    #[error("number out of range at position {0}")]
    NumberOverflow(usize),
    #[error("atom {index} ({symbol}) exceeds its allowed valence")]
    Valence { index: usize, symbol: String },
    #[error("{atoms} atoms, at most {max} are canonicalized")]
    TooLarge { atoms: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// 0 for the `*` wildcard.
    pub atomic_number: u8,
    pub aromatic: bool,
    pub bracket: bool,
    pub isotope: Option<u16>,
    pub chirality: Option<String>,
    /// Explicit hydrogen count, only meaningful for bracket atoms.
    pub hydrogens: u8,
    pub charge: i8,
    pub class: Option<u16>,
}

impl Atom {

    fn organic(atomic_number: u8, aromatic: bool) -> Self {

        return Self {
            atomic_number,
            aromatic,
            bracket: false,
            isotope: None,
            chirality: None,
            hydrogens: 0,
            charge: 0,
            class: None,
        };
    }

    pub fn symbol(&self) -> &'static str {

        match self.atomic_number {
            0 => "*",
            n => ELEMENTS[(n - 1) as usize],
        }
    }

    fn default_valences(&self) -> &'static [u8] {

        match self.atomic_number {
            5 => &[3],
            6 => &[4],
            7 => &[3, 5],
            8 => &[2],
            15 => &[3, 5],
            16 => &[2, 4, 6],
            9 | 17 | 35 | 53 => &[1],
            _ => &[],
        }
    }

    /// Whether the atom may be written without brackets.
    pub fn in_organic_subset(&self) -> bool {

        match (self.atomic_number, self.aromatic) {
            (5, _) | (6, _) | (7, _) | (8, _) | (15, _) | (16, _) => true,
            (9, false) | (17, false) | (35, false) | (53, false) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {

    pub fn code(&self) -> u8 {

        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
            BondOrder::Aromatic => 5,
        }
    }

    /// Contribution to the valence sum of an atom. Aromatic bonds count as one,
    /// the aromatic atom itself adds the remaining electron.
    pub fn valence(&self) -> u8 {

        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
    pub direction: Option<BondDirection>,
}

impl Bond {

    pub fn other(&self, atom: usize) -> usize {
        if self.begin == atom { self.end } else { self.begin }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {

    pub fn from_smiles(smiles: &str) -> Result<Self, SmilesError> {

        let mol = Parser::new(smiles).parse()?;
        mol.check_valence()?;
        return Ok(mol);
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// `(neighbor, bond index)` pairs of an atom, in bond creation order.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    fn add_atom(&mut self, atom: Atom) -> usize {

        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        return self.atoms.len() - 1;
    }

    fn add_bond(&mut self, begin: usize, end: usize, order: BondOrder, direction: Option<BondDirection>) -> Result<(), SmilesError> {

        if begin == end || self.adjacency[begin].iter().any(|&(n, _)| n == end) {
            return Err(SmilesError::DuplicateBond(begin, end));
        }

        let idx = self.bonds.len();
        self.bonds.push(Bond { begin, end, order, direction });
        self.adjacency[begin].push((end, idx));
        self.adjacency[end].push((begin, idx));
        return Ok(());
    }

    fn valence_sum(&self, atom: usize) -> u8 {

        let bonds: u8 = self.adjacency[atom]
            .iter()
            .map(|&(_, b)| self.bonds[b].order.valence())
            .fold(0u8, |acc, v| acc.saturating_add(v));

        match self.atoms[atom].aromatic {
            true => bonds.saturating_add(1),
            false => bonds,
        }
    }

    /// Hydrogens an organic-subset atom would carry if written without brackets.
    pub fn implicit_hydrogens(&self, atom: usize) -> u8 {

        let sum = self.valence_sum(atom);
        self.atoms[atom]
            .default_valences()
            .iter()
            .find(|&&v| v >= sum)
            .map_or(0, |v| v - sum)
    }

    fn check_valence(&self) -> Result<(), SmilesError> {

        for (index, atom) in self.atoms.iter().enumerate() {
            if atom.bracket || atom.aromatic {
                continue;
            }
            if let Some(max) = atom.default_valences().iter().max() {
                if self.valence_sum(index) > *max {
                    return Err(SmilesError::Valence { index, symbol: atom.symbol().to_string() });
                }
            }
        }
        return Ok(());
    }

    /// Drops isotopes, chirality and bond directions.
    pub fn strip_stereo(&mut self) {

        for atom in self.atoms.iter_mut() {
            atom.isotope = None;
            atom.chirality = None;
        }
        for bond in self.bonds.iter_mut() {
            bond.direction = None;
        }
    }

    /// Turns bracket atoms that say nothing a bare symbol wouldn't back into
    /// bare atoms, so `[CH4]` and `C` end up identical.
    pub fn simplify_brackets(&mut self) {

        for idx in 0..self.atoms.len() {
            let atom = &self.atoms[idx];
            let plain = atom.bracket
                && atom.in_organic_subset()
                && atom.isotope.is_none()
                && atom.chirality.is_none()
                && atom.charge == 0
                && atom.class.is_none();

            if plain && self.implicit_hydrogens(idx) == atom.hydrogens {
                let atom = &mut self.atoms[idx];
                atom.bracket = false;
                atom.hydrogens = 0;
            }
        }
    }
}

type PendingBond = (BondOrder, Option<BondDirection>);

struct RingOpening {
    atom: usize,
    bond: Option<PendingBond>,
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    mol: Molecule,
    prev: Option<usize>,
    branches: Vec<(Option<usize>, usize)>,
    pending: Option<(PendingBond, usize)>,
    rings: BTreeMap<u16, RingOpening>,
}

impl<'a> Parser<'a> {

    fn new(input: &'a str) -> Self {

        return Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            mol: Molecule::default(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: BTreeMap::new(),
        };
    }

    fn unexpected(&self) -> SmilesError {

        let ch = self.input[self.pos..].chars().next().unwrap_or('\0');
        SmilesError::UnexpectedChar { ch, pos: self.pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn parse(mut self) -> Result<Molecule, SmilesError> {

        if self.bytes.is_empty() {
            return Err(SmilesError::Empty);
        }

        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    self.branches.push((self.prev, self.pos));
                    self.pos += 1;
                }
                b')' => {
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    match self.branches.pop() {
                        Some((root, _)) => self.prev = root,
                        None => return Err(SmilesError::UnbalancedBranch(self.pos)),
                    }
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    let bond = match c {
                        b'-' => (BondOrder::Single, None),
                        b'=' => (BondOrder::Double, None),
                        b'#' => (BondOrder::Triple, None),
                        b'$' => (BondOrder::Quadruple, None),
                        b':' => (BondOrder::Aromatic, None),
                        b'/' => (BondOrder::Single, Some(BondDirection::Up)),
                        _ => (BondOrder::Single, Some(BondDirection::Down)),
                    };
                    self.pending = Some((bond, self.pos));
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => self.ring_closure()?,
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }

        if let Some((_, at)) = self.pending {
            return Err(SmilesError::DanglingBond(at));
        }
        if let Some((_, at)) = self.branches.last() {
            return Err(SmilesError::UnbalancedBranch(*at));
        }
        if let Some(num) = self.rings.keys().next() {
            return Err(SmilesError::UnclosedRing(*num));
        }
        if self.mol.atoms.is_empty() {
            return Err(SmilesError::Empty);
        }

        return Ok(self.mol);
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {

        match self.mol.atoms[a].aromatic && self.mol.atoms[b].aromatic {
            true => BondOrder::Aromatic,
            false => BondOrder::Single,
        }
    }

    fn attach(&mut self, atom: Atom) -> Result<(), SmilesError> {

        let idx = self.mol.add_atom(atom);

        if let Some(prev) = self.prev {
            let (order, direction) = match self.pending.take() {
                Some((bond, _)) => bond,
                None => (self.default_order(prev, idx), None),
            };
            self.mol.add_bond(prev, idx, order, direction)?;
        }

        self.prev = Some(idx);
        return Ok(());
    }

    fn ring_closure(&mut self) -> Result<(), SmilesError> {

        let start = self.pos;
        let atom = match self.prev {
            Some(atom) => atom,
            None => return Err(self.unexpected()),
        };

        let num = match self.bytes[self.pos] {
            b'%' => {
                let digits = self.bytes.get(self.pos + 1..self.pos + 3);
                match digits {
                    Some(d) if d.iter().all(u8::is_ascii_digit) => {
                        self.pos += 3;
                        ((d[0] - b'0') as u16) * 10 + (d[1] - b'0') as u16
                    }
                    _ => return Err(SmilesError::UnexpectedChar { ch: '%', pos: start }),
                }
            }
            d => {
                self.pos += 1;
                (d - b'0') as u16
            }
        };

        let here = self.pending.take().map(|(bond, _)| bond);

        match self.rings.remove(&num) {
            Some(opening) => {
                let (order, direction) = match (opening.bond, here) {
                    (Some(a), Some(b)) if a.0 != b.0 => return Err(SmilesError::RingBondConflict(num)),
                    (Some(a), _) => a,
                    (None, Some(b)) => b,
                    (None, None) => (self.default_order(opening.atom, atom), None),
                };
                self.mol.add_bond(opening.atom, atom, order, direction)?;
            }
            None => {
                self.rings.insert(num, RingOpening { atom, bond: here });
            }
        }

        return Ok(());
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {

        let c = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();

        let (atomic_number, aromatic, width) = match (c, next) {
            (b'C', Some(b'l')) => (17, false, 2),
            (b'B', Some(b'r')) => (35, false, 2),
            (b'B', _) => (5, false, 1),
            (b'C', _) => (6, false, 1),
            (b'N', _) => (7, false, 1),
            (b'O', _) => (8, false, 1),
            (b'P', _) => (15, false, 1),
            (b'S', _) => (16, false, 1),
            (b'F', _) => (9, false, 1),
            (b'I', _) => (53, false, 1),
            (b'b', _) => (5, true, 1),
            (b'c', _) => (6, true, 1),
            (b'n', _) => (7, true, 1),
            (b'o', _) => (8, true, 1),
            (b'p', _) => (15, true, 1),
            (b's', _) => (16, true, 1),
            (b'*', _) => (0, false, 1),
            _ => return Err(self.unexpected()),
        };

        self.pos += width;
        return Ok(Atom::organic(atomic_number, aromatic));
    }

    fn number(&mut self) -> Result<Option<u16>, SmilesError> {

        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            value = value * 10 + (d - b'0') as u32;
            if value > u16::MAX as u32 {
                return Err(SmilesError::NumberOverflow(start));
            }
            self.pos += 1;
        }

        match self.pos > start {
            true => Ok(Some(value as u16)),
            false => Ok(None),
        }
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {

        let open = self.pos;
        self.pos += 1;

        let isotope = self.number()?;
        let (atomic_number, aromatic) = self.bracket_symbol(open)?;

        let mut chirality = None;
        if self.peek() == Some(b'@') {
            let start = self.pos;
            while self.peek() == Some(b'@') {
                self.pos += 1;
            }
            // @TH1, @SP2, @OH12 and friends
            let rest = &self.input[self.pos..];
            if ["TH", "AL", "SP", "TB", "OH"].iter().any(|class| rest.starts_with(class)) {
                self.pos += 2;
                self.number()?;
            }
            chirality = Some(self.input[start..self.pos].to_string());
        }

        let mut hydrogens = 0;
        if self.peek() == Some(b'H') {
            self.pos += 1;
            hydrogens = match self.number()? {
                Some(n) if n > u8::MAX as u16 => return Err(SmilesError::NumberOverflow(self.pos)),
                Some(n) => n as u8,
                None => 1,
            };
        }

        let mut charge: i32 = 0;
        if let Some(sign @ (b'+' | b'-')) = self.peek() {
            let unit = if sign == b'+' { 1 } else { -1 };
            self.pos += 1;
            charge = match self.number()? {
                Some(n) => unit * n as i32,
                None => {
                    let mut count = 1;
                    while self.peek() == Some(sign) {
                        count += 1;
                        self.pos += 1;
                    }
                    unit * count
                }
            };
            if charge.abs() > 15 {
                return Err(SmilesError::NumberOverflow(self.pos));
            }
        }

        let mut class = None;
        if self.peek() == Some(b':') {
            self.pos += 1;
            class = self.number()?;
            if class.is_none() {
                return Err(self.unexpected());
            }
        }

        match self.peek() {
            Some(b']') => self.pos += 1,
            Some(_) => return Err(self.unexpected()),
            None => return Err(SmilesError::UnclosedBracket(open)),
        }

        return Ok(Atom {
            atomic_number,
            aromatic,
            bracket: true,
            isotope,
            chirality,
            hydrogens,
            charge: charge as i8,
            class,
        });
    }

    fn bracket_symbol(&mut self, open: usize) -> Result<(u8, bool), SmilesError> {

        let rest = &self.input[self.pos..];
        let first = match rest.bytes().next() {
            Some(c) => c,
            None => return Err(SmilesError::UnclosedBracket(open)),
        };

        if first == b'*' {
            self.pos += 1;
            return Ok((0, false));
        }

        if first.is_ascii_lowercase() {
            for (symbol, number) in AROMATIC_BRACKET.iter() {
                if rest.starts_with(symbol) {
                    self.pos += symbol.len();
                    return Ok((*number, true));
                }
            }
            return Err(SmilesError::UnknownElement(rest.chars().take(2).collect()));
        }

        if !first.is_ascii_uppercase() {
            return Err(self.unexpected());
        }

        let two = rest.get(..2).filter(|s| s.as_bytes()[1].is_ascii_lowercase());
        if let Some(two) = two {
            if let Some(idx) = ELEMENTS.iter().position(|e| *e == two) {
                self.pos += 2;
                return Ok(((idx + 1) as u8, false));
            }
        }

        let one = &rest[..1];
        match ELEMENTS.iter().position(|e| *e == one) {
            Some(idx) => {
                self.pos += 1;
                Ok(((idx + 1) as u8, false))
            }
            None => Err(SmilesError::UnknownElement(two.unwrap_or(one).to_string())),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_chain_and_branch() {

        let mol = Molecule::from_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.num_atoms(), 4);
        assert_eq!(mol.bonds.len(), 3);
        assert_eq!(mol.degree(1), 3);
        assert_eq!(mol.bonds[1].order, BondOrder::Double);
        assert_eq!(mol.implicit_hydrogens(0), 3);
        assert_eq!(mol.implicit_hydrogens(3), 1);
    }

    #[test]
    fn parse_aromatic_ring() {

        let mol = Molecule::from_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.num_atoms(), 6);
        assert_eq!(mol.bonds.len(), 6);
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
        for atom in 0..6 {
            assert_eq!(mol.implicit_hydrogens(atom), 1);
        }
    }

    #[test]
    fn parse_two_digit_ring_and_ring_bond_symbol() {

        let mol = Molecule::from_smiles("C%10CCCC%10").unwrap();
        assert_eq!(mol.bonds.len(), 5);

        let mol = Molecule::from_smiles("C=1CCC1").unwrap();
        let closing = mol.bonds.iter().find(|b| b.begin == 0 && b.end == 3).unwrap();
        assert_eq!(closing.order, BondOrder::Double);
    }

    #[test]
    fn parse_bracket_atoms() {

        let mol = Molecule::from_smiles("[13CH4]").unwrap();
        let atom = &mol.atoms[0];
        assert!(atom.bracket);
        assert_eq!(atom.isotope, Some(13));
        assert_eq!(atom.hydrogens, 4);

        let mol = Molecule::from_smiles("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.atoms[0].charge, 1);
        assert_eq!(mol.atoms[1].charge, -1);
        assert_eq!(mol.atoms[1].symbol(), "Cl");
        assert!(mol.bonds.is_empty());

        let mol = Molecule::from_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atoms[1].chirality.as_deref(), Some("@@"));

        let mol = Molecule::from_smiles("[Fe++]").unwrap();
        assert_eq!(mol.atoms[0].charge, 2);

        let mol = Molecule::from_smiles("[nH]1cccc1").unwrap();
        assert!(mol.atoms[0].aromatic);
        assert_eq!(mol.atoms[0].hydrogens, 1);

        let mol = Molecule::from_smiles("[CH3:7]C").unwrap();
        assert_eq!(mol.atoms[0].class, Some(7));
    }

    #[test]
    fn directional_bonds_are_single() {

        let mol = Molecule::from_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].order, BondOrder::Single);
        assert_eq!(mol.bonds[0].direction, Some(BondDirection::Up));

        let mut mol = mol;
        mol.strip_stereo();
        assert!(mol.bonds.iter().all(|b| b.direction.is_none()));
    }

    #[test]
    fn reject_malformed() {

        assert_eq!(Molecule::from_smiles(""), Err(SmilesError::Empty));
        assert!(matches!(Molecule::from_smiles("terbinafine"), Err(SmilesError::UnexpectedChar { ch: 't', pos: 0 })));
        assert!(matches!(Molecule::from_smiles("Terbinafine"), Err(SmilesError::UnexpectedChar { .. })));
        assert_eq!(Molecule::from_smiles("C1CC"), Err(SmilesError::UnclosedRing(1)));
        assert_eq!(Molecule::from_smiles("C(C"), Err(SmilesError::UnbalancedBranch(1)));
        assert_eq!(Molecule::from_smiles("CC)"), Err(SmilesError::UnbalancedBranch(2)));
        assert_eq!(Molecule::from_smiles("[Xx]"), Err(SmilesError::UnknownElement("Xx".to_string())));
        assert_eq!(Molecule::from_smiles("[CH4"), Err(SmilesError::UnclosedBracket(0)));
        assert_eq!(Molecule::from_smiles("CC="), Err(SmilesError::DanglingBond(2)));
        assert_eq!(Molecule::from_smiles("C11"), Err(SmilesError::DuplicateBond(0, 0)));
        assert!(matches!(Molecule::from_smiles("=C"), Err(SmilesError::UnexpectedChar { ch: '=', pos: 0 })));
        assert!(matches!(Molecule::from_smiles("C(C)(C)(C)(C)C"), Err(SmilesError::Valence { index: 0, .. })));
    }

    #[test]
    fn simplify_plain_brackets() {

        let mut mol = Molecule::from_smiles("[CH3][CH2][OH]").unwrap();
        mol.simplify_brackets();
        assert!(mol.atoms.iter().all(|a| !a.bracket));

        // radical and charged atoms keep their brackets
        let mut mol = Molecule::from_smiles("[CH3].[NH4+]").unwrap();
        mol.simplify_brackets();
        assert!(mol.atoms.iter().all(|a| a.bracket));
    }
}
