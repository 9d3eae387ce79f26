use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Deref, DerefMut};
use instant::{Duration, Instant};
use bit_set::BitSet;
use log::{debug, trace};
use smallvec::SmallVec;

/// The expected maximum length for a single slot.
pub const MAX_SLOT_LENGTH: usize = 21;

/// An identifier for a given slot, based on its index in the Grid's `slots` field. Slots are
/// stored in their natural order, so comparing ids compares slots.
pub type SlotId = usize;

/// An identifier for a given word, based on its index in the Dictionary's `words` field.
pub type WordId = usize;

/// Zero-indexed (row, column) coords for a cell in the grid, where row 0 is the top row.
pub type GridCoord = (usize, usize);

/// Problems with the input handed to the filler, detected while building the grid or the
/// dictionary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("grid has no cells")]
    EmptyGrid,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },

    #[error("word #{index} in the word list is empty")]
    EmptyWord { index: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Across,
    Down,
}

/// A maximal run of fillable cells that must hold one word. Slots order by start cell, then
/// direction, then length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,
}

impl Slot {
    /// Generate the coords for each cell of this slot.
    pub fn cell_coords(&self) -> impl Iterator<Item = GridCoord> {
        let (row, col) = self.start_cell;
        let direction = self.direction;

        (0..self.length).map(move |cell_idx| match direction {
            Direction::Across => (row, col + cell_idx),
            Direction::Down => (row + cell_idx, col),
        })
    }
}

/// Find the maximal runs of fillable cells along one row or column, as (start, length) pairs.
/// Runs of a single cell aren't slots.
fn fillable_runs<F>(line_length: usize, is_fillable: F) -> Vec<(usize, usize)>
    where
        F: Fn(usize) -> bool
{
    let mut runs = vec![];
    let mut run_start = None;

    for idx in 0..=line_length {
        let fillable = idx < line_length && is_fillable(idx);

        match (run_start, fillable) {
            (None, true) => run_start = Some(idx),
            (Some(start), false) => {
                if idx - start > 1 {
                    runs.push((start, idx - start));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    runs
}

/// The fixed geometry of a puzzle: which cells can hold letters, the slots they form, and where
/// those slots cross. Everything is computed once, up front.
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Vec<bool>>,
    slots: Vec<Slot>,

    /// For every ordered pair of crossing slots, the index of the shared cell within each one.
    overlaps: HashMap<(SlotId, SlotId), (usize, usize)>,

    /// The slots crossing each slot, in id order.
    neighbors: Vec<SmallVec<[SlotId; MAX_SLOT_LENGTH]>>,
}

impl Debug for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("slots", &self.slots)
            .field("overlaps", &format!("({} crossings)", self.overlaps.len() / 2))
            .finish()
    }
}

impl Grid {
    /// Build a grid from a matrix of fillable (`true`) and blocked (`false`) cells.
    pub fn new(cells: Vec<Vec<bool>>) -> Result<Grid> {
        let height = cells.len();
        let width = cells.first().map(|row| row.len()).unwrap_or(0);
        if width == 0 {
            return Err(Error::EmptyGrid);
        }

        if let Some((row, found)) =
            cells.iter().map(|row| row.len()).enumerate().find(|&(_, len)| len != width)
        {
            return Err(Error::RaggedRow { row, expected: width, found });
        }

        let mut slots: Vec<Slot> = vec![];

        for row in 0..height {
            for (col, length) in fillable_runs(width, |col| cells[row][col]) {
                slots.push(Slot { start_cell: (row, col), direction: Direction::Across, length });
            }
        }

        for col in 0..width {
            for (row, length) in fillable_runs(height, |row| cells[row][col]) {
                slots.push(Slot { start_cell: (row, col), direction: Direction::Down, length });
            }
        }

        slots.sort();

        // Build a map from cell location to the slots running through it, which we can then use
        // to calculate crossings.
        let mut entries_by_cell: HashMap<GridCoord, SmallVec<[(SlotId, usize); 2]>> = HashMap::new();
        for (slot_id, slot) in slots.iter().enumerate() {
            for (cell_idx, loc) in slot.cell_coords().enumerate() {
                entries_by_cell.entry(loc).or_default().push((slot_id, cell_idx));
            }
        }

        let mut overlaps = HashMap::new();
        let mut neighbors: Vec<SmallVec<[SlotId; MAX_SLOT_LENGTH]>> =
            slots.iter().map(|_| SmallVec::new()).collect();

        for entries in entries_by_cell.values() {
            // Runs are maximal, so two slots facing the same way never share a cell.
            debug_assert!(entries.len() <= 2, "More than two slots crossing in cell?");

            if let &[(a, a_cell), (b, b_cell)] = entries.as_slice() {
                debug_assert!(a_cell < slots[a].length && b_cell < slots[b].length);

                overlaps.insert((a, b), (a_cell, b_cell));
                overlaps.insert((b, a), (b_cell, a_cell));
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }

        for slot_neighbors in &mut neighbors {
            slot_neighbors.sort_unstable();
        }

        Ok(Grid { height, width, cells, slots, overlaps, neighbors })
    }

    /// Build a grid from a text template with one line per row, where `_` or `.` marks a
    /// fillable cell and anything else (conventionally `#`) marks a block. Blank lines and
    /// surrounding whitespace are ignored. The grid is as wide as the longest line; shorter
    /// lines are blocked past their end.
    pub fn from_template(template: &str) -> Result<Grid> {
        let mut cells: Vec<Vec<bool>> =
            template.lines().filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    None
                } else {
                    Some(line.chars().map(|c| c == '_' || c == '.').collect())
                }
            }).collect();

        let width = cells.iter().map(|row| row.len()).max().unwrap_or(0);
        for row in &mut cells {
            row.resize(width, false);
        }

        Grid::new(cells)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_fillable(&self, row: usize, col: usize) -> bool {
        self.cells[row][col]
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: SlotId) -> &Slot {
        &self.slots[slot_id]
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Look up the id of a slot by its position.
    pub fn slot_id(&self, slot: &Slot) -> Option<SlotId> {
        self.slots.binary_search(slot).ok()
    }

    /// The cell indexes `(in a, in b)` at which the two slots share a cell, if they cross.
    pub fn overlap(&self, a: SlotId, b: SlotId) -> Option<(usize, usize)> {
        self.overlaps.get(&(a, b)).copied()
    }

    /// All slots crossing the given one, excluding itself.
    pub fn neighbors(&self, slot_id: SlotId) -> &[SlotId] {
        &self.neighbors[slot_id]
    }

    /// Every ordered pair of crossing slots, in slot order.
    pub fn arcs(&self) -> impl Iterator<Item = (SlotId, SlotId)> + '_ {
        self.neighbors.iter().enumerate().flat_map(|(x, slot_neighbors)| {
            slot_neighbors.iter().map(move |&y| (x, y))
        })
    }
}

/// A struct representing a word that can be chosen for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub string: String,
    pub letters: SmallVec<[char; MAX_SLOT_LENGTH]>,
}

impl Word {
    /// The number of letters (not bytes) in the word.
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

/// The distinct candidate words, sorted so that word ids are stable for a given word list.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: Vec<Word>,
}

impl Dictionary {
    /// Build a dictionary from the given words, dropping duplicates. Words are taken as-is.
    pub fn new<I, S>(words: I) -> Result<Dictionary>
        where
            I: IntoIterator<Item = S>,
            S: AsRef<str>,
    {
        let mut strings = BTreeSet::new();

        for (index, word) in words.into_iter().enumerate() {
            let word = word.as_ref();
            if word.is_empty() {
                return Err(Error::EmptyWord { index });
            }
            strings.insert(word.to_string());
        }

        Ok(Dictionary::from_sorted_strings(strings))
    }

    /// Parse a word list with one word per line. Lines are trimmed and upper-cased, and blank
    /// lines are skipped.
    pub fn from_word_list(word_list: &str) -> Dictionary {
        let strings: BTreeSet<String> = word_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_uppercase)
            .collect();

        Dictionary::from_sorted_strings(strings)
    }

    fn from_sorted_strings(strings: BTreeSet<String>) -> Dictionary {
        Dictionary {
            words: strings.into_iter().map(|string| {
                Word { letters: string.chars().collect(), string }
            }).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, word_id: WordId) -> &Word {
        &self.words[word_id]
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Look up the id of a word.
    pub fn find(&self, word: &str) -> Option<WordId> {
        self.words.binary_search_by(|candidate| candidate.string.as_str().cmp(word)).ok()
    }
}

/// Do the two given words agree on the cell shared by the two given slots? Slots that don't
/// cross always agree.
fn letters_agree(
    grid: &Grid,
    dictionary: &Dictionary,
    (slot_id, word_id): (SlotId, WordId),
    (other_slot_id, other_word_id): (SlotId, WordId),
) -> bool {
    match grid.overlap(slot_id, other_slot_id) {
        Some((cell, other_cell)) => {
            let letter = dictionary.word(word_id).letters.get(cell);
            let other_letter = dictionary.word(other_word_id).letters.get(other_cell);

            letter.is_some() && letter == other_letter
        }
        None => true,
    }
}

/// Returned by `ac3` when propagation leaves a slot with no candidates at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencyFailure {
    pub slot_id: SlotId,
}

pub type ArcConsistencyResult = std::result::Result<(), ArcConsistencyFailure>;

/// Worklist of arcs `(x, y)` used by `ac3`. An arc that's already waiting isn't queued twice.
#[derive(Debug)]
struct ArcQueue {
    queue: VecDeque<(SlotId, SlotId)>,
    queued: HashSet<(SlotId, SlotId)>,
}

impl ArcQueue {
    fn with_initial_queue<Items>(items: Items) -> ArcQueue
        where
            Items: IntoIterator<Item = (SlotId, SlotId)>
    {
        let mut queue = ArcQueue { queue: VecDeque::new(), queued: HashSet::new() };
        for arc in items {
            queue.enqueue(arc);
        }
        queue
    }

    fn pop_front(&mut self) -> Option<(SlotId, SlotId)> {
        let arc = self.queue.pop_front()?;
        self.queued.remove(&arc);
        Some(arc)
    }

    fn enqueue(&mut self, arc: (SlotId, SlotId)) {
        if self.queued.insert(arc) {
            self.queue.push_back(arc);
        }
    }
}

/// The candidate words still considered possible for each slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domains {
    by_slot: Vec<BitSet>,
}

impl Domains {
    /// Seed every slot with every word in the dictionary.
    pub fn new(grid: &Grid, dictionary: &Dictionary) -> Domains {
        let all_words: BitSet = (0..dictionary.len()).collect();

        Domains { by_slot: vec![all_words; grid.slot_count()] }
    }

    pub fn get(&self, slot_id: SlotId) -> &BitSet {
        &self.by_slot[slot_id]
    }

    /// How many candidates remain for the slot.
    pub fn len(&self, slot_id: SlotId) -> usize {
        self.by_slot[slot_id].len()
    }

    pub fn is_exhausted(&self, slot_id: SlotId) -> bool {
        self.by_slot[slot_id].is_empty()
    }

    /// The first slot left without candidates, if any.
    pub fn first_exhausted_slot(&self) -> Option<SlotId> {
        (0..self.by_slot.len()).find(|&slot_id| self.is_exhausted(slot_id))
    }

    /// The remaining candidates for the slot, as strings.
    pub fn words<'a>(
        &'a self,
        dictionary: &'a Dictionary,
        slot_id: SlotId,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.by_slot[slot_id].iter().map(move |word_id| dictionary.word(word_id).string.as_str())
    }

    /// Narrow the slot's domain down to the single given word.
    fn restrict_to(&mut self, slot_id: SlotId, word_id: WordId) {
        let domain = &mut self.by_slot[slot_id];
        let keep = domain.contains(word_id);

        domain.clear();
        if keep {
            domain.insert(word_id);
        }
    }

    /// Remove every candidate whose length doesn't match its slot's length.
    pub fn enforce_node_consistency(&mut self, grid: &Grid, dictionary: &Dictionary) {
        for (slot_id, domain) in self.by_slot.iter_mut().enumerate() {
            let length = grid.slot(slot_id).length;

            // Collect first; the set can't be modified while we're iterating it.
            let mismatched: Vec<WordId> =
                domain.iter().filter(|&word_id| dictionary.word(word_id).len() != length).collect();

            for word_id in mismatched {
                domain.remove(word_id);
            }
        }
    }

    /// Make `x` arc consistent with `y`: remove every candidate for `x` that has no candidate
    /// for `y` placing the same letter in their shared cell. Returns whether anything was
    /// removed. Slots that don't cross impose nothing on each other.
    pub fn revise(&mut self, grid: &Grid, dictionary: &Dictionary, x: SlotId, y: SlotId) -> bool {
        let (x_cell, y_cell) = match grid.overlap(x, y) {
            Some(overlap) => overlap,
            None => return false,
        };

        // Which letters does some candidate for `y` place in the shared cell?
        let supported_letters: HashSet<char> = self.by_slot[y].iter()
            .filter_map(|word_id| dictionary.word(word_id).letters.get(y_cell).copied())
            .collect();

        let unsupported: Vec<WordId> = self.by_slot[x].iter().filter(|&word_id| {
            match dictionary.word(word_id).letters.get(x_cell) {
                Some(letter) => !supported_letters.contains(letter),
                None => true,
            }
        }).collect();

        if unsupported.is_empty() {
            return false;
        }

        for &word_id in &unsupported {
            self.by_slot[x].remove(word_id);
        }

        trace!(
            target: "solver",
            "Revised slot {} against slot {}: removed {} candidates, {} remain",
            x,
            y,
            unsupported.len(),
            self.by_slot[x].len()
        );

        true
    }

    /// Make every slot arc consistent with each slot it crosses (AC-3). If `arcs` is `None` we
    /// start from every ordered pair of crossing slots; otherwise only from the given arcs.
    /// Fails as soon as any slot runs out of candidates. Domains are pruned in place either way.
    pub fn ac3(
        &mut self,
        grid: &Grid,
        dictionary: &Dictionary,
        arcs: Option<&[(SlotId, SlotId)]>,
    ) -> ArcConsistencyResult {
        let mut queue = match arcs {
            Some(arcs) => ArcQueue::with_initial_queue(arcs.iter().copied()),
            None => ArcQueue::with_initial_queue(grid.arcs()),
        };

        while let Some((x, y)) = queue.pop_front() {
            if !self.revise(grid, dictionary, x, y) {
                continue;
            }

            if self.is_exhausted(x) {
                trace!(target: "solver", "Slot {} has no candidates left", x);
                return Err(ArcConsistencyFailure { slot_id: x });
            }

            // Anything crossing `x` may have relied on the candidates we just removed.
            for &z in grid.neighbors(x) {
                if z != y {
                    queue.enqueue((z, x));
                }
            }
        }

        Ok(())
    }
}

/// A partial mapping from slots to words, built up during the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    choices: Vec<Option<WordId>>,
    assigned_count: usize,
}

impl Assignment {
    /// An empty assignment for the given grid.
    pub fn new(grid: &Grid) -> Assignment {
        Assignment { choices: vec![None; grid.slot_count()], assigned_count: 0 }
    }

    pub fn get(&self, slot_id: SlotId) -> Option<WordId> {
        self.choices[slot_id]
    }

    pub fn contains(&self, slot_id: SlotId) -> bool {
        self.choices[slot_id].is_some()
    }

    pub fn len(&self) -> usize {
        self.assigned_count
    }

    pub fn is_empty(&self) -> bool {
        self.assigned_count == 0
    }

    /// Does every slot in the grid have a word?
    pub fn is_complete(&self) -> bool {
        self.assigned_count == self.choices.len()
    }

    /// Panics if the slot already has a word.
    pub fn assign(&mut self, slot_id: SlotId, word_id: WordId) {
        assert!(self.choices[slot_id].is_none(), "Slot {} is already assigned", slot_id);

        self.choices[slot_id] = Some(word_id);
        self.assigned_count += 1;
    }

    /// Panics if the slot has no word.
    pub fn unassign(&mut self, slot_id: SlotId) -> WordId {
        let word_id = self.choices[slot_id]
            .take()
            .unwrap_or_else(|| panic!("Slot {} is not assigned", slot_id));

        self.assigned_count -= 1;
        word_id
    }

    /// Assign the word to the slot until the returned guard is dropped.
    pub fn tentatively_assign(&mut self, slot_id: SlotId, word_id: WordId) -> TentativeChoice<'_> {
        self.assign(slot_id, word_id);
        TentativeChoice { assignment: self, slot_id }
    }

    /// The assigned (slot, word) pairs, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, WordId)> + '_ {
        self.choices.iter().enumerate().filter_map(|(slot_id, choice)| {
            choice.map(|word_id| (slot_id, word_id))
        })
    }

    /// The assigned words as strings, in slot order.
    pub fn words<'a>(
        &'a self,
        dictionary: &'a Dictionary,
    ) -> impl Iterator<Item = (SlotId, &'a str)> + 'a {
        self.iter().map(move |(slot_id, word_id)| (slot_id, dictionary.word(word_id).string.as_str()))
    }
}

/// A slot assignment that is undone when this guard goes out of scope, however the scope is
/// left. Derefs to the assignment so the search can keep extending it.
pub struct TentativeChoice<'a> {
    assignment: &'a mut Assignment,
    slot_id: SlotId,
}

impl Deref for TentativeChoice<'_> {
    type Target = Assignment;

    fn deref(&self) -> &Assignment {
        &*self.assignment
    }
}

impl DerefMut for TentativeChoice<'_> {
    fn deref_mut(&mut self) -> &mut Assignment {
        &mut *self.assignment
    }
}

impl Drop for TentativeChoice<'_> {
    fn drop(&mut self) {
        self.assignment.unassign(self.slot_id);
    }
}

/// Is the whole assignment consistent? That is, are all words distinct, does every word fit
/// its slot, and do crossing slots agree on their shared cells?
pub fn is_consistent(grid: &Grid, dictionary: &Dictionary, assignment: &Assignment) -> bool {
    let mut seen_words = HashSet::with_capacity(assignment.len());

    assignment.iter().all(|(slot_id, word_id)| {
        seen_words.insert(word_id) &&
            dictionary.word(word_id).len() == grid.slot(slot_id).length &&
            grid.neighbors(slot_id).iter().all(|&neighbor_id| {
                match assignment.get(neighbor_id) {
                    Some(neighbor_word_id) => letters_agree(
                        grid, dictionary, (slot_id, word_id), (neighbor_id, neighbor_word_id),
                    ),
                    None => true,
                }
            })
    })
}

/// Is the word assigned to the given slot consistent with the rest of the assignment? This only
/// looks at the constraints involving that slot, so it's enough to check each new choice.
pub fn is_consistent_with(
    grid: &Grid,
    dictionary: &Dictionary,
    assignment: &Assignment,
    slot_id: SlotId,
) -> bool {
    let word_id = match assignment.get(slot_id) {
        Some(word_id) => word_id,
        None => return true,
    };

    if dictionary.word(word_id).len() != grid.slot(slot_id).length {
        return false;
    }

    if assignment.iter().any(|(other_slot_id, other_word_id)| {
        other_slot_id != slot_id && other_word_id == word_id
    }) {
        return false;
    }

    grid.neighbors(slot_id).iter().all(|&neighbor_id| {
        match assignment.get(neighbor_id) {
            Some(neighbor_word_id) => letters_agree(
                grid, dictionary, (slot_id, word_id), (neighbor_id, neighbor_word_id),
            ),
            None => true,
        }
    })
}

/// Pick the unassigned slot to fill next: the one with the fewest remaining candidates, then the
/// one crossing the most unassigned slots, then the lowest id. Returns `None` if every slot is
/// assigned.
pub fn select_unassigned_slot(
    grid: &Grid,
    domains: &Domains,
    assignment: &Assignment,
) -> Option<SlotId> {
    (0..grid.slot_count())
        .filter(|&slot_id| !assignment.contains(slot_id))
        .min_by_key(|&slot_id| {
            let degree = grid.neighbors(slot_id).iter()
                .filter(|&&neighbor_id| !assignment.contains(neighbor_id))
                .count();

            (domains.len(slot_id), Reverse(degree), slot_id)
        })
}

/// Order the candidates for a slot by how many candidates each would rule out for the
/// unassigned slots crossing it, fewest first. Ties keep word id order.
pub fn order_domain_values(
    grid: &Grid,
    dictionary: &Dictionary,
    domains: &Domains,
    slot_id: SlotId,
    assignment: &Assignment,
) -> Vec<WordId> {
    // For each unassigned crossing slot: the shared cell within our slot, how many candidates
    // the crossing slot has, and how many of those place each letter in the shared cell.
    let crossing_letter_counts: Vec<(usize, usize, HashMap<char, usize>)> =
        grid.neighbors(slot_id).iter()
            .filter(|&&neighbor_id| !assignment.contains(neighbor_id))
            .filter_map(|&neighbor_id| {
                let (cell, neighbor_cell) = grid.overlap(slot_id, neighbor_id)?;

                let mut letter_counts: HashMap<char, usize> = HashMap::new();
                for word_id in domains.get(neighbor_id).iter() {
                    if let Some(&letter) = dictionary.word(word_id).letters.get(neighbor_cell) {
                        *letter_counts.entry(letter).or_insert(0) += 1;
                    }
                }

                Some((cell, domains.len(neighbor_id), letter_counts))
            })
            .collect();

    let mut values: Vec<WordId> = domains.get(slot_id).iter().collect();

    values.sort_by_cached_key(|&word_id| {
        let letters = &dictionary.word(word_id).letters;

        crossing_letter_counts.iter().map(|(cell, candidate_count, letter_counts)| {
            let compatible = letters.get(*cell)
                .and_then(|letter| letter_counts.get(letter))
                .copied()
                .unwrap_or(0);

            candidate_count - compatible
        }).sum::<usize>()
    });

    values
}

/// Settings for the fill process.
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    /// Re-run arc consistency after every choice, pruning the crossing slots' candidates for the
    /// rest of that branch. Without this, arc consistency only runs once before the search.
    pub maintain_arc_consistency: bool,
}

/// A struct tracking statistics about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Tentative choices tried.
    pub states: u64,

    /// Tentative choices undone because they led nowhere.
    pub backtracks: u64,

    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct FillSuccess {
    pub statistics: Statistics,

    /// Assigns a word to every slot in the grid.
    pub assignment: Assignment,
}

/// Why a grid couldn't be filled. Either way the puzzle has no solution with the given words.
#[derive(Debug, Clone)]
pub enum FillFailure {
    /// Constraint propagation left this slot without candidates, so no search was attempted.
    EmptyDomain { slot_id: SlotId },

    /// The search tried everything.
    Exhausted { statistics: Statistics },
}

impl Display for FillFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FillFailure::EmptyDomain { slot_id } => {
                write!(f, "slot {} has no candidates consistent with its crossings", slot_id)
            }
            FillFailure::Exhausted { statistics } => {
                write!(
                    f,
                    "search exhausted after {} states and {} backtracks",
                    statistics.states,
                    statistics.backtracks
                )
            }
        }
    }
}

/// The live state of a single fill attempt.
struct Search<'a> {
    grid: &'a Grid,
    dictionary: &'a Dictionary,
    domains: Domains,
    options: &'a FillOptions,
    statistics: Statistics,
}

impl Search<'_> {
    /// Extend the assignment until it's complete, returning a copy of the complete assignment.
    /// The assignment itself is always handed back exactly as it came in.
    fn backtrack(&mut self, assignment: &mut Assignment) -> Option<Assignment> {
        if assignment.is_complete() {
            debug_assert!(is_consistent(self.grid, self.dictionary, assignment));
            return Some(assignment.clone());
        }

        let slot_id = select_unassigned_slot(self.grid, &self.domains, assignment)?;
        let values =
            order_domain_values(self.grid, self.dictionary, &self.domains, slot_id, assignment);

        trace!(
            target: "solver",
            "Filling slot {} ({} assigned, {} candidates)",
            slot_id,
            assignment.len(),
            values.len()
        );

        for word_id in values {
            self.statistics.states += 1;

            let mut choice = assignment.tentatively_assign(slot_id, word_id);

            if is_consistent_with(self.grid, self.dictionary, &choice, slot_id) {
                trace!(
                    target: "solver",
                    "Trying {} in slot {}",
                    self.dictionary.word(word_id).string,
                    slot_id
                );

                let result = if self.options.maintain_arc_consistency {
                    self.propagate_and_backtrack(&mut choice, slot_id, word_id)
                } else {
                    self.backtrack(&mut choice)
                };

                if result.is_some() {
                    return result;
                }
            }

            // Dropping `choice` takes the word back out of the slot.
            self.statistics.backtracks += 1;
        }

        None
    }

    /// Narrow the chosen slot down to the chosen word, propagate that to the crossing slots, and
    /// keep searching. The domains are restored before returning, so sibling choices start from
    /// the same candidates this one did.
    fn propagate_and_backtrack(
        &mut self,
        assignment: &mut Assignment,
        slot_id: SlotId,
        word_id: WordId,
    ) -> Option<Assignment> {
        let snapshot = self.domains.clone();

        self.domains.restrict_to(slot_id, word_id);

        let arcs: Vec<(SlotId, SlotId)> = self.grid.neighbors(slot_id).iter()
            .filter(|&&neighbor_id| !assignment.contains(neighbor_id))
            .map(|&neighbor_id| (neighbor_id, slot_id))
            .collect();

        let result = match self.domains.ac3(self.grid, self.dictionary, Some(arcs.as_slice())) {
            Ok(()) => self.backtrack(assignment),
            Err(ArcConsistencyFailure { slot_id: exhausted_slot_id }) => {
                trace!(
                    target: "solver",
                    "Choice for slot {} leaves slot {} without candidates",
                    slot_id,
                    exhausted_slot_id
                );
                None
            }
        };

        self.domains = snapshot;
        result
    }
}

/// Search for a valid fill for the given grid using the default options.
pub fn find_fill(
    grid: &Grid,
    dictionary: &Dictionary,
) -> std::result::Result<FillSuccess, FillFailure> {
    find_fill_with_options(grid, dictionary, &FillOptions::default())
}

/// Search for a valid fill for the given grid: enforce node and arc consistency, then run a
/// backtracking search over what's left.
pub fn find_fill_with_options(
    grid: &Grid,
    dictionary: &Dictionary,
    options: &FillOptions,
) -> std::result::Result<FillSuccess, FillFailure> {
    let start = Instant::now();

    let mut domains = Domains::new(grid, dictionary);
    domains.enforce_node_consistency(grid, dictionary);

    // A slot with no words of the right length might not cross anything, in which case arc
    // consistency would never look at it.
    if let Some(slot_id) = domains.first_exhausted_slot() {
        debug!(target: "solver", "No words fit slot {}", slot_id);
        return Err(FillFailure::EmptyDomain { slot_id });
    }

    if let Err(ArcConsistencyFailure { slot_id }) = domains.ac3(grid, dictionary, None) {
        debug!(target: "solver", "Arc consistency emptied slot {}", slot_id);
        return Err(FillFailure::EmptyDomain { slot_id });
    }

    debug!(
        target: "solver",
        "Candidates per slot after propagation: {:?}",
        (0..grid.slot_count()).map(|slot_id| domains.len(slot_id)).collect::<Vec<_>>()
    );

    let mut search = Search {
        grid,
        dictionary,
        domains,
        options,
        statistics: Statistics::default(),
    };

    let mut assignment = Assignment::new(grid);
    let result = search.backtrack(&mut assignment);

    let mut statistics = search.statistics;
    statistics.duration = start.elapsed();

    match result {
        Some(assignment) => {
            debug!(target: "solver", "Found a fill: {:?}", statistics);
            Ok(FillSuccess { statistics, assignment })
        }
        None => {
            debug!(target: "solver", "No fill exists: {:?}", statistics);
            Err(FillFailure::Exhausted { statistics })
        }
    }
}

/// Place the letters of every assigned word into a height x width matrix, leaving `None` in
/// cells no assigned slot covers.
pub fn letter_grid(
    grid: &Grid,
    dictionary: &Dictionary,
    assignment: &Assignment,
) -> Vec<Vec<Option<char>>> {
    let mut letters = vec![vec![None; grid.width()]; grid.height()];

    for (slot_id, word_id) in assignment.iter() {
        let word = dictionary.word(word_id);

        for ((row, col), &letter) in grid.slot(slot_id).cell_coords().zip(&word.letters) {
            letters[row][col] = Some(letter);
        }
    }

    letters
}

/// Turn the given grid and assignment into a rendered string, with blocks drawn as `█` and
/// unfilled cells left blank.
pub fn render_grid(grid: &Grid, dictionary: &Dictionary, assignment: &Assignment) -> String {
    let letters = letter_grid(grid, dictionary, assignment);

    (0..grid.height()).map(|row| {
        (0..grid.width()).map(|col| {
            if grid.is_fillable(row, col) {
                letters[row][col].unwrap_or(' ')
            } else {
                '█'
            }
        }).collect::<String>()
    }).collect::<Vec<_>>().join("\n")
}
