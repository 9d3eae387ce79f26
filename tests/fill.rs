use gridfill::{
    find_fill, find_fill_with_options, is_consistent, letter_grid, render_grid, Dictionary,
    FillFailure, FillOptions, Grid,
};

const STRUCTURE: &str = "
    #___#
    #_##_
    #_##_
    #_##_
    #____
";

const WORDS: &str = "
one
two
three
four
five
ocean
nest
salt
rent
note
otter
ten
dog
cat
";

fn check_fill(grid: &Grid, dictionary: &Dictionary, options: &FillOptions) {
    let result = find_fill_with_options(grid, dictionary, options).expect("Failed to find a fill");

    println!("{:?}", result.statistics);
    println!("{}", render_grid(grid, dictionary, &result.assignment));

    assert!(result.assignment.is_complete());
    assert!(is_consistent(grid, dictionary, &result.assignment));

    // Every slot reads back its own word from the letter grid.
    let letters = letter_grid(grid, dictionary, &result.assignment);
    for (slot_id, word) in result.assignment.words(dictionary) {
        let read_back: String = grid.slot(slot_id).cell_coords()
            .map(|(row, col)| letters[row][col].expect("Unfilled cell in a filled slot"))
            .collect();
        assert_eq!(read_back, word);
    }
}

#[test]
fn test_fill_from_word_list() {
    let grid = Grid::from_template(STRUCTURE).unwrap();
    let dictionary = Dictionary::from_word_list(WORDS);

    check_fill(&grid, &dictionary, &FillOptions::default());
    check_fill(&grid, &dictionary, &FillOptions { maintain_arc_consistency: true });
}

/// ___#
/// _#__
/// ____
/// #__#
#[test]
fn test_fill_with_many_crossings() {
    let grid = Grid::from_template("
        ___#
        _#__
        ____
        #__#
    ").unwrap();
    let dictionary = Dictionary::from_word_list("
        ads
        ant
        ate
        em
        it
        my
        no
        om
        sea
        star
        stay
        team
        to
        tome
    ");

    assert_eq!(grid.slot_count(), 8);
    check_fill(&grid, &dictionary, &FillOptions::default());
    check_fill(&grid, &dictionary, &FillOptions { maintain_arc_consistency: true });
}

#[test]
fn test_fill_is_deterministic() {
    let grid = Grid::from_template(STRUCTURE).unwrap();
    let dictionary = Dictionary::from_word_list(WORDS);

    let first = find_fill(&grid, &dictionary).expect("Failed to find a fill");
    let second = find_fill(&grid, &dictionary).expect("Failed to find a fill");

    assert_eq!(first.assignment, second.assignment);
}

#[test]
fn test_unfillable_grid_reports_no_solution() {
    let grid = Grid::from_template(STRUCTURE).unwrap();
    let dictionary = Dictionary::from_word_list("one\ntwo\nocean\nsalt\n");

    let failure = find_fill(&grid, &dictionary).expect_err("Found an impossible fill??");

    assert!(matches!(failure, FillFailure::EmptyDomain { .. }));
    assert!(!failure.to_string().is_empty());
}
