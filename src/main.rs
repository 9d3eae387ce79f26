use std::fs;
use anyhow::{bail, Context, Result};
use log::info;
use gridfill::{find_fill, render_grid, Dictionary, Grid};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        bail!("Usage: gridfill structure words [output]");
    }

    let structure = fs::read_to_string(&args[1])
        .with_context(|| format!("Failed to read structure file {}", args[1]))?;
    let grid = Grid::from_template(&structure)
        .with_context(|| format!("Invalid structure in {}", args[1]))?;

    let words = fs::read_to_string(&args[2])
        .with_context(|| format!("Failed to read word list {}", args[2]))?;
    let dictionary = Dictionary::from_word_list(&words);

    info!("Loaded {} slots and {} words", grid.slot_count(), dictionary.len());

    match find_fill(&grid, &dictionary) {
        Ok(result) => {
            info!("{:?}", result.statistics);

            let display_grid = render_grid(&grid, &dictionary, &result.assignment);
            println!("{}", display_grid);

            if let Some(output) = args.get(3) {
                fs::write(output, &display_grid)
                    .with_context(|| format!("Unable to write {}", output))?;
                info!("Written fill to {}", output);
            }
        }
        Err(failure) => {
            info!("{}", failure);
            println!("No solution.");
        }
    }

    Ok(())
}
