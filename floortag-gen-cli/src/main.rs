use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use floortag::dict::Dictionary;
use floortag::render;

mod render_png;

/// Floor-marker generation CLI
#[derive(Parser)]
#[command(name = "floortag-gen", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in marker dictionaries
    List,
    /// Show details of a dictionary and preview one marker
    Info {
        /// Dictionary name
        #[arg(long, default_value = "4x4_50")]
        dict: String,
        /// Marker id to preview
        #[arg(long, default_value = "0")]
        id: u32,
    },
    /// Render marker PNGs, one file per id
    Render {
        /// Dictionary name
        #[arg(long, default_value = "4x4_50")]
        dict: String,
        /// Marker ids to render. The stock deployment uses 0-5 for the
        /// calibration rectangle and 10-29 for robots.
        #[arg(long, default_value = "0-5,10-29")]
        ids: String,
        /// Pixels per marker cell
        #[arg(long, default_value = "100")]
        scale: u32,
        /// White quiet zone around the marker, in cells
        #[arg(long, default_value = "1")]
        margin: u32,
        /// Directory the PNG files land in
        #[arg(short, long, default_value = ".")]
        output: String,
    },
    /// Render many markers onto one printable sheet
    Sheet {
        /// Dictionary name
        #[arg(long, default_value = "4x4_50")]
        dict: String,
        /// Marker ids on the sheet (default: the whole dictionary)
        #[arg(long)]
        ids: Option<String>,
        /// Pixels per marker cell
        #[arg(long, default_value = "100")]
        scale: u32,
        /// Spacing between markers, in cells
        #[arg(long, default_value = "2")]
        spacing: u32,
        /// Markers per sheet row
        #[arg(long, default_value = "5")]
        columns: u32,
        /// Sheet PNG path
        #[arg(short, long, default_value = "markers.png")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => cmd_list(),
        Command::Info { dict, id } => cmd_info(&dict, id),
        Command::Render {
            dict,
            ids,
            scale,
            margin,
            output,
        } => cmd_render(&dict, &ids, scale, margin, &output),
        Command::Sheet {
            dict,
            ids,
            scale,
            spacing,
            columns,
            output,
        } => cmd_sheet(&dict, ids.as_deref(), scale, spacing, columns, &output),
    }
}

fn load_dictionary(name: &str) -> Result<Dictionary> {
    Dictionary::builtin(name).context("use 'list' to see the built-in dictionaries")
}

/// Parse an id list like "0", "0-5", "0,3,5", "0-5,10-29".
fn parse_ids(spec: &str, len: u32) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for part in spec.split(',') {
        let (lo, hi) = match part.trim().split_once('-') {
            Some((a, b)) => (
                a.trim().parse().context("invalid id range start")?,
                b.trim().parse().context("invalid id range end")?,
            ),
            None => {
                let id: u32 = part.trim().parse().context("invalid id")?;
                (id, id)
            }
        };
        anyhow::ensure!(hi < len, "id {hi} exceeds max {} for this dictionary", len - 1);
        ids.extend(lo..=hi);
    }
    Ok(ids)
}

fn cmd_list() -> Result<()> {
    println!("{:<10} {:>5} {:>7} {:>11}", "Name", "Grid", "Codes", "Correction");
    println!("{}", "-".repeat(36));
    for name in Dictionary::builtin_names() {
        let dict = Dictionary::builtin(name)?;
        println!(
            "{:<10} {:>5} {:>7} {:>11}",
            dict.name,
            format!("{}x{}", dict.dim, dict.dim),
            dict.len(),
            dict.max_correction_bits,
        );
    }
    Ok(())
}

fn cmd_info(name: &str, id: u32) -> Result<()> {
    let dict = load_dictionary(name)?;
    println!("Dictionary:      {}", dict.name);
    println!("Data grid:       {}x{}", dict.dim, dict.dim);
    println!("Marker cells:    {}x{}", dict.dim + 2, dict.dim + 2);
    println!("Codes:           {}", dict.len());
    println!("Correction bits: {}", dict.max_correction_bits);
    println!();

    let cells = render::marker_cells(dict, id)?;
    println!("Marker {}:", id);
    for y in 0..cells.grid {
        print!("  ");
        for x in 0..cells.grid {
            print!("{}", if cells.is_black(x, y) { "##" } else { "  " });
        }
        println!();
    }
    Ok(())
}

fn cmd_render(name: &str, id_spec: &str, scale: u32, margin: u32, output_dir: &str) -> Result<()> {
    let dict = load_dictionary(name)?;
    let ids = parse_ids(id_spec, dict.len() as u32)?;

    let dir = Path::new(output_dir);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    for &id in &ids {
        let img = render::render_marker(dict, id, scale, margin)?;
        let path = dir.join(format!("{}_{:04}.png", dict.name, id));
        render_png::write_marker_png(&img, &path)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_sheet(
    name: &str,
    id_spec: Option<&str>,
    scale: u32,
    spacing: u32,
    columns: u32,
    output: &str,
) -> Result<()> {
    let dict = load_dictionary(name)?;
    let ids = match id_spec {
        Some(spec) => parse_ids(spec, dict.len() as u32)?,
        None => (0..dict.len() as u32).collect(),
    };

    render_png::write_sheet_png(dict, &ids, scale, spacing, columns, Path::new(output))?;
    println!("wrote {}", output);
    Ok(())
}
