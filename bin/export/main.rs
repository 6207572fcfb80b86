//! Pulls every chunk under a world rectangle through a grid store and writes it to the local chunk cache.

use clap::Parser;
use std::path::PathBuf;
use trackgrid::core::glam::{DVec2, IVec2};
use trackgrid::core::ilattice::prelude::Extent;
use trackgrid::map::{
    chunk_keys, is_zero_chunk, ChunkRequest, FileTransport, PrefetchPool, WorldRect, WorldUnits,
};
use trackgrid::Config;

#[derive(Debug, Parser)]
#[command(about = "Export grid chunks covering a world rectangle")]
struct Args {
    /// RON config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the config's export directory.
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true)]
    min_x: f64,
    #[arg(long, allow_negative_numbers = true)]
    min_y: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_x: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_y: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = match args.config.as_ref() {
        Some(path) => Config::read_file(path)?,
        None => Config::default(),
    };
    let out_dir = args.out.unwrap_or_else(|| config.export_dir.clone());

    let registry = config.registry();
    let store = registry.store_for(&config.store_key()?)?;

    let rect = WorldRect::from_corners(
        DVec2::new(args.min_x, args.min_y),
        DVec2::new(args.max_x, args.max_y),
    );
    let cells = store.cell_range(WorldUnits(rect)).into_inner();
    // Cells on the far edges need the next row and column of samples too.
    let samples = Extent::from_min_and_shape(cells.minimum, cells.shape + IVec2::ONE);
    let keys = chunk_keys(&samples);
    log::info!(
        "Exporting {} chunks for cells {:?} to {}",
        keys.len(),
        cells,
        out_dir.display()
    );

    let pool = PrefetchPool::new(store.clone(), &config.grid.prefetch);
    let handles: Vec<_> = keys.iter().map(|&key| pool.prefetch(key)).collect();

    let files = FileTransport::new(out_dir);
    let mut written = 0;
    for handle in handles {
        let key = handle.key();
        let chunk = handle.wait()?;
        if is_zero_chunk(&chunk) {
            log::warn!("Chunk {:?} is unavailable; not writing a placeholder", key);
            continue;
        }
        let request = ChunkRequest::new(store.coordinates(), key);
        files.write_chunk(&request, &chunk)?;
        written += 1;
    }
    log::info!("Wrote {} of {} chunks", written, keys.len());

    Ok(())
}
