use std::env;

use anyhow::{anyhow, bail};
use backstory_cli::{flag_value, init_tracing, load_settings};
use backstory_embed::EmbeddingPipeline;
use backstory_vector::VectorStore;
use backstory_verify::StoreCatalog;

const EXCERPT_CHARS: usize = 200;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut limit = 3usize;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-k" => {
                limit = flag_value(&args, &mut i).parse().map_err(|_| anyhow!("--limit requires a number"))?;
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }
    if positional.len() < 2 {
        eprintln!("Usage: backstory-query <source-id|title> <text> [--limit N]");
        eprintln!("Example: backstory-query monte_cristo 'Edmond Dantes was imprisoned'");
        std::process::exit(1);
    }
    let text = positional[1..].join(" ");

    let catalog = StoreCatalog::new(settings.sources.clone());
    let Some(id) = catalog.resolve(&positional[0]) else {
        bail!("unknown source '{}'", positional[0]);
    };
    let source = settings.source(&id).ok_or_else(|| anyhow!("source '{id}' is not configured"))?;
    let store = VectorStore::open(settings.store_dir(source))?;
    let pipeline = EmbeddingPipeline::from_settings(settings.chunking, &settings.embedding)?;

    let hits = store.search(&pipeline.encode(&text)?, limit)?;
    println!("Found {} results in {} for: \"{}\"", hits.len(), source.title, text);
    for (rank, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.text().chars().take(EXCERPT_CHARS).collect();
        println!("\n  {}. chunk={}  distance={:.4}", rank + 1, hit.chunk_id(), hit.distance);
        println!("     {}", excerpt.replace('\n', " "));
    }
    Ok(())
}
